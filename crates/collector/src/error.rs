use thiserror::Error;

use crate::{cache::CacheError, config::ConfigError, sink::SinkError};
use interface::ExchangeError;

/// Failure that escapes a whole tick. Everything below this level (one
/// symbol, one resolution, one settlement) is contained and logged.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}
