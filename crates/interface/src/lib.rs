use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod bars;

pub use bars::{parse_epoch_ms, parse_number, ColumnarBars, PriceBar, PriceHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeId {
    Mexc,
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: code={code}, message={message}")]
    Api { code: i64, message: String },
    #[error("other error: {0}")]
    Other(String),
}

/// Candle resolution requested from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Day1,
    Hour1,
    Min10,
    Min5,
    Min1,
}

impl Resolution {
    /// Interval name understood by the contract kline endpoint.
    pub fn interval(&self) -> &'static str {
        match self {
            Resolution::Day1 => "Day1",
            Resolution::Hour1 => "Hour1",
            Resolution::Min10 => "Min10",
            Resolution::Min5 => "Min5",
            Resolution::Min1 => "Min1",
        }
    }

    /// Label written to the `Interval` column of snapshot files.
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Day1 => "daily",
            Resolution::Hour1 => "1h",
            Resolution::Min10 => "10m",
            Resolution::Min5 => "5m",
            Resolution::Min1 => "1m",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Current funding rate of one perpetual contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingQuote {
    pub symbol: String,     // underscore delimited, e.g. BTC_USDT
    pub funding_rate: f64,  // 0.01 == 1%
    pub next_settlement: Option<DateTime<Utc>>,
}

/// One entry of a ranked symbol set, as cached between the ranking and
/// collection phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSymbol {
    pub symbol: String,
    pub funding_rate: f64,
}

impl From<&FundingQuote> for RankedSymbol {
    fn from(quote: &FundingQuote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            funding_rate: quote.funding_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_names() {
        assert_eq!(Resolution::Day1.interval(), "Day1");
        assert_eq!(Resolution::Min10.interval(), "Min10");
        assert_eq!(Resolution::Day1.label(), "daily");
        assert_eq!(Resolution::Hour1.to_string(), "1h");
        assert_eq!(Resolution::Min5.label(), "5m");
    }

    #[test]
    fn test_resolution_deserializes_from_interval_name() {
        let r: Resolution = serde_json::from_str("\"Min5\"").unwrap();
        assert_eq!(r, Resolution::Min5);
    }
}
