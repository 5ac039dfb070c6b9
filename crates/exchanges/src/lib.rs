use async_trait::async_trait;
use chrono::{DateTime, Utc};

use interface::{ExchangeError, ExchangeId, FundingQuote, PriceHistory, Resolution};

pub mod mexc;

/// Read-only view of a perpetual-futures venue, as needed by the funding
/// snapshot collector.
#[async_trait]
pub trait FundingExchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// All tradable perpetual symbols.
    async fn list_tradable_symbols(&self) -> Result<Vec<String>, ExchangeError>;

    /// Funding quotes for `symbols`, sorted by descending absolute funding
    /// rate and truncated to `top_n`. Symbols whose lookup fails are left out.
    async fn get_funding_rates(
        &self,
        symbols: &[String],
        top_n: usize,
    ) -> Result<Vec<FundingQuote>, ExchangeError>;

    /// Next settlement instant of a single symbol, if the venue reports one.
    async fn get_next_settlement(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, ExchangeError>;

    /// Price history between `start` and `end` (epoch seconds, inclusive).
    async fn get_price_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        start: i64,
        end: i64,
    ) -> Result<PriceHistory, ExchangeError>;
}

/// Descending by |funding rate|, then ascending by symbol.
pub fn sort_by_magnitude(quotes: &mut [FundingQuote]) {
    quotes.sort_by(|a, b| {
        b.funding_rate
            .abs()
            .partial_cmp(&a.funding_rate.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

// Convenience re-exports
pub use mexc::{MexcClient, MexcConfig};
