//! Scripted exchange used by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use exchanges::FundingExchange;
use interface::{
    ColumnarBars, ExchangeError, ExchangeId, FundingQuote, PriceHistory, Resolution,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListSymbols,
    FundingRates { requested: usize, top_n: usize },
    NextSettlement(String),
    PriceHistory {
        symbol: String,
        resolution: Resolution,
        start: i64,
        end: i64,
    },
}

#[derive(Default)]
pub struct MockExchange {
    symbols: Vec<String>,
    quotes: Vec<FundingQuote>,
    settlements: HashMap<String, DateTime<Utc>>,
    failing_settlements: HashSet<String>,
    failing_resolutions: HashSet<Resolution>,
    fail_symbols: bool,
    fail_funding: bool,
    fail_history: bool,
    calls: Mutex<Vec<Call>>,
}

pub fn quote(symbol: &str, rate: f64, next: Option<DateTime<Utc>>) -> FundingQuote {
    FundingQuote {
        symbol: symbol.to_string(),
        funding_rate: rate,
        next_settlement: next,
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quotes are answered in the given order; their symbols form the universe.
    pub fn with_quotes(mut self, quotes: Vec<FundingQuote>) -> Self {
        self.symbols = quotes.iter().map(|q| q.symbol.clone()).collect();
        self.quotes = quotes;
        self
    }

    pub fn with_settlement(mut self, symbol: &str, at: DateTime<Utc>) -> Self {
        self.settlements.insert(symbol.to_string(), at);
        self
    }

    pub fn failing_settlement(mut self, symbol: &str) -> Self {
        self.failing_settlements.insert(symbol.to_string());
        self
    }

    pub fn failing_resolution(mut self, resolution: Resolution) -> Self {
        self.failing_resolutions.insert(resolution);
        self
    }

    pub fn failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    pub fn failing_symbols(mut self) -> Self {
        self.fail_symbols = true;
        self
    }

    pub fn failing_funding(mut self) -> Self {
        self.fail_funding = true;
        self
    }

    pub fn universe(&self) -> Vec<String> {
        self.symbols.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn funding_rate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::FundingRates { .. }))
            .count()
    }

    pub fn price_history_calls(&self) -> Vec<(String, Resolution)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PriceHistory {
                    symbol, resolution, ..
                } => Some((symbol, resolution)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl FundingExchange for MockExchange {
    fn id(&self) -> ExchangeId {
        ExchangeId::Mexc
    }

    async fn list_tradable_symbols(&self) -> Result<Vec<String>, ExchangeError> {
        self.record(Call::ListSymbols);
        if self.fail_symbols {
            return Err(ExchangeError::Other("symbols unavailable".to_string()));
        }
        Ok(self.symbols.clone())
    }

    async fn get_funding_rates(
        &self,
        symbols: &[String],
        top_n: usize,
    ) -> Result<Vec<FundingQuote>, ExchangeError> {
        self.record(Call::FundingRates {
            requested: symbols.len(),
            top_n,
        });
        if self.fail_funding {
            return Err(ExchangeError::Other("funding unavailable".to_string()));
        }
        Ok(self
            .quotes
            .iter()
            .filter(|q| symbols.contains(&q.symbol))
            .take(top_n)
            .cloned()
            .collect())
    }

    async fn get_next_settlement(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, ExchangeError> {
        self.record(Call::NextSettlement(symbol.to_string()));
        if self.failing_settlements.contains(symbol) {
            return Err(ExchangeError::Other(format!("no settlement for {symbol}")));
        }
        Ok(self.settlements.get(symbol).copied())
    }

    async fn get_price_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        start: i64,
        end: i64,
    ) -> Result<PriceHistory, ExchangeError> {
        self.record(Call::PriceHistory {
            symbol: symbol.to_string(),
            resolution,
            start,
            end,
        });
        if self.fail_history || self.failing_resolutions.contains(&resolution) {
            return Err(ExchangeError::Api {
                code: 510,
                message: "too frequent".to_string(),
            });
        }

        let col = |a: f64, b: f64| vec![Value::from(a), Value::from(b)];
        Ok(PriceHistory::Columnar(ColumnarBars {
            time: vec![Value::from(start), Value::from(start + 60)],
            open: col(100.0, 101.0),
            high: col(102.0, 103.0),
            low: col(99.0, 100.0),
            close: col(101.0, 102.0),
            vol: col(10.0, 12.0),
        }))
    }
}
