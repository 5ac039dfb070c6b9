use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::minutes_until;
use exchanges::{sort_by_magnitude, FundingExchange};
use interface::RankedSymbol;

/// Picks the symbols with the most extreme funding rate among those settling
/// soon.
pub struct SymbolRanker<'a> {
    exchange: &'a dyn FundingExchange,
    fallback_delay: Duration,
}

impl<'a> SymbolRanker<'a> {
    pub fn new(exchange: &'a dyn FundingExchange, fallback_delay: Duration) -> Self {
        Self {
            exchange,
            fallback_delay,
        }
    }

    /// Up to `top_n` symbols, by descending |funding rate| (ties by symbol),
    /// whose next settlement is in `(min_minutes, max_minutes]` from `now`.
    ///
    /// Never fails: lookup errors drop the symbol, a failed bulk fetch gives
    /// an empty set.
    pub async fn rank(
        &self,
        universe: &[String],
        top_n: usize,
        min_minutes: f64,
        max_minutes: f64,
        now: DateTime<Utc>,
    ) -> Vec<RankedSymbol> {
        if top_n == 0 || universe.is_empty() {
            return Vec::new();
        }

        // over-fetch so the settlement filter still leaves top_n candidates
        let prefetch = top_n.saturating_mul(5).min(universe.len());
        let mut quotes = match self.exchange.get_funding_rates(universe, prefetch).await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!("failed to fetch funding rates: {}", e);
                return Vec::new();
            }
        };
        quotes.retain(|q| q.funding_rate.is_finite());
        sort_by_magnitude(&mut quotes);

        let mut seen: HashSet<String> = HashSet::new();
        let mut ranked: Vec<RankedSymbol> = Vec::with_capacity(top_n);
        let mut lookups = 0usize;

        for quote in &quotes {
            if ranked.len() >= top_n {
                break;
            }
            if !seen.insert(quote.symbol.clone()) {
                continue;
            }

            let next_settlement = match quote.next_settlement.filter(|t| t.timestamp_millis() > 0) {
                Some(t) => t,
                None => {
                    if lookups > 0 && !self.fallback_delay.is_zero() {
                        tokio::time::sleep(self.fallback_delay).await;
                    }
                    lookups += 1;
                    match self.exchange.get_next_settlement(&quote.symbol).await {
                        Ok(Some(t)) => t,
                        Ok(None) => {
                            debug!("no next settlement for {}, skipping", quote.symbol);
                            continue;
                        }
                        Err(e) => {
                            warn!("failed to get next settlement for {}: {}", quote.symbol, e);
                            continue;
                        }
                    }
                }
            };

            let minutes = minutes_until(next_settlement, now);
            if min_minutes < minutes && minutes <= max_minutes {
                ranked.push(RankedSymbol::from(quote));
            } else {
                debug!(
                    "{} settles in {:.1} minutes, outside ({}, {}]",
                    quote.symbol, minutes, min_minutes, max_minutes
                );
            }
        }

        info!(
            "ranked {} of {} candidates: {}",
            ranked.len(),
            quotes.len(),
            ranked
                .iter()
                .map(|r| r.symbol.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        ranked
    }
}
