use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{KlineResponse, MexcClient, MexcResponse};
use crate::{sort_by_magnitude, FundingExchange};
use interface::{
    parse_epoch_ms, parse_number, ExchangeError, ExchangeId, FundingQuote, PriceHistory,
    Resolution,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractDetail {
    symbol: String,
    #[serde(default)]
    quote_coin: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingRateData {
    symbol: String,
    funding_rate: Value,
    #[serde(default)]
    next_settle_time: Value,
}

impl FundingRateData {
    fn into_quote(self) -> Result<FundingQuote, ExchangeError> {
        let funding_rate = parse_number(&self.funding_rate).ok_or_else(|| {
            ExchangeError::Other(format!(
                "invalid funding rate for {}: {}",
                self.symbol, self.funding_rate
            ))
        })?;

        Ok(FundingQuote {
            next_settlement: settlement_from_millis(&self.next_settle_time),
            symbol: self.symbol,
            funding_rate,
        })
    }
}

/// `nextSettleTime` of 0 (or absent) means the venue did not say.
fn settlement_from_millis(value: &Value) -> Option<DateTime<Utc>> {
    parse_epoch_ms(value)
        .filter(|ms| *ms > 0)
        .and_then(DateTime::from_timestamp_millis)
}

impl MexcClient {
    async fn fetch_funding_rate(&self, symbol: &str) -> Result<FundingQuote, ExchangeError> {
        let url = self.url(&format!("/api/v1/contract/funding_rate/{symbol}"));
        let resp: MexcResponse<FundingRateData> = self.get_json(&url, &[]).await?;
        resp.into_data()?.into_quote()
    }
}

#[async_trait]
impl FundingExchange for MexcClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Mexc
    }

    async fn list_tradable_symbols(&self) -> Result<Vec<String>, ExchangeError> {
        let url = self.url("/api/v1/contract/detail");
        let resp: MexcResponse<Vec<ContractDetail>> = self.get_json(&url, &[]).await?;

        let symbols: Vec<String> = resp
            .into_data()?
            .into_iter()
            .filter(|c| c.quote_coin == "USDT") // USDT-margined perps only
            .map(|c| c.symbol)
            .collect();

        debug!("fetched {} perpetual symbols", symbols.len());
        Ok(symbols)
    }

    async fn get_funding_rates(
        &self,
        symbols: &[String],
        top_n: usize,
    ) -> Result<Vec<FundingQuote>, ExchangeError> {
        let limit = self.config.max_concurrent_requests.max(1);
        let batches = symbols.len().div_ceil(limit);
        let mut quotes: Vec<FundingQuote> = Vec::with_capacity(symbols.len());

        for (i, batch) in symbols.chunks(limit).enumerate() {
            debug!(
                "funding rate batch {}/{} with {} symbols",
                i + 1,
                batches,
                batch.len()
            );

            let results: Vec<Option<FundingQuote>> = stream::iter(batch.iter().cloned())
                .map(|symbol| async move {
                    match self.fetch_funding_rate(&symbol).await {
                        Ok(q) => Some(q),
                        Err(e) => {
                            warn!("failed to fetch funding rate for {}: {}", symbol, e);
                            None
                        }
                    }
                })
                .buffer_unordered(limit)
                .collect()
                .await;
            quotes.extend(results.into_iter().flatten());

            // rate limit between batches
            if i + 1 < batches {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        if quotes.is_empty() && !symbols.is_empty() {
            return Err(ExchangeError::Other(format!(
                "all {} funding rate lookups failed",
                symbols.len()
            )));
        }

        sort_by_magnitude(&mut quotes);
        quotes.truncate(top_n);
        Ok(quotes)
    }

    async fn get_next_settlement(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, ExchangeError> {
        Ok(self.fetch_funding_rate(symbol).await?.next_settlement)
    }

    async fn get_price_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        start: i64,
        end: i64,
    ) -> Result<PriceHistory, ExchangeError> {
        let url = self.url(&format!("/api/v1/contract/kline/{symbol}"));
        let query = [
            ("interval", resolution.interval().to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
        ];
        let resp: KlineResponse = self.get_json(&url, &query).await?;
        resp.into_history()
    }
}
