use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize};

use interface::{ExchangeError, PriceHistory};

mod perp;

pub const DEFAULT_BASE_URL: &str = "https://contract.mexc.com";

/// Connection settings for the MEXC contract market.
#[derive(Debug, Clone)]
pub struct MexcConfig {
    pub base_url: String,
    /// Upper bound for every single request.
    pub timeout: Duration,
    /// In-flight funding-rate requests per batch.
    pub max_concurrent_requests: usize,
    /// Pause between funding-rate batches.
    pub batch_delay: Duration,
}

impl Default for MexcConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_concurrent_requests: 10,
            batch_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct MexcClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: MexcConfig,
}

impl MexcClient {
    pub fn new(config: MexcConfig) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MexcConfig {
        &self.config
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        tracing::debug!("GET {} {:?}", url, query);
        let body = self
            .http
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }
}

/// `{success, code, message, data}` wrapper used by every contract endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct MexcResponse<T> {
    success: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> MexcResponse<T> {
    pub(crate) fn into_data(self) -> Result<T, ExchangeError> {
        if !self.success {
            return Err(ExchangeError::Api {
                code: self.code,
                message: self
                    .message
                    .unwrap_or_else(|| "No error message provided".to_string()),
            });
        }
        self.data
            .ok_or_else(|| ExchangeError::Other("response carried no data".to_string()))
    }
}

/// Kline responses arrive either wrapped or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum KlineResponse {
    Envelope(MexcResponse<PriceHistory>),
    Bare(PriceHistory),
}

impl KlineResponse {
    pub(crate) fn into_history(self) -> Result<PriceHistory, ExchangeError> {
        match self {
            KlineResponse::Envelope(resp) => resp.into_data(),
            KlineResponse::Bare(history) => Ok(history),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_becomes_api_error() {
        let resp: MexcResponse<Vec<String>> =
            serde_json::from_str(r#"{"success":false,"code":1001,"message":"contract not exists"}"#)
                .unwrap();
        match resp.into_data() {
            Err(ExchangeError::Api { code, message }) => {
                assert_eq!(code, 1001);
                assert_eq!(message, "contract not exists");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_kline_envelope_and_bare_shapes() {
        let wrapped: KlineResponse = serde_json::from_str(
            r#"{"success":true,"code":0,"data":{"time":[1700000000],"open":[1.0],"high":[2.0],"low":[0.5],"close":[1.5],"vol":[10.0]}}"#,
        )
        .unwrap();
        let bars = wrapped.into_history().unwrap().into_bars();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open_time_ms, 1_700_000_000_000);

        let bare: KlineResponse =
            serde_json::from_str(r#"[[1700000000000, 1.0, 2.0, 0.5, 1.5, 10.0]]"#).unwrap();
        assert_eq!(bare.into_history().unwrap().into_bars().len(), 1);

        let bare_columnar: KlineResponse = serde_json::from_str(
            r#"{"time":[1700000000],"open":[1.0],"high":[2.0],"low":[0.5],"close":[1.5],"vol":[10.0]}"#,
        )
        .unwrap();
        assert_eq!(bare_columnar.into_history().unwrap().into_bars().len(), 1);
    }

    #[test]
    fn test_kline_error_envelope() {
        let resp: KlineResponse =
            serde_json::from_str(r#"{"success":false,"code":510,"message":"too frequent"}"#)
                .unwrap();
        assert!(matches!(
            resp.into_history(),
            Err(ExchangeError::Api { code: 510, .. })
        ));
    }

    #[test]
    fn test_url_joins_base_without_double_slash() {
        let client = MexcClient::new(MexcConfig {
            base_url: "https://contract.mexc.com/".to_string(),
            ..MexcConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/api/v1/contract/detail"),
            "https://contract.mexc.com/api/v1/contract/detail"
        );
    }
}
