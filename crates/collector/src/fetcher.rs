use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{config::TimeframeWindows, error::CollectorError, sink::CsvSink};
use exchanges::FundingExchange;
use interface::{PriceBar, Resolution};

/// One price-history request, bounds in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarRequest {
    pub resolution: Resolution,
    pub start: i64,
    pub end: i64,
}

/// The four requests around a settlement at `settlement_ts` (epoch seconds):
/// daily, hourly and short bars up to the settlement, minute bars on both
/// sides of it.
pub fn plan_requests(settlement_ts: i64, windows: &TimeframeWindows) -> [BarRequest; 4] {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    [
        BarRequest {
            resolution: Resolution::Day1,
            start: settlement_ts - windows.daily_days_back * DAY,
            end: settlement_ts,
        },
        BarRequest {
            resolution: Resolution::Hour1,
            start: settlement_ts - windows.hourly_hours_back * HOUR,
            end: settlement_ts,
        },
        BarRequest {
            resolution: windows.short_interval,
            start: settlement_ts - windows.short_hours_back * HOUR,
            end: settlement_ts,
        },
        BarRequest {
            resolution: Resolution::Min1,
            start: settlement_ts - windows.one_min_minutes_before * MINUTE,
            end: settlement_ts + windows.one_min_minutes_after * MINUTE,
        },
    ]
}

/// Fetches every planned resolution for `symbol` and hands the bars to the
/// sink. A failed resolution is logged and written as empty. When every
/// resolution fails nothing is written and the last fetch error is returned,
/// so a later tick can retry; a sink failure is returned as well.
pub async fn collect(
    exchange: &dyn FundingExchange,
    sink: &CsvSink,
    symbol: &str,
    settlement: DateTime<Utc>,
    windows: &TimeframeWindows,
    funding_rate: Option<f64>,
) -> Result<PathBuf, CollectorError> {
    info!(
        "collecting {} around {} (funding rate {:?})",
        symbol,
        settlement.to_rfc3339(),
        funding_rate
    );

    let mut rows: Vec<(Resolution, Vec<PriceBar>)> = Vec::with_capacity(4);
    let mut failed = 0usize;
    let mut last_error = None;
    for req in plan_requests(settlement.timestamp(), windows) {
        debug!(
            "fetching {} candles for {}: {} to {}",
            req.resolution, symbol, req.start, req.end
        );
        let bars = match exchange
            .get_price_history(symbol, req.resolution, req.start, req.end)
            .await
        {
            Ok(history) => history.into_bars(),
            Err(e) => {
                warn!(
                    "failed to fetch {} candles for {}: {}",
                    req.resolution, symbol, e
                );
                failed += 1;
                last_error = Some(e);
                Vec::new()
            }
        };
        debug!("fetched {} {} candles", bars.len(), req.resolution);
        rows.push((req.resolution, bars));
    }

    if let Some(e) = last_error {
        if failed == rows.len() {
            return Err(e.into());
        }
    }

    Ok(sink.write(symbol, settlement, &rows)?)
}
