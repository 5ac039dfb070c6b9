use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Epoch values below this are seconds, anything above is milliseconds.
const SECONDS_CUTOFF: i64 = 100_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Columnar kline payload: parallel arrays keyed by field name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnarBars {
    #[serde(default)]
    pub time: Vec<Value>,
    #[serde(default)]
    pub open: Vec<Value>,
    #[serde(default)]
    pub high: Vec<Value>,
    #[serde(default)]
    pub low: Vec<Value>,
    #[serde(default)]
    pub close: Vec<Value>,
    #[serde(default, alias = "volume")]
    pub vol: Vec<Value>,
}

/// Price history in whichever shape the exchange answered with.
// Rows must be tried first: a derived struct also accepts a JSON array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceHistory {
    /// `[open_time, open, high, low, close, volume]` per row.
    Rows(Vec<Vec<Value>>),
    Columnar(ColumnarBars),
}

impl PriceHistory {
    pub fn empty() -> Self {
        PriceHistory::Rows(Vec::new())
    }

    /// Normalizes either shape into row-oriented bars, keeping the exchange's
    /// order. Rows with a missing or unparseable cell are dropped.
    pub fn into_bars(self) -> Vec<PriceBar> {
        match self {
            PriceHistory::Columnar(c) => (0..c.time.len())
                .filter_map(|i| {
                    Some(PriceBar {
                        open_time_ms: parse_epoch_ms(c.time.get(i)?)?,
                        open: parse_number(c.open.get(i)?)?,
                        high: parse_number(c.high.get(i)?)?,
                        low: parse_number(c.low.get(i)?)?,
                        close: parse_number(c.close.get(i)?)?,
                        volume: parse_number(c.vol.get(i)?)?,
                    })
                })
                .collect(),
            PriceHistory::Rows(rows) => rows
                .iter()
                .filter_map(|row| {
                    if row.len() < 6 {
                        return None;
                    }
                    Some(PriceBar {
                        open_time_ms: parse_epoch_ms(&row[0])?,
                        open: parse_number(&row[1])?,
                        high: parse_number(&row[2])?,
                        low: parse_number(&row[3])?,
                        close: parse_number(&row[4])?,
                        volume: parse_number(&row[5])?,
                    })
                })
                .collect(),
        }
    }
}

/// Reads a finite decimal from a JSON number or numeric string.
pub fn parse_number(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Reads an epoch timestamp (number or numeric string) as milliseconds.
/// Values outside the representable date range are rejected.
pub fn parse_epoch_ms(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => match n.as_i64() {
            Some(v) => v,
            None => n.as_f64().filter(|v| v.is_finite())? as i64,
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => v,
                Err(_) => s.parse::<f64>().ok().filter(|v| v.is_finite())? as i64,
            }
        }
        _ => return None,
    };

    let ms = if raw.abs() < SECONDS_CUTOFF {
        raw.checked_mul(1000)?
    } else {
        raw
    };
    DateTime::from_timestamp_millis(ms).map(|_| ms)
}
