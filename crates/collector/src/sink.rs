//! CSV output of collected price history, one file per symbol and settlement.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::info;

use interface::{PriceBar, Resolution};

const HEADER: [&str; 9] = [
    "Symbol",
    "FundingTime",
    "Interval",
    "Timestamp",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
];

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("bar timestamp out of range: {0} ms")]
    Timestamp(i64),
}

#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str, settlement: DateTime<Utc>) -> PathBuf {
        let symbol: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!(
            "funding_data_{}_{}.csv",
            symbol,
            settlement.format("%Y-%m-%d_%H-%M")
        ))
    }

    pub fn exists(&self, symbol: &str, settlement: DateTime<Utc>) -> bool {
        self.path_for(symbol, settlement).exists()
    }

    /// Writes every bar of every resolution, in the given order, replacing
    /// any earlier file for the same symbol and settlement.
    pub fn write(
        &self,
        symbol: &str,
        settlement: DateTime<Utc>,
        rows: &[(Resolution, Vec<PriceBar>)],
    ) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.dir).map_err(|source| SinkError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(symbol, settlement);
        let tmp = path.with_extension("csv.tmp");

        let written = match write_rows(&tmp, symbol, settlement, rows) {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };

        fs::rename(&tmp, &path).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;

        info!("wrote {} bars for {} to {}", written, symbol, path.display());
        Ok(path)
    }
}

fn write_rows(
    tmp: &Path,
    symbol: &str,
    settlement: DateTime<Utc>,
    rows: &[(Resolution, Vec<PriceBar>)],
) -> Result<usize, SinkError> {
    let funding_time = iso(settlement);
    let mut written = 0usize;

    let mut writer = csv::Writer::from_path(tmp)?;
    writer.write_record(HEADER)?;

    for (resolution, bars) in rows {
        for bar in bars {
            writer.write_record([
                symbol.to_string(),
                funding_time.clone(),
                resolution.label().to_string(),
                bar_time(bar.open_time_ms)?,
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])?;
            written += 1;
        }
    }
    writer.flush().map_err(|source| SinkError::Io {
        path: tmp.to_path_buf(),
        source,
    })?;
    Ok(written)
}

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn bar_time(ms: i64) -> Result<String, SinkError> {
    DateTime::from_timestamp(ms.div_euclid(1000), 0)
        .map(iso)
        .ok_or(SinkError::Timestamp(ms))
}
