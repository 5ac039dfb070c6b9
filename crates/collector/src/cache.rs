//! On-disk hand-off between the ranking and collection phases.
//!
//! One file per settlement instant, `top3symbols_<iso instant>.txt` with the
//! colons of the timestamp replaced by hyphens. Each line is
//! `SYMBOL,FUNDING_RATE`; older files carry a bare `SYMBOL` per line.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use interface::RankedSymbol;

const FILE_PREFIX: &str = "top3symbols_";
const FILE_SUFFIX: &str = ".txt";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", file_stamp(key)))
    }

    /// Writes the ranked set for `key`, replacing any earlier file.
    pub fn store(
        &self,
        records: &[RankedSymbol],
        key: DateTime<Utc>,
    ) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let path = self.path_for(key);
        let body: String = records
            .iter()
            .map(|r| format!("{},{}\n", r.symbol, r.funding_rate))
            .collect();

        // readers never see a half-written file
        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, body).map_err(io_err(&tmp))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(&path)(e));
        }

        debug!("cached {} symbols at {}", records.len(), path.display());
        Ok(path)
    }

    /// Ranked set stored for `key`; empty when nothing was cached.
    pub fn load(&self, key: DateTime<Utc>) -> Result<Vec<RankedSymbol>, CacheError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&path)(e)),
        };

        let mut out = Vec::new();
        for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let record = match line.split_once(',') {
                Some((symbol, rate)) => match rate.trim().parse::<f64>() {
                    Ok(funding_rate) => RankedSymbol {
                        symbol: symbol.trim().to_string(),
                        funding_rate,
                    },
                    Err(_) => {
                        warn!("skipping malformed cache line {:?} in {}", line, path.display());
                        continue;
                    }
                },
                None => RankedSymbol {
                    symbol: line.to_string(),
                    funding_rate: 0.0,
                },
            };
            if record.symbol.is_empty() {
                continue;
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Deletes cache files whose settlement instant is more than
    /// `max_age_hours` before `now`. Files with an unparseable name are left
    /// alone. Returns the number of files removed.
    pub fn expire(&self, max_age_hours: i64, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_err(&self.dir)(e)),
        };

        let cutoff = now - Duration::hours(max_age_hours);
        let mut removed = 0;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(stamp) = name.to_str().and_then(parse_file_name) else {
                continue;
            };
            if stamp >= cutoff {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("expired cache file {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => warn!("failed to remove {}: {}", entry.path().display(), e),
            }
        }
        Ok(removed)
    }
}

/// `2025-08-02T16:00:00+00:00` -> `2025-08-02T16-00-00+00-00`
fn file_stamp(key: DateTime<Utc>) -> String {
    key.format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
        .replace(':', "-")
}

fn parse_file_name(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    let naive = NaiveDateTime::parse_from_str(stamp.get(..19)?, "%Y-%m-%dT%H-%M-%S").ok()?;
    let offset = parse_offset_secs(stamp.get(19..)?)?;
    Some(DateTime::from_naive_utc_and_offset(
        naive - Duration::seconds(offset),
        Utc,
    ))
}

/// `+HH-MM` / `-HH-MM` / `Z` / empty
fn parse_offset_secs(s: &str) -> Option<i64> {
    if s.is_empty() || s == "Z" {
        return Some(0);
    }
    let sign = match s.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let (h, m) = s[1..].split_once('-')?;
    let h: i64 = h.parse().ok()?;
    let m: i64 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(sign * (h * 3600 + m * 60))
}
