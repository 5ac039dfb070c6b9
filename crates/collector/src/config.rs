//! YAML configuration for the collector.
//!
//! Every key is optional; a missing file yields the defaults below.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::clock::FundingSchedule;
use exchanges::MexcConfig;
use interface::Resolution;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mexc: MexcSection,
    pub funding: FundingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MexcSection {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub batch_delay_ms: u64,
}

impl Default for MexcSection {
    fn default() -> Self {
        let defaults = MexcConfig::default();
        Self {
            base_url: defaults.base_url,
            timeout_secs: defaults.timeout.as_secs(),
            max_concurrent_requests: defaults.max_concurrent_requests,
            batch_delay_ms: defaults.batch_delay.as_millis() as u64,
        }
    }
}

impl MexcSection {
    pub fn client_config(&self) -> MexcConfig {
        MexcConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_concurrent_requests: self.max_concurrent_requests,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    /// Size of the ranked symbol set cached per settlement.
    pub top_n: usize,
    /// UTC hours of the daily settlement cycle.
    pub settlement_hours: Vec<u32>,
    pub tick_interval_secs: u64,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_retention_hours: i64,
    /// Skip symbols whose snapshot file for a settlement already exists.
    pub skip_existing_output: bool,
    /// Spacing of per-symbol next-settlement fallback lookups.
    pub fallback_delay_ms: u64,
    pub windows: PhaseWindows,
    pub time_windows: TimeframeWindows,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            settlement_hours: (0..24).collect(),
            tick_interval_secs: 300,
            cache_dir: PathBuf::from("cache/funding_rates"),
            output_dir: PathBuf::from("data"),
            cache_retention_hours: 24,
            skip_existing_output: true,
            fallback_delay_ms: 100,
            windows: PhaseWindows::default(),
            time_windows: TimeframeWindows::default(),
        }
    }
}

impl FundingConfig {
    pub fn schedule(&self) -> Option<FundingSchedule> {
        FundingSchedule::new(self.settlement_hours.iter().copied())
    }
}

/// Minute bounds of the ranking and collection phases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhaseWindows {
    /// Ranking runs when minute-of-hour is in `(rank_after_minute, rank_until_minute]`.
    pub rank_after_minute: u32,
    pub rank_until_minute: u32,
    /// Candidates need their next settlement in `(rank_min_minutes, rank_max_minutes]`.
    pub rank_min_minutes: f64,
    pub rank_max_minutes: f64,
    /// Collection runs for settlements `[collect_min_minutes, collect_max_minutes]` in the past.
    pub collect_min_minutes: f64,
    pub collect_max_minutes: f64,
}

impl Default for PhaseWindows {
    fn default() -> Self {
        Self {
            rank_after_minute: 30,
            rank_until_minute: 45,
            rank_min_minutes: 15.0,
            rank_max_minutes: 30.0,
            collect_min_minutes: 15.0,
            collect_max_minutes: 30.0,
        }
    }
}

/// Look-back and look-forward offsets of the four price-history requests.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimeframeWindows {
    pub daily_days_back: i64,
    pub hourly_hours_back: i64,
    pub short_interval: Resolution,
    pub short_hours_back: i64,
    pub one_min_minutes_before: i64,
    pub one_min_minutes_after: i64,
}

impl Default for TimeframeWindows {
    fn default() -> Self {
        Self {
            daily_days_back: 3,
            hourly_hours_back: 4,
            short_interval: Resolution::Min10,
            short_hours_back: 1,
            one_min_minutes_before: 10,
            one_min_minutes_after: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub file_prefix: String,
    /// Default stdout filter when `RUST_LOG` is unset.
    pub level: String,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            file_prefix: "funding".to_string(),
            level: "info".to_string(),
            file_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if reqwest::Url::parse(&self.mexc.base_url).is_err() {
            return invalid(format!("mexc.base_url is not a URL: {:?}", self.mexc.base_url));
        }
        if self.mexc.timeout_secs == 0 {
            return invalid("mexc.timeout_secs must be positive".to_string());
        }
        if self.mexc.max_concurrent_requests == 0 {
            return invalid("mexc.max_concurrent_requests must be positive".to_string());
        }

        let f = &self.funding;
        if f.top_n == 0 {
            return invalid("funding.top_n must be positive".to_string());
        }
        if f.tick_interval_secs == 0 {
            return invalid("funding.tick_interval_secs must be positive".to_string());
        }
        if f.settlement_hours.iter().any(|h| *h > 23) || f.schedule().is_none() {
            return invalid(format!(
                "funding.settlement_hours must be UTC hours 0-23: {:?}",
                f.settlement_hours
            ));
        }
        if f.cache_retention_hours <= 0 {
            return invalid("funding.cache_retention_hours must be positive".to_string());
        }

        let w = &f.windows;
        if w.rank_after_minute >= w.rank_until_minute || w.rank_until_minute > 59 {
            return invalid(format!(
                "funding.windows ranking minutes ({}, {}] are not a valid range",
                w.rank_after_minute, w.rank_until_minute
            ));
        }
        if !(w.rank_min_minutes < w.rank_max_minutes) {
            return invalid("funding.windows rank_min_minutes must be below rank_max_minutes".to_string());
        }
        if !(w.collect_min_minutes <= w.collect_max_minutes) {
            return invalid(
                "funding.windows collect_min_minutes must not exceed collect_max_minutes".to_string(),
            );
        }

        let t = &f.time_windows;
        if !matches!(t.short_interval, Resolution::Min5 | Resolution::Min10) {
            return invalid(format!(
                "funding.time_windows.short_interval must be Min5 or Min10, got {:?}",
                t.short_interval
            ));
        }
        if [
            t.daily_days_back,
            t.hourly_hours_back,
            t.short_hours_back,
            t.one_min_minutes_before,
            t.one_min_minutes_after,
        ]
        .iter()
        .any(|v| *v < 0)
        {
            return invalid("funding.time_windows offsets must not be negative".to_string());
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.funding.tick_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.funding.top_n, 3);
        assert_eq!(config.funding.settlement_hours.len(), 24);
        assert_eq!(config.mexc.timeout_secs, 10);
        assert_eq!(config.mexc.max_concurrent_requests, 10);
        assert_eq!(config.mexc.batch_delay_ms, 1000);
        assert_eq!(config.funding.windows, PhaseWindows::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
mexc:
  base_url: https://contract.mexc.com
funding:
  top_n: 5
  time_windows:
    short_interval: Min5
    hourly_hours_back: 8
"#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.funding.top_n, 5);
        assert_eq!(config.funding.time_windows.short_interval, Resolution::Min5);
        assert_eq!(config.funding.time_windows.hourly_hours_back, 8);
        assert_eq!(config.funding.time_windows.daily_days_back, 3);
        assert_eq!(config.funding.cache_retention_hours, 24);
        assert_eq!(config.logging.file_prefix, "funding");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.funding.top_n, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.mexc.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.funding.windows.rank_after_minute = 45;
        config.funding.windows.rank_until_minute = 30;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.funding.time_windows.short_interval = Resolution::Hour1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.funding.settlement_hours = vec![0, 24];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            Config::from_yaml("funding: [1, 2"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
