//! Per-tick phase decision and execution.
//!
//! Nothing is carried between ticks in memory: every tick re-derives its phase
//! from the wall clock and the settlement schedule, and the only hand-off
//! between ranking and collection is the snapshot cache on disk.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    cache::SnapshotCache,
    clock::{minutes_since, minutes_until, FundingSchedule},
    config::{Config, ConfigError, FundingConfig, PhaseWindows},
    error::CollectorError,
    fetcher,
    ranker::SymbolRanker,
    sink::CsvSink,
};
use exchanges::{FundingExchange, MexcClient};

/// What a tick at a given instant has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickPlan {
    /// Settlement to rank symbols for, when inside the ranking window.
    pub rank_target: Option<DateTime<Utc>>,
    /// Past settlements whose cached symbols are due for collection.
    pub collect_targets: Vec<DateTime<Utc>>,
}

/// Decides both phases for `now`. The two checks are independent; one tick
/// may rank for the next settlement and collect for an earlier one.
///
/// Ranking only targets a settlement that is itself inside the candidate
/// window, so a ranked set is never cached under a later settlement than the
/// one its symbols settle at.
pub fn plan_tick(
    now: DateTime<Utc>,
    windows: &PhaseWindows,
    schedule: &FundingSchedule,
) -> TickPlan {
    let minute = now.minute();
    let rank_target = if minute > windows.rank_after_minute && minute <= windows.rank_until_minute
    {
        schedule.next_upcoming(now).filter(|target| {
            let until = minutes_until(*target, now);
            windows.rank_min_minutes < until && until <= windows.rank_max_minutes
        })
    } else {
        None
    };

    // every instant is tested, the proximity order is only a hint
    let collect_targets = schedule
        .scheduled_instants(now)
        .into_iter()
        .filter(|t| {
            let since = minutes_since(*t, now);
            windows.collect_min_minutes <= since && since <= windows.collect_max_minutes
        })
        .collect();

    TickPlan {
        rank_target,
        collect_targets,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankOutcome {
    pub settlement: DateTime<Utc>,
    /// Symbols written to the cache; zero means nothing qualified.
    pub cached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOutcome {
    pub settlement: DateTime<Utc>,
    pub written: usize,
    /// Output already present from an earlier tick.
    pub skipped: usize,
    pub failed: usize,
}

impl CollectOutcome {
    fn new(settlement: DateTime<Utc>) -> Self {
        Self {
            settlement,
            written: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ranked: Option<RankOutcome>,
    pub collected: Vec<CollectOutcome>,
    pub expired: usize,
}

pub struct Collector {
    exchange: Arc<dyn FundingExchange>,
    cache: SnapshotCache,
    sink: CsvSink,
    config: FundingConfig,
    schedule: FundingSchedule,
}

impl Collector {
    pub fn new(
        exchange: Arc<dyn FundingExchange>,
        config: FundingConfig,
    ) -> Result<Self, CollectorError> {
        let schedule = config.schedule().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "no valid settlement hours in {:?}",
                config.settlement_hours
            ))
        })?;

        Ok(Self {
            cache: SnapshotCache::new(&config.cache_dir),
            sink: CsvSink::new(&config.output_dir),
            exchange,
            config,
            schedule,
        })
    }

    /// Collector talking to the live MEXC contract API.
    pub fn from_config(config: &Config) -> Result<Self, CollectorError> {
        let client = MexcClient::new(config.mexc.client_config())?;
        Self::new(Arc::new(client), config.funding.clone())
    }

    pub fn schedule(&self) -> &FundingSchedule {
        &self.schedule
    }

    pub fn plan(&self, now: DateTime<Utc>) -> TickPlan {
        plan_tick(now, &self.config.windows, &self.schedule)
    }

    /// Runs one tick at `now`.
    ///
    /// Fetch failures are logged and contained per symbol. Only a failure to
    /// persist the ranked set is returned, after any due collection and the
    /// cache expiry have run.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, CollectorError> {
        let plan = self.plan(now);
        debug!("tick at {}: {:?}", now.to_rfc3339(), plan);

        let mut report = TickReport::default();

        for settlement in &plan.collect_targets {
            report.collected.push(self.collect_settlement(*settlement).await);
        }

        let ranked = match plan.rank_target {
            Some(target) => Some(
                self.rank_settlement(target, now)
                    .await
                    .map(|cached| RankOutcome {
                        settlement: target,
                        cached,
                    }),
            ),
            None => None,
        };

        match self.cache.expire(self.config.cache_retention_hours, now) {
            Ok(n) => {
                if n > 0 {
                    info!("expired {} cache files", n);
                }
                report.expired = n;
            }
            Err(e) => warn!("cache expiry failed: {}", e),
        }

        report.ranked = ranked.transpose()?;
        Ok(report)
    }

    async fn rank_settlement(
        &self,
        target: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, CollectorError> {
        info!("ranking symbols for settlement {}", target.to_rfc3339());

        let universe = match self.exchange.list_tradable_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!("failed to list tradable symbols from {:?}: {}", self.exchange.id(), e);
                Vec::new()
            }
        };

        let windows = &self.config.windows;
        let ranker = SymbolRanker::new(
            self.exchange.as_ref(),
            Duration::from_millis(self.config.fallback_delay_ms),
        );
        let ranked = ranker
            .rank(
                &universe,
                self.config.top_n,
                windows.rank_min_minutes,
                windows.rank_max_minutes,
                now,
            )
            .await;

        if ranked.is_empty() {
            info!(
                "no symbol qualified for settlement {}, nothing cached",
                target.to_rfc3339()
            );
            return Ok(0);
        }

        let path = self.cache.store(&ranked, target)?;
        info!(
            "cached {} symbols for settlement {} at {}",
            ranked.len(),
            target.to_rfc3339(),
            path.display()
        );
        Ok(ranked.len())
    }

    async fn collect_settlement(&self, settlement: DateTime<Utc>) -> CollectOutcome {
        let mut outcome = CollectOutcome::new(settlement);

        let records = match self.cache.load(settlement) {
            Ok(records) => records,
            Err(e) => {
                error!(
                    "failed to load cached symbols for {}: {}",
                    settlement.to_rfc3339(),
                    e
                );
                return outcome;
            }
        };
        if records.is_empty() {
            info!(
                "no cached symbols for settlement {}, skipping collection",
                settlement.to_rfc3339()
            );
            return outcome;
        }

        for record in &records {
            if self.config.skip_existing_output && self.sink.exists(&record.symbol, settlement) {
                debug!("output for {} at {} already exists", record.symbol, settlement);
                outcome.skipped += 1;
                continue;
            }

            match fetcher::collect(
                self.exchange.as_ref(),
                &self.sink,
                &record.symbol,
                settlement,
                &self.config.time_windows,
                Some(record.funding_rate),
            )
            .await
            {
                Ok(_) => outcome.written += 1,
                Err(e) => {
                    error!("failed to collect snapshot for {}: {}", record.symbol, e);
                    outcome.failed += 1;
                }
            }
        }

        info!(
            "settlement {}: {} written, {} skipped, {} failed",
            settlement.to_rfc3339(),
            outcome.written,
            outcome.skipped,
            outcome.failed
        );
        outcome
    }
}
