pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logger;
pub mod orchestrator;
pub mod ranker;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::SnapshotCache;
pub use clock::FundingSchedule;
pub use config::Config;
pub use error::CollectorError;
pub use orchestrator::{Collector, TickPlan, TickReport};
pub use sink::CsvSink;
