use std::path::PathBuf;

use chrono::{DateTime, Utc};
use color_eyre::eyre;
use structopt::StructOpt;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use collector::{logger, Collector, Config};

#[derive(Debug, StructOpt)]
#[structopt(name = "collector", about = "MEXC funding settlement price collector")]
struct Opt {
    /// YAML config file; defaults apply when it does not exist
    #[structopt(
        long,
        env = "FUNDING_CONFIG",
        default_value = "config.yaml",
        parse(from_os_str)
    )]
    config: PathBuf,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Tick forever on the configured interval
    Run,
    /// Run a single tick and exit
    Once {
        /// Evaluate the tick as of this RFC 3339 instant instead of now
        #[structopt(long, parse(try_from_str = parse_instant))]
        at: Option<DateTime<Utc>>,
    },
    /// Print the upcoming settlement instants
    Schedule {
        #[structopt(long, default_value = "6")]
        count: usize,
    },
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    dotenv::dotenv().ok();

    let opt = Opt::from_args();
    let config = Config::load(&opt.config)?;
    config.validate()?;

    match opt.cmd {
        Command::Run => {
            let _guards = logger::init_tracing(&config.logging)?;
            run_loop(&config).await
        }
        Command::Once { at } => {
            let _guards = logger::init_tracing(&config.logging)?;
            run_once(&config, at.unwrap_or_else(Utc::now)).await
        }
        Command::Schedule { count } => print_schedule(&config, count),
    }
}

async fn run_loop(config: &Config) -> eyre::Result<()> {
    let collector = Collector::from_config(config)?;
    info!(
        "collector started: top {} symbols, settlement hours {:?}, {}s tick",
        config.funding.top_n,
        collector.schedule().hours(),
        config.funding.tick_interval_secs
    );

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // one bad tick must not stop the loop
                match collector.run_tick(Utc::now()).await {
                    Ok(report) => info!("tick done: {:?}", report),
                    Err(e) => error!("tick failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

async fn run_once(config: &Config, now: DateTime<Utc>) -> eyre::Result<()> {
    let collector = Collector::from_config(config)?;
    info!("single tick at {}: {:?}", now.to_rfc3339(), collector.plan(now));

    let report = collector.run_tick(now).await?;
    info!("tick done: {:?}", report);
    Ok(())
}

fn print_schedule(config: &Config, count: usize) -> eyre::Result<()> {
    let schedule = config
        .funding
        .schedule()
        .ok_or_else(|| eyre::eyre!("no valid settlement hours configured"))?;

    let now = Utc::now();
    let mut cursor = now;
    for _ in 0..count {
        let Some(next) = schedule.next_upcoming(cursor) else {
            break;
        };
        let minutes = collector::clock::minutes_until(next, now);
        println!("{}  (in {:.0} min)", next.to_rfc3339(), minutes);
        cursor = next;
    }
    Ok(())
}
