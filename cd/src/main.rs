//! The `cd` binary - runs the sweeper daemon or one-shot sweeps

use std::sync::Arc;

use clap::Parser;
use eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use choredaemon::cli::{Cli, Command, SweepCommand};
use choredaemon::config::Config;
use choredaemon::domain::{Store, StoreDirectory};
use choredaemon::service::ChoreService;
use choredaemon::settings::{Settings, SharedSettings};
use choredaemon::sweep::Sweeper;
use choredaemon::{HookBus, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref())?;

    let store = Arc::new(Store::open(&config.storage.path)?);
    let hooks = Arc::new(HookBus::new(config.hooks.capacity));
    let clock = Arc::new(SystemClock::new(config.clock.offset_secs()));
    let persons = Arc::new(StoreDirectory::new(Arc::clone(&store)));
    let settings = Arc::new(SharedSettings::new(Settings::from(&config.settings)));

    let service = Arc::new(ChoreService::new(
        store,
        hooks,
        clock,
        persons,
        settings,
        &config.locks,
    ));
    let sweeper = Arc::new(Sweeper::new(Arc::clone(&service), config.sweep.clone()));

    match cli.command {
        Command::Run => {
            info!("Starting choredaemon");
            sweeper.run().await;
        }
        Command::Sweep { kind } => match kind {
            SweepCommand::Daily { date } => {
                let date = date.unwrap_or_else(|| service.clock().local_date());
                let report = sweeper.run_daily(date).await?;
                println!(
                    "daily sweep {}: created={} overdue={} archived={} assigned={} blocked={} failures={}",
                    date,
                    report.created,
                    report.overdue_marked,
                    report.archived,
                    report.assigned,
                    report.blocked,
                    report.failures
                );
            }
            SweepCommand::Frequent => {
                let report = sweeper.run_frequent().await?;
                println!(
                    "frequent sweep: overdue={} assigned={} blocked={} failures={}",
                    report.overdue_marked, report.assigned, report.blocked, report.failures
                );
            }
        },
    }

    Ok(())
}
