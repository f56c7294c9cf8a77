//! Command-line interface for the `cd` binary

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Household chore scheduling and points daemon
#[derive(Debug, Parser)]
#[command(name = "cd", version, about)]
pub struct Cli {
    /// Path to a config file (default: fallback chain)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sweeper daemon
    Run,

    /// Run a sweep once and exit
    Sweep {
        #[command(subcommand)]
        kind: SweepCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum SweepCommand {
    /// The once-per-day sweep (claim reset, overdue, archival, creation)
    Daily {
        /// Local date to sweep for (default: today)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },

    /// The distribution sweep (overdue recheck + pool assignment)
    Frequent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sweep_daily_with_date() {
        let cli = Cli::parse_from(["cd", "sweep", "daily", "--date", "2026-03-01"]);
        match cli.command {
            Command::Sweep {
                kind: SweepCommand::Daily { date },
            } => {
                assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2026, 3, 1));
            }
            _ => panic!("Expected sweep daily"),
        }
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["cd", "run"]);
        assert!(matches!(cli.command, Command::Run));
    }
}
