//! Command-line interface for the dispatch optimizer.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod solve;

pub use error::CliError;
use solve::SolveArgs;

const ARG_TRIPS: &str = "trips";
const ARG_DRIVERS: &str = "drivers";
const ARG_OPTIMIZER_CONFIG: &str = "optimizer-config";
const ARG_REVENUE_TABLE: &str = "revenue-table";
const ARG_MERGE_TABLE: &str = "merge-table";
const ARG_OUTPUT: &str = "output";
const ARG_MILEAGE_OUTPUT: &str = "mileage-output";
const ARG_DATE: &str = "date";
const ARG_DRIVER_IDS: &str = "driver-ids";
const ARG_SPEED: &str = "speed";
const ARG_SEED: &str = "seed";
const ENV_TRIPS: &str = "DISPATCH_CMDS_SOLVE_TRIPS";
const ENV_DRIVERS: &str = "DISPATCH_CMDS_SOLVE_DRIVERS";

/// Run the dispatch CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when argument parsing, configuration layering,
/// input loading, the solve or report writing fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()?;
    match cli.command {
        Command::Solve(args) => solve::run_solve(*args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "dispatch",
    about = "Assign patient-transport trips to drivers for one day",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dispatch a day of trips and write the assignment report.
    Solve(Box<SolveArgs>),
}

#[cfg(test)]
mod tests;
