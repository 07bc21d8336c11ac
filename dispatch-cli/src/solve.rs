//! Solve command implementation for the dispatch CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use clap::Parser;
use dispatch_core::roster::select_roster;
use dispatch_core::{MipBackend, OptimizerConfig};
use dispatch_data::routing::{DEFAULT_SPEED_MPH, HaversineTravelCost};
use dispatch_data::{
    AddressBook, DriverRecord, MergeTable, RevenueTable, TripRecord, driver_pool, load_records,
    prepare_trips, save_assignments, save_mileage,
};
use dispatch_model::{DispatchPlan, Optimizer};
use dispatch_solver_lp::LpBackend;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATE, ARG_DRIVER_IDS, ARG_DRIVERS, ARG_MERGE_TABLE, ARG_MILEAGE_OUTPUT,
    ARG_OPTIMIZER_CONFIG, ARG_OUTPUT, ARG_REVENUE_TABLE, ARG_SEED, ARG_SPEED, ARG_TRIPS,
    CliError, ENV_DRIVERS, ENV_TRIPS,
};

/// Format of the `--date` flag.
pub(crate) const DATE_FORMAT: &str = "%m-%d-%Y";
/// Report written when no `--output` is configured.
pub(crate) const DEFAULT_OUTPUT: &str = "assignments.csv";

/// CLI arguments for the `solve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Dispatch one day of patient-transport trips. Trips and \
                 drivers are read from JSON, optional revenue and merge \
                 tables from CSV, and the assignments are written as CSV. \
                 Paths can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Assign drivers to a day of trips"
)]
#[ortho_config(prefix = "DISPATCH")]
pub(crate) struct SolveArgs {
    /// JSON file of trip records.
    #[arg(long = ARG_TRIPS, value_name = "path")]
    #[serde(default)]
    pub(crate) trips: Option<Utf8PathBuf>,
    /// JSON file of driver records.
    #[arg(long = ARG_DRIVERS, value_name = "path")]
    #[serde(default)]
    pub(crate) drivers: Option<Utf8PathBuf>,
    /// JSON file of optimizer parameters; defaults apply when omitted.
    #[arg(long = ARG_OPTIMIZER_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) optimizer_config: Option<Utf8PathBuf>,
    /// CSV revenue rates used to price trips without a quoted revenue.
    #[arg(long = ARG_REVENUE_TABLE, value_name = "path")]
    #[serde(default)]
    pub(crate) revenue_table: Option<Utf8PathBuf>,
    /// CSV of merge addresses and their waiting windows.
    #[arg(long = ARG_MERGE_TABLE, value_name = "path")]
    #[serde(default)]
    pub(crate) merge_table: Option<Utf8PathBuf>,
    /// Where to write the assignment report (default `assignments.csv`).
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Where to write per-driver mileage, if wanted.
    #[arg(long = ARG_MILEAGE_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) mileage_output: Option<Utf8PathBuf>,
    /// Run date as MM-DD-YYYY; defaults to today.
    #[arg(long = ARG_DATE, value_name = "MM-DD-YYYY")]
    #[serde(default)]
    pub(crate) date: Option<String>,
    /// Drivers working the day; every available driver when omitted.
    #[arg(long = ARG_DRIVER_IDS, value_name = "id", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) driver_ids: Option<Vec<u32>>,
    /// Assumed average driving speed in miles per hour (default 50).
    #[arg(long = ARG_SPEED, value_name = "mph")]
    #[serde(default)]
    pub(crate) speed: Option<f64>,
    /// Seed for early-duty selection, overriding the optimizer config.
    #[arg(long = ARG_SEED, value_name = "seed")]
    #[serde(default)]
    pub(crate) seed: Option<u64>,
}

impl SolveArgs {
    pub(crate) fn into_config(self) -> Result<SolveConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SolveConfig::try_from(merged)
    }
}

/// Resolved `solve` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SolveConfig {
    pub(crate) trips: Utf8PathBuf,
    pub(crate) drivers: Utf8PathBuf,
    pub(crate) optimizer_config: Option<Utf8PathBuf>,
    pub(crate) revenue_table: Option<Utf8PathBuf>,
    pub(crate) merge_table: Option<Utf8PathBuf>,
    pub(crate) output: Utf8PathBuf,
    pub(crate) mileage_output: Option<Utf8PathBuf>,
    pub(crate) date: NaiveDate,
    /// Requested roster; empty means every available driver.
    pub(crate) driver_ids: Vec<u32>,
    pub(crate) travel: HaversineTravelCost,
    pub(crate) seed: Option<u64>,
}

impl SolveConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.trips, ARG_TRIPS)?;
        Self::require_existing(&self.drivers, ARG_DRIVERS)?;
        let optional = [
            (self.optimizer_config.as_deref(), ARG_OPTIMIZER_CONFIG),
            (self.revenue_table.as_deref(), ARG_REVENUE_TABLE),
            (self.merge_table.as_deref(), ARG_MERGE_TABLE),
        ];
        for (candidate, field) in optional {
            if let Some(path) = candidate {
                Self::require_existing(path, field)?;
            }
        }
        Self::require_output_dir(&self.output, ARG_OUTPUT)?;
        if let Some(path) = &self.mileage_output {
            Self::require_output_dir(path, ARG_MILEAGE_OUTPUT)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match dispatch_fs::is_regular_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Missing directories are created when the report is written.
    fn require_output_dir(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Ok(());
        };
        match dispatch_fs::is_directory(parent) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::OutputDirectoryNotDirectory {
                path: parent.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<SolveArgs> for SolveConfig {
    type Error = CliError;

    fn try_from(args: SolveArgs) -> Result<Self, Self::Error> {
        let trips = args.trips.ok_or(CliError::MissingArgument {
            field: ARG_TRIPS,
            env: ENV_TRIPS,
        })?;
        let drivers = args.drivers.ok_or(CliError::MissingArgument {
            field: ARG_DRIVERS,
            env: ENV_DRIVERS,
        })?;
        let date = args
            .date
            .as_deref()
            .map_or_else(|| Ok(chrono::Local::now().date_naive()), parse_date)?;
        let travel = HaversineTravelCost::new(args.speed.unwrap_or(DEFAULT_SPEED_MPH))?;

        Ok(Self {
            trips,
            drivers,
            optimizer_config: args.optimizer_config,
            revenue_table: args.revenue_table,
            merge_table: args.merge_table,
            output: args
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT)),
            mileage_output: args.mileage_output,
            date,
            driver_ids: args.driver_ids.unwrap_or_default(),
            travel,
            seed: args.seed,
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|source| CliError::InvalidDate {
        value: raw.to_owned(),
        source,
    })
}

/// What a solve run produced, printed as JSON once the report is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RunSummary {
    pub(crate) date: NaiveDate,
    pub(crate) output: Utf8PathBuf,
    pub(crate) drivers: usize,
    pub(crate) assignments: usize,
    pub(crate) rejected: Vec<String>,
    pub(crate) attempts: u32,
    pub(crate) early_day_relaxed: bool,
    pub(crate) objective: Option<f64>,
    pub(crate) inconsistencies: usize,
    pub(crate) total_miles: f64,
    pub(crate) total_revenue: f64,
}

impl RunSummary {
    fn new(config: &SolveConfig, drivers: usize, plan: &DispatchPlan) -> Self {
        Self {
            date: config.date,
            output: config.output.clone(),
            drivers,
            assignments: plan.records.len(),
            rejected: plan
                .rejected
                .iter()
                .map(|rejected| rejected.trip_id.clone())
                .collect(),
            attempts: plan.attempts,
            early_day_relaxed: plan.early_day_relaxed,
            objective: plan.objective,
            inconsistencies: plan.inconsistencies,
            total_miles: plan.mileage.iter().map(|entry| entry.miles).sum(),
            total_revenue: plan.records.iter().map(|record| record.revenue).sum(),
        }
    }
}

pub(super) fn run_solve(args: SolveArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    let mut backend = LpBackend::new();
    run_solve_with(args, &mut backend, &mut stdout)
}

pub(super) fn run_solve_with<B: MipBackend>(
    args: SolveArgs,
    backend: &mut B,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let summary = execute_solve(args, backend)?;
    write_summary(writer, &summary)
}

fn execute_solve<B: MipBackend>(
    args: SolveArgs,
    backend: &mut B,
) -> Result<RunSummary, CliError> {
    let config = resolve_solve_config(args)?;
    let optimizer_config =
        load_optimizer_config(config.optimizer_config.as_deref(), config.seed)?;

    let trips: Vec<TripRecord> = load_records(&config.trips)?;
    let drivers: Vec<DriverRecord> = load_records(&config.drivers)?;
    let merges = config
        .merge_table
        .as_deref()
        .map(MergeTable::load)
        .transpose()?
        .unwrap_or_default();
    let revenue = config
        .revenue_table
        .as_deref()
        .map(RevenueTable::load)
        .transpose()?;

    let prepared = prepare_trips(&trips, &merges, revenue.as_ref(), &config.travel)?;
    let roster = select_roster(
        &driver_pool(&drivers),
        &config.driver_ids,
        config.date,
        optimizer_config.seed,
    )?;
    let book = AddressBook::from_records(&trips, &drivers)?;
    log::info!(
        "dispatching {} trips across {} drivers for {}",
        prepared.trips.len(),
        roster.len(),
        config.date
    );

    let plan = Optimizer::new(&optimizer_config, book, config.travel).run(
        &prepared.trips,
        &roster,
        config.date,
        backend,
    )?;
    save_assignments(&config.output, &plan.records)?;
    if let Some(path) = &config.mileage_output {
        save_mileage(path, &plan.mileage)?;
    }
    Ok(RunSummary::new(&config, roster.len(), &plan))
}

fn resolve_solve_config(args: SolveArgs) -> Result<SolveConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Load optimizer parameters from `path`, or the defaults, and validate
/// them after applying `seed_override`.
pub(super) fn load_optimizer_config(
    path: Option<&Utf8Path>,
    seed_override: Option<u64>,
) -> Result<OptimizerConfig, CliError> {
    let mut config = path
        .map(read_optimizer_config)
        .transpose()?
        .unwrap_or_default();
    if let Some(seed) = seed_override {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn read_optimizer_config(path: &Utf8Path) -> Result<OptimizerConfig, CliError> {
    let payload =
        dispatch_fs::read_input(path).map_err(|source| CliError::ReadOptimizerConfig {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&payload).map_err(|source| CliError::ParseOptimizerConfig {
        path: path.to_path_buf(),
        source,
    })
}

fn write_summary(writer: &mut dyn Write, summary: &RunSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerializeSummary)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteSummary)?;
    writer.write_all(b"\n").map_err(CliError::WriteSummary)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SolveConfig, CliError> {
    let merged = SolveArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SolveConfig::try_from(merged)
}
