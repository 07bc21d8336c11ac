//! Error types emitted by the dispatch CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use dispatch_core::{ConfigError, RosterError};
use dispatch_data::geocode::ConflictingCoordinate;
use dispatch_data::routing::InvalidSpeed;
use dispatch_data::{InputError, MergeTableError, OutputError, PrepareError, RevenueError};
use dispatch_model::DispatchError;
use thiserror::Error;

/// Errors emitted by the dispatch CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable that may supply it.
        env: &'static str,
    },
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag name.
        field: &'static str,
        /// Path as configured.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag name.
        field: &'static str,
        /// Path as configured.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag name.
        field: &'static str,
        /// Path as configured.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The report would be written below something that is not a
    /// directory.
    #[error("output directory {path:?} is not a directory")]
    OutputDirectoryNotDirectory {
        /// The offending parent path.
        path: Utf8PathBuf,
    },
    /// The run date is not `MM-DD-YYYY`.
    #[error("invalid date {value:?} (expected MM-DD-YYYY): {source}")]
    InvalidDate {
        /// Date as given.
        value: String,
        /// Underlying parse error.
        #[source]
        source: chrono::ParseError,
    },
    /// The assumed driving speed is not usable.
    #[error(transparent)]
    InvalidSpeed(#[from] InvalidSpeed),
    /// Reading the optimizer configuration file failed.
    #[error("failed to read optimizer configuration at {path:?}: {source}")]
    ReadOptimizerConfig {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The optimizer configuration file is not valid JSON.
    #[error("failed to parse optimizer configuration at {path:?}: {source}")]
    ParseOptimizerConfig {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// The optimizer configuration failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    /// Trip or driver records could not be loaded.
    #[error(transparent)]
    Input(#[from] InputError),
    /// The revenue table could not be loaded.
    #[error(transparent)]
    RevenueTable(#[from] RevenueError),
    /// The merge table could not be loaded.
    #[error(transparent)]
    MergeTable(#[from] MergeTableError),
    /// The inputs place one address at two coordinates.
    #[error("inconsistent input coordinates: {0}")]
    Addresses(#[from] ConflictingCoordinate),
    /// Merge normalization or pricing failed.
    #[error(transparent)]
    Prepare(#[from] PrepareError),
    /// The roster could not be assembled.
    #[error(transparent)]
    Roster(#[from] RosterError),
    /// Building or solving the model failed.
    #[error("dispatch failed: {0}")]
    Dispatch(#[source] Box<DispatchError>),
    /// Writing a report failed.
    #[error(transparent)]
    Report(#[from] OutputError),
    /// Serializing the run summary failed.
    #[error("failed to serialize the run summary: {0}")]
    SerializeSummary(#[source] serde_json::Error),
    /// Writing the run summary failed.
    #[error("failed to write the run summary: {0}")]
    WriteSummary(#[source] std::io::Error),
}

impl From<DispatchError> for CliError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(Box::new(err))
    }
}
