//! CSV reports of a dispatch plan.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use dispatch_core::LevelOfService;
use dispatch_model::{AssignmentRecord, DriverMileage};
use serde::Serialize;
use thiserror::Error;

/// Column order of the assignment report.
pub const ASSIGNMENT_COLUMNS: [&str; 14] = [
    "trip_id",
    "driver_id",
    "driver_name",
    "trip_date",
    "trip_pickup_address",
    "trip_pickup_time",
    "est_pickup_time",
    "trip_dropoff_address",
    "trip_dropoff_time",
    "est_dropoff_time",
    "trip_los",
    "est_miles",
    "est_time",
    "trip_rev",
];

/// Column order of the mileage report.
pub const MILEAGE_COLUMNS: [&str; 3] = ["driver_id", "driver_name", "miles"];

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The report file could not be created.
    #[error("failed to create {path}: {source}")]
    Create {
        /// Report file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Writing a row failed.
    #[error("failed to write report: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Serialize)]
struct AssignmentRow<'a> {
    trip_id: &'a str,
    driver_id: u32,
    driver_name: &'a str,
    trip_date: NaiveDate,
    trip_pickup_address: &'a str,
    trip_pickup_time: f64,
    est_pickup_time: f64,
    trip_dropoff_address: &'a str,
    trip_dropoff_time: f64,
    est_dropoff_time: f64,
    trip_los: LevelOfService,
    est_miles: f64,
    est_time: f64,
    trip_rev: f64,
}

impl<'a> From<&'a AssignmentRecord> for AssignmentRow<'a> {
    fn from(record: &'a AssignmentRecord) -> Self {
        Self {
            trip_id: &record.trip_id,
            driver_id: record.driver_id,
            driver_name: &record.driver_name,
            trip_date: record.trip_date,
            trip_pickup_address: &record.pickup_address,
            trip_pickup_time: record.scheduled_pickup,
            est_pickup_time: record.est_pickup,
            trip_dropoff_address: &record.dropoff_address,
            trip_dropoff_time: record.scheduled_dropoff,
            est_dropoff_time: record.est_dropoff,
            trip_los: record.los,
            est_miles: record.est_miles,
            est_time: record.est_time,
            trip_rev: record.revenue,
        }
    }
}

#[derive(Serialize)]
struct MileageRow<'a> {
    driver_id: u32,
    driver_name: &'a str,
    miles: f64,
}

/// Write `records` as CSV, ordered by estimated pickup.
///
/// The header row is always written, even for an empty plan.
///
/// # Errors
/// Returns [`OutputError::Csv`] when a row cannot be written.
pub fn write_assignments<W: Write>(
    writer: W,
    records: &[AssignmentRecord],
) -> Result<(), OutputError> {
    let mut ordered: Vec<&AssignmentRecord> = records.iter().collect();
    ordered.sort_by(|lhs, rhs| lhs.est_pickup.total_cmp(&rhs.est_pickup));
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(ASSIGNMENT_COLUMNS)?;
    for record in ordered {
        csv.serialize(AssignmentRow::from(record))?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write per-driver mileage as CSV in roster order.
///
/// # Errors
/// Returns [`OutputError::Csv`] when a row cannot be written.
pub fn write_mileage<W: Write>(writer: W, mileage: &[DriverMileage]) -> Result<(), OutputError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(MILEAGE_COLUMNS)?;
    for entry in mileage {
        csv.serialize(MileageRow {
            driver_id: entry.driver_id,
            driver_name: &entry.driver_name,
            miles: entry.miles,
        })?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write the assignment report to `path`, creating parent directories.
///
/// # Errors
/// Returns [`OutputError`] when the file cannot be created or written.
pub fn save_assignments(path: &Utf8Path, records: &[AssignmentRecord]) -> Result<(), OutputError> {
    let file = dispatch_fs::create_output(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_assignments(file, records)?;
    log::info!("wrote {} assignments to {path}", records.len());
    Ok(())
}

/// Write the mileage report to `path`, creating parent directories.
///
/// # Errors
/// Returns [`OutputError`] when the file cannot be created or written.
pub fn save_mileage(path: &Utf8Path, mileage: &[DriverMileage]) -> Result<(), OutputError> {
    let file = dispatch_fs::create_output(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_mileage(file, mileage)?;
    log::info!("wrote mileage for {} drivers to {path}", mileage.len());
    Ok(())
}
