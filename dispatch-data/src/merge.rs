//! Merge-address table and return-leg rescheduling.
//!
//! Brokers often leave the pickup of a return leg open (midnight) or park
//! it at the very end of the day. Such legs are rescheduled to start a fixed
//! window after their predecessor's scheduled dropoff: the window listed in
//! the merge table for the leg's pickup address, or [`INTER_LEG_BUFFER`]
//! otherwise. Legs picked up at a merge address are flagged as merges so
//! the model keeps the driver waiting close by.

use std::collections::HashMap;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use dispatch_core::time::minutes;
use dispatch_core::{DayTime, ItineraryLeg, LegSuffix};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::TripRecord;

/// Default gap between a leg's dropoff and its successor's pickup.
pub const INTER_LEG_BUFFER: f64 = 150.0 / 1440.0;

/// Length of the dropoff window given to a rescheduled leg.
pub const TRIP_LENGTH_BUFFER: f64 = 2.0 / 24.0;

/// Latest dropoff a rescheduled leg may be given, 23:00.
pub const LATEST_DROPOFF: f64 = 23.0 / 24.0;

/// An address where riders wait for their next leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeAddress {
    /// Address as it appears in trip records.
    pub address: String,
    /// Minutes between the previous dropoff and the next pickup.
    #[serde(rename = "merge_window_minutes")]
    pub window_minutes: f64,
}

/// Errors raised while loading a merge table.
#[derive(Debug, Error)]
pub enum MergeTableError {
    /// The table file could not be opened.
    #[error("failed to open merge table {path}: {source}")]
    Open {
        /// Table file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The table is not valid CSV.
    #[error("failed to read merge table: {0}")]
    Csv(#[from] csv::Error),
    /// A window is negative or not a number.
    #[error("merge window for `{address}` must be non-negative, got {minutes}")]
    InvalidWindow {
        /// Offending address.
        address: String,
        /// Window as given.
        minutes: f64,
    },
}

/// Merge addresses with their waiting windows.
///
/// A pickup matches an entry when the entry's address contains the pickup
/// address, ignoring ASCII case. The first matching entry wins.
///
/// # Examples
/// ```
/// use dispatch_core::time::minutes;
/// use dispatch_data::merge::MergeTable;
///
/// let csv = "address,merge_window_minutes\nMercy Clinic Dialysis,20\n";
/// let table = MergeTable::from_csv(csv.as_bytes())?;
/// assert_eq!(table.window_for("mercy clinic"), Some(minutes(20.0)));
/// assert_eq!(table.window_for("4 Elm St"), None);
/// # Ok::<(), dispatch_data::merge::MergeTableError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeTable {
    entries: Vec<MergeAddress>,
}

impl MergeTable {
    /// Table over `entries`.
    ///
    /// # Errors
    /// Returns [`MergeTableError::InvalidWindow`] for a negative or NaN
    /// window.
    pub fn new(entries: Vec<MergeAddress>) -> Result<Self, MergeTableError> {
        if let Some(entry) = entries
            .iter()
            .find(|entry| entry.window_minutes.is_nan() || entry.window_minutes < 0.0)
        {
            return Err(MergeTableError::InvalidWindow {
                address: entry.address.clone(),
                minutes: entry.window_minutes,
            });
        }
        Ok(Self { entries })
    }

    /// Read a table with the columns `address` and `merge_window_minutes`.
    ///
    /// # Errors
    /// Returns [`MergeTableError::Csv`] for malformed rows and
    /// [`MergeTableError::InvalidWindow`] for negative windows.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, MergeTableError> {
        let entries = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader)
            .deserialize()
            .collect::<Result<Vec<MergeAddress>, _>>()?;
        Self::new(entries)
    }

    /// Load a CSV table from `path`.
    ///
    /// # Errors
    /// As [`MergeTable::from_csv`], plus [`MergeTableError::Open`].
    pub fn load(path: &Utf8Path) -> Result<Self, MergeTableError> {
        let file = dispatch_fs::open_input(path).map_err(|source| MergeTableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_csv(file)?;
        log::info!("loaded {} merge addresses from {path}", table.entries.len());
        Ok(table)
    }

    /// Waiting window, as a day fraction, for a pickup at `pickup_address`.
    ///
    /// Matching trims the pickup address and ignores ASCII case, so broker
    /// spellings such as `MERCY CLINIC` still find `Mercy Clinic Dialysis`.
    /// A blank address never matches.
    #[must_use]
    pub fn window_for(&self, pickup_address: &str) -> Option<f64> {
        let needle = pickup_address.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.address.to_ascii_lowercase().contains(&needle))
            .map(|entry| minutes(entry.window_minutes))
    }
}

/// Counts of the changes [`normalize_merges`] made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Legs newly flagged as merges.
    pub flagged: usize,
    /// Legs whose pickup and dropoff were rescheduled.
    pub rescheduled: usize,
    /// Legs that needed rescheduling but had no usable predecessor.
    pub unresolved: usize,
}

/// Flag merge legs and reschedule open return legs in place.
///
/// Only `B` and `C` legs are touched. A leg is rescheduled when its pickup
/// is unset or later than [`LATEST_DROPOFF`]; the new pickup is its
/// predecessor's scheduled dropoff plus the merge window and the new
/// dropoff is the earlier of [`LATEST_DROPOFF`] and pickup plus
/// [`TRIP_LENGTH_BUFFER`]. `B` legs are settled before `C` legs so a `C`
/// leg sees its predecessor's new times.
pub fn normalize_merges(records: &mut [TripRecord], table: &MergeTable) -> MergeSummary {
    let mut summary = MergeSummary::default();
    for suffix in [LegSuffix::B, LegSuffix::C] {
        let dropoffs: HashMap<String, DayTime> = records
            .iter()
            .map(|record| (record.trip_id.clone(), record.dropoff_time))
            .collect();
        for record in records.iter_mut() {
            let Some(previous_id) = ItineraryLeg::parse(&record.trip_id)
                .filter(|leg| leg.suffix == suffix)
                .and_then(|leg| leg.previous_id())
            else {
                continue;
            };
            let window = table.window_for(&record.pickup_address);
            if window.is_some() && !record.merge_flag {
                record.merge_flag = true;
                summary.flagged += 1;
            }
            if !needs_reschedule(record.pickup_time) {
                continue;
            }
            let Some(previous_dropoff) = dropoffs
                .get(&previous_id)
                .copied()
                .filter(|dropoff| !dropoff.is_unset())
            else {
                log::warn!(
                    "leg {} has an open pickup but {previous_id} has no scheduled dropoff",
                    record.trip_id
                );
                summary.unresolved += 1;
                continue;
            };
            let pickup = previous_dropoff.fraction() + window.unwrap_or(INTER_LEG_BUFFER);
            record.pickup_time = DayTime::from_fraction(pickup);
            record.dropoff_time =
                DayTime::from_fraction((pickup + TRIP_LENGTH_BUFFER).min(LATEST_DROPOFF));
            log::debug!(
                "rescheduled {} to {} - {}",
                record.trip_id,
                record.pickup_time,
                record.dropoff_time
            );
            summary.rescheduled += 1;
        }
    }
    summary
}

fn needs_reschedule(pickup: DayTime) -> bool {
    pickup.is_unset() || pickup.fraction() > LATEST_DROPOFF
}
