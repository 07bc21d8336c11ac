//! JSON input records for trips and drivers.
//!
//! Trip times may be written as day fractions (`0.375`) or clock readings
//! (`"9:00"`); levels of service use the single-letter codes `A` and `W`.

use std::io::{BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use dispatch_core::{DayTime, Driver, LevelOfService, Trip};
use geo::Coord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trip as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Broker trip id, optionally with an `A`/`B`/`C` leg suffix.
    pub trip_id: String,
    /// Pickup address.
    pub pickup_address: String,
    /// Pickup latitude.
    pub pickup_lat: f64,
    /// Pickup longitude.
    pub pickup_lon: f64,
    /// Dropoff address.
    pub dropoff_address: String,
    /// Dropoff latitude.
    pub dropoff_lat: f64,
    /// Dropoff longitude.
    pub dropoff_lon: f64,
    /// Scheduled pickup; midnight when the broker left it open.
    pub pickup_time: DayTime,
    /// Scheduled dropoff; midnight means end of day.
    pub dropoff_time: DayTime,
    /// Required level of service.
    pub los: LevelOfService,
    /// Whether the leg's pickup must closely follow its predecessor.
    #[serde(default)]
    pub merge_flag: bool,
    /// Revenue, when the broker quoted one.
    #[serde(default)]
    pub revenue: Option<f64>,
    /// Broker-quoted miles.
    #[serde(default)]
    pub miles: Option<f64>,
}

impl TripRecord {
    /// Pickup as a `geo` coordinate (`x` = longitude).
    #[must_use]
    pub const fn pickup_coord(&self) -> Coord<f64> {
        Coord {
            x: self.pickup_lon,
            y: self.pickup_lat,
        }
    }

    /// Dropoff as a `geo` coordinate (`x` = longitude).
    #[must_use]
    pub const fn dropoff_coord(&self) -> Coord<f64> {
        Coord {
            x: self.dropoff_lon,
            y: self.dropoff_lat,
        }
    }

    /// Convert into the optimizer's trip type. A missing revenue becomes
    /// zero.
    #[must_use]
    pub fn to_trip(&self) -> Trip {
        let mut trip = Trip::new(
            self.trip_id.clone(),
            self.pickup_address.clone(),
            self.dropoff_address.clone(),
            self.pickup_time,
            self.dropoff_time,
            self.los,
        )
        .with_merge(self.merge_flag)
        .with_revenue(self.revenue.unwrap_or_default());
        trip.preset_miles = self.miles;
        trip
    }
}

/// One row of the driver table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    /// Driver id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Depot address.
    pub address: String,
    /// Depot latitude.
    pub lat: f64,
    /// Depot longitude.
    pub lon: f64,
    /// Vehicle capacity; derived from `los` when absent.
    #[serde(default)]
    pub capacity: Option<f64>,
    /// Levels of service the vehicle supports.
    #[serde(default = "ambulatory_only")]
    pub los: Vec<LevelOfService>,
    /// Stored early-start flag before the weekday rotation.
    #[serde(default)]
    pub early_day: bool,
    /// Unavailable drivers are never rostered.
    #[serde(default = "available")]
    pub available: bool,
}

fn ambulatory_only() -> Vec<LevelOfService> {
    vec![LevelOfService::Ambulatory]
}

const fn available() -> bool {
    true
}

impl DriverRecord {
    /// Depot as a `geo` coordinate (`x` = longitude).
    #[must_use]
    pub const fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    /// Convert into the optimizer's driver type.
    #[must_use]
    pub fn to_driver(&self) -> Driver {
        let driver = Driver::new(self.id, self.name.clone(), self.address.clone())
            .with_levels(self.los.iter().copied())
            .with_early_day(self.early_day);
        match self.capacity {
            Some(capacity) => driver.with_capacity(capacity),
            None => driver,
        }
    }
}

/// Convert the available driver records into the driver pool.
#[must_use]
pub fn driver_pool(records: &[DriverRecord]) -> Vec<Driver> {
    records
        .iter()
        .filter(|record| {
            if !record.available {
                log::debug!("driver {} is unavailable", record.id);
            }
            record.available
        })
        .map(DriverRecord::to_driver)
        .collect()
}

/// Errors raised while loading input records.
#[derive(Debug, Error)]
pub enum InputError {
    /// The file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// File that failed to open.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid JSON for the expected records.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: Utf8PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a JSON array of records from `reader`.
///
/// # Errors
/// Returns the decode error when the payload is not a matching JSON array.
///
/// # Examples
/// ```
/// use dispatch_data::input::{TripRecord, read_records};
///
/// let json = r#"[{
///     "trip_id": "7A", "los": "W",
///     "pickup_address": "4 Elm St", "pickup_lat": 42.36, "pickup_lon": -71.06,
///     "dropoff_address": "Mercy Clinic", "dropoff_lat": 42.35, "dropoff_lon": -71.1,
///     "pickup_time": "9:00", "dropoff_time": 0.4375
/// }]"#;
/// let trips: Vec<TripRecord> = read_records(json.as_bytes())?;
/// assert_eq!(trips[0].pickup_time.to_string(), "09:00");
/// assert!(!trips[0].merge_flag);
/// # Ok::<(), serde_json::Error>(())
/// ```
pub fn read_records<T, R>(reader: R) -> Result<Vec<T>, serde_json::Error>
where
    T: DeserializeOwned,
    R: Read,
{
    serde_json::from_reader(BufReader::new(reader))
}

/// Load a JSON array of records from `path`.
///
/// # Errors
/// Returns [`InputError`] carrying `path` when the file cannot be opened or
/// decoded.
pub fn load_records<T: DeserializeOwned>(path: &Utf8Path) -> Result<Vec<T>, InputError> {
    let file = dispatch_fs::open_input(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("loaded {} records from {path}", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DRIVERS: &str = r#"[
        {"id": 101, "name": "Avery", "address": "1 Depot Road", "lat": 42.0, "lon": -71.0,
         "los": ["A", "W"], "early_day": true},
        {"id": 102, "name": "Blake", "address": "2 Depot Road", "lat": 42.1, "lon": -71.1,
         "capacity": 3.0},
        {"id": 103, "name": "Casey", "address": "3 Depot Road", "lat": 42.2, "lon": -71.2,
         "available": false}
    ]"#;

    #[rstest]
    fn driver_records_fill_defaults() {
        let records: Vec<DriverRecord> = read_records(DRIVERS.as_bytes()).expect("valid json");
        let pool = driver_pool(&records);
        assert_eq!(pool.len(), 2);

        let avery = pool.first().expect("first driver");
        assert!(avery.supports(LevelOfService::Wheelchair));
        assert!((avery.capacity - 1.5).abs() < f64::EPSILON);
        assert!(avery.early_day);

        let blake = pool.get(1).expect("second driver");
        assert!(!blake.supports(LevelOfService::Wheelchair));
        assert!((blake.capacity - 3.0).abs() < f64::EPSILON);
        assert!(!blake.early_day);
    }

    #[rstest]
    fn trip_records_convert_to_trips() {
        let json = r#"[{
            "trip_id": "55B", "los": "A", "merge_flag": true, "revenue": 31.5, "miles": 7.0,
            "pickup_address": "Mercy Clinic", "pickup_lat": 42.35, "pickup_lon": -71.1,
            "dropoff_address": "4 Elm St", "dropoff_lat": 42.36, "dropoff_lon": -71.06,
            "pickup_time": "13:30", "dropoff_time": "15:00"
        }]"#;
        let records: Vec<TripRecord> = read_records(json.as_bytes()).expect("valid json");
        let record = records.first().expect("one record");
        assert_eq!(record.pickup_coord(), Coord { x: -71.1, y: 42.35 });

        let trip = record.to_trip();
        assert!(trip.is_merge);
        assert_eq!(trip.preset_miles, Some(7.0));
        assert!((trip.revenue - 31.5).abs() < f64::EPSILON);
        assert_eq!(trip.scheduled_dropoff, DayTime::from_hm(15, 0));
    }

    #[rstest]
    fn unknown_level_of_service_is_a_parse_error() {
        let json = r#"[{"id": 1, "name": "x", "address": "y", "lat": 0.0, "lon": 0.0,
                        "los": ["S"]}]"#;
        let err = read_records::<DriverRecord, _>(json.as_bytes()).expect_err("stretcher");
        assert!(err.to_string().contains("unknown level of service"));
    }
}
