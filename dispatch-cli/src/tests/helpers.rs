//! Fixture files and workspaces for the solve command tests.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use dispatch_data::HaversineTravelCost;
use tempfile::TempDir;

use crate::solve::{DEFAULT_OUTPUT, SolveConfig};

pub(super) const TRIPS: &str = r#"[
    {"trip_id": "10A", "los": "A",
     "pickup_address": "4 Elm St", "pickup_lat": 42.35, "pickup_lon": -71.06,
     "dropoff_address": "Mercy Clinic", "dropoff_lat": 42.36, "dropoff_lon": -71.1,
     "pickup_time": "9:00", "dropoff_time": "10:00"},
    {"trip_id": "11", "los": "W",
     "pickup_address": "7 Birch Ave", "pickup_lat": 42.38, "pickup_lon": -71.04,
     "dropoff_address": "General Hospital", "dropoff_lat": 42.36, "dropoff_lon": -71.07,
     "pickup_time": "13:00", "dropoff_time": "14:30"}
]"#;

pub(super) const DRIVERS: &str = r#"[
    {"id": 101, "name": "Avery", "address": "1 Depot Road", "lat": 42.34, "lon": -71.05,
     "los": ["A", "W"]},
    {"id": 102, "name": "Blake", "address": "2 Depot Road", "lat": 42.37, "lon": -71.08}
]"#;

pub(super) const RATES: &str = "\
lower_mileage_bound,upper_mileage_bound,los,base_rate,rate_per_mile
0,50,A,20,2
0,50,W,35,3
";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(path, contents).expect("write fixture file");
}

/// A temporary directory holding the day's input files.
#[derive(Debug)]
pub(super) struct Workspace {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self { _tmp: tmp, root }
    }

    /// A workspace with `trips.json` and `drivers.json` written.
    pub(super) fn with_inputs() -> Self {
        let workspace = Self::new();
        write_utf8(&workspace.path("trips.json"), TRIPS.as_bytes());
        write_utf8(&workspace.path("drivers.json"), DRIVERS.as_bytes());
        workspace
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// A configuration naming only the two required inputs.
    pub(super) fn config(&self) -> SolveConfig {
        SolveConfig {
            trips: self.path("trips.json"),
            drivers: self.path("drivers.json"),
            optimizer_config: None,
            revenue_table: None,
            merge_table: None,
            output: self.path(DEFAULT_OUTPUT),
            mileage_output: None,
            date: run_date(),
            driver_ids: Vec::new(),
            travel: HaversineTravelCost::default(),
            seed: None,
        }
    }
}

/// Monday 4 March 2024.
pub(super) fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date")
}
