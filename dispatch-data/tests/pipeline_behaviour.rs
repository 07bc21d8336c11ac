//! Behavioural tests for loading, preparing and dispatching a day of trips.

use std::cell::RefCell;
use std::fs;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use dispatch_core::{DayTime, OptimizerConfig};
use dispatch_data::{
    AddressBook, DriverRecord, HaversineTravelCost, MergeTable, PrepareError, PreparedTrips,
    RevenueTable, TripRecord, driver_pool, load_records, prepare_trips, save_assignments,
};
use dispatch_model::{DispatchPlan, Optimizer};
use dispatch_solver_lp::LpBackend;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

const TRIPS: &str = r#"[
    {"trip_id": "1A", "los": "A",
     "pickup_address": "4 Elm St", "pickup_lat": 42.35, "pickup_lon": -71.06,
     "dropoff_address": "Mercy Clinic, Entrance A", "dropoff_lat": 42.36,
     "dropoff_lon": -71.1, "pickup_time": "9:00", "dropoff_time": "10:00"},
    {"trip_id": "1B", "los": "A",
     "pickup_address": "Mercy Clinic", "pickup_lat": 42.36, "pickup_lon": -71.1,
     "dropoff_address": "4 Elm St, Apt 2", "dropoff_lat": 42.35, "dropoff_lon": -71.06,
     "pickup_time": 0, "dropoff_time": 0}
]"#;

const DRIVERS: &str = r#"[
    {"id": 101, "name": "Avery", "address": "1 Depot Road", "lat": 42.34, "lon": -71.05},
    {"id": 102, "name": "Blake", "address": "2 Depot Road", "lat": 42.37, "lon": -71.08}
]"#;

const RATE_HEADER: &str = "lower_mileage_bound,upper_mileage_bound,los,base_rate,rate_per_mile";

struct PipelineWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    prepared: RefCell<Option<Result<PreparedTrips, PrepareError>>>,
    plan: RefCell<Option<DispatchPlan>>,
}

impl PipelineWorld {
    #[expect(
        clippy::expect_used,
        reason = "behaviour tests use expect for readable failures"
    )]
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _dir: dir,
            root,
            prepared: RefCell::new(None),
            plan: RefCell::new(None),
        }
    }

    #[expect(
        clippy::expect_used,
        reason = "behaviour tests use expect for readable failures"
    )]
    fn write(&self, name: &str, contents: &str) {
        fs::write(self.root.join(name), contents).expect("write fixture file");
    }

    fn report(&self) -> Utf8PathBuf {
        self.root.join("out").join("assignments.csv")
    }

    #[expect(
        clippy::expect_used,
        reason = "behaviour tests use expect for readable failures"
    )]
    fn with_prepared<T>(&self, check: impl FnOnce(&PreparedTrips) -> T) -> T {
        let slot = self.prepared.borrow();
        let prepared = slot
            .as_ref()
            .expect("pipeline should run before assertions")
            .as_ref()
            .expect("preparation succeeded");
        check(prepared)
    }

    #[expect(
        clippy::expect_used,
        reason = "behaviour tests use expect for readable failures"
    )]
    fn driver_of(&self, trip_id: &str) -> u32 {
        self.plan
            .borrow()
            .as_ref()
            .expect("plan produced")
            .records
            .iter()
            .find(|record| record.trip_id == trip_id)
            .map(|record| record.driver_id)
            .expect("trip assigned")
    }
}

fn close(lhs: DayTime, rhs: DayTime) -> bool {
    (lhs.fraction() - rhs.fraction()).abs() < 1e-9
}

#[fixture]
fn world() -> PipelineWorld {
    PipelineWorld::new()
}

#[given("trip and driver files for a clinic round trip")]
fn given_inputs(world: &PipelineWorld) {
    world.write("trips.json", TRIPS);
    world.write("drivers.json", DRIVERS);
}

#[given("a merge table listing the clinic")]
fn given_merge_table(world: &PipelineWorld) {
    world.write(
        "merges.csv",
        "address,merge_window_minutes\nMercy Clinic Dialysis Unit,15\n",
    );
}

#[given("a revenue table for ambulatory trips")]
fn given_revenue_table(world: &PipelineWorld) {
    world.write("rates.csv", &format!("{RATE_HEADER}\n0,50,A,20,2\n"));
}

#[given("a revenue table that stops at one mile")]
fn given_short_revenue_table(world: &PipelineWorld) {
    world.write("rates.csv", &format!("{RATE_HEADER}\n0,1,A,20,2\n"));
}

#[when("the day is prepared and dispatched")]
#[expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]
fn when_dispatched(world: &PipelineWorld) {
    let trips: Vec<TripRecord> =
        load_records(&world.root.join("trips.json")).expect("trips load");
    let drivers: Vec<DriverRecord> =
        load_records(&world.root.join("drivers.json")).expect("drivers load");
    let merge_path = world.root.join("merges.csv");
    let merges = if merge_path.is_file() {
        MergeTable::load(&merge_path).expect("merge table loads")
    } else {
        MergeTable::default()
    };
    let rates = RevenueTable::load(&world.root.join("rates.csv")).expect("rates load");
    let travel = HaversineTravelCost::default();

    let prepared = prepare_trips(&trips, &merges, Some(&rates), &travel);
    if let Ok(ready) = &prepared {
        let config = OptimizerConfig::default();
        let book = AddressBook::from_records(&trips, &drivers).expect("consistent addresses");
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date");
        let mut backend = LpBackend::new();
        let plan = Optimizer::new(&config, book, travel)
            .run(&ready.trips, &driver_pool(&drivers), date, &mut backend)
            .expect("plan found");
        save_assignments(&world.report(), &plan.records).expect("report written");
        world.plan.replace(Some(plan));
    }
    world.prepared.replace(Some(prepared));
}

#[then("the return leg is rescheduled after the outbound dropoff")]
fn then_rescheduled(world: &PipelineWorld) {
    world.with_prepared(|prepared| {
        assert_eq!(prepared.merges.rescheduled, 1);
        assert_eq!(prepared.merges.flagged, 1);
        assert_eq!(prepared.priced, 2);
        let ret = prepared.trips.iter().find(|trip| trip.id == "1B");
        let pickup = DayTime::from_hm(10, 15);
        let dropoff = DayTime::from_hm(12, 15);
        assert!(ret.is_some_and(|trip| trip.is_merge));
        assert!(ret.is_some_and(|trip| close(trip.scheduled_pickup, pickup)));
        assert!(ret.is_some_and(|trip| close(trip.scheduled_dropoff, dropoff)));
    });
}

#[then("both legs are assigned to the same driver")]
fn then_same_driver(world: &PipelineWorld) {
    assert_eq!(world.driver_of("1A"), world.driver_of("1B"));
}

#[then("the assignment report lists both legs in pickup order")]
#[expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]
fn then_report_written(world: &PipelineWorld) {
    let mut reader = csv::Reader::from_path(world.report()).expect("report exists");
    let headers = reader.headers().expect("header row").clone();
    assert_eq!(headers.get(0), Some("trip_id"));
    assert_eq!(headers.get(13), Some("trip_rev"));
    let ids: Vec<String> = reader
        .records()
        .map(|row| row.expect("valid row").get(0).unwrap_or_default().to_owned())
        .collect();
    assert_eq!(ids, ["1A", "1B"]);
}

#[then("preparation fails for the outbound leg")]
#[expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]
fn then_preparation_fails(world: &PipelineWorld) {
    let slot = world.prepared.borrow();
    let err = slot
        .as_ref()
        .expect("pipeline should run before assertions")
        .as_ref()
        .expect_err("no band covers the trip");
    assert!(matches!(err, PrepareError::Revenue { trip_id, .. } if trip_id == "1A"));
    assert!(world.plan.borrow().is_none());
}

#[scenario(path = "tests/features/pipeline.feature", index = 0)]
fn merge_leg_follows_outbound(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 1)]
fn uncovered_trip_stops_preparation(world: PipelineWorld) {
    let _ = world;
}
