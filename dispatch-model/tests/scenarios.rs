//! End-to-end scenarios solved with the `microlp` backend.

use chrono::NaiveDate;
use dispatch_core::test_support::{OriginResolver, UnitTravelCost};
use dispatch_core::time::ONE_MINUTE;
use dispatch_core::{DayTime, Driver, Incumbent, LevelOfService, OptimizerConfig, Trip};
use dispatch_model::{
    AssignmentRecord, DispatchModel, GraphBuilder, NodeKind, Optimizer, SolveOutcome, SolveStage,
    TripGraph,
};
use dispatch_solver_lp::LpBackend;
use rstest::{fixture, rstest};

const EPSILON: f64 = 1e-6;

fn trip(id: &str, pickup: (u32, u32), dropoff: (u32, u32), los: LevelOfService) -> Trip {
    Trip::new(
        id,
        format!("{id} pickup"),
        format!("{id} dropoff"),
        DayTime::from_hm(pickup.0, pickup.1),
        DayTime::from_hm(dropoff.0, dropoff.1),
        los,
    )
}

#[expect(
    clippy::expect_used,
    reason = "scenario helpers use expect for readable failures"
)]
fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date")
}

#[expect(
    clippy::expect_used,
    reason = "scenario helpers use expect for readable failures"
)]
fn solve_with(
    config: &OptimizerConfig,
    trips: &[Trip],
    drivers: &[Driver],
) -> (DispatchModel, SolveOutcome) {
    let graph = GraphBuilder::new(config, OriginResolver, UnitTravelCost::default())
        .build(trips, drivers)
        .expect("graph builds");
    let mut backend = LpBackend::new();
    let model = DispatchModel::declare(graph, config, &mut backend).expect("model declared");
    let outcome = model.solve(config, &mut backend).expect("solution found");
    (model, outcome)
}

fn solve(trips: &[Trip], drivers: &[Driver]) -> (DispatchModel, SolveOutcome) {
    solve_with(&OptimizerConfig::default(), trips, drivers)
}

#[expect(
    clippy::expect_used,
    reason = "scenario helpers use expect for readable failures"
)]
fn record_for<'a>(records: &'a [AssignmentRecord], id: &str) -> &'a AssignmentRecord {
    records
        .iter()
        .find(|record| record.trip_id == id)
        .expect("record for trip")
}

fn taken(solution: &Incumbent, var: dispatch_core::VarId) -> bool {
    solution.value_or_zero(var) > 0.5
}

/// Check flow, capacity and time monotonicity on every realised route.
#[expect(
    clippy::expect_used,
    reason = "scenario helpers use expect for readable failures"
)]
fn assert_routes_are_consistent(model: &DispatchModel, solution: &Incumbent) {
    let graph: &TripGraph = model.graph();
    let vars = model.variables();
    for (driver, entry) in graph.driver_ids() {
        for (node_id, node) in graph.request_nodes() {
            let inbound = vars
                .inbound(driver, node_id)
                .filter(|pair| taken(solution, pair.taken))
                .count();
            let outbound = vars
                .outbound(driver, node_id)
                .filter(|pair| taken(solution, pair.taken))
                .count();
            assert_eq!(inbound, outbound, "flow at {:?}", node.kind);
            assert!(inbound <= 1);
        }
        for pair in vars.pairs().iter().filter(|pair| pair.driver == driver) {
            let load = solution.value_or_zero(pair.load);
            assert!(load >= -EPSILON);
            assert!(load <= entry.driver.capacity + EPSILON);
        }
    }
    for pair in vars.pairs().iter().filter(|pair| taken(solution, pair.taken)) {
        let edge = graph.edge(pair.edge).expect("edge of a pair");
        let arrival = solution.value_or_zero(pair.service_time) + edge.cost.time;
        let next_departure = vars
            .outbound(pair.driver, edge.destination)
            .find(|next| taken(solution, next.taken))
            .map(|next| solution.value_or_zero(next.service_time));
        if let Some(departure) = next_departure {
            assert!(arrival <= departure + EPSILON);
        }
    }
}

#[fixture]
fn two_drivers() -> Vec<Driver> {
    vec![
        Driver::new(1, "Avery", "1 Depot Road"),
        Driver::new(2, "Blake", "2 Depot Road"),
    ]
}

#[rstest]
fn one_trip_is_assigned_once_inside_its_window(two_drivers: Vec<Driver>) {
    let trips = [trip("T1", (9, 0), (10, 0), LevelOfService::Ambulatory)];
    let (model, outcome) = solve(&trips, &two_drivers);
    let extraction = model.extract(&outcome, date());

    assert_eq!(extraction.records.len(), 1);
    let record = extraction.records.first().expect("one record");
    assert_eq!(record.trip_id, "T1");
    let pickup = model
        .graph()
        .request_nodes()
        .find(|(_, node)| matches!(node.kind, NodeKind::Pickup(_)))
        .map(|(_, node)| node.window)
        .expect("pickup node");
    assert!(record.est_pickup >= pickup.open - EPSILON);
    assert!(record.est_pickup <= pickup.close + EPSILON);
    assert!(record.est_dropoff >= record.est_pickup + 10.0 * ONE_MINUTE - EPSILON);
    assert_eq!(extraction.inconsistencies, 0);
    assert_routes_are_consistent(&model, &outcome.incumbent);
}

#[rstest]
fn merge_leg_follows_its_predecessor(two_drivers: Vec<Driver>) {
    let trips = [
        trip("M1A", (9, 0), (9, 30), LevelOfService::Ambulatory),
        trip("M1B", (9, 45), (10, 30), LevelOfService::Ambulatory).with_merge(true),
    ];
    let (model, outcome) = solve(&trips, &two_drivers);
    let extraction = model.extract(&outcome, date());

    assert_eq!(extraction.records.len(), 2);
    let (first, second) = (
        record_for(&extraction.records, "M1A"),
        record_for(&extraction.records, "M1B"),
    );
    assert_eq!(first.driver_id, second.driver_id);
    let travel = first.est_time;
    assert!(second.est_pickup >= first.est_pickup + travel - EPSILON);

    let link = model.graph().merges().first().expect("merge link");
    assert!((link.window - 15.0 * ONE_MINUTE).abs() < EPSILON);

    let penalty = model
        .objective()
        .merge
        .evaluate(|var| outcome.incumbent.value_or_zero(var));
    let gap = second.est_pickup - first.est_pickup - travel;
    let expected = OptimizerConfig::default().merge_penalty * 24.0 * gap;
    assert!((penalty - expected).abs() < 1e-4);
    assert_routes_are_consistent(&model, &outcome.incumbent);
}

#[rstest]
fn three_leg_itinerary_with_a_merged_middle_leg_runs_in_order() {
    let drivers = [
        Driver::new(1, "Avery", "1 Depot Road"),
        Driver::new(2, "Blake", "2 Depot Road"),
        Driver::new(3, "Casey", "3 Depot Road"),
    ];
    let trips = [
        trip("5A", (9, 0), (9, 30), LevelOfService::Ambulatory),
        trip("5B", (9, 45), (10, 30), LevelOfService::Ambulatory).with_merge(true),
        trip("5C", (13, 0), (13, 30), LevelOfService::Ambulatory),
    ];
    let (model, outcome) = solve(&trips, &drivers);
    assert_eq!(model.graph().itinerary_links().len(), 2);
    assert_eq!(model.graph().merges().len(), 1);

    let extraction = model.extract(&outcome, date());
    assert_eq!(extraction.records.len(), 3);
    let (first, middle, last) = (
        record_for(&extraction.records, "5A"),
        record_for(&extraction.records, "5B"),
        record_for(&extraction.records, "5C"),
    );
    assert_eq!(first.driver_id, middle.driver_id);
    assert!(first.est_pickup < middle.est_pickup);
    assert!(middle.est_pickup < last.est_pickup);
    assert!(middle.est_pickup >= first.est_dropoff - EPSILON);
    assert!(last.est_pickup >= middle.est_dropoff - EPSILON);
    assert_eq!(extraction.inconsistencies, 0);
    assert_routes_are_consistent(&model, &outcome.incumbent);
}

#[rstest]
#[case::no_early_driver(false, true)]
#[case::early_driver(true, false)]
fn unreachable_early_day_cut_off_is_relaxed(#[case] early_day: bool, #[case] relaxed: bool) {
    let config = OptimizerConfig {
        early_day_time: DayTime::from_hm(23, 0),
        ..OptimizerConfig::default()
    };
    let drivers = [Driver::new(1, "Avery", "1 Depot Road").with_early_day(early_day)];
    let trips = [trip("T1", (9, 0), (10, 0), LevelOfService::Ambulatory)];
    let (model, outcome) = solve_with(&config, &trips, &drivers);

    assert_eq!(outcome.early_day_relaxed, relaxed);
    assert_eq!(
        outcome.trace.contains(&SolveStage::Stage1RelaxedEarlyDay),
        relaxed
    );
    let extraction = model.extract(&outcome, date());
    let ids: Vec<(&str, u32)> = extraction
        .records
        .iter()
        .map(|record| (record.trip_id.as_str(), record.driver_id))
        .collect();
    assert_eq!(ids, vec![("T1", 1)]);
    assert_routes_are_consistent(&model, &outcome.incumbent);
}

#[rstest]
fn optimizer_plans_a_small_day(two_drivers: Vec<Driver>) {
    let config = OptimizerConfig::default();
    let trips = [
        trip("T1", (9, 0), (10, 0), LevelOfService::Ambulatory).with_revenue(40.0),
        trip("T2", (13, 0), (14, 0), LevelOfService::Ambulatory).with_revenue(25.0),
    ];
    let mut backend = LpBackend::new();
    let plan = Optimizer::new(&config, OriginResolver, UnitTravelCost::default())
        .run(&trips, &two_drivers, date(), &mut backend)
        .expect("plan");

    let ids: Vec<&str> = plan.records.iter().map(|record| record.trip_id.as_str()).collect();
    assert_eq!(ids, vec!["T1", "T2"]);
    assert!(plan.records.iter().all(|record| record.trip_date == date()));
    assert_eq!(plan.mileage.len(), 2);
    let miles: f64 = plan.mileage.iter().map(|entry| entry.miles).sum();
    assert!(miles > 0.0);
    assert!(plan.rejected.is_empty());
    assert_eq!(plan.attempts, 1);
    assert!(plan.objective.is_some());
}
