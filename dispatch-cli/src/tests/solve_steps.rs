//! Behaviour-driven step definitions driving the solve CLI scenarios.

use super::helpers::{DRIVERS, RATES, TRIPS, Workspace, write_utf8};
use super::*;
use crate::solve::{RunSummary, run_solve_with};
use camino::Utf8PathBuf;
use dispatch_core::RosterError;
use dispatch_core::test_support::ScriptedBackend;
use dispatch_data::InputError;
use dispatch_model::{DispatchError, OrchestratorError};
use dispatch_solver_lp::LpBackend;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::{Ref, RefCell};

#[derive(Debug)]
struct SolveWorld {
    workspace: Workspace,
    include_trips: RefCell<bool>,
    failing_backend: RefCell<bool>,
    cli_args: RefCell<Vec<String>>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl SolveWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            include_trips: RefCell::new(true),
            failing_backend: RefCell::new(false),
            cli_args: RefCell::new(Vec::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn report_path(&self) -> Utf8PathBuf {
        self.workspace.path("out/assignments.csv")
    }

    fn build_command_line(&self) -> Vec<String> {
        let mut argv = vec!["dispatch".to_owned(), "solve".to_owned()];
        if *self.include_trips.borrow() {
            argv.extend([
                format!("--{ARG_TRIPS}"),
                self.workspace.path("trips.json").into_string(),
            ]);
        }
        argv.extend([
            format!("--{ARG_DRIVERS}"),
            self.workspace.path("drivers.json").into_string(),
            format!("--{ARG_OUTPUT}"),
            self.report_path().into_string(),
            format!("--{ARG_DATE}"),
            "03-04-2024".to_owned(),
        ]);
        argv.extend(self.cli_args.borrow().iter().cloned());
        argv
    }

    fn error(&self) -> Ref<'_, CliError> {
        Ref::map(self.result.borrow(), |slot| {
            slot.as_ref()
                .expect("result recorded")
                .as_ref()
                .expect_err("expected error")
        })
    }
}

#[fixture]
fn world() -> SolveWorld {
    SolveWorld::new()
}

#[given("trip and driver files exist on disk")]
fn inputs_exist(#[from(world)] world: &SolveWorld) {
    write_utf8(&world.workspace.path("trips.json"), TRIPS.as_bytes());
    write_utf8(&world.workspace.path("drivers.json"), DRIVERS.as_bytes());
}

#[given("a revenue table exists on disk")]
fn revenue_table_exists(#[from(world)] world: &SolveWorld) {
    let path = world.workspace.path("rates.csv");
    write_utf8(&path, RATES.as_bytes());
    world
        .cli_args
        .borrow_mut()
        .extend([format!("--{ARG_REVENUE_TABLE}"), path.into_string()]);
}

#[given("I request a driver that is not in the driver table")]
fn request_unknown_driver(#[from(world)] world: &SolveWorld) {
    world
        .cli_args
        .borrow_mut()
        .extend([format!("--{ARG_DRIVER_IDS}"), "101,999".to_owned()]);
}

#[given("I omit the trips path")]
fn omit_trips_path(#[from(world)] world: &SolveWorld) {
    *world.include_trips.borrow_mut() = false;
}

#[given("the trip file contains invalid JSON")]
fn trip_file_contains_invalid_json(#[from(world)] world: &SolveWorld) {
    write_utf8(&world.workspace.path("trips.json"), b"[{ not valid json");
}

#[given("the solver backend fails every solve")]
fn backend_fails(#[from(world)] world: &SolveWorld) {
    *world.failing_backend.borrow_mut() = true;
}

#[when("I run the solve command")]
fn run_solve_command(#[from(world)] world: &SolveWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Solve(args) => {
            let mut buffer = world.stdout.borrow_mut();
            if *world.failing_backend.borrow() {
                let mut backend = ScriptedBackend::always_failing();
                run_solve_with(*args, &mut backend, &mut *buffer)
            } else {
                let mut backend = LpBackend::new();
                run_solve_with(*args, &mut backend, &mut *buffer)
            }
        }
    });

    world.result.replace(Some(outcome));
}

#[then("the command succeeds and prints a JSON summary")]
fn command_succeeds_and_prints_summary(#[from(world)] world: &SolveWorld) {
    let borrowed = world.result.borrow();
    let result = borrowed.as_ref().expect("result recorded");
    result.as_ref().expect("expected success");

    let stdout = String::from_utf8(world.stdout.borrow().clone()).expect("stdout utf-8");
    let summary: RunSummary =
        serde_json::from_str(&stdout).expect("output should be a JSON run summary");
    assert_eq!(summary.assignments, 2);
    assert_eq!(summary.drivers, 2);
    assert!(summary.rejected.is_empty());
    assert_eq!(summary.output, world.report_path());
    assert!(summary.total_revenue > 0.0);
}

#[then("the assignment report lists every trip")]
fn report_lists_every_trip(#[from(world)] world: &SolveWorld) {
    let report = std::fs::read_to_string(world.report_path()).expect("report written");
    let mut lines = report.lines();
    assert!(
        lines
            .next()
            .is_some_and(|header| header.starts_with("trip_id,driver_id,driver_name"))
    );
    let mut ids: Vec<&str> = lines.filter_map(|row| row.split(',').next()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["10A", "11"]);
}

#[then("the command fails because the driver is unknown")]
fn command_fails_unknown_driver(#[from(world)] world: &SolveWorld) {
    match &*world.error() {
        CliError::Roster(RosterError::UnknownDriver { id }) => assert_eq!(*id, 999),
        other => panic!("expected UnknownDriver, found {other:?}"),
    }
}

#[then("the command fails because the trips path is missing")]
fn command_fails_missing_trips(#[from(world)] world: &SolveWorld) {
    match &*world.error() {
        CliError::MissingArgument { field, env } => {
            assert_eq!(*field, ARG_TRIPS);
            assert_eq!(*env, ENV_TRIPS);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[then("the command fails because the trip records cannot be parsed")]
fn command_fails_invalid_trips(#[from(world)] world: &SolveWorld) {
    match &*world.error() {
        CliError::Input(InputError::Parse { path, .. }) => {
            assert_eq!(*path, world.workspace.path("trips.json"));
        }
        other => panic!("expected Input(Parse), found {other:?}"),
    }
}

#[then("the command fails because no solution was found")]
fn command_fails_without_solution(#[from(world)] world: &SolveWorld) {
    match &*world.error() {
        CliError::Dispatch(err) => assert!(
            matches!(
                **err,
                DispatchError::Solve(OrchestratorError::SolutionNotFound { .. })
            ),
            "{err:?}"
        ),
        other => panic!("expected Dispatch, found {other:?}"),
    }
    assert!(!world.report_path().exists());
}

macro_rules! register_solve_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/solve_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: SolveWorld) {
            let _ = world;
        }
    };
}

register_solve_scenario!(solve_happy_path, "dispatching a day from JSON inputs");
register_solve_scenario!(solve_unknown_driver, "rejecting an unknown driver id");
register_solve_scenario!(solve_missing_trips, "rejecting missing trip paths");
register_solve_scenario!(solve_invalid_trips, "rejecting malformed trip files");
register_solve_scenario!(
    solve_without_solution,
    "reporting a backend that never finds a solution"
);
