//! Tests for the `LpBackend`.

use std::collections::HashMap;
use std::time::Duration;

use dispatch_core::Sense;
use rstest::{fixture, rstest};

use super::*;

fn params() -> SolveParams<'static> {
    SolveParams {
        listener: BudgetListener::time_only(Duration::from_secs(30)),
        warm_start: None,
    }
}

/// Two binaries, at least one of which must be chosen, the first costing
/// more than the second.
#[fixture]
fn choice() -> (LpBackend, VarId, VarId) {
    let mut backend = LpBackend::new();
    let first = backend.declare_binary_var("first");
    let second = backend.declare_binary_var("second");
    backend
        .add_linear_constraint(
            LinearConstraint::ge(LinearExpr::new().term(first, 1.0).term(second, 1.0), 1.0),
            None,
        )
        .expect("declared variables");
    backend.set_objective(
        LinearExpr::new().term(first, 3.0).term(second, 2.0),
        Direction::Minimize,
    );
    (backend, first, second)
}

#[rstest]
fn cheapest_binary_is_chosen(choice: (LpBackend, VarId, VarId)) {
    let (mut backend, first, second) = choice;
    let report = backend.solve(&params()).expect("solve succeeds");

    assert_eq!(report.status, SolveStatus::Optimal);
    let objective = report.objective.expect("objective reported");
    assert!((objective - 2.0).abs() < 1e-6);
    assert!(backend.value_of(first).expect("value") < 0.5);
    assert!(backend.value_of(second).expect("value") > 0.5);
}

#[rstest]
fn removing_a_group_relaxes_the_model(choice: (LpBackend, VarId, VarId)) {
    let (mut backend, first, second) = choice;
    backend
        .add_linear_constraint(
            LinearConstraint::eq(LinearExpr::new().term(second, 1.0), 0.0),
            Some(ConstraintGroup::SingleRider),
        )
        .expect("declared variables");
    backend.solve(&params()).expect("solve succeeds");
    assert!(backend.value_of(first).expect("value") > 0.5);

    assert_eq!(backend.remove_constraints(ConstraintGroup::SingleRider), 1);
    assert_eq!(backend.group_len(ConstraintGroup::SingleRider), 0);
    assert_eq!(backend.constraint_count(), 1);
    backend.solve(&params()).expect("solve succeeds");
    assert!(backend.value_of(second).expect("value") > 0.5);
}

#[rstest]
fn contradictory_constraints_are_infeasible(choice: (LpBackend, VarId, VarId)) {
    let (mut backend, first, second) = choice;
    for var in [first, second] {
        backend
            .add_linear_constraint(
                LinearConstraint::le(LinearExpr::new().term(var, 1.0), 0.0),
                Some(ConstraintGroup::EarlyDay),
            )
            .expect("declared variables");
    }
    let report = backend.solve(&params()).expect("solve returns a status");
    assert_eq!(report.status, SolveStatus::Infeasible);
    assert_eq!(report.objective, None);
    assert_eq!(backend.value_of(first), None);
}

#[rstest]
#[case(LinearConstraint::eq(LinearExpr::new(), 1.0), SolveStatus::Infeasible)]
#[case(LinearConstraint::eq(LinearExpr::new(), 0.0), SolveStatus::Optimal)]
#[case(LinearConstraint::le(LinearExpr::new().plus(2.0), 1.0), SolveStatus::Infeasible)]
fn constant_constraints_are_checked_directly(
    choice: (LpBackend, VarId, VarId),
    #[case] constraint: LinearConstraint,
    #[case] expected: SolveStatus,
) {
    let (mut backend, _, _) = choice;
    backend
        .add_linear_constraint(constraint, None)
        .expect("no variables referenced");
    let report = backend.solve(&params()).expect("solve returns a status");
    assert_eq!(report.status, expected);
}

#[rstest]
fn undeclared_variables_are_rejected() {
    let mut backend = LpBackend::new();
    backend.declare_binary_var("only");
    let err = backend
        .add_linear_constraint(
            LinearConstraint::le(LinearExpr::new().term(VarId::new(4), 1.0), 1.0),
            None,
        )
        .expect_err("unknown variable");
    assert_eq!(err, BackendError::UnknownVariable { index: 4 });
}

#[rstest]
fn unbounded_objective_is_an_error() {
    let mut backend = LpBackend::new();
    let x = backend.declare_continuous_var(0.0, None, "x");
    backend.set_objective(LinearExpr::new().term(x, 1.0), Direction::Maximize);
    let err = backend.solve(&params()).expect_err("unbounded");
    assert_eq!(err, BackendError::Unbounded);
}

#[rstest]
fn constants_move_to_the_right_hand_side() {
    let mut backend = LpBackend::new();
    let x = backend.declare_continuous_var(0.0, Some(100.0), "x");
    // x + 4 >= 10
    backend
        .add_linear_constraint(
            LinearConstraint::ge(LinearExpr::new().term(x, 1.0).plus(4.0), 10.0),
            None,
        )
        .expect("declared variables");
    backend.set_objective(LinearExpr::new().term(x, 1.0).plus(1.0), Direction::Minimize);
    let report = backend.solve(&params()).expect("solve succeeds");
    assert!((backend.value_of(x).expect("value") - 6.0).abs() < 1e-6);
    // The reported objective includes the constant offset.
    assert!((report.objective.expect("objective") - 7.0).abs() < 1e-6);
}

#[rstest]
fn feasible_warm_starts_keep_the_optimum(choice: (LpBackend, VarId, VarId)) {
    let (mut backend, first, second) = choice;
    backend.solve(&params()).expect("solve succeeds");
    let incumbent = Incumbent::capture(&backend, Some(2.0), [first, second]);
    let report = backend
        .solve(&SolveParams {
            listener: BudgetListener::with_gap(Duration::from_secs(30), 0.01),
            warm_start: Some(&incumbent),
        })
        .expect("solve succeeds");
    assert!(report.status.has_solution());
    assert!((report.objective.expect("objective") - 2.0).abs() < 1e-6);
    assert!(backend.value_of(second).expect("value") > 0.5);
}

#[rstest]
fn worse_warm_starts_are_improved(choice: (LpBackend, VarId, VarId)) {
    let (mut backend, first, second) = choice;
    let dear = Incumbent::from_values(Some(3.0), HashMap::from([(first, 1.0), (second, 0.0)]));
    let report = backend
        .solve(&SolveParams {
            listener: BudgetListener::time_only(Duration::from_secs(30)),
            warm_start: Some(&dear),
        })
        .expect("solve succeeds");
    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.objective.expect("objective") - 2.0).abs() < 1e-6);
}

#[rstest]
#[case::partial(HashMap::from([(VarId::new(1), 1.0)]))]
#[case::violating(HashMap::from([(VarId::new(0), 0.0), (VarId::new(1), 0.0)]))]
#[case::fractional(HashMap::from([(VarId::new(0), 0.5), (VarId::new(1), 0.5)]))]
fn unusable_warm_starts_are_ignored(
    choice: (LpBackend, VarId, VarId),
    #[case] values: HashMap<VarId, f64>,
) {
    let (backend, _, _) = choice;
    assert_eq!(
        backend.feasible_start(&Incumbent::from_values(None, values)),
        None
    );
}

#[rstest]
fn warm_starts_bound_the_objective(choice: (LpBackend, VarId, VarId)) {
    let (backend, first, second) = choice;
    let start = backend
        .feasible_start(&Incumbent::from_values(
            None,
            HashMap::from([(first, 1.0), (second, 0.0)]),
        ))
        .expect("feasible start");
    assert_eq!(start.objective, Some(3.0));

    let cutoff = backend.cutoff(&start).expect("objective cut-off");
    assert_eq!(cutoff.sense, Sense::Le);
    assert!((cutoff.rhs - 3.0).abs() < 1e-5);
    assert_eq!(backend.problem(Some(&start)).constraints.len(), 2);
    assert_eq!(backend.problem(None).constraints.len(), 1);
}

fn warm_start() -> WarmStart {
    WarmStart {
        values: vec![0.0, 1.0],
        objective: Some(2.0),
    }
}

#[rstest]
fn expired_budget_returns_the_warm_start() {
    let listener = BudgetListener::time_only(Duration::from_secs(1));
    let (report, values) = settle(Err(RecvTimeoutError::Timeout), Some(warm_start()), &listener)
        .expect("timeout is a status");
    assert_eq!(report.status, SolveStatus::Feasible);
    assert_eq!(report.objective, Some(2.0));
    assert_eq!(values, vec![0.0, 1.0]);
}

#[rstest]
fn expired_budget_without_a_start_is_aborted() {
    let listener = BudgetListener::time_only(Duration::from_secs(1));
    let (report, values) =
        settle(Err(RecvTimeoutError::Timeout), None, &listener).expect("timeout is a status");
    assert_eq!(report.status, SolveStatus::Aborted);
    assert!(!report.status.has_solution());
    assert!(values.is_empty());
}

#[rstest]
fn lost_worker_is_a_solver_error() {
    let listener = BudgetListener::time_only(Duration::from_secs(1));
    let err = settle(Err(RecvTimeoutError::Disconnected), None, &listener)
        .expect_err("no result");
    assert!(matches!(err, BackendError::Solver { .. }), "{err:?}");
}

#[rstest]
fn cut_off_infeasibility_keeps_the_warm_start() {
    let listener = BudgetListener::time_only(Duration::from_secs(1));
    let infeasible = Solved {
        report: SolveReport {
            status: SolveStatus::Infeasible,
            objective: None,
        },
        values: Vec::new(),
    };
    let (report, values) =
        settle(Ok(Ok(infeasible)), Some(warm_start()), &listener).expect("status");
    assert_eq!(report.status, SolveStatus::Feasible);
    assert_eq!(values, vec![0.0, 1.0]);
}

#[rstest]
fn waiting_stops_at_the_time_limit() {
    let (sender, pending) = std::sync::mpsc::channel::<Result<Solved, BackendError>>();
    let limit = Duration::from_millis(50);
    let started = std::time::Instant::now();
    let outcome = pending.recv_timeout(limit);
    let (report, _) = settle(outcome, None, &BudgetListener::time_only(limit)).expect("status");
    assert_eq!(report.status, SolveStatus::Aborted);
    assert!(started.elapsed() >= limit);
    drop(sender);
}
