//! `good_lp` modelling helpers for `LpBackend`.
//!
//! This module turns stored variable declarations, constraints and the
//! objective into a `microlp` problem, solves it on a worker thread, and maps
//! the outcome back into dispatch types.

use std::sync::mpsc::{self, Receiver};
use std::thread;

use dispatch_core::{
    BackendError, Direction, LinearConstraint, LinearExpr, Sense, SolveReport, SolveStatus,
};
use good_lp::solvers::microlp::microlp;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    VariableDefinition, variable,
};

/// Kind and bounds of a declared variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum VarKind {
    Binary,
    Continuous { lower: f64, upper: Option<f64> },
}

/// A variable as declared through the backend.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VarSpec {
    pub(crate) name: String,
    pub(crate) kind: VarKind,
}

impl VarKind {
    /// Whether `value` lies within the declared domain.
    pub(crate) fn admits(&self, value: f64, tolerance: f64) -> bool {
        match *self {
            Self::Binary => value.abs() <= tolerance || (value - 1.0).abs() <= tolerance,
            Self::Continuous { lower, upper } => {
                value >= lower - tolerance && upper.is_none_or(|bound| value <= bound + tolerance)
            }
        }
    }
}

impl VarSpec {
    fn definition(&self) -> VariableDefinition {
        let base = match self.kind {
            VarKind::Binary => variable().binary(),
            VarKind::Continuous { lower, upper } => variable()
                .min(lower)
                .max(upper.unwrap_or(f64::INFINITY)),
        };
        base.name(self.name.as_str())
    }
}

/// Everything needed to build one `microlp` problem.
#[derive(Debug, Clone)]
pub(crate) struct Problem {
    pub(crate) variables: Vec<VarSpec>,
    pub(crate) constraints: Vec<LinearConstraint>,
    pub(crate) objective: Option<(LinearExpr, Direction)>,
}

/// Values and report of a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Solved {
    pub(crate) report: SolveReport,
    pub(crate) values: Vec<f64>,
}

/// Receiving end of a solve running on a worker thread.
pub(crate) type Pending = Receiver<Result<Solved, BackendError>>;

/// Start solving `problem` on a detached worker thread.
///
/// `microlp` cannot be interrupted: a caller that stops waiting leaves the
/// worker to finish on its own, and its result is discarded.
pub(crate) fn spawn(problem: Problem) -> Result<Pending, BackendError> {
    let (sender, receiver) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("microlp".to_owned())
        .spawn(move || {
            if sender.send(solve(&problem)).is_err() {
                log::debug!("microlp finished after its budget expired; result discarded");
            }
        })
        .map_err(|err| BackendError::Solver {
            message: format!("failed to start the solver thread: {err}"),
        })?;
    drop(worker);
    Ok(receiver)
}

/// Solve `problem` with `microlp`.
///
/// Infeasibility is reported as a status; unboundedness and engine failures
/// become [`BackendError`]s.
pub(crate) fn solve(problem: &Problem) -> Result<Solved, BackendError> {
    let Problem {
        variables,
        constraints,
        objective,
    } = problem;

    let mut problem_vars = ProblemVariables::new();
    let handles: Vec<Variable> = variables
        .iter()
        .map(|declared| problem_vars.add(declared.definition()))
        .collect();

    let (goal, direction) = match objective.as_ref() {
        Some((expr, direction)) => (to_expression(expr, &handles)?, *direction),
        None => (Expression::default(), Direction::Minimize),
    };
    let unsolved = match direction {
        Direction::Minimize => problem_vars.minimise(goal),
        Direction::Maximize => problem_vars.maximise(goal),
    };
    let mut model = unsolved.using(microlp);
    for constraint in constraints {
        model = model.with(to_constraint(constraint, &handles)?);
    }

    match model.solve() {
        Ok(solution) => {
            let values: Vec<f64> = handles.iter().map(|handle| solution.value(*handle)).collect();
            let objective_value = objective.as_ref().map(|(expr, _)| {
                expr.evaluate(|var| values.get(var.index()).copied().unwrap_or(0.0))
            });
            Ok(Solved {
                report: SolveReport {
                    status: SolveStatus::Optimal,
                    objective: objective_value,
                },
                values,
            })
        }
        Err(ResolutionError::Infeasible) => Ok(Solved {
            report: SolveReport {
                status: SolveStatus::Infeasible,
                objective: None,
            },
            values: Vec::new(),
        }),
        Err(ResolutionError::Unbounded) => Err(BackendError::Unbounded),
        Err(other) => Err(BackendError::Solver {
            message: other.to_string(),
        }),
    }
}

/// Variable terms of `expr` as a `good_lp` expression; the constant is left
/// to the caller.
fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Result<Expression, BackendError> {
    let mut out = Expression::with_capacity(expr.terms().len());
    for (var, coefficient) in expr.terms() {
        let handle = handles
            .get(var.index())
            .ok_or(BackendError::UnknownVariable { index: var.index() })?;
        out.add_mul(*coefficient, *handle);
    }
    Ok(out)
}

fn to_constraint(
    constraint: &LinearConstraint,
    handles: &[Variable],
) -> Result<good_lp::Constraint, BackendError> {
    let lhs = to_expression(&constraint.expr, handles)?;
    let rhs = constraint.rhs - constraint.expr.constant();
    Ok(match constraint.sense {
        Sense::Le => lhs.leq(rhs),
        Sense::Ge => lhs.geq(rhs),
        Sense::Eq => lhs.eq(rhs),
    })
}
