//! [`MipBackend`] implementation backed by `good_lp`.

use std::sync::mpsc::RecvTimeoutError;

use dispatch_core::{
    BackendError, BudgetListener, ConstraintGroup, Direction, Incumbent, LinearConstraint,
    LinearExpr, MipBackend, SolveParams, SolveReport, SolveStatus, VarId,
};

use crate::lp::{self, Problem, Solved, VarKind, VarSpec};

/// Tolerance for checking constraints that have no variable terms.
const CONSTANT_TOLERANCE: f64 = 1e-9;

/// Tolerance for accepting a warm start as a solution of the current model.
const WARM_START_TOLERANCE: f64 = 1e-6;

/// Relative slack of the objective cut-off taken from a warm start.
const CUTOFF_SLACK: f64 = 1e-6;

/// A [`MipBackend`] solving with `microlp` through `good_lp`.
///
/// Constraints without variable terms are checked directly: a violated one
/// makes the model infeasible without calling the solver, a satisfied one is
/// dropped.
///
/// Each solve runs on a worker thread and is awaited for at most the
/// listener's time limit. A warm start that satisfies the current model caps
/// the objective for the search and is returned as
/// [`SolveStatus::Feasible`] when the limit expires first; without one an
/// expired solve is [`SolveStatus::Aborted`]. Completed solves are proven
/// optimal, so any gap target is met.
///
/// # Examples
/// ```
/// use dispatch_core::{
///     Direction, LinearConstraint, LinearExpr, MipBackend, SolveParams, SolveStatus,
///     BudgetListener,
/// };
/// use dispatch_solver_lp::LpBackend;
/// use std::time::Duration;
///
/// let mut backend = LpBackend::new();
/// let x = backend.declare_continuous_var(0.0, Some(10.0), "x");
/// let pick = backend.declare_binary_var("pick");
/// backend.add_linear_constraint(
///     LinearConstraint::ge(LinearExpr::new().term(x, 1.0).term(pick, 2.0), 3.0),
///     None,
/// )?;
/// backend.set_objective(LinearExpr::new().term(x, 1.0).term(pick, 1.0), Direction::Minimize);
/// let report = backend.solve(&SolveParams {
///     listener: BudgetListener::time_only(Duration::from_secs(5)),
///     warm_start: None,
/// })?;
/// assert_eq!(report.status, SolveStatus::Optimal);
/// assert!((report.objective.unwrap_or_default() - 2.0).abs() < 1e-6);
/// # Ok::<(), dispatch_core::BackendError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LpBackend {
    variables: Vec<VarSpec>,
    constraints: Vec<(LinearConstraint, Option<ConstraintGroup>)>,
    objective: Option<(LinearExpr, Direction)>,
    values: Vec<f64>,
}

impl LpBackend {
    /// An empty model.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            values: Vec::new(),
        }
    }

    /// Number of declared variables.
    #[must_use]
    pub const fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of stored constraints, permanent and grouped.
    #[must_use]
    pub const fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of stored constraints tagged with `group`.
    #[must_use]
    pub fn group_len(&self, group: ConstraintGroup) -> usize {
        self.constraints
            .iter()
            .filter(|(_, tag)| *tag == Some(group))
            .count()
    }

    fn declare(&mut self, name: &str, kind: VarKind) -> VarId {
        let id = VarId::new(self.variables.len());
        self.variables.push(VarSpec {
            name: name.to_owned(),
            kind,
        });
        id
    }

    fn violated_constant(&self) -> Option<&LinearConstraint> {
        self.constraints
            .iter()
            .map(|(constraint, _)| constraint)
            .filter(|constraint| constraint.expr.is_constant())
            .find(|constraint| !constraint.is_satisfied(|_| 0.0, CONSTANT_TOLERANCE))
    }

    /// `start` as a full assignment, if it satisfies every bound and stored
    /// constraint.
    fn feasible_start(&self, start: &Incumbent) -> Option<WarmStart> {
        let values = (0..self.variables.len())
            .map(|index| start.value(VarId::new(index)))
            .collect::<Option<Vec<f64>>>()?;
        let lookup = |var: VarId| values.get(var.index()).copied().unwrap_or(0.0);
        let in_domain = self
            .variables
            .iter()
            .zip(&values)
            .all(|(declared, value)| declared.kind.admits(*value, WARM_START_TOLERANCE));
        let satisfied = self
            .constraints
            .iter()
            .all(|(constraint, _)| constraint.is_satisfied(&lookup, WARM_START_TOLERANCE));
        if !in_domain || !satisfied {
            return None;
        }
        let objective = self
            .objective
            .as_ref()
            .map(|(expr, _)| expr.evaluate(&lookup));
        Some(WarmStart { values, objective })
    }

    /// Bound the objective by the warm start's value.
    fn cutoff(&self, start: &WarmStart) -> Option<LinearConstraint> {
        let (expr, direction) = self.objective.as_ref()?;
        let bound = start.objective?;
        if expr.is_constant() {
            return None;
        }
        let slack = CUTOFF_SLACK * bound.abs().max(1.0);
        Some(match direction {
            Direction::Minimize => LinearConstraint::le(expr.clone(), bound + slack),
            Direction::Maximize => LinearConstraint::ge(expr.clone(), bound - slack),
        })
    }

    fn problem(&self, start: Option<&WarmStart>) -> Problem {
        let mut constraints: Vec<LinearConstraint> = self
            .constraints
            .iter()
            .map(|(constraint, _)| constraint)
            .filter(|constraint| !constraint.expr.is_constant())
            .cloned()
            .collect();
        constraints.extend(start.and_then(|found| self.cutoff(found)));
        Problem {
            variables: self.variables.clone(),
            constraints,
            objective: self.objective.clone(),
        }
    }
}

/// A warm start checked against the current model.
#[derive(Debug, Clone, PartialEq)]
struct WarmStart {
    values: Vec<f64>,
    objective: Option<f64>,
}

impl WarmStart {
    fn into_solution(self, status: SolveStatus) -> (SolveReport, Vec<f64>) {
        let report = SolveReport {
            status,
            objective: self.objective,
        };
        (report, self.values)
    }
}

/// Turn the outcome of waiting on a worker into a report and values.
fn settle(
    outcome: Result<Result<Solved, BackendError>, RecvTimeoutError>,
    start: Option<WarmStart>,
    listener: &BudgetListener,
) -> Result<(SolveReport, Vec<f64>), BackendError> {
    match outcome {
        Ok(Ok(Solved { report, values })) if report.status == SolveStatus::Infeasible => {
            // Only the cut-off can exclude a feasible warm start.
            Ok(start.map_or_else(
                || (report, values),
                |found| found.into_solution(SolveStatus::Feasible),
            ))
        }
        Ok(Ok(Solved { report, values })) => Ok((report, values)),
        Ok(Err(err)) => Err(err),
        Err(RecvTimeoutError::Timeout) => {
            log::warn!(
                "microlp did not finish within {:.1}s; {}",
                listener.time_limit().as_secs_f64(),
                if start.is_some() {
                    "keeping the warm start"
                } else {
                    "no solution available"
                }
            );
            Ok(start.map_or_else(
                || {
                    let report = SolveReport {
                        status: SolveStatus::Aborted,
                        objective: None,
                    };
                    (report, Vec::new())
                },
                |found| found.into_solution(SolveStatus::Feasible),
            ))
        }
        Err(RecvTimeoutError::Disconnected) => Err(BackendError::Solver {
            message: "the solver thread stopped without a result".to_owned(),
        }),
    }
}

impl MipBackend for LpBackend {
    fn declare_binary_var(&mut self, name: &str) -> VarId {
        self.declare(name, VarKind::Binary)
    }

    fn declare_continuous_var(&mut self, lower: f64, upper: Option<f64>, name: &str) -> VarId {
        self.declare(name, VarKind::Continuous { lower, upper })
    }

    fn add_linear_constraint(
        &mut self,
        constraint: LinearConstraint,
        group: Option<ConstraintGroup>,
    ) -> Result<(), BackendError> {
        if let Some((var, _)) = constraint
            .expr
            .terms()
            .iter()
            .find(|(var, _)| var.index() >= self.variables.len())
        {
            return Err(BackendError::UnknownVariable { index: var.index() });
        }
        self.constraints.push((constraint, group));
        Ok(())
    }

    fn remove_constraints(&mut self, group: ConstraintGroup) -> usize {
        let before = self.constraints.len();
        self.constraints.retain(|(_, tag)| *tag != Some(group));
        before - self.constraints.len()
    }

    fn set_objective(&mut self, objective: LinearExpr, direction: Direction) {
        self.objective = Some((objective, direction));
    }

    fn solve(&mut self, params: &SolveParams<'_>) -> Result<SolveReport, BackendError> {
        self.values.clear();
        if let Some(violated) = self.violated_constant() {
            log::info!(
                "constant constraint {:?} {} is violated; model is infeasible",
                violated.sense,
                violated.rhs - violated.expr.constant()
            );
            return Ok(SolveReport {
                status: SolveStatus::Infeasible,
                objective: None,
            });
        }

        let start = params.warm_start.and_then(|incumbent| {
            let checked = self.feasible_start(incumbent);
            if checked.is_none() {
                log::debug!("warm start does not satisfy the current model; solving cold");
            }
            checked
        });
        let problem = self.problem(start.as_ref());
        log::debug!(
            "solving with microlp: {} variables, {} constraints, warm start: {}",
            problem.variables.len(),
            problem.constraints.len(),
            start.is_some()
        );
        let pending = lp::spawn(problem)?;
        let outcome = pending.recv_timeout(params.listener.time_limit());
        let (report, values) = settle(outcome, start, &params.listener)?;
        self.values = values;
        Ok(report)
    }

    fn value_of(&self, var: VarId) -> Option<f64> {
        self.values.get(var.index()).copied()
    }
}

#[cfg(test)]
mod tests;
