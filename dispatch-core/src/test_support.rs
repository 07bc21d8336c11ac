//! Deterministic collaborators for unit and behaviour tests.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use geo::Coord;

use crate::{
    AddressResolver, BackendError, ConstraintGroup, Direction, LinearConstraint, LinearExpr,
    Location, MipBackend, ResolveError, SolveParams, SolveReport, SolveStatus, TravelCost,
    TravelCostError, TravelCostProvider, VarId, time::ONE_MINUTE,
};

/// `TravelCostProvider` returning one mile and a fixed time for every
/// distinct pair, and zero for a location to itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTravelCost {
    /// Time charged per hop as a day fraction.
    pub time: f64,
}

impl Default for UnitTravelCost {
    fn default() -> Self {
        Self {
            time: 10.0 * ONE_MINUTE,
        }
    }
}

impl TravelCostProvider for UnitTravelCost {
    fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError> {
        if from.address == to.address {
            return Ok(TravelCost::default());
        }
        Ok(TravelCost {
            miles: 1.0,
            time: self.time,
        })
    }
}

/// `TravelCostProvider` backed by an explicit table keyed on address pairs,
/// falling back to a default cost.
#[derive(Debug, Clone, Default)]
pub struct TableTravelCost {
    fallback: TravelCost,
    table: HashMap<(String, String), TravelCost>,
}

impl TableTravelCost {
    /// Create a table charging `fallback` for unlisted pairs.
    #[must_use]
    pub fn new(fallback: TravelCost) -> Self {
        Self {
            fallback,
            table: HashMap::new(),
        }
    }

    /// Record the cost from `from` to `to`.
    #[must_use]
    pub fn with(mut self, from: &str, to: &str, cost: TravelCost) -> Self {
        self.table.insert((from.to_owned(), to.to_owned()), cost);
        self
    }
}

impl TravelCostProvider for TableTravelCost {
    fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError> {
        Ok(self
            .table
            .get(&(from.address.clone(), to.address.clone()))
            .copied()
            .unwrap_or(self.fallback))
    }
}

/// `TravelCostProvider` that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTravelCost;

impl TravelCostProvider for FailingTravelCost {
    fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError> {
        Err(TravelCostError::Unavailable {
            from: from.address.clone(),
            to: to.address.clone(),
            message: "scripted failure".to_owned(),
        })
    }
}

/// `AddressResolver` that places every address at the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginResolver;

impl AddressResolver for OriginResolver {
    fn resolve(&self, _address: &str) -> Result<Coord<f64>, ResolveError> {
        Ok(Coord { x: 0.0, y: 0.0 })
    }
}

/// Kind and bounds of a variable declared on a [`ScriptedBackend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedVarKind {
    /// 0/1 variable.
    Binary,
    /// Bounded continuous variable.
    Continuous {
        /// Lower bound.
        lower: f64,
        /// Upper bound, if any.
        upper: Option<f64>,
    },
}

/// Description of one call to [`ScriptedBackend::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolveCall {
    /// Zero-based call index.
    pub index: usize,
    /// Removable groups present when the call was made.
    pub active_groups: BTreeSet<ConstraintGroup>,
    /// Whether a warm start was supplied.
    pub warm_started: bool,
    /// Time limit of the listener.
    pub time_limit: Duration,
    /// Gap target of the listener.
    pub gap_target: Option<f64>,
}

/// Scripted answer to a solve call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedSolve {
    /// Reported status.
    pub status: SolveStatus,
    /// Reported objective.
    pub objective: Option<f64>,
    /// Variable values; undeclared entries are ignored and missing entries
    /// read as zero when the status has a solution.
    pub values: HashMap<VarId, f64>,
}

impl ScriptedSolve {
    /// A solution with every variable at zero.
    #[must_use]
    pub fn zeros(status: SolveStatus) -> Self {
        Self {
            status,
            objective: status.has_solution().then_some(0.0),
            values: HashMap::new(),
        }
    }
}

type Script = Box<dyn FnMut(&SolveCall) -> Result<ScriptedSolve, BackendError>>;

/// In-memory `MipBackend` that records the model and answers solves from a
/// script.
pub struct ScriptedBackend {
    vars: Vec<(String, ScriptedVarKind)>,
    constraints: Vec<(LinearConstraint, Option<ConstraintGroup>)>,
    objective: Option<(LinearExpr, Direction)>,
    values: HashMap<VarId, f64>,
    has_solution: bool,
    calls: Vec<SolveCall>,
    script: Script,
}

impl fmt::Debug for ScriptedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedBackend")
            .field("vars", &self.vars.len())
            .field("constraints", &self.constraints.len())
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl ScriptedBackend {
    /// Backend answering each solve with `script`.
    pub fn new<F>(script: F) -> Self
    where
        F: FnMut(&SolveCall) -> Result<ScriptedSolve, BackendError> + 'static,
    {
        Self {
            vars: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            values: HashMap::new(),
            has_solution: false,
            calls: Vec::new(),
            script: Box::new(script),
        }
    }

    /// Backend whose every solve fails with a solver error.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::new(|call| {
            Err(BackendError::Solver {
                message: format!("scripted failure on call {}", call.index),
            })
        })
    }

    /// Backend reporting infeasibility while `group` is installed and an
    /// all-zero optimum otherwise.
    #[must_use]
    pub fn infeasible_while(group: ConstraintGroup) -> Self {
        Self::new(move |call| {
            let status = if call.active_groups.contains(&group) {
                SolveStatus::Infeasible
            } else {
                SolveStatus::Optimal
            };
            Ok(ScriptedSolve::zeros(status))
        })
    }

    /// Every solve call made so far.
    #[must_use]
    pub fn calls(&self) -> &[SolveCall] {
        &self.calls
    }

    /// Number of declared variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.vars.len()
    }

    /// Name and kind of a declared variable.
    #[must_use]
    pub fn variable(&self, var: VarId) -> Option<(&str, ScriptedVarKind)> {
        self.vars
            .get(var.index())
            .map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Installed constraints with their tags.
    #[must_use]
    pub fn constraints(&self) -> &[(LinearConstraint, Option<ConstraintGroup>)] {
        &self.constraints
    }

    /// Number of installed constraints carrying `group`.
    #[must_use]
    pub fn group_len(&self, group: ConstraintGroup) -> usize {
        self.constraints
            .iter()
            .filter(|(_, tag)| *tag == Some(group))
            .count()
    }

    /// Current objective.
    #[must_use]
    pub const fn objective(&self) -> Option<&(LinearExpr, Direction)> {
        self.objective.as_ref()
    }

    fn active_groups(&self) -> BTreeSet<ConstraintGroup> {
        self.constraints.iter().filter_map(|(_, tag)| *tag).collect()
    }

    fn declare(&mut self, name: &str, kind: ScriptedVarKind) -> VarId {
        let id = VarId::new(self.vars.len());
        self.vars.push((name.to_owned(), kind));
        id
    }
}

impl MipBackend for ScriptedBackend {
    fn declare_binary_var(&mut self, name: &str) -> VarId {
        self.declare(name, ScriptedVarKind::Binary)
    }

    fn declare_continuous_var(&mut self, lower: f64, upper: Option<f64>, name: &str) -> VarId {
        self.declare(name, ScriptedVarKind::Continuous { lower, upper })
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
            .find(|(var, _)| var.index() >= self.vars.len())
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
        let call = SolveCall {
            index: self.calls.len(),
            active_groups: self.active_groups(),
            warm_started: params.warm_start.is_some(),
            time_limit: params.listener.time_limit(),
            gap_target: params.listener.gap_target(),
        };
        self.calls.push(call.clone());
        self.has_solution = false;
        self.values.clear();
        let answer = (self.script)(&call)?;
        self.has_solution = answer.status.has_solution();
        self.values = answer.values;
        Ok(SolveReport {
            status: answer.status,
            objective: answer.objective,
        })
    }

    fn value_of(&self, var: VarId) -> Option<f64> {
        if !self.has_solution || var.index() >= self.vars.len() {
            return None;
        }
        Some(self.values.get(&var).copied().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BudgetListener;
    use rstest::rstest;

    fn params() -> SolveParams<'static> {
        SolveParams {
            listener: BudgetListener::time_only(Duration::from_secs(1)),
            warm_start: None,
        }
    }

    #[rstest]
    fn records_groups_seen_by_each_solve() {
        let mut backend = ScriptedBackend::infeasible_while(ConstraintGroup::EarlyDay);
        let x = backend.declare_binary_var("x");
        backend
            .add_linear_constraint(
                LinearConstraint::ge(LinearExpr::new().term(x, 1.0), 1.0),
                Some(ConstraintGroup::EarlyDay),
            )
            .expect("declared variable");
        let first = backend.solve(&params()).expect("scripted solve");
        assert_eq!(first.status, SolveStatus::Infeasible);
        assert_eq!(backend.value_of(x), None);

        assert_eq!(backend.remove_constraints(ConstraintGroup::EarlyDay), 1);
        let second = backend.solve(&params()).expect("scripted solve");
        assert_eq!(second.status, SolveStatus::Optimal);
        assert_eq!(backend.value_of(x), Some(0.0));
        assert_eq!(backend.calls().len(), 2);
    }

    #[rstest]
    fn rejects_undeclared_variables() {
        let mut backend = ScriptedBackend::always_failing();
        let err = backend
            .add_linear_constraint(
                LinearConstraint::le(LinearExpr::new().term(VarId::new(4), 1.0), 0.0),
                None,
            )
            .expect_err("undeclared variable");
        assert_eq!(err, BackendError::UnknownVariable { index: 4 });
    }

    #[rstest]
    fn unit_cost_is_zero_on_the_diagonal() {
        let here = Location::new("here", Coord { x: 0.0, y: 0.0 });
        let there = Location::new("there", Coord { x: 0.0, y: 0.0 });
        let provider = UnitTravelCost::default();
        assert_eq!(
            provider.travel_cost(&here, &here).expect("cost"),
            TravelCost::default()
        );
        assert!((provider.travel_cost(&here, &there).expect("cost").miles - 1.0).abs() < 1e-12);
    }
}
