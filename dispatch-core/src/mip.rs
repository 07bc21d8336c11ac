//! Mixed-integer solver collaborator.
//!
//! The dispatch model talks to its solver only through [`MipBackend`]:
//! declare variables, add linear constraints (optionally tagged with a
//! removable [`ConstraintGroup`]), set an objective, solve under a budget and
//! read values back.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::BudgetListener;

/// Opaque handle to a solver variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    /// Wrap a backend-specific index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The backend-specific index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Affine expression `Σ coef·var + constant`.
///
/// # Examples
/// ```
/// use dispatch_core::{LinearExpr, VarId};
///
/// let x = VarId::new(0);
/// let y = VarId::new(1);
/// let expr = LinearExpr::new().term(x, 2.0).term(y, -1.0).plus(3.0);
/// let value = expr.evaluate(|var| if var == x { 1.5 } else { 4.0 });
/// assert!((value - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    /// The empty expression, equal to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            terms: Vec::new(),
            constant: 0.0,
        }
    }

    /// Builder form of [`LinearExpr::add_term`].
    #[must_use]
    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    /// Builder form of [`LinearExpr::add_constant`].
    #[must_use]
    pub fn plus(mut self, constant: f64) -> Self {
        self.add_constant(constant);
        self
    }

    /// Append `coefficient · var`.
    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    /// Add a constant offset.
    pub fn add_constant(&mut self, constant: f64) {
        self.constant += constant;
    }

    /// Append `scale · other`.
    pub fn add_scaled(&mut self, other: &Self, scale: f64) {
        self.terms
            .extend(other.terms.iter().map(|(var, coef)| (*var, coef * scale)));
        self.constant += other.constant * scale;
    }

    /// Raw terms, possibly repeating a variable.
    #[must_use]
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    /// Constant offset.
    #[must_use]
    pub const fn constant(&self) -> f64 {
        self.constant
    }

    /// Whether the expression has no variable terms.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the expression under a variable assignment.
    pub fn evaluate(&self, mut value: impl FnMut(VarId) -> f64) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (var, coef)| acc + coef * value(*var))
    }
}

/// Relation between a constraint's expression and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    /// `expr ≤ rhs`
    Le,
    /// `expr ≥ rhs`
    Ge,
    /// `expr = rhs`
    Eq,
}

/// A linear constraint `expr (≤ | ≥ | =) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    /// Left-hand side.
    pub expr: LinearExpr,
    /// Relation.
    pub sense: Sense,
    /// Right-hand side constant.
    pub rhs: f64,
}

impl LinearConstraint {
    /// `expr ≤ rhs`
    #[must_use]
    pub const fn le(expr: LinearExpr, rhs: f64) -> Self {
        Self {
            expr,
            sense: Sense::Le,
            rhs,
        }
    }

    /// `expr ≥ rhs`
    #[must_use]
    pub const fn ge(expr: LinearExpr, rhs: f64) -> Self {
        Self {
            expr,
            sense: Sense::Ge,
            rhs,
        }
    }

    /// `expr = rhs`
    #[must_use]
    pub const fn eq(expr: LinearExpr, rhs: f64) -> Self {
        Self {
            expr,
            sense: Sense::Eq,
            rhs,
        }
    }

    /// Whether an assignment satisfies the constraint within `tolerance`.
    pub fn is_satisfied(&self, value: impl FnMut(VarId) -> f64, tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(value);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Tag for constraints the staged solve may relax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintGroup {
    /// Every primary trip is driven directly by exactly one driver.
    SingleRider,
    /// Drivers without early-start duty may not leave before the cut-off.
    EarlyDay,
}

impl ConstraintGroup {
    /// Stable tag used in logs.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::SingleRider => "single-rider",
            Self::EarlyDay => "early-day",
        }
    }
}

impl fmt::Display for ConstraintGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Optimisation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Minimise the objective.
    Minimize,
    /// Maximise the objective.
    Maximize,
}

/// Outcome class of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible incumbent found; the budget ended the search.
    Feasible,
    /// The model has no feasible solution.
    Infeasible,
    /// The budget ended the search before any incumbent was found.
    Aborted,
}

impl SolveStatus {
    /// Whether the solve produced values worth reading.
    #[must_use]
    pub const fn has_solution(self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible)
    }
}

/// Result of [`MipBackend::solve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    /// Outcome class.
    pub status: SolveStatus,
    /// Objective value of the incumbent, when there is one.
    pub objective: Option<f64>,
}

/// A snapshot of variable values from a feasible solve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Incumbent {
    /// Objective value reported with the snapshot.
    pub objective: Option<f64>,
    values: HashMap<VarId, f64>,
}

impl Incumbent {
    /// Capture the current values of `vars` from `backend`.
    pub fn capture<B, I>(backend: &B, objective: Option<f64>, vars: I) -> Self
    where
        B: MipBackend + ?Sized,
        I: IntoIterator<Item = VarId>,
    {
        let values = vars
            .into_iter()
            .filter_map(|var| backend.value_of(var).map(|value| (var, value)))
            .collect();
        Self { objective, values }
    }

    /// Build a snapshot from explicit values.
    #[must_use]
    pub fn from_values(objective: Option<f64>, values: HashMap<VarId, f64>) -> Self {
        Self { objective, values }
    }

    /// Value of `var`, if it was captured.
    #[must_use]
    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(&var).copied()
    }

    /// Value of `var`, reading missing variables as zero.
    #[must_use]
    pub fn value_or_zero(&self, var: VarId) -> f64 {
        self.value(var).unwrap_or(0.0)
    }

    /// Iterate over captured values.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.values.iter().map(|(var, value)| (*var, *value))
    }

    /// Number of captured values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Inputs to a single [`MipBackend::solve`] call.
#[derive(Debug, Clone, Copy)]
pub struct SolveParams<'a> {
    /// Budget the backend must respect.
    pub listener: BudgetListener,
    /// Starting incumbent, when the caller has one.
    pub warm_start: Option<&'a Incumbent>,
}

/// Errors raised by a solver backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// A constraint or objective referenced an undeclared variable.
    #[error("variable {index} was never declared")]
    UnknownVariable {
        /// Index of the offending variable.
        index: usize,
    },
    /// The model is unbounded in the optimisation direction.
    #[error("model is unbounded")]
    Unbounded,
    /// The solver failed for a backend-specific reason.
    #[error("solver failure: {message}")]
    Solver {
        /// Backend-specific detail.
        message: String,
    },
}

/// A mixed-integer programming engine.
///
/// Implementations own the model state. Constraints tagged with a
/// [`ConstraintGroup`] can later be removed as a unit; untagged constraints
/// are permanent.
pub trait MipBackend {
    /// Declare a 0/1 variable.
    fn declare_binary_var(&mut self, name: &str) -> VarId;

    /// Declare a continuous variable with a lower bound and optional upper
    /// bound.
    fn declare_continuous_var(&mut self, lower: f64, upper: Option<f64>, name: &str) -> VarId;

    /// Add a constraint, optionally tagged with a removable group.
    ///
    /// # Errors
    /// Returns [`BackendError::UnknownVariable`] when the constraint
    /// references a variable this backend did not declare.
    fn add_linear_constraint(
        &mut self,
        constraint: LinearConstraint,
        group: Option<ConstraintGroup>,
    ) -> Result<(), BackendError>;

    /// Remove every constraint tagged with `group`, returning how many were
    /// removed.
    fn remove_constraints(&mut self, group: ConstraintGroup) -> usize;

    /// Replace the objective.
    fn set_objective(&mut self, objective: LinearExpr, direction: Direction);

    /// Solve the current model.
    ///
    /// # Errors
    /// Returns a [`BackendError`] when the engine fails; infeasibility is a
    /// status, not an error.
    fn solve(&mut self, params: &SolveParams<'_>) -> Result<SolveReport, BackendError>;

    /// Value of `var` in the most recent solution.
    fn value_of(&self, var: VarId) -> Option<f64>;
}
