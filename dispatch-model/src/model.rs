//! End-to-end wiring of the model components.
//!
//! [`DispatchModel`] owns a built graph together with its declared
//! variables, constraints and objective. [`Optimizer`] runs the whole
//! pipeline against a backend and returns a [`DispatchPlan`].

use chrono::NaiveDate;
use dispatch_core::{
    AddressResolver, BackendError, ConfigError, Driver, MipBackend, OptimizerConfig,
    TravelCostProvider, Trip,
};
use thiserror::Error;

use crate::constraints::{ConstraintGenerator, ConstraintSet};
use crate::extract::{AssignmentRecord, DriverMileage, Extraction, SolutionExtractor};
use crate::graph::{GraphBuilder, GraphError, RejectedTrip, TripGraph};
use crate::objective::{ObjectiveBuilder, ObjectiveTerms};
use crate::orchestrator::{OrchestratorError, SolveOrchestrator, SolveOutcome};
use crate::variables::{DecisionVariables, ModelBuilder};

/// Errors raised while building or solving a dispatch model.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The trip graph could not be built.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The backend rejected the model definition.
    #[error("failed to declare the model: {0}")]
    Backend(#[from] BackendError),
    /// The staged solve produced no solution.
    #[error(transparent)]
    Solve(#[from] OrchestratorError),
}

/// A graph with its model declared on a backend.
#[derive(Debug, Clone)]
pub struct DispatchModel {
    graph: TripGraph,
    vars: DecisionVariables,
    constraints: ConstraintSet,
    objective: ObjectiveTerms,
}

impl DispatchModel {
    /// Declare variables, constraints and the objective for `graph` on
    /// `backend`.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the backend rejects a declaration.
    pub fn declare<B: MipBackend>(
        graph: TripGraph,
        config: &OptimizerConfig,
        backend: &mut B,
    ) -> Result<Self, BackendError> {
        let vars = ModelBuilder::new(&graph).declare(backend)?;
        let constraints = ConstraintGenerator::new(&graph, &vars, config).generate();
        constraints.install(backend)?;
        let objective = ObjectiveBuilder::new(&graph, &vars, config).build();
        objective.apply(backend);
        log::info!(
            "declared model: {} decision pairs, {} constraints",
            vars.len(),
            constraints.len()
        );
        Ok(Self {
            graph,
            vars,
            constraints,
            objective,
        })
    }

    /// Run the staged solve on the backend the model was declared on.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::SolutionNotFound`] when every attempt
    /// fails.
    pub fn solve<B: MipBackend>(
        &self,
        config: &OptimizerConfig,
        backend: &mut B,
    ) -> Result<SolveOutcome, OrchestratorError> {
        SolveOrchestrator::new(&self.constraints, &self.vars, config).run(backend)
    }

    /// Read assignment records out of a solve outcome.
    #[must_use]
    pub fn extract(&self, outcome: &SolveOutcome, trip_date: NaiveDate) -> Extraction {
        SolutionExtractor::new(&self.graph, &self.vars).extract(&outcome.incumbent, trip_date)
    }

    /// The underlying graph.
    #[must_use]
    pub const fn graph(&self) -> &TripGraph {
        &self.graph
    }

    /// Declared decision variables.
    #[must_use]
    pub const fn variables(&self) -> &DecisionVariables {
        &self.vars
    }

    /// Generated constraints.
    #[must_use]
    pub const fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Objective terms.
    #[must_use]
    pub const fn objective(&self) -> &ObjectiveTerms {
        &self.objective
    }
}

/// Outcome of a full optimizer run.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    /// Served trips ordered by estimated pickup.
    pub records: Vec<AssignmentRecord>,
    /// Miles driven by each rostered driver.
    pub mileage: Vec<DriverMileage>,
    /// Trips excluded while building the graph.
    pub rejected: Vec<RejectedTrip>,
    /// Objective value of the accepted solution, when reported.
    pub objective: Option<f64>,
    /// Solve attempts made.
    pub attempts: u32,
    /// Whether the early-day group had to be dropped.
    pub early_day_relaxed: bool,
    /// Records whose estimates failed the consistency check.
    pub inconsistencies: usize,
}

/// Runs the complete pipeline for one day.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use dispatch_core::test_support::{OriginResolver, ScriptedBackend, UnitTravelCost};
/// use dispatch_core::{DayTime, Driver, LevelOfService, OptimizerConfig, Trip};
/// use dispatch_model::{DispatchError, Optimizer, OrchestratorError};
///
/// let config = OptimizerConfig::default();
/// let trip = Trip::new(
///     "T1",
///     "1 Clinic Way",
///     "2 Home Street",
///     DayTime::from_hm(9, 0),
///     DayTime::from_hm(10, 0),
///     LevelOfService::Ambulatory,
/// );
/// let optimizer = Optimizer::new(&config, OriginResolver, UnitTravelCost::default());
/// let mut backend = ScriptedBackend::always_failing();
/// let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default();
/// let err = optimizer
///     .run(&[trip], &[Driver::new(1, "Avery", "Depot")], date, &mut backend)
///     .unwrap_err();
/// assert!(matches!(err, DispatchError::Solve(OrchestratorError::SolutionNotFound { .. })));
/// ```
#[derive(Debug, Clone)]
pub struct Optimizer<'a, R, P> {
    config: &'a OptimizerConfig,
    builder: GraphBuilder<'a, R, P>,
}

impl<'a, R, P> Optimizer<'a, R, P>
where
    R: AddressResolver,
    P: TravelCostProvider,
{
    /// Optimizer resolving addresses with `resolver` and pricing moves with
    /// `travel`.
    pub const fn new(config: &'a OptimizerConfig, resolver: R, travel: P) -> Self {
        Self {
            config,
            builder: GraphBuilder::new(config, resolver, travel),
        }
    }

    /// Build, solve and extract the plan for `trips` and `drivers`.
    ///
    /// # Errors
    /// Returns [`DispatchError`] when the configuration is invalid, the
    /// graph cannot be built, the backend rejects the model, or no solution
    /// is found.
    pub fn run<B: MipBackend>(
        &self,
        trips: &[Trip],
        drivers: &[Driver],
        trip_date: NaiveDate,
        backend: &mut B,
    ) -> Result<DispatchPlan, DispatchError> {
        self.config.validate()?;
        let graph = self.builder.build(trips, drivers)?;
        let model = DispatchModel::declare(graph, self.config, backend)?;
        let outcome = model.solve(self.config, backend)?;
        let Extraction {
            records,
            mileage,
            inconsistencies,
        } = model.extract(&outcome, trip_date);
        Ok(DispatchPlan {
            records,
            mileage,
            rejected: model.graph().rejected_trips().to_vec(),
            objective: outcome.incumbent.objective,
            attempts: outcome.attempts,
            early_day_relaxed: outcome.early_day_relaxed,
            inconsistencies,
        })
    }
}
