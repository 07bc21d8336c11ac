//! Dispatch model construction and staged solving.
//!
//! The crate turns trips and drivers into a pickup-and-delivery graph,
//! declares one set of decision variables per feasible driver and edge pair
//! on a [`dispatch_core::MipBackend`], generates the routing constraints and
//! objective, drives the two-stage relax-and-resolve solve, and reads the
//! resulting routes back as assignment records.
//!
//! [`Optimizer`] runs the whole pipeline; the individual stages are public
//! for callers that need to inspect or drive them separately.

#![forbid(unsafe_code)]

pub mod constraints;
pub mod extract;
pub mod feasibility;
pub mod graph;
mod model;
pub mod objective;
pub mod orchestrator;
pub mod variables;

pub use constraints::{ConstraintGenerator, ConstraintSet, GroupedConstraint};
pub use extract::{
    AssignmentRecord, DriverMileage, Extraction, MISSING_DROPOFF, SolutionExtractor,
};
pub use feasibility::FeasibilityFilter;
pub use graph::{
    DriverIdx, Edge, EdgeId, EdgeKind, EdgeOutcome, GraphBuilder, GraphError, Node, NodeId,
    NodeKind, RejectedTrip, RejectionReason, TimeWindow, TripGraph, TripIdx,
};
pub use model::{DispatchError, DispatchModel, DispatchPlan, Optimizer};
pub use objective::{ObjectiveBuilder, ObjectiveTerms};
pub use orchestrator::{OrchestratorError, SolveOrchestrator, SolveOutcome, SolveStage};
pub use variables::{DecisionPair, DecisionVariables, ModelBuilder, PairId};
