//! Facade crate for the patient-transport dispatch engine.
//!
//! This crate re-exports the core domain types and the model builder, and
//! exposes the bundled MIP backend and the CSV/JSON data layer behind
//! feature flags.

#![forbid(unsafe_code)]

pub use dispatch_core::{
    BackendError, ConfigError, DayTime, Driver, ItineraryLeg, LevelOfService, Location,
    MipBackend, OptimizerConfig, SolveParams, SolveReport, SolveStatus, StageBudget, TravelCost,
    TravelCostProvider, Trip,
};
pub use dispatch_core::roster::{RosterError, select_roster};

pub use dispatch_model::{
    AssignmentRecord, DispatchError, DispatchPlan, DriverMileage, GraphBuilder, MISSING_DROPOFF,
    Optimizer, OrchestratorError, RejectedTrip, RejectionReason, SolveOutcome, SolveStage,
    TripGraph,
};

#[cfg(feature = "solver-lp")]
pub use dispatch_solver_lp::LpBackend;

#[cfg(feature = "data")]
pub use dispatch_data::{
    AddressBook, DriverRecord, HaversineTravelCost, MergeTable, PreparedTrips, RevenueTable,
    TripRecord, load_records, prepare_trips, save_assignments, save_mileage,
};
