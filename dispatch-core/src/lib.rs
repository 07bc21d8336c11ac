//! Core domain types for the dispatch engine.
//!
//! The crate defines the input vocabulary (trips, drivers, locations and
//! levels of service), optimizer configuration, and the collaborator traits
//! the model crate depends on: travel-cost lookup, address resolution and a
//! mixed-integer solver backend.

#![forbid(unsafe_code)]

mod config;
mod driver;
mod listener;
mod location;
mod los;
mod mip;
pub mod roster;
pub mod time;
mod travel;
mod trip;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{ConfigError, OptimizerConfig, StageBudget};
pub use driver::{Driver, default_capacity};
pub use listener::{BudgetListener, ProgressData};
pub use location::Location;
pub use los::{AMBULATORY_SPACE, LevelOfService, UnknownLevelOfService, WHEELCHAIR_SPACE};
pub use mip::{
    BackendError, ConstraintGroup, Direction, Incumbent, LinearConstraint, LinearExpr,
    MipBackend, Sense, SolveParams, SolveReport, SolveStatus, VarId,
};
pub use roster::RosterError;
pub use time::{DayTime, TimeParseError};
pub use travel::{
    AddressResolver, ResolveError, TravelCost, TravelCostError, TravelCostProvider,
};
pub use trip::{ItineraryLeg, LegSuffix, Trip};
