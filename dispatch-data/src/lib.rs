//! Boundary IO and concrete collaborators for the dispatch engine.
//!
//! Responsibilities:
//! - Load trip and driver records from JSON and rate/merge tables from CSV.
//! - Normalize merge legs and price trips before they reach the model.
//! - Provide the haversine travel-cost provider and the static address book.
//! - Write assignment and mileage reports as CSV.
//!
//! Boundaries:
//! - Do not encode model rules (live in `dispatch-model`).
//! - File access goes through `dispatch-fs`.

#![forbid(unsafe_code)]

pub mod geocode;
pub mod input;
pub mod merge;
pub mod output;
pub mod prepare;
pub mod revenue;
pub mod routing;

pub use geocode::{AddressBook, ConflictingCoordinate};
pub use input::{DriverRecord, InputError, TripRecord, driver_pool, load_records, read_records};
pub use merge::{MergeAddress, MergeSummary, MergeTable, MergeTableError, normalize_merges};
pub use output::{OutputError, save_assignments, save_mileage, write_assignments, write_mileage};
pub use prepare::{PrepareError, PreparedTrips, prepare_trips};
pub use revenue::{RevenueError, RevenueRate, RevenueTable};
pub use routing::HaversineTravelCost;
