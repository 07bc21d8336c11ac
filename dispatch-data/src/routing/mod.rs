//! Straight-line travel costs.
//!
//! [`HaversineTravelCost`] implements [`dispatch_core::TravelCostProvider`]
//! by measuring the great-circle distance between two coordinates and
//! driving it at a constant assumed speed. Every move also pays a fixed
//! one-minute handling time, so even a zero-length move has a positive
//! duration.
//!
//! # Example
//!
//! ```
//! use dispatch_core::{Location, TravelCostProvider};
//! use dispatch_data::routing::HaversineTravelCost;
//! use geo::Coord;
//!
//! let provider = HaversineTravelCost::new(30.0)?;
//! let home = Location::new("4 Elm St", Coord { x: -71.06, y: 42.36 });
//! let clinic = Location::new("Mercy Clinic", Coord { x: -71.10, y: 42.35 });
//! let cost = provider.travel_cost(&home, &clinic)?;
//! assert!(cost.miles > 1.0 && cost.miles < 3.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod haversine;

pub use haversine::{DEFAULT_SPEED_MPH, HaversineTravelCost, InvalidSpeed, METERS_PER_MILE};
