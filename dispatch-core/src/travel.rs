//! Travel-cost and address-resolution collaborators.

use geo::Coord;
use thiserror::Error;

use crate::Location;

/// Distance and duration of driving between two locations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TravelCost {
    /// Road miles.
    pub miles: f64,
    /// Driving time as a day fraction.
    pub time: f64,
}

/// Errors from [`TravelCostProvider::travel_cost`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TravelCostError {
    /// The provider produced a negative or non-finite cost.
    #[error("invalid travel cost from {from} to {to}")]
    InvalidCost {
        /// Origin address.
        from: String,
        /// Destination address.
        to: String,
    },
    /// The provider could not be reached or had no answer.
    #[error("travel cost unavailable from {from} to {to}: {message}")]
    Unavailable {
        /// Origin address.
        from: String,
        /// Destination address.
        to: String,
        /// Provider-specific detail.
        message: String,
    },
}

/// Compute travel distance and time between two locations.
///
/// # Examples
///
/// ```rust
/// use geo::Coord;
/// use dispatch_core::{Location, TravelCost, TravelCostError, TravelCostProvider};
///
/// struct Flat;
///
/// impl TravelCostProvider for Flat {
///     fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError> {
///         let miles = if from.address == to.address { 0.0 } else { 1.0 };
///         Ok(TravelCost { miles, time: miles / 30.0 / 24.0 })
///     }
/// }
///
/// let a = Location::new("a", Coord { x: 0.0, y: 0.0 });
/// let b = Location::new("b", Coord { x: 0.0, y: 0.0 });
/// assert!((Flat.travel_cost(&a, &b)?.miles - 1.0).abs() < f64::EPSILON);
/// # Ok::<(), TravelCostError>(())
/// ```
pub trait TravelCostProvider {
    /// Return the cost of driving from `from` to `to`.
    fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError>;
}

impl<P: TravelCostProvider + ?Sized> TravelCostProvider for &P {
    fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError> {
        (**self).travel_cost(from, to)
    }
}

/// Errors from [`AddressResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The address is not known to the resolver.
    #[error("no coordinate known for address `{address}`")]
    UnknownAddress {
        /// The address that failed to resolve.
        address: String,
    },
}

/// Map an address string to a coordinate.
pub trait AddressResolver {
    /// Resolve `address` to a WGS84 coordinate.
    fn resolve(&self, address: &str) -> Result<Coord<f64>, ResolveError>;
}

impl<R: AddressResolver + ?Sized> AddressResolver for &R {
    fn resolve(&self, address: &str) -> Result<Coord<f64>, ResolveError> {
        (**self).resolve(address)
    }
}
