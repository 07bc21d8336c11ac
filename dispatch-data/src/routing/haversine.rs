use dispatch_core::time::ONE_MINUTE;
use dispatch_core::{Location, TravelCost, TravelCostError, TravelCostProvider};
use geo::{Coord, Distance, Haversine, Point};
use thiserror::Error;

/// Assumed driving speed when none is configured.
pub const DEFAULT_SPEED_MPH: f64 = 50.0;

/// Metres in a statute mile.
pub const METERS_PER_MILE: f64 = 1609.344;

/// Rejected assumed speed.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("assumed speed must be a positive number of miles per hour, got {speed_mph}")]
pub struct InvalidSpeed {
    /// The rejected speed.
    pub speed_mph: f64,
}

/// Great-circle travel cost at a constant speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaversineTravelCost {
    speed_mph: f64,
}

impl HaversineTravelCost {
    /// Provider driving at `speed_mph`.
    ///
    /// # Errors
    /// Returns [`InvalidSpeed`] unless the speed is finite and positive.
    pub fn new(speed_mph: f64) -> Result<Self, InvalidSpeed> {
        if speed_mph.is_finite() && speed_mph > 0.0 {
            Ok(Self { speed_mph })
        } else {
            Err(InvalidSpeed { speed_mph })
        }
    }

    /// The assumed speed in miles per hour.
    #[must_use]
    pub const fn speed_mph(&self) -> f64 {
        self.speed_mph
    }

    /// Great-circle miles between two WGS84 coordinates.
    #[must_use]
    pub fn miles_between(from: Coord<f64>, to: Coord<f64>) -> f64 {
        Haversine.distance(Point::from(from), Point::from(to)) / METERS_PER_MILE
    }

    /// Day-fraction duration of driving `miles`, including the fixed
    /// handling minute.
    #[must_use]
    pub fn duration(&self, miles: f64) -> f64 {
        miles / self.speed_mph / 24.0 + ONE_MINUTE
    }
}

impl Default for HaversineTravelCost {
    fn default() -> Self {
        Self {
            speed_mph: DEFAULT_SPEED_MPH,
        }
    }
}

impl TravelCostProvider for HaversineTravelCost {
    fn travel_cost(&self, from: &Location, to: &Location) -> Result<TravelCost, TravelCostError> {
        let miles = Self::miles_between(from.coord, to.coord);
        if !miles.is_finite() {
            return Err(TravelCostError::InvalidCost {
                from: from.address.clone(),
                to: to.address.clone(),
            });
        }
        Ok(TravelCost {
            miles,
            time: self.duration(miles),
        })
    }
}
