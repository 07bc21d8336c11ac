use std::collections::BTreeSet;

use crate::LevelOfService;

/// A vehicle and its operator.
///
/// The driver's route starts and ends at the depot address.
///
/// # Examples
/// ```
/// use dispatch_core::{Driver, LevelOfService};
///
/// let driver = Driver::new(7, "Ana", "1 Depot Way")
///     .with_levels([LevelOfService::Ambulatory, LevelOfService::Wheelchair]);
/// assert!(driver.supports(LevelOfService::Wheelchair));
/// assert!((driver.capacity - 1.5).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Driver {
    /// External driver identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Depot address; route start and end.
    pub depot_address: String,
    /// Vehicle capacity in rider-space units.
    pub capacity: f64,
    /// Levels of service the vehicle supports.
    pub levels: BTreeSet<LevelOfService>,
    /// Whether the driver may depart before the early-day cut-off.
    pub early_day: bool,
}

impl Driver {
    /// Construct an ambulatory-only driver with unit capacity.
    pub fn new(id: u32, name: impl Into<String>, depot_address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            depot_address: depot_address.into(),
            capacity: LevelOfService::Ambulatory.space(),
            levels: BTreeSet::from([LevelOfService::Ambulatory]),
            early_day: false,
        }
    }

    /// Replace the supported levels of service.
    ///
    /// Capacity is reset to the largest space any supported class needs.
    #[must_use]
    pub fn with_levels<I>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = LevelOfService>,
    {
        self.levels = levels.into_iter().collect();
        self.capacity = default_capacity(&self.levels);
        self
    }

    /// Override the vehicle capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the early-start flag.
    #[must_use]
    pub fn with_early_day(mut self, early_day: bool) -> Self {
        self.early_day = early_day;
        self
    }

    /// Whether the vehicle can serve `los`.
    #[must_use]
    pub fn supports(&self, los: LevelOfService) -> bool {
        self.levels.contains(&los)
    }
}

/// Capacity a vehicle gets when the input does not state one.
#[must_use]
pub fn default_capacity(levels: &BTreeSet<LevelOfService>) -> f64 {
    levels
        .iter()
        .map(|los| los.space())
        .fold(LevelOfService::Ambulatory.space(), f64::max)
}
