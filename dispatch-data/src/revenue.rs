//! Mileage-banded revenue rates.

use std::cmp::Ordering;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use dispatch_core::LevelOfService;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Revenue for trips of one level of service whose miles fall inside an
/// inclusive band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRate {
    /// Lowest mileage the rate applies to.
    #[serde(rename = "lower_mileage_bound")]
    pub lower_miles: f64,
    /// Highest mileage the rate applies to.
    #[serde(rename = "upper_mileage_bound")]
    pub upper_miles: f64,
    /// Level of service the rate applies to.
    pub los: LevelOfService,
    /// Flat revenue for any trip in the band.
    pub base_rate: f64,
    /// Additional revenue per mile.
    #[serde(rename = "rate_per_mile")]
    pub per_mile: f64,
}

impl RevenueRate {
    /// Whether `miles` of `los` fall inside this band.
    #[must_use]
    pub fn covers(&self, los: LevelOfService, miles: f64) -> bool {
        self.los == los && (self.lower_miles..=self.upper_miles).contains(&miles)
    }

    /// Revenue for a trip of `miles`.
    #[must_use]
    pub fn revenue(&self, miles: f64) -> f64 {
        self.base_rate + self.per_mile * miles
    }
}

/// Errors raised by [`RevenueTable`].
#[derive(Debug, Error)]
pub enum RevenueError {
    /// A rate's band is empty or inverted.
    #[error("revenue band [{lower}, {upper}] for {los} is empty")]
    InvalidBounds {
        /// Lower bound as given.
        lower: f64,
        /// Upper bound as given.
        upper: f64,
        /// Level of service of the rate.
        los: LevelOfService,
    },
    /// No band covers the trip.
    #[error("unable to calculate revenue for level of service {los} at {miles} miles")]
    RevenueCalculation {
        /// Level of service of the trip.
        los: LevelOfService,
        /// Trip miles.
        miles: f64,
    },
    /// The rate file could not be opened.
    #[error("failed to open revenue table {path}: {source}")]
    Open {
        /// Rate file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The rate file is not valid CSV.
    #[error("failed to read revenue table: {0}")]
    Csv(#[from] csv::Error),
}

/// Revenue rates consulted in file order; the first covering band wins.
///
/// # Examples
/// ```
/// use dispatch_core::LevelOfService;
/// use dispatch_data::revenue::RevenueTable;
///
/// let csv = "lower_mileage_bound,upper_mileage_bound,los,base_rate,rate_per_mile\n\
///            0,10,A,20,2\n\
///            10,100,A,30,1.5\n";
/// let table = RevenueTable::from_csv(csv.as_bytes())?;
/// let revenue = table.revenue(LevelOfService::Ambulatory, 4.0)?;
/// assert!((revenue - 28.0).abs() < 1e-9);
/// assert!(table.revenue(LevelOfService::Wheelchair, 4.0).is_err());
/// # Ok::<(), dispatch_data::revenue::RevenueError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevenueTable {
    rates: Vec<RevenueRate>,
}

impl RevenueTable {
    /// Table over `rates`.
    ///
    /// # Errors
    /// Returns [`RevenueError::InvalidBounds`] for a band whose lower bound
    /// is not below its upper bound.
    pub fn new(rates: Vec<RevenueRate>) -> Result<Self, RevenueError> {
        if let Some(rate) = rates.iter().find(|rate| {
            rate.lower_miles.partial_cmp(&rate.upper_miles) != Some(Ordering::Less)
        }) {
            return Err(RevenueError::InvalidBounds {
                lower: rate.lower_miles,
                upper: rate.upper_miles,
                los: rate.los,
            });
        }
        Ok(Self { rates })
    }

    /// Read a table from CSV with the columns `lower_mileage_bound`,
    /// `upper_mileage_bound`, `los`, `base_rate` and `rate_per_mile`.
    ///
    /// # Errors
    /// Returns [`RevenueError::Csv`] for malformed rows and
    /// [`RevenueError::InvalidBounds`] for empty bands.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, RevenueError> {
        let rates = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader)
            .deserialize()
            .collect::<Result<Vec<RevenueRate>, _>>()?;
        Self::new(rates)
    }

    /// Load a CSV table from `path`.
    ///
    /// # Errors
    /// As [`RevenueTable::from_csv`], plus [`RevenueError::Open`].
    pub fn load(path: &Utf8Path) -> Result<Self, RevenueError> {
        let file = dispatch_fs::open_input(path).map_err(|source| RevenueError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_csv(file)?;
        log::info!("loaded {} revenue rates from {path}", table.rates.len());
        Ok(table)
    }

    /// The rates in lookup order.
    #[must_use]
    pub const fn rates(&self) -> &[RevenueRate] {
        self.rates.as_slice()
    }

    /// Revenue of a `los` trip covering `miles`.
    ///
    /// # Errors
    /// Returns [`RevenueError::RevenueCalculation`] when no band covers the
    /// trip.
    pub fn revenue(&self, los: LevelOfService, miles: f64) -> Result<f64, RevenueError> {
        self.rates
            .iter()
            .find(|rate| rate.covers(los, miles))
            .map(|rate| rate.revenue(miles))
            .ok_or(RevenueError::RevenueCalculation { los, miles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    const RATES: &str = "\
lower_mileage_bound, upper_mileage_bound, los, base_rate, rate_per_mile
0, 5, A, 15, 2.5
5, 50, A, 25, 2
0, 50, W, 40, 3
";

    #[fixture]
    fn table() -> RevenueTable {
        RevenueTable::from_csv(RATES.as_bytes()).expect("valid table")
    }

    #[rstest]
    #[case(LevelOfService::Ambulatory, 2.0, 20.0)]
    #[case(LevelOfService::Ambulatory, 10.0, 45.0)]
    #[case(LevelOfService::Wheelchair, 10.0, 70.0)]
    fn revenue_follows_the_covering_band(
        table: RevenueTable,
        #[case] los: LevelOfService,
        #[case] miles: f64,
        #[case] expected: f64,
    ) {
        let revenue = table.revenue(los, miles).expect("covered");
        assert!((revenue - expected).abs() < 1e-9, "{revenue}");
    }

    #[rstest]
    fn shared_bounds_use_the_first_band(table: RevenueTable) {
        let revenue = table
            .revenue(LevelOfService::Ambulatory, 5.0)
            .expect("covered");
        assert!((revenue - 27.5).abs() < 1e-9);
    }

    #[rstest]
    fn uncovered_miles_fail(table: RevenueTable) {
        let err = table
            .revenue(LevelOfService::Wheelchair, 80.0)
            .expect_err("no band");
        assert!(matches!(
            err,
            RevenueError::RevenueCalculation {
                los: LevelOfService::Wheelchair,
                ..
            }
        ));
    }

    #[rstest]
    fn inverted_bands_are_rejected() {
        let csv = "lower_mileage_bound,upper_mileage_bound,los,base_rate,rate_per_mile\n9,3,A,1,1\n";
        let err = RevenueTable::from_csv(csv.as_bytes()).expect_err("inverted band");
        assert!(matches!(err, RevenueError::InvalidBounds { .. }));
    }

    #[rstest]
    fn malformed_rows_are_csv_errors() {
        let csv = "lower_mileage_bound,upper_mileage_bound,los,base_rate,rate_per_mile\nx,3,A,1,1\n";
        let err = RevenueTable::from_csv(csv.as_bytes()).expect_err("bad number");
        assert!(matches!(err, RevenueError::Csv(_)));
    }
}
