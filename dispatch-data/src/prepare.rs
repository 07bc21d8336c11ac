//! Turning broker records into optimizer trips.

use dispatch_core::{Location, TravelCostError, TravelCostProvider, Trip};
use thiserror::Error;

use crate::input::TripRecord;
use crate::merge::{MergeSummary, MergeTable, normalize_merges};
use crate::revenue::{RevenueError, RevenueTable};

/// Errors raised by [`prepare_trips`].
#[derive(Debug, Error)]
pub enum PrepareError {
    /// No revenue band covers the trip.
    #[error("failed to price trip {trip_id}: {source}")]
    Revenue {
        /// Trip that could not be priced.
        trip_id: String,
        /// Underlying lookup failure.
        #[source]
        source: RevenueError,
    },
    /// The trip's own distance could not be measured.
    #[error("failed to measure trip {trip_id}: {source}")]
    Distance {
        /// Trip that could not be measured.
        trip_id: String,
        /// Underlying provider failure.
        #[source]
        source: TravelCostError,
    },
}

/// Trips ready for the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTrips {
    /// Trips in input order.
    pub trips: Vec<Trip>,
    /// What merge normalization changed.
    pub merges: MergeSummary,
    /// Trips whose revenue came from the rate table.
    pub priced: usize,
}

/// Normalize merge legs and price unpriced trips.
///
/// A trip without a quoted revenue is priced from `revenue` using its
/// quoted miles, or the distance `travel` reports between its pickup and
/// dropoff. Without a table such trips keep zero revenue.
///
/// # Errors
/// Returns [`PrepareError`] when a trip cannot be measured or no band covers
/// it.
pub fn prepare_trips<P: TravelCostProvider>(
    records: &[TripRecord],
    merges: &MergeTable,
    revenue: Option<&RevenueTable>,
    travel: &P,
) -> Result<PreparedTrips, PrepareError> {
    let mut normalized = records.to_vec();
    let merge_summary = normalize_merges(&mut normalized, merges);
    let mut priced = 0;
    let mut trips = Vec::with_capacity(normalized.len());
    for record in &normalized {
        let mut trip = record.to_trip();
        if let (None, Some(table)) = (record.revenue, revenue) {
            let miles = trip_miles(record, travel)?;
            trip.revenue = table
                .revenue(record.los, miles)
                .map_err(|source| PrepareError::Revenue {
                    trip_id: record.trip_id.clone(),
                    source,
                })?;
            priced += 1;
        }
        trips.push(trip);
    }
    log::info!(
        "prepared {} trips ({} priced, {} merge legs flagged, {} rescheduled)",
        trips.len(),
        priced,
        merge_summary.flagged,
        merge_summary.rescheduled
    );
    Ok(PreparedTrips {
        trips,
        merges: merge_summary,
        priced,
    })
}

fn trip_miles<P>(record: &TripRecord, travel: &P) -> Result<f64, PrepareError>
where
    P: TravelCostProvider,
{
    if let Some(miles) = record.miles {
        return Ok(miles);
    }
    let pickup = Location::new(record.pickup_address.clone(), record.pickup_coord());
    let dropoff = Location::new(record.dropoff_address.clone(), record.dropoff_coord());
    travel
        .travel_cost(&pickup, &dropoff)
        .map(|cost| cost.miles)
        .map_err(|source| PrepareError::Distance {
            trip_id: record.trip_id.clone(),
            source,
        })
}
