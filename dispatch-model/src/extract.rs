//! Reading assignments back out of a solution.

use chrono::NaiveDate;
use dispatch_core::{Incumbent, LevelOfService};

use crate::graph::{DriverIdx, TripEntry, TripGraph};
use crate::variables::{DecisionPair, DecisionVariables};

const TAKEN_THRESHOLD: f64 = 0.5;
const TIME_TOLERANCE: f64 = 1e-6;
/// Estimated dropoff reported when the serving driver never reaches the
/// dropoff node.
pub const MISSING_DROPOFF: f64 = -1.0;

/// One served trip.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRecord {
    /// Trip id.
    pub trip_id: String,
    /// Serving driver's id.
    pub driver_id: u32,
    /// Serving driver's name.
    pub driver_name: String,
    /// Service date.
    pub trip_date: NaiveDate,
    /// Pickup address.
    pub pickup_address: String,
    /// Scheduled pickup as a day fraction.
    pub scheduled_pickup: f64,
    /// Estimated pickup as a day fraction.
    pub est_pickup: f64,
    /// Dropoff address.
    pub dropoff_address: String,
    /// Scheduled dropoff as a day fraction.
    pub scheduled_dropoff: f64,
    /// Estimated dropoff as a day fraction, or [`MISSING_DROPOFF`].
    pub est_dropoff: f64,
    /// Level of service.
    pub los: LevelOfService,
    /// Miles of the trip itself.
    pub est_miles: f64,
    /// Duration of the trip itself as a day fraction.
    pub est_time: f64,
    /// Revenue of the trip.
    pub revenue: f64,
}

/// Miles driven by one driver across every taken edge.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverMileage {
    /// Driver id.
    pub driver_id: u32,
    /// Driver name.
    pub driver_name: String,
    /// Total miles.
    pub miles: f64,
}

/// Everything read from a solution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// Served trips ordered by estimated pickup.
    pub records: Vec<AssignmentRecord>,
    /// Mileage per rostered driver, in roster order.
    pub mileage: Vec<DriverMileage>,
    /// Records whose estimated times failed the consistency check.
    pub inconsistencies: usize,
}

/// Turns an [`Incumbent`] into assignment records.
#[derive(Debug, Clone, Copy)]
pub struct SolutionExtractor<'m> {
    graph: &'m TripGraph,
    vars: &'m DecisionVariables,
}

impl<'m> SolutionExtractor<'m> {
    /// Extractor over `graph` and its declared `vars`.
    #[must_use]
    pub const fn new(graph: &'m TripGraph, vars: &'m DecisionVariables) -> Self {
        Self { graph, vars }
    }

    /// Read every served trip and each driver's mileage from `solution`.
    ///
    /// Inconsistent estimates are logged and counted, never fatal.
    #[must_use]
    pub fn extract(&self, solution: &Incumbent, trip_date: NaiveDate) -> Extraction {
        let mut extraction = Extraction::default();
        for entry in self.graph.trips() {
            let Some(record) = self.record(entry, solution, trip_date) else {
                log::debug!("trip {} is not served", entry.trip.id);
                continue;
            };
            if !self.is_consistent(entry, &record) {
                extraction.inconsistencies += 1;
            }
            extraction.records.push(record);
        }
        extraction
            .records
            .sort_by(|lhs, rhs| lhs.est_pickup.total_cmp(&rhs.est_pickup));
        extraction.mileage = self.mileage(solution);
        log::info!(
            "extracted {} of {} trips",
            extraction.records.len(),
            self.graph.trips().len()
        );
        extraction
    }

    fn record(
        &self,
        entry: &TripEntry,
        solution: &Incumbent,
        trip_date: NaiveDate,
    ) -> Option<AssignmentRecord> {
        let departure = self
            .vars
            .outbound_all(entry.pickup)
            .find(|pair| is_taken(solution, pair))?;
        let driver = self.graph.driver(departure.driver)?;
        let est_pickup = solution.value_or_zero(departure.service_time);
        let primary = self.graph.edge(entry.primary)?;
        let est_dropoff = self
            .arrival(departure.driver, entry, solution)
            .unwrap_or_else(|| {
                log::error!(
                    "CRITICAL: driver {} leaves pickup of trip {} but never reaches its dropoff",
                    driver.driver.id,
                    entry.trip.id
                );
                MISSING_DROPOFF
            });
        Some(AssignmentRecord {
            trip_id: entry.trip.id.clone(),
            driver_id: driver.driver.id,
            driver_name: driver.driver.name.clone(),
            trip_date,
            pickup_address: entry.trip.pickup_address.clone(),
            scheduled_pickup: entry.trip.scheduled_pickup.fraction(),
            est_pickup,
            dropoff_address: entry.trip.dropoff_address.clone(),
            scheduled_dropoff: entry.trip.scheduled_dropoff.fraction(),
            est_dropoff,
            los: entry.trip.los,
            est_miles: primary.cost.miles,
            est_time: primary.cost.time,
            revenue: entry.trip.revenue,
        })
    }

    /// Arrival time of `driver` at the trip's dropoff.
    fn arrival(&self, driver: DriverIdx, entry: &TripEntry, solution: &Incumbent) -> Option<f64> {
        let inbound = self
            .vars
            .inbound(driver, entry.dropoff)
            .find(|pair| is_taken(solution, pair))?;
        let travel = self.graph.edge(inbound.edge)?.cost.time;
        Some(solution.value_or_zero(inbound.service_time) + travel)
    }

    fn is_consistent(&self, entry: &TripEntry, record: &AssignmentRecord) -> bool {
        let travel = self
            .graph
            .edge(entry.primary)
            .map_or(0.0, |edge| edge.cost.time);
        let consistent = record.est_dropoff + TIME_TOLERANCE >= record.est_pickup + travel;
        if !consistent {
            log::error!(
                "CRITICAL: trip {} driver {} estimated dropoff {:.5} precedes pickup {:.5} plus travel {:.5} (scheduled {:.5}-{:.5})",
                record.trip_id,
                record.driver_id,
                record.est_dropoff,
                record.est_pickup,
                travel,
                record.scheduled_pickup,
                record.scheduled_dropoff
            );
        }
        consistent
    }

    fn mileage(&self, solution: &Incumbent) -> Vec<DriverMileage> {
        self.graph
            .driver_ids()
            .map(|(idx, entry)| {
                let miles: f64 = self
                    .vars
                    .pairs()
                    .iter()
                    .filter(|pair| pair.driver == idx && is_taken(solution, pair))
                    .filter_map(|pair| self.graph.edge(pair.edge))
                    .map(|edge| edge.cost.miles)
                    .sum();
                log::info!(
                    "driver {} ({}) drives {miles:.1} miles",
                    entry.driver.id,
                    entry.driver.name
                );
                DriverMileage {
                    driver_id: entry.driver.id,
                    driver_name: entry.driver.name.clone(),
                    miles,
                }
            })
            .collect()
    }
}

fn is_taken(solution: &Incumbent, pair: &DecisionPair) -> bool {
    solution.value_or_zero(pair.taken) > TAKEN_THRESHOLD
}
