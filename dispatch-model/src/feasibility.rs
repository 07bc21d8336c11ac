//! Driver/edge compatibility.

use crate::graph::{DriverIdx, Edge, EdgeId, TripGraph};

const CAPACITY_TOLERANCE: f64 = 1e-9;

/// Decides which (driver, edge) pairs receive decision variables.
///
/// A pair is feasible when every depot endpoint of the edge belongs to the
/// driver, the driver supports the edge's level of service, and the net
/// capacity change across the edge fits the driver's vehicle.
#[derive(Debug, Clone, Copy)]
pub struct FeasibilityFilter<'g> {
    graph: &'g TripGraph,
}

impl<'g> FeasibilityFilter<'g> {
    /// Filter over `graph`.
    #[must_use]
    pub const fn new(graph: &'g TripGraph) -> Self {
        Self { graph }
    }

    /// Whether `driver` may drive `edge`. Unknown ids are never feasible.
    #[must_use]
    pub fn allows(&self, driver: DriverIdx, edge: EdgeId) -> bool {
        self.graph
            .edge(edge)
            .is_some_and(|candidate| self.allows_edge(driver, candidate))
    }

    /// Whether `driver` may drive `edge`, given the edge itself.
    #[must_use]
    pub fn allows_edge(&self, driver: DriverIdx, edge: &Edge) -> bool {
        let Some(entry) = self.graph.driver(driver) else {
            return false;
        };
        let (Some(origin), Some(destination)) =
            (self.graph.node(edge.origin), self.graph.node(edge.destination))
        else {
            return false;
        };
        let own_depots = [origin.kind, destination.kind]
            .iter()
            .filter_map(|kind| kind.depot_owner())
            .all(|owner| owner == driver);
        let net_change = (origin.capacity_delta + destination.capacity_delta).abs();
        own_depots
            && entry.driver.supports(edge.los)
            && net_change <= entry.driver.capacity + CAPACITY_TOLERANCE
    }
}
