//! Construction of a [`TripGraph`] from trips and drivers.

use std::collections::{HashMap, HashSet};

use dispatch_core::{
    AddressResolver, Driver, LevelOfService, Location, OptimizerConfig, TravelCost,
    TravelCostProvider, Trip,
};
use geo::Coord;

use super::{
    DriverEntry, DriverIdx, Edge, EdgeId, EdgeKind, EdgeOutcome, GraphError, ItineraryLink,
    MergeLink, Node, NodeId, NodeKind, RejectedTrip, Rejection, RejectionReason, TimeWindow,
    TripEntry, TripGraph, TripIdx,
};

/// Builds the node and edge universe for one run.
///
/// Every distinct address is resolved once and every ordered address pair is
/// priced once per [`GraphBuilder::build`] call.
///
/// # Examples
/// ```
/// use dispatch_core::{Driver, LevelOfService, OptimizerConfig, Trip};
/// use dispatch_core::test_support::{OriginResolver, UnitTravelCost};
/// use dispatch_core::time::hours_minutes;
/// use dispatch_core::DayTime;
/// use dispatch_model::GraphBuilder;
///
/// let config = OptimizerConfig::default();
/// let trip = Trip::new(
///     "T1",
///     "1 Clinic Way",
///     "2 Home Street",
///     DayTime::from_fraction(hours_minutes(9, 0)),
///     DayTime::from_fraction(hours_minutes(10, 0)),
///     LevelOfService::Ambulatory,
/// );
/// let driver = Driver::new(7, "Avery", "Depot Road");
/// let graph = GraphBuilder::new(&config, OriginResolver, UnitTravelCost::default())
///     .build(&[trip], &[driver])?;
/// assert_eq!(graph.trips().len(), 1);
/// assert_eq!(graph.nodes().len(), 4);
/// # Ok::<(), dispatch_model::GraphError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder<'a, R, P> {
    config: &'a OptimizerConfig,
    resolver: R,
    travel: P,
}

impl<'a, R, P> GraphBuilder<'a, R, P>
where
    R: AddressResolver,
    P: TravelCostProvider,
{
    /// Create a builder using `resolver` for coordinates and `travel` for
    /// costs.
    pub const fn new(config: &'a OptimizerConfig, resolver: R, travel: P) -> Self {
        Self {
            config,
            resolver,
            travel,
        }
    }

    /// Build the graph for `trips` and `drivers`.
    ///
    /// Trips that cannot be driven inside their own schedule are excluded
    /// together with every other leg of their itinerary and reported through
    /// [`TripGraph::rejected_trips`].
    ///
    /// # Errors
    /// Returns [`GraphError::DuplicateAddress`] or
    /// [`GraphError::DuplicateTripId`] for malformed input, and
    /// [`GraphError::Resolve`] or [`GraphError::TravelCost`] when a
    /// collaborator fails.
    pub fn build(&self, trips: &[Trip], drivers: &[Driver]) -> Result<TripGraph, GraphError> {
        let requested = cap(trips, self.config.max_trips);
        let rostered: Vec<Driver> = cap(drivers, self.config.max_drivers)
            .iter()
            .map(|driver| self.with_capacity_override(driver))
            .collect();
        check_unique(requested, &rostered)?;

        let mut state = BuildState::new(&self.resolver, &self.travel);
        let (accepted, rejected) = self.screen_trips(&mut state, requested)?;
        let mut graph = TripGraph {
            trips: Vec::with_capacity(accepted.len()),
            drivers: Vec::with_capacity(rostered.len()),
            nodes: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            merges: Vec::new(),
            itineraries: Vec::new(),
            rejected,
        };

        for (trip, cost) in accepted {
            self.add_trip(&mut state, &mut graph, trip, cost)?;
        }
        for driver in rostered {
            add_driver(&mut state, &mut graph, driver)?;
        }
        self.add_depot_edges(&mut state, &mut graph)?;
        self.add_reposition_edges(&mut state, &mut graph)?;
        link_itineraries(&mut graph);

        log::info!(
            "built trip graph: {} trips, {} drivers, {} nodes, {} edges, {} rejected trips",
            graph.trips.len(),
            graph.drivers.len(),
            graph.nodes.len(),
            graph.edges.len(),
            graph.rejected.len()
        );
        Ok(graph)
    }

    fn with_capacity_override(&self, driver: &Driver) -> Driver {
        self.config.driver_capacity.map_or_else(
            || driver.clone(),
            |capacity| driver.clone().with_capacity(capacity),
        )
    }

    /// Price every primary trip and drop the itineraries of those that do
    /// not fit their schedule.
    fn screen_trips<'t>(
        &self,
        state: &mut BuildState<'_, R, P>,
        trips: &'t [Trip],
    ) -> Result<(Vec<(&'t Trip, TravelCost)>, Vec<RejectedTrip>), GraphError> {
        let slack = self.config.edge_window_slack();
        let mut priced = Vec::with_capacity(trips.len());
        let mut unreachable: HashMap<&str, (&str, Rejection)> = HashMap::new();
        for trip in trips {
            let cost = state.cost(&trip.pickup_address, &trip.dropoff_address)?;
            let window = TimeWindow {
                open: trip.pickup_fraction(),
                close: trip.dropoff_fraction(),
            };
            if window.admits(cost.time, slack) {
                priced.push((trip, cost));
            } else {
                let rejection = Rejection {
                    travel_time: cost.time,
                    available: window.available(slack),
                };
                log::warn!(
                    "trip {} needs {:.4} of a day but its schedule leaves {:.4}; excluding its itinerary",
                    trip.id,
                    rejection.travel_time,
                    rejection.available
                );
                unreachable.insert(itinerary_base(trip), (trip.id.as_str(), rejection));
            }
        }

        let mut rejected = Vec::new();
        let mut accepted = Vec::with_capacity(priced.len());
        for trip in trips {
            let Some((leg_id, rejection)) = unreachable.get(itinerary_base(trip)) else {
                continue;
            };
            let reason = if *leg_id == trip.id {
                RejectionReason::Unreachable(*rejection)
            } else {
                log::warn!(
                    "trip {} excluded because itinerary leg {leg_id} was rejected",
                    trip.id
                );
                RejectionReason::ItineraryLegRejected {
                    leg: (*leg_id).to_owned(),
                }
            };
            rejected.push(RejectedTrip {
                trip_id: trip.id.clone(),
                reason,
            });
        }
        for (trip, cost) in priced {
            if !unreachable.contains_key(itinerary_base(trip)) {
                accepted.push((trip, cost));
            }
        }
        Ok((accepted, rejected))
    }

    fn add_trip(
        &self,
        state: &mut BuildState<'_, R, P>,
        graph: &mut TripGraph,
        trip: &Trip,
        cost: TravelCost,
    ) -> Result<(), GraphError> {
        let idx = TripIdx(graph.trips.len());
        let pickup_time = trip.pickup_fraction();
        let early = self.config.early_pickup_window();
        let pickup = graph.push_node(Node {
            kind: NodeKind::Pickup(idx),
            location: state.location(&trip.pickup_address)?,
            window: TimeWindow {
                open: pickup_time - early,
                close: pickup_time + self.config.late_pickup_window(),
            },
            capacity_delta: trip.space(),
            revenue: trip.revenue,
        });
        let dropoff = graph.push_node(Node {
            kind: NodeKind::Dropoff(idx),
            location: state.location(&trip.dropoff_address)?,
            window: TimeWindow {
                open: pickup_time - early + cost.time,
                close: trip.dropoff_fraction() + self.config.late_dropoff_window(),
            },
            capacity_delta: -trip.space(),
            revenue: 0.0,
        });
        let primary = graph.push_edge(Edge {
            origin: pickup,
            destination: dropoff,
            kind: EdgeKind::Primary(idx),
            cost,
            window: TimeWindow {
                open: pickup_time,
                close: trip.dropoff_fraction(),
            },
            los: trip.los,
            space: trip.space(),
        });
        graph.trips.push(TripEntry {
            trip: trip.clone(),
            pickup,
            dropoff,
            primary,
        });
        Ok(())
    }

    fn add_depot_edges(
        &self,
        state: &mut BuildState<'_, R, P>,
        graph: &mut TripGraph,
    ) -> Result<(), GraphError> {
        let depots: Vec<(NodeId, NodeId)> = graph
            .drivers
            .iter()
            .map(|entry| (entry.start, entry.end))
            .collect();
        let requests: Vec<(NodeId, NodeId)> = graph
            .trips
            .iter()
            .map(|entry| (entry.pickup, entry.dropoff))
            .collect();
        for (start, end) in depots {
            for &(pickup, dropoff) in &requests {
                self.try_synthetic(state, graph, start, pickup, EdgeKind::DepotDeparture)?;
                self.try_synthetic(state, graph, dropoff, end, EdgeKind::DepotReturn)?;
            }
        }
        Ok(())
    }

    fn add_reposition_edges(
        &self,
        state: &mut BuildState<'_, R, P>,
        graph: &mut TripGraph,
    ) -> Result<(), GraphError> {
        let requests: Vec<(NodeId, TripIdx)> = graph
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node.kind {
                NodeKind::Pickup(trip) | NodeKind::Dropoff(trip) => Some((NodeId(i), trip)),
                NodeKind::DepotStart(_) | NodeKind::DepotEnd(_) => None,
            })
            .collect();
        for &(origin, origin_trip) in &requests {
            for &(destination, destination_trip) in &requests {
                if origin_trip == destination_trip {
                    continue;
                }
                self.try_synthetic(state, graph, origin, destination, EdgeKind::Reposition)?;
            }
        }
        Ok(())
    }

    /// Add a synthetic edge when it fits its window, skipping it otherwise.
    fn try_synthetic(
        &self,
        state: &mut BuildState<'_, R, P>,
        graph: &mut TripGraph,
        origin: NodeId,
        destination: NodeId,
        kind: EdgeKind,
    ) -> Result<(), GraphError> {
        let Some((from, to)) = graph.node(origin).zip(graph.node(destination)) else {
            return Ok(());
        };
        let (window, los) = match kind {
            EdgeKind::Reposition => (
                TimeWindow {
                    open: from.window.open,
                    close: to.window.close,
                },
                carried_service(graph, from),
            ),
            EdgeKind::Primary(_)
            | EdgeKind::DepotDeparture
            | EdgeKind::DepotReturn
            | EdgeKind::Idle(_) => (TimeWindow::FULL_DAY, LevelOfService::Ambulatory),
        };
        let space = match los {
            LevelOfService::Wheelchair => LevelOfService::Wheelchair.space(),
            LevelOfService::Ambulatory => 0.0,
        };
        let cost = state.cost(&from.location.address, &to.location.address)?;
        let candidate = Edge {
            origin,
            destination,
            kind,
            cost,
            window,
            los,
            space,
        };
        match self.evaluate(candidate) {
            EdgeOutcome::Built(edge) => {
                graph.push_edge(edge);
            }
            EdgeOutcome::Rejected(rejection) => log::debug!(
                "skipping {kind:?} edge {origin:?} -> {destination:?}: travel {:.4} exceeds {:.4}",
                rejection.travel_time,
                rejection.available
            ),
        }
        Ok(())
    }

    /// Check a candidate edge against its window.
    fn evaluate(&self, edge: Edge) -> EdgeOutcome {
        let slack = self.config.edge_window_slack();
        if edge.window.admits(edge.cost.time, slack) {
            EdgeOutcome::Built(edge)
        } else {
            EdgeOutcome::Rejected(Rejection {
                travel_time: edge.cost.time,
                available: edge.window.available(slack),
            })
        }
    }
}

impl TripGraph {
    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    fn push_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len());
        if let Some(out) = self.outgoing.get_mut(edge.origin.0) {
            out.push(id);
        }
        if let Some(into) = self.incoming.get_mut(edge.destination.0) {
            into.push(id);
        }
        self.edges.push(edge);
        id
    }
}

/// Per-build caches of resolved coordinates and priced address pairs.
struct BuildState<'b, R, P> {
    resolver: &'b R,
    travel: &'b P,
    coords: HashMap<String, Coord<f64>>,
    costs: HashMap<(String, String), TravelCost>,
}

impl<'b, R, P> BuildState<'b, R, P>
where
    R: AddressResolver,
    P: TravelCostProvider,
{
    fn new(resolver: &'b R, travel: &'b P) -> Self {
        Self {
            resolver,
            travel,
            coords: HashMap::new(),
            costs: HashMap::new(),
        }
    }

    fn location(&mut self, address: &str) -> Result<Location, GraphError> {
        if let Some(coord) = self.coords.get(address) {
            return Ok(Location::new(address, *coord));
        }
        let coord = self
            .resolver
            .resolve(address)
            .map_err(|source| GraphError::Resolve {
                address: address.to_owned(),
                source,
            })?;
        self.coords.insert(address.to_owned(), coord);
        Ok(Location::new(address, coord))
    }

    fn cost(&mut self, from: &str, to: &str) -> Result<TravelCost, GraphError> {
        let key = (from.to_owned(), to.to_owned());
        if let Some(cost) = self.costs.get(&key) {
            return Ok(*cost);
        }
        let origin = self.location(from)?;
        let destination = self.location(to)?;
        let cost = self.travel.travel_cost(&origin, &destination)?;
        self.costs.insert(key, cost);
        Ok(cost)
    }
}

fn cap<T>(items: &[T], limit: Option<usize>) -> &[T] {
    limit.map_or(items, |max| items.get(..max).unwrap_or(items))
}

/// Add a driver's depot nodes and its idle edge.
fn add_driver<R, P>(
    state: &mut BuildState<'_, R, P>,
    graph: &mut TripGraph,
    driver: Driver,
) -> Result<(), GraphError>
where
    R: AddressResolver,
    P: TravelCostProvider,
{
    let idx = DriverIdx(graph.drivers.len());
    let location = state.location(&driver.depot_address)?;
    let start = graph.push_node(depot_node(NodeKind::DepotStart(idx), location.clone()));
    let end = graph.push_node(depot_node(NodeKind::DepotEnd(idx), location));
    // Depot-to-depot edge: a driver with no work still leaves and returns
    // once, so depot flow stays an equality even for unused drivers.
    graph.push_edge(Edge {
        origin: start,
        destination: end,
        kind: EdgeKind::Idle(idx),
        cost: TravelCost::default(),
        window: TimeWindow::FULL_DAY,
        los: LevelOfService::Ambulatory,
        space: 0.0,
    });
    log::debug!(
        "driver {} ({}) starts at {}",
        driver.id,
        driver.name,
        driver.depot_address
    );
    graph.drivers.push(DriverEntry { driver, start, end });
    Ok(())
}

const fn depot_node(kind: NodeKind, location: Location) -> Node {
    Node {
        kind,
        location,
        window: TimeWindow::FULL_DAY,
        capacity_delta: 0.0,
        revenue: 0.0,
    }
}

/// Level of service required to leave `node`: a wheelchair rider is aboard
/// after a wheelchair pickup.
fn carried_service(graph: &TripGraph, node: &Node) -> LevelOfService {
    match node.kind {
        NodeKind::Pickup(trip) => graph
            .trip(trip)
            .map_or(LevelOfService::Ambulatory, |entry| entry.trip.los),
        NodeKind::Dropoff(_) | NodeKind::DepotStart(_) | NodeKind::DepotEnd(_) => {
            LevelOfService::Ambulatory
        }
    }
}

fn itinerary_base(trip: &Trip) -> &str {
    trip.leg().map_or(trip.id.as_str(), |leg| leg.base)
}

fn check_unique(trips: &[Trip], drivers: &[Driver]) -> Result<(), GraphError> {
    let mut ids = HashSet::new();
    let mut addresses = HashSet::new();
    for trip in trips {
        if !ids.insert(trip.id.as_str()) {
            return Err(GraphError::DuplicateTripId {
                id: trip.id.clone(),
            });
        }
        for address in [&trip.pickup_address, &trip.dropoff_address] {
            if !addresses.insert(address.as_str()) {
                return Err(GraphError::DuplicateAddress {
                    address: address.clone(),
                });
            }
        }
    }
    if let Some(driver) = drivers
        .iter()
        .find(|driver| addresses.contains(driver.depot_address.as_str()))
    {
        return Err(GraphError::DuplicateAddress {
            address: driver.depot_address.clone(),
        });
    }
    Ok(())
}

/// Record merge and consecutive-leg relations between accepted trips.
fn link_itineraries(graph: &mut TripGraph) {
    let by_id: HashMap<&str, TripIdx> = graph
        .trips
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.trip.id.as_str(), TripIdx(i)))
        .collect();
    let mut merges = Vec::new();
    let mut links = Vec::new();
    for (i, entry) in graph.trips.iter().enumerate() {
        let current = TripIdx(i);
        let Some(leg) = entry.trip.leg() else {
            continue;
        };
        if let Some(second) = leg.next_id().and_then(|id| by_id.get(id.as_str()).copied()) {
            links.push(ItineraryLink {
                first: current,
                second,
            });
        }
        if !entry.trip.is_merge {
            continue;
        }
        let predecessor = leg
            .previous_id()
            .and_then(|id| by_id.get(id.as_str()).copied());
        match predecessor.and_then(|idx| graph.trip(idx).map(|pred| (idx, pred))) {
            Some((idx, pred)) => merges.push(MergeLink {
                merge: current,
                predecessor: idx,
                window: (entry.trip.pickup_fraction() - pred.trip.dropoff_fraction()).max(0.0),
            }),
            None => log::warn!(
                "merge trip {} has no preceding leg in this run; merge ignored",
                entry.trip.id
            ),
        }
    }
    graph.merges = merges;
    graph.itineraries = links;
}
