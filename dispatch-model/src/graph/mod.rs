//! Trip/location graph.
//!
//! Request nodes are the pickup and dropoff of every accepted trip; driver
//! nodes are each driver's depot start and depot end. Edges are the primary
//! trips plus synthetic repositioning moves between nodes.

mod builder;

use dispatch_core::{
    Driver, LevelOfService, Location, ResolveError, TravelCost, TravelCostError, Trip,
};
use thiserror::Error;

pub use builder::GraphBuilder;

/// Index of a node in a [`TripGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Index of an edge in a [`TripGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) usize);

/// Position of a driver in a [`TripGraph`]'s roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverIdx(pub(crate) usize);

/// Position of an accepted trip in a [`TripGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripIdx(pub(crate) usize);

macro_rules! index_accessor {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Dense zero-based index.
                #[must_use]
                pub const fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

index_accessor!(NodeId, EdgeId, DriverIdx, TripIdx);

/// Closed interval of day fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    /// Earliest time.
    pub open: f64,
    /// Latest time.
    pub close: f64,
}

impl TimeWindow {
    /// The whole service day.
    pub const FULL_DAY: Self = Self {
        open: 0.0,
        close: 1.0,
    };

    /// Whether `travel_time` fits between `open − slack` (clamped at
    /// midnight) and `close`.
    #[must_use]
    pub fn admits(&self, travel_time: f64, slack: f64) -> bool {
        travel_time <= self.available(slack)
    }

    /// Time available for travel once the opening slack is applied.
    #[must_use]
    pub fn available(&self, slack: f64) -> f64 {
        self.close - (self.open - slack).max(0.0)
    }
}

/// Role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Where a trip's rider is collected.
    Pickup(TripIdx),
    /// Where a trip's rider is delivered.
    Dropoff(TripIdx),
    /// Where a driver's route begins.
    DepotStart(DriverIdx),
    /// Where a driver's route ends.
    DepotEnd(DriverIdx),
}

impl NodeKind {
    /// Whether the node belongs to a trip.
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(self, Self::Pickup(_) | Self::Dropoff(_))
    }

    /// Driver owning the node, for depot nodes.
    #[must_use]
    pub const fn depot_owner(self) -> Option<DriverIdx> {
        match self {
            Self::DepotStart(driver) | Self::DepotEnd(driver) => Some(driver),
            Self::Pickup(_) | Self::Dropoff(_) => None,
        }
    }
}

/// A flow-conservation point.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Role of the node.
    pub kind: NodeKind,
    /// Resolved location.
    pub location: Location,
    /// Service window.
    pub window: TimeWindow,
    /// Change in vehicle load when the node is served.
    pub capacity_delta: f64,
    /// Revenue earned by departing the node; non-zero only at pickups.
    pub revenue: f64,
}

/// Origin of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A trip's own pickup-to-dropoff leg.
    Primary(TripIdx),
    /// From a depot start to a pickup.
    DepotDeparture,
    /// From a dropoff to a depot end.
    DepotReturn,
    /// Straight from a driver's depot start to its depot end.
    Idle(DriverIdx),
    /// Between two request nodes of different trips.
    Reposition,
}

impl EdgeKind {
    /// Whether the edge is synthetic rather than a requested trip.
    #[must_use]
    pub const fn is_synthetic(self) -> bool {
        !matches!(self, Self::Primary(_))
    }
}

/// A candidate move between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Origin node.
    pub origin: NodeId,
    /// Destination node.
    pub destination: NodeId,
    /// Origin of the edge.
    pub kind: EdgeKind,
    /// Distance and duration.
    pub cost: TravelCost,
    /// Window the edge must be driven in.
    pub window: TimeWindow,
    /// Level of service the driving vehicle must support.
    pub los: LevelOfService,
    /// Rider space occupied while the edge is driven.
    pub space: f64,
}

/// Why an edge could not be built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection {
    /// Travel time of the move.
    pub travel_time: f64,
    /// Time the window leaves for the move.
    pub available: f64,
}

/// Result of trying to build one edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeOutcome {
    /// The move fits its window.
    Built(Edge),
    /// The move cannot be driven inside its window.
    Rejected(Rejection),
}

/// A trip excluded from the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTrip {
    /// The excluded trip's id.
    pub trip_id: String,
    /// Why it was excluded.
    pub reason: RejectionReason,
}

/// Why a trip was excluded.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// The trip cannot be driven inside its own schedule.
    Unreachable(Rejection),
    /// Another leg of the same itinerary was excluded.
    ItineraryLegRejected {
        /// Id of the excluded leg.
        leg: String,
    },
}

/// An accepted trip with its graph handles.
#[derive(Debug, Clone, PartialEq)]
pub struct TripEntry {
    /// The trip as supplied.
    pub trip: Trip,
    /// Pickup node.
    pub pickup: NodeId,
    /// Dropoff node.
    pub dropoff: NodeId,
    /// Primary edge.
    pub primary: EdgeId,
}

/// A rostered driver with its depot nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverEntry {
    /// The driver, with any configured capacity override applied.
    pub driver: Driver,
    /// Depot start node.
    pub start: NodeId,
    /// Depot end node.
    pub end: NodeId,
}

/// A leg whose pickup must closely follow its predecessor's dropoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeLink {
    /// The following leg.
    pub merge: TripIdx,
    /// The leg it follows.
    pub predecessor: TripIdx,
    /// Scheduled gap between predecessor dropoff and merge pickup.
    pub window: f64,
}

/// Consecutive legs of one itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItineraryLink {
    /// Earlier leg.
    pub first: TripIdx,
    /// Later leg.
    pub second: TripIdx,
}

/// Errors raised while building a [`TripGraph`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Two request nodes, or a request node and a depot, share an address.
    #[error("address `{address}` is used by more than one pickup, dropoff or depot")]
    DuplicateAddress {
        /// The repeated address.
        address: String,
    },
    /// Two trips share an id.
    #[error("trip id `{id}` appears more than once")]
    DuplicateTripId {
        /// The repeated id.
        id: String,
    },
    /// An address could not be resolved.
    #[error("failed to resolve `{address}`: {source}")]
    Resolve {
        /// The unresolved address.
        address: String,
        /// Resolver failure.
        #[source]
        source: ResolveError,
    },
    /// The travel-cost provider failed.
    #[error(transparent)]
    TravelCost(#[from] TravelCostError),
}

/// Nodes and edges for one optimisation run.
#[derive(Debug, Clone, PartialEq)]
pub struct TripGraph {
    pub(crate) trips: Vec<TripEntry>,
    pub(crate) drivers: Vec<DriverEntry>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) outgoing: Vec<Vec<EdgeId>>,
    pub(crate) incoming: Vec<Vec<EdgeId>>,
    pub(crate) merges: Vec<MergeLink>,
    pub(crate) itineraries: Vec<ItineraryLink>,
    pub(crate) rejected: Vec<RejectedTrip>,
}

impl TripGraph {
    /// Accepted trips in input order.
    #[must_use]
    pub fn trips(&self) -> &[TripEntry] {
        &self.trips
    }

    /// Rostered drivers in input order.
    #[must_use]
    pub fn drivers(&self) -> &[DriverEntry] {
        &self.drivers
    }

    /// All nodes.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Trip at `idx`.
    #[must_use]
    pub fn trip(&self, idx: TripIdx) -> Option<&TripEntry> {
        self.trips.get(idx.0)
    }

    /// Driver at `idx`.
    #[must_use]
    pub fn driver(&self, idx: DriverIdx) -> Option<&DriverEntry> {
        self.drivers.get(idx.0)
    }

    /// Node `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Edge `id`.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    /// Edges leaving `node`.
    #[must_use]
    pub fn outgoing(&self, node: NodeId) -> &[EdgeId] {
        self.outgoing.get(node.0).map_or(&[], Vec::as_slice)
    }

    /// Edges entering `node`.
    #[must_use]
    pub fn incoming(&self, node: NodeId) -> &[EdgeId] {
        self.incoming.get(node.0).map_or(&[], Vec::as_slice)
    }

    /// Ids of every edge with its data.
    pub fn edge_ids(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().map(|(i, edge)| (EdgeId(i), edge))
    }

    /// Ids of every driver with its entry.
    pub fn driver_ids(&self) -> impl Iterator<Item = (DriverIdx, &DriverEntry)> {
        self.drivers
            .iter()
            .enumerate()
            .map(|(i, entry)| (DriverIdx(i), entry))
    }

    /// Ids of every trip with its entry.
    pub fn trip_ids(&self) -> impl Iterator<Item = (TripIdx, &TripEntry)> {
        self.trips
            .iter()
            .enumerate()
            .map(|(i, entry)| (TripIdx(i), entry))
    }

    /// Pickup and dropoff nodes.
    pub fn request_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind.is_request())
            .map(|(i, node)| (NodeId(i), node))
    }

    /// Merge relations between accepted legs.
    #[must_use]
    pub fn merges(&self) -> &[MergeLink] {
        &self.merges
    }

    /// Consecutive-leg relations between accepted legs.
    #[must_use]
    pub fn itinerary_links(&self) -> &[ItineraryLink] {
        &self.itineraries
    }

    /// Trips excluded while building the graph.
    #[must_use]
    pub fn rejected_trips(&self) -> &[RejectedTrip] {
        &self.rejected
    }
}
