//! Decision variables for every feasible (driver, edge) pair.

use std::collections::HashMap;

use dispatch_core::{
    BackendError, LevelOfService, LinearConstraint, LinearExpr, MipBackend, VarId,
};

use crate::feasibility::FeasibilityFilter;
use crate::graph::{DriverIdx, EdgeId, NodeId, TripGraph};

/// Dense handle of a feasible (driver, edge) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairId(usize);

impl PairId {
    /// Dense zero-based index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Variables attached to one feasible (driver, edge) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPair {
    /// Driver half of the pair.
    pub driver: DriverIdx,
    /// Edge half of the pair.
    pub edge: EdgeId,
    /// Binary: the driver drives the edge.
    pub taken: VarId,
    /// Departure time from the edge origin as a day fraction.
    pub service_time: VarId,
    /// Vehicle load while the edge is driven.
    pub load: VarId,
}

/// Aggregates balanced across drivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairnessVars {
    /// Revenue earned per driver.
    pub revenue: Vec<(DriverIdx, VarId)>,
    /// Lower envelope of driver revenue.
    pub revenue_min: VarId,
    /// Upper envelope of driver revenue.
    pub revenue_max: VarId,
    /// Wheelchair legs driven per wheelchair-capable driver.
    pub wheelchair: Vec<(DriverIdx, VarId)>,
    /// Lower envelope of wheelchair counts.
    pub wheelchair_min: VarId,
    /// Upper envelope of wheelchair counts.
    pub wheelchair_max: VarId,
}

/// Every variable of the model, indexed for constraint generation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionVariables {
    pairs: Vec<DecisionPair>,
    lookup: HashMap<(DriverIdx, EdgeId), PairId>,
    outbound: Vec<Vec<Vec<PairId>>>,
    inbound: Vec<Vec<Vec<PairId>>>,
    fairness: FairnessVars,
}

impl DecisionVariables {
    /// All feasible pairs, indexed by [`PairId`].
    #[must_use]
    pub fn pairs(&self) -> &[DecisionPair] {
        &self.pairs
    }

    /// Number of feasible pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair is feasible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pair with handle `id`.
    #[must_use]
    pub fn pair(&self, id: PairId) -> Option<&DecisionPair> {
        self.pairs.get(id.0)
    }

    /// Variables for `driver` on `edge`, when the pair is feasible.
    #[must_use]
    pub fn lookup(&self, driver: DriverIdx, edge: EdgeId) -> Option<&DecisionPair> {
        self.lookup
            .get(&(driver, edge))
            .and_then(|id| self.pair(*id))
    }

    /// Feasible pairs of `driver` leaving `node`.
    pub fn outbound(
        &self,
        driver: DriverIdx,
        node: NodeId,
    ) -> impl Iterator<Item = &DecisionPair> + '_ {
        self.adjacent(&self.outbound, driver, node)
    }

    /// Feasible pairs of `driver` entering `node`.
    pub fn inbound(
        &self,
        driver: DriverIdx,
        node: NodeId,
    ) -> impl Iterator<Item = &DecisionPair> + '_ {
        self.adjacent(&self.inbound, driver, node)
    }

    /// Feasible pairs of any driver leaving `node`.
    pub fn outbound_all(&self, node: NodeId) -> impl Iterator<Item = &DecisionPair> + '_ {
        (0..self.outbound.len()).flat_map(move |d| self.outbound(DriverIdx(d), node))
    }

    /// Feasible pairs of any driver entering `node`.
    pub fn inbound_all(&self, node: NodeId) -> impl Iterator<Item = &DecisionPair> + '_ {
        (0..self.inbound.len()).flat_map(move |d| self.inbound(DriverIdx(d), node))
    }

    /// Fairness aggregates.
    #[must_use]
    pub const fn fairness(&self) -> &FairnessVars {
        &self.fairness
    }

    /// Every declared variable, for snapshotting a solution.
    #[must_use]
    pub fn all_vars(&self) -> Vec<VarId> {
        let fairness = &self.fairness;
        self.pairs
            .iter()
            .flat_map(|pair| [pair.taken, pair.service_time, pair.load])
            .chain(fairness.revenue.iter().map(|(_, var)| *var))
            .chain(fairness.wheelchair.iter().map(|(_, var)| *var))
            .chain([
                fairness.revenue_min,
                fairness.revenue_max,
                fairness.wheelchair_min,
                fairness.wheelchair_max,
            ])
            .collect()
    }

    fn adjacent<'s>(
        &'s self,
        lists: &'s [Vec<Vec<PairId>>],
        driver: DriverIdx,
        node: NodeId,
    ) -> impl Iterator<Item = &'s DecisionPair> + 's {
        lists
            .get(driver.index())
            .and_then(|per_node| per_node.get(node.index()))
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .filter_map(|id| self.pair(*id))
    }
}

/// Declares decision variables on a backend.
#[derive(Debug, Clone, Copy)]
pub struct ModelBuilder<'g> {
    graph: &'g TripGraph,
}

impl<'g> ModelBuilder<'g> {
    /// Builder for `graph`.
    #[must_use]
    pub const fn new(graph: &'g TripGraph) -> Self {
        Self { graph }
    }

    /// Declare `taken`, `service_time` and `load` for every feasible pair,
    /// tie `service_time` and `load` to `taken`, and declare the fairness
    /// aggregates.
    ///
    /// # Errors
    /// Propagates backend failures while adding the coupling constraints.
    pub fn declare<B>(&self, backend: &mut B) -> Result<DecisionVariables, BackendError>
    where
        B: MipBackend,
    {
        let filter = FeasibilityFilter::new(self.graph);
        let node_count = self.graph.nodes().len();
        let driver_count = self.graph.drivers().len();
        let mut vars = DecisionVariables {
            pairs: Vec::new(),
            lookup: HashMap::new(),
            outbound: vec![vec![Vec::new(); node_count]; driver_count],
            inbound: vec![vec![Vec::new(); node_count]; driver_count],
            fairness: declare_fairness(self.graph, backend),
        };

        for (driver, entry) in self.graph.driver_ids() {
            let capacity = entry.driver.capacity;
            for (edge_id, edge) in self.graph.edge_ids() {
                if !filter.allows_edge(driver, edge) {
                    continue;
                }
                let label = format!("d{}_e{}", entry.driver.id, edge_id.index());
                let pair = DecisionPair {
                    driver,
                    edge: edge_id,
                    taken: backend.declare_binary_var(&format!("taken_{label}")),
                    service_time: backend.declare_continuous_var(
                        0.0,
                        Some(1.0),
                        &format!("st_{label}"),
                    ),
                    load: backend.declare_continuous_var(
                        0.0,
                        Some(capacity),
                        &format!("load_{label}"),
                    ),
                };
                backend.add_linear_constraint(
                    LinearConstraint::le(
                        LinearExpr::new()
                            .term(pair.service_time, 1.0)
                            .term(pair.taken, -1.0),
                        0.0,
                    ),
                    None,
                )?;
                backend.add_linear_constraint(
                    LinearConstraint::le(
                        LinearExpr::new()
                            .term(pair.load, 1.0)
                            .term(pair.taken, -capacity),
                        0.0,
                    ),
                    None,
                )?;
                vars.push(pair, edge.origin, edge.destination);
            }
        }
        log::info!(
            "declared {} feasible driver/edge pairs over {} drivers",
            vars.len(),
            driver_count
        );
        Ok(vars)
    }
}

impl DecisionVariables {
    fn push(&mut self, pair: DecisionPair, origin: NodeId, destination: NodeId) {
        let id = PairId(self.pairs.len());
        let driver = pair.driver.index();
        if let Some(list) = self
            .outbound
            .get_mut(driver)
            .and_then(|per_node| per_node.get_mut(origin.index()))
        {
            list.push(id);
        }
        if let Some(list) = self
            .inbound
            .get_mut(driver)
            .and_then(|per_node| per_node.get_mut(destination.index()))
        {
            list.push(id);
        }
        self.lookup.insert((pair.driver, pair.edge), id);
        self.pairs.push(pair);
    }
}

fn declare_fairness<B: MipBackend>(graph: &TripGraph, backend: &mut B) -> FairnessVars {
    let revenue = graph
        .driver_ids()
        .map(|(idx, entry)| {
            let name = format!("revenue_d{}", entry.driver.id);
            (idx, backend.declare_continuous_var(0.0, None, &name))
        })
        .collect();
    let revenue_min = backend.declare_continuous_var(0.0, None, "revenue_min");
    let revenue_max = backend.declare_continuous_var(0.0, None, "revenue_max");
    let wheelchair = graph
        .driver_ids()
        .filter(|(_, entry)| entry.driver.supports(LevelOfService::Wheelchair))
        .map(|(idx, entry)| {
            let name = format!("wheelchair_d{}", entry.driver.id);
            (idx, backend.declare_continuous_var(0.0, None, &name))
        })
        .collect();
    let wheelchair_min = backend.declare_continuous_var(0.0, None, "wheelchair_min");
    let wheelchair_max = backend.declare_continuous_var(0.0, None, "wheelchair_max");
    FairnessVars {
        revenue,
        revenue_min,
        revenue_max,
        wheelchair,
        wheelchair_min,
        wheelchair_max,
    }
}

#[cfg(test)]
mod tests {
    use dispatch_core::test_support::{
        OriginResolver, ScriptedBackend, ScriptedVarKind, UnitTravelCost,
    };
    use dispatch_core::{DayTime, Driver, OptimizerConfig, Trip};
    use rstest::rstest;

    use super::*;
    use crate::graph::GraphBuilder;

    fn graph(trips: &[Trip], drivers: &[Driver]) -> TripGraph {
        GraphBuilder::new(
            &OptimizerConfig::default(),
            OriginResolver,
            UnitTravelCost::default(),
        )
        .build(trips, drivers)
        .expect("graph builds")
    }

    fn wheelchair_trip() -> Trip {
        Trip::new(
            "W1",
            "W1 pickup",
            "W1 dropoff",
            DayTime::from_hm(9, 0),
            DayTime::from_hm(10, 0),
            LevelOfService::Wheelchair,
        )
    }

    #[rstest]
    fn only_feasible_pairs_receive_variables() {
        let drivers = [
            Driver::new(1, "Avery", "Depot A"),
            Driver::new(2, "Blake", "Depot B")
                .with_levels([LevelOfService::Ambulatory, LevelOfService::Wheelchair]),
        ];
        let graph = graph(&[wheelchair_trip()], &drivers);
        let mut backend = ScriptedBackend::always_failing();
        let vars = ModelBuilder::new(&graph)
            .declare(&mut backend)
            .expect("variables declared");

        let primary = graph.trips().first().expect("trip").primary;
        assert!(vars.lookup(DriverIdx(0), primary).is_none());
        let pair = vars.lookup(DriverIdx(1), primary).expect("wheelchair pair");
        assert_eq!(
            backend.variable(pair.load).map(|(_, kind)| kind),
            Some(ScriptedVarKind::Continuous {
                lower: 0.0,
                upper: Some(1.5)
            })
        );
        assert_eq!(
            backend.variable(pair.taken).map(|(_, kind)| kind),
            Some(ScriptedVarKind::Binary)
        );
        // Two coupling constraints per pair.
        assert_eq!(backend.constraints().len(), 2 * vars.len());
        assert_eq!(vars.fairness().revenue.len(), 2);
        assert_eq!(vars.fairness().wheelchair.len(), 1);
    }

    #[rstest]
    fn adjacency_matches_the_graph() {
        let driver = Driver::new(1, "Avery", "Depot")
            .with_levels([LevelOfService::Ambulatory, LevelOfService::Wheelchair]);
        let graph = graph(&[wheelchair_trip()], &[driver]);
        let mut backend = ScriptedBackend::always_failing();
        let vars = ModelBuilder::new(&graph)
            .declare(&mut backend)
            .expect("variables declared");
        let entry = graph.trips().first().expect("trip");

        let out: Vec<EdgeId> = vars
            .outbound(DriverIdx(0), entry.pickup)
            .map(|pair| pair.edge)
            .collect();
        assert_eq!(out, vec![entry.primary]);
        assert_eq!(vars.inbound_all(entry.pickup).count(), 1);
        assert_eq!(vars.outbound_all(entry.dropoff).count(), 1);
        assert_eq!(vars.all_vars().len(), 3 * vars.len() + 2 + 4);
    }
}
