//! Objective terms.

use dispatch_core::{Direction, LinearExpr, MipBackend, OptimizerConfig, VarId};

use crate::constraints::sum_service_time;
use crate::graph::TripGraph;
use crate::variables::DecisionVariables;

/// Minutes per day; travel is charged in minutes.
const MINUTES_PER_DAY: f64 = 1440.0;
/// Hours per day; merge gaps are charged in hours.
const HOURS_PER_DAY: f64 = 24.0;

/// The objective, kept term by term so each can be evaluated on its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectiveTerms {
    /// Minutes driven over every taken edge.
    pub travel: LinearExpr,
    /// Weighted working-day length per driver.
    pub route_length: LinearExpr,
    /// Weighted gap between each predecessor's dropoff and its merge leg's
    /// pickup.
    pub merge: LinearExpr,
    /// Weighted spread of driver revenue.
    pub revenue_balance: LinearExpr,
    /// Weighted spread of wheelchair legs across capable drivers.
    pub wheelchair_balance: LinearExpr,
}

impl ObjectiveTerms {
    /// Sum of every term.
    #[must_use]
    pub fn total(&self) -> LinearExpr {
        let mut total = self.travel.clone();
        for term in [
            &self.route_length,
            &self.merge,
            &self.revenue_balance,
            &self.wheelchair_balance,
        ] {
            total.add_scaled(term, 1.0);
        }
        total
    }

    /// Install the total as a minimisation objective on `backend`.
    pub fn apply<B: MipBackend>(&self, backend: &mut B) {
        backend.set_objective(self.total(), Direction::Minimize);
    }
}

/// Builds [`ObjectiveTerms`] for a declared model.
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveBuilder<'m> {
    graph: &'m TripGraph,
    vars: &'m DecisionVariables,
    config: &'m OptimizerConfig,
}

impl<'m> ObjectiveBuilder<'m> {
    /// Builder over `graph` and its declared `vars`.
    #[must_use]
    pub const fn new(
        graph: &'m TripGraph,
        vars: &'m DecisionVariables,
        config: &'m OptimizerConfig,
    ) -> Self {
        Self {
            graph,
            vars,
            config,
        }
    }

    /// Build every term.
    #[must_use]
    pub fn build(&self) -> ObjectiveTerms {
        let fairness = self.vars.fairness();
        ObjectiveTerms {
            travel: self.travel(),
            route_length: self.route_length(),
            merge: self.merge(),
            revenue_balance: spread(
                fairness.revenue_min,
                fairness.revenue_max,
                self.config.revenue_penalty,
            ),
            wheelchair_balance: spread(
                fairness.wheelchair_min,
                fairness.wheelchair_max,
                self.config.wheelchair_penalty,
            ),
        }
    }

    fn travel(&self) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for pair in self.vars.pairs() {
            if let Some(edge) = self.graph.edge(pair.edge)
                && edge.cost.time > 0.0
            {
                expr.add_term(pair.taken, MINUTES_PER_DAY * edge.cost.time);
            }
        }
        expr
    }

    fn route_length(&self) -> LinearExpr {
        let weight = self.config.route_length_penalty;
        let mut expr = LinearExpr::new();
        for (driver, entry) in self.graph.driver_ids() {
            expr.add_scaled(
                &sum_service_time(self.vars.inbound(driver, entry.end)),
                weight,
            );
            expr.add_scaled(
                &sum_service_time(self.vars.outbound(driver, entry.start)),
                -weight,
            );
        }
        expr
    }

    fn merge(&self) -> LinearExpr {
        let weight = self.config.merge_penalty * HOURS_PER_DAY;
        let mut expr = LinearExpr::new();
        for link in self.graph.merges() {
            let (Some(merge), Some(predecessor)) =
                (self.graph.trip(link.merge), self.graph.trip(link.predecessor))
            else {
                continue;
            };
            let travel = self
                .graph
                .edge(predecessor.primary)
                .map_or(0.0, |edge| edge.cost.time);
            for (driver, _) in self.graph.driver_ids() {
                let (Some(follower), Some(leader)) = (
                    self.vars.lookup(driver, merge.primary),
                    self.vars.lookup(driver, predecessor.primary),
                ) else {
                    continue;
                };
                expr.add_term(follower.service_time, weight);
                expr.add_term(leader.service_time, -weight);
                expr.add_term(follower.taken, -weight * travel);
            }
        }
        expr
    }
}

fn spread(min: VarId, max: VarId, weight: f64) -> LinearExpr {
    LinearExpr::new().term(max, weight).term(min, -weight)
}

#[cfg(test)]
mod tests {
    use dispatch_core::test_support::{OriginResolver, ScriptedBackend, UnitTravelCost};
    use dispatch_core::{DayTime, Driver, LevelOfService, Trip};
    use rstest::rstest;

    use super::*;
    use crate::graph::{DriverIdx, GraphBuilder};
    use crate::variables::ModelBuilder;

    #[rstest]
    fn travel_is_charged_in_minutes() {
        let config = OptimizerConfig::default();
        let trip = Trip::new(
            "T1",
            "T1 pickup",
            "T1 dropoff",
            DayTime::from_hm(9, 0),
            DayTime::from_hm(10, 0),
            LevelOfService::Ambulatory,
        );
        let graph = GraphBuilder::new(&config, OriginResolver, UnitTravelCost::default())
            .build(&[trip], &[Driver::new(1, "Avery", "Depot")])
            .expect("graph builds");
        let mut backend = ScriptedBackend::always_failing();
        let vars = ModelBuilder::new(&graph)
            .declare(&mut backend)
            .expect("variables declared");
        let terms = ObjectiveBuilder::new(&graph, &vars, &config).build();

        let primary = graph.trips().first().expect("trip").primary;
        let drive = vars.lookup(DriverIdx(0), primary).expect("pair");
        let minutes = terms
            .travel
            .evaluate(|var| if var == drive.taken { 1.0 } else { 0.0 });
        assert!((minutes - 10.0).abs() < 1e-9);

        terms.apply(&mut backend);
        let (objective, direction) = backend.objective().expect("objective set");
        assert_eq!(*direction, Direction::Minimize);
        assert_eq!(objective, &terms.total());
    }

    #[rstest]
    fn spread_charges_the_envelope_width() {
        let expr = spread(VarId::new(0), VarId::new(1), 0.5);
        let width = expr.evaluate(|var| if var.index() == 1 { 30.0 } else { 10.0 });
        assert!((width - 10.0).abs() < 1e-12);
    }
}
