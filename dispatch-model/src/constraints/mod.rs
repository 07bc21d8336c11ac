//! Constraint generation.
//!
//! Constraints are produced as data first ([`ConstraintSet`]) and installed
//! on a backend second, so the removable groups can be reinstalled before
//! every solve attempt.

use std::collections::BTreeSet;
use std::iter;

use dispatch_core::{
    BackendError, ConstraintGroup, LevelOfService, LinearConstraint, LinearExpr, MipBackend,
    OptimizerConfig, VarId,
};

use crate::graph::{DriverIdx, EdgeKind, NodeKind, TripGraph};
use crate::variables::{DecisionPair, DecisionVariables};

/// A constraint belonging to a removable group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedConstraint {
    /// Group the constraint belongs to.
    pub group: ConstraintGroup,
    /// The constraint itself.
    pub constraint: LinearConstraint,
}

/// Every constraint of the model, split by removability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintSet {
    permanent: Vec<LinearConstraint>,
    removable: Vec<GroupedConstraint>,
}

impl ConstraintSet {
    /// Constraints that stay installed for the whole run.
    #[must_use]
    pub fn permanent(&self) -> &[LinearConstraint] {
        &self.permanent
    }

    /// Constraints tagged with a removable group.
    #[must_use]
    pub fn removable(&self) -> &[GroupedConstraint] {
        &self.removable
    }

    /// Constraints of `group`.
    pub fn group(&self, group: ConstraintGroup) -> impl Iterator<Item = &LinearConstraint> + '_ {
        self.removable
            .iter()
            .filter(move |grouped| grouped.group == group)
            .map(|grouped| &grouped.constraint)
    }

    /// Groups with at least one constraint.
    #[must_use]
    pub fn groups(&self) -> BTreeSet<ConstraintGroup> {
        self.removable.iter().map(|grouped| grouped.group).collect()
    }

    /// Total number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.permanent.len() + self.removable.len()
    }

    /// Whether the set holds no constraint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permanent.is_empty() && self.removable.is_empty()
    }

    /// Add every constraint to `backend`.
    ///
    /// # Errors
    /// Propagates the first backend failure.
    pub fn install<B: MipBackend>(&self, backend: &mut B) -> Result<(), BackendError> {
        for constraint in &self.permanent {
            backend.add_linear_constraint(constraint.clone(), None)?;
        }
        for grouped in &self.removable {
            backend.add_linear_constraint(grouped.constraint.clone(), Some(grouped.group))?;
        }
        Ok(())
    }

    /// Remove whatever `group` currently holds on `backend` and add its
    /// constraints again. Returns the number of constraints installed.
    ///
    /// # Errors
    /// Propagates the first backend failure.
    pub fn reinstall<B: MipBackend>(
        &self,
        backend: &mut B,
        group: ConstraintGroup,
    ) -> Result<usize, BackendError> {
        backend.remove_constraints(group);
        let mut installed = 0;
        for constraint in self.group(group) {
            backend.add_linear_constraint(constraint.clone(), Some(group))?;
            installed += 1;
        }
        Ok(installed)
    }

    fn push(&mut self, constraint: LinearConstraint) {
        self.permanent.push(constraint);
    }

    fn push_grouped(&mut self, group: ConstraintGroup, constraint: LinearConstraint) {
        self.removable.push(GroupedConstraint { group, constraint });
    }
}

/// Generates the constraint set for a declared model.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintGenerator<'m> {
    graph: &'m TripGraph,
    vars: &'m DecisionVariables,
    config: &'m OptimizerConfig,
}

impl<'m> ConstraintGenerator<'m> {
    /// Generator over `graph` and its declared `vars`.
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

    /// Produce every constraint of the model.
    #[must_use]
    pub fn generate(&self) -> ConstraintSet {
        let mut set = ConstraintSet::default();
        self.single_rider(&mut set);
        self.request_nodes(&mut set);
        self.same_driver_per_trip(&mut set);
        self.depots(&mut set);
        self.precedence(&mut set);
        self.merges(&mut set);
        self.revenue_balance(&mut set);
        self.wheelchair_balance(&mut set);
        log::info!(
            "generated {} permanent and {} removable constraints",
            set.permanent.len(),
            set.removable.len()
        );
        set
    }

    /// Each primary trip is driven directly by exactly one driver.
    fn single_rider(&self, set: &mut ConstraintSet) {
        for entry in self.graph.trips() {
            let expr = sum_taken(
                self.graph
                    .driver_ids()
                    .filter_map(|(driver, _)| self.vars.lookup(driver, entry.primary)),
            );
            if expr.is_constant() {
                log::warn!(
                    "no rostered driver can serve trip {}; the model cannot be satisfied",
                    entry.trip.id
                );
            }
            set.push_grouped(
                ConstraintGroup::SingleRider,
                LinearConstraint::eq(expr, 1.0),
            );
        }
    }

    /// Flow, ordering, same-driver, capacity and time-window constraints
    /// attached to each pickup and dropoff.
    fn request_nodes(&self, set: &mut ConstraintSet) {
        let weights = driver_weights(self.graph.drivers().len());
        for (node_id, node) in self.graph.request_nodes() {
            let inbound: Vec<&DecisionPair> = self.vars.inbound_all(node_id).collect();
            let outbound: Vec<&DecisionPair> = self.vars.outbound_all(node_id).collect();
            let taken_in = sum_taken(inbound.iter().copied());
            let taken_out = sum_taken(outbound.iter().copied());
            let arrival = self.sum_arrival(inbound.iter().copied());
            let departure = sum_service_time(outbound.iter().copied());

            set.push(LinearConstraint::le(taken_in.clone(), 1.0));
            set.push(LinearConstraint::le(taken_out.clone(), 1.0));
            set.push(LinearConstraint::eq(difference(&taken_in, &taken_out), 0.0));

            set.push(LinearConstraint::le(difference(&arrival, &departure), 0.0));

            set.push(LinearConstraint::eq(
                difference(
                    &weighted_taken(inbound.iter().copied(), &weights),
                    &weighted_taken(outbound.iter().copied(), &weights),
                ),
                0.0,
            ));

            let load_out = sum_load(outbound.iter().copied());
            let load_in = sum_load(inbound.iter().copied());
            set.push(LinearConstraint::eq(
                difference(&load_out, &load_in),
                node.capacity_delta,
            ));

            match node.kind {
                NodeKind::Pickup(_) => {
                    set.push(LinearConstraint::ge(departure.clone(), node.window.open));
                    set.push(LinearConstraint::le(departure, node.window.close));
                }
                NodeKind::Dropoff(_) => {
                    set.push(LinearConstraint::le(arrival, node.window.close));
                }
                NodeKind::DepotStart(_) | NodeKind::DepotEnd(_) => {}
            }
        }
    }

    /// The driver who leaves a trip's pickup is the driver who reaches its
    /// dropoff.
    fn same_driver_per_trip(&self, set: &mut ConstraintSet) {
        let weights = driver_weights(self.graph.drivers().len());
        for entry in self.graph.trips() {
            let picked = weighted_taken(self.vars.outbound_all(entry.pickup), &weights);
            let dropped = weighted_taken(self.vars.inbound_all(entry.dropoff), &weights);
            set.push(LinearConstraint::eq(difference(&picked, &dropped), 0.0));
        }
    }

    /// Every driver leaves its own depot once and returns once; depot edges
    /// carry nobody; drivers without early duty start late.
    fn depots(&self, set: &mut ConstraintSet) {
        let earliest = self.config.early_day_time.fraction();
        for (driver, entry) in self.graph.driver_ids() {
            let leaving: Vec<&DecisionPair> = self.vars.outbound(driver, entry.start).collect();
            let returning = sum_taken(self.vars.inbound(driver, entry.end));
            set.push(LinearConstraint::eq(sum_taken(leaving.iter().copied()), 1.0));
            set.push(LinearConstraint::eq(returning, 1.0));
            if !entry.driver.early_day {
                set.push_grouped(
                    ConstraintGroup::EarlyDay,
                    LinearConstraint::ge(sum_service_time(leaving.iter().copied()), earliest),
                );
            }
        }
        for pair in self.vars.pairs() {
            let carries_nobody = self.graph.edge(pair.edge).is_some_and(|edge| {
                matches!(
                    edge.kind,
                    EdgeKind::DepotDeparture | EdgeKind::DepotReturn | EdgeKind::Idle(_)
                )
            });
            if carries_nobody {
                set.push(LinearConstraint::eq(LinearExpr::new().term(pair.load, 1.0), 0.0));
            }
        }
    }

    /// Consecutive legs of an itinerary happen in order.
    fn precedence(&self, set: &mut ConstraintSet) {
        for link in self.graph.itinerary_links() {
            let (Some(first), Some(second)) =
                (self.graph.trip(link.first), self.graph.trip(link.second))
            else {
                continue;
            };
            let first_departure = sum_service_time(self.vars.outbound_all(first.pickup));
            let first_dropoff = sum_service_time(self.vars.inbound_all(first.dropoff));
            let first_arrival = self.sum_arrival(self.vars.inbound_all(first.dropoff));
            let second_departure = sum_service_time(self.vars.outbound_all(second.pickup));
            let second_dropoff = sum_service_time(self.vars.inbound_all(second.dropoff));

            set.push(LinearConstraint::le(
                difference(&first_departure, &first_dropoff),
                0.0,
            ));
            set.push(LinearConstraint::le(
                difference(&first_arrival, &second_departure),
                0.0,
            ));
            set.push(LinearConstraint::le(
                difference(&second_departure, &second_dropoff),
                0.0,
            ));
        }
    }

    /// A merge leg is driven by whoever drives its predecessor.
    fn merges(&self, set: &mut ConstraintSet) {
        for link in self.graph.merges() {
            let (Some(merge), Some(predecessor)) =
                (self.graph.trip(link.merge), self.graph.trip(link.predecessor))
            else {
                continue;
            };
            for (driver, _) in self.graph.driver_ids() {
                let merge_pair = self.vars.lookup(driver, merge.primary);
                let predecessor_pair = self.vars.lookup(driver, predecessor.primary);
                let expr = match (merge_pair, predecessor_pair) {
                    (Some(follower), Some(leader)) => LinearExpr::new()
                        .term(follower.taken, 1.0)
                        .term(leader.taken, -1.0),
                    (Some(only), None) | (None, Some(only)) => {
                        LinearExpr::new().term(only.taken, 1.0)
                    }
                    (None, None) => continue,
                };
                set.push(LinearConstraint::eq(expr, 0.0));
            }
        }
    }

    /// Tie each driver's revenue to the legs it drives and bound it by the
    /// shared envelope.
    fn revenue_balance(&self, set: &mut ConstraintSet) {
        let fairness = self.vars.fairness();
        for &(driver, total) in &fairness.revenue {
            let mut earned = LinearExpr::new().term(total, 1.0);
            for pair in self.driver_pairs(driver) {
                let revenue = self
                    .graph
                    .edge(pair.edge)
                    .and_then(|edge| self.graph.node(edge.origin))
                    .map_or(0.0, |node| node.revenue);
                if revenue.abs() > f64::EPSILON {
                    earned.add_term(pair.taken, -revenue);
                }
            }
            set.push(LinearConstraint::eq(earned, 0.0));
            push_envelope(set, total, fairness.revenue_min, fairness.revenue_max);
        }
    }

    /// Same pattern as revenue, counting wheelchair legs of capable drivers.
    fn wheelchair_balance(&self, set: &mut ConstraintSet) {
        let fairness = self.vars.fairness();
        for &(driver, count) in &fairness.wheelchair {
            let mut driven = LinearExpr::new().term(count, 1.0);
            for pair in self.driver_pairs(driver) {
                let wheelchair = self
                    .graph
                    .edge(pair.edge)
                    .is_some_and(|edge| edge.los == LevelOfService::Wheelchair);
                if wheelchair {
                    driven.add_term(pair.taken, -1.0);
                }
            }
            set.push(LinearConstraint::eq(driven, 0.0));
            push_envelope(set, count, fairness.wheelchair_min, fairness.wheelchair_max);
        }
    }

    fn driver_pairs(&self, driver: DriverIdx) -> impl Iterator<Item = &DecisionPair> + '_ {
        self.vars
            .pairs()
            .iter()
            .filter(move |pair| pair.driver == driver)
    }

    fn sum_arrival<'p>(&self, pairs: impl Iterator<Item = &'p DecisionPair>) -> LinearExpr {
        arrival_expr(self.graph, pairs)
    }
}

/// `Σ (service_time + travel · taken)` over `pairs`.
pub(crate) fn arrival_expr<'p>(
    graph: &TripGraph,
    pairs: impl Iterator<Item = &'p DecisionPair>,
) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for pair in pairs {
        let travel = graph.edge(pair.edge).map_or(0.0, |edge| edge.cost.time);
        expr.add_term(pair.service_time, 1.0);
        expr.add_term(pair.taken, travel);
    }
    expr
}

/// `Σ taken` over `pairs`.
pub(crate) fn sum_taken<'p>(pairs: impl Iterator<Item = &'p DecisionPair>) -> LinearExpr {
    pairs.fold(LinearExpr::new(), |expr, pair| expr.term(pair.taken, 1.0))
}

/// `Σ service_time` over `pairs`.
pub(crate) fn sum_service_time<'p>(pairs: impl Iterator<Item = &'p DecisionPair>) -> LinearExpr {
    pairs.fold(LinearExpr::new(), |expr, pair| {
        expr.term(pair.service_time, 1.0)
    })
}

fn sum_load<'p>(pairs: impl Iterator<Item = &'p DecisionPair>) -> LinearExpr {
    pairs.fold(LinearExpr::new(), |expr, pair| expr.term(pair.load, 1.0))
}

fn weighted_taken<'p>(
    pairs: impl Iterator<Item = &'p DecisionPair>,
    weights: &[f64],
) -> LinearExpr {
    pairs.fold(LinearExpr::new(), |expr, pair| {
        let weight = weights.get(pair.driver.index()).copied().unwrap_or(1.0);
        expr.term(pair.taken, weight)
    })
}

/// Distinct selector weights: the 1-based ordinal of each driver.
fn driver_weights(count: usize) -> Vec<f64> {
    iter::successors(Some(1.0_f64), |weight| Some(weight + 1.0))
        .take(count)
        .collect()
}

fn difference(lhs: &LinearExpr, rhs: &LinearExpr) -> LinearExpr {
    let mut expr = lhs.clone();
    expr.add_scaled(rhs, -1.0);
    expr
}

fn push_envelope(set: &mut ConstraintSet, value: VarId, lower: VarId, upper: VarId) {
    set.push(LinearConstraint::ge(
        LinearExpr::new().term(value, 1.0).term(lower, -1.0),
        0.0,
    ));
    set.push(LinearConstraint::le(
        LinearExpr::new().term(value, 1.0).term(upper, -1.0),
        0.0,
    ));
}
