//! Construction and iterative solution of the assignment network.
use std::time::Instant;

use log::{debug, info, warn};
use smallvec::SmallVec;

use crate::bench::Bench;
use crate::catalog::Target;
use crate::constants::{VisitAssignment, VisitPositions};
use crate::cost::CostModel;
use crate::fiberassign_errors::FiberAssignError;
use crate::netflow::constraints::Bans;
use crate::netflow::graph::FlowGraph;
use crate::netflow::solution::{CostBreakdown, NetflowSolution};
use crate::netflow::NetflowParams;

/// Reachable cobras of one target in one visit, with the move cost of each.
pub(super) type Candidates = SmallVec<[(usize, f64); 4]>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum TargetKind {
    Science { required: usize },
    Calibration { class: usize },
}

#[derive(Debug, Clone)]
pub(super) struct CalibClass {
    pub name: String,
    pub num_required: usize,
    pub non_obs: f64,
    pub members: Vec<usize>,
}

/// A fully validated assignment problem.
///
/// Building the problem computes, once, which cobras can reach which target in every visit;
/// [`NetflowProblem::solve`] then only rebuilds the flow network around the current bans.
#[derive(Debug)]
pub struct NetflowProblem<'a> {
    pub(super) bench: &'a Bench,
    pub(super) targets: &'a [Target],
    pub(super) positions: &'a [VisitPositions],
    pub(super) params: NetflowParams,
    pub(super) visit_costs: Vec<f64>,
    pub(super) kinds: Vec<TargetKind>,
    pub(super) non_obs: Vec<f64>,
    pub(super) partial: Vec<f64>,
    /// Per-visit non-observation cost, used to decide which side of a conflict gives way
    pub(super) value: Vec<f64>,
    pub(super) calib: Vec<CalibClass>,
    /// `[visit][target]`
    pub(super) candidates: Vec<Vec<Candidates>>,
}

impl<'a> NetflowProblem<'a> {
    /// Validate the inputs and precompute the reachable cobras.
    ///
    /// Arguments
    /// -----------------
    /// * `bench`: the cobras.
    /// * `targets`: all targets.
    /// * `positions`: one vector of focal-plane positions per visit, indexed like `targets`.
    /// * `costs`: configuration of every target class.
    /// * `params`: validated [`NetflowParams`].
    ///
    /// Return
    /// ----------
    /// * The problem, or
    ///   - [`FiberAssignError::InvalidParameter`] without any visit or for a bad move cost,
    ///   - [`FiberAssignError::VisitCountMismatch`] if `visit_costs` does not have one entry per
    ///     visit,
    ///   - [`FiberAssignError::PositionCountMismatch`] if a visit lacks positions,
    ///   - the errors of [`CostModel::check_targets`].
    pub fn new(
        bench: &'a Bench,
        targets: &'a [Target],
        positions: &'a [VisitPositions],
        costs: &CostModel,
        params: NetflowParams,
    ) -> Result<Self, FiberAssignError> {
        let nvisit = positions.len();
        if nvisit == 0 {
            return Err(FiberAssignError::InvalidParameter(
                "at least one visit is required".into(),
            ));
        }
        let visit_costs = if params.visit_costs.is_empty() {
            vec![0.0; nvisit]
        } else if params.visit_costs.len() == nvisit {
            params.visit_costs.clone()
        } else {
            return Err(FiberAssignError::VisitCountMismatch {
                expected: nvisit,
                found: params.visit_costs.len(),
            });
        };
        for (visit, pos) in positions.iter().enumerate() {
            if pos.len() != targets.len() {
                return Err(FiberAssignError::PositionCountMismatch {
                    visit,
                    expected: targets.len(),
                    found: pos.len(),
                });
            }
        }
        costs.check_targets(targets)?;

        let mut calib: Vec<CalibClass> = costs
            .calibration_classes()
            .map(|(name, cfg)| CalibClass {
                name: name.to_string(),
                num_required: cfg.num_required.unwrap_or(0),
                non_obs: cfg.non_observation_cost,
                members: Vec::new(),
            })
            .collect();

        let mut kinds = Vec::with_capacity(targets.len());
        let mut non_obs = Vec::with_capacity(targets.len());
        let mut partial = Vec::with_capacity(targets.len());
        let mut value = Vec::with_capacity(targets.len());
        for (i, t) in targets.iter().enumerate() {
            let cfg = costs.get(&t.class)?;
            if cfg.calib {
                let class = calib
                    .iter()
                    .position(|c| c.name == t.class)
                    .ok_or_else(|| FiberAssignError::MissingClassConfig(t.class.clone()))?;
                calib[class].members.push(i);
                kinds.push(TargetKind::Calibration { class });
                value.push(cfg.non_observation_cost);
            } else {
                let required = params.required_visits(t.exposure_time);
                kinds.push(TargetKind::Science { required });
                value.push(cfg.non_observation_cost / required as f64);
            }
            non_obs.push(cfg.non_observation_cost);
            partial.push(cfg.partial_observation_cost);
        }

        let mut candidates = Vec::with_capacity(nvisit);
        let mut n_arcs = 0;
        for pos in positions {
            let mut per_target = Vec::with_capacity(targets.len());
            for (t, kind) in kinds.iter().enumerate() {
                let mut cands = Candidates::new();
                let feasible = match kind {
                    TargetKind::Science { required } => *required <= nvisit,
                    TargetKind::Calibration { .. } => true,
                };
                if feasible {
                    for c in bench.cobras_reaching(pos[t]) {
                        let cost = match &params.move_cost {
                            Some(mc) => mc.eval((pos[t] - bench.cobras()[c].center).norm()),
                            None => 0.0,
                        };
                        if !(cost.is_finite() && cost >= 0.0) {
                            return Err(FiberAssignError::InvalidParameter(format!(
                                "move cost must be finite and >= 0, got {cost}"
                            )));
                        }
                        cands.push((c, cost));
                    }
                }
                n_arcs += cands.len();
                per_target.push(cands);
            }
            candidates.push(per_target);
        }

        let n_infeasible = kinds
            .iter()
            .filter(|k| matches!(k, TargetKind::Science { required } if *required > nvisit))
            .count();
        debug!(
            "netflow problem: {} targets, {} visits, {} cobras, {} target/cobra arcs, {} targets need more visits than available",
            targets.len(),
            nvisit,
            bench.len(),
            n_arcs,
            n_infeasible
        );

        Ok(NetflowProblem {
            bench,
            targets,
            positions,
            params,
            visit_costs,
            kinds,
            non_obs,
            partial,
            value,
            calib,
            candidates,
        })
    }

    pub fn n_visits(&self) -> usize {
        self.positions.len()
    }

    pub fn params(&self) -> &NetflowParams {
        &self.params
    }

    /// Solve the network, repairing collisions until none is left or the limits are reached,
    /// then apply the local moves that lower the cost of partly observed targets.
    pub fn solve(&self) -> NetflowSolution {
        let start = Instant::now();
        let mut bans = Bans::default();
        let mut iterations = 0;

        let (mut visits, converged) = loop {
            iterations += 1;
            let visits = self.solve_once(&bans);
            let violations = self.violations(&visits);
            debug!(
                "netflow iteration {}: {} assignments, {} violations",
                iterations,
                visits.iter().map(|v| v.len()).sum::<usize>(),
                violations.len()
            );

            if violations.is_empty() {
                break (visits, true);
            }
            if iterations >= self.params.max_iterations || start.elapsed() >= self.params.time_limit
            {
                break (visits, false);
            }
            bans.extend(&violations);
        };

        if !converged {
            warn!(
                "netflow stopped after {} iterations with violations left; removing them greedily",
                iterations
            );
            self.enforce(&mut visits);
        }
        let moves = self.improve(&mut visits);
        if moves > 0 {
            debug!("netflow: {} local improvements applied", moves);
        }

        let cost = self.cost_of(&visits);
        info!(
            "netflow: total cost {:.3}, {} complete / {} partial / {} unobserved science targets, {} iterations in {:.2?}",
            cost.total(),
            cost.n_complete,
            cost.n_partial,
            cost.n_unobserved,
            iterations,
            start.elapsed()
        );

        NetflowSolution {
            visits,
            cost,
            iterations,
            converged,
        }
    }

    /// One min-cost flow solve with the current bans.
    fn solve_once(&self, bans: &Bans) -> Vec<VisitAssignment> {
        let nvisit = self.n_visits();
        let ncobra = self.bench.len();

        let mut net = Network {
            graph: FlowGraph::new(),
            source: 0,
            sink: 0,
            cobra_nodes: vec![None; ncobra * nvisit],
            assign_arcs: Vec::new(),
        };
        net.source = net.graph.add_node();
        net.sink = net.graph.add_node();

        for (t, kind) in self.kinds.iter().enumerate() {
            let TargetKind::Science { required } = *kind else {
                continue;
            };
            if required > nvisit || bans.targets.contains(&t) {
                continue;
            }
            let open: Vec<usize> = (0..nvisit)
                .filter(|&v| self.allowed(bans, t, v).next().is_some())
                .collect();
            if open.is_empty() {
                continue;
            }

            let node = net.graph.add_node();
            let unit = self.non_obs[t] / required as f64;
            net.graph.add_arc(net.source, node, required as i64, 0.0);
            net.graph.add_arc(node, net.sink, required as i64, unit);
            for v in open {
                self.add_target_visit(&mut net, bans, node, t, v);
            }
        }

        for class in &self.calib {
            if class.num_required == 0 {
                continue;
            }
            for v in 0..nvisit {
                let node = net.graph.add_node();
                let need = class.num_required as i64;
                net.graph.add_arc(net.source, node, need, 0.0);
                net.graph.add_arc(node, net.sink, need, class.non_obs);
                for &t in &class.members {
                    if self.allowed(bans, t, v).next().is_some() {
                        self.add_target_visit(&mut net, bans, node, t, v);
                    }
                }
            }
        }

        let result = net.graph.min_cost_flow(net.source, net.sink);
        debug!(
            "flow network: {} nodes, {} arcs, flow {}, cost {:.3}",
            net.graph.n_nodes(),
            net.graph.n_arcs(),
            result.flow,
            result.cost
        );

        let mut visits = vec![VisitAssignment::new(); nvisit];
        for &(arc, t, v, c) in &net.assign_arcs {
            if net.graph.flow(arc) > 0 {
                visits[v].insert(t, c);
            }
        }
        visits
    }

    /// Candidate arcs of `t` in visit `v` that are not banned.
    fn allowed<'b>(
        &'b self,
        bans: &'b Bans,
        t: usize,
        v: usize,
    ) -> impl Iterator<Item = (usize, f64)> + 'b {
        let open = !bans.target_visits.contains(&(t, v));
        self.candidates[v][t]
            .iter()
            .copied()
            .filter(move |&(c, _)| open && !bans.arcs.contains(&(t, v, c)))
    }

    fn add_target_visit(&self, net: &mut Network, bans: &Bans, from: usize, t: usize, v: usize) {
        let tv = net.graph.add_node();
        net.graph.add_arc(from, tv, 1, self.visit_costs[v]);

        for (c, cost) in self.allowed(bans, t, v) {
            let slot = c * self.n_visits() + v;
            let cv = match net.cobra_nodes[slot] {
                Some(node) => node,
                None => {
                    let node = net.graph.add_node();
                    net.graph.add_arc(node, net.sink, 1, 0.0);
                    net.cobra_nodes[slot] = Some(node);
                    node
                }
            };
            let arc = net.graph.add_arc(tv, cv, 1, cost);
            net.assign_arcs.push((arc, t, v, c));
        }
    }

    /// Cost of an assignment.
    ///
    /// Return
    /// ----------
    /// * The [`CostBreakdown`], or an error if `visits` does not have one map per visit or refers
    ///   to unknown targets or cobras.
    pub fn evaluate(&self, visits: &[VisitAssignment]) -> Result<CostBreakdown, FiberAssignError> {
        if visits.len() != self.n_visits() {
            return Err(FiberAssignError::VisitCountMismatch {
                expected: self.n_visits(),
                found: visits.len(),
            });
        }
        for visit in visits {
            for (&t, &c) in visit {
                if t >= self.targets.len() {
                    return Err(FiberAssignError::InvalidParameter(format!(
                        "unknown target index {t}"
                    )));
                }
                self.bench.cobra(c)?;
            }
        }
        Ok(self.cost_of(visits))
    }

    pub(super) fn cost_of(&self, visits: &[VisitAssignment]) -> CostBreakdown {
        let mut cost = CostBreakdown::default();
        let mut observed = vec![0usize; self.targets.len()];

        for (v, visit) in visits.iter().enumerate() {
            let mut per_class = vec![0usize; self.calib.len()];
            for (&t, &c) in visit {
                observed[t] += 1;
                cost.visit_cost += self.visit_costs[v];
                if let Some(mc) = &self.params.move_cost {
                    cost.move_cost += mc.eval((self.positions[v][t] - self.bench.cobras()[c].center).norm());
                }
                if let TargetKind::Calibration { class } = self.kinds[t] {
                    per_class[class] += 1;
                }
            }
            for (class, &count) in self.calib.iter().zip(&per_class) {
                let missing = class.num_required.saturating_sub(count);
                cost.calibration_shortfall += missing;
                cost.calibration_cost += missing as f64 * class.non_obs;
            }
        }

        for (t, kind) in self.kinds.iter().enumerate() {
            if let TargetKind::Science { required } = *kind {
                match observed[t] {
                    0 => {
                        cost.n_unobserved += 1;
                        cost.non_observation_cost += self.non_obs[t];
                    }
                    k if k < required => {
                        cost.n_partial += 1;
                        cost.partial_cost += self.partial[t];
                    }
                    _ => cost.n_complete += 1,
                }
            }
        }
        cost
    }
}

/// Flow graph of one solve plus the bookkeeping needed to read the assignment back.
struct Network {
    graph: FlowGraph,
    source: usize,
    sink: usize,
    /// `[cobra * nvisit + visit]`
    cobra_nodes: Vec<Option<usize>>,
    /// `(arc, target, visit, cobra)`
    assign_arcs: Vec<(usize, usize, usize, usize)>,
}

#[cfg(test)]
mod problem_test {
    use super::*;
    use crate::cost::{ClassConfig, MoveCost};
    use approx::assert_relative_eq;
    use nalgebra::Complex;

    fn bench() -> Bench {
        // three cobras on a line, 8 mm apart
        let centers = [Complex::new(0.0, 0.0), Complex::new(8.0, 0.0), Complex::new(16.0, 0.0)];
        Bench::from_centers(&centers, 2.375, 2.375).unwrap()
    }

    fn sci(id: &str, priority: u32, time: f64) -> Target {
        Target::science(id, 0.0, 0.0, time, priority, "sci")
    }

    fn costs() -> CostModel {
        CostModel::science_ladder("sci", 3, 100.0, 10.0)
    }

    #[test]
    fn test_input_validation() {
        let bench = bench();
        let targets = vec![sci("A", 1, 900.0)];
        let costs = costs();

        let none: Vec<VisitPositions> = vec![];
        assert!(NetflowProblem::new(&bench, &targets, &none, &costs, NetflowParams::default()).is_err());

        let short = vec![vec![]];
        assert_eq!(
            NetflowProblem::new(&bench, &targets, &short, &costs, NetflowParams::default()).unwrap_err(),
            FiberAssignError::PositionCountMismatch {
                visit: 0,
                expected: 1,
                found: 0
            }
        );

        let pos = vec![vec![Complex::new(2.0, -1.0)]; 2];
        let params = NetflowParams::builder().visit_costs(vec![1.0]).build().unwrap();
        assert_eq!(
            NetflowProblem::new(&bench, &targets, &pos, &costs, params).unwrap_err(),
            FiberAssignError::VisitCountMismatch {
                expected: 2,
                found: 1
            }
        );

        let params = NetflowParams::builder()
            .move_cost(MoveCost::new(|d| -d))
            .build()
            .unwrap();
        assert!(NetflowProblem::new(&bench, &targets, &pos, &costs, params).is_err());

        let unknown = vec![sci("B", 9, 900.0)];
        let pos = vec![vec![Complex::new(2.0, -1.0)]];
        assert_eq!(
            NetflowProblem::new(&bench, &unknown, &pos, &costs, NetflowParams::default()).unwrap_err(),
            FiberAssignError::MissingClassConfig("sci_P9".into())
        );
    }

    #[test]
    fn test_priority_wins_shared_cobra() {
        // both targets are only reachable by cobra 0
        let bench = bench();
        let targets = vec![sci("LOW", 3, 900.0), sci("HIGH", 1, 900.0)];
        let pos = vec![vec![Complex::new(-2.0, -1.0), Complex::new(-1.0, -3.0)]];
        let problem =
            NetflowProblem::new(&bench, &targets, &pos, &costs(), NetflowParams::default()).unwrap();

        let solution = problem.solve();
        assert!(solution.converged);
        assert_eq!(solution.visits[0], VisitAssignment::from([(1, 0)]));
        assert_eq!(solution.cost.n_unobserved, 1);
        assert_relative_eq!(solution.cost.total(), 80.0);
    }

    #[test]
    fn test_multi_visit_target() {
        let bench = bench();
        let targets = vec![sci("LONG", 1, 1800.0), sci("TOO_LONG", 1, 2701.0)];
        let pos = vec![vec![Complex::new(8.0, -2.0), Complex::new(16.0, -2.0)]; 3];
        let params = NetflowParams::builder()
            .visit_costs(vec![0.1, 0.2, 0.3])
            .build()
            .unwrap();
        let problem = NetflowProblem::new(&bench, &targets, &pos, &costs(), params).unwrap();

        let solution = problem.solve();
        // two cheapest visits for the first target, the second needs 4 visits out of 3
        assert!(solution.visits[0].contains_key(&0));
        assert!(solution.visits[1].contains_key(&0));
        assert!(!solution.visits[2].contains_key(&0));
        assert_eq!(solution.visits_of(1), 0);
        assert_eq!(solution.cost.n_complete, 1);
        assert_relative_eq!(solution.cost.visit_cost, 0.3, epsilon = 1e-12);
        assert_relative_eq!(solution.cost.total(), 100.3, epsilon = 1e-9);

        assert_eq!(problem.evaluate(&solution.visits).unwrap(), solution.cost);
    }

    #[test]
    fn test_calibration_requirement() {
        let bench = bench();
        let targets = vec![
            Target::calibration("SKY0", 0.0, 0.0, "sky"),
            Target::calibration("SKY1", 0.0, 0.0, "sky"),
            sci("S", 1, 900.0),
        ];
        let costs = costs().with("sky", ClassConfig::calibration(2, 1000.0));
        // SKY1 is out of reach: one sky target is missing in every visit
        let pos = vec![vec![Complex::new(0.0, -2.0), Complex::new(40.0, 0.0), Complex::new(8.0, -2.0)]; 2];
        let problem = NetflowProblem::new(&bench, &targets, &pos, &costs, NetflowParams::default()).unwrap();

        let solution = problem.solve();
        assert_eq!(solution.visits_of(0), 2);
        assert_eq!(solution.visits_of(2), 1);
        assert_eq!(solution.cost.calibration_shortfall, 2);
        assert_relative_eq!(solution.cost.calibration_cost, 2000.0);
    }

    #[test]
    fn test_evaluate_rejects_bad_input() {
        let bench = bench();
        let targets = vec![sci("A", 1, 900.0)];
        let pos = vec![vec![Complex::new(1.0, -1.0)]];
        let problem = NetflowProblem::new(&bench, &targets, &pos, &costs(), NetflowParams::default()).unwrap();

        assert!(problem.evaluate(&[]).is_err());
        assert!(problem.evaluate(&[VisitAssignment::from([(3, 0)])]).is_err());
        assert_eq!(
            problem.evaluate(&[VisitAssignment::from([(0, 7)])]).unwrap_err(),
            FiberAssignError::CobraOutOfRange { index: 7, len: 3 }
        );
        let unobserved = problem.evaluate(&[VisitAssignment::new()]).unwrap();
        assert_relative_eq!(unobserved.total(), 100.0);
    }
}
