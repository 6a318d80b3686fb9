//! Collision and partial-observation constraints of the netflow repair loop.
use std::collections::{BTreeSet, HashSet};

use ahash::RandomState;

use crate::constants::{FpPosition, VisitAssignment};
use crate::geometry::segment_distance;
use crate::netflow::problem::{NetflowProblem, TargetKind};
use crate::raster::FpRaster;

/// A constraint broken by an assignment; always names the side that has to give way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Violation {
    /// `target` is too close to a more valuable target of the same visit
    TargetCollision { visit: usize, target: usize },
    /// the assignment `target → cobra` collides with the elbow of, or is hit by, another arm
    ElbowCollision {
        visit: usize,
        target: usize,
        cobra: usize,
    },
    /// the second arm of `cobra` on `target` comes too close to the second arm of a neighbour,
    /// assigned or parked
    ArmCollision {
        visit: usize,
        target: usize,
        cobra: usize,
    },
    /// `target` is observed in too few visits
    Partial { target: usize },
}

/// Parts of the network removed by the repair loop.
#[derive(Debug, Default)]
pub(super) struct Bans {
    pub targets: HashSet<usize, RandomState>,
    pub target_visits: HashSet<(usize, usize), RandomState>,
    pub arcs: HashSet<(usize, usize, usize), RandomState>,
}

impl Bans {
    pub fn extend(&mut self, violations: &BTreeSet<Violation>) {
        for v in violations {
            match *v {
                Violation::TargetCollision { visit, target } => {
                    self.target_visits.insert((target, visit));
                }
                Violation::ElbowCollision {
                    visit,
                    target,
                    cobra,
                }
                | Violation::ArmCollision {
                    visit,
                    target,
                    cobra,
                } => {
                    self.arcs.insert((target, visit, cobra));
                }
                Violation::Partial { target } => {
                    self.targets.insert(target);
                }
            }
        }
    }
}

impl NetflowProblem<'_> {
    /// `true` if target `a` gives way to target `b`.
    fn loses(&self, a: usize, b: usize) -> bool {
        self.value[a] < self.value[b] || (self.value[a] == self.value[b] && a > b)
    }

    /// All violations of an assignment, in a deterministic order.
    pub(super) fn violations(&self, visits: &[VisitAssignment]) -> BTreeSet<Violation> {
        let mut found = BTreeSet::new();
        let pairs = self.bench.collision_pairs(self.params.collision_distance);
        for (v, visit) in visits.iter().enumerate() {
            self.visit_collisions(v, visit, &pairs, &mut found);
        }

        let mut observed = vec![0usize; self.targets.len()];
        for visit in visits {
            for &t in visit.keys() {
                observed[t] += 1;
            }
        }
        for (t, kind) in self.kinds.iter().enumerate() {
            if let TargetKind::Science { required } = *kind {
                let k = observed[t];
                // dropping the target entirely is cheaper than leaving it incomplete
                if k > 0 && k < required && self.partial[t] > self.non_obs[t] {
                    found.insert(Violation::Partial { target: t });
                }
            }
        }

        found
    }

    /// Collisions between the assignments of visit `v`.
    ///
    /// `pairs` are the cobra pairs of [`Bench::collision_pairs`](crate::bench::Bench::collision_pairs)
    /// for the configured collision distance.
    pub(super) fn visit_collisions(
        &self,
        v: usize,
        visit: &VisitAssignment,
        pairs: &[(usize, usize)],
        found: &mut BTreeSet<Violation>,
    ) {
        let cd = self.params.collision_distance;
        if visit.is_empty() || cd <= 0.0 {
            return;
        }
        if self.params.elbow_collisions {
            self.arm_collisions(v, visit, pairs, found);
        }
        if visit.len() < 2 {
            return;
        }
        let assigned: Vec<(usize, usize)> = visit.iter().map(|(&t, &c)| (t, c)).collect();
        let pts: Vec<FpPosition> = assigned.iter().map(|&(t, _)| self.positions[v][t]).collect();
        let side = ((pts.len() as f64).sqrt() as usize).clamp(1, 100);
        let Ok(raster) = FpRaster::new(&pts, side, side) else {
            return;
        };

        for (i, &(t, c)) in assigned.iter().enumerate() {
            for j in raster.query(pts[i], cd) {
                if j <= i || (pts[j] - pts[i]).norm() >= cd {
                    continue;
                }
                let other = assigned[j].0;
                let target = if self.loses(t, other) { t } else { other };
                found.insert(Violation::TargetCollision { visit: v, target });
            }

            if !self.params.elbow_collisions {
                continue;
            }
            let Some(elbow) = self.bench.cobras()[c].elbow_position(pts[i]) else {
                continue;
            };
            for j in raster.query(elbow, cd) {
                if j == i || (pts[j] - elbow).norm() >= cd {
                    continue;
                }
                let (other, other_cobra) = assigned[j];
                let violation = if self.loses(t, other) {
                    Violation::ElbowCollision {
                        visit: v,
                        target: t,
                        cobra: c,
                    }
                } else {
                    Violation::ElbowCollision {
                        visit: v,
                        target: other,
                        cobra: other_cobra,
                    }
                };
                found.insert(violation);
            }
        }
    }

    /// Second arms (elbow → fiber) of neighbouring cobras closer than the collision distance
    /// once every cobra of visit `v` sits on its target.
    ///
    /// Unassigned cobras stay parked; an assignment hitting a parked arm always gives way.
    fn arm_collisions(
        &self,
        v: usize,
        visit: &VisitAssignment,
        pairs: &[(usize, usize)],
        found: &mut BTreeSet<Violation>,
    ) {
        let cd = self.params.collision_distance;
        let cobras = self.bench.cobras();
        let mut holder: Vec<Option<usize>> = vec![None; cobras.len()];
        for (&t, &c) in visit {
            holder[c] = Some(t);
        }
        let arm = |c: usize| {
            let cobra = &cobras[c];
            let (theta, phi) = match holder[c] {
                Some(t) => cobra.angles(self.positions[v][t])?,
                None => cobra.home(),
            };
            Some(cobra.forward(theta, phi))
        };

        for &(i, j) in pairs {
            let (target, cobra) = match (holder[i], holder[j]) {
                (None, None) => continue,
                (Some(a), Some(b)) if !self.loses(a, b) => (b, j),
                (Some(a), _) => (a, i),
                (None, Some(b)) => (b, j),
            };
            let (Some((ei, fi)), Some((ej, fj))) = (arm(i), arm(j)) else {
                continue;
            };
            if segment_distance(ei, fi, ej, fj) < cd {
                found.insert(Violation::ArmCollision {
                    visit: v,
                    target,
                    cobra,
                });
            }
        }
    }

    /// Remove assignments until no violation is left.
    pub(super) fn enforce(&self, visits: &mut [VisitAssignment]) {
        loop {
            let violations = self.violations(visits);
            if violations.is_empty() {
                return;
            }
            for v in violations {
                match v {
                    Violation::TargetCollision { visit, target } => {
                        visits[visit].remove(&target);
                    }
                    Violation::ElbowCollision {
                        visit,
                        target,
                        cobra,
                    }
                    | Violation::ArmCollision {
                        visit,
                        target,
                        cobra,
                    } => {
                        if visits[visit].get(&target) == Some(&cobra) {
                            visits[visit].remove(&target);
                        }
                    }
                    Violation::Partial { target } => {
                        for visit in visits.iter_mut() {
                            visit.remove(&target);
                        }
                    }
                }
            }
        }
    }
}
