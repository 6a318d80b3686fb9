//! # Greedy single-visit assignment strategies
//!
//! Fast alternatives to the network-flow engine: each strategy assigns the targets of **one**
//! visit to cobras, one pair at a time, never revisiting a decision.
//!
//! | strategy              | order of decisions                                                     |
//! |-----------------------|------------------------------------------------------------------------|
//! | [`NaiveAssigner`]     | cobras in index order, each takes its most important reachable target  |
//! | [`DrainingAssigner`]  | always the cobra with the fewest (non-zero) reachable targets next      |
//! | [`ProximityAssigner`] | targets by priority, then by a kernel-weighted density of their field   |
//!
//! After every assignment the cobra is removed, together with the observed target and every
//! target closer than the collision distance to it, so the result never contains two fibers
//! closer than that distance.
//!
//! The [`exposure`] submodule builds full observation plans on top of a strategy: choosing the
//! best pointing offset and position angle of a visit, and tiling a field with repeated visits.
use log::trace;

use crate::bench::Bench;
use crate::constants::{
    FpPosition, Millimeter, Seconds, VisitAssignment, COLLISION_DISTANCE, KERNEL_RADIUS,
};
use crate::raster::FpRaster;

pub mod exposure;
pub mod pqueue;

pub use exposure::{optimal_exposure, plan_tiles, select_observable, single_exposure};
pub use exposure::{DitherGrid, DitherGridBuilder, Exposure, Tile, TilingPlan};
pub use pqueue::IndexedPQueue;

/// A target as seen by a strategy: where it is in the focal plane and how much it matters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpTarget {
    pub pos: FpPosition,
    /// 1 is the most important
    pub priority: u32,
    /// Remaining exposure time
    pub time: Seconds,
}

/// A single-visit assignment strategy.
pub trait FiberAssigner {
    /// Assign `targets` to the cobras of `bench`.
    ///
    /// Return
    /// ----------
    /// * target index → cobra index, injective, with every target reachable by its cobra.
    fn assign(&self, bench: &Bench, targets: &[FpTarget]) -> VisitAssignment;

    fn name(&self) -> &'static str;
}

/// Cobra ↔ target reachability, shrinking as assignments are made.
#[derive(Debug)]
struct Mappings {
    raster: FpRaster,
    f2t: Vec<Vec<usize>>,
    t2f: Vec<Vec<usize>>,
}

impl Mappings {
    fn new(bench: &Bench, targets: &[FpTarget]) -> Option<Self> {
        let pos: Vec<FpPosition> = targets.iter().map(|t| t.pos).collect();
        let side = ((pos.len() as f64).sqrt().ceil() as usize).clamp(1, 100);
        let raster = FpRaster::new(&pos, side, side).ok()?;

        let mut f2t: Vec<Vec<usize>> = bench
            .cobras()
            .iter()
            .map(|cobra| {
                raster
                    .query(cobra.center, cobra.reach())
                    .into_iter()
                    .filter(|&t| cobra.can_reach(pos[t]))
                    .collect()
            })
            .collect();
        for list in &mut f2t {
            list.sort_unstable();
        }

        let mut t2f = vec![Vec::new(); targets.len()];
        for (fiber, list) in f2t.iter().enumerate() {
            for &t in list {
                t2f[t].push(fiber);
            }
        }
        Some(Mappings { raster, f2t, t2f })
    }

    /// Remove `fiber`, `target` and every target within `blocking` of `target`.
    fn cleanup(&mut self, fiber: usize, target: usize, blocking: Millimeter) {
        for t in std::mem::take(&mut self.f2t[fiber]) {
            self.t2f[t].retain(|&f| f != fiber);
        }
        for t in self.raster.query(self.raster.location(target), blocking) {
            for f in std::mem::take(&mut self.t2f[t]) {
                self.f2t[f].retain(|&x| x != t);
            }
        }
    }

    /// Most important target reachable by `fiber` (first one on ties).
    fn best_in_fiber(&self, fiber: usize, targets: &[FpTarget]) -> Option<usize> {
        self.f2t[fiber]
            .iter()
            .copied()
            .min_by_key(|&t| targets[t].priority)
    }
}

/// Cobras in index order; each takes its most important reachable target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveAssigner;

impl FiberAssigner for NaiveAssigner {
    fn assign(&self, bench: &Bench, targets: &[FpTarget]) -> VisitAssignment {
        let mut res = VisitAssignment::new();
        let Some(mut maps) = Mappings::new(bench, targets) else {
            return res;
        };

        for fiber in 0..bench.len() {
            if let Some(t) = maps.best_in_fiber(fiber, targets) {
                res.insert(t, fiber);
                maps.cleanup(fiber, t, COLLISION_DISTANCE);
            }
        }
        res
    }

    fn name(&self) -> &'static str {
        "naive"
    }
}

/// Repeatedly serves the cobra with the fewest reachable targets (Morales et al. 2012,
/// MNRAS 419, 1187).
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainingAssigner;

impl FiberAssigner for DrainingAssigner {
    fn assign(&self, bench: &Bench, targets: &[FpTarget]) -> VisitAssignment {
        let mut res = VisitAssignment::new();
        let Some(mut maps) = Mappings::new(bench, targets) else {
            return res;
        };

        loop {
            // first cobra with the smallest non-zero target count
            let fiber = maps
                .f2t
                .iter()
                .enumerate()
                .filter(|(_, l)| !l.is_empty())
                .min_by_key(|(_, l)| l.len())
                .map(|(f, _)| f);
            let Some(fiber) = fiber else {
                break;
            };
            let Some(t) = maps.best_in_fiber(fiber, targets) else {
                break;
            };
            res.insert(t, fiber);
            maps.cleanup(fiber, t, COLLISION_DISTANCE);
        }
        res
    }

    fn name(&self) -> &'static str {
        "draining"
    }
}

/// Ordering key of the proximity strategy: lower priority number first, then denser
/// neighbourhood first.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProxKey {
    priority: u32,
    prox: f64,
}

impl PartialOrd for ProxKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.priority != other.priority {
            Some(other.priority.cmp(&self.priority))
        } else {
            self.prox.partial_cmp(&other.prox)
        }
    }
}

/// Marks a target that cannot be assigned anymore.
const DONE: u32 = u32::MAX;

/// Targets in order of priority and local target density; assigning in dense regions first
/// evens out the distribution of the targets left for later visits.
///
/// The density of target `i` is `Σ_j time_i · time_j · K(|p_i − p_j|²)` with the parabolic
/// kernel `K(r²) = max(0, R² − r²)`, `R = kernel_radius`.
#[derive(Debug, Clone, Copy)]
pub struct ProximityAssigner {
    pub kernel_radius: Millimeter,
}

impl Default for ProximityAssigner {
    fn default() -> Self {
        ProximityAssigner {
            kernel_radius: KERNEL_RADIUS,
        }
    }
}

impl ProximityAssigner {
    #[inline]
    fn kernel(&self, rsq: f64) -> f64 {
        (self.kernel_radius * self.kernel_radius - rsq).max(0.0)
    }

    fn initial_keys(&self, maps: &Mappings, targets: &[FpTarget]) -> Vec<ProxKey> {
        let mut keys: Vec<ProxKey> = targets
            .iter()
            .map(|t| ProxKey {
                priority: t.priority,
                prox: 0.0,
            })
            .collect();

        for (i, ti) in targets.iter().enumerate() {
            if maps.t2f[i].is_empty() {
                continue;
            }
            for j in maps.raster.query(ti.pos, self.kernel_radius) {
                if i == j {
                    keys[i].prox += ti.time * ti.time * self.kernel(0.0);
                } else if i < j {
                    let tj = &targets[j];
                    let w = ti.time * tj.time * self.kernel((ti.pos - tj.pos).norm_sqr());
                    keys[i].prox += w;
                    keys[j].prox += w;
                }
            }
        }
        keys
    }

    /// Remove the contribution of the freshly assigned `target` from its neighbours.
    fn fix_keys(
        &self,
        maps: &Mappings,
        targets: &[FpTarget],
        target: usize,
        queue: &mut IndexedPQueue<ProxKey>,
    ) {
        let ti = &targets[target];
        for j in maps.raster.query(ti.pos, self.kernel_radius) {
            let mut key = queue.priority(j);
            if maps.t2f[j].is_empty() && key.prox == 0.0 {
                continue;
            }
            let tj = &targets[j];
            key.prox -= tj.time * ti.time * self.kernel((ti.pos - tj.pos).norm_sqr());
            queue.set_priority(j, key);
        }
    }
}

impl FiberAssigner for ProximityAssigner {
    fn assign(&self, bench: &Bench, targets: &[FpTarget]) -> VisitAssignment {
        let mut res = VisitAssignment::new();
        let Some(mut maps) = Mappings::new(bench, targets) else {
            return res;
        };
        let mut queue = IndexedPQueue::new(self.initial_keys(&maps, targets));

        while let Some(t) = queue.top() {
            if queue.priority(t).priority == DONE {
                break;
            }
            // least contested cobra among those reaching the target
            let fiber = maps.t2f[t]
                .iter()
                .copied()
                .min_by_key(|&f| maps.f2t[f].len());
            let Some(fiber) = fiber else {
                queue.set_priority(
                    t,
                    ProxKey {
                        priority: DONE,
                        prox: 0.0,
                    },
                );
                continue;
            };

            trace!("proximity: target {t} -> cobra {fiber}");
            res.insert(t, fiber);
            maps.cleanup(fiber, t, COLLISION_DISTANCE);
            self.fix_keys(&maps, targets, t, &mut queue);
        }
        res
    }

    fn name(&self) -> &'static str {
        "proximity"
    }
}
