//! Local search on top of the flow solution.
//!
//! The flow network charges an unobserved visit of a science target `non_obs / n(t)`, the
//! objective charges `partial_observation_cost` once for any `0 < k < n(t)`. The two disagree
//! when a target is only partly observed, so after the repair loop single moves are tried
//! against the objective itself:
//!
//! * **insert** – a target takes a free cobra in a visit it is not observed in,
//! * **swap** – a target takes the cobra of another target of that visit.
//!
//! A move is applied when it lowers the total cost and leaves its visit free of collisions.
//! Passes are repeated until none applies.
use std::collections::BTreeSet;

use log::debug;

use crate::constants::VisitAssignment;
use crate::netflow::problem::{NetflowProblem, TargetKind};

/// Smallest cost decrease accepted as an improvement.
const MIN_GAIN: f64 = 1e-9;

/// Counters of the current assignment kept up to date while moves are applied.
struct Tally {
    /// `[target]` number of visits the target is observed in
    observed: Vec<usize>,
    /// `[visit][cobra]` target held by the cobra
    holder: Vec<Vec<Option<usize>>>,
    /// `[visit][class]` assigned calibration targets
    calib: Vec<Vec<usize>>,
}

impl NetflowProblem<'_> {
    /// Penalty of target `t` observed in `k` visits, calibration targets excluded.
    fn science_penalty(&self, t: usize, k: usize, required: usize) -> f64 {
        match k {
            0 => self.non_obs[t],
            k if k < required => self.partial[t],
            _ => 0.0,
        }
    }

    /// Change of the penalties when `t` gains an observation in visit `v`.
    fn gain(&self, tally: &Tally, t: usize, v: usize) -> Option<f64> {
        match self.kinds[t] {
            TargetKind::Science { required } => {
                let k = tally.observed[t];
                (k < required).then(|| {
                    self.science_penalty(t, k + 1, required) - self.science_penalty(t, k, required)
                })
            }
            TargetKind::Calibration { class } => {
                let c = &self.calib[class];
                Some(if tally.calib[v][class] < c.num_required {
                    -c.non_obs
                } else {
                    0.0
                })
            }
        }
    }

    /// Change of the penalties when `u` loses its observation in visit `v`.
    ///
    /// `None` if the loss would leave `u` partly observed although dropping it is cheaper.
    fn loss(&self, tally: &Tally, u: usize, v: usize) -> Option<f64> {
        match self.kinds[u] {
            TargetKind::Science { required } => {
                let k = tally.observed[u];
                if k - 1 > 0 && k - 1 < required && self.partial[u] > self.non_obs[u] {
                    return None;
                }
                Some(self.science_penalty(u, k - 1, required) - self.science_penalty(u, k, required))
            }
            TargetKind::Calibration { class } => {
                let c = &self.calib[class];
                Some(if tally.calib[v][class] <= c.num_required {
                    c.non_obs
                } else {
                    0.0
                })
            }
        }
    }

    fn move_cost_of(&self, t: usize, v: usize, c: usize) -> f64 {
        self.candidates[v][t]
            .iter()
            .find(|&&(cobra, _)| cobra == c)
            .map_or(0.0, |&(_, cost)| cost)
    }

    /// Apply improving insert and swap moves until none is left.
    ///
    /// `visits` must be free of violations; it stays so.
    ///
    /// Return
    /// ----------
    /// * The number of moves applied.
    pub(super) fn improve(&self, visits: &mut [VisitAssignment]) -> usize {
        let nvisit = self.n_visits();
        let mut tally = Tally {
            observed: vec![0; self.targets.len()],
            holder: vec![vec![None; self.bench.len()]; nvisit],
            calib: vec![vec![0; self.calib.len()]; nvisit],
        };
        for (v, visit) in visits.iter().enumerate() {
            for (&t, &c) in visit {
                tally.observed[t] += 1;
                tally.holder[v][c] = Some(t);
                if let TargetKind::Calibration { class } = self.kinds[t] {
                    tally.calib[v][class] += 1;
                }
            }
        }

        let pairs = self.bench.collision_pairs(self.params.collision_distance);
        let mut applied = 0;
        loop {
            let mut changed = false;
            for t in 0..self.targets.len() {
                // (delta, visit, cobra, displaced target)
                let mut moves: Vec<(f64, usize, usize, Option<usize>)> = Vec::new();
                for v in 0..nvisit {
                    if visits[v].contains_key(&t) {
                        continue;
                    }
                    let Some(gain) = self.gain(&tally, t, v) else {
                        continue;
                    };
                    for &(c, cost) in &self.candidates[v][t] {
                        let displaced = tally.holder[v][c];
                        let delta = match displaced {
                            None => gain + self.visit_costs[v] + cost,
                            Some(u) => match self.loss(&tally, u, v) {
                                Some(loss) => gain + loss + cost - self.move_cost_of(u, v, c),
                                None => continue,
                            },
                        };
                        if delta < -MIN_GAIN {
                            moves.push((delta, v, c, displaced));
                        }
                    }
                }
                moves.sort_by(|a, b| a.0.total_cmp(&b.0));

                for (delta, v, c, displaced) in moves {
                    let mut trial = visits[v].clone();
                    if let Some(u) = displaced {
                        trial.remove(&u);
                    }
                    trial.insert(t, c);
                    let mut found = BTreeSet::new();
                    self.visit_collisions(v, &trial, &pairs, &mut found);
                    if !found.is_empty() {
                        continue;
                    }

                    debug!(
                        "netflow improvement: target {t} -> cobra {c} in visit {v}{}, cost {delta:+.3}",
                        displaced.map_or(String::new(), |u| format!(" replacing target {u}"))
                    );
                    visits[v] = trial;
                    tally.observed[t] += 1;
                    tally.holder[v][c] = Some(t);
                    if let TargetKind::Calibration { class } = self.kinds[t] {
                        tally.calib[v][class] += 1;
                    }
                    if let Some(u) = displaced {
                        tally.observed[u] -= 1;
                        if let TargetKind::Calibration { class } = self.kinds[u] {
                            tally.calib[v][class] -= 1;
                        }
                    }
                    applied += 1;
                    changed = true;
                    break;
                }
            }
            if !changed {
                return applied;
            }
        }
    }
}
