//! # Cobra collision simulator
//!
//! Moves every cobra of the bench from its parked position to its assigned target and checks
//! whether the fiber arms of neighbouring cobras come too close on the way.
//!
//! ## Trajectories
//!
//! Each cobra starts folded at home, `(θ, φ) = (theta_home, π)`, and reaches the angles given
//! by the inverse kinematics of its target. Both angles are interpolated linearly over
//! `n_steps` steps; `θ` always turns in the positive direction. Cobras without a target stay
//! parked.
//!
//! ## Collisions
//!
//! Two cobras collide when the distance between their second arms (elbow → fiber segments)
//! drops below `collision_distance` at some step. Collisions still present at the last step
//! are also reported as **endpoint collisions**: those cannot be fixed by reordering moves.
//!
//! Only pairs of cobras whose patrol areas can come that close are tested
//! ([`Bench::collision_pairs`]).
use std::fmt;

use log::debug;

use crate::bench::Bench;
use crate::constants::{FpPosition, Millimeter, Radian, VisitAssignment, VisitPositions, COLLISION_DISTANCE, DPI};
use crate::fiberassign_errors::FiberAssignError;
use crate::geometry::segment_distance;

#[cfg(feature = "progress")]
use crate::progress_bar::VisitProgress;

/// Configuration of the collision simulation.
///
/// Defaults
/// -----------------
/// * `n_steps`: 50
/// * `collision_distance`: 2 mm
/// * `keep_trajectories`: false
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionParams {
    pub n_steps: usize,
    pub collision_distance: Millimeter,
    /// Store elbow and fiber positions of every step in the report
    pub keep_trajectories: bool,
}

impl Default for CollisionParams {
    fn default() -> Self {
        CollisionParams {
            n_steps: 50,
            collision_distance: COLLISION_DISTANCE,
            keep_trajectories: false,
        }
    }
}

impl CollisionParams {
    pub fn builder() -> CollisionParamsBuilder {
        CollisionParamsBuilder::default()
    }
}

/// Builder for [`CollisionParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct CollisionParamsBuilder {
    params: CollisionParams,
}

impl CollisionParamsBuilder {
    pub fn n_steps(mut self, v: usize) -> Self {
        self.params.n_steps = v;
        self
    }
    pub fn collision_distance(mut self, v: Millimeter) -> Self {
        self.params.collision_distance = v;
        self
    }
    pub fn keep_trajectories(mut self, v: bool) -> Self {
        self.params.keep_trajectories = v;
        self
    }

    pub fn build(self) -> Result<CollisionParams, FiberAssignError> {
        if self.params.n_steps == 0 {
            return Err(FiberAssignError::InvalidParameter(
                "n_steps must be >= 1".into(),
            ));
        }
        let cd = self.params.collision_distance;
        if !(cd.is_finite() && cd >= 0.0) {
            return Err(FiberAssignError::InvalidParameter(
                "collision_distance must be >= 0".into(),
            ));
        }
        Ok(self.params)
    }
}

impl fmt::Display for CollisionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 40;
            writeln!(f, "Collision Simulation Parameters")?;
            writeln!(f, "-------------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!("n_steps            = {}", self.n_steps, "Interpolation steps per move")?;
            line!(
                "collision_distance = {:.2} mm",
                self.collision_distance,
                "Minimum distance between fiber arms"
            )?;
            line!("keep_trajectories  = {}", self.keep_trajectories, "Store arm positions")?;
            Ok(())
        } else {
            write!(
                f,
                "CollisionParams(n_steps={}, collision_distance={:.2}mm)",
                self.n_steps, self.collision_distance
            )
        }
    }
}

/// Elbow and fiber positions of one cobra at one step.
pub type ArmPosition = (FpPosition, FpPosition);

/// Outcome of a [`CollisionSimulator::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionReport {
    /// Per cobra: collides with some neighbour during the move
    pub collisions: Vec<bool>,
    /// Per cobra: still collides at the end of the move
    pub endpoint_collisions: Vec<bool>,
    /// Colliding cobra pairs `(i, j)`, `i < j`, sorted
    pub pairs: Vec<(usize, usize)>,
    /// Per cobra, per step (`n_steps + 1` entries), when requested
    pub trajectories: Option<Vec<Vec<ArmPosition>>>,
}

impl CollisionReport {
    /// Indices of the cobras involved in a collision.
    pub fn problematic_cobras(&self) -> Vec<usize> {
        self.collisions
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of colliding cobra pairs.
    pub fn n_collisions(&self) -> usize {
        self.pairs.len()
    }

    pub fn n_endpoint_collisions(&self) -> usize {
        self.endpoint_collisions.iter().filter(|c| **c).count()
    }
}

/// Start and end angles of a move.
#[derive(Debug, Clone, Copy)]
struct Move {
    theta0: Radian,
    dtheta: Radian,
    phi0: Radian,
    dphi: Radian,
}

impl Move {
    fn at(&self, frac: f64) -> (Radian, Radian) {
        (self.theta0 + self.dtheta * frac, self.phi0 + self.dphi * frac)
    }
}

/// Simulates the moves of all cobras of a bench towards their targets.
#[derive(Debug)]
pub struct CollisionSimulator<'a> {
    bench: &'a Bench,
    targets: Vec<Option<FpPosition>>,
    params: CollisionParams,
    moves: Vec<Move>,
}

impl<'a> CollisionSimulator<'a> {
    /// Prepare the simulation.
    ///
    /// Arguments
    /// -----------------
    /// * `bench`: the cobras.
    /// * `targets`: one entry per cobra; `None` leaves the cobra parked.
    /// * `params`: simulation parameters.
    ///
    /// Return
    /// ----------
    /// * The simulator, or [`FiberAssignError::InvalidParameter`] if the number of targets
    ///   differs from the number of cobras or a target lies outside its cobra's patrol area.
    pub fn new(
        bench: &'a Bench,
        targets: Vec<Option<FpPosition>>,
        params: CollisionParams,
    ) -> Result<Self, FiberAssignError> {
        if targets.len() != bench.len() {
            return Err(FiberAssignError::InvalidParameter(format!(
                "expected {} cobra targets, found {}",
                bench.len(),
                targets.len()
            )));
        }

        let moves = bench
            .cobras()
            .iter()
            .zip(&targets)
            .enumerate()
            .map(|(i, (cobra, target))| {
                let (theta0, phi0) = cobra.home();
                let (theta1, phi1) = match target {
                    None => (theta0, phi0),
                    Some(pos) => cobra.angles(*pos).ok_or_else(|| {
                        FiberAssignError::InvalidParameter(format!(
                            "cobra {i} cannot reach ({:.3}, {:.3})",
                            pos.re, pos.im
                        ))
                    })?,
                };
                Ok(Move {
                    theta0,
                    dtheta: (theta1 - theta0).rem_euclid(DPI),
                    phi0,
                    dphi: phi1 - phi0,
                })
            })
            .collect::<Result<Vec<_>, FiberAssignError>>()?;

        Ok(CollisionSimulator {
            bench,
            targets,
            params,
            moves,
        })
    }

    pub fn targets(&self) -> &[Option<FpPosition>] {
        &self.targets
    }

    /// Arm positions of every cobra at step `step`.
    fn arms_at(&self, step: usize) -> Vec<ArmPosition> {
        let frac = step as f64 / self.params.n_steps as f64;
        self.bench
            .cobras()
            .iter()
            .zip(&self.moves)
            .map(|(cobra, mv)| {
                let (theta, phi) = mv.at(frac);
                cobra.forward(theta, phi)
            })
            .collect()
    }

    /// Run the simulation.
    pub fn run(&self) -> CollisionReport {
        let n = self.bench.len();
        let cd = self.params.collision_distance;
        let candidates = self.bench.collision_pairs(cd);

        let mut collisions = vec![false; n];
        let mut endpoint_collisions = vec![false; n];
        let mut pairs = Vec::new();
        let mut trajectories = self
            .params
            .keep_trajectories
            .then(|| vec![Vec::with_capacity(self.params.n_steps + 1); n]);

        let mut colliding = vec![false; candidates.len()];
        for step in 0..=self.params.n_steps {
            let arms = self.arms_at(step);
            let last = step == self.params.n_steps;

            for (k, &(i, j)) in candidates.iter().enumerate() {
                let (ei, fi) = arms[i];
                let (ej, fj) = arms[j];
                if segment_distance(ei, fi, ej, fj) >= cd {
                    continue;
                }
                colliding[k] = true;
                if last {
                    endpoint_collisions[i] = true;
                    endpoint_collisions[j] = true;
                }
            }

            if let Some(traj) = trajectories.as_mut() {
                for (t, arm) in traj.iter_mut().zip(arms) {
                    t.push(arm);
                }
            }
        }

        for (&(i, j), hit) in candidates.iter().zip(colliding) {
            if hit {
                collisions[i] = true;
                collisions[j] = true;
                pairs.push((i, j));
            }
        }
        debug!(
            "collision simulation: {} pairs tested, {} collisions",
            candidates.len(),
            pairs.len()
        );

        CollisionReport {
            collisions,
            endpoint_collisions,
            pairs,
            trajectories,
        }
    }
}

/// Per-cobra targets of one visit.
///
/// Return
/// ----------
/// * One entry per cobra of `bench`, or an error if the assignment names an unknown cobra
///   ([`FiberAssignError::CobraOutOfRange`]) or target ([`FiberAssignError::InvalidParameter`]).
pub fn targets_from_assignment(
    bench: &Bench,
    assignment: &VisitAssignment,
    positions: &[FpPosition],
) -> Result<Vec<Option<FpPosition>>, FiberAssignError> {
    let mut targets = vec![None; bench.len()];
    for (&t, &c) in assignment {
        bench.cobra(c)?;
        let pos = positions.get(t).ok_or_else(|| {
            FiberAssignError::InvalidParameter(format!("target {t} has no focal-plane position"))
        })?;
        targets[c] = Some(*pos);
    }
    Ok(targets)
}

/// Simulate the moves of every visit.
///
/// Return
/// ----------
/// * One report per visit, or [`FiberAssignError::VisitCountMismatch`] if `visits` and
///   `positions` differ in length.
pub fn simulate_visits(
    bench: &Bench,
    visits: &[VisitAssignment],
    positions: &[VisitPositions],
    params: &CollisionParams,
) -> Result<Vec<CollisionReport>, FiberAssignError> {
    if visits.len() != positions.len() {
        return Err(FiberAssignError::VisitCountMismatch {
            expected: positions.len(),
            found: visits.len(),
        });
    }

    #[cfg(feature = "progress")]
    let mut progress = VisitProgress::new(visits.len(), 0.2);

    let mut reports = Vec::with_capacity(visits.len());
    for (assignment, pos) in visits.iter().zip(positions) {
        let targets = targets_from_assignment(bench, assignment, pos)?;
        let report = CollisionSimulator::new(bench, targets, params.clone())?.run();
        #[cfg(feature = "progress")]
        progress.visit_done();
        reports.push(report);
    }

    #[cfg(feature = "progress")]
    progress.finish();
    Ok(reports)
}

#[cfg(test)]
mod collision_test {
    use super::*;
    use nalgebra::Complex;

    fn pair_bench(distance: f64) -> Bench {
        let centers = [Complex::new(0.0, 0.0), Complex::new(distance, 0.0)];
        Bench::from_centers(&centers, 2.375, 2.375).unwrap()
    }

    #[test]
    fn test_params_builder() {
        assert!(CollisionParams::builder().n_steps(0).build().is_err());
        assert!(CollisionParams::builder().collision_distance(-1.0).build().is_err());
        let p = CollisionParams::builder().n_steps(10).build().unwrap();
        assert_eq!(p.n_steps, 10);
        assert!(format!("{p:#}").contains("n_steps"));
    }

    #[test]
    fn test_parked_cobras_do_not_collide() {
        let bench = Bench::full();
        let sim = CollisionSimulator::new(&bench, vec![None; bench.len()], CollisionParams::default()).unwrap();
        let report = sim.run();
        assert_eq!(report.n_collisions(), 0);
        assert!(report.problematic_cobras().is_empty());
    }

    #[test]
    fn test_endpoint_collision() {
        let bench = pair_bench(8.0);
        // both fibers meet in the middle
        let targets = vec![Some(Complex::new(3.9, -1.0)), Some(Complex::new(4.1, -1.0))];
        let report = CollisionSimulator::new(&bench, targets, CollisionParams::default())
            .unwrap()
            .run();
        assert_eq!(report.pairs, vec![(0, 1)]);
        assert_eq!(report.problematic_cobras(), vec![0, 1]);
        assert_eq!(report.n_endpoint_collisions(), 2);
    }

    #[test]
    fn test_separated_targets() {
        let bench = pair_bench(8.0);
        let targets = vec![Some(Complex::new(-3.0, -1.0)), Some(Complex::new(11.0, -1.0))];
        let params = CollisionParams::builder().keep_trajectories(true).build().unwrap();
        let report = CollisionSimulator::new(&bench, targets, params).unwrap().run();
        assert_eq!(report.n_collisions(), 0);

        let traj = report.trajectories.unwrap();
        assert_eq!(traj[0].len(), 51);
        let end = traj[0][50].1;
        assert!((end - Complex::new(-3.0, -1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_invalid_targets() {
        let bench = pair_bench(8.0);
        assert!(CollisionSimulator::new(&bench, vec![None], CollisionParams::default()).is_err());
        let far = vec![Some(Complex::new(20.0, 0.0)), None];
        assert!(CollisionSimulator::new(&bench, far, CollisionParams::default()).is_err());
    }

    #[test]
    fn test_targets_from_assignment() {
        let bench = pair_bench(8.0);
        let pos = vec![Complex::new(1.0, -1.0), Complex::new(9.0, -1.0)];
        let targets = targets_from_assignment(&bench, &VisitAssignment::from([(1, 1)]), &pos).unwrap();
        assert_eq!(targets, vec![None, Some(pos[1])]);

        assert_eq!(
            targets_from_assignment(&bench, &VisitAssignment::from([(0, 5)]), &pos),
            Err(FiberAssignError::CobraOutOfRange { index: 5, len: 2 })
        );
        assert!(targets_from_assignment(&bench, &VisitAssignment::from([(4, 0)]), &pos).is_err());
    }

    #[test]
    fn test_simulate_visits() {
        let bench = pair_bench(8.0);
        let pos = vec![vec![Complex::new(1.0, -1.0)], vec![Complex::new(3.9, -1.0)]];
        let visits = vec![VisitAssignment::from([(0, 0)]), VisitAssignment::new()];
        let reports = simulate_visits(&bench, &visits, &pos, &CollisionParams::default()).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.n_collisions() == 0));

        assert_eq!(
            simulate_visits(&bench, &visits[..1], &pos, &CollisionParams::default()),
            Err(FiberAssignError::VisitCountMismatch { expected: 2, found: 1 })
        );
    }
}
