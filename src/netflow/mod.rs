//! # Network-flow fiber assignment
//!
//! Assigns cobras to targets over a sequence of visits by solving a **min-cost flow** problem,
//! then repairs the flow solution until it satisfies the collision constraints that a flow
//! network cannot express.
//!
//! ## Model
//!
//! A science target `t` needs `n(t) = max(1, ⌈exposure_time / visit_time⌉)` visits to be
//! complete. Calibration classes need `num_required` of their targets in **every** visit.
//!
//! ```text
//!                 ┌──────────── overflow: non_obs / n(t) per unit ─────────────┐
//!                 │                                                             ▼
//!  SOURCE ──n(t)──▶ T(t) ──1, visit_cost[v]──▶ TV(t,v) ──1, move_cost──▶ CV(c,v) ──1──▶ SINK
//!     │                                           ▲
//!     └──num_required──▶ K(class,v) ──1, visit_cost[v]──┘
//!                            │
//!                            └──────── overflow: non_obs per missing target ──────────▶ SINK
//! ```
//!
//! * `TV(t,v) → CV(c,v)` exists only if cobra `c` can reach target `t` in the geometry of
//!   visit `v`.
//! * `CV(c,v) → SINK` has capacity one: a cobra observes at most one target per visit, and a
//!   target enters a visit through a single capacity-one arc, so every visit assignment is
//!   injective in both directions.
//!
//! The cost minimized is
//!
//! ```text
//! Σ_v Σ_(t→c)  visit_cost[v] + move_cost(|pos(t,v) − center(c)|)
//! + Σ_science  { 0 if complete, partial_observation_cost if partial, non_observation_cost if unobserved }
//! + Σ_calib Σ_v non_observation_cost × max(0, num_required − observed)
//! ```
//!
//! ## Side constraints
//!
//! After each flow solve the assignment is checked for
//!
//! * **target collisions** – two targets of the same visit closer than `collision_distance`,
//! * **elbow collisions** – the elbow of a cobra closer than `collision_distance` to another
//!   assigned target (only with `elbow_collisions`),
//! * **arm collisions** – the second arms (elbow → fiber) of two neighbouring cobras closer than
//!   `collision_distance` at the end of the move, unassigned cobras staying parked (only with
//!   `elbow_collisions`; this is the endpoint test of the collision simulator),
//! * **partial observations** – a science target observed in `0 < k < n` visits whose partial
//!   cost exceeds its non-observation cost.
//!
//! The lower-valued side of every violation is banned from the network and the flow is solved
//! again. Values are the per-visit non-observation costs; on ties the larger target index loses.
//! The loop stops when no violation is left, or after `max_iterations` / `time_limit`; leftover
//! violations are then removed greedily so the returned assignment is always collision free.
//!
//! ## Partial observations
//!
//! The overflow arcs price every missing visit of a science target at `non_obs / n(t)`, while the
//! cost above charges `partial_observation_cost` once. A final local search (single inserts and
//! swaps, each kept only if the visit stays collision free) closes the gap where it lowers the
//! cost. It is a heuristic: the result is not guaranteed optimal when partial observations are
//! cheap.
//!
//! See also
//! ------------
//! * [`NetflowProblem`] – the solver itself.
//! * [`observe_with_netflow`] – one-call entry point.
//! * [`CostModel`] – per-class costs.
use std::fmt;
use std::time::Duration;

use crate::bench::Bench;
use crate::catalog::Target;
use crate::constants::{Millimeter, Seconds, VisitAssignment, VisitPositions, COLLISION_DISTANCE};
use crate::cost::{CostModel, MoveCost};
use crate::fiberassign_errors::FiberAssignError;

mod constraints;
mod graph;
mod improve;
pub mod problem;
pub mod solution;

pub use problem::NetflowProblem;
pub use solution::{CostBreakdown, NetflowSolution};

/// Configuration of the network-flow assignment.
///
/// Fields
/// -----------------
/// * `visit_time` – exposure time of a single visit; sets the number of visits a science
///   target needs.
/// * `visit_costs` – cost of one observation in each visit (empty = free). Slightly increasing
///   costs make the solver prefer early visits.
/// * `move_cost` – optional cost of placing a fiber at a distance from its cobra center.
/// * `collision_distance` – minimum distance between a fiber and any other fiber or elbow.
/// * `elbow_collisions` – also check the arm geometry: elbows against fibers and second arms
///   against each other.
/// * `max_iterations`, `time_limit` – bounds of the repair loop.
///
/// Defaults
/// -----------------
/// * `visit_time`: 900 s
/// * `visit_costs`: empty
/// * `move_cost`: none
/// * `collision_distance`: 2 mm
/// * `elbow_collisions`: true
/// * `max_iterations`: 50
/// * `time_limit`: 300 s
#[derive(Debug, Clone)]
pub struct NetflowParams {
    pub visit_time: Seconds,
    pub visit_costs: Vec<f64>,
    pub move_cost: Option<MoveCost>,
    pub collision_distance: Millimeter,
    pub elbow_collisions: bool,
    pub max_iterations: usize,
    pub time_limit: Duration,
}

impl NetflowParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a [`NetflowParamsBuilder`] starting from the defaults.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fiberassign::netflow::NetflowParams;
    ///
    /// let params = NetflowParams::builder()
    ///     .visit_time(900.0)
    ///     .visit_costs((0..18).map(|i| 0.1 + 0.1 * i as f64).collect())
    ///     .elbow_collisions(true)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(params.visit_costs.len(), 18);
    /// ```
    pub fn builder() -> NetflowParamsBuilder {
        NetflowParamsBuilder::new()
    }

    /// Visits needed to complete a science target of the given exposure time.
    pub fn required_visits(&self, exposure_time: Seconds) -> usize {
        // tolerate rounding noise in exposure_time / visit_time
        ((exposure_time / self.visit_time) - 1e-9).ceil().max(1.0) as usize
    }
}

impl Default for NetflowParams {
    fn default() -> Self {
        NetflowParams {
            visit_time: 900.0,
            visit_costs: Vec::new(),
            move_cost: None,
            collision_distance: COLLISION_DISTANCE,
            elbow_collisions: true,
            max_iterations: 50,
            time_limit: Duration::from_secs(300),
        }
    }
}

/// Builder for [`NetflowParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct NetflowParamsBuilder {
    params: NetflowParams,
}

impl NetflowParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: NetflowParams::default(),
        }
    }

    pub fn visit_time(mut self, v: Seconds) -> Self {
        self.params.visit_time = v;
        self
    }
    pub fn visit_costs(mut self, v: Vec<f64>) -> Self {
        self.params.visit_costs = v;
        self
    }
    pub fn move_cost(mut self, v: MoveCost) -> Self {
        self.params.move_cost = Some(v);
        self
    }
    pub fn collision_distance(mut self, v: Millimeter) -> Self {
        self.params.collision_distance = v;
        self
    }
    pub fn elbow_collisions(mut self, v: bool) -> Self {
        self.params.elbow_collisions = v;
        self
    }
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.params.max_iterations = v;
        self
    }
    pub fn time_limit(mut self, v: Duration) -> Self {
        self.params.time_limit = v;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Return
    /// ----------
    /// * [`FiberAssignError::InvalidParameter`] if `visit_time` is not strictly positive, a
    ///   visit cost or the collision distance is negative or not finite, `max_iterations` is
    ///   zero or `time_limit` is zero.
    pub fn build(self) -> Result<NetflowParams, FiberAssignError> {
        let p = &self.params;

        if !(p.visit_time.is_finite() && p.visit_time > 0.0) {
            return Err(FiberAssignError::InvalidParameter(
                "visit_time must be > 0".into(),
            ));
        }
        if !p.visit_costs.iter().all(|c| c.is_finite() && *c >= 0.0) {
            return Err(FiberAssignError::InvalidParameter(
                "visit costs must be finite and >= 0".into(),
            ));
        }
        if !(p.collision_distance.is_finite() && p.collision_distance >= 0.0) {
            return Err(FiberAssignError::InvalidParameter(
                "collision_distance must be >= 0".into(),
            ));
        }
        if p.max_iterations == 0 {
            return Err(FiberAssignError::InvalidParameter(
                "max_iterations must be >= 1".into(),
            ));
        }
        if p.time_limit.is_zero() {
            return Err(FiberAssignError::InvalidParameter(
                "time_limit must be > 0".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for NetflowParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 40;
            writeln!(f, "Netflow Assignment Parameters")?;
            writeln!(f, "-----------------------------")?;

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

            writeln!(f, "[Visits]")?;
            line!("visit_time         = {:.1} s", self.visit_time, "Exposure time of one visit")?;
            line!("n_visit_costs      = {}", self.visit_costs.len(), "Per-visit observation costs")?;
            line!(
                "move_cost          = {}",
                if self.move_cost.is_some() { "custom" } else { "none" },
                "Cost of moving a fiber away from its center"
            )?;

            writeln!(f, "\n[Collisions]")?;
            line!(
                "collision_distance = {:.2} mm",
                self.collision_distance,
                "Minimum fiber/fiber and fiber/elbow distance"
            )?;
            line!("elbow_collisions   = {}", self.elbow_collisions, "Check elbows and arms")?;

            writeln!(f, "\n[Repair loop]")?;
            line!("max_iterations     = {}", self.max_iterations, "Flow solves before giving up")?;
            line!(
                "time_limit         = {:.1} s",
                self.time_limit.as_secs_f64(),
                "Wall-clock budget of the repair loop"
            )?;
            Ok(())
        } else {
            write!(
                f,
                "NetflowParams(visit_time={:.1}s, visits={}, collision_distance={:.2}mm, elbow_collisions={}, max_iterations={})",
                self.visit_time,
                self.visit_costs.len(),
                self.collision_distance,
                self.elbow_collisions,
                self.max_iterations,
            )
        }
    }
}

/// Assign cobras to targets for every visit.
///
/// Arguments
/// -----------------
/// * `bench`: the cobras.
/// * `targets`: all targets; assignments refer to them by index.
/// * `positions`: focal-plane positions of every target, one vector per visit.
/// * `class_config`: costs of each target class.
/// * `visit_time`: exposure time of one visit in seconds.
/// * `visit_costs`: cost of an observation in each visit (empty = free).
/// * `move_cost`: optional cost of a fiber's distance from its cobra center.
/// * `collision_distance`: minimum distance between fibers (and elbows) in mm.
/// * `elbow_collisions`: also avoid elbow/fiber and arm/arm collisions.
///
/// Return
/// ----------
/// * One target → cobra map per visit, or an error for inconsistent inputs (see
///   [`NetflowProblem::new`]).
#[allow(clippy::too_many_arguments)]
pub fn observe_with_netflow(
    bench: &Bench,
    targets: &[Target],
    positions: &[VisitPositions],
    class_config: &CostModel,
    visit_time: Seconds,
    visit_costs: &[f64],
    move_cost: Option<MoveCost>,
    collision_distance: Millimeter,
    elbow_collisions: bool,
) -> Result<Vec<VisitAssignment>, FiberAssignError> {
    let mut builder = NetflowParams::builder()
        .visit_time(visit_time)
        .visit_costs(visit_costs.to_vec())
        .collision_distance(collision_distance)
        .elbow_collisions(elbow_collisions);
    if let Some(mc) = move_cost {
        builder = builder.move_cost(mc);
    }

    let problem = NetflowProblem::new(bench, targets, positions, class_config, builder.build()?)?;
    Ok(problem.solve().visits)
}

#[cfg(test)]
mod netflow_params_test {
    use super::*;

    #[test]
    fn test_builder_validation() {
        assert!(NetflowParams::builder().build().is_ok());
        assert!(NetflowParams::builder().visit_time(0.0).build().is_err());
        assert!(NetflowParams::builder()
            .visit_costs(vec![0.1, -1.0])
            .build()
            .is_err());
        assert!(NetflowParams::builder()
            .collision_distance(f64::NAN)
            .build()
            .is_err());
        assert_eq!(
            NetflowParams::builder().max_iterations(0).build().unwrap_err(),
            FiberAssignError::InvalidParameter("max_iterations must be >= 1".into())
        );
        assert!(NetflowParams::builder()
            .time_limit(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_required_visits() {
        let p = NetflowParams::default();
        assert_eq!(p.required_visits(0.0), 1);
        assert_eq!(p.required_visits(900.0), 1);
        assert_eq!(p.required_visits(900.5), 2);
        assert_eq!(p.required_visits(1800.0), 2);
        assert_eq!(p.required_visits(2701.0), 4);
    }

    #[test]
    fn test_display() {
        let p = NetflowParams::default();
        assert!(p.to_string().starts_with("NetflowParams(visit_time=900.0s"));
        let long = format!("{p:#}");
        assert!(long.contains("[Repair loop]"));
        assert!(long.contains("collision_distance = 2.00 mm"));
    }
}
