//! Exposure planning on top of a single-visit [`FiberAssigner`].
//!
//! * [`select_observable`] – prefilter of targets near at least one cobra.
//! * [`single_exposure`] – project, prefilter and assign for one telescope pointing.
//! * [`optimal_exposure`] – try a grid of small pointing offsets and position angles
//!   ([`DitherGrid`]) and keep the pointing with the most assigned fibers.
//! * [`plan_tiles`] – observe a field with successive optimal exposures until a requested
//!   fraction of the total exposure time has been collected.
//!
//! ## Tiling
//!
//! Every tile lasts as long as the shortest remaining exposure time among the targets it
//! observes. Observed targets have that duration subtracted; those with nothing left are
//! removed. Tiling stops when no fiber can be assigned anymore or when
//!
//! ```text
//! Σ_tiles n_assigned · duration  >  fraction · Σ_targets exposure_time
//! ```
use std::fmt;

use itertools::iproduct;
use log::info;

use crate::bench::Bench;
use crate::catalog::Target;
use crate::constants::{Degree, FpPosition, Millimeter, Seconds, VisitAssignment, FOCAL_PLANE_RADIUS, KERNEL_RADIUS};
use crate::fiberassign_errors::FiberAssignError;
use crate::strategy::{FiberAssigner, FpTarget};
use crate::telescope::Telescope;

/// Indices of the positions lying within patrol radius + `safety` of some cobra center.
pub fn select_observable(bench: &Bench, positions: &[FpPosition], safety: Millimeter) -> Vec<usize> {
    positions
        .iter()
        .enumerate()
        .filter(|(_, p)| bench.is_observable(**p, safety))
        .map(|(i, _)| i)
        .collect()
}

/// Assign `targets` for one pointing.
///
/// The targets are projected with `telescope`, those far from every cobra are dropped, and the
/// rest is handed to `assigner`.
///
/// Return
/// ----------
/// * target index (into `targets`) → cobra index.
pub fn single_exposure(
    bench: &Bench,
    targets: &[Target],
    telescope: &Telescope,
    assigner: &dyn FiberAssigner,
) -> VisitAssignment {
    let positions = telescope.get_fp_positions(targets);
    let idx = select_observable(bench, &positions, KERNEL_RADIUS);
    if idx.is_empty() {
        return VisitAssignment::new();
    }

    let subset: Vec<FpTarget> = idx
        .iter()
        .map(|&i| FpTarget {
            pos: positions[i],
            priority: targets[i].priority,
            time: targets[i].exposure_time,
        })
        .collect();

    assigner
        .assign(bench, &subset)
        .into_iter()
        .map(|(t, c)| (idx[t], c))
        .collect()
}

/// Grid of pointing offsets and position angles explored by [`optimal_exposure`].
///
/// Offsets are sampled at the centers of `nptg` bins spanning `[-dptg, dptg]` along both
/// local axes, position angles at the centers of `nposang` bins spanning
/// `[-dposang, dposang]`.
///
/// Defaults
/// -----------------
/// * `dptg`: 4/320 degree (about 4 mm in the focal plane)
/// * `nptg`: 5
/// * `dposang`: 4 degrees
/// * `nposang`: 5
#[derive(Debug, Clone, PartialEq)]
pub struct DitherGrid {
    pub dptg: Degree,
    pub nptg: usize,
    pub dposang: Degree,
    pub nposang: usize,
}

impl Default for DitherGrid {
    fn default() -> Self {
        DitherGrid {
            dptg: 4.0 / 320.0,
            nptg: 5,
            dposang: 4.0,
            nposang: 5,
        }
    }
}

impl DitherGrid {
    pub fn builder() -> DitherGridBuilder {
        DitherGridBuilder::default()
    }

    /// The single nominal pointing.
    pub fn none() -> Self {
        DitherGrid {
            dptg: 0.0,
            nptg: 1,
            dposang: 0.0,
            nposang: 1,
        }
    }

    /// All `(dx, dy, dposang)` offsets of the grid, in degrees.
    pub fn offsets(&self) -> impl Iterator<Item = (Degree, Degree, Degree)> + '_ {
        let bin = |i: usize, half: f64, n: usize| -half + 2.0 * half * (i as f64 + 0.5) / n as f64;
        iproduct!(0..self.nptg, 0..self.nptg, 0..self.nposang).map(move |(ix, iy, ia)| {
            (
                bin(ix, self.dptg, self.nptg),
                bin(iy, self.dptg, self.nptg),
                bin(ia, self.dposang, self.nposang),
            )
        })
    }
}

/// Builder for [`DitherGrid`], with validation.
#[derive(Debug, Clone, Default)]
pub struct DitherGridBuilder {
    grid: DitherGrid,
}

impl DitherGridBuilder {
    pub fn dptg(mut self, v: Degree) -> Self {
        self.grid.dptg = v;
        self
    }
    pub fn nptg(mut self, v: usize) -> Self {
        self.grid.nptg = v;
        self
    }
    pub fn dposang(mut self, v: Degree) -> Self {
        self.grid.dposang = v;
        self
    }
    pub fn nposang(mut self, v: usize) -> Self {
        self.grid.nposang = v;
        self
    }

    pub fn build(self) -> Result<DitherGrid, FiberAssignError> {
        let g = &self.grid;
        if g.nptg == 0 || g.nposang == 0 {
            return Err(FiberAssignError::InvalidParameter(
                "nptg and nposang must be >= 1".into(),
            ));
        }
        if !(g.dptg.is_finite() && g.dptg >= 0.0 && g.dposang.is_finite() && g.dposang >= 0.0) {
            return Err(FiberAssignError::InvalidParameter(
                "dptg and dposang must be finite and >= 0".into(),
            ));
        }
        Ok(self.grid)
    }
}

/// A pointing with its assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    pub telescope: Telescope,
    pub assignment: VisitAssignment,
}

/// Best pointing around `telescope`: the offset of `grid` assigning the most fibers.
///
/// Ties keep the first pointing of the grid; if nothing can be assigned anywhere the nominal
/// pointing is returned with an empty assignment.
pub fn optimal_exposure(
    bench: &Bench,
    targets: &[Target],
    telescope: &Telescope,
    grid: &DitherGrid,
    assigner: &dyn FiberAssigner,
) -> Exposure {
    let mut best = Exposure {
        telescope: telescope.clone(),
        assignment: VisitAssignment::new(),
    };
    for (dx, dy, da) in grid.offsets() {
        let candidate = telescope.dithered(dx, dy, da);
        let assignment = single_exposure(bench, targets, &candidate, assigner);
        if assignment.len() > best.assignment.len() {
            best = Exposure {
                telescope: candidate,
                assignment,
            };
        }
    }
    best
}

/// One tile of a [`TilingPlan`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub telescope: Telescope,
    /// Target index (into the planned catalog) → cobra index
    pub assignment: VisitAssignment,
    pub duration: Seconds,
    /// Share of the bench's cobras in use
    pub fiber_fraction: f64,
    /// Share of the total requested time collected so far
    pub completed_fraction: f64,
}

/// Result of [`plan_tiles`].
#[derive(Debug, Clone, PartialEq)]
pub struct TilingPlan {
    pub tiles: Vec<Tile>,
    /// Σ exposure time of the targets inside the focal plane
    pub total_time: Seconds,
    /// Σ n_assigned · duration over the tiles
    pub observed_time: Seconds,
}

impl TilingPlan {
    /// Σ tile durations.
    pub fn elapsed(&self) -> Seconds {
        self.tiles.iter().map(|t| t.duration).sum()
    }
}

impl fmt::Display for TilingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tile # | fiber allocation fraction | total observation fraction | time")?;
        let mut elapsed = 0.0;
        for (i, tile) in self.tiles.iter().enumerate() {
            elapsed += tile.duration;
            writeln!(
                f,
                "{:6}{:18.5}{:28.5}{:20.0}",
                i, tile.fiber_fraction, tile.completed_fraction, elapsed
            )?;
        }
        Ok(())
    }
}

/// Observe `targets` with successive optimal exposures around `telescope`.
///
/// Arguments
/// -----------------
/// * `bench`, `assigner`: the cobras and the single-visit strategy.
/// * `targets`: the field; only targets inside the focal plane at the nominal pointing and with
///   a positive exposure time are planned.
/// * `telescope`: nominal pointing; every tile is optimized around it.
/// * `grid`: pointing offsets explored for every tile.
/// * `fraction`: stop once more than this share of the total exposure time is collected.
///
/// Return
/// ----------
/// * The [`TilingPlan`] (tile assignments use indices into `targets`), or
///   [`FiberAssignError::InvalidParameter`] if `fraction` is not in `(0, 1]`.
pub fn plan_tiles(
    bench: &Bench,
    targets: &[Target],
    telescope: &Telescope,
    grid: &DitherGrid,
    assigner: &dyn FiberAssigner,
    fraction: f64,
) -> Result<TilingPlan, FiberAssignError> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(FiberAssignError::InvalidParameter(
            "fraction must be in (0, 1]".into(),
        ));
    }

    let positions = telescope.get_fp_positions(targets);
    // remaining targets: (index into `targets`, target with its remaining time)
    let mut remaining: Vec<(usize, Target)> = targets
        .iter()
        .zip(&positions)
        .enumerate()
        .filter(|(_, (t, p))| p.norm() < FOCAL_PLANE_RADIUS && t.exposure_time > 0.0)
        .map(|(i, (t, _))| (i, t.clone()))
        .collect();

    let total_time: Seconds = remaining.iter().map(|(_, t)| t.exposure_time).sum();
    let mut plan = TilingPlan {
        tiles: Vec::new(),
        total_time,
        observed_time: 0.0,
    };
    if total_time <= 0.0 {
        return Ok(plan);
    }
    info!(
        "tiling {} targets with {} strategy, total observation time {:.0} s",
        remaining.len(),
        assigner.name(),
        total_time
    );

    loop {
        let work: Vec<Target> = remaining.iter().map(|(_, t)| t.clone()).collect();
        let exposure = optimal_exposure(bench, &work, telescope, grid, assigner);
        if exposure.assignment.is_empty() {
            break;
        }

        let duration = exposure
            .assignment
            .keys()
            .map(|&t| work[t].exposure_time)
            .fold(f64::INFINITY, f64::min);
        plan.observed_time += exposure.assignment.len() as f64 * duration;
        let completed = plan.observed_time / total_time;

        let tile = Tile {
            telescope: exposure.telescope,
            assignment: exposure
                .assignment
                .iter()
                .map(|(&t, &c)| (remaining[t].0, c))
                .collect(),
            duration,
            fiber_fraction: exposure.assignment.len() as f64 / bench.len() as f64,
            completed_fraction: completed,
        };
        info!(
            "tile {}: {} fibers ({:.5}), completed {:.5}, duration {:.0} s, RA {:.8} Dec {:.8} PA {:.8}",
            plan.tiles.len(),
            tile.assignment.len(),
            tile.fiber_fraction,
            completed,
            duration,
            tile.telescope.ra,
            tile.telescope.dec,
            tile.telescope.posang
        );
        plan.tiles.push(tile);

        if completed > fraction {
            break;
        }

        // strip the observed time
        let mut next = Vec::with_capacity(remaining.len());
        for (i, (orig, mut target)) in remaining.into_iter().enumerate() {
            if exposure.assignment.contains_key(&i) {
                if target.exposure_time > duration + 1e-7 {
                    target.exposure_time -= duration;
                    next.push((orig, target));
                }
            } else {
                next.push((orig, target));
            }
        }
        remaining = next;
    }

    Ok(plan)
}
