//! # Fiber positioner bench
//!
//! The [`Bench`] is the set of all cobras of the focal plane together with a spatial index of
//! their centers. It answers the two questions every assignment strategy asks:
//!
//! * which cobras can put their fiber on a given focal-plane position
//!   ([`Bench::cobras_reaching`]),
//! * whether a position is worth considering at all ([`Bench::is_observable`]).
//!
//! ## Layout of the full bench
//!
//! [`Bench::full`] builds the 2394 cobras of the instrument: three sectors of 14 modules with 57
//! cobras each, on a hexagonal grid with a pitch of 8 mm. Sector 0 is built directly; sectors 1
//! and 2 are the same layout rotated by ∓120°. Every cobra has a fiducial dot 1.19 mm above its
//! center whose blocking area (radius 1.375 mm) its own fiber must avoid.
//!
//! See also
//! ------------
//! * [`Cobra`] – kinematics of a single positioner.
//! * [`FpRaster`] – the spatial index used for the neighbour queries.
use std::borrow::Cow;
use std::f64::consts::PI;

use nalgebra::Complex;
use once_cell::sync::OnceCell;
use smallvec::SmallVec;

use crate::constants::{
    FpPosition, Millimeter, COBRA_PITCH, COLLISION_DISTANCE, DOT_OFFSET, LINK_LENGTH,
    N_COBRAS_PER_MODULE, N_FIBERS, N_MODULES,
};
use crate::fiberassign_errors::FiberAssignError;
use crate::geometry::rotate;
use crate::raster::FpRaster;

pub mod kinematics;

pub use kinematics::Cobra;

/// Cobra indices able to reach one position; rarely more than three.
pub type CobraList = SmallVec<[usize; 4]>;

/// Center of cobra `id` of the full bench (zero-based, `id < 2394`).
pub fn fiber_position(id: usize) -> FpPosition {
    let per_field = N_MODULES * N_COBRAS_PER_MODULE;
    let field = id / per_field;
    let rest = id - field * per_field;
    let module = rest / N_COBRAS_PER_MODULE;
    let cobra = rest - module * N_COBRAS_PER_MODULE;

    // cos(30°)
    let vspace = 0.75_f64.sqrt();
    let pos = Complex::new(
        -vspace * (1.0 + 2.0 * module as f64 + (cobra & 1) as f64),
        0.5 + module as f64 - 0.5 * cobra as f64,
    );
    let pos = match field {
        1 => rotate(pos, -2.0 * PI / 3.0),
        2 => rotate(pos, 2.0 * PI / 3.0),
        _ => pos,
    };
    pos * COBRA_PITCH
}

/// Center of the fiducial dot of cobra `id` of the full bench.
pub fn dot_position(id: usize) -> FpPosition {
    fiber_position(id) + Complex::new(0.0, DOT_OFFSET)
}

/// All cobras of the focal plane and a spatial index of their centers.
#[derive(Debug, Clone)]
pub struct Bench {
    cobras: Vec<Cobra>,
    raster: FpRaster,
    max_reach: Millimeter,
    neighbors: OnceCell<Vec<(usize, usize)>>,
}

impl Bench {
    /// The full 2394-cobra bench of the instrument.
    pub fn full() -> Bench {
        let cobras: Vec<Cobra> = (0..N_FIBERS)
            .map(|id| Cobra::new(fiber_position(id), dot_position(id), LINK_LENGTH, LINK_LENGTH))
            .collect();
        // never empty
        Self::from_cobras(cobras).unwrap_or_else(|_| unreachable!("the full bench has cobras"))
    }

    /// A bench with cobras at arbitrary centers; each dot is placed above its center.
    ///
    /// Arguments
    /// -----------------
    /// * `centers`: cobra centers in mm.
    /// * `link1`, `link2`: arm lengths in mm, strictly positive.
    ///
    /// Return
    /// ----------
    /// * The bench, or an error for an empty center list or invalid arm lengths.
    pub fn from_centers(
        centers: &[FpPosition],
        link1: Millimeter,
        link2: Millimeter,
    ) -> Result<Bench, FiberAssignError> {
        if !(link1 > 0.0 && link2 > 0.0 && link1.is_finite() && link2.is_finite()) {
            return Err(FiberAssignError::InvalidParameter(
                "cobra link lengths must be finite and > 0".into(),
            ));
        }
        let cobras = centers
            .iter()
            .map(|&c| Cobra::new(c, c + Complex::new(0.0, DOT_OFFSET), link1, link2))
            .collect();
        Self::from_cobras(cobras)
    }

    /// A bench made of fully described cobras.
    pub fn from_cobras(cobras: Vec<Cobra>) -> Result<Bench, FiberAssignError> {
        let centers: Vec<FpPosition> = cobras.iter().map(|c| c.center).collect();
        let side = ((centers.len() as f64).sqrt() as usize).clamp(1, 100);
        let raster = FpRaster::new(&centers, side, side)?;
        let max_reach = cobras.iter().map(Cobra::reach).fold(0.0, f64::max);

        Ok(Bench {
            cobras,
            raster,
            max_reach,
            neighbors: OnceCell::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.cobras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cobras.is_empty()
    }

    pub fn cobras(&self) -> &[Cobra] {
        &self.cobras
    }

    pub fn cobra(&self, idx: usize) -> Result<&Cobra, FiberAssignError> {
        self.cobras.get(idx).ok_or(FiberAssignError::CobraOutOfRange {
            index: idx,
            len: self.cobras.len(),
        })
    }

    /// Largest patrol radius of any cobra.
    pub fn max_reach(&self) -> Millimeter {
        self.max_reach
    }

    pub fn raster(&self) -> &FpRaster {
        &self.raster
    }

    /// Indices (ascending) of the cobras that can put their fiber on `pos`.
    pub fn cobras_reaching(&self, pos: FpPosition) -> CobraList {
        let mut res: CobraList = self
            .raster
            .query(pos, self.max_reach)
            .into_iter()
            .filter(|&c| self.cobras[c].can_reach(pos))
            .collect();
        res.sort_unstable();
        res
    }

    /// `true` if some cobra center lies within its patrol radius plus `safety` of `pos`.
    ///
    /// Used as a cheap prefilter: positions rejected here can never be observed, even after
    /// small pointing offsets.
    pub fn is_observable(&self, pos: FpPosition, safety: Millimeter) -> bool {
        self.raster.any_in(pos, self.max_reach + safety)
    }

    /// Pairs `(i, j)`, `i < j`, of cobras whose centers are at most `distance` apart.
    pub fn pairs_within(&self, distance: Millimeter) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, cobra) in self.cobras.iter().enumerate() {
            for j in self.raster.query(cobra.center, distance) {
                if j > i {
                    pairs.push((i, j));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// Pairs of cobras whose arms can come closer than the default collision distance.
    ///
    /// Computed on first use and cached.
    pub fn neighbors(&self) -> &[(usize, usize)] {
        self.neighbors
            .get_or_init(|| self.pairs_within(2.0 * self.max_reach + COLLISION_DISTANCE))
    }

    /// Pairs of cobras whose arms can come closer than `collision_distance`.
    ///
    /// Borrows the cached [`neighbors`](Self::neighbors) unless `collision_distance` exceeds the
    /// default.
    pub fn collision_pairs(&self, collision_distance: Millimeter) -> Cow<'_, [(usize, usize)]> {
        if collision_distance <= COLLISION_DISTANCE {
            Cow::Borrowed(self.neighbors())
        } else {
            Cow::Owned(self.pairs_within(2.0 * self.max_reach + collision_distance))
        }
    }
}
