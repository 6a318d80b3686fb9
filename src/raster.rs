//! # Focal-plane raster
//!
//! [`FpRaster`] sorts a set of focal-plane points into a uniform `nx × ny` grid covering their
//! bounding box, so that "all points within `r` of `p`" queries only scan the few cells
//! overlapping the query disc.
//!
//! The raster is used everywhere a neighbour search is needed:
//! - which targets a cobra can reach,
//! - which targets lie in the blocking area around an assigned target,
//! - which cobras are close enough to collide.
//!
//! Points outside the bounding box are clamped to the border cells, so queries centered far
//! outside the covered area are rejected early and return nothing.
use crate::constants::FpPosition;
use crate::fiberassign_errors::FiberAssignError;

#[derive(Debug, Clone)]
pub struct FpRaster {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    inv_dx: f64,
    inv_dy: f64,
    nx: usize,
    ny: usize,
    cells: Vec<Vec<usize>>,
    loc: Vec<FpPosition>,
}

impl FpRaster {
    /// Build a raster with `nx × ny` cells over the bounding box of `loc`.
    ///
    /// Arguments
    /// -----------------
    /// * `loc`: the points to index; query results are indices into this slice.
    /// * `nx`, `ny`: number of cells along x and y (must be non-zero).
    ///
    /// Return
    /// ----------
    /// * The raster, [`FiberAssignError::EmptyRaster`] if `loc` is empty, or
    ///   [`FiberAssignError::InvalidParameter`] for a zero grid size.
    pub fn new(loc: &[FpPosition], nx: usize, ny: usize) -> Result<Self, FiberAssignError> {
        if nx == 0 || ny == 0 {
            return Err(FiberAssignError::InvalidParameter(
                "raster dimensions must be > 0".into(),
            ));
        }
        let first = loc.first().ok_or(FiberAssignError::EmptyRaster)?;

        let (mut x0, mut x1, mut y0, mut y1) = (first.re, first.re, first.im, first.im);
        for p in &loc[1..] {
            x0 = x0.min(p.re);
            x1 = x1.max(p.re);
            y0 = y0.min(p.im);
            y1 = y1.max(p.im);
        }
        if x0 == x1 {
            x1 += 1e-9;
        }
        if y0 == y1 {
            y1 += 1e-9;
        }

        let mut raster = FpRaster {
            x0,
            y0,
            x1,
            y1,
            inv_dx: nx as f64 / (x1 - x0),
            inv_dy: ny as f64 / (y1 - y0),
            nx,
            ny,
            cells: vec![Vec::new(); nx * ny],
            loc: loc.to_vec(),
        };

        for (i, p) in loc.iter().enumerate() {
            let cell = raster.index(*p);
            raster.cells[cell].push(i);
        }
        Ok(raster)
    }

    #[inline]
    fn index_x(&self, x: f64) -> usize {
        (((x - self.x0) * self.inv_dx) as i64).clamp(0, self.nx as i64 - 1) as usize
    }

    #[inline]
    fn index_y(&self, y: f64) -> usize {
        (((y - self.y0) * self.inv_dy) as i64).clamp(0, self.ny as i64 - 1) as usize
    }

    #[inline]
    fn index(&self, p: FpPosition) -> usize {
        self.index_x(p.re) + self.nx * self.index_y(p.im)
    }

    fn outside(&self, center: FpPosition, rad: f64) -> bool {
        center.re < self.x0 - rad
            || center.re > self.x1 + rad
            || center.im < self.y0 - rad
            || center.im > self.y1 + rad
    }

    /// Iterate over the indices of all points within `rad` of `center` (inclusive).
    fn within(&self, center: FpPosition, rad: f64) -> impl Iterator<Item = usize> + '_ {
        let empty = self.outside(center, rad);
        let rsq = rad * rad;
        let (i0, i1) = (self.index_x(center.re - rad), self.index_x(center.re + rad));
        let (j0, j1) = (self.index_y(center.im - rad), self.index_y(center.im + rad));

        (j0..=j1)
            .filter(move |_| !empty)
            .flat_map(move |j| (i0..=i1).map(move |i| i + self.nx * j))
            .flat_map(move |cell| self.cells[cell].iter().copied())
            .filter(move |&k| (center - self.loc[k]).norm_sqr() <= rsq)
    }

    /// Indices of all points lying within a circle of radius `rad` around `center`.
    pub fn query(&self, center: FpPosition, rad: f64) -> Vec<usize> {
        self.within(center, rad).collect()
    }

    /// `true` if at least one point lies within `rad` of `center`.
    pub fn any_in(&self, center: FpPosition, rad: f64) -> bool {
        self.within(center, rad).next().is_some()
    }

    /// Position of the point with index `i`.
    pub fn location(&self, i: usize) -> FpPosition {
        self.loc[i]
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.loc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loc.is_empty()
    }
}
