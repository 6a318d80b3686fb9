//! Two-link kinematics of a single fiber positioner ("cobra").
//!
//! A cobra has a first arm of length `link1` rotating by `θ` around its center, and a second arm
//! of length `link2` rotating by `φ` around the elbow, relative to the first arm:
//!
//! ```text
//! elbow = center + link1 · e^{iθ}
//! fiber = elbow  + link2 · e^{i(θ + φ)}
//! ```
//!
//! The fiber can reach every point of the annulus `|link1 − link2| ≤ d ≤ link1 + link2`. For a
//! given target the inverse kinematics picks the branch with `φ ∈ [0, π]`.
use nalgebra::Complex;

use crate::constants::{FpPosition, Millimeter, Radian, DOT_RADIUS, DPI};

const EPS: f64 = 1e-9;

/// A fiber positioner with its fiducial dot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cobra {
    pub center: FpPosition,
    /// Center of the blocking dot of this cobra
    pub dot: FpPosition,
    pub link1: Millimeter,
    pub link2: Millimeter,
    /// Orientation of the first arm when the cobra is parked
    pub theta_home: Radian,
}

impl Cobra {
    /// A cobra whose parked arm points away from its dot.
    pub fn new(center: FpPosition, dot: FpPosition, link1: Millimeter, link2: Millimeter) -> Self {
        let away = center - dot;
        let theta_home = if away.norm_sqr() > 0.0 {
            away.arg().rem_euclid(DPI)
        } else {
            0.0
        };
        Cobra {
            center,
            dot,
            link1,
            link2,
            theta_home,
        }
    }

    /// Largest distance between the center and the fiber.
    #[inline]
    pub fn reach(&self) -> Millimeter {
        self.link1 + self.link2
    }

    /// Smallest distance between the center and the fiber.
    #[inline]
    pub fn min_reach(&self) -> Millimeter {
        (self.link1 - self.link2).abs()
    }

    /// `true` if the fiber can be placed on `pos`: the point lies in the patrol annulus and
    /// outside the blocking area of the cobra's own dot.
    pub fn can_reach(&self, pos: FpPosition) -> bool {
        let d = (pos - self.center).norm();
        d >= self.min_reach() - EPS
            && d <= self.reach() + EPS
            && (pos - self.dot).norm_sqr() >= DOT_RADIUS * DOT_RADIUS
    }

    /// Inverse kinematics: the `(θ, φ)` that put the fiber on `pos`.
    ///
    /// Return
    /// ----------
    /// * `Some((θ, φ))` with `θ ∈ [0, 2π)` and `φ ∈ [0, π]`, or `None` if `pos` lies outside the
    ///   patrol annulus. The dot is ignored here.
    pub fn angles(&self, pos: FpPosition) -> Option<(Radian, Radian)> {
        let rel = pos - self.center;
        let d = rel.norm();
        if d < self.min_reach() - EPS || d > self.reach() + EPS {
            return None;
        }
        let (l1, l2) = (self.link1, self.link2);
        if d < EPS {
            // fully folded: the direction of the first arm is free
            return Some((self.theta_home, std::f64::consts::PI));
        }

        let alpha = ((l1 * l1 + d * d - l2 * l2) / (2.0 * l1 * d))
            .clamp(-1.0, 1.0)
            .acos();
        let beta = ((l1 * l1 + l2 * l2 - d * d) / (2.0 * l1 * l2))
            .clamp(-1.0, 1.0)
            .acos();

        let theta = (rel.arg() - alpha).rem_euclid(DPI);
        Some((theta, std::f64::consts::PI - beta))
    }

    /// Elbow and fiber positions for the given arm angles.
    pub fn forward(&self, theta: Radian, phi: Radian) -> (FpPosition, FpPosition) {
        let elbow = self.center + Complex::from_polar(self.link1, theta);
        let fiber = elbow + Complex::from_polar(self.link2, theta + phi);
        (elbow, fiber)
    }

    /// Position of the elbow when the fiber sits on `pos`.
    pub fn elbow_position(&self, pos: FpPosition) -> Option<FpPosition> {
        self.angles(pos).map(|(theta, _)| self.center + Complex::from_polar(self.link1, theta))
    }

    /// Parked arm angles: first arm at `theta_home`, second arm folded back.
    pub fn home(&self) -> (Radian, Radian) {
        (self.theta_home, std::f64::consts::PI)
    }
}
