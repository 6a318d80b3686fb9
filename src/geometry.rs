//! Small geometric helpers shared by the projection, kinematics and collision code.
//!
//! Focal-plane points are [`Complex`] numbers (`re` = x, `im` = y); sky directions are
//! [`Vector3`] unit vectors in the equatorial frame.
use nalgebra::{Complex, Vector3};

use crate::constants::{Degree, FpPosition, Radian};

/// Unit vector of an equatorial direction given in **radians**.
pub fn unit_from_radec(ra: Radian, dec: Radian) -> Vector3<f64> {
    let (sd, cd) = dec.sin_cos();
    let (sa, ca) = ra.sin_cos();
    Vector3::new(cd * ca, cd * sa, sd)
}

/// Unit vector of an equatorial direction given in **degrees**.
pub fn unit_from_radec_deg(ra: Degree, dec: Degree) -> Vector3<f64> {
    unit_from_radec(ra.to_radians(), dec.to_radians())
}

/// Inverse of [`unit_from_radec`]; the vector does not need to be normalized.
///
/// RA is returned in `(-π, π]`.
pub fn radec_from_unit(v: &Vector3<f64>) -> (Radian, Radian) {
    let ra = v.y.atan2(v.x);
    let dec = v.z.atan2(v.x.hypot(v.y));
    (ra, dec)
}

/// Rotate a focal-plane point around the origin by `angle` radians (counter-clockwise).
pub fn rotate(pos: FpPosition, angle: Radian) -> FpPosition {
    pos * Complex::from_polar(1.0, angle)
}

/// Euclidean distance between a point and the segment `[a, b]`.
pub fn point_segment_distance(p: FpPosition, a: FpPosition, b: FpPosition) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_sqr();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    // projection parameter of p on the infinite line through a and b
    let t = ((p - a) * ab.conj()).re / len_sq;
    let closest = a + ab * t.clamp(0.0, 1.0);
    (p - closest).norm()
}

fn cross(a: FpPosition, b: FpPosition) -> f64 {
    a.re * b.im - a.im * b.re
}

/// `true` if the closed segments `[a1, b1]` and `[a2, b2]` share at least one point.
pub fn segments_intersect(a1: FpPosition, b1: FpPosition, a2: FpPosition, b2: FpPosition) -> bool {
    let d1 = cross(b2 - a2, a1 - a2);
    let d2 = cross(b2 - a2, b1 - a2);
    let d3 = cross(b1 - a1, a2 - a1);
    let d4 = cross(b1 - a1, b2 - a1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // collinear / touching cases are covered by the endpoint distances being zero
    false
}

/// Minimum Euclidean distance between the segments `[a1, b1]` and `[a2, b2]`.
pub fn segment_distance(a1: FpPosition, b1: FpPosition, a2: FpPosition, b2: FpPosition) -> f64 {
    if segments_intersect(a1, b1, a2, b2) {
        return 0.0;
    }
    point_segment_distance(a1, a2, b2)
        .min(point_segment_distance(b1, a2, b2))
        .min(point_segment_distance(a2, a1, b1))
        .min(point_segment_distance(b2, a1, b1))
}

#[cfg(test)]
mod geometry_test {
    use super::*;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> FpPosition {
        Complex::new(x, y)
    }

    #[test]
    fn test_radec_round_trip() {
        let v = unit_from_radec_deg(150.0, -30.0);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-15);
        let (ra, dec) = radec_from_unit(&v);
        assert_relative_eq!(ra.to_degrees(), 150.0, epsilon = 1e-12);
        assert_relative_eq!(dec.to_degrees(), -30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate() {
        let r = rotate(c(1.0, 0.0), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(r.re, 0.0, epsilon = 1e-15);
        assert_relative_eq!(r.im, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_point_segment_distance() {
        let a = c(0.0, 0.0);
        let b = c(4.0, 0.0);
        assert_relative_eq!(point_segment_distance(c(2.0, 3.0), a, b), 3.0);
        assert_relative_eq!(point_segment_distance(c(-3.0, 4.0), a, b), 5.0);
        assert_relative_eq!(point_segment_distance(c(7.0, 4.0), a, b), 5.0);
        assert_relative_eq!(point_segment_distance(c(1.0, 1.0), a, a), 2.0_f64.sqrt());
    }

    #[test]
    fn test_segment_distance() {
        // crossing segments
        assert_eq!(
            segment_distance(c(0.0, 0.0), c(2.0, 2.0), c(0.0, 2.0), c(2.0, 0.0)),
            0.0
        );
        // parallel segments
        assert_relative_eq!(
            segment_distance(c(0.0, 0.0), c(2.0, 0.0), c(0.0, 1.5), c(2.0, 1.5)),
            1.5
        );
        // T configuration, not touching
        assert_relative_eq!(
            segment_distance(c(0.0, 0.0), c(4.0, 0.0), c(2.0, 0.5), c(2.0, 3.0)),
            0.5
        );
    }
}
