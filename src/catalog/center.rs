//! Smallest enclosing circle of a set of sky positions.
//!
//! The targets are projected gnomonically onto the plane tangent to their mean direction,
//! where Welzl's incremental algorithm finds the minimal enclosing circle; its center is then
//! mapped back to the sphere. For fields of a few degrees the tangent-plane distortion is
//! negligible.
use nalgebra::{Complex, Vector3};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::catalog::Target;
use crate::constants::{Degree, FpPosition};
use crate::fiberassign_errors::FiberAssignError;
use crate::geometry::{radec_from_unit, unit_from_radec_deg};

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Circle {
    center: FpPosition,
    radius: f64,
}

impl Circle {
    fn contains(&self, p: FpPosition) -> bool {
        (p - self.center).norm() <= self.radius * (1.0 + 1e-10) + EPS
    }

    fn from_two(a: FpPosition, b: FpPosition) -> Self {
        Circle {
            center: (a + b) * 0.5,
            radius: (a - b).norm() * 0.5,
        }
    }

    fn from_three(a: FpPosition, b: FpPosition, c: FpPosition) -> Self {
        let ab = b - a;
        let ac = c - a;
        let d = 2.0 * (ab.re * ac.im - ab.im * ac.re);
        if d.abs() < EPS {
            // collinear: the circle over the two farthest points
            return [
                Circle::from_two(a, b),
                Circle::from_two(a, c),
                Circle::from_two(b, c),
            ]
            .into_iter()
            .max_by(|x, y| x.radius.total_cmp(&y.radius))
            .unwrap_or_else(|| Circle::from_two(a, b));
        }
        let ux = (ac.im * ab.norm_sqr() - ab.im * ac.norm_sqr()) / d;
        let uy = (ab.re * ac.norm_sqr() - ac.re * ab.norm_sqr()) / d;
        let offset = Complex::new(ux, uy);
        Circle {
            center: a + offset,
            radius: offset.norm(),
        }
    }
}

/// Minimal enclosing circle of planar points (iterative Welzl on a shuffled copy).
fn minimal_circle(points: &[FpPosition]) -> Circle {
    let mut pts = points.to_vec();
    // fixed seed: the result must not depend on the call
    pts.shuffle(&mut StdRng::seed_from_u64(0x5EED));

    let mut circle = Circle {
        center: pts[0],
        radius: 0.0,
    };
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle {
            center: pts[i],
            radius: 0.0,
        };
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    circle
}

pub(super) fn enclosing_center(targets: &[Target]) -> Result<(Degree, Degree), FiberAssignError> {
    let first = targets.first().ok_or(FiberAssignError::EmptyCatalog)?;

    let dirs: Vec<Vector3<f64>> = targets
        .iter()
        .map(|t| unit_from_radec_deg(t.ra, t.dec))
        .collect();

    let sum: Vector3<f64> = dirs.iter().sum();
    let axis = if sum.norm() > EPS {
        sum.normalize()
    } else {
        unit_from_radec_deg(first.ra, first.dec)
    };

    // local tangent frame (e1 east-like, e2 north-like)
    let pole = Vector3::z();
    let e1 = {
        let e = pole.cross(&axis);
        if e.norm() > EPS {
            e.normalize()
        } else {
            Vector3::x()
        }
    };
    let e2 = axis.cross(&e1);

    let planar: Vec<FpPosition> = dirs
        .iter()
        .map(|v| {
            let w = v.dot(&axis).max(EPS);
            Complex::new(v.dot(&e1) / w, v.dot(&e2) / w)
        })
        .collect();

    let circle = minimal_circle(&planar);
    let center = axis + e1 * circle.center.re + e2 * circle.center.im;
    let (ra, dec) = radec_from_unit(&center);

    Ok((ra.to_degrees().rem_euclid(360.0), dec.to_degrees()))
}

#[cfg(test)]
mod center_test {
    use super::*;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> FpPosition {
        Complex::new(x, y)
    }

    #[test]
    fn test_minimal_circle_planar() {
        let pts = [c(0.0, 0.0), c(2.0, 0.0), c(1.0, 0.5), c(1.0, -0.3)];
        let circle = minimal_circle(&pts);
        assert_relative_eq!(circle.center.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(circle.center.im, 0.0, epsilon = 1e-12);
        assert_relative_eq!(circle.radius, 1.0, epsilon = 1e-12);

        // equilateral triangle: circumcircle
        let h = 3.0_f64.sqrt();
        let circle = minimal_circle(&[c(-1.0, 0.0), c(1.0, 0.0), c(0.0, h)]);
        assert_relative_eq!(circle.center.im, h / 3.0, epsilon = 1e-12);
        assert_relative_eq!(circle.radius, 2.0 * h / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_enclosing_center_symmetric_field() {
        let targets: Vec<Target> = [(33.0, -4.5), (35.0, -4.5), (34.0, -3.5), (34.0, -5.5), (34.2, -4.4)]
            .iter()
            .enumerate()
            .map(|(i, (ra, dec))| Target::science(format!("ID{i}"), *ra, *dec, 900.0, 1, "sci"))
            .collect();
        let (ra, dec) = enclosing_center(&targets).unwrap();
        assert_relative_eq!(ra, 34.0, epsilon = 1e-2);
        assert_relative_eq!(dec, -4.5, epsilon = 1e-2);
    }

    #[test]
    fn test_enclosing_center_wraps_ra() {
        let targets = vec![
            Target::science("A", 359.5, 0.0, 900.0, 1, "sci"),
            Target::science("B", 0.5, 0.0, 900.0, 1, "sci"),
        ];
        let (ra, dec) = enclosing_center(&targets).unwrap();
        assert!(ra < 1e-6 || ra > 360.0 - 1e-6, "ra = {ra}");
        assert_relative_eq!(dec, 0.0, epsilon = 1e-9);
    }
}
