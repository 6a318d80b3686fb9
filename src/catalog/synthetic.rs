//! Synthetic target fields.
//!
//! Used to exercise the assignment engines without a catalog file: targets are drawn uniformly
//! inside a spherical cap around a field center.
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::catalog::{Catalog, Target};
use crate::constants::{Degree, Seconds, DPI};
use crate::fiberassign_errors::FiberAssignError;
use crate::geometry::{radec_from_unit, unit_from_radec_deg};

/// Description of a random target field.
///
/// `exposure_times` lists the exposure times drawn from (uniformly); priorities are drawn
/// uniformly in `1..=max_priority`.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub ra: Degree,
    pub dec: Degree,
    pub radius: Degree,
    pub n_targets: usize,
    pub max_priority: u32,
    pub exposure_times: Vec<Seconds>,
    pub tag: String,
    /// Prefix of the generated identifiers (`"{prefix}{index}"`)
    pub id_prefix: String,
}

impl Default for FieldSpec {
    fn default() -> Self {
        FieldSpec {
            ra: 34.0,
            dec: -4.5,
            radius: 0.7,
            n_targets: 1000,
            max_priority: 7,
            exposure_times: vec![900.0],
            tag: "sci".into(),
            id_prefix: "ID".into(),
        }
    }
}

impl Catalog {
    /// Draw a random field of science targets.
    ///
    /// Return
    /// ----------
    /// * A catalog of `field.n_targets` targets, or [`FiberAssignError::InvalidParameter`] for a
    ///   non-positive radius, an empty exposure time list or `max_priority == 0`.
    pub fn random_field(rng: &mut impl Rng, field: &FieldSpec) -> Result<Catalog, FiberAssignError> {
        Self::draw(rng, field, false)
    }

    /// Draw a random field of calibration targets (class label = `field.tag`).
    pub fn random_calibration_field(
        rng: &mut impl Rng,
        field: &FieldSpec,
    ) -> Result<Catalog, FiberAssignError> {
        Self::draw(rng, field, true)
    }

    fn draw(rng: &mut impl Rng, field: &FieldSpec, calib: bool) -> Result<Catalog, FiberAssignError> {
        if !(field.radius > 0.0 && field.radius < 90.0) {
            return Err(FiberAssignError::InvalidParameter(
                "field radius must be in (0, 90) degrees".into(),
            ));
        }
        if field.exposure_times.is_empty() || field.max_priority == 0 {
            return Err(FiberAssignError::InvalidParameter(
                "field needs exposure times and max_priority >= 1".into(),
            ));
        }

        let invalid = |e: rand_distr::uniform::Error| FiberAssignError::InvalidParameter(e.to_string());
        let cos_theta = Uniform::new_inclusive(field.radius.to_radians().cos(), 1.0).map_err(invalid)?;
        let phi = Uniform::new(0.0, DPI).map_err(invalid)?;

        let axis = unit_from_radec_deg(field.ra, field.dec);
        let pole = nalgebra::Vector3::z();
        let e1 = {
            let e = pole.cross(&axis);
            if e.norm() > 1e-12 {
                e.normalize()
            } else {
                nalgebra::Vector3::x()
            }
        };
        let e2 = axis.cross(&e1);

        let targets = (0..field.n_targets).map(|i| {
            let ct = cos_theta.sample(rng);
            let st = (1.0 - ct * ct).max(0.0).sqrt();
            let (sp, cp) = phi.sample(rng).sin_cos();
            let v = axis * ct + (e1 * cp + e2 * sp) * st;
            let (ra, dec) = radec_from_unit(&v);
            let ra = ra.to_degrees().rem_euclid(360.0);
            let dec = dec.to_degrees();
            let id = format!("{}{}", field.id_prefix, i);

            if calib {
                Target::calibration(id, ra, dec, &field.tag)
            } else {
                let priority = rng.random_range(1..=field.max_priority);
                let time = field.exposure_times[rng.random_range(0..field.exposure_times.len())];
                Target::science(id, ra, dec, time, priority, &field.tag)
            }
        });

        Ok(targets.collect())
    }
}

#[cfg(test)]
mod synthetic_test {
    use super::*;
    use crate::geometry::unit_from_radec_deg;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_random_field_inside_cap() {
        let field = FieldSpec {
            n_targets: 500,
            exposure_times: vec![900.0, 1800.0],
            ..FieldSpec::default()
        };
        let mut rng = StdRng::seed_from_u64(20);
        let catalog = Catalog::random_field(&mut rng, &field).unwrap();
        assert_eq!(catalog.len(), 500);

        let axis = unit_from_radec_deg(field.ra, field.dec);
        for t in &catalog {
            let sep = unit_from_radec_deg(t.ra, t.dec).dot(&axis).clamp(-1.0, 1.0).acos();
            assert!(sep.to_degrees() <= field.radius + 1e-9);
            assert!((1..=7).contains(&t.priority));
            assert!(t.exposure_time == 900.0 || t.exposure_time == 1800.0);
            assert_eq!(t.class, format!("sci_P{}", t.priority));
        }
    }

    #[test]
    fn test_random_field_is_reproducible() {
        let field = FieldSpec {
            n_targets: 50,
            ..FieldSpec::default()
        };
        let a = Catalog::random_field(&mut StdRng::seed_from_u64(7), &field).unwrap();
        let b = Catalog::random_field(&mut StdRng::seed_from_u64(7), &field).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_calibration_field() {
        let field = FieldSpec {
            n_targets: 10,
            tag: "sky".into(),
            id_prefix: "SKY".into(),
            ..FieldSpec::default()
        };
        let catalog = Catalog::random_calibration_field(&mut StdRng::seed_from_u64(1), &field).unwrap();
        assert!(catalog.iter().all(|t| t.class == "sky"));
        assert_eq!(catalog[3].id, "SKY3");
    }

    #[test]
    fn test_invalid_field() {
        let field = FieldSpec {
            radius: 0.0,
            ..FieldSpec::default()
        };
        assert!(Catalog::random_field(&mut StdRng::seed_from_u64(1), &field).is_err());
    }
}
