//! # Telescope pointing and sky → focal plane projection
//!
//! A [`Telescope`] describes one visit: where the telescope points (RA/Dec), how the focal
//! plane is rotated on the sky (position angle) and when the exposure happens.
//!
//! ## Projection
//!
//! [`Telescope::get_fp_positions`] maps target sky positions to focal-plane coordinates:
//!
//! 1. Build a local frame at the pointing: `z` = line of sight, `x` = direction of the
//!    celestial pole projected perpendicular to `z`, `y = z × x`.
//! 2. Each target gets two angular offsets `(atan2(v·x, v·z), atan2(v·y, v·z))` in degrees.
//! 3. The offsets are rotated by `90° − position angle`: at position angle 0 the focal-plane
//!    `+Y` axis points north and `+X` points west.
//! 4. A radial distortion polynomial converts degrees to millimeters:
//!
//!    ```text
//!    s(r) = a3·r⁴ + a2·r² + a1          (r² = dx² + dy²)
//!    X = s(r)·dx + a0,   Y = −s(r)·dy + a0
//!    ```
//!
//! The optical model is approximate: it ignores atmospheric refraction, aberration and the
//! telescope elevation.
use std::f64::consts::FRAC_PI_2;

use hifitime::Epoch;
use nalgebra::{Complex, Vector3};

use crate::catalog::Target;
use crate::constants::{
    Degree, FpPosition, DISTORTION_A0, DISTORTION_A1, DISTORTION_A2, DISTORTION_A3,
    SUBARU_LATITUDE, SUBARU_LONGITUDE,
};
use crate::fiberassign_errors::FiberAssignError;
use crate::geometry::{radec_from_unit, rotate, unit_from_radec_deg};
use crate::time::{gmst, iso8601_to_epoch, julian_year, precess};

/// One telescope visit: pointing, orientation and epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Telescope {
    pub ra: Degree,
    pub dec: Degree,
    /// Position angle of the focal plane on the sky
    pub posang: Degree,
    pub epoch: Epoch,
}

impl Telescope {
    /// Create a telescope pointing.
    ///
    /// Arguments
    /// -----------------
    /// * `ra`, `dec`: pointing center in degrees (J2000).
    /// * `posang`: position angle in degrees.
    /// * `time`: observation time as `YYYY-MM-DDTHH:MM:SSZ`.
    ///
    /// Return
    /// ----------
    /// * The telescope, or [`FiberAssignError::InvalidTimeFormat`].
    pub fn new(ra: Degree, dec: Degree, posang: Degree, time: &str) -> Result<Self, FiberAssignError> {
        Ok(Self::from_epoch(ra, dec, posang, iso8601_to_epoch(time)?))
    }

    pub fn from_epoch(ra: Degree, dec: Degree, posang: Degree, epoch: Epoch) -> Self {
        Telescope {
            ra,
            dec,
            posang,
            epoch,
        }
    }

    /// Local frame `(x, y, z)` of the pointing; `x` points to the celestial pole.
    fn frame(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let z = unit_from_radec_deg(self.ra, self.dec);
        let sky = Vector3::z();
        let x = sky - z * z.dot(&sky);
        let x = if x.norm() > 1e-12 {
            x.normalize()
        } else {
            // pointing at a pole: any perpendicular axis will do
            Vector3::x()
        };
        let y = z.cross(&x);
        (x, y, z)
    }

    /// Focal-plane positions of `targets` for this pointing.
    ///
    /// Return
    /// ----------
    /// * One position per target, in the order of `targets` (mm, `re` = x, `im` = y).
    pub fn get_fp_positions(&self, targets: &[Target]) -> Vec<FpPosition> {
        let (x, y, z) = self.frame();
        let psi = self.posang.to_radians();

        targets
            .iter()
            .map(|t| {
                let v = unit_from_radec_deg(t.ra, t.dec);
                let vz = v.dot(&z);
                let offset = Complex::new(
                    v.dot(&x).atan2(vz).to_degrees(),
                    v.dot(&y).atan2(vz).to_degrees(),
                );
                let p = rotate(offset, FRAC_PI_2 - psi);
                let rsq = p.norm_sqr();
                let scale = (DISTORTION_A3 * rsq + DISTORTION_A2) * rsq + DISTORTION_A1;
                Complex::new(scale * p.re + DISTORTION_A0, -scale * p.im + DISTORTION_A0)
            })
            .collect()
    }

    /// A copy of this pointing moved by `(dx, dy)` degrees along the local axes and rotated by
    /// `dposang` degrees.
    ///
    /// The axes are `east = center × pole` and `north = center × east`; at the poles the
    /// equatorial x axis is used instead.
    pub fn dithered(&self, dx: Degree, dy: Degree, dposang: Degree) -> Telescope {
        let center = unit_from_radec_deg(self.ra, self.dec);
        let vdx = center.cross(&Vector3::z());
        let vdx = if vdx.norm_squared() == 0.0 {
            Vector3::x()
        } else {
            vdx.normalize()
        };
        let vdy = center.cross(&vdx);

        let moved = center + vdx * dx.to_radians() + vdy * dy.to_radians();
        let (ra, dec) = radec_from_unit(&moved);

        Telescope {
            ra: ra.to_degrees().rem_euclid(360.0),
            dec: dec.to_degrees(),
            posang: self.posang + dposang,
            epoch: self.epoch,
        }
    }

    /// Altitude of the pointing above the horizon at the Subaru site, in degrees.
    ///
    /// The pointing is precessed from J2000 to the observation epoch and the hour angle is
    /// derived from the mean sidereal time (UT1 ≈ UTC).
    pub fn altitude(&self) -> Degree {
        let (ra, dec) = precess(
            self.ra.to_radians(),
            self.dec.to_radians(),
            2000.0,
            julian_year(&self.epoch),
        );
        let lat = SUBARU_LATITUDE.to_radians();
        let ha = gmst(self.epoch.to_mjd_utc_days()) + SUBARU_LONGITUDE.to_radians() - ra;

        (dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos())
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
    }
}

#[cfg(test)]
mod telescope_test {
    use super::*;
    use approx::assert_relative_eq;

    const TIME: &str = "2016-04-03T08:00:00Z";

    fn target(ra: f64, dec: f64) -> Target {
        Target::science("ID1", ra, dec, 900.0, 1, "sci")
    }

    #[test]
    fn test_center_maps_to_origin() {
        let tel = Telescope::new(34.0, -4.5, 0.0, TIME).unwrap();
        let pos = tel.get_fp_positions(&[target(34.0, -4.5)]);
        assert_relative_eq!(pos[0].re, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pos[0].im, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_north_offset() {
        let scale = DISTORTION_A3 * 1e-4 + DISTORTION_A2 * 1e-2 + DISTORTION_A1;

        // north is +Y at position angle 0
        let tel = Telescope::new(34.0, -4.5, 0.0, TIME).unwrap();
        let pos = tel.get_fp_positions(&[target(34.0, -4.4)]);
        assert_relative_eq!(pos[0].re, 0.0, epsilon = 1e-6);
        assert_relative_eq!(pos[0].im, -scale * 0.1, epsilon = 1e-6);
        assert!(pos[0].im > 0.0);

        // a quarter turn of the focal plane moves the offset onto the X axis
        let tel = Telescope::new(34.0, -4.5, 90.0, TIME).unwrap();
        let pos = tel.get_fp_positions(&[target(34.0, -4.4)]);
        assert_relative_eq!(pos[0].re, scale * 0.1, epsilon = 1e-6);
        assert_relative_eq!(pos[0].im, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_west_offset() {
        // a small step towards lower RA lands on +X
        let tel = Telescope::new(34.0, 0.0, 0.0, TIME).unwrap();
        let pos = tel.get_fp_positions(&[target(33.99, 0.0)]);
        assert!(pos[0].re > 3.0);
        assert_relative_eq!(pos[0].im, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_positions_keep_target_order() {
        let tel = Telescope::new(34.0, -4.5, 0.0, TIME).unwrap();
        let targets = vec![target(34.0, -4.4), target(34.0, -4.5), target(34.0, -4.6)];
        let pos = tel.get_fp_positions(&targets);
        assert_eq!(pos.len(), 3);
        assert!(pos[0].im > 0.0);
        assert_relative_eq!(pos[1].im, 0.0, epsilon = 1e-9);
        assert!(pos[2].im < 0.0);
    }

    #[test]
    fn test_invalid_time() {
        assert_eq!(
            Telescope::new(0.0, 0.0, 0.0, "yesterday"),
            Err(FiberAssignError::InvalidTimeFormat("yesterday".into()))
        );
    }

    #[test]
    fn test_dithered() {
        let tel = Telescope::new(34.0, -4.5, 10.0, TIME).unwrap();
        let same = tel.dithered(0.0, 0.0, 0.0);
        assert_relative_eq!(same.ra, 34.0, epsilon = 1e-10);
        assert_relative_eq!(same.dec, -4.5, epsilon = 1e-10);

        let moved = tel.dithered(0.01, 0.0, 2.0);
        let sep = unit_from_radec_deg(moved.ra, moved.dec)
            .dot(&unit_from_radec_deg(tel.ra, tel.dec))
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees();
        assert_relative_eq!(sep, 0.01, epsilon = 1e-6);
        assert_eq!(moved.posang, 12.0);

        // the pole has no preferred axis but must still work
        let pole = Telescope::new(0.0, 90.0, 0.0, TIME).unwrap().dithered(0.1, 0.0, 0.0);
        assert_relative_eq!(pole.dec, 89.9, epsilon = 1e-6);
    }

    #[test]
    fn test_altitude_of_pole() {
        let tel = Telescope::new(0.0, 90.0, 0.0, TIME).unwrap();
        assert_relative_eq!(tel.altitude(), SUBARU_LATITUDE, epsilon = 0.2);
    }
}
