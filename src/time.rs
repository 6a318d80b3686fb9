//! # Observation epochs and Earth orientation helpers
//!
//! Observation times are exchanged as strict ISO-8601 UTC strings (`2016-04-03T08:00:00Z`) and
//! converted to [`hifitime::Epoch`]. The module also carries the two pieces of classical
//! astrometry needed to place a pointing on the local sky:
//!
//! * [`gmst`] – Greenwich mean sidereal time from a UT1 MJD,
//! * [`precess`] – IAU 1976 precession of equatorial coordinates between two equinoxes.
use std::sync::LazyLock;

use hifitime::Epoch;
use nalgebra::{Matrix3, Vector3};
use regex::Regex;

use crate::constants::{Radian, DPI, RADSEC, T2000};
use crate::fiberassign_errors::FiberAssignError;
use crate::geometry::{radec_from_unit, unit_from_radec};

static ISO8601_UTC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})Z$")
        .expect("ISO-8601 pattern is valid")
});

/// Parse an observation time of the form `YYYY-MM-DDTHH:MM:SSZ` (UTC).
///
/// Arguments
/// -----------------
/// * `datetime`: the timestamp, e.g. `"2016-04-03T08:00:00Z"`.
///
/// Return
/// ----------
/// * The corresponding UTC [`Epoch`], or [`FiberAssignError::InvalidTimeFormat`] if the string
///   does not match the pattern or describes an impossible date.
pub fn iso8601_to_epoch(datetime: &str) -> Result<Epoch, FiberAssignError> {
    let invalid = || FiberAssignError::InvalidTimeFormat(datetime.to_string());

    let caps = ISO8601_UTC.captures(datetime).ok_or_else(invalid)?;
    let field = |i: usize| -> Result<u32, FiberAssignError> {
        caps[i].parse::<u32>().map_err(|_| invalid())
    };

    let year = field(1)? as i32;
    let month = field(2)?;
    let day = field(3)?;
    let hour = field(4)?;
    let minute = field(5)?;
    let second = field(6)?;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60
    {
        return Err(invalid());
    }

    Epoch::maybe_from_gregorian_utc(
        year,
        month as u8,
        day as u8,
        hour as u8,
        minute as u8,
        second as u8,
        0,
    )
    .map_err(|_| invalid())
}

/// Fractional Julian year of an epoch (e.g. `2016.25`), used as target equinox for precession.
pub fn julian_year(epoch: &Epoch) -> f64 {
    2000.0 + (epoch.to_mjd_utc_days() - T2000) / crate::constants::DAYS_PER_JULIAN_YEAR
}

/// Greenwich Mean Sidereal Time in radians for a UT1 Modified Julian Date.
///
/// IAU 1982 polynomial for GMST at 0h UT1, plus the sidereal advance over the fraction of day.
/// The result is normalized to `[0, 2π)`.
pub fn gmst(tjm: f64) -> Radian {
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;
    // sidereal day / solar day
    const RAP: f64 = 1.00273790934;

    let t = (tjm.floor() - T2000) / 36525.0;
    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * DPI / 86400.0;

    (gmst0 + tjm.fract() * DPI * RAP).rem_euclid(DPI)
}

/// Precess equatorial coordinates from `equinox1` to `equinox2` (Julian years).
///
/// Uses the IAU 1976 angles ζ, z, θ expressed relative to `equinox1`.
///
/// Arguments
/// -----------------
/// * `ra`, `dec`: coordinates in **radians** at `equinox1`.
/// * `equinox1`, `equinox2`: source and destination equinoxes, e.g. `2000.0` and `2016.25`.
///
/// Return
/// ----------
/// * `(ra, dec)` in radians at `equinox2`, with `ra ∈ [0, 2π)`.
pub fn precess(ra: Radian, dec: Radian, equinox1: f64, equinox2: f64) -> (Radian, Radian) {
    let x = unit_from_radec(ra, dec);
    let t = 1e-3 * (equinox2 - equinox1);
    let st = 1e-3 * (equinox1 - 2000.);

    let zeta = RADSEC * t * (23062.181 + st * (139.656 + 0.0139 * st)
        + t * (30.188 - 0.344 * st + 17.998 * t));
    let z = RADSEC * t * t * (79.280 + 0.410 * st + 0.205 * t) + zeta;
    let theta = RADSEC * t * (20043.109 - st * (85.33 + 0.217 * st)
        + t * (-42.665 - 0.217 * st - 41.833 * t));

    let (sa, ca) = zeta.sin_cos();
    let (sb, cb) = z.sin_cos();
    let (sc, cc) = theta.sin_cos();

    let rot = Matrix3::from_columns(&[
        Vector3::new(ca * cb * cc - sa * sb, sa * cb + ca * sb * cc, ca * sc),
        Vector3::new(-ca * sb - sa * cb * cc, ca * cb - sa * sb * cc, -sa * sc),
        Vector3::new(-cb * sc, -sb * sc, cc),
    ]);

    let (ra2, dec2) = radec_from_unit(&(rot * x));
    (ra2.rem_euclid(DPI), dec2)
}
