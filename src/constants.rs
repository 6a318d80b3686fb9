//! # Constants and type definitions for fiberassign
//!
//! This module centralizes the **unit conversions**, the **focal-plane hardware constants** and
//! the **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Angle and time conversions (degrees ↔ radians, JD ↔ MJD)
//! - Geometry of the fiber positioner bench (cobra pitch, patrol radius, blocking areas)
//! - Optical distortion coefficients of the sky → focal plane projection
//! - Type aliases for units and for the per-visit data passed between modules
//!
//! All focal-plane lengths are in **millimeters**, all sky angles in **degrees** unless the
//! alias says otherwise.

use nalgebra::Complex;
use std::collections::BTreeMap;

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// MJD epoch of J2000.0 (2000-01-01 12:00:00 TT)
pub const T2000: f64 = 51544.5;

/// Julian date of J2000.0
pub const J2000_JD: f64 = 2451545.0;

/// Conversion factor between Julian Date and Modified Julian Date
pub const JDTOMJD: f64 = 2400000.5;

/// Days in a Julian year
pub const DAYS_PER_JULIAN_YEAR: f64 = 365.25;

// -------------------------------------------------------------------------------------------------
// Focal plane hardware
// -------------------------------------------------------------------------------------------------

/// Number of sectors of the full focal plane
pub const N_FIELDS: usize = 3;

/// Number of modules per sector
pub const N_MODULES: usize = 14;

/// Number of cobras per module
pub const N_COBRAS_PER_MODULE: usize = 57;

/// Total number of fibers of the full bench
pub const N_FIBERS: usize = N_FIELDS * N_MODULES * N_COBRAS_PER_MODULE;

/// Distance between neighbouring cobra centers
pub const COBRA_PITCH: Millimeter = 8.0;

/// Maximum radius of a fiber patrol area
pub const PATROL_RADIUS: Millimeter = 4.75;

/// Length of each of the two cobra arms (the sum equals [`PATROL_RADIUS`])
pub const LINK_LENGTH: Millimeter = PATROL_RADIUS / 2.0;

/// Offset of a fiducial dot above its cobra center
pub const DOT_OFFSET: Millimeter = 1.19;

/// Radius of the area blocked by a fiducial dot
pub const DOT_RADIUS: Millimeter = 1.375;

/// Minimum distance between two fiber positioners
pub const COLLISION_DISTANCE: Millimeter = 2.0;

/// Radius of the kernel used to weight target density in the proximity strategy
pub const KERNEL_RADIUS: Millimeter = 4.75;

/// Targets farther than this from the focal plane center are never observable
pub const FOCAL_PLANE_RADIUS: Millimeter = 190.0;

/// Radial distortion coefficients of the sky → focal plane mapping (mm per degree)
pub const DISTORTION_A0: f64 = 0.0;
pub const DISTORTION_A1: f64 = -3.2e2;
pub const DISTORTION_A2: f64 = -1.37e1;
pub const DISTORTION_A3: f64 = -7.45e0;

/// Geodetic latitude of the Subaru telescope
pub const SUBARU_LATITUDE: Degree = 19.0 + 49.0 / 60.0 + 32.0 / 3600.0;

/// Geodetic longitude of the Subaru telescope (east positive)
pub const SUBARU_LONGITUDE: Degree = -(155.0 + 28.0 / 60.0 + 34.0 / 3600.0);

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Length in the focal plane
pub type Millimeter = f64;
/// Time span in seconds
pub type Seconds = f64;
/// Modified Julian Date (days)
pub type MJD = f64;

/// Position in the focal plane, `re` = x and `im` = y, in millimeters.
pub type FpPosition = Complex<f64>;

/// Focal-plane positions of every target for one visit, indexed like the target list.
pub type VisitPositions = Vec<FpPosition>;

/// Assignment of one visit: target index → cobra index.
///
/// Both directions are injective: a target is observed by at most one cobra and a cobra
/// observes at most one target.
pub type VisitAssignment = BTreeMap<usize, usize>;
