//! # fiberassign
//!
//! Fiber assignment for the focal plane of a multi-object spectrograph.
//!
//! * [`telescope`] projects sky positions onto the focal plane for each visit.
//! * [`bench`] describes the fiber positioners ("cobras") and what they can reach.
//! * [`netflow`] assigns cobras to targets over several visits by min-cost flow, under
//!   per-class costs ([`cost`]) and collision constraints.
//! * [`strategy`] holds the fast single-visit greedy assigners and exposure tiling.
//! * [`collision`] replays the cobra moves of an assignment and reports arm collisions.
//! * [`display`] renders assignments and costs.
//!
//! ## Example
//!
//! ```rust
//! use fiberassign::bench::Bench;
//! use fiberassign::catalog::{Catalog, Target};
//! use fiberassign::cost::CostModel;
//! use fiberassign::netflow::observe_with_netflow;
//! use fiberassign::telescope::Telescope;
//!
//! let bench = Bench::full();
//! let catalog: Catalog = vec![
//!     // about 4.5 mm north and south of the focal plane center
//!     Target::science("ID1", 34.0, -4.4859, 900.0, 1, "sci"),
//!     Target::science("ID2", 34.0, -4.5141, 1800.0, 2, "sci"),
//! ]
//! .into();
//! let costs = CostModel::science_ladder("sci", 2, 1000.0, 100.0);
//!
//! let positions: Vec<_> = ["2016-04-03T08:00:00Z", "2016-04-03T08:15:00Z"]
//!     .iter()
//!     .map(|t| Telescope::new(34.0, -4.5, 0.0, t).map(|tel| tel.get_fp_positions(catalog.targets())))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! let visits = observe_with_netflow(
//!     &bench, catalog.targets(), &positions, &costs, 900.0, &[0.1, 0.2], None, 2.0, true,
//! )
//! .unwrap();
//! assert_eq!(visits.len(), 2);
//! assert!(visits[0].contains_key(&0));
//! assert!(visits.iter().all(|v| v.contains_key(&1)));
//! ```
pub mod bench;
pub mod catalog;
pub mod collision;
pub mod constants;
pub mod cost;
pub mod display;
pub mod fiberassign_errors;
pub mod geometry;
pub mod netflow;
pub mod raster;
pub mod strategy;
pub mod telescope;
pub mod time;

#[cfg(feature = "progress")]
pub(crate) mod progress_bar;

pub use bench::{Bench, Cobra};
pub use catalog::{Catalog, Target};
pub use collision::{CollisionParams, CollisionReport, CollisionSimulator};
pub use cost::{ClassConfig, CostModel, MoveCost};
pub use fiberassign_errors::FiberAssignError;
pub use netflow::{observe_with_netflow, NetflowParams, NetflowProblem, NetflowSolution};
pub use telescope::Telescope;
