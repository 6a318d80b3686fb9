//! # Target catalogs
//!
//! In-memory representation of the targets handed to the assignment engine.
//!
//! ## Overview
//!
//! * [`Target`] – one sky position with an identifier, an exposure time, a priority and a
//!   **class label**. The class label is the key used by the
//!   [`CostModel`](crate::cost::CostModel) to find the costs and requirements of the target.
//! * [`Catalog`] – an ordered list of targets. Every downstream structure (focal-plane
//!   positions, assignments, reports) refers to targets by their **index** in this list.
//!
//! ## Class labels
//!
//! | constructor                | class label          | example  |
//! |----------------------------|----------------------|----------|
//! | [`Target::science`]        | `"{tag}_P{priority}"`| `sci_P3` |
//! | [`Target::calibration`]    | `"{tag}"`            | `sky`    |
//!
//! ## Example
//!
//! ```rust
//! use fiberassign::catalog::{Catalog, Target};
//!
//! let mut catalog = Catalog::new();
//! catalog.push(Target::science("ID1", 34.0, -4.5, 900.0, 1, "sci"));
//! catalog.push(Target::calibration("ID2", 34.01, -4.49, "cal"));
//!
//! assert_eq!(catalog[0].class, "sci_P1");
//! assert_eq!(catalog.classes().len(), 2);
//! ```
use std::collections::BTreeSet;
use std::ops::Index;

use crate::constants::{Degree, Seconds};
use crate::fiberassign_errors::FiberAssignError;

mod center;
mod synthetic;

pub use synthetic::FieldSpec;

/// A single observation target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    /// Right ascension (J2000, degrees)
    pub ra: Degree,
    /// Declination (J2000, degrees)
    pub dec: Degree,
    /// Requested exposure time
    pub exposure_time: Seconds,
    /// Priority, 1 being the most important
    pub priority: u32,
    pub class: String,
}

impl Target {
    /// A science target; its class label is `"{tag}_P{priority}"`.
    pub fn science(
        id: impl Into<String>,
        ra: Degree,
        dec: Degree,
        exposure_time: Seconds,
        priority: u32,
        tag: &str,
    ) -> Self {
        Target {
            id: id.into(),
            ra,
            dec,
            exposure_time,
            priority,
            class: format!("{tag}_P{priority}"),
        }
    }

    /// A calibration star or sky position; its class label is the tag itself.
    ///
    /// Calibration targets are observed for a single visit at a time, so their exposure time
    /// is zero and their priority is the highest one.
    pub fn calibration(id: impl Into<String>, ra: Degree, dec: Degree, tag: &str) -> Self {
        Target {
            id: id.into(),
            ra,
            dec,
            exposure_time: 0.0,
            priority: 1,
            class: tag.to_string(),
        }
    }
}

/// Ordered collection of [`Target`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    targets: Vec<Target>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: Target) {
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Target> {
        self.targets.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Target> {
        self.targets.iter()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// All distinct class labels present in the catalog, sorted.
    pub fn classes(&self) -> BTreeSet<&str> {
        self.targets.iter().map(|t| t.class.as_str()).collect()
    }

    /// Indices of the targets belonging to `class`.
    pub fn indices_of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.targets
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.class == class)
            .map(|(i, _)| i)
    }

    /// Telescope pointing that covers all targets: the center of the smallest circle on the sky
    /// enclosing every target, as `(ra, dec)` in degrees.
    ///
    /// Return
    /// ----------
    /// * `(ra, dec)` with `ra ∈ [0, 360)`, or [`FiberAssignError::EmptyCatalog`].
    pub fn center(&self) -> Result<(Degree, Degree), FiberAssignError> {
        center::enclosing_center(&self.targets)
    }
}

impl Index<usize> for Catalog {
    type Output = Target;

    fn index(&self, idx: usize) -> &Target {
        &self.targets[idx]
    }
}

impl FromIterator<Target> for Catalog {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        Catalog {
            targets: iter.into_iter().collect(),
        }
    }
}

impl Extend<Target> for Catalog {
    fn extend<I: IntoIterator<Item = Target>>(&mut self, iter: I) {
        self.targets.extend(iter)
    }
}

impl From<Vec<Target>> for Catalog {
    fn from(targets: Vec<Target>) -> Self {
        Catalog { targets }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod catalog_test {
    use super::*;

    #[test]
    fn test_class_labels() {
        let sci = Target::science("ID7", 10.0, 20.0, 1800.0, 4, "sci");
        assert_eq!(sci.class, "sci_P4");
        assert_eq!(sci.exposure_time, 1800.0);

        let sky = Target::calibration("ID8", 10.0, 20.0, "sky");
        assert_eq!(sky.class, "sky");
        assert_eq!(sky.exposure_time, 0.0);
    }

    #[test]
    fn test_catalog_collection() {
        let mut catalog: Catalog = (0..5)
            .map(|i| Target::science(format!("ID{i}"), i as f64, 0.0, 900.0, 1 + i % 2, "sci"))
            .collect();
        catalog.extend([Target::calibration("C0", 0.0, 0.0, "cal")]);

        assert_eq!(catalog.len(), 6);
        assert_eq!(
            catalog.classes().into_iter().collect::<Vec<_>>(),
            vec!["cal", "sci_P1", "sci_P2"]
        );
        assert_eq!(
            catalog.indices_of_class("sci_P2").collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(catalog[5].id, "C0");
        assert!(catalog.get(6).is_none());
    }

    #[test]
    fn test_empty_center() {
        assert_eq!(Catalog::new().center(), Err(FiberAssignError::EmptyCatalog));
    }
}
