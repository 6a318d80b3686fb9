//! # Cost model
//!
//! Costs and requirements of every target class, and the optional cost of moving a cobra far
//! from its center.
//!
//! ## Class configuration
//!
//! A [`ClassConfig`] is attached to a class label (see [`Target`]):
//!
//! | field                      | science class                                   | calibration class                          |
//! |----------------------------|-------------------------------------------------|--------------------------------------------|
//! | `non_observation_cost`     | charged once if the target is never observed    | charged per missing target, per visit      |
//! | `partial_observation_cost` | charged if observed in some but not all visits  | unused                                     |
//! | `num_required`             | unused                                          | targets of the class needed in every visit |
//!
//! The configuration deserializes from the camelCase keys used by observation planners:
//!
//! ```rust
//! use fiberassign::cost::CostModel;
//!
//! let json = r#"{
//!     "sci_P1": {"nonObservationCost": 100, "partialObservationCost": 1e9, "calib": false},
//!     "sky":    {"numRequired": 2, "nonObservationCost": 1000, "calib": true}
//! }"#;
//! let model: CostModel = serde_json::from_str(json).unwrap();
//! assert_eq!(model.get("sky").unwrap().num_required, Some(2));
//! ```
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::Target;
use crate::constants::Millimeter;
use crate::fiberassign_errors::FiberAssignError;

/// Costs and requirements of one target class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassConfig {
    pub non_observation_cost: f64,
    #[serde(default)]
    pub partial_observation_cost: f64,
    pub calib: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_required: Option<usize>,
}

impl ClassConfig {
    /// Configuration of a science class.
    pub fn science(non_observation_cost: f64, partial_observation_cost: f64) -> Self {
        ClassConfig {
            non_observation_cost,
            partial_observation_cost,
            calib: false,
            num_required: None,
        }
    }

    /// Configuration of a calibration class requiring `num_required` targets per visit.
    pub fn calibration(num_required: usize, non_observation_cost: f64) -> Self {
        ClassConfig {
            non_observation_cost,
            partial_observation_cost: 0.0,
            calib: true,
            num_required: Some(num_required),
        }
    }

    fn validate(&self, class: &str) -> Result<(), FiberAssignError> {
        let invalid = |reason: &str| FiberAssignError::InvalidCost {
            class: class.to_string(),
            reason: reason.to_string(),
        };

        if !(self.non_observation_cost.is_finite() && self.non_observation_cost >= 0.0) {
            return Err(invalid("nonObservationCost must be finite and >= 0"));
        }
        if !(self.partial_observation_cost.is_finite() && self.partial_observation_cost >= 0.0) {
            return Err(invalid("partialObservationCost must be finite and >= 0"));
        }
        if self.calib && self.num_required.is_none() {
            return Err(FiberAssignError::MissingNumRequired(class.to_string()));
        }
        Ok(())
    }
}

/// Class label → [`ClassConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostModel {
    classes: BTreeMap<String, ClassConfig>,
}

impl CostModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: impl Into<String>, config: ClassConfig) -> &mut Self {
        self.classes.insert(class.into(), config);
        self
    }

    /// Builder-style variant of [`CostModel::insert`].
    pub fn with(mut self, class: impl Into<String>, config: ClassConfig) -> Self {
        self.insert(class, config);
        self
    }

    /// Configuration of `class`, or [`FiberAssignError::MissingClassConfig`].
    pub fn get(&self, class: &str) -> Result<&ClassConfig, FiberAssignError> {
        self.classes
            .get(class)
            .ok_or_else(|| FiberAssignError::MissingClassConfig(class.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassConfig)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Calibration classes with their configuration.
    pub fn calibration_classes(&self) -> impl Iterator<Item = (&str, &ClassConfig)> {
        self.iter().filter(|(_, c)| c.calib)
    }

    /// The standard science configuration: classes `{tag}_P1` … `{tag}_P{n}` with a
    /// non-observation cost decreasing by `step` from `top`, and a prohibitive partial cost.
    pub fn science_ladder(tag: &str, n: u32, top: f64, step: f64) -> Self {
        (1..=n).fold(CostModel::new(), |model, p| {
            model.with(
                format!("{tag}_P{p}"),
                ClassConfig::science(top - step * (p - 1) as f64, 1e9),
            )
        })
    }

    /// Check that every target has a valid configuration.
    ///
    /// Return
    /// ----------
    /// * `Ok(())`, or the first problem found: a class without configuration, a calibration
    ///   class without `num_required`, or a negative/non-finite cost.
    pub fn check_targets(&self, targets: &[Target]) -> Result<(), FiberAssignError> {
        for (class, config) in &self.classes {
            config.validate(class)?;
        }
        for t in targets {
            self.get(&t.class)?;
        }
        Ok(())
    }
}

/// Cost of placing a fiber at a given distance from its cobra center.
///
/// Cheap to clone and shareable between threads.
#[derive(Clone)]
pub struct MoveCost(Arc<dyn Fn(Millimeter) -> f64 + Send + Sync>);

impl MoveCost {
    pub fn new(f: impl Fn(Millimeter) -> f64 + Send + Sync + 'static) -> Self {
        MoveCost(Arc::new(f))
    }

    /// `k · distance`
    pub fn linear(k: f64) -> Self {
        Self::new(move |d| k * d)
    }

    #[inline]
    pub fn eval(&self, distance: Millimeter) -> f64 {
        (self.0)(distance)
    }
}

impl fmt::Debug for MoveCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MoveCost(<fn>)")
    }
}

#[cfg(test)]
mod cost_test {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "sci_P1": {"nonObservationCost": 100, "partialObservationCost": 1e9, "calib": false},
            "cal": {"numRequired": 1, "nonObservationCost": 1000, "calib": true}
        }"#;
        let model: CostModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.get("sci_P1").unwrap(), &ClassConfig::science(100.0, 1e9));
        assert_eq!(model.get("cal").unwrap(), &ClassConfig::calibration(1, 1000.0));
        assert_eq!(model.calibration_classes().count(), 1);
    }

    #[test]
    fn test_check_targets() {
        let model = CostModel::science_ladder("sci", 3, 100.0, 10.0);
        assert_eq!(model.get("sci_P3").unwrap().non_observation_cost, 80.0);

        let ok = [Target::science("A", 0.0, 0.0, 900.0, 2, "sci")];
        assert!(model.check_targets(&ok).is_ok());

        let missing = [Target::science("B", 0.0, 0.0, 900.0, 4, "sci")];
        assert_eq!(
            model.check_targets(&missing),
            Err(FiberAssignError::MissingClassConfig("sci_P4".into()))
        );

        let mut model = model;
        model.insert(
            "sky",
            ClassConfig {
                num_required: None,
                ..ClassConfig::calibration(2, 10.0)
            },
        );
        assert_eq!(
            model.check_targets(&ok),
            Err(FiberAssignError::MissingNumRequired("sky".into()))
        );

        let negative = CostModel::new().with("x", ClassConfig::science(-1.0, 0.0));
        assert!(matches!(
            negative.check_targets(&[]),
            Err(FiberAssignError::InvalidCost { .. })
        ));
    }

    #[test]
    fn test_move_cost() {
        let cost = MoveCost::linear(5.0);
        assert_eq!(cost.eval(2.0), 10.0);
        let shared = cost.clone();
        assert_eq!(shared.eval(0.0), 0.0);
        assert_eq!(format!("{cost:?}"), "MoveCost(<fn>)");
    }
}
