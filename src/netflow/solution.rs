//! Result of a netflow run and the decomposition of its cost.
use crate::constants::VisitAssignment;

/// Cost of an assignment, split by origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostBreakdown {
    /// Σ visit costs of all observations
    pub visit_cost: f64,
    /// Σ cobra move costs of all observations
    pub move_cost: f64,
    /// Σ partial-observation costs of incomplete science targets
    pub partial_cost: f64,
    /// Σ non-observation costs of unobserved science targets
    pub non_observation_cost: f64,
    /// Σ non-observation costs of missing calibration targets
    pub calibration_cost: f64,
    pub n_complete: usize,
    pub n_partial: usize,
    pub n_unobserved: usize,
    /// Missing calibration targets, summed over classes and visits
    pub calibration_shortfall: usize,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.visit_cost
            + self.move_cost
            + self.partial_cost
            + self.non_observation_cost
            + self.calibration_cost
    }
}

/// Output of [`NetflowProblem::solve`](super::NetflowProblem::solve).
#[derive(Debug, Clone, PartialEq)]
pub struct NetflowSolution {
    /// One target → cobra map per visit
    pub visits: Vec<VisitAssignment>,
    pub cost: CostBreakdown,
    /// Number of flow solves performed
    pub iterations: usize,
    /// `false` if the repair loop hit its limits and violations were removed greedily
    pub converged: bool,
}

impl NetflowSolution {
    /// Total number of (target, visit) observations.
    pub fn n_assignments(&self) -> usize {
        self.visits.iter().map(|v| v.len()).sum()
    }

    /// Number of visits in which `target` is observed.
    pub fn visits_of(&self, target: usize) -> usize {
        self.visits.iter().filter(|v| v.contains_key(&target)).count()
    }
}
