#![allow(dead_code)]

use std::collections::BTreeSet;

use fiberassign::bench::Bench;
use fiberassign::catalog::{Catalog, FieldSpec};
use fiberassign::constants::{FpPosition, VisitAssignment, VisitPositions};
use fiberassign::telescope::Telescope;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const TIME: &str = "2016-04-03T08:00:00Z";

/// Random science field around (34, -4.5), reproducible from `seed`.
pub fn random_field(seed: u64, n_targets: usize, radius: f64, exposure_times: Vec<f64>) -> Catalog {
    let field = FieldSpec {
        radius,
        n_targets,
        exposure_times,
        ..FieldSpec::default()
    };
    Catalog::random_field(&mut StdRng::seed_from_u64(seed), &field).unwrap()
}

/// Focal-plane positions of `catalog` for `n_visits` visits 15 minutes apart, all at the
/// field center.
pub fn visit_positions(catalog: &Catalog, n_visits: usize) -> Vec<VisitPositions> {
    (0..n_visits)
        .map(|v| {
            let minutes = 15 * v;
            let time = format!("2016-04-03T{:02}:{:02}:00Z", 8 + minutes / 60, minutes % 60);
            Telescope::new(34.0, -4.5, 0.0, &time)
                .unwrap()
                .get_fp_positions(catalog.targets())
        })
        .collect()
}

/// Check every invariant of a visit assignment: injective in both directions, reachable and
/// free of fiber/fiber and elbow/fiber collisions.
pub fn assert_valid_visit(
    bench: &Bench,
    assignment: &VisitAssignment,
    positions: &[FpPosition],
    collision_distance: f64,
    elbows: bool,
) {
    let cobras: BTreeSet<usize> = assignment.values().copied().collect();
    assert_eq!(cobras.len(), assignment.len(), "a cobra is used twice");

    for (&t, &c) in assignment {
        assert!(
            bench.cobras()[c].can_reach(positions[t]),
            "cobra {c} cannot reach target {t}"
        );
    }

    let assigned: Vec<(usize, usize)> = assignment.iter().map(|(&t, &c)| (t, c)).collect();
    for (i, &(ti, ci)) in assigned.iter().enumerate() {
        for &(tj, _) in &assigned[i + 1..] {
            let d = (positions[ti] - positions[tj]).norm();
            assert!(d >= collision_distance, "targets {ti} and {tj} collide ({d:.3} mm)");
        }
        if elbows {
            let elbow = bench.cobras()[ci].elbow_position(positions[ti]).unwrap();
            for &(tj, _) in &assigned {
                if tj != ti {
                    let d = (positions[tj] - elbow).norm();
                    assert!(d >= collision_distance, "elbow of {ti} hits target {tj}");
                }
            }
        }
    }
}
