mod common;

use fiberassign::bench::Bench;
use fiberassign::collision::{simulate_visits, targets_from_assignment, CollisionParams, CollisionSimulator};
use fiberassign::constants::VisitAssignment;
use fiberassign::cost::CostModel;
use fiberassign::netflow::observe_with_netflow;
use nalgebra::Complex;

use crate::common::{random_field, visit_positions};

#[test]
fn test_replay_netflow_visits() {
    let bench = Bench::full();
    let catalog = random_field(2, 300, 0.3, vec![900.0]);
    let positions = visit_positions(&catalog, 2);
    let costs = CostModel::science_ladder("sci", 7, 1000.0, 100.0);
    let visits =
        observe_with_netflow(&bench, catalog.targets(), &positions, &costs, 900.0, &[0.1, 0.2], None, 2.0, true)
            .unwrap();

    let params = CollisionParams::builder().n_steps(20).build().unwrap();
    let reports = simulate_visits(&bench, &visits, &positions, &params).unwrap();
    assert_eq!(reports.len(), 2);

    for (report, assignment) in reports.iter().zip(&visits) {
        assert_eq!(report.collisions.len(), bench.len());
        for &(i, j) in &report.pairs {
            assert!(i < j);
            assert!(bench.neighbors().binary_search(&(i, j)).is_ok());
        }
        // parked cobras never collide with each other
        let moving: Vec<usize> = assignment.values().copied().collect();
        for &(i, j) in &report.pairs {
            assert!(moving.contains(&i) || moving.contains(&j));
        }
        assert!(report.n_endpoint_collisions() <= report.problematic_cobras().len());
        assert_eq!(report.n_endpoint_collisions(), 0);
    }
}

#[test]
fn test_dense_field_ends_without_collisions() {
    let bench = Bench::full();
    let catalog = random_field(2, 1500, 0.3, vec![900.0]);
    let positions = visit_positions(&catalog, 2);
    let costs = CostModel::science_ladder("sci", 7, 1000.0, 100.0);
    let visits =
        observe_with_netflow(&bench, catalog.targets(), &positions, &costs, 900.0, &[0.1, 0.2], None, 2.0, true)
            .unwrap();

    let reports = simulate_visits(&bench, &visits, &positions, &CollisionParams::default()).unwrap();
    for (v, (report, assignment)) in reports.iter().zip(&visits).enumerate() {
        assert!(assignment.len() > 200, "visit {v}: {} assignments", assignment.len());
        // collisions on the way can be fixed by ordering the moves, final positions cannot
        assert_eq!(
            report.n_endpoint_collisions(),
            0,
            "visit {v}: endpoint collisions for cobras {:?}",
            report
                .endpoint_collisions
                .iter()
                .enumerate()
                .filter(|(_, c)| **c)
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_crossing_arms_on_a_small_bench() {
    let centers = [Complex::new(0.0, 0.0), Complex::new(6.0, 0.0), Complex::new(40.0, 0.0)];
    let bench = Bench::from_centers(&centers, 2.375, 2.375).unwrap();
    let positions = vec![
        Complex::new(3.5, -0.5),
        Complex::new(2.5, -0.5),
        Complex::new(41.0, -1.0),
    ];
    let assignment = VisitAssignment::from([(0, 0), (1, 1), (2, 2)]);

    let targets = targets_from_assignment(&bench, &assignment, &positions).unwrap();
    let report = CollisionSimulator::new(&bench, targets, CollisionParams::default())
        .unwrap()
        .run();
    assert_eq!(report.pairs, vec![(0, 1)]);
    assert_eq!(report.problematic_cobras(), vec![0, 1]);
    assert!(report.endpoint_collisions[0] && report.endpoint_collisions[1]);
    assert!(!report.collisions[2]);
}
