use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use fiberassign::bench::Bench;
use fiberassign::catalog::{Catalog, FieldSpec};
use fiberassign::constants::VisitPositions;
use fiberassign::cost::CostModel;
use fiberassign::netflow::{NetflowParams, NetflowProblem};
use fiberassign::telescope::Telescope;

/// Random field of `n` targets and its positions for `n_visits` identical pointings.
fn setup(n: usize, n_visits: usize) -> (Catalog, Vec<VisitPositions>) {
    let field = FieldSpec {
        radius: 0.3,
        n_targets: n,
        exposure_times: vec![900.0, 1800.0],
        ..FieldSpec::default()
    };
    let catalog = Catalog::random_field(&mut StdRng::seed_from_u64(0xF1BE5), &field).unwrap();
    let tel = Telescope::new(34.0, -4.5, 0.0, "2016-04-03T08:00:00Z").unwrap();
    let positions = vec![tel.get_fp_positions(catalog.targets()); n_visits];
    (catalog, positions)
}

fn bench_netflow(c: &mut Criterion) {
    let bench = Bench::full();
    let costs = CostModel::science_ladder("sci", 7, 1000.0, 100.0);

    for (n, n_visits) in [(200, 2), (500, 3)] {
        let (catalog, positions) = setup(n, n_visits);
        let params = NetflowParams::builder()
            .visit_costs((0..n_visits).map(|i| 0.1 + 0.1 * i as f64).collect())
            .build()
            .unwrap();
        let problem =
            NetflowProblem::new(&bench, catalog.targets(), &positions, &costs, params).unwrap();

        c.bench_function(&format!("netflow/solve_{n}_targets_{n_visits}_visits"), |b| {
            b.iter(|| black_box(problem.solve()))
        });
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_netflow
);
criterion_main!(benches);
