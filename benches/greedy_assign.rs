use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use fiberassign::bench::Bench;
use fiberassign::catalog::{Catalog, FieldSpec};
use fiberassign::strategy::{
    single_exposure, DrainingAssigner, FiberAssigner, NaiveAssigner, ProximityAssigner,
};
use fiberassign::telescope::Telescope;

fn bench_assigners(c: &mut Criterion) {
    let bench = Bench::full();
    let field = FieldSpec {
        n_targets: 20_000,
        ..FieldSpec::default()
    };
    let catalog = Catalog::random_field(&mut StdRng::seed_from_u64(0xC0B7A), &field).unwrap();
    let tel = Telescope::new(34.0, -4.5, 0.0, "2016-04-03T08:00:00Z").unwrap();

    let assigners: [(&str, &dyn FiberAssigner); 3] = [
        ("naive", &NaiveAssigner),
        ("draining", &DrainingAssigner),
        ("proximity", &ProximityAssigner::default()),
    ];
    for (name, assigner) in assigners {
        c.bench_function(&format!("single_exposure/{name}"), |b| {
            b.iter(|| black_box(single_exposure(&bench, catalog.targets(), &tel, assigner)))
        });
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_assigners
);
criterion_main!(benches);
