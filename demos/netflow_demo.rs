use camino::Utf8Path;
use fiberassign::catalog::{Catalog, FieldSpec};
use fiberassign::collision::{simulate_visits, CollisionParams};
use fiberassign::cost::{ClassConfig, CostModel, MoveCost};
use fiberassign::display::AssignmentTable;
use fiberassign::netflow::{NetflowParams, NetflowProblem};
use fiberassign::{Bench, FiberAssignError, Telescope};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Number of 15 minute visits of the demo field.
const N_VISITS: usize = 6;

/// Synthetic science field with calibration stars and sky positions around the same center.
fn demo_catalog(rng: &mut StdRng) -> Result<Catalog, FiberAssignError> {
    let science = FieldSpec {
        radius: 0.5,
        n_targets: 3000,
        exposure_times: vec![900.0, 1800.0, 3600.0],
        ..FieldSpec::default()
    };
    let mut catalog = Catalog::random_field(rng, &science)?;
    for (tag, n) in [("cal", 100), ("sky", 300)] {
        let field = FieldSpec {
            radius: 0.5,
            n_targets: n,
            tag: tag.into(),
            id_prefix: tag.to_uppercase(),
            ..FieldSpec::default()
        };
        catalog.extend(Catalog::random_calibration_field(rng, &field)?.iter().cloned());
    }
    Ok(catalog)
}

/// Assign a synthetic field over several visits, then replay the cobra moves.
/// Usage:
///   cargo run --example netflow_demo [--features progress] [OUTPUT_FILE]
fn main() -> Result<(), FiberAssignError> {
    let mut rng = StdRng::seed_from_u64(42);
    let catalog = demo_catalog(&mut rng)?;
    let (ra, dec) = catalog.center()?;
    println!("center of data set: RA {ra:.6}, DEC {dec:.6}");

    let bench = Bench::full();
    let positions = (0..N_VISITS)
        .map(|v| {
            let minutes = 15 * v;
            let time = format!("2016-04-03T{:02}:{:02}:00Z", 8 + minutes / 60, minutes % 60);
            Telescope::new(ra, dec, 0.0, &time).map(|tel| tel.get_fp_positions(catalog.targets()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let costs = CostModel::science_ladder("sci", 7, 1000.0, 100.0)
        .with("cal", ClassConfig::calibration(40, 10000.0))
        .with("sky", ClassConfig::calibration(240, 10000.0));
    let params = NetflowParams::builder()
        .visit_costs((0..N_VISITS).map(|i| 0.1 + 0.1 * i as f64).collect())
        .move_cost(MoveCost::new(|d| 5.0 * d / 4.75))
        .build()?;
    println!("{params:#}");

    let problem = NetflowProblem::new(&bench, catalog.targets(), &positions, &costs, params)?;
    let solution = problem.solve();
    println!("{:#}", solution.cost);
    println!(
        "{} observations in {} iterations (converged: {})",
        solution.n_assignments(),
        solution.iterations,
        solution.converged
    );

    let reports = simulate_visits(&bench, &solution.visits, &positions, &CollisionParams::default())?;
    for (v, report) in reports.iter().enumerate() {
        println!(
            "visit {v}: {} fibers, {} colliding pairs, {} endpoint collisions",
            solution.visits[v].len(),
            report.n_collisions(),
            report.n_endpoint_collisions()
        );
    }

    let table = AssignmentTable::new(catalog.targets(), &positions[0], &solution.visits[0]);
    match std::env::args().nth(1) {
        Some(path) => table.write(Utf8Path::new(&path))?,
        None => println!("{table}"),
    }
    Ok(())
}
