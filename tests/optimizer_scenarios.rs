use std::f64::consts::{E, PI};

use cuckoo_pc::comparison::sample_arc;
use cuckoo_pc::optimization::{
    Backend, BackendKind, Bounds, CuckooParameters, CuckooSearch, FnObjective, Objective, Optimizer,
    ParticleSwarm, PrincipalCurveObjective, ProgressUpdate, SwarmParameters,
};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;

const ARC_POINTS: usize = 50;
const ITERATIONS: usize = 30;
const POPULATION: usize = 15;

fn ackley(x: &[f64]) -> f64 {
    let d = x.len() as f64;
    let term1 = -20.0 * (-0.2 * (x.iter().map(|v| v * v).sum::<f64>() / d).sqrt()).exp();
    let term2 = -(x.iter().map(|v| (2.0 * PI * v).cos()).sum::<f64>() / d).exp();
    term1 + term2 + 20.0 + E
}

fn ackley_bounds() -> Bounds {
    Bounds::new(DVector::from_element(5, -5.0), DVector::from_element(5, 5.0)).unwrap()
}

fn run_with_history<O, Opt>(
    optimizer: &Opt,
    objective: &O,
    bounds: &Bounds,
    iterations: usize,
    seed: u64,
) -> (f64, Vec<f64>, DVector<f64>)
where
    O: Objective,
    Opt: Optimizer,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut history = Vec::new();
    let result = optimizer
        .optimize_with_progress(
            objective,
            bounds,
            iterations,
            &mut rng,
            Some(|update: ProgressUpdate| history.push(update.best_fitness)),
        )
        .unwrap();
    (result.best_score, history, result.best_position)
}

#[test]
fn cuckoo_improves_on_noisy_arc() {
    let mut data_rng = StdRng::seed_from_u64(2024);
    let sample = sample_arc(ARC_POINTS, 0.1, &mut data_rng).unwrap();
    let objective = PrincipalCurveObjective::new(&sample.data, 1.0).unwrap();
    let optimizer =
        CuckooSearch::new(CuckooParameters::default().with_population_size(POPULATION)).unwrap();

    let bounds = Bounds::unit(ARC_POINTS);
    let (best, history, position) =
        run_with_history(&optimizer, &objective, &bounds, ITERATIONS, 5);

    assert_eq!(history.len(), ITERATIONS + 1);
    assert!(best < history[0], "final {} not below initial {}", best, history[0]);
    assert!(bounds.contains(position.as_slice()));
}

#[test]
fn pso_improves_on_noisy_arc() {
    let mut data_rng = StdRng::seed_from_u64(2024);
    let sample = sample_arc(ARC_POINTS, 0.1, &mut data_rng).unwrap();
    let objective = PrincipalCurveObjective::new(&sample.data, 1.0).unwrap();
    let optimizer =
        ParticleSwarm::new(SwarmParameters::default().with_population_size(POPULATION)).unwrap();

    let bounds = Bounds::unit(ARC_POINTS);
    let (best, history, position) =
        run_with_history(&optimizer, &objective, &bounds, ITERATIONS, 5);

    assert_eq!(history.len(), ITERATIONS + 1);
    assert!(best < history[0], "final {} not below initial {}", best, history[0]);
    assert!(bounds.contains(position.as_slice()));
}

#[test]
fn best_score_is_monotone_for_both_backends() {
    let mut data_rng = StdRng::seed_from_u64(7);
    let sample = sample_arc(20, 0.05, &mut data_rng).unwrap();
    let objective = PrincipalCurveObjective::new(&sample.data, 1.0).unwrap();

    for kind in [BackendKind::Cuckoo, BackendKind::ParticleSwarm] {
        let optimizer = Backend::from_kind(kind, 10).unwrap();
        let (_, history, _) = run_with_history(&optimizer, &objective, &Bounds::unit(20), 15, 3);
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}: best score increased {:?}", kind, pair);
        }
    }
}

#[test]
fn positions_stay_in_bounds_for_any_iteration_count() {
    let objective = FnObjective::new(5, ackley);
    let bounds = ackley_bounds();

    for kind in [BackendKind::Cuckoo, BackendKind::ParticleSwarm] {
        let optimizer = Backend::from_kind(kind, 15).unwrap();
        for iterations in [0, 1, 5, 25] {
            let mut rng = StdRng::seed_from_u64(iterations as u64);
            let result = optimizer.optimize(&objective, &bounds, iterations, &mut rng).unwrap();
            assert!(
                bounds.contains(result.best_position.as_slice()),
                "{:?} left bounds after {} iterations",
                kind,
                iterations
            );
            assert_eq!(result.iterations, iterations);
            assert!(result.best_score.is_finite());
        }
    }
}

#[test]
fn zero_iterations_report_initial_best() {
    let objective = FnObjective::new(5, ackley);
    let bounds = ackley_bounds();

    for kind in [BackendKind::Cuckoo, BackendKind::ParticleSwarm] {
        let optimizer = Backend::from_kind(kind, 15).unwrap();
        let (best, history, position) = run_with_history(&optimizer, &objective, &bounds, 0, 11);
        assert_eq!(history, vec![best]);
        assert_eq!(ackley(position.as_slice()), best);
    }
}

#[test]
fn ackley_is_minimized_by_both_backends() {
    let objective = FnObjective::new(5, ackley);
    let bounds = ackley_bounds();

    // Ackley is zero at the origin and above 10 over most of the box
    for kind in [BackendKind::Cuckoo, BackendKind::ParticleSwarm] {
        let optimizer = Backend::from_kind(kind, 20).unwrap();
        let (best, history, _) = run_with_history(&optimizer, &objective, &bounds, 100, 17);
        assert!(best <= history[0]);
        assert!(best < 8.0, "{:?} reached only {}", kind, best);
    }
}

#[test]
fn seeded_runs_repeat_exactly() {
    let mut data_rng = StdRng::seed_from_u64(1);
    let sample = sample_arc(16, 0.1, &mut data_rng).unwrap();
    let objective = PrincipalCurveObjective::new(&sample.data, 1.0).unwrap();

    for kind in [BackendKind::Cuckoo, BackendKind::ParticleSwarm] {
        let optimizer = Backend::from_kind(kind, 8).unwrap();
        let first = run_with_history(&optimizer, &objective, &Bounds::unit(16), 10, 99);
        let second = run_with_history(&optimizer, &objective, &Bounds::unit(16), 10, 99);
        assert_eq!(first, second);
    }
}
