use std::time::{Duration, Instant};

use localforge_config::{ParameterSet, Parametrized};
use rand::SeedableRng;

use crate::event::{EventBus, EventKind};
use crate::explorer::{accept_improving, NeighborhoodExplorer};
use crate::scope::SearchScope;
use crate::tabu::TabuList;
use crate::test_utils::{
    flip_eval, queens_eval, BitFlip, BitSet, Board, NQueens, QueensManager, SwapMove, SwapQueens,
    FLIP_INPUT,
};

use super::*;

use localforge_core::StateManager;

fn queens_scope(n: usize, seed: u64) -> (NQueens, SearchScope<Board>) {
    let input = NQueens { n };
    let eval = queens_eval();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let state = QueensManager.random_state(&input, &mut rng);
    let cost = eval.cost_function(&input, &state);
    (input, SearchScope::with_seed(state, cost, seed))
}

fn swap_inverse(a: &SwapMove, b: &SwapMove) -> bool {
    a == b
}

#[test]
fn steepest_descent_terminates_at_a_local_minimum() {
    // Eight queens laid out on the main diagonal; descend with column
    // swaps until no improving move remains.
    let input = NQueens { n: 8 };
    let eval = queens_eval();
    let initial: Board = (0..8).collect();
    let cost = eval.cost_function(&input, &initial);
    let mut scope = SearchScope::with_seed(initial, cost, 7);

    let started = Instant::now();
    let mut runner = MoveRunner::new("descent", &SwapQueens, &eval, SteepestDescent::new());
    let outcome = runner.run(&input, &mut scope).unwrap();

    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert!(started.elapsed() <= Duration::from_millis(50));

    // Every move from the final state is non-improving.
    let (state, rng) = scope.state_and_rng();
    let residual = SwapQueens.select_best(&input, state, &eval, rng, accept_improving);
    assert!(residual.chosen.is_none());
    assert!(scope.best_cost().cmp_aggregated(scope.current_cost()) != std::cmp::Ordering::Greater);
}

#[test]
fn first_improvement_descends_as_well() {
    let (input, mut scope) = queens_scope(8, 21);
    let eval = queens_eval();
    let initial_total = scope.best_cost().total;
    let mut runner = MoveRunner::new(
        "first_improvement",
        &SwapQueens,
        &eval,
        SteepestDescent::first_improvement(),
    );
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert!(scope.best_cost().total <= initial_total);
}

#[test]
fn hill_climbing_stops_after_idle_iterations() {
    let (input, mut scope) = queens_scope(8, 5);
    let eval = queens_eval();
    let initial_total = scope.best_cost().total;
    let mut runner = MoveRunner::new("hc", &SwapQueens, &eval, HillClimbing::new()).with_params(
        RunnerParams {
            max_evaluations: None,
            max_idle_iterations: Some(500),
        },
    );
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert!(outcome.iterations >= 500 || scope.best_cost().total == 0);
    assert!(scope.best_cost().total <= initial_total);
}

#[test]
fn best_cost_is_monotone_across_new_best_events() {
    let (bus, rx) = EventBus::bounded(4096);
    let (input, scope) = queens_scope(10, 3);
    let mut scope = scope.with_events(bus);
    let eval = queens_eval();
    let mut runner = MoveRunner::new("hc", &SwapQueens, &eval, HillClimbing::new()).with_params(
        RunnerParams {
            max_evaluations: Some(2000),
            max_idle_iterations: None,
        },
    );
    runner.run(&input, &mut scope).unwrap();
    drop(runner);

    let records: Vec<_> = rx.try_iter().collect();
    assert_eq!(records.first().map(|r| r.kind), Some(EventKind::Started));
    assert_eq!(records.last().map(|r| r.kind), Some(EventKind::Ended));
    let bests: Vec<i64> = records
        .iter()
        .filter(|r| r.kind == EventKind::NewBest)
        .map(|r| r.cost.total)
        .collect();
    assert!(bests.windows(2).all(|w| w[1] < w[0]), "bests: {bests:?}");
}

#[test]
fn replaying_a_seed_reproduces_the_run() {
    let run = |seed: u64| {
        let (input, mut scope) = queens_scope(12, seed);
        let eval = queens_eval();
        let mut runner = MoveRunner::new("hc", &SwapQueens, &eval, HillClimbing::new())
            .with_params(RunnerParams {
                max_evaluations: Some(3000),
                max_idle_iterations: None,
            });
        let outcome = runner.run(&input, &mut scope).unwrap();
        (outcome.iterations, scope.into_best())
    };
    let (iters_a, (state_a, cost_a)) = run(42);
    let (iters_b, (state_b, cost_b)) = run(42);
    assert_eq!(iters_a, iters_b);
    assert_eq!(state_a, state_b);
    assert_eq!(cost_a.total, cost_b.total);
}

#[test]
fn cancellation_stops_before_the_first_iteration() {
    let (input, mut scope) = queens_scope(8, 11);
    let eval = queens_eval();
    scope.interrupt().cancel();
    let mut runner = MoveRunner::new("hc", &SwapQueens, &eval, HillClimbing::new());
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Cancelled);
    assert_eq!(outcome.iterations, 0);
}

#[test]
fn evaluation_budget_caps_the_run() {
    let (input, mut scope) = queens_scope(10, 13);
    let eval = queens_eval();
    let mut runner = MoveRunner::new("hc", &SwapQueens, &eval, HillClimbing::new()).with_params(
        RunnerParams {
            max_evaluations: Some(100),
            max_idle_iterations: None,
        },
    );
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert!(scope.evaluations() >= 100);
    assert!(scope.evaluations() <= 101);
}

#[test]
fn tabu_search_escapes_local_minima() {
    let input = NQueens { n: 8 };
    let eval = queens_eval();
    // Start from the all-conflicts diagonal layout.
    let initial: Board = (0..8).collect();
    let cost = eval.cost_function(&input, &initial);
    let mut scope = SearchScope::with_seed(initial.clone(), cost.clone(), 29);

    let policy = TabuSearch::with_tenure(2, 6, swap_inverse).unwrap();
    let mut runner =
        MoveRunner::new("ts", &SwapQueens, &eval, policy).with_params(RunnerParams {
            max_evaluations: None,
            max_idle_iterations: Some(300),
        });
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);

    // Steepest descent alone gets stuck above zero from this layout; tabu
    // search must do strictly better than the descent local minimum.
    let mut descent_scope = SearchScope::with_seed(initial, cost, 29);
    let mut descent = MoveRunner::new("sd", &SwapQueens, &eval, SteepestDescent::new());
    descent.run(&input, &mut descent_scope).unwrap();
    assert!(scope.best_cost().total <= descent_scope.best_cost().total);
    assert_eq!(scope.best_cost().total, 0);
}

#[test]
fn tabu_search_always_commits_the_selected_move() {
    // On a tiny board the search keeps moving even when everything
    // worsens: iterations advance and the tabu list stays bounded.
    let input = NQueens { n: 4 };
    let eval = queens_eval();
    let initial: Board = (0..4).collect();
    let cost = eval.cost_function(&input, &initial);
    let mut scope = SearchScope::with_seed(initial, cost, 31);

    let policy = TabuSearch::with_tenure(1, 2, swap_inverse).unwrap();
    let mut runner =
        MoveRunner::new("ts", &SwapQueens, &eval, policy).with_params(RunnerParams {
            max_evaluations: None,
            max_idle_iterations: Some(50),
        });
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert!(outcome.iterations > 0);
    assert_eq!(scope.best_cost().total, 0);
}

#[test]
fn sa_rejects_bad_cooling_rates() {
    let (input, mut scope) = queens_scope(8, 17);
    let eval = queens_eval();
    let policy = SimulatedAnnealing::with_min_temperature(10.0, 0.01, 1.5, 10, 10);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
    let err = runner.run(&input, &mut scope).unwrap_err();
    assert!(matches!(
        err,
        localforge_core::SearchError::IncorrectParameterValue { ref name, .. } if name == "cooling_rate"
    ));
}

#[test]
fn sa_rejects_nonpositive_min_temperature() {
    let (input, mut scope) = queens_scope(8, 17);
    let eval = queens_eval();
    let policy = SimulatedAnnealing::with_min_temperature(10.0, 0.0, 0.9, 10, 10);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
    assert!(runner.run(&input, &mut scope).is_err());
}

#[test]
fn sa_calibrates_start_temperature_from_probes() {
    let (input, mut scope) = queens_scope(10, 19);
    let eval = queens_eval();
    // start_temperature 0 asks for probing; after the run the resolved
    // temperature must have decayed below the start.
    let policy = SimulatedAnnealing::with_min_temperature(0.0, 0.5, 0.9, 20, 20);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    let policy = runner.policy();
    assert!(policy.temperature() <= 0.5 || scope.best_cost().total == 0);
}

#[test]
fn evaluation_based_sa_is_governed_by_the_evaluation_budget() {
    let (input, mut scope) = queens_scope(10, 23);
    let eval = queens_eval();
    let policy = SimulatedAnnealing::evaluation_based(5.0, 0.9, 100.0);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy).with_params(RunnerParams {
        max_evaluations: Some(2000),
        max_idle_iterations: None,
    });
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert!(scope.evaluations() >= 2000 || scope.best_cost().total == 0);
}

#[test]
fn evaluation_based_sa_requires_the_budget() {
    let (input, mut scope) = queens_scope(8, 23);
    let eval = queens_eval();
    let policy = SimulatedAnnealing::evaluation_based(5.0, 0.9, 100.0);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
    assert!(matches!(
        runner.run(&input, &mut scope),
        Err(localforge_core::SearchError::ParameterNotSet(_))
    ));
}

#[test]
fn time_based_sa_stops_when_the_time_is_up() {
    let (input, mut scope) = queens_scope(10, 27);
    let eval = queens_eval();
    let policy =
        SimulatedAnnealing::time_based(5.0, 0.9, Duration::from_millis(50), 100.0);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
    let started = Instant::now();
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn reheating_sa_runs_multiple_rounds() {
    let (input, mut scope) = queens_scope(8, 33);
    let eval = queens_eval();
    let policy = SimulatedAnnealing::with_reheating(4.0, 0.5, 0.5, 5, 5, 0.5, 2);
    let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
    let outcome = runner.run(&input, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    // Three descents from 4.0 to 0.5 at rate 0.5 take 3 steps each; with
    // two reheats the run sees strictly more temperature steps than one.
    assert!(runner.policy().temperatures_count() >= 3 || scope.best_cost().total == 0);
}

#[test]
fn runner_parameters_bind_by_name() {
    let eval = queens_eval();
    let policy = SimulatedAnnealing::with_min_temperature(10.0, 0.01, 0.95, 10, 10);
    let mut runner = MoveRunner::new("runner", &SwapQueens, &eval, policy);
    let params = ParameterSet::from_toml_str(
        r#"
        [runner]
        max_evaluations = 5000
        max_idle_iterations = 100

        [simulated_annealing]
        cooling_rate = 0.9
        neighbors_sampled = 250
        "#,
    )
    .unwrap();
    runner.apply_parameters(&params).unwrap();
    assert_eq!(runner.params().max_evaluations, Some(5000));
    assert_eq!(runner.params().max_idle_iterations, Some(100));
}

#[test]
fn bimodal_hill_climbing_improves_over_both_neighborhoods() {
    let eval = flip_eval();
    let initial = vec![1u8, 1, 1, 1, 0, 1];
    let cost = eval.cost_function(&FLIP_INPUT, &initial);
    let mut scope = SearchScope::with_seed(initial, cost, 37);
    let mut runner = BimodalHillClimbing::new("bhc", &BitFlip, &BitSet, &eval).with_params(
        RunnerParams {
            max_evaluations: None,
            max_idle_iterations: Some(200),
        },
    );
    let outcome = runner.run(&FLIP_INPUT, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert_eq!(scope.best_cost().total, 0);
}

#[test]
fn bimodal_tabu_search_reaches_the_lower_bound() {
    let eval = flip_eval();
    let initial = vec![1u8, 0, 1, 0, 1];
    let cost = eval.cost_function(&FLIP_INPUT, &initial);
    let mut scope = SearchScope::with_seed(initial, cost, 39);
    let tabu_first = TabuList::new(1, 3, |a: &crate::test_utils::FlipMove, b| a == b).unwrap();
    let tabu_second = TabuList::new(1, 3, |a: &crate::test_utils::SetMove, b| a == b).unwrap();
    let mut runner =
        BimodalTabuSearch::new("bts", &BitFlip, &BitSet, &eval, tabu_first, tabu_second)
            .with_params(RunnerParams {
                max_evaluations: None,
                max_idle_iterations: Some(100),
            });
    let outcome = runner.run(&FLIP_INPUT, &mut scope).unwrap();
    assert_eq!(outcome.status, RunnerStatus::Stopped);
    assert_eq!(scope.best_cost().total, 0);
}

#[test]
fn stopped_cost_structure_matches_a_full_reevaluation() {
    // Incremental cost accumulation along the run must agree with a
    // from-scratch evaluation of the final state.
    let (input, mut scope) = queens_scope(10, 43);
    let eval = queens_eval();
    let mut runner = MoveRunner::new("hc", &SwapQueens, &eval, HillClimbing::new()).with_params(
        RunnerParams {
            max_evaluations: Some(1000),
            max_idle_iterations: None,
        },
    );
    runner.run(&input, &mut scope).unwrap();
    let recomputed = eval.cost_function(&input, scope.current_state());
    assert_eq!(scope.current_cost().total, recomputed.total);
    assert_eq!(scope.current_cost().components, recomputed.components);
}
