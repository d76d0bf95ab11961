//! Solver drivers: initial-state generation, timeouts, composition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use localforge_core::{
    CostStructure, Evaluator, OutputManager, Result, SearchError, State, StateManager,
};
use localforge_config::{ParameterKind, ParameterSet, ParameterSpec, Parametrized};

use crate::event::EventBus;
use crate::interrupt::Interrupt;
use crate::runner::{RunOutcome, Runner, RunnerStatus};
use crate::scope::{BestSnapshot, SearchScope};

/// The product of a finished solve.
#[derive(Debug, Clone)]
pub struct SolverResult<O> {
    pub solution: O,
    pub cost: CostStructure,
    pub wall_time: Duration,
    pub status: RunnerStatus,
}

/// Runs a runner under a wall-clock deadline.
///
/// The runner executes on a scoped worker thread while this thread waits
/// on a completion channel; when the deadline elapses first, the shared
/// interrupt is marked timed out and the runner stops at its next
/// iteration boundary, so no partially applied move can ever be observed.
pub fn run_with_timeout<I, S, R>(
    runner: &mut R,
    input: &I,
    scope: &mut SearchScope<S>,
    timeout: Duration,
) -> Result<RunOutcome>
where
    I: Sync,
    S: State,
    R: Runner<I, S> + ?Sized,
{
    let interrupt = scope.interrupt().clone();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    std::thread::scope(|threads| {
        let worker = threads.spawn(move || {
            let outcome = runner.run(input, scope);
            let _ = done_tx.send(());
            outcome
        });
        if done_rx.recv_timeout(timeout).is_err() {
            interrupt.time_out();
        }
        match worker.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

/// Drives one runner on one problem instance.
///
/// The solver owns initial-state generation (`init_trials` random draws or
/// the greedy constructor), the optional timeout, and the conversion of
/// the best state into the output representation.
pub struct LocalSearchSolver<'a, I, S, SM, OM>
where
    S: State,
    SM: StateManager<I, S>,
    OM: OutputManager<I, S>,
{
    state_manager: &'a SM,
    output_manager: &'a OM,
    eval: &'a Evaluator<I, S>,
    init_trials: u32,
    random_initial_state: bool,
    timeout: Option<Duration>,
    seed: Option<u64>,
    events: Option<EventBus>,
    interrupt: Interrupt,
    snapshot: BestSnapshot<S>,
    is_running: Arc<AtomicBool>,
}

impl<'a, I, S, SM, OM> LocalSearchSolver<'a, I, S, SM, OM>
where
    I: Sync,
    S: State,
    SM: StateManager<I, S>,
    OM: OutputManager<I, S>,
{
    pub fn new(state_manager: &'a SM, output_manager: &'a OM, eval: &'a Evaluator<I, S>) -> Self {
        LocalSearchSolver {
            state_manager,
            output_manager,
            eval,
            init_trials: 1,
            random_initial_state: true,
            timeout: None,
            seed: None,
            events: None,
            interrupt: Interrupt::new(),
            snapshot: Arc::new(Mutex::new(None)),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of random states drawn when picking the initial state.
    pub fn with_init_trials(mut self, init_trials: u32) -> Self {
        self.init_trials = init_trials;
        self
    }

    /// Starts from `greedy_state` instead of random sampling.
    pub fn with_greedy_start(mut self) -> Self {
        self.random_initial_state = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Handle for cancelling a solve in progress.
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Whether a solve is currently in progress.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Snapshot of the best solution found so far, valid mid-run.
    pub fn current_solution(&self, input: &I) -> Option<(OM::Output, CostStructure)> {
        let guard = self.snapshot.lock();
        guard
            .as_ref()
            .map(|(state, cost)| (self.output_manager.state_to_output(input, state), cost.clone()))
    }

    fn find_initial_state(&self, input: &I, rng: &mut StdRng) -> Result<(S, CostStructure)> {
        if self.random_initial_state {
            self.eval
                .sample_state(self.state_manager, input, self.init_trials, rng)
        } else {
            let state = self.state_manager.greedy_state(input)?;
            let cost = self.eval.cost_function(input, &state);
            Ok((state, cost))
        }
    }

    fn drive<R>(
        &mut self,
        input: &I,
        runner: &mut R,
        initial: (S, CostStructure),
        started: Instant,
    ) -> Result<SolverResult<OM::Output>>
    where
        R: Runner<I, S> + ?Sized,
    {
        let (state, cost) = initial;
        debug_assert!(
            self.state_manager.check_consistency(input, &state),
            "initial state failed its consistency check"
        );

        *self.snapshot.lock() = Some((state.clone(), cost.clone()));
        let mut seed_rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut scope = SearchScope::with_seed(state, cost, seed_rng.random())
            .with_interrupt(self.interrupt.clone())
            .with_snapshot(self.snapshot.clone());
        if let Some(events) = &self.events {
            scope = scope.with_events(events.clone());
        }

        self.is_running.store(true, Ordering::SeqCst);
        let outcome = match self.timeout {
            Some(timeout) => run_with_timeout(runner, input, &mut scope, timeout),
            None => runner.run(input, &mut scope),
        };
        self.is_running.store(false, Ordering::SeqCst);
        let outcome = outcome?;

        let (best_state, best_cost) = scope.into_best();
        debug_assert!(
            self.state_manager.check_consistency(input, &best_state),
            "best state failed its consistency check"
        );
        Ok(SolverResult {
            solution: self.output_manager.state_to_output(input, &best_state),
            cost: best_cost,
            wall_time: started.elapsed(),
            status: outcome.status,
        })
    }

    /// Generates an initial state and runs `runner` to completion.
    pub fn solve<R>(&mut self, input: &I, runner: &mut R) -> Result<SolverResult<OM::Output>>
    where
        R: Runner<I, S> + ?Sized,
    {
        let started = Instant::now();
        self.interrupt.reset();
        if self.init_trials == 0 {
            return Err(SearchError::incorrect_parameter(
                "solver.init_trials",
                "must be at least 1",
            ));
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };
        let initial = self.find_initial_state(input, &mut rng)?;
        self.drive(input, runner, initial, started)
    }

    /// Like [`solve`](Self::solve), but warm-starts from a previous
    /// solution.
    pub fn resolve<R>(
        &mut self,
        input: &I,
        initial_solution: &OM::Output,
        runner: &mut R,
    ) -> Result<SolverResult<OM::Output>>
    where
        R: Runner<I, S> + ?Sized,
    {
        let started = Instant::now();
        self.interrupt.reset();
        let state = self.output_manager.output_to_state(input, initial_solution);
        let cost = self.eval.cost_function(input, &state);
        self.drive(input, runner, (state, cost), started)
    }
}

impl<'a, I, S, SM, OM> Parametrized for LocalSearchSolver<'a, I, S, SM, OM>
where
    S: State,
    SM: StateManager<I, S>,
    OM: OutputManager<I, S>,
{
    fn component_name(&self) -> &str {
        "solver"
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new(
                "init_trials",
                "Random states sampled for the initial state",
                ParameterKind::UInt,
            ),
            ParameterSpec::new(
                "random_initial_state",
                "Sample the initial state instead of building it greedily",
                ParameterKind::Bool,
            ),
            ParameterSpec::new(
                "timeout",
                "Wall-clock budget in seconds (absent means none)",
                ParameterKind::Seconds,
            ),
        ]
    }

    fn apply_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(v) = params.get_u64("solver", "init_trials")? {
            self.init_trials = v.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(v) = params.get_bool("solver", "random_initial_state")? {
            self.random_initial_state = v;
        }
        if let Some(v) = params.get_seconds("solver", "timeout")? {
            self.timeout = Some(v);
        }
        Ok(())
    }
}

/// How a [`MultiRunnerSolver`] schedules its runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerComposition {
    /// Token ring: runners take turns on the best state until a full
    /// round brings no improvement.
    Sequential,
    /// All runners race on their own copy of the initial state; the
    /// first to reach the lower bound cancels the rest.
    Parallel,
}

/// The product of a multi-runner solve.
#[derive(Debug, Clone)]
pub struct MultiRunOutcome<S> {
    pub best_state: S,
    pub best_cost: CostStructure,
    pub status: RunnerStatus,
}

/// Composes several runners over one instance.
pub struct MultiRunnerSolver {
    composition: RunnerComposition,
    max_idle_rounds: u32,
    seed: Option<u64>,
    interrupt: Interrupt,
}

impl MultiRunnerSolver {
    pub fn sequential() -> Self {
        MultiRunnerSolver {
            composition: RunnerComposition::Sequential,
            max_idle_rounds: 1,
            seed: None,
            interrupt: Interrupt::new(),
        }
    }

    pub fn parallel() -> Self {
        MultiRunnerSolver {
            composition: RunnerComposition::Parallel,
            max_idle_rounds: 1,
            seed: None,
            interrupt: Interrupt::new(),
        }
    }

    /// Sequential mode: stop after this many consecutive rounds without
    /// improvement.
    pub fn with_max_idle_rounds(mut self, rounds: u32) -> Self {
        self.max_idle_rounds = rounds.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Runs the composition starting from `initial`, threading best-state
    /// updates between runners.
    pub fn solve<I, S>(
        &mut self,
        input: &I,
        eval: &Evaluator<I, S>,
        runners: &mut [&mut dyn Runner<I, S>],
        initial: S,
    ) -> Result<MultiRunOutcome<S>>
    where
        I: Sync,
        S: State,
    {
        if runners.is_empty() {
            return Err(SearchError::incorrect_parameter(
                "runners",
                "at least one runner is required",
            ));
        }
        self.interrupt.reset();
        let initial_cost = eval.cost_function(input, &initial);
        match self.composition {
            RunnerComposition::Sequential => {
                self.solve_sequential(input, eval, runners, initial, initial_cost)
            }
            RunnerComposition::Parallel => {
                self.solve_parallel(input, eval, runners, initial, initial_cost)
            }
        }
    }

    fn next_seed(&self, rng: &mut StdRng) -> u64 {
        rng.random()
    }

    fn solve_sequential<I, S>(
        &mut self,
        input: &I,
        eval: &Evaluator<I, S>,
        runners: &mut [&mut dyn Runner<I, S>],
        initial: S,
        initial_cost: CostStructure,
    ) -> Result<MultiRunOutcome<S>>
    where
        I: Sync,
        S: State,
    {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut best_state = initial;
        let mut best_cost = initial_cost;
        let mut status = RunnerStatus::Stopped;
        let mut idle_rounds = 0u32;

        'rounds: while idle_rounds < self.max_idle_rounds {
            let mut improved = false;
            for runner in runners.iter_mut() {
                let seed = self.next_seed(&mut rng);
                let mut scope = SearchScope::with_seed(best_state.clone(), best_cost.clone(), seed)
                    .with_interrupt(self.interrupt.clone());
                let outcome = runner.run(input, &mut scope)?;
                let (state, cost) = scope.into_best();
                if cost.cmp_aggregated(&best_cost) == std::cmp::Ordering::Less {
                    best_state = state;
                    best_cost = cost;
                    improved = true;
                }
                status = outcome.status;
                if matches!(
                    outcome.status,
                    RunnerStatus::Cancelled | RunnerStatus::TimedOut
                ) {
                    break 'rounds;
                }
                if eval.lower_bound_reached(&best_cost) {
                    status = RunnerStatus::Stopped;
                    break 'rounds;
                }
            }
            if improved {
                idle_rounds = 0;
            } else {
                idle_rounds += 1;
            }
        }

        Ok(MultiRunOutcome {
            best_state,
            best_cost,
            status,
        })
    }

    fn solve_parallel<I, S>(
        &mut self,
        input: &I,
        eval: &Evaluator<I, S>,
        runners: &mut [&mut dyn Runner<I, S>],
        initial: S,
        initial_cost: CostStructure,
    ) -> Result<MultiRunOutcome<S>>
    where
        I: Sync,
        S: State,
    {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let interrupt = &self.interrupt;
        let scopes: Vec<SearchScope<S>> = runners
            .iter()
            .map(|_| {
                SearchScope::with_seed(initial.clone(), initial_cost.clone(), rng.random())
                    .with_interrupt(interrupt.clone())
            })
            .collect();

        let results: Vec<Result<(S, CostStructure, RunnerStatus)>> =
            std::thread::scope(|threads| {
                let handles: Vec<_> = runners
                    .iter_mut()
                    .zip(scopes)
                    .map(|(runner, mut scope)| {
                        threads.spawn(move || {
                            let outcome = runner.run(input, &mut scope)?;
                            let (state, cost) = scope.into_best();
                            // Stop the others once the lower bound is hit.
                            if eval.lower_bound_reached(&cost) {
                                interrupt.cancel();
                            }
                            Ok((state, cost, outcome.status))
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect()
            });

        let mut best: Option<MultiRunOutcome<S>> = None;
        for result in results {
            let (state, cost, status) = result?;
            let better = match &best {
                None => true,
                Some(current) => {
                    cost.cmp_aggregated(&current.best_cost) == std::cmp::Ordering::Less
                }
            };
            if better {
                best = Some(MultiRunOutcome {
                    best_state: state,
                    best_cost: cost,
                    status,
                });
            }
        }
        Ok(best.expect("at least one runner result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localforge_core::IdentityOutput;

    use crate::runner::{
        HillClimbing, MoveRunner, RunnerParams, SimulatedAnnealing, SteepestDescent,
    };
    use crate::test_utils::{queens_eval, Board, NQueens, QueensManager, SwapQueens};

    fn hill_climbing_runner<'a>(
        eval: &'a Evaluator<NQueens, Board>,
        max_idle: u64,
    ) -> MoveRunner<'a, NQueens, Board, SwapQueens, HillClimbing> {
        MoveRunner::new("hc", &SwapQueens, eval, HillClimbing::new()).with_params(RunnerParams {
            max_evaluations: None,
            max_idle_iterations: Some(max_idle),
        })
    }

    #[test]
    fn solve_samples_an_initial_state_and_improves_it() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut solver = LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval)
            .with_init_trials(8)
            .with_seed(1);
        let mut runner = hill_climbing_runner(&eval, 400);
        let result = solver.solve(&input, &mut runner).unwrap();
        assert!(QueensManager.check_consistency(&input, &result.solution));
        assert_eq!(
            result.cost.total,
            eval.cost_function(&input, &result.solution).total
        );
    }

    #[test]
    fn simulated_annealing_reaches_the_optimum() {
        // N = 50, seeded: classic geometric annealing down to T = 0.01
        // must land on a conflict-free board well within the time budget.
        let input = NQueens { n: 50 };
        let eval = queens_eval();
        let mut solver =
            LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval).with_seed(42);
        let policy = SimulatedAnnealing::with_min_temperature(10.0, 0.01, 0.95, 500, 100);
        let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
        let result = solver.solve(&input, &mut runner).unwrap();
        assert_eq!(result.cost.total, 0, "final cost {}", result.cost);
        assert!(result.wall_time < Duration::from_secs(5));
    }

    #[test]
    fn timeout_preserves_the_best_state() {
        let input = NQueens { n: 50 };
        let eval = queens_eval();
        let mut solver = LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval)
            .with_seed(42)
            .with_timeout(Duration::from_millis(50));
        let policy = SimulatedAnnealing::with_min_temperature(10.0, 0.01, 0.95, 500, 100);
        let mut runner = MoveRunner::new("sa", &SwapQueens, &eval, policy);
        let started = Instant::now();
        let result = solver.solve(&input, &mut runner).unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(result.status, RunnerStatus::TimedOut);
        // The reported state is intact and matches the reported cost.
        assert!(QueensManager.check_consistency(&input, &result.solution));
        assert_eq!(
            result.cost.total,
            eval.cost_function(&input, &result.solution).total
        );
    }

    #[test]
    fn resolve_warm_starts_from_a_prior_solution() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut solver =
            LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval).with_seed(3);
        let prior: Board = (0..8).collect();
        let prior_cost = eval.cost_function(&input, &prior).total;
        let mut runner = MoveRunner::new("sd", &SwapQueens, &eval, SteepestDescent::new());
        let result = solver.resolve(&input, &prior, &mut runner).unwrap();
        assert!(result.cost.total < prior_cost);
    }

    #[test]
    fn greedy_start_requires_an_implementation() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut solver = LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval)
            .with_greedy_start()
            .with_seed(5);
        let mut runner = hill_climbing_runner(&eval, 10);
        assert!(matches!(
            solver.solve(&input, &mut runner),
            Err(SearchError::NotImplemented("greedy_state"))
        ));
    }

    #[test]
    fn zero_init_trials_is_rejected() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut solver = LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval)
            .with_init_trials(0)
            .with_seed(5);
        let mut runner = hill_climbing_runner(&eval, 10);
        assert!(matches!(
            solver.solve(&input, &mut runner),
            Err(SearchError::IncorrectParameterValue { .. })
        ));
    }

    #[test]
    fn snapshot_is_available_after_the_run() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut solver =
            LocalSearchSolver::new(&QueensManager, &IdentityOutput, &eval).with_seed(7);
        let mut runner = hill_climbing_runner(&eval, 200);
        let result = solver.solve(&input, &mut runner).unwrap();
        let (snapshot_state, snapshot_cost) = solver.current_solution(&input).unwrap();
        assert_eq!(snapshot_state, result.solution);
        assert_eq!(snapshot_cost.total, result.cost.total);
        assert!(!solver.is_running());
    }

    #[test]
    fn sequential_composition_threads_the_best_state() {
        let input = NQueens { n: 10 };
        let eval = queens_eval();
        let mut rng = StdRng::seed_from_u64(11);
        let initial = QueensManager.random_state(&input, &mut rng);
        let initial_cost = eval.cost_function(&input, &initial).total;

        let mut descent = MoveRunner::new("sd", &SwapQueens, &eval, SteepestDescent::new());
        let mut climber = hill_climbing_runner(&eval, 300);
        let mut runners: Vec<&mut dyn Runner<NQueens, Board>> = vec![&mut descent, &mut climber];

        let mut solver = MultiRunnerSolver::sequential().with_seed(11);
        let outcome = solver.solve(&input, &eval, &mut runners, initial).unwrap();
        assert!(outcome.best_cost.total <= initial_cost);
        assert_eq!(
            outcome.best_cost.total,
            eval.cost_function(&input, &outcome.best_state).total
        );
    }

    #[test]
    fn parallel_composition_returns_the_best_of_all_runners() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut rng = StdRng::seed_from_u64(13);
        let initial = QueensManager.random_state(&input, &mut rng);
        let initial_cost = eval.cost_function(&input, &initial).total;

        let mut first = hill_climbing_runner(&eval, 300);
        let mut second = hill_climbing_runner(&eval, 300);
        let mut runners: Vec<&mut dyn Runner<NQueens, Board>> = vec![&mut first, &mut second];

        let mut solver = MultiRunnerSolver::parallel().with_seed(13);
        let outcome = solver.solve(&input, &eval, &mut runners, initial).unwrap();
        assert!(outcome.best_cost.total <= initial_cost);
    }

    #[test]
    fn empty_runner_list_is_rejected() {
        let input = NQueens { n: 8 };
        let eval = queens_eval();
        let mut runners: Vec<&mut dyn Runner<NQueens, Board>> = Vec::new();
        let mut solver = MultiRunnerSolver::sequential();
        assert!(solver
            .solve(&input, &eval, &mut runners, (0..8).collect::<Board>())
            .is_err());
    }
}
