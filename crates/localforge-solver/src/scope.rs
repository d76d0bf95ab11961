//! Run-level scope: the mutable context a runner operates on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use localforge_core::{CostStructure, State};

use crate::event::{EventBus, EventKind, EventRecord};
use crate::interrupt::Interrupt;

/// A shared snapshot of the best state seen so far, readable while a run
/// is in progress.
pub type BestSnapshot<S> = Arc<Mutex<Option<(S, CostStructure)>>>;

/// Top-level scope for one run.
///
/// The scope owns exactly one current and one best state together with
/// their costs, the seeded RNG, the iteration bookkeeping, the cooperative
/// interrupt, and the optional event bus. Runners mutate the scope; the
/// solver creates it and harvests the best state afterwards.
pub struct SearchScope<S: State> {
    current_state: S,
    current_cost: CostStructure,
    best_state: S,
    best_cost: CostStructure,
    rng: StdRng,
    start_time: Option<Instant>,
    iteration: u64,
    evaluations: u64,
    iteration_of_best: u64,
    interrupt: Interrupt,
    events: Option<EventBus>,
    snapshot: Option<BestSnapshot<S>>,
}

impl<S: State> SearchScope<S> {
    /// Creates a scope seeded from the OS entropy source; the best state
    /// starts as a copy of the initial state.
    pub fn new(initial_state: S, initial_cost: CostStructure) -> Self {
        Self::with_rng(initial_state, initial_cost, StdRng::from_os_rng())
    }

    /// Creates a scope with a fixed seed, for reproducible runs.
    pub fn with_seed(initial_state: S, initial_cost: CostStructure, seed: u64) -> Self {
        Self::with_rng(initial_state, initial_cost, StdRng::seed_from_u64(seed))
    }

    fn with_rng(initial_state: S, initial_cost: CostStructure, rng: StdRng) -> Self {
        let best_state = initial_state.clone();
        let best_cost = initial_cost.clone();
        SearchScope {
            current_state: initial_state,
            current_cost: initial_cost,
            best_state,
            best_cost,
            rng,
            start_time: None,
            iteration: 0,
            evaluations: 0,
            iteration_of_best: 0,
            interrupt: Interrupt::new(),
            events: None,
            snapshot: None,
        }
    }

    /// Attaches an event bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Shares an externally owned interrupt handle.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Attaches a shared best-state snapshot slot.
    pub fn with_snapshot(mut self, snapshot: BestSnapshot<S>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Marks the start of the run.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Wall time since [`start`](Self::start).
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn current_state(&self) -> &S {
        &self.current_state
    }

    pub fn current_state_mut(&mut self) -> &mut S {
        &mut self.current_state
    }

    pub fn current_cost(&self) -> &CostStructure {
        &self.current_cost
    }

    pub fn best_state(&self) -> &S {
        &self.best_state
    }

    pub fn best_cost(&self) -> &CostStructure {
        &self.best_cost
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn iteration_of_best(&self) -> u64 {
        self.iteration_of_best
    }

    /// Iterations elapsed since the best state last improved.
    pub fn idle_iterations(&self) -> u64 {
        self.iteration - self.iteration_of_best
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Splits the borrow so selection can read the state while drawing
    /// random numbers.
    pub fn state_and_rng(&mut self) -> (&S, &mut StdRng) {
        (&self.current_state, &mut self.rng)
    }

    /// Splits the borrow so prohibition bookkeeping can read both costs
    /// while drawing random numbers.
    pub fn costs_and_rng(&mut self) -> (&CostStructure, &CostStructure, &mut StdRng) {
        (&self.current_cost, &self.best_cost, &mut self.rng)
    }

    /// Adds a committed move's delta to the current cost.
    pub fn apply_cost_delta(&mut self, delta: &CostStructure) {
        self.current_cost += delta;
    }

    /// Replaces the current state and cost wholesale.
    pub fn reset_current(&mut self, state: S, cost: CostStructure) {
        self.current_state = state;
        self.current_cost = cost;
    }

    pub fn record_evaluations(&mut self, explored: u64) {
        self.evaluations += explored;
    }

    pub fn advance_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Promotes the current state to best if it improves under the
    /// aggregated regime. Returns whether it did.
    pub fn update_best_if_improved(&mut self) -> bool {
        if self.current_cost.cmp_aggregated(&self.best_cost) == std::cmp::Ordering::Less {
            self.best_state = self.current_state.clone();
            self.best_cost = self.current_cost.clone();
            self.iteration_of_best = self.iteration;
            if let Some(snapshot) = &self.snapshot {
                *snapshot.lock() = Some((self.best_state.clone(), self.best_cost.clone()));
            }
            true
        } else {
            false
        }
    }

    /// Publishes an event record, if a bus is attached.
    pub fn emit(&self, kind: EventKind, cost: CostStructure, mv: Option<String>, status: String) {
        if let Some(events) = &self.events {
            events.publish(EventRecord {
                kind,
                iteration: self.iteration,
                elapsed: self.elapsed(),
                cost,
                mv,
                status,
            });
        }
    }

    /// Consumes the scope, yielding the best state and its cost.
    pub fn into_best(self) -> (S, CostStructure) {
        (self.best_state, self.best_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(total: i64) -> CostStructure {
        CostStructure::new(total, 0, total, vec![total])
    }

    #[test]
    fn best_starts_as_the_initial_state() {
        let scope = SearchScope::with_seed(vec![1u8], cost(5), 1);
        assert_eq!(scope.best_state(), &vec![1u8]);
        assert_eq!(scope.best_cost().total, 5);
    }

    #[test]
    fn best_updates_only_on_strict_improvement() {
        let mut scope = SearchScope::with_seed(vec![1u8], cost(5), 1);

        scope.reset_current(vec![2u8], cost(5));
        assert!(!scope.update_best_if_improved());
        assert_eq!(scope.best_state(), &vec![1u8]);

        scope.advance_iteration();
        scope.reset_current(vec![3u8], cost(3));
        assert!(scope.update_best_if_improved());
        assert_eq!(scope.best_state(), &vec![3u8]);
        assert_eq!(scope.iteration_of_best(), 1);
    }

    #[test]
    fn idle_iterations_track_the_gap_to_the_best() {
        let mut scope = SearchScope::with_seed(vec![0u8], cost(5), 1);
        scope.advance_iteration();
        scope.advance_iteration();
        assert_eq!(scope.idle_iterations(), 2);
    }

    #[test]
    fn snapshot_mirrors_best_updates() {
        let snapshot: BestSnapshot<Vec<u8>> = Arc::new(Mutex::new(None));
        let mut scope =
            SearchScope::with_seed(vec![1u8], cost(5), 1).with_snapshot(snapshot.clone());
        scope.reset_current(vec![9u8], cost(1));
        scope.update_best_if_improved();
        let seen = snapshot.lock().clone().unwrap();
        assert_eq!(seen.0, vec![9u8]);
        assert_eq!(seen.1.total, 1);
    }
}
