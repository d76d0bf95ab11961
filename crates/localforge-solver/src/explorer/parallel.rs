//! Parallel neighborhood exploration.
//!
//! Opt-in wrapper that evaluates delta costs over a work-stealing thread
//! pool. The only shared mutable state is the per-selection reservoir,
//! guarded by a short mutex, and the atomic evaluation counter; the state
//! and input are borrowed immutably by every worker, so delta-cost
//! computations must be pure with respect to both.
//!
//! Parallel selection keeps the sequential semantics — the iteration
//! commits atomically to a single winner, and ties still break with
//! probability 1/k — but enumeration order across workers is unspecified,
//! so parallel runs are not replay-deterministic.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

use localforge_core::{CostStructure, Evaluator, State};

use super::{EvaluatedMove, NeighborhoodExplorer, Selection};

/// Evaluates selections of a base explorer in parallel.
pub struct ParallelExplorer<'a, E> {
    base: &'a E,
}

impl<'a, E> ParallelExplorer<'a, E> {
    pub fn new(base: &'a E) -> Self {
        ParallelExplorer { base }
    }

    /// The wrapped explorer.
    pub fn base(&self) -> &E {
        self.base
    }
}

impl<'a, E> ParallelExplorer<'a, E> {
    fn enumerate_moves<I, S>(&self, input: &I, state: &S) -> Vec<E::Move>
    where
        S: State,
        E: NeighborhoodExplorer<I, S>,
    {
        let mut moves = Vec::new();
        let Ok(mut mv) = self.base.first_move(input, state) else {
            return moves;
        };
        loop {
            moves.push(mv.clone());
            if !self.base.next_move(input, state, &mut mv) {
                break;
            }
        }
        moves
    }

    fn best_over<I, S>(
        &self,
        moves: Vec<E::Move>,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        accept: impl Fn(&E::Move, &CostStructure) -> bool + Sync,
    ) -> Selection<E::Move>
    where
        I: Sync,
        S: State + Sync,
        E: NeighborhoodExplorer<I, S>,
        E::Move: Sync,
    {
        let explored = AtomicU64::new(0);
        let reservoir: Mutex<(Option<EvaluatedMove<E::Move>>, u64)> = Mutex::new((None, 0));

        moves.par_iter().for_each(|mv| {
            if !self.base.is_feasible_move(input, state, mv) {
                return;
            }
            explored.fetch_add(1, Ordering::Relaxed);
            let cost = self.base.delta_cost(input, state, mv, eval);
            if !accept(mv, &cost) {
                return;
            }
            let mut guard = reservoir.lock();
            let (champion, ties) = &mut *guard;
            let replace = match champion {
                None => {
                    *ties = 1;
                    true
                }
                Some(best) => match cost.cmp_aggregated(&best.cost) {
                    CmpOrdering::Less => {
                        *ties = 1;
                        true
                    }
                    CmpOrdering::Equal => {
                        *ties += 1;
                        rand::rng().random_range(0..*ties) == 0
                    }
                    CmpOrdering::Greater => false,
                },
            };
            if replace {
                *champion = Some(EvaluatedMove::evaluated(mv.clone(), cost));
            }
        });

        Selection {
            chosen: reservoir.into_inner().0,
            explored: explored.into_inner(),
        }
    }

    fn first_over<I, S>(
        &self,
        moves: Vec<E::Move>,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        accept: impl Fn(&E::Move, &CostStructure) -> bool + Sync,
    ) -> Selection<E::Move>
    where
        I: Sync,
        S: State + Sync,
        E: NeighborhoodExplorer<I, S>,
        E::Move: Sync,
    {
        let explored = AtomicU64::new(0);
        let found = moves.par_iter().find_map_any(|mv| {
            if !self.base.is_feasible_move(input, state, mv) {
                return None;
            }
            explored.fetch_add(1, Ordering::Relaxed);
            let cost = self.base.delta_cost(input, state, mv, eval);
            if accept(mv, &cost) {
                Some(EvaluatedMove::evaluated(mv.clone(), cost))
            } else {
                None
            }
        });
        Selection {
            chosen: found,
            explored: explored.into_inner(),
        }
    }

    /// Parallel counterpart of
    /// [`NeighborhoodExplorer::select_best`]: evaluates the whole
    /// enumeration over the thread pool.
    pub fn select_best<I, S>(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        accept: impl Fn(&E::Move, &CostStructure) -> bool + Sync,
    ) -> Selection<E::Move>
    where
        I: Sync,
        S: State + Sync,
        E: NeighborhoodExplorer<I, S>,
        E::Move: Sync,
    {
        let moves = self.enumerate_moves(input, state);
        self.best_over(moves, input, state, eval, accept)
    }

    /// Parallel counterpart of [`NeighborhoodExplorer::select_first`]:
    /// returns some accepted move; which of several accepted moves wins is
    /// unspecified.
    pub fn select_first<I, S>(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        accept: impl Fn(&E::Move, &CostStructure) -> bool + Sync,
    ) -> Selection<E::Move>
    where
        I: Sync,
        S: State + Sync,
        E: NeighborhoodExplorer<I, S>,
        E::Move: Sync,
    {
        let moves = self.enumerate_moves(input, state);
        self.first_over(moves, input, state, eval, accept)
    }

    /// Parallel counterpart of [`NeighborhoodExplorer::random_best`]:
    /// draws the sample sequentially with the caller's RNG, evaluates in
    /// parallel.
    pub fn random_best<I, S>(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        samples: u32,
        rng: &mut StdRng,
        accept: impl Fn(&E::Move, &CostStructure) -> bool + Sync,
    ) -> Selection<E::Move>
    where
        I: Sync,
        S: State + Sync,
        E: NeighborhoodExplorer<I, S>,
        E::Move: Sync,
    {
        let mut moves = Vec::with_capacity(samples as usize);
        for _ in 0..samples {
            match self.base.random_move(input, state, rng) {
                Ok(mv) => moves.push(mv),
                Err(_) => break,
            }
        }
        self.best_over(moves, input, state, eval, accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::accept_all;
    use crate::test_utils::{flip_eval, BitFlip, FLIP_INPUT};
    use rand::SeedableRng;

    #[test]
    fn parallel_best_matches_sequential_best_cost() {
        let explorer = BitFlip;
        let eval = flip_eval();
        let state = vec![0u8, 1, 1, 0, 1];
        let parallel = ParallelExplorer::new(&explorer);
        let selection = parallel.select_best(&FLIP_INPUT, &state, &eval, accept_all);
        let chosen = selection.chosen.unwrap();
        assert_eq!(chosen.cost.cmp_scalar(-1), std::cmp::Ordering::Equal);
        assert_eq!(selection.explored, 5);
    }

    #[test]
    fn parallel_first_finds_an_accepted_move() {
        let explorer = BitFlip;
        let eval = flip_eval();
        let state = vec![1u8, 0, 1];
        let parallel = ParallelExplorer::new(&explorer);
        let selection = parallel.select_first(&FLIP_INPUT, &state, &eval, |_, cost| {
            cost.cmp_scalar(0) == std::cmp::Ordering::Less
        });
        let chosen = selection.chosen.unwrap();
        assert_eq!(chosen.cost.cmp_scalar(-1), std::cmp::Ordering::Equal);
        assert!(state[chosen.mv.index] == 1);
    }

    #[test]
    fn parallel_empty_neighborhood_selects_nothing() {
        let explorer = BitFlip;
        let eval = flip_eval();
        let state: Vec<u8> = vec![];
        let parallel = ParallelExplorer::new(&explorer);
        let selection = parallel.select_best(&FLIP_INPUT, &state, &eval, accept_all);
        assert!(selection.chosen.is_none());
        assert_eq!(selection.explored, 0);
    }

    #[test]
    fn parallel_random_best_uses_the_callers_rng_for_sampling() {
        let explorer = BitFlip;
        let eval = flip_eval();
        let state = vec![1u8, 1, 0, 0];
        let parallel = ParallelExplorer::new(&explorer);
        let mut rng = StdRng::seed_from_u64(11);
        let selection =
            parallel.random_best(&FLIP_INPUT, &state, &eval, 32, &mut rng, accept_all);
        assert_eq!(selection.explored, 32);
        assert_eq!(
            selection.chosen.unwrap().cost.cmp_scalar(-1),
            std::cmp::Ordering::Equal
        );
    }
}
