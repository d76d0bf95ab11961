//! Neighborhood exploration.
//!
//! A [`NeighborhoodExplorer`] defines one move type over a state: how to
//! enumerate the neighborhood exactly once (`first_move`/`next_move`), how
//! to sample it (`random_move`), how to apply a move, and how to compute
//! its delta cost. On top of that contract the trait provides the
//! selection operations used by the runners: first-accepted,
//! best-accepted (with unbiased tie-breaking), and their counterparts over
//! random samples.

mod parallel;

pub use parallel::ParallelExplorer;

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::Rng;

use localforge_core::{CostStructure, Evaluator, Move, Result, SearchError, State};

/// A move paired with its delta cost.
///
/// The cost is tentative (zero, `evaluated == false`) until a selection
/// routine invokes `delta_cost`.
#[derive(Debug, Clone)]
pub struct EvaluatedMove<M> {
    pub mv: M,
    pub cost: CostStructure,
    pub evaluated: bool,
}

impl<M> EvaluatedMove<M> {
    /// Wraps a move with a tentative zero cost.
    pub fn tentative(mv: M) -> Self {
        EvaluatedMove {
            mv,
            cost: CostStructure::zero(),
            evaluated: false,
        }
    }

    /// Wraps a move with its computed delta cost.
    pub fn evaluated(mv: M, cost: CostStructure) -> Self {
        EvaluatedMove {
            mv,
            cost,
            evaluated: true,
        }
    }
}

/// The result of a selection operation: the chosen move (if any) and the
/// number of moves explored, so runners can drive evaluation budgets.
#[derive(Debug, Clone)]
pub struct Selection<M> {
    pub chosen: Option<EvaluatedMove<M>>,
    pub explored: u64,
}

impl<M> Selection<M> {
    /// A selection that found nothing.
    pub fn empty(explored: u64) -> Self {
        Selection {
            chosen: None,
            explored,
        }
    }
}

/// Enumerates and samples the moves of one neighborhood.
///
/// The pair `(first_move, next_move*)` must visit every move exactly once
/// while the state is held constant, in the total order the implementor
/// defines; `random_move` must sample the same support.
pub trait NeighborhoodExplorer<I, S: State>: Send + Sync {
    /// The move type of this neighborhood.
    type Move: Move;

    /// Writes the first move of the neighborhood, or fails with
    /// [`SearchError::EmptyNeighborhood`].
    fn first_move(&self, input: &I, state: &S) -> Result<Self::Move>;

    /// Advances `mv` to its successor; returns `false` after the last
    /// move.
    fn next_move(&self, input: &I, state: &S, mv: &mut Self::Move) -> bool;

    /// Samples a move, or fails with [`SearchError::EmptyNeighborhood`].
    fn random_move(&self, input: &I, state: &S, rng: &mut StdRng) -> Result<Self::Move>;

    /// Applies `mv` to `state` in place.
    fn apply_move(&self, input: &I, state: &mut S, mv: &Self::Move);

    /// Whether `mv` is admissible from `state`; used to filter
    /// enumeration.
    fn is_feasible_move(&self, _input: &I, _state: &S, _mv: &Self::Move) -> bool {
        true
    }

    /// Additive cost change of applying `mv` to `state`.
    ///
    /// The default applies the move to a copy and evaluates both states in
    /// full; override it with an incremental computation where one exists.
    /// Whatever the implementation, the result must equal
    /// `cost(apply(state, mv)) - cost(state)` up to the comparison
    /// epsilon.
    fn delta_cost(
        &self,
        input: &I,
        state: &S,
        mv: &Self::Move,
        eval: &Evaluator<I, S>,
    ) -> CostStructure {
        let mut next = state.clone();
        self.apply_move(input, &mut next, mv);
        eval.delta(input, state, &next)
    }

    /// Returns the first enumerated feasible move accepted by `accept`,
    /// or an empty selection if none exists.
    fn select_first(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        mut accept: impl FnMut(&Self::Move, &CostStructure) -> bool,
    ) -> Selection<Self::Move>
    where
        Self: Sized,
    {
        let mut mv = match self.first_move(input, state) {
            Ok(mv) => mv,
            Err(_) => return Selection::empty(0),
        };
        let mut explored = 0u64;
        loop {
            if self.is_feasible_move(input, state, &mv) {
                explored += 1;
                let cost = self.delta_cost(input, state, &mv, eval);
                if accept(&mv, &cost) {
                    return Selection {
                        chosen: Some(EvaluatedMove::evaluated(mv, cost)),
                        explored,
                    };
                }
            }
            if !self.next_move(input, state, &mut mv) {
                return Selection::empty(explored);
            }
        }
    }

    /// Returns the accepted feasible move of minimum delta cost over the
    /// whole neighborhood.
    ///
    /// Ties are broken by reservoir sampling: among k tied bests each is
    /// chosen with probability 1/k, so enumeration order introduces no
    /// bias.
    fn select_best(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        rng: &mut StdRng,
        mut accept: impl FnMut(&Self::Move, &CostStructure) -> bool,
    ) -> Selection<Self::Move>
    where
        Self: Sized,
    {
        let mut mv = match self.first_move(input, state) {
            Ok(mv) => mv,
            Err(_) => return Selection::empty(0),
        };
        let mut explored = 0u64;
        let mut champion: Option<EvaluatedMove<Self::Move>> = None;
        let mut ties = 0u64;
        loop {
            if self.is_feasible_move(input, state, &mv) {
                explored += 1;
                let cost = self.delta_cost(input, state, &mv, eval);
                if accept(&mv, &cost) {
                    reservoir_consider(&mut champion, &mut ties, &mv, cost, rng);
                }
            }
            if !self.next_move(input, state, &mut mv) {
                return Selection {
                    chosen: champion,
                    explored,
                };
            }
        }
    }

    /// [`select_first`](Self::select_first) over `samples` independently
    /// drawn random moves.
    fn random_first(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        samples: u32,
        rng: &mut StdRng,
        mut accept: impl FnMut(&Self::Move, &CostStructure) -> bool,
    ) -> Selection<Self::Move>
    where
        Self: Sized,
    {
        let mut explored = 0u64;
        for _ in 0..samples {
            let mv = match self.random_move(input, state, rng) {
                Ok(mv) => mv,
                Err(_) => return Selection::empty(explored),
            };
            if !self.is_feasible_move(input, state, &mv) {
                continue;
            }
            explored += 1;
            let cost = self.delta_cost(input, state, &mv, eval);
            if accept(&mv, &cost) {
                return Selection {
                    chosen: Some(EvaluatedMove::evaluated(mv, cost)),
                    explored,
                };
            }
        }
        Selection::empty(explored)
    }

    /// [`select_best`](Self::select_best) over `samples` independently
    /// drawn random moves.
    fn random_best(
        &self,
        input: &I,
        state: &S,
        eval: &Evaluator<I, S>,
        samples: u32,
        rng: &mut StdRng,
        mut accept: impl FnMut(&Self::Move, &CostStructure) -> bool,
    ) -> Selection<Self::Move>
    where
        Self: Sized,
    {
        let mut explored = 0u64;
        let mut champion: Option<EvaluatedMove<Self::Move>> = None;
        let mut ties = 0u64;
        for _ in 0..samples {
            let mv = match self.random_move(input, state, rng) {
                Ok(mv) => mv,
                Err(_) => break,
            };
            if !self.is_feasible_move(input, state, &mv) {
                continue;
            }
            explored += 1;
            let cost = self.delta_cost(input, state, &mv, eval);
            if accept(&mv, &cost) {
                reservoir_consider(&mut champion, &mut ties, &mv, cost, rng);
            }
        }
        Selection {
            chosen: champion,
            explored,
        }
    }

    /// Counts the moves of the neighborhood by full enumeration.
    fn neighborhood_size(&self, input: &I, state: &S) -> u64
    where
        Self: Sized,
    {
        let mut mv = match self.first_move(input, state) {
            Ok(mv) => mv,
            Err(_) => return 0,
        };
        let mut count = 1u64;
        while self.next_move(input, state, &mut mv) {
            count += 1;
        }
        count
    }
}

/// One reservoir step: replaces the champion on strict improvement,
/// replaces it with probability 1/k on the k-th tie.
pub(crate) fn reservoir_consider<M: Move>(
    champion: &mut Option<EvaluatedMove<M>>,
    ties: &mut u64,
    mv: &M,
    cost: CostStructure,
    rng: &mut StdRng,
) {
    match champion {
        None => {
            *champion = Some(EvaluatedMove::evaluated(mv.clone(), cost));
            *ties = 1;
        }
        Some(best) => match cost.cmp_aggregated(&best.cost) {
            Ordering::Less => {
                *champion = Some(EvaluatedMove::evaluated(mv.clone(), cost));
                *ties = 1;
            }
            Ordering::Equal => {
                *ties += 1;
                if rng.random_range(0..*ties) == 0 {
                    *champion = Some(EvaluatedMove::evaluated(mv.clone(), cost));
                }
            }
            Ordering::Greater => {}
        },
    }
}

/// Convenience alias for an accept-everything predicate.
pub fn accept_all<M>(_mv: &M, _cost: &CostStructure) -> bool {
    true
}

/// Accept predicate for strictly improving moves.
pub fn accept_improving<M>(_mv: &M, cost: &CostStructure) -> bool {
    cost.cmp_scalar(0) == Ordering::Less
}

/// Accept predicate for non-worsening moves.
pub fn accept_non_worsening<M>(_mv: &M, cost: &CostStructure) -> bool {
    cost.cmp_scalar(0) != Ordering::Greater
}
