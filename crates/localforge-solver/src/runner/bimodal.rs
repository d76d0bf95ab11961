//! Bimodal runners: two independent explorers driven side by side.

use std::cmp::Ordering;

use rand::Rng;

use localforge_core::{Evaluator, Result, State};

use crate::event::EventKind;
use crate::explorer::{accept_all, EvaluatedMove, NeighborhoodExplorer};
use crate::scope::SearchScope;
use crate::tabu::TabuList;

use super::{interruption_status, RunOutcome, Runner, RunnerParams, RunnerStatus};

/// A move drawn from one of two neighborhoods.
#[derive(Debug, Clone, PartialEq)]
pub enum EitherMove<M1, M2> {
    First(M1),
    Second(M2),
}

/// Picks the better of two selections, breaking ties at random.
fn pick_better<M1, M2>(
    first: Option<EvaluatedMove<M1>>,
    second: Option<EvaluatedMove<M2>>,
    rng: &mut rand::rngs::StdRng,
) -> Option<(EitherMove<M1, M2>, localforge_core::CostStructure)> {
    match (first, second) {
        (None, None) => None,
        (Some(a), None) => Some((EitherMove::First(a.mv), a.cost)),
        (None, Some(b)) => Some((EitherMove::Second(b.mv), b.cost)),
        (Some(a), Some(b)) => match a.cost.cmp_aggregated(&b.cost) {
            Ordering::Less => Some((EitherMove::First(a.mv), a.cost)),
            Ordering::Greater => Some((EitherMove::Second(b.mv), b.cost)),
            Ordering::Equal => {
                if rng.random_bool(0.5) {
                    Some((EitherMove::First(a.mv), a.cost))
                } else {
                    Some((EitherMove::Second(b.mv), b.cost))
                }
            }
        },
    }
}

/// Hill climbing over two neighborhoods at once.
///
/// Each iteration samples one random move per explorer, keeps the better
/// of the two, and accepts it when it does not worsen the current cost.
pub struct BimodalHillClimbing<'a, I, S: State, E1, E2> {
    name: String,
    first: &'a E1,
    second: &'a E2,
    eval: &'a Evaluator<I, S>,
    params: RunnerParams,
}

impl<'a, I, S: State, E1, E2> BimodalHillClimbing<'a, I, S, E1, E2> {
    pub fn new(
        name: impl Into<String>,
        first: &'a E1,
        second: &'a E2,
        eval: &'a Evaluator<I, S>,
    ) -> Self {
        BimodalHillClimbing {
            name: name.into(),
            first,
            second,
            eval,
            params: RunnerParams::default(),
        }
    }

    pub fn with_params(mut self, params: RunnerParams) -> Self {
        self.params = params;
        self
    }
}

impl<'a, I, S, E1, E2> Runner<I, S> for BimodalHillClimbing<'a, I, S, E1, E2>
where
    S: State,
    E1: NeighborhoodExplorer<I, S>,
    E2: NeighborhoodExplorer<I, S>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, input: &I, scope: &mut SearchScope<S>) -> Result<RunOutcome> {
        scope.start();
        scope.emit(
            EventKind::Started,
            scope.current_cost().clone(),
            None,
            String::new(),
        );
        let start_evaluations = scope.evaluations();
        let start_iteration = scope.iteration();

        let status = loop {
            if let Some(interrupted) = interruption_status(scope) {
                break interrupted;
            }
            if self.eval.lower_bound_reached(scope.best_cost()) {
                break RunnerStatus::Stopped;
            }
            if self
                .params
                .exhausted(scope.evaluations(), scope.idle_iterations())
            {
                break RunnerStatus::Stopped;
            }

            let (sel1, sel2) = {
                let (state, rng) = scope.state_and_rng();
                let sel1 = self.first.random_first(input, state, self.eval, 1, rng, accept_all);
                let sel2 = self
                    .second
                    .random_first(input, state, self.eval, 1, rng, accept_all);
                (sel1, sel2)
            };
            scope.record_evaluations(sel1.explored + sel2.explored);

            let Some((chosen, cost)) = pick_better(sel1.chosen, sel2.chosen, scope.rng_mut())
            else {
                break RunnerStatus::Stopped;
            };

            if cost.cmp_scalar(0) != Ordering::Greater {
                match &chosen {
                    EitherMove::First(mv) => {
                        self.first.apply_move(input, scope.current_state_mut(), mv)
                    }
                    EitherMove::Second(mv) => {
                        self.second.apply_move(input, scope.current_state_mut(), mv)
                    }
                }
                scope.apply_cost_delta(&cost);
                let improved = scope.update_best_if_improved();
                let kind = if improved {
                    EventKind::NewBest
                } else {
                    EventKind::MadeMove
                };
                scope.emit(
                    kind,
                    scope.current_cost().clone(),
                    Some(format!("{chosen:?}")),
                    String::new(),
                );
            }
            scope.advance_iteration();
        };

        scope.emit(
            EventKind::Ended,
            scope.best_cost().clone(),
            None,
            String::new(),
        );
        Ok(RunOutcome {
            status,
            iterations: scope.iteration() - start_iteration,
            evaluations: scope.evaluations() - start_evaluations,
        })
    }
}

/// Tabu search over two neighborhoods at once.
///
/// Each iteration picks the best admissible move of each neighborhood
/// under its own prohibition list, commits the better of the two, inserts
/// it into the matching list, and ticks both lists.
pub struct BimodalTabuSearch<'a, I, S, E1, E2>
where
    S: State,
    E1: NeighborhoodExplorer<I, S>,
    E2: NeighborhoodExplorer<I, S>,
{
    name: String,
    first: &'a E1,
    second: &'a E2,
    eval: &'a Evaluator<I, S>,
    tabu_first: TabuList<E1::Move>,
    tabu_second: TabuList<E2::Move>,
    params: RunnerParams,
}

impl<'a, I, S, E1, E2> BimodalTabuSearch<'a, I, S, E1, E2>
where
    S: State,
    E1: NeighborhoodExplorer<I, S>,
    E2: NeighborhoodExplorer<I, S>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        first: &'a E1,
        second: &'a E2,
        eval: &'a Evaluator<I, S>,
        tabu_first: TabuList<E1::Move>,
        tabu_second: TabuList<E2::Move>,
    ) -> Self {
        BimodalTabuSearch {
            name: name.into(),
            first,
            second,
            eval,
            tabu_first,
            tabu_second,
            params: RunnerParams::default(),
        }
    }

    pub fn with_params(mut self, params: RunnerParams) -> Self {
        self.params = params;
        self
    }
}

impl<'a, I, S, E1, E2> Runner<I, S> for BimodalTabuSearch<'a, I, S, E1, E2>
where
    S: State,
    E1: NeighborhoodExplorer<I, S>,
    E2: NeighborhoodExplorer<I, S>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, input: &I, scope: &mut SearchScope<S>) -> Result<RunOutcome> {
        scope.start();
        self.tabu_first.clear();
        self.tabu_second.clear();
        scope.emit(
            EventKind::Started,
            scope.current_cost().clone(),
            None,
            String::new(),
        );
        let start_evaluations = scope.evaluations();
        let start_iteration = scope.iteration();

        let status = loop {
            if let Some(interrupted) = interruption_status(scope) {
                break interrupted;
            }
            if self.eval.lower_bound_reached(scope.best_cost()) {
                break RunnerStatus::Stopped;
            }
            if self
                .params
                .exhausted(scope.evaluations(), scope.idle_iterations())
            {
                break RunnerStatus::Stopped;
            }

            let (sel1, sel2) = {
                let tabu_first = &self.tabu_first;
                let tabu_second = &self.tabu_second;
                let (state, rng) = scope.state_and_rng();
                let sel1 = self.first.select_best(input, state, self.eval, rng, |mv, cost| {
                    !tabu_first.is_prohibited(mv, cost)
                });
                let sel2 = self
                    .second
                    .select_best(input, state, self.eval, rng, |mv, cost| {
                        !tabu_second.is_prohibited(mv, cost)
                    });
                (sel1, sel2)
            };
            scope.record_evaluations(sel1.explored + sel2.explored);

            let Some((chosen, cost)) = pick_better(sel1.chosen, sel2.chosen, scope.rng_mut())
            else {
                break RunnerStatus::Stopped;
            };

            match &chosen {
                EitherMove::First(mv) => self.first.apply_move(input, scope.current_state_mut(), mv),
                EitherMove::Second(mv) => {
                    self.second.apply_move(input, scope.current_state_mut(), mv)
                }
            }
            scope.apply_cost_delta(&cost);
            let improved = scope.update_best_if_improved();

            {
                let (current, best, rng) = scope.costs_and_rng();
                match &chosen {
                    EitherMove::First(mv) => {
                        self.tabu_first.insert(mv.clone(), current, best, rng)
                    }
                    EitherMove::Second(mv) => {
                        self.tabu_second.insert(mv.clone(), current, best, rng)
                    }
                }
            }
            self.tabu_first.tick();
            self.tabu_second.tick();

            let kind = if improved {
                EventKind::NewBest
            } else {
                EventKind::MadeMove
            };
            scope.emit(
                kind,
                scope.current_cost().clone(),
                Some(format!("{chosen:?}")),
                String::new(),
            );
            scope.advance_iteration();
        };

        scope.emit(
            EventKind::Ended,
            scope.best_cost().clone(),
            None,
            String::new(),
        );
        Ok(RunOutcome {
            status,
            iterations: scope.iteration() - start_iteration,
            evaluations: scope.evaluations() - start_evaluations,
        })
    }
}
