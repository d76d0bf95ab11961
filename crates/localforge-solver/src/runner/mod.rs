//! Move runners: the iteration drivers of the search.
//!
//! A [`MoveRunner`] owns the generic iteration state machine — select,
//! accept, commit, update best, bookkeeping, stop — and delegates the
//! algorithm-specific decisions to a [`SearchPolicy`]. Policies implement
//! steepest descent, hill climbing, simulated annealing, and tabu search;
//! the bimodal runners drive two explorers side by side.

mod bimodal;
mod hill_climbing;
mod simulated_annealing;
mod steepest_descent;
mod tabu_search;

pub use bimodal::{BimodalHillClimbing, BimodalTabuSearch};
pub use hill_climbing::HillClimbing;
pub use simulated_annealing::{SaSchedule, SimulatedAnnealing};
pub use steepest_descent::{DescentPick, SteepestDescent};
pub use tabu_search::TabuSearch;

use localforge_core::{Evaluator, Result, State};
use localforge_config::{ParameterKind, ParameterSet, ParameterSpec, Parametrized};

use crate::event::EventKind;
use crate::explorer::{EvaluatedMove, NeighborhoodExplorer, Selection};
use crate::interrupt::InterruptReason;
use crate::scope::SearchScope;

/// Lifecycle states of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Idle,
    Initializing,
    Running,
    /// Terminated by its own stop criterion (or an exhausted
    /// neighborhood).
    Stopped,
    /// Terminated because the deadline elapsed.
    TimedOut,
    /// Terminated by external cancellation.
    Cancelled,
}

/// Summary of one finished run; the best state itself lives in the scope.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunnerStatus,
    pub iterations: u64,
    pub evaluations: u64,
}

/// Budget parameters shared by every runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerParams {
    /// Hard cap on delta-cost evaluations.
    pub max_evaluations: Option<u64>,
    /// Stop after this many iterations without improving the best state.
    pub max_idle_iterations: Option<u64>,
}

impl RunnerParams {
    /// Whether either budget is spent.
    pub(crate) fn exhausted(&self, evaluations: u64, idle_iterations: u64) -> bool {
        self.max_evaluations.is_some_and(|max| evaluations >= max)
            || self
                .max_idle_iterations
                .is_some_and(|max| idle_iterations >= max)
    }
}

/// Maps a raised interrupt to the matching terminal status.
pub(crate) fn interruption_status<S: State>(scope: &SearchScope<S>) -> Option<RunnerStatus> {
    match scope.interrupt().reason() {
        Some(InterruptReason::Cancelled) => Some(RunnerStatus::Cancelled),
        Some(InterruptReason::TimedOut) => Some(RunnerStatus::TimedOut),
        None => None,
    }
}

/// A runnable search algorithm, object-safe for solver composition.
pub trait Runner<I, S: State>: Send {
    fn name(&self) -> &str;

    /// Drives the search until a stop condition holds. The best state and
    /// cost are tracked in the scope and stay valid whatever the status.
    fn run(&mut self, input: &I, scope: &mut SearchScope<S>) -> Result<RunOutcome>;
}

/// Everything a policy may touch during one hook invocation.
pub struct RunContext<'c, I, S: State, E> {
    pub input: &'c I,
    pub explorer: &'c E,
    pub eval: &'c Evaluator<I, S>,
    pub scope: &'c mut SearchScope<S>,
}

/// The algorithm-specific half of a [`MoveRunner`].
///
/// Hook order per iteration: `select_move`, `acceptable`, (on acceptance)
/// `move_committed`, `complete_iteration`; `stop` and the runner-level
/// budgets are consulted at the top of each iteration.
pub trait SearchPolicy<I, S: State, E: NeighborhoodExplorer<I, S>>: Send {
    fn name(&self) -> &str;

    /// Validates parameters and resets per-run state. Parameter
    /// violations surface as
    /// [`SearchError::IncorrectParameterValue`](localforge_core::SearchError).
    fn initialize(&mut self, _params: &RunnerParams, _ctx: RunContext<'_, I, S, E>) -> Result<()> {
        Ok(())
    }

    /// Produces the candidate move for this iteration.
    fn select_move(&mut self, ctx: RunContext<'_, I, S, E>) -> Result<Selection<E::Move>>;

    /// Whether the selected move is accepted.
    fn acceptable(&mut self, mv: &EvaluatedMove<E::Move>, ctx: RunContext<'_, I, S, E>) -> bool;

    /// Called after an accepted move was applied and the costs updated.
    fn move_committed(&mut self, _mv: &EvaluatedMove<E::Move>, _ctx: RunContext<'_, I, S, E>) {}

    /// End-of-iteration bookkeeping (e.g. cooling).
    fn complete_iteration(&mut self, _accepted: bool, _ctx: RunContext<'_, I, S, E>) {}

    /// Algorithm-specific stop criterion.
    fn stop(&mut self, _ctx: RunContext<'_, I, S, E>) -> bool {
        false
    }

    /// Status line attached to observer events.
    fn status(&self) -> String {
        String::new()
    }
}

/// The generic iteration driver.
///
/// Checks, in order, at every iteration boundary: cancellation/timeout,
/// the lower bound, the evaluation and idle budgets, and the policy's own
/// stop criterion. A selection that comes back empty stops the run.
pub struct MoveRunner<'a, I, S: State, E, P> {
    name: String,
    explorer: &'a E,
    eval: &'a Evaluator<I, S>,
    policy: P,
    params: RunnerParams,
    status: RunnerStatus,
}

impl<'a, I, S, E, P> MoveRunner<'a, I, S, E, P>
where
    S: State,
    E: NeighborhoodExplorer<I, S>,
    P: SearchPolicy<I, S, E>,
{
    pub fn new(name: impl Into<String>, explorer: &'a E, eval: &'a Evaluator<I, S>, policy: P) -> Self {
        MoveRunner {
            name: name.into(),
            explorer,
            eval,
            policy,
            params: RunnerParams::default(),
            status: RunnerStatus::Idle,
        }
    }

    pub fn with_params(mut self, params: RunnerParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &RunnerParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut RunnerParams {
        &mut self.params
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn status(&self) -> RunnerStatus {
        self.status
    }

}

impl<'a, I, S, E, P> Runner<I, S> for MoveRunner<'a, I, S, E, P>
where
    I: Sync,
    S: State,
    E: NeighborhoodExplorer<I, S>,
    P: SearchPolicy<I, S, E>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, input: &I, scope: &mut SearchScope<S>) -> Result<RunOutcome> {
        self.status = RunnerStatus::Initializing;
        scope.start();
        self.policy.initialize(
            &self.params,
            RunContext {
                input,
                explorer: self.explorer,
                eval: self.eval,
                scope: &mut *scope,
            },
        )?;
        scope.emit(
            EventKind::Started,
            scope.current_cost().clone(),
            None,
            self.policy.status(),
        );
        self.status = RunnerStatus::Running;
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
            if self.policy.stop(RunContext {
                input,
                explorer: self.explorer,
                eval: self.eval,
                scope: &mut *scope,
            }) {
                break RunnerStatus::Stopped;
            }

            let selection = self.policy.select_move(RunContext {
                input,
                explorer: self.explorer,
                eval: self.eval,
                scope: &mut *scope,
            })?;
            scope.record_evaluations(selection.explored);
            let Some(chosen) = selection.chosen else {
                break RunnerStatus::Stopped;
            };

            let accepted = self.policy.acceptable(
                &chosen,
                RunContext {
                    input,
                    explorer: self.explorer,
                    eval: self.eval,
                    scope: &mut *scope,
                },
            );
            if accepted {
                self.explorer
                    .apply_move(input, scope.current_state_mut(), &chosen.mv);
                scope.apply_cost_delta(&chosen.cost);
                let improved = scope.update_best_if_improved();
                self.policy.move_committed(
                    &chosen,
                    RunContext {
                        input,
                        explorer: self.explorer,
                        eval: self.eval,
                        scope: &mut *scope,
                    },
                );
                let kind = if improved {
                    EventKind::NewBest
                } else {
                    EventKind::MadeMove
                };
                let cost = if improved {
                    scope.best_cost().clone()
                } else {
                    scope.current_cost().clone()
                };
                scope.emit(kind, cost, Some(format!("{:?}", chosen.mv)), self.policy.status());
            }
            self.policy.complete_iteration(
                accepted,
                RunContext {
                    input,
                    explorer: self.explorer,
                    eval: self.eval,
                    scope: &mut *scope,
                },
            );
            scope.advance_iteration();
        };

        scope.emit(
            EventKind::Ended,
            scope.best_cost().clone(),
            None,
            self.policy.status(),
        );
        self.status = status;
        Ok(RunOutcome {
            status,
            iterations: scope.iteration() - start_iteration,
            evaluations: scope.evaluations() - start_evaluations,
        })
    }
}

impl<'a, I, S, E, P> Parametrized for MoveRunner<'a, I, S, E, P>
where
    S: State,
    E: NeighborhoodExplorer<I, S>,
    P: SearchPolicy<I, S, E> + Parametrized,
{
    fn component_name(&self) -> &str {
        &self.name
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new(
                "max_evaluations",
                "Hard cap on delta-cost evaluations",
                ParameterKind::UInt,
            ),
            ParameterSpec::new(
                "max_idle_iterations",
                "Stop after this many non-improving iterations",
                ParameterKind::UInt,
            ),
        ]
    }

    fn apply_parameters(&mut self, params: &ParameterSet) -> localforge_core::Result<()> {
        if let Some(v) = params.get_u64(&self.name, "max_evaluations")? {
            self.params.max_evaluations = Some(v);
        }
        if let Some(v) = params.get_u64(&self.name, "max_idle_iterations")? {
            self.params.max_idle_iterations = Some(v);
        }
        self.policy.apply_parameters(params)
    }
}

#[cfg(test)]
mod tests;
