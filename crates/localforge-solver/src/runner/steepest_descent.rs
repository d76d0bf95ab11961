//! Greedy descent: steepest or first-improvement.

use localforge_core::{Result, State};
use localforge_config::{ParameterSet, ParameterSpec, Parametrized};

use crate::explorer::{accept_improving, EvaluatedMove, NeighborhoodExplorer, Selection};

use super::{RunContext, SearchPolicy};

/// How a descent step picks its move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescentPick {
    /// Scan the whole neighborhood and take the best improving move.
    #[default]
    Steepest,
    /// Take the first improving move encountered.
    FirstImprovement,
}

/// Descends until no improving move exists.
///
/// Accepts exactly the strictly improving moves; an iteration whose
/// selection comes back empty means the current state is a local minimum
/// and stops the runner.
#[derive(Debug, Clone, Default)]
pub struct SteepestDescent {
    pick: DescentPick,
}

impl SteepestDescent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to first-improvement selection.
    pub fn first_improvement() -> Self {
        SteepestDescent {
            pick: DescentPick::FirstImprovement,
        }
    }

    pub fn pick(&self) -> DescentPick {
        self.pick
    }
}

impl<I, S, E> SearchPolicy<I, S, E> for SteepestDescent
where
    S: State,
    E: NeighborhoodExplorer<I, S>,
{
    fn name(&self) -> &str {
        match self.pick {
            DescentPick::Steepest => "steepest_descent",
            DescentPick::FirstImprovement => "first_improvement",
        }
    }

    fn select_move(&mut self, ctx: RunContext<'_, I, S, E>) -> Result<Selection<E::Move>> {
        let RunContext {
            input,
            explorer,
            eval,
            scope,
        } = ctx;
        let (state, rng) = scope.state_and_rng();
        let selection = match self.pick {
            DescentPick::Steepest => {
                explorer.select_best(input, state, eval, rng, accept_improving)
            }
            DescentPick::FirstImprovement => {
                explorer.select_first(input, state, eval, accept_improving)
            }
        };
        Ok(selection)
    }

    fn acceptable(&mut self, mv: &EvaluatedMove<E::Move>, _ctx: RunContext<'_, I, S, E>) -> bool {
        mv.cost.cmp_scalar(0) == std::cmp::Ordering::Less
    }
}

impl Parametrized for SteepestDescent {
    fn component_name(&self) -> &str {
        "steepest_descent"
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    fn apply_parameters(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }
}
