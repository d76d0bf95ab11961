//! Hill climbing over random moves.

use localforge_core::{Result, State};
use localforge_config::{ParameterSet, ParameterSpec, Parametrized};

use crate::explorer::{accept_all, EvaluatedMove, NeighborhoodExplorer, Selection};

use super::{RunContext, SearchPolicy};

/// Random-walk hill climbing.
///
/// Draws one random move per iteration and accepts it when it does not
/// worsen the current cost. Sideways moves keep the walk alive on
/// plateaus; termination comes from the runner's `max_idle_iterations`
/// budget.
#[derive(Debug, Clone, Default)]
pub struct HillClimbing;

impl HillClimbing {
    pub fn new() -> Self {
        HillClimbing
    }
}

impl<I, S, E> SearchPolicy<I, S, E> for HillClimbing
where
    S: State,
    E: NeighborhoodExplorer<I, S>,
{
    fn name(&self) -> &str {
        "hill_climbing"
    }

    fn select_move(&mut self, ctx: RunContext<'_, I, S, E>) -> Result<Selection<E::Move>> {
        let RunContext {
            input,
            explorer,
            eval,
            scope,
        } = ctx;
        let (state, rng) = scope.state_and_rng();
        Ok(explorer.random_first(input, state, eval, 1, rng, accept_all))
    }

    fn acceptable(&mut self, mv: &EvaluatedMove<E::Move>, _ctx: RunContext<'_, I, S, E>) -> bool {
        mv.cost.cmp_scalar(0) != std::cmp::Ordering::Greater
    }
}

impl Parametrized for HillClimbing {
    fn component_name(&self) -> &str {
        "hill_climbing"
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    fn apply_parameters(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }
}
