//! Tabu search.

use localforge_core::{Move, Result, State};
use localforge_config::{ParameterKind, ParameterSet, ParameterSpec, Parametrized};

use crate::explorer::{EvaluatedMove, NeighborhoodExplorer, Selection};
use crate::tabu::TabuList;

use super::{RunContext, SearchPolicy};

/// Tabu search policy.
///
/// Every iteration scans the neighborhood for the best move that the
/// prohibition list allows (aspiration included) and commits it even when
/// it worsens the current state; the committed move enters the tabu list
/// and the list ticks once per iteration. Termination comes from the
/// runner's `max_idle_iterations` budget or an exhausted neighborhood.
pub struct TabuSearch<M: Move> {
    tabu: TabuList<M>,
}

impl<M: Move> TabuSearch<M> {
    /// Builds the policy around a prohibition list.
    pub fn new(tabu: TabuList<M>) -> Self {
        TabuSearch { tabu }
    }

    /// Convenience constructor with a tenure range and inverse predicate.
    pub fn with_tenure(
        min_tenure: u32,
        max_tenure: u32,
        inverse: impl Fn(&M, &M) -> bool + Send + Sync + 'static,
    ) -> Result<Self> {
        Ok(TabuSearch {
            tabu: TabuList::new(min_tenure, max_tenure, inverse)?,
        })
    }

    pub fn tabu(&self) -> &TabuList<M> {
        &self.tabu
    }
}

impl<I, S, E, M> SearchPolicy<I, S, E> for TabuSearch<M>
where
    S: State,
    M: Move,
    E: NeighborhoodExplorer<I, S, Move = M>,
{
    fn name(&self) -> &str {
        "tabu_search"
    }

    fn initialize(
        &mut self,
        _params: &super::RunnerParams,
        _ctx: RunContext<'_, I, S, E>,
    ) -> Result<()> {
        self.tabu.clear();
        Ok(())
    }

    fn select_move(&mut self, ctx: RunContext<'_, I, S, E>) -> Result<Selection<M>> {
        let RunContext {
            input,
            explorer,
            eval,
            scope,
        } = ctx;
        let tabu = &self.tabu;
        let (state, rng) = scope.state_and_rng();
        Ok(explorer.select_best(input, state, eval, rng, |mv, cost| {
            !tabu.is_prohibited(mv, cost)
        }))
    }

    fn acceptable(&mut self, _mv: &EvaluatedMove<M>, _ctx: RunContext<'_, I, S, E>) -> bool {
        // The best admissible move is always taken, worsening or not.
        true
    }

    fn move_committed(&mut self, mv: &EvaluatedMove<M>, ctx: RunContext<'_, I, S, E>) {
        let (current, best, rng) = ctx.scope.costs_and_rng();
        self.tabu.insert(mv.mv.clone(), current, best, rng);
        self.tabu.tick();
    }

    fn status(&self) -> String {
        format!("tabu list length {}", self.tabu.len())
    }
}

impl<M: Move> Parametrized for TabuSearch<M> {
    fn component_name(&self) -> &str {
        "tabu_search"
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("min_tenure", "Minimum tabu tenure", ParameterKind::UInt),
            ParameterSpec::new("max_tenure", "Maximum tabu tenure", ParameterKind::UInt),
        ]
    }

    fn apply_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        let min = params
            .get_u64("tabu_search", "min_tenure")?
            .map(|v| v.min(u64::from(u32::MAX)) as u32)
            .unwrap_or_else(|| self.tabu.min_tenure());
        let max = params
            .get_u64("tabu_search", "max_tenure")?
            .map(|v| v.min(u64::from(u32::MAX)) as u32)
            .unwrap_or_else(|| self.tabu.max_tenure());
        self.tabu.set_tenure(min, max)
    }
}
