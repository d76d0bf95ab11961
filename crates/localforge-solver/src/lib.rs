//! localforge solver - search algorithms and drivers
//!
//! This crate hosts the moving parts of the framework:
//! - Neighborhood exploration and selection, with an opt-in parallel
//!   variant
//! - Multi-modal composition (set union, cartesian product)
//! - Tabu prohibition
//! - Runners: steepest descent, hill climbing, simulated annealing, tabu
//!   search, and their bimodal variants
//! - Solver drivers with timeouts, events, and multi-runner composition

pub mod event;
pub mod explorer;
pub mod interrupt;
pub mod multimodal;
pub mod runner;
pub mod scope;
pub mod solver;
pub mod tabu;

#[cfg(test)]
pub(crate) mod test_utils;

pub use event::{spawn_tracing_consumer, EventBus, EventKind, EventRecord};
pub use explorer::{
    accept_all, accept_improving, accept_non_worsening, EvaluatedMove, NeighborhoodExplorer,
    ParallelExplorer, Selection,
};
pub use interrupt::{Interrupt, InterruptReason};
pub use multimodal::{
    ActiveSlot, BaseExplorer, CartesianProductExplorer, CompositeMove, ErasedMove,
    SetUnionExplorer,
};
pub use runner::{
    BimodalHillClimbing, BimodalTabuSearch, DescentPick, HillClimbing, MoveRunner, RunContext,
    RunOutcome, Runner, RunnerParams, RunnerStatus, SaSchedule, SearchPolicy, SimulatedAnnealing,
    SteepestDescent, TabuSearch,
};
pub use scope::{BestSnapshot, SearchScope};
pub use solver::{
    run_with_timeout, LocalSearchSolver, MultiRunOutcome, MultiRunnerSolver, RunnerComposition,
    SolverResult,
};
pub use tabu::{TabuList, TabuListItem};
