//! localforge - local-search metaheuristics over arbitrary problems
//!
//! You supply an immutable problem instance, a mutable candidate state, a
//! set of move types with delta-cost operators, and a vector of cost
//! components; localforge supplies the search algorithms (hill climbing,
//! steepest descent, simulated annealing, tabu search), their composition
//! into multi-neighborhood explorers, and the solver drivers.
//!
//! # Quick Start
//!
//! Minimize the number of set bits in a bit vector with steepest descent:
//!
//! ```
//! use localforge::prelude::*;
//! use rand::rngs::StdRng;
//! use rand::Rng;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! struct Flip {
//!     index: usize,
//! }
//!
//! struct FlipExplorer;
//!
//! impl NeighborhoodExplorer<usize, Vec<u8>> for FlipExplorer {
//!     type Move = Flip;
//!
//!     fn first_move(&self, _n: &usize, state: &Vec<u8>) -> localforge::Result<Flip> {
//!         if state.is_empty() {
//!             return Err(SearchError::EmptyNeighborhood);
//!         }
//!         Ok(Flip { index: 0 })
//!     }
//!
//!     fn next_move(&self, _n: &usize, state: &Vec<u8>, mv: &mut Flip) -> bool {
//!         if mv.index + 1 < state.len() {
//!             mv.index += 1;
//!             true
//!         } else {
//!             false
//!         }
//!     }
//!
//!     fn random_move(
//!         &self,
//!         _n: &usize,
//!         state: &Vec<u8>,
//!         rng: &mut StdRng,
//!     ) -> localforge::Result<Flip> {
//!         if state.is_empty() {
//!             return Err(SearchError::EmptyNeighborhood);
//!         }
//!         Ok(Flip {
//!             index: rng.random_range(0..state.len()),
//!         })
//!     }
//!
//!     fn apply_move(&self, _n: &usize, state: &mut Vec<u8>, mv: &Flip) {
//!         state[mv.index] ^= 1;
//!     }
//! }
//!
//! struct Bits;
//!
//! impl StateManager<usize, Vec<u8>> for Bits {
//!     fn random_state(&self, n: &usize, rng: &mut StdRng) -> Vec<u8> {
//!         (0..*n).map(|_| rng.random_range(0..2u8)).collect()
//!     }
//!
//!     fn check_consistency(&self, n: &usize, state: &Vec<u8>) -> bool {
//!         state.len() == *n
//!     }
//! }
//!
//! let mut eval = Evaluator::new();
//! eval.add_component(FnCostComponent::new("ones", false, |_: &usize, state: &Vec<u8>| {
//!     state.iter().filter(|&&b| b == 1).count() as i64
//! }));
//!
//! let mut solver = LocalSearchSolver::new(&Bits, &IdentityOutput, &eval).with_seed(7);
//! let mut runner = MoveRunner::new("descent", &FlipExplorer, &eval, SteepestDescent::new());
//! let result = solver.solve(&8usize, &mut runner).unwrap();
//! assert_eq!(result.cost.total, 0);
//! ```

// ============================================================================
// Core: costs, components, domain traits, errors
// ============================================================================

pub use localforge_core::{
    CostComponent, CostStructure, Evaluator, FnCostComponent, IdentityOutput, Move, OutputManager,
    Result, SearchError, State, StateManager, COST_EPSILON, DEFAULT_HARD_WEIGHT,
};

// ============================================================================
// Configuration
// ============================================================================

pub use localforge_config::{
    ConfigError, ParameterKind, ParameterSet, ParameterSpec, ParameterValue, Parametrized,
};

// ============================================================================
// Exploration and composition
// ============================================================================

pub use localforge_solver::{
    accept_all, accept_improving, accept_non_worsening, CartesianProductExplorer, CompositeMove,
    EvaluatedMove, NeighborhoodExplorer, ParallelExplorer, Selection, SetUnionExplorer,
};

// ============================================================================
// Runners and solvers
// ============================================================================

pub use localforge_solver::{
    run_with_timeout, BimodalHillClimbing, BimodalTabuSearch, EventBus, EventKind, EventRecord,
    HillClimbing, Interrupt, InterruptReason, LocalSearchSolver, MoveRunner, MultiRunOutcome,
    MultiRunnerSolver, RunOutcome, Runner, RunnerComposition, RunnerParams, RunnerStatus,
    SaSchedule, SearchPolicy, SearchScope, SimulatedAnnealing, SolverResult, SteepestDescent,
    TabuList, TabuSearch,
};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    pub use crate::{
        CostComponent, CostStructure, Evaluator, EventBus, FnCostComponent, HillClimbing,
        IdentityOutput, Interrupt, LocalSearchSolver, MoveRunner, MultiRunnerSolver,
        NeighborhoodExplorer, OutputManager, ParameterSet, Parametrized, Runner, RunnerParams,
        RunnerStatus, SearchError, SimulatedAnnealing, SolverResult, StateManager,
        SteepestDescent, TabuList, TabuSearch,
    };
}
