//! localforge core - fundamental types and traits for local search
//!
//! This crate provides the abstractions shared by the whole framework:
//! - Cost structures with aggregated and hierarchical ordering
//! - Cost components and the evaluator that aggregates them
//! - Domain traits binding user problems to the search algorithms
//! - Error types

pub mod component;
pub mod cost;
pub mod domain;
pub mod error;
pub mod eval;

pub use component::{CostComponent, FnCostComponent};
pub use cost::{CostStructure, COST_EPSILON};
pub use domain::{IdentityOutput, Move, OutputManager, State, StateManager};
pub use error::{Result, SearchError};
pub use eval::{Evaluator, DEFAULT_HARD_WEIGHT};
