//! Domain traits: the contracts a problem must satisfy.
//!
//! The problem instance (`Input`) stays a plain generic parameter — the
//! framework never inspects it. Candidate solutions and moves are
//! constrained through the [`State`] and [`Move`] alias traits, and the
//! user supplies a [`StateManager`] for producing states and an optional
//! [`OutputManager`] for converting between states and external solution
//! representations.

use rand::rngs::StdRng;

use crate::error::{Result, SearchError};

/// Alias trait for candidate solutions.
///
/// Blanket-implemented: any cloneable, comparable, sendable type is a
/// state. States are mutated only by move application and by the
/// [`StateManager`] generators.
pub trait State: Clone + PartialEq + Send + 'static {}

impl<T: Clone + PartialEq + Send + 'static> State for T {}

/// Alias trait for move descriptions.
///
/// Blanket-implemented. A move is valid only with respect to the state it
/// was produced from; the enumeration order of a neighborhood is defined by
/// its explorer's `first_move`/`next_move` pair.
pub trait Move: Clone + PartialEq + std::fmt::Debug + Send + 'static {}

impl<T: Clone + PartialEq + std::fmt::Debug + Send + 'static> Move for T {}

/// Produces and validates states for a given problem.
pub trait StateManager<I, S>: Send + Sync {
    /// Draws a random state.
    fn random_state(&self, input: &I, rng: &mut StdRng) -> S;

    /// Builds a state greedily. Optional; the default reports
    /// [`SearchError::NotImplemented`].
    fn greedy_state(&self, _input: &I) -> Result<S> {
        Err(SearchError::NotImplemented("greedy_state"))
    }

    /// Verifies the internal consistency of a state. Violations are fatal
    /// in debug builds.
    fn check_consistency(&self, input: &I, state: &S) -> bool;
}

/// Converts between internal states and an external solution type.
pub trait OutputManager<I, S>: Send + Sync {
    /// The external solution representation.
    type Output;

    /// Renders a state as an output solution.
    fn state_to_output(&self, input: &I, state: &S) -> Self::Output;

    /// Reconstructs a state from an output solution.
    fn output_to_state(&self, input: &I, output: &Self::Output) -> S;
}

/// An output manager for problems whose state doubles as their solution
/// representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOutput;

impl<I, S: State> OutputManager<I, S> for IdentityOutput {
    type Output = S;

    fn state_to_output(&self, _input: &I, state: &S) -> S {
        state.clone()
    }

    fn output_to_state(&self, _input: &I, output: &S) -> S {
        output.clone()
    }
}
