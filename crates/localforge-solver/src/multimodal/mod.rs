//! Multi-modal neighborhood composition.
//!
//! Composes N base explorers of distinct move types into a single
//! neighborhood. Each base is held as a trait object behind the uniform
//! [`BaseExplorer`] interface; the composite move keeps one type-erased
//! payload per position together with an active flag, so the "which level
//! is this" question is a plain array index instead of compile-time
//! tuple recursion.
//!
//! Two compositions are provided: [`SetUnionExplorer`] (exactly one
//! component active at a time) and [`CartesianProductExplorer`] (a chain
//! of moves applied to the intermediate states produced by the previous
//! ones, filtered by relatedness predicates, with backtracking).

mod cartesian;
mod set_union;

pub use cartesian::CartesianProductExplorer;
pub use set_union::SetUnionExplorer;

use std::any::Any;
use std::fmt;

use rand::rngs::StdRng;

use localforge_core::{CostStructure, Evaluator, Move, Result, State};

use crate::explorer::NeighborhoodExplorer;

/// A type-erased move payload.
///
/// Implemented for every [`Move`] type; supports dynamic clone, equality
/// by downcast, and access to the concrete payload.
pub trait ErasedMove: Any + fmt::Debug + Send {
    fn clone_box(&self) -> Box<dyn ErasedMove>;
    fn eq_erased(&self, other: &dyn ErasedMove) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<M: Move> ErasedMove for M {
    fn clone_box(&self) -> Box<dyn ErasedMove> {
        Box::new(self.clone())
    }

    fn eq_erased(&self, other: &dyn ErasedMove) -> bool {
        other.as_any().downcast_ref::<M>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Clone for Box<dyn ErasedMove> {
    fn clone(&self) -> Self {
        // Dispatch on the erased payload, not on the box itself.
        (**self).clone_box()
    }
}

impl PartialEq for Box<dyn ErasedMove> {
    fn eq(&self, other: &Self) -> bool {
        (**self).eq_erased(&**other)
    }
}

/// One position of a composite move: an optional payload plus the active
/// flag. Inactive slots compare equal regardless of payload.
#[derive(Debug, Clone)]
pub struct ActiveSlot {
    mv: Option<Box<dyn ErasedMove>>,
    active: bool,
}

impl ActiveSlot {
    fn inactive() -> Self {
        ActiveSlot {
            mv: None,
            active: false,
        }
    }

    fn active(mv: Box<dyn ErasedMove>) -> Self {
        ActiveSlot {
            mv: Some(mv),
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn payload(&self) -> Option<&dyn ErasedMove> {
        self.mv.as_deref()
    }
}

impl PartialEq for ActiveSlot {
    fn eq(&self, other: &Self) -> bool {
        if !self.active && !other.active {
            return true;
        }
        if self.active != other.active {
            return false;
        }
        match (&self.mv, &other.mv) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// The move of a multi-modal composite: one [`ActiveSlot`] per base.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeMove {
    slots: Vec<ActiveSlot>,
}

impl CompositeMove {
    fn inactive(modality: usize) -> Self {
        CompositeMove {
            slots: (0..modality).map(|_| ActiveSlot::inactive()).collect(),
        }
    }

    /// Number of positions (the modality of the composite).
    pub fn modality(&self) -> usize {
        self.slots.len()
    }

    /// Index of the single active position, if exactly the set-union
    /// invariant holds.
    pub fn active_index(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.active)
    }

    /// Whether every position is active (the cartesian-product invariant).
    pub fn all_active(&self) -> bool {
        self.slots.iter().all(|s| s.active)
    }

    /// Downcasts the payload at `index` to a concrete move type.
    pub fn payload<M: Move>(&self, index: usize) -> Option<&M> {
        self.slots
            .get(index)?
            .payload()?
            .as_any()
            .downcast_ref::<M>()
    }

    fn slot(&self, index: usize) -> &ActiveSlot {
        &self.slots[index]
    }

    fn set_active(&mut self, index: usize, mv: Box<dyn ErasedMove>) {
        self.slots[index] = ActiveSlot::active(mv);
    }

    fn set_inactive(&mut self, index: usize) {
        self.slots[index] = ActiveSlot::inactive();
    }

    fn payload_at(&self, index: usize) -> &dyn ErasedMove {
        self.slots[index]
            .payload()
            .expect("composite move slot has no payload")
    }

    fn payload_mut(&mut self, index: usize) -> &mut Box<dyn ErasedMove> {
        self.slots[index]
            .mv
            .as_mut()
            .expect("composite move slot has no payload")
    }
}

/// Uniform, object-safe view of one base explorer inside a composite.
///
/// Mirrors the [`NeighborhoodExplorer`] contract over type-erased moves;
/// obtained by [`erase`].
pub trait BaseExplorer<I, S>: Send + Sync {
    fn first_move(&self, input: &I, state: &S) -> Result<Box<dyn ErasedMove>>;
    fn next_move(&self, input: &I, state: &S, mv: &mut Box<dyn ErasedMove>) -> bool;
    fn random_move(&self, input: &I, state: &S, rng: &mut StdRng) -> Result<Box<dyn ErasedMove>>;
    fn apply_move(&self, input: &I, state: &mut S, mv: &dyn ErasedMove);
    fn is_feasible_move(&self, input: &I, state: &S, mv: &dyn ErasedMove) -> bool;
    fn delta_cost(
        &self,
        input: &I,
        state: &S,
        mv: &dyn ErasedMove,
        eval: &Evaluator<I, S>,
    ) -> CostStructure;
}

struct Erased<E>(E);

fn downcast<M: Move>(mv: &dyn ErasedMove) -> &M {
    mv.as_any()
        .downcast_ref::<M>()
        .expect("move payload does not match its base explorer")
}

impl<I, S, E> BaseExplorer<I, S> for Erased<E>
where
    S: State,
    E: NeighborhoodExplorer<I, S>,
{
    fn first_move(&self, input: &I, state: &S) -> Result<Box<dyn ErasedMove>> {
        self.0
            .first_move(input, state)
            .map(|mv| Box::new(mv) as Box<dyn ErasedMove>)
    }

    fn next_move(&self, input: &I, state: &S, mv: &mut Box<dyn ErasedMove>) -> bool {
        let typed = (**mv)
            .as_any()
            .downcast_ref::<E::Move>()
            .expect("move payload does not match its base explorer");
        let mut current = typed.clone();
        if self.0.next_move(input, state, &mut current) {
            *mv = Box::new(current);
            true
        } else {
            false
        }
    }

    fn random_move(&self, input: &I, state: &S, rng: &mut StdRng) -> Result<Box<dyn ErasedMove>> {
        self.0
            .random_move(input, state, rng)
            .map(|mv| Box::new(mv) as Box<dyn ErasedMove>)
    }

    fn apply_move(&self, input: &I, state: &mut S, mv: &dyn ErasedMove) {
        self.0.apply_move(input, state, downcast::<E::Move>(mv));
    }

    fn is_feasible_move(&self, input: &I, state: &S, mv: &dyn ErasedMove) -> bool {
        self.0
            .is_feasible_move(input, state, downcast::<E::Move>(mv))
    }

    fn delta_cost(
        &self,
        input: &I,
        state: &S,
        mv: &dyn ErasedMove,
        eval: &Evaluator<I, S>,
    ) -> CostStructure {
        self.0
            .delta_cost(input, state, downcast::<E::Move>(mv), eval)
    }
}

/// Erases a typed explorer behind the uniform composite interface.
pub fn erase<I, S, E>(explorer: E) -> Box<dyn BaseExplorer<I, S>>
where
    I: 'static,
    S: State,
    E: NeighborhoodExplorer<I, S> + 'static,
{
    Box::new(Erased(explorer))
}
