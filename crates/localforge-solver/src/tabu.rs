//! Tabu prohibition: a bounded-tenure FIFO of recently made moves.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::Rng;

use localforge_core::{CostStructure, Move, Result, SearchError};

/// One entry of the tabu list.
#[derive(Debug, Clone)]
pub struct TabuListItem<M> {
    pub mv: M,
    /// Absolute iteration at which the entry stops prohibiting.
    pub leaves_at: u64,
}

/// FIFO tabu list with randomized tenure and an aspiration override.
///
/// On insertion a tenure is drawn uniformly in `[min_tenure, max_tenure]`
/// and the move prohibits its inverses until `iteration + tenure`. The
/// user-supplied inverse predicate decides whether a candidate move is
/// prohibited by a listed one; the aspiration criterion overrides the
/// prohibition whenever the candidate would improve on the best cost seen
/// so far.
///
/// # Examples
///
/// ```
/// use localforge_solver::tabu::TabuList;
///
/// // Swap moves are their own inverses.
/// let tabu: TabuList<(usize, usize)> = TabuList::new(5, 10, |a, b| a == b).unwrap();
/// assert_eq!(tabu.len(), 0);
/// ```
pub struct TabuList<M> {
    items: VecDeque<TabuListItem<M>>,
    min_tenure: u32,
    max_tenure: u32,
    iteration: u64,
    inverse: Box<dyn Fn(&M, &M) -> bool + Send + Sync>,
    current_cost: CostStructure,
    best_cost: CostStructure,
}

impl<M: Move> TabuList<M> {
    /// Creates a tabu list. Fails when `min_tenure > max_tenure`.
    pub fn new(
        min_tenure: u32,
        max_tenure: u32,
        inverse: impl Fn(&M, &M) -> bool + Send + Sync + 'static,
    ) -> Result<Self> {
        if min_tenure > max_tenure {
            return Err(SearchError::incorrect_parameter(
                "min_tenure",
                format!("must not exceed max_tenure ({min_tenure} > {max_tenure})"),
            ));
        }
        Ok(TabuList {
            items: VecDeque::new(),
            min_tenure,
            max_tenure,
            iteration: 0,
            inverse: Box::new(inverse),
            current_cost: CostStructure::zero(),
            best_cost: CostStructure::zero(),
        })
    }

    /// Replaces the tenure range. Fails when `min > max`.
    pub fn set_tenure(&mut self, min: u32, max: u32) -> Result<()> {
        if min > max {
            return Err(SearchError::incorrect_parameter(
                "min_tenure",
                format!("must not exceed max_tenure ({min} > {max})"),
            ));
        }
        self.min_tenure = min;
        self.max_tenure = max;
        Ok(())
    }

    pub fn min_tenure(&self) -> u32 {
        self.min_tenure
    }

    pub fn max_tenure(&self) -> u32 {
        self.max_tenure
    }

    /// The current iteration index.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Number of entries, expired ones included until the next tick.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts `mv` with a tenure drawn in `[min_tenure, max_tenure]`,
    /// and records the current and best costs for the aspiration
    /// criterion.
    pub fn insert(
        &mut self,
        mv: M,
        current_cost: &CostStructure,
        best_cost: &CostStructure,
        rng: &mut StdRng,
    ) {
        let tenure = rng.random_range(self.min_tenure..=self.max_tenure);
        self.items.push_back(TabuListItem {
            mv,
            leaves_at: self.iteration + u64::from(tenure),
        });
        self.current_cost = current_cost.clone();
        self.best_cost = best_cost.clone();
    }

    /// Whether `mv` is prohibited: some unexpired entry is its inverse and
    /// the aspiration criterion does not override.
    pub fn is_prohibited(&self, mv: &M, mv_cost: &CostStructure) -> bool {
        !self.aspiration(mv_cost) && self.is_listed(mv)
    }

    /// Default aspiration: the move would land below the best cost seen so
    /// far.
    fn aspiration(&self, mv_cost: &CostStructure) -> bool {
        (&self.current_cost + mv_cost).cmp_aggregated(&self.best_cost) == std::cmp::Ordering::Less
    }

    fn is_listed(&self, mv: &M) -> bool {
        self.items
            .iter()
            .any(|item| item.leaves_at > self.iteration && (self.inverse)(mv, &item.mv))
    }

    /// Advances the iteration and drops entries whose tenure elapsed.
    pub fn tick(&mut self) {
        self.iteration += 1;
        let iteration = self.iteration;
        self.items.retain(|item| item.leaves_at > iteration);
    }

    /// Drops every entry and resets the iteration counter.
    pub fn clear(&mut self) {
        self.items.clear();
        self.iteration = 0;
        self.current_cost = CostStructure::zero();
        self.best_cost = CostStructure::zero();
    }
}

impl<M: Move> std::fmt::Debug for TabuList<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabuList")
            .field("len", &self.items.len())
            .field("min_tenure", &self.min_tenure)
            .field("max_tenure", &self.max_tenure)
            .field("iteration", &self.iteration)
            .finish()
    }
}
