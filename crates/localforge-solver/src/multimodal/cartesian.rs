//! Cartesian-product composition: kick chains with backtracking.

use rand::rngs::StdRng;

use localforge_core::{CostStructure, Evaluator, Move, Result, SearchError, State};

use crate::explorer::NeighborhoodExplorer;

use super::{erase, BaseExplorer, CompositeMove, ErasedMove};

type RelatedFn<I, S> = Box<dyn Fn(&I, &S, &dyn ErasedMove, &dyn ErasedMove) -> bool + Send + Sync>;

type Chain = Vec<Option<Box<dyn ErasedMove>>>;

/// The cartesian product of N base neighborhoods.
///
/// A composite move is a chain of N component moves; the i-th component is
/// generated from (and applies to) the state produced by the previous
/// components. Consecutive components can be constrained by a relatedness
/// predicate per pair; enumeration and sampling backtrack over levels when
/// a prefix cannot be extended.
pub struct CartesianProductExplorer<I, S> {
    name: String,
    bases: Vec<Box<dyn BaseExplorer<I, S>>>,
    // related[i] constrains the pair (i, i + 1).
    related: Vec<Option<RelatedFn<I, S>>>,
}

impl<I: 'static, S: State> CartesianProductExplorer<I, S> {
    pub fn new(name: impl Into<String>) -> Self {
        CartesianProductExplorer {
            name: name.into(),
            bases: Vec::new(),
            related: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of base neighborhoods (the chain length).
    pub fn modality(&self) -> usize {
        self.bases.len()
    }

    /// Appends a base explorer to the chain.
    pub fn add_base(&mut self, explorer: impl NeighborhoodExplorer<I, S> + 'static) -> &mut Self {
        self.bases.push(erase(explorer));
        if self.bases.len() >= 2 {
            self.related.push(None);
        }
        self
    }

    /// Registers a stateless relatedness predicate for the pair of
    /// consecutive levels `(pair, pair + 1)`. At most one predicate may
    /// exist per pair.
    pub fn set_related<M1: Move, M2: Move>(
        &mut self,
        pair: usize,
        f: impl Fn(&M1, &M2) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        self.install_related(
            pair,
            Box::new(move |_input, _state, a, b| {
                f(downcast_related::<M1>(a), downcast_related::<M2>(b))
            }),
        )
    }

    /// Registers a relatedness predicate that also sees the input and the
    /// intermediate state the second move was generated from.
    pub fn set_related_with_state<M1: Move, M2: Move>(
        &mut self,
        pair: usize,
        f: impl Fn(&I, &S, &M1, &M2) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        self.install_related(
            pair,
            Box::new(move |input, state, a, b| {
                f(input, state, downcast_related::<M1>(a), downcast_related::<M2>(b))
            }),
        )
    }

    fn install_related(&mut self, pair: usize, f: RelatedFn<I, S>) -> Result<()> {
        let slot = self.related.get_mut(pair).ok_or_else(|| {
            SearchError::incorrect_parameter(
                format!("{}.related", self.name),
                format!("pair index {pair} out of range"),
            )
        })?;
        if slot.is_some() {
            return Err(SearchError::incorrect_parameter(
                format!("{}.related", self.name),
                format!("a predicate for pair {pair} is already registered"),
            ));
        }
        *slot = Some(f);
        Ok(())
    }

    /// Whether the move at `level` is related to its predecessor, judged
    /// on the state it was generated from. Level 0 has no predecessor and
    /// an absent predicate means always related.
    fn related_at(&self, input: &I, states: &[S], moves: &Chain, level: usize) -> bool {
        if level == 0 {
            return true;
        }
        match &self.related[level - 1] {
            None => true,
            Some(f) => f(
                input,
                &states[level],
                payload(moves, level - 1),
                payload(moves, level),
            ),
        }
    }

    /// Advances the move at `level` (checking the current position first)
    /// until it is related to its predecessor. Returns false when the
    /// level is exhausted.
    fn settle(&self, input: &I, states: &[S], moves: &mut Chain, level: usize) -> bool {
        loop {
            if self.related_at(input, states, moves, level) {
                return true;
            }
            let mv = moves[level].as_mut().expect("unseeded chain level");
            if !self.bases[level].next_move(input, &states[level], mv) {
                return false;
            }
        }
    }

    /// Advances the move at `level` at least one step, then settles.
    fn step(&self, input: &I, states: &[S], moves: &mut Chain, level: usize) -> bool {
        {
            let mv = moves[level].as_mut().expect("unseeded chain level");
            if !self.bases[level].next_move(input, &states[level], mv) {
                return false;
            }
        }
        self.settle(input, states, moves, level)
    }

    /// Recomputes `states[level + 1]` as `states[level]` plus the move at
    /// `level`.
    fn push_state(&self, input: &I, states: &mut [S], moves: &Chain, level: usize) {
        states[level + 1] = states[level].clone();
        self.bases[level].apply_move(input, &mut states[level + 1], payload(moves, level));
    }

    fn compose(&self, moves: Chain) -> CompositeMove {
        let mut composite = CompositeMove::inactive(self.bases.len());
        for (i, mv) in moves.into_iter().enumerate() {
            composite.set_active(i, mv.expect("incomplete chain"));
        }
        composite
    }

    fn decompose(&self, mv: &CompositeMove) -> Chain {
        (0..self.bases.len())
            .map(|i| Some(mv.payload_at(i).clone_box()))
            .collect()
    }

    /// Rebuilds the intermediate state chain for an existing composite
    /// move.
    fn rebuild_states(&self, input: &I, state: &S, moves: &Chain) -> Vec<S> {
        let n = self.bases.len();
        let mut states = vec![state.clone(); n];
        for level in 1..n {
            states[level] = states[level - 1].clone();
            self.bases[level - 1].apply_move(input, &mut states[level], payload(moves, level - 1));
        }
        states
    }

    /// Seeds `level` with its first move and settles it. `Ok(false)`
    /// means the level offers no related move for the current prefix.
    fn seed(&self, input: &I, states: &[S], moves: &mut Chain, level: usize) -> Result<bool> {
        match self.bases[level].first_move(input, &states[level]) {
            Ok(mv) => {
                moves[level] = Some(mv);
                Ok(self.settle(input, states, moves, level))
            }
            Err(SearchError::EmptyNeighborhood) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Forward-fills the chain from `level` (whose move is already
    /// positioned and related), backtracking as needed. Returns false when
    /// the whole space below the entry prefix is exhausted.
    fn extend(
        &self,
        input: &I,
        states: &mut Vec<S>,
        moves: &mut Chain,
        mut level: usize,
    ) -> Result<bool> {
        let n = self.bases.len();
        loop {
            if level == n - 1 {
                return Ok(true);
            }
            self.push_state(input, states, moves, level);
            level += 1;
            if self.seed(input, states, moves, level)? {
                continue;
            }
            // Backtrack to the nearest level that still advances.
            loop {
                if level == 0 {
                    return Ok(false);
                }
                level -= 1;
                if self.step(input, states, moves, level) {
                    break;
                }
            }
        }
    }
}

fn payload<'c>(moves: &'c Chain, level: usize) -> &'c dyn ErasedMove {
    moves[level].as_deref().expect("unseeded chain level")
}

fn downcast_related<M: Move>(mv: &dyn ErasedMove) -> &M {
    mv.as_any()
        .downcast_ref::<M>()
        .expect("relatedness predicate move type mismatch")
}

impl<I: 'static, S: State> NeighborhoodExplorer<I, S> for CartesianProductExplorer<I, S> {
    type Move = CompositeMove;

    fn first_move(&self, input: &I, state: &S) -> Result<CompositeMove> {
        let n = self.bases.len();
        if n == 0 {
            return Err(SearchError::EmptyNeighborhood);
        }
        let mut moves: Chain = vec![None; n];
        let mut states = vec![state.clone(); n];
        if !self.seed(input, &states, &mut moves, 0)? {
            return Err(SearchError::EmptyNeighborhood);
        }
        if self.extend(input, &mut states, &mut moves, 0)? {
            Ok(self.compose(moves))
        } else {
            Err(SearchError::EmptyNeighborhood)
        }
    }

    fn next_move(&self, input: &I, state: &S, mv: &mut CompositeMove) -> bool {
        let n = self.bases.len();
        if n == 0 {
            return false;
        }
        let mut moves = self.decompose(mv);
        let mut states = self.rebuild_states(input, state, &moves);

        // Advance the deepest level first; on exhaustion, backtrack and
        // forward-fill.
        let mut level = n - 1;
        if self.step(input, &states, &mut moves, level) {
            *mv = self.compose(moves);
            return true;
        }
        loop {
            if level == 0 {
                return false;
            }
            level -= 1;
            if !self.step(input, &states, &mut moves, level) {
                continue;
            }
            match self.extend(input, &mut states, &mut moves, level) {
                Ok(true) => {
                    *mv = self.compose(moves);
                    return true;
                }
                Ok(false) | Err(_) => return false,
            }
        }
    }

    fn random_move(&self, input: &I, state: &S, rng: &mut StdRng) -> Result<CompositeMove> {
        let n = self.bases.len();
        if n == 0 {
            return Err(SearchError::EmptyNeighborhood);
        }
        let mut moves: Chain = vec![None; n];
        // The first move drawn at each level, so wrap-around detection
        // terminates the scan.
        let mut starts: Chain = vec![None; n];
        let mut states = vec![state.clone(); n];

        let mut level = 0usize;
        loop {
            let drawn = match self.bases[level].random_move(input, &states[level], rng) {
                Ok(mv) => {
                    starts[level] = Some(mv.clone());
                    moves[level] = Some(mv);
                    self.settle_wrapped(input, &states, &mut moves, &starts, level)
                }
                Err(SearchError::EmptyNeighborhood) => false,
                Err(e) => return Err(e),
            };
            if drawn {
                if level == n - 1 {
                    return Ok(self.compose(moves));
                }
                self.push_state(input, &mut states, &moves, level);
                level += 1;
                continue;
            }
            // Backtrack: advance earlier levels with wrap-around.
            loop {
                if level == 0 {
                    return Err(SearchError::EmptyNeighborhood);
                }
                level -= 1;
                if self.step_wrapped(input, &states, &mut moves, &starts, level) {
                    self.push_state(input, &mut states, &moves, level);
                    level += 1;
                    break;
                }
            }
        }
    }

    fn apply_move(&self, input: &I, state: &mut S, mv: &CompositeMove) {
        for (level, base) in self.bases.iter().enumerate() {
            base.apply_move(input, state, mv.payload_at(level));
        }
    }

    fn is_feasible_move(&self, input: &I, state: &S, mv: &CompositeMove) -> bool {
        let moves = self.decompose(mv);
        let states = self.rebuild_states(input, state, &moves);
        self.bases
            .iter()
            .enumerate()
            .all(|(level, base)| base.is_feasible_move(input, &states[level], payload(&moves, level)))
    }

    fn delta_cost(
        &self,
        input: &I,
        state: &S,
        mv: &CompositeMove,
        eval: &Evaluator<I, S>,
    ) -> CostStructure {
        let moves = self.decompose(mv);
        let states = self.rebuild_states(input, state, &moves);
        let mut sum = CostStructure::zero();
        for (level, base) in self.bases.iter().enumerate() {
            sum += &base.delta_cost(input, &states[level], payload(&moves, level), eval);
        }
        sum
    }
}

impl<I: 'static, S: State> CartesianProductExplorer<I, S> {
    /// One wrapped advance: `next_move`, or `first_move` past the end.
    /// Returns false when the scan comes back around to the level's
    /// starting move.
    fn wrap_once(&self, input: &I, states: &[S], moves: &mut Chain, starts: &Chain, level: usize) -> bool {
        let advanced = {
            let mv = moves[level].as_mut().expect("unseeded chain level");
            self.bases[level].next_move(input, &states[level], mv)
        };
        if !advanced {
            match self.bases[level].first_move(input, &states[level]) {
                Ok(mv) => moves[level] = Some(mv),
                Err(_) => return false,
            }
        }
        // Wrapped all the way around: the level is exhausted.
        moves[level] != starts[level]
    }

    /// Settles a freshly drawn random move: scans (with wrap-around) until
    /// it is related to its predecessor, stopping when the scan returns to
    /// the starting move.
    fn settle_wrapped(
        &self,
        input: &I,
        states: &[S],
        moves: &mut Chain,
        starts: &Chain,
        level: usize,
    ) -> bool {
        loop {
            if self.related_at(input, states, moves, level) {
                return true;
            }
            if !self.wrap_once(input, states, moves, starts, level) {
                return false;
            }
        }
    }

    /// Advances at least one step with wrap-around, then settles.
    fn step_wrapped(
        &self,
        input: &I,
        states: &[S],
        moves: &mut Chain,
        starts: &Chain,
        level: usize,
    ) -> bool {
        if !self.wrap_once(input, states, moves, starts, level) {
            return false;
        }
        self.settle_wrapped(input, states, moves, starts, level)
    }
}
