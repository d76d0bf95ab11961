//! Set-union composition: one active base at a time.

use rand::rngs::StdRng;
use rand::Rng;

use localforge_core::{CostStructure, Evaluator, Result, SearchError, State};
use localforge_config::{ParameterKind, ParameterSet, ParameterSpec, Parametrized};

use crate::explorer::NeighborhoodExplorer;

use super::{erase, BaseExplorer, CompositeMove};

/// The disjoint union of N base neighborhoods.
///
/// At any time exactly one slot of the composite move is active; all
/// dispatch goes to the base at that index. Random sampling draws a base
/// with probability proportional to its bias (uniform unless configured)
/// and falls through to the other bases when the drawn one is empty.
///
/// # Examples
///
/// ```no_run
/// use localforge_solver::multimodal::SetUnionExplorer;
/// # fn demo(flip: impl localforge_solver::explorer::NeighborhoodExplorer<(), Vec<u8>> + 'static,
/// #         swap: impl localforge_solver::explorer::NeighborhoodExplorer<(), Vec<u8>> + 'static) {
/// let mut union = SetUnionExplorer::new("flip_or_swap");
/// union.add_base(flip);
/// union.add_base(swap);
/// union.set_bias(vec![0.7, 0.3]).unwrap();
/// # }
/// ```
pub struct SetUnionExplorer<I, S> {
    name: String,
    bases: Vec<Box<dyn BaseExplorer<I, S>>>,
    bias: Vec<f64>,
}

impl<I: 'static, S: State> SetUnionExplorer<I, S> {
    pub fn new(name: impl Into<String>) -> Self {
        SetUnionExplorer {
            name: name.into(),
            bases: Vec::new(),
            bias: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of base neighborhoods.
    pub fn modality(&self) -> usize {
        self.bases.len()
    }

    /// Registers a base explorer. Bias reverts to uniform.
    pub fn add_base(&mut self, explorer: impl NeighborhoodExplorer<I, S> + 'static) -> &mut Self {
        self.bases.push(erase(explorer));
        self.bias = Vec::new();
        self
    }

    /// Sets the per-base sampling bias. The vector must carry one positive
    /// entry per base; it need not sum to one.
    pub fn set_bias(&mut self, bias: Vec<f64>) -> Result<()> {
        if bias.len() != self.bases.len() {
            return Err(SearchError::incorrect_parameter(
                format!("{}.bias", self.name),
                format!("expected {} entries, got {}", self.bases.len(), bias.len()),
            ));
        }
        if bias.iter().any(|&b| b <= 0.0 || !b.is_finite()) {
            return Err(SearchError::incorrect_parameter(
                format!("{}.bias", self.name),
                "entries must be positive and finite",
            ));
        }
        self.bias = bias;
        Ok(())
    }

    /// The bias in effect; empty means uniform.
    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    fn draw_index(&self, rng: &mut StdRng) -> usize {
        if self.bias.is_empty() {
            return rng.random_range(0..self.bases.len());
        }
        let total: f64 = self.bias.iter().sum();
        let mut pick = rng.random_range(0.0..total);
        for (i, b) in self.bias.iter().enumerate() {
            if pick < *b {
                return i;
            }
            pick -= b;
        }
        self.bias.len() - 1
    }

    fn active_index(&self, mv: &CompositeMove) -> usize {
        mv.active_index()
            .expect("set-union composite move has no active component")
    }
}

impl<I: 'static, S: State> NeighborhoodExplorer<I, S> for SetUnionExplorer<I, S> {
    type Move = CompositeMove;

    fn first_move(&self, input: &I, state: &S) -> Result<CompositeMove> {
        for (i, base) in self.bases.iter().enumerate() {
            match base.first_move(input, state) {
                Ok(mv) => {
                    let mut composite = CompositeMove::inactive(self.bases.len());
                    composite.set_active(i, mv);
                    return Ok(composite);
                }
                Err(SearchError::EmptyNeighborhood) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SearchError::EmptyNeighborhood)
    }

    fn next_move(&self, input: &I, state: &S, mv: &mut CompositeMove) -> bool {
        let active = self.active_index(mv);
        if self.bases[active].next_move(input, state, mv.payload_mut(active)) {
            return true;
        }
        for i in active + 1..self.bases.len() {
            match self.bases[i].first_move(input, state) {
                Ok(first) => {
                    mv.set_inactive(active);
                    mv.set_active(i, first);
                    return true;
                }
                Err(_) => continue,
            }
        }
        false
    }

    fn random_move(&self, input: &I, state: &S, rng: &mut StdRng) -> Result<CompositeMove> {
        if self.bases.is_empty() {
            return Err(SearchError::EmptyNeighborhood);
        }
        let selected = self.draw_index(rng);
        // Scan the drawn base first, then subsequent and preceding ones.
        let order = (selected..self.bases.len()).chain(0..selected);
        for i in order {
            match self.bases[i].random_move(input, state, rng) {
                Ok(mv) => {
                    let mut composite = CompositeMove::inactive(self.bases.len());
                    composite.set_active(i, mv);
                    return Ok(composite);
                }
                Err(SearchError::EmptyNeighborhood) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SearchError::EmptyNeighborhood)
    }

    fn apply_move(&self, input: &I, state: &mut S, mv: &CompositeMove) {
        let active = self.active_index(mv);
        self.bases[active].apply_move(input, state, mv.payload_at(active));
    }

    fn is_feasible_move(&self, input: &I, state: &S, mv: &CompositeMove) -> bool {
        let active = self.active_index(mv);
        self.bases[active].is_feasible_move(input, state, mv.payload_at(active))
    }

    fn delta_cost(
        &self,
        input: &I,
        state: &S,
        mv: &CompositeMove,
        eval: &Evaluator<I, S>,
    ) -> CostStructure {
        let active = self.active_index(mv);
        self.bases[active].delta_cost(input, state, mv.payload_at(active), eval)
    }
}

impl<I: 'static, S: State> Parametrized for SetUnionExplorer<I, S> {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn parameter_schema(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new(
            "bias",
            "Per-base sampling bias (one positive entry per base)",
            ParameterKind::FloatVec,
        )]
    }

    fn apply_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(bias) = params.get_f64_vec(&self.name, "bias")? {
            self.set_bias(bias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{flip_eval, BitFlip, BitSet, FlipMove, SetMove, FLIP_INPUT};
    use rand::SeedableRng;

    fn union() -> SetUnionExplorer<(), Vec<u8>> {
        let mut union = SetUnionExplorer::new("flip_or_set");
        union.add_base(BitFlip);
        union.add_base(BitSet);
        union
    }

    #[test]
    fn enumeration_walks_bases_in_order() {
        let union = union();
        let state = vec![0u8, 1];
        let mut moves = Vec::new();
        let mut mv = union.first_move(&FLIP_INPUT, &state).unwrap();
        loop {
            moves.push(mv.clone());
            if !union.next_move(&FLIP_INPUT, &state, &mut mv) {
                break;
            }
        }
        // BitFlip yields 2 moves, BitSet yields one per clear bit (1 here).
        assert_eq!(moves.len(), 3);
        assert!(moves[0].payload::<FlipMove>(0).is_some());
        assert!(moves[1].payload::<FlipMove>(0).is_some());
        assert!(moves[2].payload::<SetMove>(1).is_some());
        assert!(moves.iter().all(|m| m.active_index().is_some()));
    }

    #[test]
    fn empty_first_base_is_skipped() {
        let mut union: SetUnionExplorer<(), Vec<u8>> = SetUnionExplorer::new("set_first");
        union.add_base(BitSet);
        union.add_base(BitFlip);
        // All bits set: BitSet has no moves, BitFlip still has three.
        let state = vec![1u8, 1, 1];
        let mv = union.first_move(&FLIP_INPUT, &state).unwrap();
        assert_eq!(mv.active_index(), Some(1));
    }

    #[test]
    fn all_bases_empty_is_an_empty_neighborhood() {
        let mut union: SetUnionExplorer<(), Vec<u8>> = SetUnionExplorer::new("none");
        union.add_base(BitSet);
        let state = vec![1u8];
        assert!(matches!(
            union.first_move(&FLIP_INPUT, &state),
            Err(SearchError::EmptyNeighborhood)
        ));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            union.random_move(&FLIP_INPUT, &state, &mut rng),
            Err(SearchError::EmptyNeighborhood)
        ));
    }

    #[test]
    fn dispatch_follows_the_active_component() {
        let union = union();
        let eval = flip_eval();
        let state = vec![0u8, 1];
        let mut mv = union.first_move(&FLIP_INPUT, &state).unwrap();
        // Walk to the BitSet move.
        while mv.active_index() == Some(0) {
            assert!(union.next_move(&FLIP_INPUT, &state, &mut mv));
        }
        let composite_delta = union.delta_cost(&FLIP_INPUT, &state, &mv, &eval);
        let mut applied = state.clone();
        union.apply_move(&FLIP_INPUT, &mut applied, &mv);
        assert_eq!(applied, vec![1u8, 1]);
        assert_eq!(composite_delta.cmp_scalar(1), std::cmp::Ordering::Equal);
    }

    #[test]
    fn bias_length_is_validated() {
        let mut union = union();
        assert!(union.set_bias(vec![0.5]).is_err());
        assert!(union.set_bias(vec![0.5, -1.0]).is_err());
        assert!(union.set_bias(vec![0.5, 0.5]).is_ok());
    }

    #[test]
    fn biased_sampling_prefers_the_heavier_base() {
        let mut union = union();
        union.set_bias(vec![0.9, 0.1]).unwrap();
        let state = vec![0u8, 0, 0, 0];
        let mut rng = StdRng::seed_from_u64(17);
        let mut first_base = 0u32;
        for _ in 0..500 {
            let mv = union.random_move(&FLIP_INPUT, &state, &mut rng).unwrap();
            if mv.active_index() == Some(0) {
                first_base += 1;
            }
        }
        assert!(first_base > 350, "drawn {first_base}/500 from the 0.9 base");
    }

    #[test]
    fn sampling_falls_through_to_a_nonempty_base() {
        let mut union: SetUnionExplorer<(), Vec<u8>> = SetUnionExplorer::new("fallback");
        union.add_base(BitSet);
        union.add_base(BitFlip);
        union.set_bias(vec![0.99, 0.01]).unwrap();
        // BitSet is empty on the all-ones state; sampling must fall through.
        let state = vec![1u8, 1];
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..32 {
            let mv = union.random_move(&FLIP_INPUT, &state, &mut rng).unwrap();
            assert_eq!(mv.active_index(), Some(1));
        }
    }
}
