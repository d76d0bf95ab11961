//! Shared test models: tiny bit-vector neighborhoods and N-Queens.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use localforge_core::{Evaluator, FnCostComponent, Result, SearchError, StateManager};

use crate::explorer::NeighborhoodExplorer;

/// Input of the bit-vector models; the state length carries everything.
pub const FLIP_INPUT: () = ();

/// Flip the bit at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipMove {
    pub index: usize,
}

/// Neighborhood of all single-bit flips.
pub struct BitFlip;

impl NeighborhoodExplorer<(), Vec<u8>> for BitFlip {
    type Move = FlipMove;

    fn first_move(&self, _input: &(), state: &Vec<u8>) -> Result<FlipMove> {
        if state.is_empty() {
            return Err(SearchError::EmptyNeighborhood);
        }
        Ok(FlipMove { index: 0 })
    }

    fn next_move(&self, _input: &(), state: &Vec<u8>, mv: &mut FlipMove) -> bool {
        if mv.index + 1 < state.len() {
            mv.index += 1;
            true
        } else {
            false
        }
    }

    fn random_move(&self, _input: &(), state: &Vec<u8>, rng: &mut StdRng) -> Result<FlipMove> {
        if state.is_empty() {
            return Err(SearchError::EmptyNeighborhood);
        }
        Ok(FlipMove {
            index: rng.random_range(0..state.len()),
        })
    }

    fn apply_move(&self, _input: &(), state: &mut Vec<u8>, mv: &FlipMove) {
        state[mv.index] ^= 1;
    }
}

/// Set the clear bit at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMove {
    pub index: usize,
}

/// Neighborhood of all clear bits; empty on the all-ones state.
pub struct BitSet;

impl BitSet {
    fn next_clear(state: &[u8], from: usize) -> Option<usize> {
        (from..state.len()).find(|&i| state[i] == 0)
    }
}

impl NeighborhoodExplorer<(), Vec<u8>> for BitSet {
    type Move = SetMove;

    fn first_move(&self, _input: &(), state: &Vec<u8>) -> Result<SetMove> {
        Self::next_clear(state, 0)
            .map(|index| SetMove { index })
            .ok_or(SearchError::EmptyNeighborhood)
    }

    fn next_move(&self, _input: &(), state: &Vec<u8>, mv: &mut SetMove) -> bool {
        match Self::next_clear(state, mv.index + 1) {
            Some(index) => {
                mv.index = index;
                true
            }
            None => false,
        }
    }

    fn random_move(&self, _input: &(), state: &Vec<u8>, rng: &mut StdRng) -> Result<SetMove> {
        let clear: Vec<usize> = (0..state.len()).filter(|&i| state[i] == 0).collect();
        if clear.is_empty() {
            return Err(SearchError::EmptyNeighborhood);
        }
        Ok(SetMove {
            index: clear[rng.random_range(0..clear.len())],
        })
    }

    fn apply_move(&self, _input: &(), state: &mut Vec<u8>, mv: &SetMove) {
        state[mv.index] = 1;
    }
}

/// Evaluator counting set bits as a soft objective.
pub fn flip_eval() -> Evaluator<(), Vec<u8>> {
    let mut eval = Evaluator::new();
    eval.add_component(FnCostComponent::new("ones", false, |_: &(), state: &Vec<u8>| {
        state.iter().filter(|&&b| b == 1).count() as i64
    }));
    eval
}

/// The N-Queens benchmark instance.
#[derive(Debug, Clone, Copy)]
pub struct NQueens {
    pub n: usize,
}

/// A board as a permutation: `rows[col]` is the row of the queen in
/// `col`. Row and column conflicts are impossible by construction, so
/// only the diagonals cost anything.
pub type Board = Vec<usize>;

/// State manager drawing random permutations.
pub struct QueensManager;

impl StateManager<NQueens, Board> for QueensManager {
    fn random_state(&self, input: &NQueens, rng: &mut StdRng) -> Board {
        let mut rows: Board = (0..input.n).collect();
        rows.shuffle(rng);
        rows
    }

    fn check_consistency(&self, input: &NQueens, state: &Board) -> bool {
        if state.len() != input.n {
            return false;
        }
        let mut seen = vec![false; input.n];
        for &row in state {
            if row >= input.n || seen[row] {
                return false;
            }
            seen[row] = true;
        }
        true
    }
}

fn diagonal_conflicts(offsets: impl Iterator<Item = usize>, buckets: usize) -> i64 {
    let mut histogram = vec![0i64; buckets];
    for offset in offsets {
        histogram[offset] += 1;
    }
    histogram.iter().map(|&k| k * (k - 1) / 2).sum()
}

/// Evaluator with one hard component per diagonal direction, each
/// counting the conflicting queen pairs. The hard weight is one so that
/// annealing temperatures work in conflict units.
pub fn queens_eval() -> Evaluator<NQueens, Board> {
    let mut eval = Evaluator::new().with_hard_weight(1);
    eval.add_component(FnCostComponent::new(
        "main_diagonals",
        true,
        |input: &NQueens, state: &Board| {
            let n = input.n;
            diagonal_conflicts(
                state.iter().enumerate().map(|(col, &row)| row + n - 1 - col),
                2 * n.max(1) - 1,
            )
        },
    ));
    eval.add_component(FnCostComponent::new(
        "anti_diagonals",
        true,
        |_input: &NQueens, state: &Board| {
            let n = state.len();
            diagonal_conflicts(
                state.iter().enumerate().map(|(col, &row)| row + col),
                2 * n.max(1) - 1,
            )
        },
    ));
    eval
}

/// Swap the queens of two columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapMove {
    pub i: usize,
    pub j: usize,
}

/// Neighborhood of all column swaps, enumerated lexicographically.
pub struct SwapQueens;

impl NeighborhoodExplorer<NQueens, Board> for SwapQueens {
    type Move = SwapMove;

    fn first_move(&self, input: &NQueens, _state: &Board) -> Result<SwapMove> {
        if input.n < 2 {
            return Err(SearchError::EmptyNeighborhood);
        }
        Ok(SwapMove { i: 0, j: 1 })
    }

    fn next_move(&self, input: &NQueens, _state: &Board, mv: &mut SwapMove) -> bool {
        if mv.j + 1 < input.n {
            mv.j += 1;
            true
        } else if mv.i + 2 < input.n {
            mv.i += 1;
            mv.j = mv.i + 1;
            true
        } else {
            false
        }
    }

    fn random_move(&self, input: &NQueens, _state: &Board, rng: &mut StdRng) -> Result<SwapMove> {
        if input.n < 2 {
            return Err(SearchError::EmptyNeighborhood);
        }
        let i = rng.random_range(0..input.n);
        let mut j = rng.random_range(0..input.n - 1);
        if j >= i {
            j += 1;
        }
        Ok(SwapMove {
            i: i.min(j),
            j: i.max(j),
        })
    }

    fn apply_move(&self, _input: &NQueens, state: &mut Board, mv: &SwapMove) {
        state.swap(mv.i, mv.j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn queens_cost_counts_diagonal_pairs() {
        let input = NQueens { n: 4 };
        let eval = queens_eval();
        // Identity permutation: all four queens share the main diagonal.
        let cost = eval.cost_function(&input, &vec![0, 1, 2, 3]);
        assert_eq!(cost.components, vec![6, 0]);
        assert_eq!(cost.violations, 6);

        // A solution for n = 4.
        let solved = eval.cost_function(&input, &vec![1, 3, 0, 2]);
        assert_eq!(solved.total, 0);
    }

    #[test]
    fn swap_neighborhood_has_n_choose_2_moves() {
        let input = NQueens { n: 5 };
        let state: Board = (0..5).collect();
        assert_eq!(SwapQueens.neighborhood_size(&input, &state), 10);
    }

    #[test]
    fn random_swaps_are_normalized_and_distinct() {
        let input = NQueens { n: 6 };
        let state: Board = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..100 {
            let mv = SwapQueens.random_move(&input, &state, &mut rng).unwrap();
            assert!(mv.i < mv.j);
            assert!(mv.j < 6);
        }
    }

    #[test]
    fn random_boards_are_permutations() {
        let input = NQueens { n: 12 };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            let board = QueensManager.random_state(&input, &mut rng);
            assert!(QueensManager.check_consistency(&input, &board));
        }
    }
}
