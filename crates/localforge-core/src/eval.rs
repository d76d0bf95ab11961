//! State evaluation over a vector of cost components.

use std::cmp::Ordering;

use rand::rngs::StdRng;

use crate::component::CostComponent;
use crate::cost::CostStructure;
use crate::domain::StateManager;
use crate::error::{Result, SearchError};

/// The default weight applied to hard-constraint violations in the
/// aggregated total.
pub const DEFAULT_HARD_WEIGHT: i64 = 1000;

/// Evaluates states against the registered cost components.
///
/// The evaluator owns the component vector, the hard-constraint weight
/// (a configuration value, not a process global), and the optional
/// per-component weights that turn on the weighted scalar total.
///
/// # Examples
///
/// ```
/// use localforge_core::component::FnCostComponent;
/// use localforge_core::eval::Evaluator;
///
/// let mut eval: Evaluator<(), Vec<i64>> = Evaluator::new();
/// eval.add_component(FnCostComponent::new("ones", true, |_: &(), s: &Vec<i64>| {
///     s.iter().filter(|&&x| x == 1).count() as i64
/// }));
/// let cost = eval.cost_function(&(), &vec![1, 0, 1]);
/// assert_eq!(cost.violations, 2);
/// assert_eq!(cost.total, 2000);
/// ```
pub struct Evaluator<I, S> {
    components: Vec<Box<dyn CostComponent<I, S>>>,
    hard_weight: i64,
    weights: Option<Vec<f64>>,
}

impl<I, S> Default for Evaluator<I, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, S> Evaluator<I, S> {
    /// Creates an evaluator with no components and the default hard weight.
    pub fn new() -> Self {
        Evaluator {
            components: Vec::new(),
            hard_weight: DEFAULT_HARD_WEIGHT,
            weights: None,
        }
    }

    /// Overrides the hard-constraint weight.
    pub fn with_hard_weight(mut self, hard_weight: i64) -> Self {
        self.hard_weight = hard_weight;
        self
    }

    /// Registers a cost component.
    pub fn add_component(&mut self, component: impl CostComponent<I, S> + 'static) -> &mut Self {
        self.components.push(Box::new(component));
        self
    }

    /// Enables the weighted scalar total. The vector must carry one weight
    /// per registered component.
    pub fn set_weights(&mut self, weights: Vec<f64>) -> Result<()> {
        if weights.len() != self.components.len() {
            return Err(SearchError::incorrect_parameter(
                "weights",
                format!(
                    "expected {} entries, got {}",
                    self.components.len(),
                    weights.len()
                ),
            ));
        }
        self.weights = Some(weights);
        Ok(())
    }

    /// Number of registered components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// The hard-constraint weight in effect.
    pub fn hard_weight(&self) -> i64 {
        self.hard_weight
    }

    /// Name of the `index`-th registered component.
    pub fn component_name(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(|c| c.name())
    }

    /// Evaluates every registered component against `state`.
    pub fn cost_function(&self, input: &I, state: &S) -> CostStructure {
        let mut violations = 0i64;
        let mut objective = 0i64;
        let mut components = Vec::with_capacity(self.components.len());
        let mut weighted = 0.0f64;

        for (i, component) in self.components.iter().enumerate() {
            let cost = component.cost(input, state);
            components.push(cost);
            if component.is_hard() {
                violations += cost;
            } else {
                objective += cost;
            }
            if let Some(weights) = &self.weights {
                weighted += weights[i] * cost as f64;
            }
        }

        let total = self.hard_weight * violations + objective;
        if self.weights.is_some() {
            CostStructure::weighted(total, weighted, violations, objective, components)
        } else {
            CostStructure::new(total, violations, objective, components)
        }
    }

    /// Cost difference between two full evaluations.
    pub fn delta(&self, input: &I, before: &S, after: &S) -> CostStructure {
        &self.cost_function(input, after) - &self.cost_function(input, before)
    }

    /// Draws `trials` independent random states and returns the one of
    /// minimum cost together with its cost.
    pub fn sample_state(
        &self,
        manager: &dyn StateManager<I, S>,
        input: &I,
        trials: u32,
        rng: &mut StdRng,
    ) -> Result<(S, CostStructure)> {
        if trials == 0 {
            return Err(SearchError::incorrect_parameter(
                "init_trials",
                "must be at least 1",
            ));
        }
        let mut best = manager.random_state(input, rng);
        let mut best_cost = self.cost_function(input, &best);
        for _ in 1..trials {
            let candidate = manager.random_state(input, rng);
            let cost = self.cost_function(input, &candidate);
            if cost.cmp_aggregated(&best_cost) == Ordering::Less {
                best = candidate;
                best_cost = cost;
            }
        }
        Ok((best, best_cost))
    }

    /// Whether `cost` has reached the problem's lower bound (zero by
    /// default).
    pub fn lower_bound_reached(&self, cost: &CostStructure) -> bool {
        cost.cmp_scalar(0) == Ordering::Equal
    }
}
