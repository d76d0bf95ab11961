//! Cost structures for representing solution quality.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Tolerance used when comparing weighted (floating-point) costs.
pub const COST_EPSILON: f64 = 1e-6;

#[inline]
pub(crate) fn approx_cmp(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= COST_EPSILON {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// The cost of a state (or the delta cost of a move), broken down by
/// component.
///
/// A cost bundles the aggregated `total`, the hard-constraint `violations`,
/// the soft-constraint `objective`, the per-component vector, and an
/// optional floating-point `weighted` total. The invariant
/// `total == hard_weight * violations + objective` is maintained by the
/// [`Evaluator`](crate::eval::Evaluator) that produces costs.
///
/// Two ordering regimes are available:
///
/// * **Aggregated** ([`cmp_aggregated`](Self::cmp_aggregated), also exposed
///   through `PartialOrd`): compares the `weighted` value when both operands
///   carry one, the `total` otherwise.
/// * **Hierarchical** ([`cmp_hierarchical`](Self::cmp_hierarchical)):
///   lexicographic over the component vector.
///
/// # Examples
///
/// ```
/// use localforge_core::cost::CostStructure;
///
/// let a = CostStructure::new(10, 0, 10, vec![0, 10]);
/// let b = CostStructure::new(1000, 1, 0, vec![1, 0]);
///
/// // Aggregated: a.total < b.total.
/// assert!(a < b);
/// // Hierarchical: the first component decides.
/// assert!(a.cmp_hierarchical(&b).is_lt());
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostStructure {
    /// Aggregated total: `hard_weight * violations + objective`.
    pub total: i64,
    /// Sum of the hard component costs.
    pub violations: i64,
    /// Sum of the soft component costs.
    pub objective: i64,
    /// One entry per registered cost component.
    pub components: Vec<i64>,
    /// Scalar total under user-supplied component weights.
    pub weighted: f64,
    /// Whether `weighted` carries a meaningful value.
    pub is_weighted: bool,
}

impl CostStructure {
    /// The zero cost with an empty component vector.
    pub fn zero() -> Self {
        CostStructure::default()
    }

    /// Creates an unweighted cost; `weighted` mirrors `total`.
    pub fn new(total: i64, violations: i64, objective: i64, components: Vec<i64>) -> Self {
        CostStructure {
            total,
            violations,
            objective,
            components,
            weighted: total as f64,
            is_weighted: false,
        }
    }

    /// Creates a weighted cost carrying an explicit scalar total.
    pub fn weighted(
        total: i64,
        weighted: f64,
        violations: i64,
        objective: i64,
        components: Vec<i64>,
    ) -> Self {
        CostStructure {
            total,
            violations,
            objective,
            components,
            weighted,
            is_weighted: true,
        }
    }

    /// Number of component entries.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the component vector is empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The scalar value used by the aggregated regime: `weighted` when
    /// weighted, `total` otherwise.
    #[inline]
    pub fn scalar(&self) -> f64 {
        if self.is_weighted {
            self.weighted
        } else {
            self.total as f64
        }
    }

    /// Compares under the aggregated regime: `weighted` when both operands
    /// carry weights, `total` otherwise.
    pub fn cmp_aggregated(&self, other: &CostStructure) -> Ordering {
        if self.is_weighted && other.is_weighted {
            approx_cmp(self.weighted, other.weighted)
        } else {
            self.total.cmp(&other.total)
        }
    }

    /// Compares lexicographically over the component vectors. A missing
    /// entry on either side is treated as zero; equality at every position
    /// means equality.
    pub fn cmp_hierarchical(&self, other: &CostStructure) -> Ordering {
        let n = self.components.len().max(other.components.len());
        for i in 0..n {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }

    /// Compares against a bare scalar, which stands for `total` (or for
    /// `weighted` when this cost is weighted).
    pub fn cmp_scalar(&self, k: i64) -> Ordering {
        if self.is_weighted {
            approx_cmp(self.weighted, k as f64)
        } else {
            self.total.cmp(&k)
        }
    }
}

impl AddAssign<&CostStructure> for CostStructure {
    fn add_assign(&mut self, other: &CostStructure) {
        self.total += other.total;
        self.violations += other.violations;
        self.objective += other.objective;
        if self.components.len() < other.components.len() {
            self.components.resize(other.components.len(), 0);
        }
        for (i, c) in other.components.iter().enumerate() {
            self.components[i] += c;
        }
        if self.is_weighted || other.is_weighted {
            self.weighted = self.scalar() + other.scalar();
            self.is_weighted = true;
        } else {
            self.weighted = self.total as f64;
        }
    }
}

impl SubAssign<&CostStructure> for CostStructure {
    fn sub_assign(&mut self, other: &CostStructure) {
        self.total -= other.total;
        self.violations -= other.violations;
        self.objective -= other.objective;
        if self.components.len() < other.components.len() {
            self.components.resize(other.components.len(), 0);
        }
        for (i, c) in other.components.iter().enumerate() {
            self.components[i] -= c;
        }
        if self.is_weighted || other.is_weighted {
            self.weighted = self.scalar() - other.scalar();
            self.is_weighted = true;
        } else {
            self.weighted = self.total as f64;
        }
    }
}

impl Add<&CostStructure> for &CostStructure {
    type Output = CostStructure;

    fn add(self, other: &CostStructure) -> CostStructure {
        let mut res = self.clone();
        res += other;
        res
    }
}

impl Sub<&CostStructure> for &CostStructure {
    type Output = CostStructure;

    fn sub(self, other: &CostStructure) -> CostStructure {
        let mut res = self.clone();
        res -= other;
        res
    }
}

impl PartialEq for CostStructure {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_aggregated(other) == Ordering::Equal
    }
}

impl PartialOrd for CostStructure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_aggregated(other))
    }
}

impl PartialEq<i64> for CostStructure {
    fn eq(&self, k: &i64) -> bool {
        self.cmp_scalar(*k) == Ordering::Equal
    }
}

impl PartialOrd<i64> for CostStructure {
    fn partial_cmp(&self, k: &i64) -> Option<Ordering> {
        Some(self.cmp_scalar(*k))
    }
}

impl fmt::Display for CostStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (viol: {}, obj: {}, comps: {:?})",
            self.total, self.violations, self.objective, self.components
        )?;
        if self.is_weighted {
            write!(f, " [weighted: {}]", self.weighted)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CostStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
