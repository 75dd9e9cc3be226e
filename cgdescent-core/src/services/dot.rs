//! Inner products of state-shaped vectors.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::{Grid, StateFields};

/// Aggregate inner product at index 0 followed by one partial per field
/// group, in the grid's canonical group order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct DotResult(Vec<f64>);

impl TryFrom<Vec<f64>> for DotResult {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::shape("dot product", "an aggregate value", "no values"));
        }
        Ok(Self(values))
    }
}

impl DotResult {
    /// All-zero result for `n_groups` field groups.
    pub fn zeros(n_groups: usize) -> Self {
        Self(vec![0.0; n_groups + 1])
    }

    /// Build from per-group partials; the aggregate is their ordered sum.
    pub fn from_partials(partials: Vec<f64>) -> Self {
        let total: f64 = partials.iter().sum();
        let mut values = Vec::with_capacity(partials.len() + 1);
        values.push(total);
        values.extend(partials);
        Self(values)
    }

    pub fn total(&self) -> f64 {
        self.0[0]
    }

    pub fn partials(&self) -> &[f64] {
        &self.0[1..]
    }

    /// Number of field groups covered.
    pub fn n_groups(&self) -> usize {
        self.0.len() - 1
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }
}

/// Whole-domain inner product service.
///
/// Implementations must be bilinear and symmetric to floating-point
/// tolerance and must ignore inactive points. A distributed implementation
/// performs its global reduction inside `dot`.
pub trait DotProduct {
    fn dot(&self, grid: &Grid, a: &StateFields, b: &StateFields) -> Result<DotResult>;
}

impl<T: DotProduct + ?Sized> DotProduct for &T {
    fn dot(&self, grid: &Grid, a: &StateFields, b: &StateFields) -> Result<DotResult> {
        (**self).dot(grid, a, b)
    }
}

/// Single-process inner product over the whole grid.
///
/// Field groups are reduced in parallel; each group is summed sequentially
/// and the aggregate is taken in group order, so results do not depend on
/// the thread count.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalDotProduct;

impl DotProduct for LocalDotProduct {
    fn dot(&self, grid: &Grid, a: &StateFields, b: &StateFields) -> Result<DotResult> {
        grid.check_shape(a, "left operand")?;
        grid.check_shape(b, "right operand")?;

        let n = grid.horizontal_len();
        let pairs: Vec<_> = a.fields().into_iter().zip(b.fields()).collect();
        let partials: Vec<f64> = pairs
            .par_iter()
            .map(|((group, fa), (_, fb))| {
                let mask = grid.mask_for(*group);
                fa.values()
                    .iter()
                    .zip(fb.values())
                    .enumerate()
                    .filter(|(idx, _)| mask[idx % n])
                    .map(|(_, (x, y))| x * y)
                    .sum::<f64>()
            })
            .collect();

        let result = DotResult::from_partials(partials);
        if !result.total().is_finite() {
            return Err(Error::DotProduct(format!(
                "grid {}: non-finite inner product {}",
                grid.id(),
                result.total()
            )));
        }
        Ok(result)
    }
}
