use crate::error::{Error, Result};
use crate::services::{DotProduct, GradientHistory};
use crate::solvers::common::step::ensure_finite;
use crate::state::{Grid, StateFields};

/// Gram-Schmidt factor applied for one history record.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordProjection {
    pub record: usize,
    /// `<G,G(r)> / <G(r),G(r)>`
    pub coefficient: f64,
    /// `<G(r),G(r)>`
    pub record_norm_sq: f64,
    /// `<G,G(r)>` after the full pass; only filled in verification mode.
    pub residual: Option<f64>,
}

/// What [`orthogonalize_against_history`] did to a gradient.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrthogonalizationReport {
    /// One entry per record, in processing order (newest first).
    pub projections: Vec<RecordProjection>,
    /// `1/sqrt(<G,G>)` when normalization was applied.
    pub normalization: Option<f64>,
}

impl OrthogonalizationReport {
    /// Largest `|<G,G(r)>|` seen in verification mode.
    pub fn max_residual(&self) -> Option<f64> {
        self.projections
            .iter()
            .filter_map(|p| p.residual)
            .map(f64::abs)
            .reduce(f64::max)
    }
}

/// Remove from `gradient` its components along history records
/// `iteration, iteration - 1, ..., 1`, in that order, in a single pass.
///
/// Records are assumed mutually orthogonal already. `scratch` receives each
/// record in turn and is left holding record 1.
#[allow(clippy::too_many_arguments)]
pub fn orthogonalize_against_history<D, H>(
    grid: &Grid,
    gradient: &mut StateFields,
    scratch: &mut StateFields,
    iteration: usize,
    dot: &D,
    history: &H,
    normalize: bool,
    verify: bool,
) -> Result<OrthogonalizationReport>
where
    D: DotProduct + ?Sized,
    H: GradientHistory + ?Sized,
{
    let mut report = OrthogonalizationReport::default();

    for record in (1..=iteration).rev() {
        history.load_into(grid, record, scratch)?;
        grid.mask_in_place(scratch);

        let new_r = dot.dot(grid, gradient, scratch)?.total();
        let old_r = dot.dot(grid, scratch, scratch)?.total();
        if old_r == 0.0 {
            return Err(Error::ZeroNorm {
                iteration,
                quantity: "<G(r),G(r)>",
            });
        }
        let coefficient = ensure_finite(iteration, "orthogonalization factor", new_r / old_r)?;
        grid.project_out(gradient, scratch, coefficient)?;

        tracing::debug!(
            grid = %grid.id(),
            iteration,
            record,
            coefficient,
            record_norm_sq = old_r,
            "gradient orthogonalized against record"
        );
        report.projections.push(RecordProjection {
            record,
            coefficient,
            record_norm_sq: old_r,
            residual: None,
        });
    }

    if normalize {
        let norm_sq = dot.dot(grid, gradient, gradient)?.total();
        if norm_sq == 0.0 {
            return Err(Error::ZeroNorm {
                iteration,
                quantity: "<G,G> before normalization",
            });
        }
        let factor = ensure_finite(iteration, "normalization factor", 1.0 / norm_sq.sqrt())?;
        grid.scale_in_place(gradient, factor)?;
        tracing::debug!(grid = %grid.id(), iteration, factor, "gradient normalized");
        report.normalization = Some(factor);
    }

    if verify {
        for projection in report.projections.iter_mut() {
            history.load_into(grid, projection.record, scratch)?;
            grid.mask_in_place(scratch);
            let residual = dot.dot(grid, gradient, scratch)?.total();
            tracing::debug!(
                grid = %grid.id(),
                iteration,
                record = projection.record,
                residual,
                record_norm_sq = projection.record_norm_sq,
                "orthogonality check"
            );
            projection.residual = Some(residual);
        }
    }

    Ok(report)
}
