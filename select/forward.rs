//! Forward stepwise selection of regression covariates.
//!
//! Starting from an intercept-only model, the driver repeatedly adds the one
//! candidate covariate that most reduces the residual sum of squares, until
//! the model reaches the requested size. This greedy walk approximates
//! best-subset regression when the candidate count makes exhaustive search
//! infeasible, which is the normal situation for genetic marker panels.
//!
//! Within a step every remaining candidate is scored independently against
//! the model fixed by the previous steps, so the scoring fans out across
//! worker threads; the argmin and all bookkeeping happen on the calling
//! thread after the fan-in. Steps themselves are inherently sequential.
//!
//! The driver operates on abstract candidate *units* of one or more
//! contiguous columns, which is how the intercross variant reuses it: a
//! three-class marker enters or leaves the model as its whole pair of
//! indicator columns.

use crate::intercross::ExpansionError;
use crate::ols::{self, FitError, LeastSquaresFit};
use itertools::izip;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RSS values within `tie_tol * (1 + |minimum|)` of a step's minimum are
/// treated as tied, and the tie resolves to the smallest candidate index.
pub const DEFAULT_TIE_TOL: f64 = 1e-12;

/// Errors from a forward-selection run.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error(
        "invalid dimensions: n={n}, m={m}, maxsize={maxsize}; require n >= 1, m >= 1, and 1 <= maxsize <= m"
    )]
    InvalidDimension { n: usize, m: usize, maxsize: usize },

    #[error("covariate matrix has {x_rows} rows but the response has {y_len} entries")]
    DimensionMismatch { x_rows: usize, y_len: usize },

    #[error("non-finite value found in the {what}; all inputs must be finite")]
    NonFiniteData { what: &'static str },

    #[error(
        "no remaining candidate admits a well-posed fit at step {step}; completed {completed} of {requested} steps"
    )]
    Unselectable {
        step: usize,
        completed: usize,
        requested: usize,
    },

    #[error(transparent)]
    MissingData(#[from] ExpansionError),
}

/// Numeric tolerances governing the selection run.
///
/// These are the only configuration the algorithm carries. The defaults are
/// appropriate for double-precision genotype and phenotype data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Relative singular-value threshold used when reporting the effective
    /// rank of each candidate design. See [`ols::fit_rss`].
    pub singularity_tol: f64,
    /// Relative RSS window within which candidates count as tied; ties go to
    /// the smallest candidate index so runs are reproducible.
    pub tie_tol: f64,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            singularity_tol: ols::DEFAULT_SINGULARITY_TOL,
            tie_tol: DEFAULT_TIE_TOL,
        }
    }
}

/// The full history of a selection run: which candidate was added at each
/// step, and the RSS of the model after that addition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionTrace {
    /// Candidate indices in selection order; pairwise distinct.
    pub chosen: Vec<usize>,
    /// `rss[k]` is the RSS of the model containing `chosen[0..=k]` plus the
    /// intercept. Non-increasing in `k`.
    pub rss: Vec<f64>,
}

impl SelectionTrace {
    /// Number of completed selection steps.
    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    /// Iterates over `(chosen index, rss)` pairs in selection order.
    pub fn steps(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        izip!(&self.chosen, &self.rss).map(|(&index, &rss)| (index, rss))
    }
}

/// Selects up to `maxsize` covariates of `x` by forward stepwise regression
/// of `y` on the columns of `x`.
///
/// `x` has one row per individual and one column per candidate covariate;
/// `y` is the response, one entry per individual. The model always contains
/// an intercept, which does not count towards `maxsize`.
///
/// Returns the selection trace, or an error if the inputs are malformed or
/// some step has no well-posed candidate left (see
/// [`SelectionError::Unselectable`]; the run is not silently truncated).
pub fn forward_select(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    maxsize: usize,
    options: &SelectionOptions,
) -> Result<SelectionTrace, SelectionError> {
    validate_problem(x.nrows(), y, x.ncols(), maxsize)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SelectionError::NonFiniteData {
            what: "covariate matrix",
        });
    }
    select_units(x, y, 1, maxsize, options)
}

/// Shared input validation for both selection variants. `m` is the candidate
/// count in selection units: covariates for the single-column variant,
/// markers for the intercross variant.
pub(crate) fn validate_problem(
    x_rows: usize,
    y: ArrayView1<f64>,
    m: usize,
    maxsize: usize,
) -> Result<(), SelectionError> {
    let n = y.len();
    if n == 0 || m == 0 || maxsize == 0 || maxsize > m {
        return Err(SelectionError::InvalidDimension { n, m, maxsize });
    }
    if x_rows != n {
        return Err(SelectionError::DimensionMismatch { x_rows, y_len: n });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(SelectionError::NonFiniteData {
            what: "response vector",
        });
    }
    Ok(())
}

/// The greedy loop. Candidate unit `u` owns the contiguous columns
/// `u * unit_width .. (u + 1) * unit_width` of `pool`.
pub(crate) fn select_units(
    pool: ArrayView2<f64>,
    y: ArrayView1<f64>,
    unit_width: usize,
    maxsize: usize,
    options: &SelectionOptions,
) -> Result<SelectionTrace, SelectionError> {
    let n = pool.nrows();
    let n_units = pool.ncols() / unit_width;
    log::info!(
        "starting forward selection: {} candidates, {} individuals, target model size {}",
        n_units,
        n,
        maxsize
    );

    // Ascending order here is what makes "first within the tie window" mean
    // "smallest index" during the argmin.
    let mut remaining: Vec<usize> = (0..n_units).collect();
    let mut chosen: Vec<usize> = Vec::with_capacity(maxsize);
    let mut rss_trace: Vec<f64> = Vec::with_capacity(maxsize);
    let mut base = Array2::<f64>::ones((n, 1));

    for step in 1..=maxsize {
        let scored: Vec<(usize, Result<LeastSquaresFit, FitError>)> = remaining
            .par_iter()
            .map(|&unit| {
                let design = append_unit(&base, pool, unit, unit_width);
                (
                    unit,
                    ols::fit_rss(y, design.view(), options.singularity_tol),
                )
            })
            .collect();

        let skipped = scored.iter().filter(|(_, fit)| fit.is_err()).count();
        let Some((best_unit, best_fit)) = argmin_with_ties(&scored, options.tie_tol) else {
            log::warn!(
                "step {}: all {} remaining candidates are ill-posed, aborting",
                step,
                remaining.len()
            );
            return Err(SelectionError::Unselectable {
                step,
                completed: chosen.len(),
                requested: maxsize,
            });
        };

        log::debug!(
            "step {}: selected candidate {} with rss {:.6e} (design rank {}, {} candidates skipped)",
            step,
            best_unit,
            best_fit.rss,
            best_fit.rank,
            skipped
        );

        base = append_unit(&base, pool, best_unit, unit_width);
        remaining.retain(|&unit| unit != best_unit);
        chosen.push(best_unit);
        rss_trace.push(best_fit.rss);
    }

    log::info!(
        "forward selection complete: chose {:?}, final rss {:.6e}",
        chosen,
        rss_trace[rss_trace.len() - 1]
    );
    Ok(SelectionTrace {
        chosen,
        rss: rss_trace,
    })
}

/// Returns `base` extended on the right by candidate `unit`'s columns.
fn append_unit(
    base: &Array2<f64>,
    pool: ArrayView2<f64>,
    unit: usize,
    unit_width: usize,
) -> Array2<f64> {
    let columns = pool.slice(s![.., unit * unit_width..(unit + 1) * unit_width]);
    concatenate(Axis(1), &[base.view(), columns]).expect("design concatenation")
}

/// Argmin over the successfully scored candidates, resolving near-ties to the
/// smallest candidate index. `None` when no candidate scored successfully.
fn argmin_with_ties<'a>(
    scored: &'a [(usize, Result<LeastSquaresFit, FitError>)],
    tie_tol: f64,
) -> Option<(usize, &'a LeastSquaresFit)> {
    let min_rss = scored
        .iter()
        .filter_map(|(_, fit)| fit.as_ref().ok())
        .map(|fit| fit.rss)
        .fold(f64::INFINITY, f64::min);
    if !min_rss.is_finite() {
        return None;
    }

    let cutoff = min_rss + tie_tol * (1.0 + min_rss.abs());
    scored
        .iter()
        .filter_map(|(unit, fit)| fit.as_ref().ok().map(|f| (*unit, f)))
        .filter(|(_, fit)| fit.rss <= cutoff)
        .min_by_key(|(unit, _)| *unit)
}
