//! Ordinary least-squares evaluation of a candidate design matrix.
//!
//! The selection loop only ever asks one question of a model: what residual
//! sum of squares does it achieve? This module answers it through an
//! SVD-based least-squares solve, which stays exact for rank-deficient
//! designs where a normal-equations solve would produce garbage. Rank
//! deficiency leaves the minimized RSS well defined (only the coefficient
//! vector is non-unique), so a collinear candidate reports its true, possibly
//! zero, marginal contribution instead of failing the whole step.

use ndarray::{ArrayView1, ArrayView2};
use ndarray_linalg::LeastSquaresSvd;
use thiserror::Error;

/// Relative singular-value threshold below which a direction of the design
/// is treated as numerically absent when reporting the effective rank.
pub const DEFAULT_SINGULARITY_TOL: f64 = 1e-10;

/// Errors from evaluating a single least-squares fit.
#[derive(Error, Debug)]
pub enum FitError {
    #[error(
        "design matrix with {ncols} columns is saturated for {nrows} observations; the fit has no residual degrees of freedom"
    )]
    SingularDesign { ncols: usize, nrows: usize },

    #[error("SVD least-squares decomposition failed: {0}")]
    DecompositionFailed(#[from] ndarray_linalg::error::LinalgError),
}

/// Summary of one ordinary least-squares fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresFit {
    /// Residual sum of squares of the fitted model.
    pub rss: f64,
    /// Effective numerical rank of the design matrix, counted from the
    /// singular values against `singularity_tol`.
    pub rank: usize,
}

/// Fits `y ~ design` by ordinary least squares and returns the residual sum
/// of squares together with the effective rank of the design.
///
/// `design` must contain every model column including the intercept, one row
/// per individual; `y` must have the same length as `design` has rows.
///
/// A design with at least as many columns as rows is rejected as
/// [`FitError::SingularDesign`]: with no residual degrees of freedom the RSS
/// is identically zero and carries no information for selection. A merely
/// rank-deficient design (fewer independent columns than columns) is *not*
/// rejected; the SVD minimum-norm solution attains the true minimal RSS and
/// the deficiency is visible in the reported `rank`.
///
/// Pure function of its inputs; safe to call concurrently.
pub fn fit_rss(
    y: ArrayView1<f64>,
    design: ArrayView2<f64>,
    singularity_tol: f64,
) -> Result<LeastSquaresFit, FitError> {
    let nrows = design.nrows();
    let ncols = design.ncols();
    if ncols >= nrows {
        return Err(FitError::SingularDesign { ncols, nrows });
    }

    let design = design.to_owned();
    let response = y.to_owned();
    let solved = design.least_squares(&response)?;

    // RSS is computed from the fitted values rather than taken from the
    // decomposition output, which is only populated for full-rank systems.
    let fitted = design.dot(&solved.solution);
    let rss = response
        .iter()
        .zip(fitted.iter())
        .map(|(&observed, &predicted)| {
            let r = observed - predicted;
            r * r
        })
        .sum();

    let max_singular_value = solved
        .singular_values
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max);
    let rank = solved
        .singular_values
        .iter()
        .filter(|&&s| s > singularity_tol * max_singular_value)
        .count();

    Ok(LeastSquaresFit { rss, rank })
}
