//! Paired-column selection for intercross genotype data.
//!
//! An intercross marker takes one of three genotype classes, coded 1 (AA),
//! 2 (AB), or 3 (BB). A three-class factor needs two indicator columns in a
//! linear model, with the third class absorbed by the intercept, so each
//! marker expands to a column pair and the selection loop adds or withholds
//! the pair as a whole. Unrecognized codes fail the call outright: silently
//! zero-filling them would misclassify those individuals as the reference
//! class and bias every downstream fit.

use crate::forward::{self, SelectionError, SelectionOptions, SelectionTrace};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

/// Genotype code for the AA class, mapped to the first indicator column.
pub const GENOTYPE_AA: f64 = 1.0;
/// Genotype code for the AB class, mapped to the second indicator column.
pub const GENOTYPE_AB: f64 = 2.0;
/// Genotype code for the BB class, the reference absorbed by the intercept.
pub const GENOTYPE_BB: f64 = 3.0;

/// Errors from expanding a genotype matrix into indicator columns.
#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error(
        "marker {marker} carries unrecognized genotype code {code} for individual {individual}; expected codes 1, 2, or 3"
    )]
    MissingData {
        marker: usize,
        individual: usize,
        code: f64,
    },
}

/// Expands an `[n, m]` genotype matrix into an `[n, 2m]` indicator matrix.
///
/// Marker `j` owns output columns `2j` (AA indicator) and `2j + 1`
/// (AB indicator); BB individuals are zero in both. The mapping from marker
/// index to column pair is exactly this stride, which is what lets the
/// selection driver treat the pair as one candidate.
///
/// Codes are matched exactly, so NaN, fractional, or out-of-alphabet values
/// all fail with [`ExpansionError::MissingData`].
pub fn expand_markers(genotypes: ArrayView2<f64>) -> Result<Array2<f64>, ExpansionError> {
    let (n, m) = genotypes.dim();
    let mut expanded = Array2::<f64>::zeros((n, 2 * m));
    for (marker, column) in genotypes.axis_iter(Axis(1)).enumerate() {
        for (individual, &code) in column.iter().enumerate() {
            if code == GENOTYPE_AA {
                expanded[[individual, 2 * marker]] = 1.0;
            } else if code == GENOTYPE_AB {
                expanded[[individual, 2 * marker + 1]] = 1.0;
            } else if code != GENOTYPE_BB {
                return Err(ExpansionError::MissingData {
                    marker,
                    individual,
                    code,
                });
            }
        }
    }
    Ok(expanded)
}

/// Selects up to `maxsize` markers of `genotypes` by forward stepwise
/// regression of `y` on the dummy-expanded marker columns.
///
/// `genotypes` has one row per individual and one column per marker, with
/// entries drawn from the code alphabet {1, 2, 3}. Each marker is scored and
/// selected as its whole indicator-column pair, and the trace indices refer
/// to markers, not expanded columns. Everything else behaves exactly like
/// [`forward::forward_select`].
pub fn forward_select_intercross(
    genotypes: ArrayView2<f64>,
    y: ArrayView1<f64>,
    maxsize: usize,
    options: &SelectionOptions,
) -> Result<SelectionTrace, SelectionError> {
    forward::validate_problem(genotypes.nrows(), y, genotypes.ncols(), maxsize)?;
    let expanded = expand_markers(genotypes)?;
    forward::select_units(expanded.view(), y, 2, maxsize, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn expansion_produces_one_indicator_pair_per_marker() {
        let genotypes = array![[1.0, 3.0], [2.0, 2.0], [3.0, 1.0]];
        let expanded = expand_markers(genotypes.view()).unwrap();

        assert_eq!(expanded.shape(), &[3, 4]);
        // Marker 0: codes 1, 2, 3.
        assert_eq!(expanded.column(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(expanded.column(1).to_vec(), vec![0.0, 1.0, 0.0]);
        // Marker 1: codes 3, 2, 1.
        assert_eq!(expanded.column(2).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(expanded.column(3).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn out_of_alphabet_code_is_rejected_with_location() {
        let genotypes = array![[1.0, 3.0], [2.0, 4.0], [3.0, 1.0]];
        let err = expand_markers(genotypes.view()).unwrap_err();
        match err {
            ExpansionError::MissingData {
                marker,
                individual,
                code,
            } => {
                assert_eq!(marker, 1);
                assert_eq!(individual, 1);
                assert_abs_diff_eq!(code, 4.0, epsilon = 0.0);
            }
        }
    }

    #[test]
    fn nan_code_is_rejected_not_zero_filled() {
        let genotypes = array![[1.0], [f64::NAN], [3.0]];
        assert!(matches!(
            expand_markers(genotypes.view()),
            Err(ExpansionError::MissingData {
                marker: 0,
                individual: 1,
                ..
            })
        ));
    }

    #[test]
    fn selection_rejects_bad_codes_through_the_driver() {
        let genotypes = array![[1.0], [2.0], [3.0], [0.0], [1.0], [2.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let err = forward_select_intercross(
            genotypes.view(),
            y.view(),
            1,
            &SelectionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::MissingData(_)));
    }

    #[test]
    fn single_marker_fit_reproduces_the_three_class_means_model() {
        // Two individuals per genotype class with distinct class means; the
        // two-indicator fit must reproduce the class means exactly, leaving
        // only the within-class scatter as residual.
        let genotypes = array![[1.0], [1.0], [2.0], [2.0], [3.0], [3.0]];
        let y = array![1.0, 1.2, 3.0, 3.4, 5.0, 5.6];
        let trace = forward_select_intercross(
            genotypes.view(),
            y.view(),
            1,
            &SelectionOptions::default(),
        )
        .unwrap();

        assert_eq!(trace.chosen, vec![0]);
        // Within-class sum of squares around means 1.1, 3.2, 5.3.
        assert_abs_diff_eq!(trace.rss[0], 0.28, epsilon = 1e-8);
    }

    #[test]
    fn marker_indices_refer_to_markers_not_expanded_columns() {
        // Marker 1 separates the response classes; marker 0 is noise.
        let genotypes = array![
            [1.0, 1.0],
            [2.0, 1.0],
            [3.0, 2.0],
            [1.0, 2.0],
            [2.0, 3.0],
            [3.0, 3.0],
            [1.0, 1.0],
            [2.0, 2.0],
            [3.0, 3.0],
        ];
        let y = array![0.9, 1.1, 5.0, 5.2, 9.0, 9.1, 1.0, 5.1, 8.9];
        let trace = forward_select_intercross(
            genotypes.view(),
            y.view(),
            1,
            &SelectionOptions::default(),
        )
        .unwrap();
        assert_eq!(trace.chosen, vec![1]);
    }
}
