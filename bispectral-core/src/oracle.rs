//! The co-clustering capability consumed by the pipeline.

use std::num::NonZeroUsize;

use crate::{error::OracleError, filter::Axis, matrix::AdjacencyMatrix, result::ClusterLabel};

/// Row and column labels returned by a [`CoClusterer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoClusterLabels {
    /// One label per matrix row.
    pub rows: Vec<ClusterLabel>,
    /// One label per matrix column.
    pub columns: Vec<ClusterLabel>,
}

impl CoClusterLabels {
    /// Checks that the label vectors match the matrix shape.
    ///
    /// # Errors
    /// Returns [`OracleError::LabelShape`] naming the first mismatched axis.
    pub fn check_shape(&self, matrix: &AdjacencyMatrix) -> Result<(), OracleError> {
        for (axis, expected, actual) in [
            (Axis::Rows, matrix.rows(), self.rows.len()),
            (Axis::Columns, matrix.columns(), self.columns.len()),
        ] {
            if expected != actual {
                return Err(OracleError::LabelShape {
                    axis,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Partitions the rows and the columns of a weighted matrix into `k` labels
/// each, using their joint structure.
///
/// Implementations must be pure and deterministic: the same matrix and `k`
/// always produce the same labels, and every label lies in `0..k`.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use bispectral_core::{AdjacencyMatrix, ClusterLabel, CoClusterLabels, CoClusterer, OracleError};
///
/// /// Assigns everything to label zero.
/// struct Single;
///
/// impl CoClusterer for Single {
///     fn name(&self) -> &str { "single" }
///     fn cocluster(&self, m: &AdjacencyMatrix, _k: NonZeroUsize) -> Result<CoClusterLabels, OracleError> {
///         Ok(CoClusterLabels {
///             rows: vec![ClusterLabel::new(0); m.rows()],
///             columns: vec![ClusterLabel::new(0); m.columns()],
///         })
///     }
/// }
///
/// let m = AdjacencyMatrix::from_rows(&[vec![1, 2]]).expect("rectangular");
/// let labels = Single.cocluster(&m, NonZeroUsize::MIN)?;
/// assert_eq!(labels.columns.len(), 2);
/// # Ok::<(), OracleError>(())
/// ```
pub trait CoClusterer {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Computes row and column labels for `matrix`.
    ///
    /// # Errors
    /// Returns an [`OracleError`] when the matrix is empty, `k` exceeds the
    /// smaller dimension, or the computation breaks down numerically.
    fn cocluster(
        &self,
        matrix: &AdjacencyMatrix,
        k: NonZeroUsize,
    ) -> Result<CoClusterLabels, OracleError>;
}

impl<T: CoClusterer + ?Sized> CoClusterer for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn cocluster(
        &self,
        matrix: &AdjacencyMatrix,
        k: NonZeroUsize,
    ) -> Result<CoClusterLabels, OracleError> {
        (**self).cocluster(matrix, k)
    }
}

/// Validates the shape preconditions shared by every oracle.
///
/// # Errors
/// Returns [`OracleError::EmptyMatrix`] or [`OracleError::TooManyClusters`].
pub fn check_dimensions(matrix: &AdjacencyMatrix, k: NonZeroUsize) -> Result<(), OracleError> {
    let (rows, columns) = (matrix.rows(), matrix.columns());
    if matrix.is_degenerate() {
        return Err(OracleError::EmptyMatrix { rows, columns });
    }
    if k.get() > rows.min(columns) {
        return Err(OracleError::TooManyClusters { k, rows, columns });
    }
    Ok(())
}
