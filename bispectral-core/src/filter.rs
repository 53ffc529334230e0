//! Keep-vector construction and axis filtering.
//!
//! Filters never touch the matrix they are given; each returns a smaller copy
//! together with the [`IndexMapping`] from the new axis back to the old one.
//! Hashtags must be filtered before users: a user whose only edges point at
//! dropped hashtags is only detectable once those columns are gone.

use std::fmt;

use tracing::{debug, instrument};

use crate::{
    Result,
    error::BispectralError,
    mapping::IndexMapping,
    matrix::{AdjacencyMatrix, PresenceMatrix},
    result::ClusterLabel,
};

/// Matrix axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Users.
    Rows,
    /// Hashtags.
    Columns,
}

impl Axis {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rows => "rows",
            Self::Columns => "columns",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four filtering stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStage {
    /// Hashtags below the distinct-user threshold are dropped.
    HashtagDegree,
    /// Users without a remaining edge are dropped.
    UserEdges,
    /// Users outside the selected first-pass cluster are dropped.
    SelectedRows,
    /// Hashtags outside the selected first-pass cluster are dropped.
    SelectedColumns,
}

impl FilterStage {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HashtagDegree => "hashtag_degree_filter",
            Self::UserEdges => "user_edge_filter",
            Self::SelectedRows => "selected_row_filter",
            Self::SelectedColumns => "selected_column_filter",
        }
    }

    /// Axis the stage shrinks.
    #[must_use]
    pub const fn axis(self) -> Axis {
        match self {
            Self::HashtagDegree | Self::SelectedColumns => Axis::Columns,
            Self::UserEdges | Self::SelectedRows => Axis::Rows,
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filtered matrix and the mapping from its filtered axis to the input axis.
#[derive(Debug, Clone)]
pub struct Filtered {
    /// Mapping from new to old indices along the filtered axis.
    pub mapping: IndexMapping,
    /// The shrunken matrix.
    pub matrix: AdjacencyMatrix,
}

/// Keeps hashtags with at least `min_user` distinct users.
///
/// # Examples
/// ```
/// use bispectral_core::{IdentityIndex, Interaction, MatrixBuilder, WeightPolicy, hashtags_with_min_degree};
///
/// let input = vec![
///     Interaction::new("u1", "a", "#x", 1),
///     Interaction::new("u2", "b", "#x", 1),
///     Interaction::new("u2", "b", "#y", 9),
/// ];
/// let index = IdentityIndex::build(&input);
/// let built = MatrixBuilder::new(WeightPolicy::default()).build(&index, &input)?;
/// assert_eq!(hashtags_with_min_degree(&built.presence, 2), vec![true, false]);
/// # Ok::<(), bispectral_core::BispectralError>(())
/// ```
#[must_use]
pub fn hashtags_with_min_degree(presence: &PresenceMatrix, min_user: usize) -> Vec<bool> {
    presence
        .column_degrees()
        .into_iter()
        .map(|degree| degree >= min_user)
        .collect()
}

/// Keeps users whose row sums to more than zero.
#[must_use]
pub fn users_with_edges(matrix: &AdjacencyMatrix) -> Vec<bool> {
    matrix.row_sums().into_iter().map(|sum| sum > 0).collect()
}

/// Keeps entries whose label equals `selected`.
#[must_use]
pub fn labels_equal(labels: &[ClusterLabel], selected: ClusterLabel) -> Vec<bool> {
    labels.iter().map(|&label| label == selected).collect()
}

/// Shrinks `matrix` along `axis` to the positions marked in `keep`.
///
/// # Errors
/// Returns [`BispectralError::KeepLengthMismatch`] when `keep` does not have
/// one entry per position of `axis`.
///
/// # Examples
/// ```
/// use bispectral_core::{AdjacencyMatrix, Axis, filter_axis};
///
/// let m = AdjacencyMatrix::from_rows(&[vec![1, 0], vec![0, 0], vec![2, 3]]).expect("rectangular");
/// let filtered = filter_axis(&m, Axis::Rows, &[true, false, true])?;
/// assert_eq!(filtered.matrix.rows(), 2);
/// assert_eq!(filtered.mapping.resolve(1), Some(2));
/// # Ok::<(), bispectral_core::BispectralError>(())
/// ```
#[instrument(
    name = "core.filter_axis",
    level = "debug",
    err,
    skip(matrix, keep),
    fields(axis = %axis, rows = matrix.rows(), columns = matrix.columns()),
)]
pub fn filter_axis(matrix: &AdjacencyMatrix, axis: Axis, keep: &[bool]) -> Result<Filtered> {
    let expected = match axis {
        Axis::Rows => matrix.rows(),
        Axis::Columns => matrix.columns(),
    };
    if keep.len() != expected {
        return Err(BispectralError::KeepLengthMismatch {
            axis,
            expected,
            actual: keep.len(),
        });
    }

    let mapping = IndexMapping::from_keep(keep);
    let filtered = match axis {
        Axis::Rows => matrix.select_rows(&mapping),
        Axis::Columns => matrix.select_columns(&mapping),
    };
    debug!(
        kept = mapping.len(),
        dropped = expected - mapping.len(),
        "axis filtered"
    );
    Ok(Filtered {
        mapping,
        matrix: filtered,
    })
}

/// Applies [`filter_axis`] for `stage` and rejects a degenerate result.
///
/// # Errors
/// Propagates [`filter_axis`] errors and returns
/// [`BispectralError::DegenerateMatrix`] when the output has no rows or no
/// columns.
pub fn apply_stage(matrix: &AdjacencyMatrix, stage: FilterStage, keep: &[bool]) -> Result<Filtered> {
    let filtered = filter_axis(matrix, stage.axis(), keep)?;
    if filtered.matrix.is_degenerate() {
        return Err(BispectralError::DegenerateMatrix {
            stage,
            rows: filtered.matrix.rows(),
            columns: filtered.matrix.columns(),
        });
    }
    Ok(filtered)
}
