//! Turns oracle labels back into named, weighted cluster members.
//!
//! Every active index is walked through its axis' [`MappingChain`] to an
//! identity-index position before any name is looked up, so the extractor
//! works unchanged for the first pass and for any number of later
//! restrictions.

use std::num::NonZeroUsize;

use tracing::{debug, instrument};

use crate::{
    Result,
    error::BispectralError,
    filter::Axis,
    identity::IdentityIndex,
    mapping::MappingChain,
    matrix::AdjacencyMatrix,
    oracle::CoClusterLabels,
    result::{Cluster, ClusterLabel, ClusterResults, HashtagEntry, UserEntry},
};

/// Everything needed to name the members of one clustering pass.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    /// Labels produced for `matrix`.
    pub labels: &'a CoClusterLabels,
    /// The matrix that was clustered in this pass.
    pub matrix: &'a AdjacencyMatrix,
    /// Chain from active rows back to identity user indices.
    pub rows: &'a MappingChain,
    /// Chain from active columns back to identity hashtag indices.
    pub columns: &'a MappingChain,
    /// Identity tables of the run.
    pub identity: &'a IdentityIndex,
    /// Cluster count of the pass.
    pub k: NonZeroUsize,
}

/// Builds the per-label user and hashtag lists for one pass.
///
/// Members appear in ascending active-index order. A user's weight is the sum
/// of its row in `input.matrix`; a hashtag's is the sum of its column.
///
/// # Errors
/// Returns [`BispectralError::LabelCountMismatch`] when a label vector does not
/// match the matrix, [`BispectralError::LabelOutOfRange`] for labels `>= k`,
/// and [`BispectralError::Mapping`] when a chain cannot resolve an index to a
/// known entity.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use bispectral_core::{
///     ClusterLabel, CoClusterLabels, ExtractionInput, IdentityIndex, Interaction, MappingChain,
///     MatrixBuilder, WeightPolicy, extract_clusters,
/// };
///
/// let input = vec![
///     Interaction::new("u1", "ada", "#a", 2),
///     Interaction::new("u2", "bob", "#b", 3),
/// ];
/// let identity = IdentityIndex::build(&input);
/// let matrix = MatrixBuilder::new(WeightPolicy::default()).build(&identity, &input)?.weights;
/// let labels = CoClusterLabels {
///     rows: vec![ClusterLabel::new(1), ClusterLabel::new(0)],
///     columns: vec![ClusterLabel::new(1), ClusterLabel::new(0)],
/// };
/// let chain = MappingChain::new();
/// let results = extract_clusters(&ExtractionInput {
///     labels: &labels,
///     matrix: &matrix,
///     rows: &chain,
///     columns: &chain,
///     identity: &identity,
///     k: NonZeroUsize::new(2).expect("non-zero"),
/// })?;
/// let first = results.cluster(ClusterLabel::new(1)).expect("label in range");
/// assert_eq!(first.users[0].username, "ada");
/// assert_eq!(first.hashtags[0].weight, 2);
/// # Ok::<(), bispectral_core::BispectralError>(())
/// ```
#[instrument(
    name = "core.extract",
    err,
    skip(input),
    fields(
        rows = input.matrix.rows(),
        columns = input.matrix.columns(),
        k = input.k.get(),
        row_links = input.rows.len(),
        column_links = input.columns.len(),
    ),
)]
pub fn extract_clusters(input: &ExtractionInput<'_>) -> Result<ClusterResults> {
    let matrix = input.matrix;
    check_labels(Axis::Rows, &input.labels.rows, matrix.rows(), input.k)?;
    check_labels(Axis::Columns, &input.labels.columns, matrix.columns(), input.k)?;

    let mut clusters = vec![Cluster::default(); input.k.get()];

    for (row, (&label, weight)) in input
        .labels
        .rows
        .iter()
        .zip(matrix.row_sums())
        .enumerate()
    {
        let username = resolve_username(input, row)?;
        if let Some(cluster) = clusters.get_mut(label.index()) {
            cluster.users.push(UserEntry {
                username: username.to_owned(),
                weight,
            });
        }
    }

    for (column, (&label, weight)) in input
        .labels
        .columns
        .iter()
        .zip(matrix.column_sums())
        .enumerate()
    {
        let hashtag = resolve_hashtag(input, column)?;
        if let Some(cluster) = clusters.get_mut(label.index()) {
            cluster.hashtags.push(HashtagEntry {
                hashtag: hashtag.to_owned(),
                weight,
            });
        }
    }

    let results = ClusterResults::from_clusters(clusters);
    debug!(
        users = results.user_total(),
        hashtags = results.hashtag_total(),
        "clusters extracted"
    );
    Ok(results)
}

fn check_labels(
    axis: Axis,
    labels: &[ClusterLabel],
    expected: usize,
    k: NonZeroUsize,
) -> Result<()> {
    if labels.len() != expected {
        return Err(BispectralError::LabelCountMismatch {
            axis,
            expected,
            actual: labels.len(),
        });
    }
    match labels.iter().find(|label| label.index() >= k.get()) {
        Some(&label) => Err(BispectralError::LabelOutOfRange { axis, label, k }),
        None => Ok(()),
    }
}

fn unknown(axis: Axis, index: usize, len: usize, chain: &MappingChain) -> BispectralError {
    BispectralError::Mapping {
        axis,
        error: crate::error::MappingError::OutOfRange {
            index,
            len,
            link: chain.len(),
        },
    }
}

fn resolve_username<'a>(input: &ExtractionInput<'a>, row: usize) -> Result<&'a str> {
    let identity = input.identity;
    let original = input
        .rows
        .resolve(row)
        .map_err(|error| BispectralError::Mapping {
            axis: Axis::Rows,
            error,
        })?;
    let user_id = identity
        .user_id(original)
        .ok_or_else(|| unknown(Axis::Rows, original, identity.user_count(), input.rows))?;
    identity
        .username(user_id)
        .ok_or_else(|| unknown(Axis::Rows, original, identity.user_count(), input.rows))
}

fn resolve_hashtag<'a>(input: &ExtractionInput<'a>, column: usize) -> Result<&'a str> {
    let identity = input.identity;
    let original = input
        .columns
        .resolve(column)
        .map_err(|error| BispectralError::Mapping {
            axis: Axis::Columns,
            error,
        })?;
    identity
        .hashtag(original)
        .ok_or_else(|| unknown(Axis::Columns, original, identity.hashtag_count(), input.columns))
}
