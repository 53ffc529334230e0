//! Two-pass co-clustering orchestration.
//!
//! The first pass clusters every user and hashtag that survives the degree
//! filters. The second pass restricts the filtered matrix to one first-pass
//! cluster and clusters it again with the same cluster count.

use std::{fmt, num::NonZeroUsize, sync::Arc};

use tracing::{debug, info, instrument};

use crate::{
    Result,
    builder::SecondPassSelection,
    error::{BispectralError, OracleError},
    extract::{ExtractionInput, extract_clusters},
    filter::{FilterStage, apply_stage, hashtags_with_min_degree, labels_equal, users_with_edges},
    identity::{IdentityIndex, Interaction},
    mapping::MappingChain,
    matrix::{AdjacencyMatrix, MatrixBuilder, WeightPolicy},
    oracle::{CoClusterLabels, CoClusterer},
    result::{ClusterLabel, ClusterResults},
};

/// Identifies one of the two clustering passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Clustering of the degree-filtered matrix.
    First,
    /// Re-clustering of the selected first-pass cluster.
    Second,
}

impl Pass {
    /// Stable lowercase name of the pass.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row and column count of a matrix at one stage of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatrixShape {
    /// Number of users.
    pub rows: usize,
    /// Number of hashtags.
    pub columns: usize,
}

impl MatrixShape {
    fn of(matrix: &AdjacencyMatrix) -> Self {
        Self {
            rows: matrix.rows(),
            columns: matrix.columns(),
        }
    }
}

impl fmt::Display for MatrixShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

/// Matrix dimensions recorded at each stage of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PassStats {
    /// Matrix built from the full input.
    pub built: MatrixShape,
    /// After dropping hashtags below the degree threshold.
    pub hashtag_filtered: MatrixShape,
    /// Matrix clustered by the first pass.
    pub first_pass: MatrixShape,
    /// Matrix clustered by the second pass.
    pub second_pass: MatrixShape,
}

/// Everything produced by [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Named clusters of the first pass.
    pub first_pass: ClusterResults,
    /// Named clusters of the second pass.
    pub second_pass: ClusterResults,
    /// First-pass label re-clustered by the second pass.
    pub selected_label: ClusterLabel,
    /// Matrix dimensions per stage.
    pub stats: PassStats,
}

/// Entry point for running both clustering passes.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use bispectral_core::{
///     AdjacencyMatrix, ClusterLabel, CoClusterLabels, CoClusterer, Interaction, OracleError,
///     PipelineBuilder,
/// };
///
/// /// Alternates labels by position.
/// struct Alternating;
///
/// impl CoClusterer for Alternating {
///     fn name(&self) -> &str { "alternating" }
///     fn cocluster(&self, m: &AdjacencyMatrix, k: NonZeroUsize) -> Result<CoClusterLabels, OracleError> {
///         let label = |i: usize| ClusterLabel::new(u32::try_from(i % k.get()).unwrap_or(0));
///         Ok(CoClusterLabels {
///             rows: (0..m.rows()).map(label).collect(),
///             columns: (0..m.columns()).map(label).collect(),
///         })
///     }
/// }
///
/// let input = vec![
///     Interaction::new("u1", "ada", "#a", 1),
///     Interaction::new("u2", "bob", "#a", 1),
///     Interaction::new("u2", "bob", "#b", 2),
///     Interaction::new("u3", "cy", "#b", 1),
/// ];
/// let pipeline = PipelineBuilder::new()
///     .with_min_user(2)
///     .with_clusters(1)
///     .build()?;
/// let outcome = pipeline.run(&input, &Alternating)?;
/// assert_eq!(outcome.first_pass.user_total(), 3);
/// assert_eq!(outcome.selected_label, ClusterLabel::new(0));
/// # Ok::<(), bispectral_core::BispectralError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    min_user: NonZeroUsize,
    clusters: NonZeroUsize,
    seed: u64,
    selection: SecondPassSelection,
    weights: WeightPolicy,
}

/// Matrix and chains describing the active axes at one stage.
struct Active {
    matrix: AdjacencyMatrix,
    rows: MappingChain,
    columns: MappingChain,
}

impl Pipeline {
    pub(crate) fn new(
        min_user: NonZeroUsize,
        clusters: NonZeroUsize,
        seed: u64,
        selection: SecondPassSelection,
        weights: WeightPolicy,
    ) -> Self {
        Self {
            min_user,
            clusters,
            seed,
            selection,
            weights,
        }
    }

    /// Returns the hashtag degree threshold.
    #[must_use]
    pub fn min_user(&self) -> NonZeroUsize {
        self.min_user
    }

    /// Returns the cluster count shared by both passes.
    #[must_use]
    pub fn clusters(&self) -> NonZeroUsize {
        self.clusters
    }

    /// Returns the seed for the default oracle.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the second-pass selection.
    #[must_use]
    pub fn second_pass(&self) -> SecondPassSelection {
        self.selection
    }

    /// Returns the weight storage policy.
    #[must_use]
    pub fn weight_policy(&self) -> WeightPolicy {
        self.weights
    }

    /// Spectral oracle seeded with this pipeline's seed.
    #[cfg(feature = "spectral")]
    #[cfg_attr(docsrs, doc(cfg(feature = "spectral")))]
    #[must_use]
    pub fn spectral_oracle(&self) -> crate::SpectralCoclustering {
        crate::SpectralCoclustering::new().with_seed(self.seed)
    }

    /// Runs both passes over `input` using `oracle`.
    ///
    /// # Errors
    /// Returns [`BispectralError::WeightOverflow`] for rejected weights,
    /// [`BispectralError::DegenerateMatrix`] when a filter empties an axis,
    /// [`BispectralError::ClusterCountExceedsDimensions`] when `k` does not fit
    /// a pass, [`BispectralError::UnknownSelectedLabel`] when the fixed
    /// second-pass label was never assigned, and [`BispectralError::Oracle`]
    /// when the oracle fails or returns malformed labels.
    #[instrument(
        name = "core.run",
        err,
        skip(self, input, oracle),
        fields(
            interactions = input.len(),
            oracle = %oracle.name(),
            min_user = %self.min_user,
            k = %self.clusters,
            second_pass = %self.selection,
        ),
    )]
    pub fn run<O: CoClusterer>(&self, input: &[Interaction], oracle: &O) -> Result<PipelineOutcome> {
        let identity = IdentityIndex::build(input);
        let built = MatrixBuilder::new(self.weights).build(&identity, input)?;
        let mut stats = PassStats {
            built: MatrixShape::of(&built.weights),
            ..PassStats::default()
        };

        let hashtags = apply_stage(
            &built.weights,
            FilterStage::HashtagDegree,
            &hashtags_with_min_degree(&built.presence, self.min_user.get()),
        )?;
        stats.hashtag_filtered = MatrixShape::of(&hashtags.matrix);
        let users = apply_stage(
            &hashtags.matrix,
            FilterStage::UserEdges,
            &users_with_edges(&hashtags.matrix),
        )?;
        let first = Active {
            matrix: users.matrix,
            rows: MappingChain::new().then(users.mapping),
            columns: MappingChain::new().then(hashtags.mapping),
        };
        stats.first_pass = MatrixShape::of(&first.matrix);
        info!(
            users = stats.first_pass.rows,
            hashtags = stats.first_pass.columns,
            dropped_users = stats.built.rows - stats.first_pass.rows,
            dropped_hashtags = stats.built.columns - stats.first_pass.columns,
            "degree filters applied"
        );

        let first_labels = self.cluster(Pass::First, &first.matrix, oracle)?;
        let first_pass = self.extract(&first, &first_labels, &identity)?;

        let selected_label = self.select(&first_labels, &first_pass)?;
        let rows = apply_stage(
            &first.matrix,
            FilterStage::SelectedRows,
            &labels_equal(&first_labels.rows, selected_label),
        )?;
        let columns = apply_stage(
            &rows.matrix,
            FilterStage::SelectedColumns,
            &labels_equal(&first_labels.columns, selected_label),
        )?;
        let second = Active {
            matrix: columns.matrix,
            rows: first.rows.then(rows.mapping),
            columns: first.columns.then(columns.mapping),
        };
        stats.second_pass = MatrixShape::of(&second.matrix);
        info!(
            label = %selected_label,
            users = stats.second_pass.rows,
            hashtags = stats.second_pass.columns,
            "second pass restricted to selected cluster"
        );

        let second_labels = self.cluster(Pass::Second, &second.matrix, oracle)?;
        let second_pass = self.extract(&second, &second_labels, &identity)?;

        Ok(PipelineOutcome {
            first_pass,
            second_pass,
            selected_label,
            stats,
        })
    }

    #[instrument(
        name = "core.cluster",
        err,
        skip(self, matrix, oracle),
        fields(pass = %pass, rows = matrix.rows(), columns = matrix.columns()),
    )]
    fn cluster<O: CoClusterer>(
        &self,
        pass: Pass,
        matrix: &AdjacencyMatrix,
        oracle: &O,
    ) -> Result<CoClusterLabels> {
        let k = self.clusters;
        if k.get() > matrix.rows().min(matrix.columns()) {
            return Err(BispectralError::ClusterCountExceedsDimensions {
                pass,
                k,
                rows: matrix.rows(),
                columns: matrix.columns(),
            });
        }
        let labels = oracle
            .cocluster(matrix, k)
            .and_then(|labels| labels.check_shape(matrix).map(|()| labels))
            .map_err(|error| map_oracle_error(oracle, &error))?;
        debug!("oracle returned labels");
        Ok(labels)
    }

    fn extract(
        &self,
        active: &Active,
        labels: &CoClusterLabels,
        identity: &IdentityIndex,
    ) -> Result<ClusterResults> {
        extract_clusters(&ExtractionInput {
            labels,
            matrix: &active.matrix,
            rows: &active.rows,
            columns: &active.columns,
            identity,
            k: self.clusters,
        })
    }

    fn select(&self, labels: &CoClusterLabels, first_pass: &ClusterResults) -> Result<ClusterLabel> {
        let k = self.clusters;
        match self.selection {
            SecondPassSelection::Label(label) => {
                if labels.rows.contains(&label) || labels.columns.contains(&label) {
                    Ok(label)
                } else {
                    Err(BispectralError::UnknownSelectedLabel { label, k })
                }
            }
            SecondPassSelection::Largest => {
                first_pass
                    .largest_label()
                    .ok_or(BispectralError::UnknownSelectedLabel {
                        label: ClusterLabel::new(0),
                        k,
                    })
            }
        }
    }
}

fn map_oracle_error<O: CoClusterer>(oracle: &O, error: &OracleError) -> BispectralError {
    BispectralError::Oracle {
        oracle: Arc::from(oracle.name()),
        code: Arc::from(error.code().as_str()),
        message: Arc::from(error.to_string()),
    }
}
