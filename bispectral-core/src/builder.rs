//! Builder utilities for configuring [`Pipeline`] runs.
//!
//! Exposes the second-pass selection surface and the validation performed
//! before a [`Pipeline`] is constructed.

use std::{fmt, num::NonZeroUsize};

use crate::{
    Result,
    error::BispectralError,
    matrix::{CollisionPolicy, OverflowPolicy, WeightPolicy},
    pipeline::Pipeline,
    result::ClusterLabel,
};

/// Chooses which first-pass cluster is re-clustered by the second pass.
///
/// # Examples
/// ```
/// use bispectral_core::{ClusterLabel, SecondPassSelection};
///
/// assert_eq!(SecondPassSelection::default(), SecondPassSelection::Largest);
/// let fixed = SecondPassSelection::Label(ClusterLabel::new(3));
/// assert_eq!(fixed.to_string(), "label 3");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecondPassSelection {
    /// The first-pass cluster with the most users and hashtags combined; ties
    /// go to the lowest label. Clusters missing users or hashtags are only
    /// chosen when no cluster has both.
    #[default]
    Largest,
    /// A fixed first-pass label.
    Label(ClusterLabel),
}

impl fmt::Display for SecondPassSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Largest => f.write_str("largest"),
            Self::Label(label) => write!(f, "label {label}"),
        }
    }
}

/// Configures and constructs [`Pipeline`] instances.
///
/// # Examples
/// ```
/// use bispectral_core::{CollisionPolicy, PipelineBuilder};
///
/// let pipeline = PipelineBuilder::new()
///     .with_min_user(2)
///     .with_clusters(3)
///     .with_collision_policy(CollisionPolicy::Accumulate)
///     .build()
///     .expect("builder configuration is valid");
/// assert_eq!(pipeline.min_user().get(), 2);
/// assert_eq!(pipeline.clusters().get(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    min_user: usize,
    clusters: usize,
    seed: u64,
    selection: SecondPassSelection,
    weights: WeightPolicy,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            min_user: 10,
            clusters: 100,
            seed: 0,
            selection: SecondPassSelection::Largest,
            weights: WeightPolicy::default(),
        }
    }
}

impl PipelineBuilder {
    /// Creates a builder populated with default parameters.
    ///
    /// # Examples
    /// ```
    /// use bispectral_core::PipelineBuilder;
    ///
    /// let builder = PipelineBuilder::new();
    /// assert_eq!(builder.min_user(), 10);
    /// assert_eq!(builder.clusters(), 100);
    /// assert_eq!(builder.seed(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the minimum number of distinct users a hashtag needs to
    /// survive the first filter.
    #[must_use]
    pub fn with_min_user(mut self, min_user: usize) -> Self {
        self.min_user = min_user;
        self
    }

    /// Returns the configured hashtag degree threshold.
    #[must_use]
    pub fn min_user(&self) -> usize {
        self.min_user
    }

    /// Overrides the cluster count shared by both passes.
    #[must_use]
    pub fn with_clusters(mut self, clusters: usize) -> Self {
        self.clusters = clusters;
        self
    }

    /// Returns the configured cluster count.
    #[must_use]
    pub fn clusters(&self) -> usize {
        self.clusters
    }

    /// Overrides the seed handed to the default spectral oracle.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the configured seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Chooses the cluster re-clustered by the second pass.
    ///
    /// # Examples
    /// ```
    /// use bispectral_core::{ClusterLabel, PipelineBuilder, SecondPassSelection};
    ///
    /// let builder = PipelineBuilder::new()
    ///     .with_second_pass(SecondPassSelection::Label(ClusterLabel::new(5)));
    /// assert_eq!(builder.second_pass(), SecondPassSelection::Label(ClusterLabel::new(5)));
    /// ```
    #[must_use]
    pub fn with_second_pass(mut self, selection: SecondPassSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Returns the configured second-pass selection.
    #[must_use]
    pub fn second_pass(&self) -> SecondPassSelection {
        self.selection
    }

    /// Sets how repeated `(user, hashtag)` pairs combine.
    #[must_use]
    pub fn with_collision_policy(mut self, collision: CollisionPolicy) -> Self {
        self.weights.collision = collision;
        self
    }

    /// Sets how weights above the limit are handled.
    #[must_use]
    pub fn with_overflow_policy(mut self, overflow: OverflowPolicy) -> Self {
        self.weights.overflow = overflow;
        self
    }

    /// Sets the largest weight a matrix cell may hold.
    #[must_use]
    pub fn with_weight_limit(mut self, limit: u32) -> Self {
        self.weights.limit = limit;
        self
    }

    /// Returns the configured weight policy.
    #[must_use]
    pub fn weight_policy(&self) -> WeightPolicy {
        self.weights
    }

    /// Validates the configuration and constructs a [`Pipeline`].
    ///
    /// # Errors
    /// Returns [`BispectralError::InvalidMinUser`] or
    /// [`BispectralError::InvalidClusterCount`] for zero values,
    /// [`BispectralError::InvalidWeightLimit`] for a zero weight limit, and
    /// [`BispectralError::UnknownSelectedLabel`] when a fixed second-pass
    /// label is not below the cluster count.
    ///
    /// # Examples
    /// ```
    /// use bispectral_core::{BispectralErrorCode, PipelineBuilder};
    ///
    /// let err = PipelineBuilder::new().with_clusters(0).build().expect_err("k = 0 is rejected");
    /// assert_eq!(err.code(), BispectralErrorCode::InvalidClusterCount);
    /// ```
    pub fn build(self) -> Result<Pipeline> {
        let min_user = NonZeroUsize::new(self.min_user).ok_or(BispectralError::InvalidMinUser {
            got: self.min_user,
        })?;
        let clusters = NonZeroUsize::new(self.clusters).ok_or(
            BispectralError::InvalidClusterCount {
                got: self.clusters,
            },
        )?;
        if self.weights.limit == 0 {
            return Err(BispectralError::InvalidWeightLimit {
                got: self.weights.limit,
            });
        }
        if let SecondPassSelection::Label(label) = self.selection
            && label.index() >= clusters.get()
        {
            return Err(BispectralError::UnknownSelectedLabel { label, k: clusters });
        }

        Ok(Pipeline::new(
            min_user,
            clusters,
            self.seed,
            self.selection,
            self.weights,
        ))
    }
}
