//! Bispectral core library.
//!
//! Builds a weighted user × hashtag matrix from sparse interactions, filters
//! sparse hashtags and idle users, co-clusters the result through a
//! [`CoClusterer`], and maps every label back to named, weighted members. A
//! second pass re-clusters one first-pass cluster.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod error;
mod extract;
mod filter;
mod identity;
mod mapping;
mod matrix;
mod oracle;
mod pipeline;
mod result;
#[cfg(feature = "spectral")]
#[cfg_attr(docsrs, doc(cfg(feature = "spectral")))]
mod spectral;
#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(feature = "spectral")]
pub use crate::spectral::SpectralCoclustering;
pub use crate::{
    builder::{PipelineBuilder, SecondPassSelection},
    error::{
        BispectralError, BispectralErrorCode, MappingError, MappingErrorCode, OracleError,
        OracleErrorCode, Result,
    },
    extract::{ExtractionInput, extract_clusters},
    filter::{
        Axis, FilterStage, Filtered, apply_stage, filter_axis, hashtags_with_min_degree,
        labels_equal, users_with_edges,
    },
    identity::{IdentityIndex, Interaction},
    mapping::{IndexMapping, MappingChain},
    matrix::{
        AdjacencyMatrix, BuiltMatrices, CollisionPolicy, MatrixBuilder, OverflowPolicy,
        PresenceMatrix, WeightPolicy,
    },
    oracle::{CoClusterLabels, CoClusterer, check_dimensions},
    pipeline::{MatrixShape, Pass, PassStats, Pipeline, PipelineOutcome},
    result::{Cluster, ClusterLabel, ClusterResults, HashtagEntry, UserEntry},
};
