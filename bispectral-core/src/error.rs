//! Error types for the bispectral core library.
//!
//! Defines error enums exposed by the public API, their stable machine-readable
//! codes, and a convenient result alias.

use std::{fmt, num::NonZeroUsize, sync::Arc};

use thiserror::Error;

use crate::{
    filter::{Axis, FilterStage},
    pipeline::Pass,
    result::ClusterLabel,
};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced while resolving an index through a [`crate::MappingChain`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MappingError {
    /// The index fell outside the domain of one mapping in the chain.
    #[error("index {index} is outside link {link} of the mapping chain (domain size {len})")]
    OutOfRange {
        /// Index presented to the failing link.
        index: usize,
        /// Domain size of the failing link.
        len: usize,
        /// Position of the failing link, counted from the oldest mapping.
        link: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`MappingError`] variants.
    enum MappingErrorCode for MappingError {
        /// The index fell outside the domain of one mapping in the chain.
        OutOfRange => OutOfRange { .. } => "MAPPING_OUT_OF_RANGE",
    }
}

/// An error produced by a [`crate::CoClusterer`] implementation.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum OracleError {
    /// The matrix had no rows or no columns.
    #[error("cannot co-cluster a {rows}x{columns} matrix")]
    EmptyMatrix {
        /// Number of rows in the rejected matrix.
        rows: usize,
        /// Number of columns in the rejected matrix.
        columns: usize,
    },
    /// More clusters were requested than the smaller matrix dimension.
    #[error("requested {k} clusters but the matrix is only {rows}x{columns}")]
    TooManyClusters {
        /// Requested cluster count.
        k: NonZeroUsize,
        /// Number of rows in the matrix.
        rows: usize,
        /// Number of columns in the matrix.
        columns: usize,
    },
    /// The embedding contained NaN or infinite values.
    #[error("spectral embedding produced non-finite values")]
    NonFinite,
    /// The oracle returned labels that violate the co-clustering contract.
    #[error("oracle returned {actual} {axis} labels but the matrix has {expected}")]
    LabelShape {
        /// Axis whose label vector had the wrong length.
        axis: Axis,
        /// Expected number of labels.
        expected: usize,
        /// Number of labels actually returned.
        actual: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`OracleError`] variants.
    enum OracleErrorCode for OracleError {
        /// The matrix had no rows or no columns.
        EmptyMatrix => EmptyMatrix { .. } => "ORACLE_EMPTY_MATRIX",
        /// More clusters were requested than the smaller matrix dimension.
        TooManyClusters => TooManyClusters { .. } => "ORACLE_TOO_MANY_CLUSTERS",
        /// The embedding contained NaN or infinite values.
        NonFinite => NonFinite => "ORACLE_NON_FINITE",
        /// The oracle returned labels that violate the co-clustering contract.
        LabelShape => LabelShape { .. } => "ORACLE_LABEL_SHAPE",
    }
}

/// Error type produced when configuring or running a [`crate::Pipeline`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BispectralError {
    /// The cluster count must be greater than zero.
    #[error("cluster count must be at least 1 (got {got})")]
    InvalidClusterCount {
        /// The invalid cluster count supplied by the caller.
        got: usize,
    },
    /// The hashtag degree threshold must be greater than zero.
    #[error("min_user must be at least 1 (got {got})")]
    InvalidMinUser {
        /// The invalid threshold supplied by the caller.
        got: usize,
    },
    /// The weight limit must be greater than zero.
    #[error("weight limit must be at least 1 (got {got})")]
    InvalidWeightLimit {
        /// The invalid limit supplied by the caller.
        got: u32,
    },
    /// The cluster count exceeds one of the matrix dimensions for a pass.
    #[error("{pass} pass requests {k} clusters but the matrix is only {rows}x{columns}")]
    ClusterCountExceedsDimensions {
        /// Pass that would have been clustered.
        pass: Pass,
        /// Configured cluster count.
        k: NonZeroUsize,
        /// Rows left after filtering.
        rows: usize,
        /// Columns left after filtering.
        columns: usize,
    },
    /// The label selected for the second pass is absent from the first pass.
    #[error("second-pass label {label} does not exist among the first-pass labels (k = {k})")]
    UnknownSelectedLabel {
        /// Label requested for the second pass.
        label: ClusterLabel,
        /// Cluster count of the first pass.
        k: NonZeroUsize,
    },
    /// A filtering stage left the matrix with no rows or no columns.
    #[error("{stage} left a degenerate {rows}x{columns} matrix")]
    DegenerateMatrix {
        /// Stage that produced the empty axis.
        stage: FilterStage,
        /// Rows remaining after the stage.
        rows: usize,
        /// Columns remaining after the stage.
        columns: usize,
    },
    /// An input weight does not fit the configured storage limit.
    #[error("weight {weight} for user `{user_id}` and hashtag `{hashtag}` exceeds the limit {limit}")]
    WeightOverflow {
        /// User owning the rejected edge.
        user_id: Arc<str>,
        /// Hashtag owning the rejected edge.
        hashtag: Arc<str>,
        /// Weight that would have been stored.
        weight: u64,
        /// Configured storage limit.
        limit: u32,
    },
    /// A keep-vector did not match the length of the axis it filters.
    #[error("keep-vector for {axis} has length {actual} but the axis has {expected} entries")]
    KeepLengthMismatch {
        /// Axis being filtered.
        axis: Axis,
        /// Length of the axis.
        expected: usize,
        /// Length of the supplied keep-vector.
        actual: usize,
    },
    /// An active index could not be resolved to an original entity.
    #[error("failed to resolve a {axis} index: {error}")]
    Mapping {
        /// Axis whose chain failed.
        axis: Axis,
        #[source]
        /// Underlying mapping failure.
        error: MappingError,
    },
    /// Cluster labels did not line up with the active matrix.
    #[error("{axis} labels have length {actual} but the active matrix has {expected}")]
    LabelCountMismatch {
        /// Axis whose labels were inconsistent.
        axis: Axis,
        /// Length of the active axis.
        expected: usize,
        /// Number of labels supplied.
        actual: usize,
    },
    /// A cluster label fell outside `0..k`.
    #[error("{axis} label {label} is outside 0..{k}")]
    LabelOutOfRange {
        /// Axis carrying the offending label.
        axis: Axis,
        /// Offending label.
        label: ClusterLabel,
        /// Configured cluster count.
        k: NonZeroUsize,
    },
    /// The co-clustering oracle failed.
    #[error("oracle `{oracle}` failed with {code}: {message}")]
    Oracle {
        /// Name reported by the oracle.
        oracle: Arc<str>,
        /// Stable code of the oracle error.
        code: Arc<str>,
        /// Rendered oracle error message.
        message: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`BispectralError`] variants.
    enum BispectralErrorCode for BispectralError {
        /// The cluster count must be greater than zero.
        InvalidClusterCount => InvalidClusterCount { .. } => "BISPECTRAL_INVALID_CLUSTER_COUNT",
        /// The hashtag degree threshold must be greater than zero.
        InvalidMinUser => InvalidMinUser { .. } => "BISPECTRAL_INVALID_MIN_USER",
        /// The weight limit must be greater than zero.
        InvalidWeightLimit => InvalidWeightLimit { .. } => "BISPECTRAL_INVALID_WEIGHT_LIMIT",
        /// The cluster count exceeds one of the matrix dimensions for a pass.
        ClusterCountExceedsDimensions => ClusterCountExceedsDimensions { .. } => "BISPECTRAL_CLUSTER_COUNT_EXCEEDS_DIMENSIONS",
        /// The label selected for the second pass is absent from the first pass.
        UnknownSelectedLabel => UnknownSelectedLabel { .. } => "BISPECTRAL_UNKNOWN_SELECTED_LABEL",
        /// A filtering stage left the matrix with no rows or no columns.
        DegenerateMatrix => DegenerateMatrix { .. } => "BISPECTRAL_DEGENERATE_MATRIX",
        /// An input weight does not fit the configured storage limit.
        WeightOverflow => WeightOverflow { .. } => "BISPECTRAL_WEIGHT_OVERFLOW",
        /// A keep-vector did not match the length of the axis it filters.
        KeepLengthMismatch => KeepLengthMismatch { .. } => "BISPECTRAL_KEEP_LENGTH_MISMATCH",
        /// An active index could not be resolved to an original entity.
        MappingFailure => Mapping { .. } => "BISPECTRAL_MAPPING_FAILURE",
        /// Cluster labels did not line up with the active matrix.
        LabelCountMismatch => LabelCountMismatch { .. } => "BISPECTRAL_LABEL_COUNT_MISMATCH",
        /// A cluster label fell outside `0..k`.
        LabelOutOfRange => LabelOutOfRange { .. } => "BISPECTRAL_LABEL_OUT_OF_RANGE",
        /// The co-clustering oracle failed.
        OracleFailure => Oracle { .. } => "BISPECTRAL_ORACLE_FAILURE",
    }
}

impl BispectralError {
    /// Returns `true` for errors caused by invalid run parameters rather than
    /// by the data itself.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidClusterCount { .. }
                | Self::InvalidMinUser { .. }
                | Self::InvalidWeightLimit { .. }
                | Self::ClusterCountExceedsDimensions { .. }
                | Self::UnknownSelectedLabel { .. }
        )
    }

    /// Retrieve the inner [`MappingErrorCode`] when the error originated in a
    /// [`crate::MappingChain`].
    pub const fn mapping_code(&self) -> Option<MappingErrorCode> {
        match self {
            Self::Mapping { error, .. } => Some(error.code()),
            _ => None,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, BispectralError>;
