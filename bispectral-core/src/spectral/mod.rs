//! Bipartite spectral co-clustering.
//!
//! The matrix is scale-normalised as `R^-1/2 A C^-1/2`, where `R` and `C`
//! hold the row and column sums. The leading `1 + ceil(log2 k)` singular
//! vectors are computed and the first pair discarded; the remaining vectors,
//! rescaled by the same diagonals, embed rows and columns in one space where
//! k-means assigns the labels. Rows and columns that interact strongly end up
//! close together and therefore share labels.

mod kmeans;
mod svd;

use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::SmallRng};
use tracing::{debug, instrument};

use crate::{
    error::OracleError,
    matrix::AdjacencyMatrix,
    oracle::{CoClusterLabels, CoClusterer, check_dimensions},
    result::ClusterLabel,
};

use self::{
    kmeans::{KMeansParams, kmeans},
    svd::{SparseMatrix, SvdParams, truncated_svd},
};

const DEFAULT_N_INIT: usize = 10;
const DEFAULT_MAX_ITER: usize = 300;
const DEFAULT_SVD_ITERATIONS: usize = 300;
const DEFAULT_SVD_TOLERANCE: f64 = 1e-10;
const SVD_OVERSAMPLE: usize = 4;

/// Default [`CoClusterer`]: Dhillon's spectral co-clustering with a fixed seed.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use bispectral_core::{AdjacencyMatrix, CoClusterer, SpectralCoclustering};
///
/// let m = AdjacencyMatrix::from_rows(&[
///     vec![5, 5, 0, 0],
///     vec![5, 5, 0, 0],
///     vec![0, 0, 5, 5],
///     vec![0, 1, 5, 5],
/// ]).expect("rectangular");
/// let labels = SpectralCoclustering::new()
///     .with_seed(0)
///     .cocluster(&m, NonZeroUsize::new(2).expect("non-zero"))?;
/// assert_eq!(labels.rows[0], labels.rows[1]);
/// assert_ne!(labels.rows[0], labels.rows[2]);
/// # Ok::<(), bispectral_core::OracleError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralCoclustering {
    seed: u64,
    n_init: NonZeroUsize,
    max_iter: NonZeroUsize,
    svd_iterations: NonZeroUsize,
    svd_tolerance: f64,
}

impl Default for SpectralCoclustering {
    fn default() -> Self {
        Self {
            seed: 0,
            n_init: NonZeroUsize::new(DEFAULT_N_INIT).unwrap_or(NonZeroUsize::MIN),
            max_iter: NonZeroUsize::new(DEFAULT_MAX_ITER).unwrap_or(NonZeroUsize::MIN),
            svd_iterations: NonZeroUsize::new(DEFAULT_SVD_ITERATIONS).unwrap_or(NonZeroUsize::MIN),
            svd_tolerance: DEFAULT_SVD_TOLERANCE,
        }
    }
}

impl SpectralCoclustering {
    /// Creates an oracle with default parameters and seed `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the random seed driving SVD initialisation and k-means.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of k-means restarts.
    #[must_use]
    pub const fn with_n_init(mut self, n_init: NonZeroUsize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Sets the maximum number of Lloyd iterations per restart.
    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: NonZeroUsize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the maximum number of subspace iterations.
    #[must_use]
    pub const fn with_svd_iterations(mut self, iterations: NonZeroUsize) -> Self {
        self.svd_iterations = iterations;
        self
    }

    /// Configured seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Configured number of k-means restarts.
    #[must_use]
    pub const fn n_init(&self) -> NonZeroUsize {
        self.n_init
    }

    /// Number of singular vectors computed for `k` clusters.
    #[must_use]
    pub const fn singular_vectors_for(k: NonZeroUsize) -> usize {
        let ceil_log2 = usize::BITS - (k.get() - 1).leading_zeros();
        1 + ceil_log2 as usize
    }
}

/// Scale-normalised matrix with the diagonals used to build it.
struct Normalised {
    matrix: SparseMatrix,
    row_scale: Vec<f64>,
    column_scale: Vec<f64>,
}

#[expect(
    clippy::cast_precision_loss,
    reason = "Row and column sums only feed a floating-point scale factor."
)]
fn inverse_sqrt(sum: u64) -> f64 {
    if sum == 0 {
        0.0
    } else {
        (sum as f64).sqrt().recip()
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "Scale normalisation multiplies weights by the diagonal factors."
)]
fn normalise(matrix: &AdjacencyMatrix) -> Normalised {
    let row_scale: Vec<f64> = matrix.row_sums().into_iter().map(inverse_sqrt).collect();
    let column_scale: Vec<f64> = matrix.column_sums().into_iter().map(inverse_sqrt).collect();
    let sparse = SparseMatrix::from_row_entries(
        matrix.rows(),
        matrix.columns(),
        matrix.iter_rows().zip(&row_scale).map(|(row, &r)| {
            row.iter()
                .zip(&column_scale)
                .enumerate()
                .filter(|(_, (w, _))| **w != 0)
                .map(move |(column, (&w, &c))| (column, r * f64::from(w) * c))
        }),
    );
    Normalised {
        matrix: sparse,
        row_scale,
        column_scale,
    }
}

impl CoClusterer for SpectralCoclustering {
    fn name(&self) -> &str {
        "spectral"
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "The embedding rescales singular vectors by the diagonal factors."
    )]
    #[instrument(
        name = "core.spectral",
        err,
        skip(self, matrix),
        fields(rows = matrix.rows(), columns = matrix.columns(), k = k.get(), seed = self.seed),
    )]
    fn cocluster(
        &self,
        matrix: &AdjacencyMatrix,
        k: NonZeroUsize,
    ) -> Result<CoClusterLabels, OracleError> {
        check_dimensions(matrix, k)?;
        let too_many = || OracleError::TooManyClusters {
            k,
            rows: matrix.rows(),
            columns: matrix.columns(),
        };
        if k.get() == 1 {
            return Ok(CoClusterLabels {
                rows: vec![ClusterLabel::new(0); matrix.rows()],
                columns: vec![ClusterLabel::new(0); matrix.columns()],
            });
        }

        let normalised = normalise(matrix);
        let n_sv = Self::singular_vectors_for(k);
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let svd = truncated_svd(
            &normalised.matrix,
            SvdParams {
                rank: n_sv,
                oversample: SVD_OVERSAMPLE,
                iterations: self.svd_iterations.get(),
                tolerance: self.svd_tolerance,
            },
            &mut rng,
        );
        debug!(singular_values = ?svd.values, "truncated svd computed");

        let row_points = normalised.row_scale.iter().enumerate().map(|(i, &scale)| {
            svd.left
                .iter()
                .skip(1)
                .map(|u| scale * u.get(i).copied().unwrap_or(0.0))
                .collect::<Vec<f64>>()
        });
        let column_points = normalised
            .column_scale
            .iter()
            .enumerate()
            .map(|(j, &scale)| {
                svd.right
                    .iter()
                    .skip(1)
                    .map(|v| scale * v.get(j).copied().unwrap_or(0.0))
                    .collect::<Vec<f64>>()
            });
        let points: Vec<Vec<f64>> = row_points.chain(column_points).collect();
        if points.iter().flatten().any(|x| !x.is_finite()) {
            return Err(OracleError::NonFinite);
        }

        let mut labels = kmeans(
            &points,
            KMeansParams {
                k: k.get(),
                n_init: self.n_init.get(),
                max_iter: self.max_iter.get(),
            },
            &mut rng,
        )
        .into_iter()
        .map(|label| ClusterLabel::from_index(label).ok_or_else(too_many))
        .collect::<Result<Vec<_>, _>>()?;
        let columns = labels.split_off(matrix.rows());
        Ok(CoClusterLabels {
            rows: labels,
            columns,
        })
    }
}
