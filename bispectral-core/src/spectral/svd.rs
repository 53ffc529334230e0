//! Truncated singular value decomposition by seeded subspace iteration.
//!
//! The block of right singular vectors is refined by repeated application of
//! `AᵀA` followed by re-orthonormalisation, then a Rayleigh–Ritz step on the
//! small projected problem separates the individual singular pairs.

use rand::{Rng, rngs::SmallRng};
use tracing::debug;

/// Magnitude below which a vector is treated as collapsed.
const COLLAPSE_EPSILON: f64 = 1e-12;
/// Upper bound on Jacobi sweeps for the projected eigenproblem.
const MAX_JACOBI_SWEEPS: usize = 100;

/// Compressed sparse row matrix of `f64` values.
#[derive(Debug, Clone)]
pub(super) struct SparseMatrix {
    rows: usize,
    columns: usize,
    row_starts: Vec<usize>,
    column_indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Builds the matrix row by row from `(column, value)` pairs.
    pub(super) fn from_row_entries<I, R>(rows: usize, columns: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (usize, f64)>,
    {
        let mut row_starts = Vec::with_capacity(rows + 1);
        let mut column_indices = Vec::new();
        let mut values = Vec::new();
        row_starts.push(0);
        for row in entries.into_iter().take(rows) {
            for (column, value) in row {
                if value != 0.0 && column < columns {
                    column_indices.push(column);
                    values.push(value);
                }
            }
            row_starts.push(values.len());
        }
        while row_starts.len() < rows + 1 {
            row_starts.push(values.len());
        }
        Self {
            rows,
            columns,
            row_starts,
            column_indices,
            values,
        }
    }

    pub(super) const fn rows(&self) -> usize {
        self.rows
    }

    pub(super) const fn columns(&self) -> usize {
        self.columns
    }

    fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.row_starts.get(row).copied().unwrap_or(0);
        let end = self.row_starts.get(row + 1).copied().unwrap_or(start);
        self.column_indices
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .copied()
            .zip(self.values.get(start..end).unwrap_or_default().iter().copied())
    }

    /// `A v`.
    #[expect(
        clippy::float_arithmetic,
        reason = "Sparse products accumulate floating-point terms."
    )]
    pub(super) fn mul(&self, v: &[f64]) -> Vec<f64> {
        (0..self.rows)
            .map(|row| {
                self.row_entries(row)
                    .map(|(column, value)| value * v.get(column).copied().unwrap_or(0.0))
                    .sum()
            })
            .collect()
    }

    /// `Aᵀ w`.
    #[expect(
        clippy::float_arithmetic,
        reason = "Sparse products accumulate floating-point terms."
    )]
    pub(super) fn mul_transpose(&self, w: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.columns];
        for (row, &scale) in w.iter().enumerate().take(self.rows) {
            if scale == 0.0 {
                continue;
            }
            for (column, value) in self.row_entries(row) {
                if let Some(slot) = out.get_mut(column) {
                    *slot += value * scale;
                }
            }
        }
        out
    }
}

/// Tuning for [`truncated_svd`].
#[derive(Debug, Clone, Copy)]
pub(super) struct SvdParams {
    /// Number of leading singular pairs to return.
    pub(super) rank: usize,
    /// Extra block columns carried to speed up convergence.
    pub(super) oversample: usize,
    /// Maximum subspace iterations.
    pub(super) iterations: usize,
    /// Frobenius-norm subspace drift below which iteration stops.
    pub(super) tolerance: f64,
}

/// Leading singular triplets, in descending order of singular value.
#[derive(Debug, Clone)]
pub(super) struct Truncated {
    /// Left singular vectors, one `rows`-length vector per component.
    pub(super) left: Vec<Vec<f64>>,
    /// Singular values.
    pub(super) values: Vec<f64>,
    /// Right singular vectors, one `columns`-length vector per component.
    pub(super) right: Vec<Vec<f64>>,
}

/// Computes the leading `params.rank` singular triplets of `a`.
pub(super) fn truncated_svd(a: &SparseMatrix, params: SvdParams, rng: &mut SmallRng) -> Truncated {
    let limit = a.rows().min(a.columns());
    let rank = params.rank.min(limit);
    let block = rank.saturating_add(params.oversample).min(limit);

    let mut basis: Vec<Vec<f64>> = (0..block)
        .map(|_| (0..a.columns()).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    orthonormalise(&mut basis);

    let mut performed = 0;
    for _ in 0..params.iterations {
        performed += 1;
        let mut next: Vec<Vec<f64>> = basis
            .iter()
            .map(|v| a.mul_transpose(&a.mul(v)))
            .collect();
        orthonormalise(&mut next);
        let drift = subspace_drift(&basis, &next);
        basis = next;
        if drift < params.tolerance {
            break;
        }
    }
    debug!(iterations = performed, block, rank, "subspace iteration finished");

    rayleigh_ritz(a, &basis, rank)
}

#[expect(
    clippy::float_arithmetic,
    reason = "Left singular vectors are images scaled by the singular value."
)]
fn rayleigh_ritz(a: &SparseMatrix, basis: &[Vec<f64>], rank: usize) -> Truncated {
    let images: Vec<Vec<f64>> = basis.iter().map(|v| a.mul(v)).collect();
    let gram: Vec<Vec<f64>> = images
        .iter()
        .map(|wi| images.iter().map(|wj| dot(wi, wj)).collect())
        .collect();
    let (eigenvalues, eigenvectors) = symmetric_eigen(gram);
    let eigenvalue = |component: usize| eigenvalues.get(component).copied().unwrap_or(0.0);

    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&x, &y| eigenvalue(y).total_cmp(&eigenvalue(x)).then(x.cmp(&y)));

    let mut left = Vec::with_capacity(rank);
    let mut values = Vec::with_capacity(rank);
    let mut right = Vec::with_capacity(rank);
    for &component in order.iter().take(rank) {
        let sigma = eigenvalue(component).max(0.0).sqrt();
        let weights: Vec<f64> = eigenvectors
            .iter()
            .map(|row| row.get(component).copied().unwrap_or(0.0))
            .collect();
        let v = combine(basis, &weights, a.columns());
        let mut u = combine(&images, &weights, a.rows());
        if sigma > COLLAPSE_EPSILON {
            u.iter_mut().for_each(|x| *x /= sigma);
        } else {
            u.iter_mut().for_each(|x| *x = 0.0);
        }
        left.push(u);
        values.push(sigma);
        right.push(v);
    }
    Truncated {
        left,
        values,
        right,
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "Linear combinations of basis vectors."
)]
fn combine(vectors: &[Vec<f64>], weights: &[f64], len: usize) -> Vec<f64> {
    let mut out = vec![0.0; len];
    for (vector, &weight) in vectors.iter().zip(weights) {
        for (slot, &x) in out.iter_mut().zip(vector) {
            *slot += weight * x;
        }
    }
    out
}

#[expect(
    clippy::float_arithmetic,
    reason = "Inner products require floating-point arithmetic."
)]
pub(super) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Modified Gram–Schmidt, applied twice. Collapsed vectors become zero.
#[expect(
    clippy::float_arithmetic,
    reason = "Gram-Schmidt subtracts projections and normalises."
)]
fn orthonormalise(vectors: &mut [Vec<f64>]) {
    for index in 0..vectors.len() {
        let (done, rest) = vectors.split_at_mut(index);
        let Some(current) = rest.first_mut() else {
            continue;
        };
        for _ in 0..2 {
            for previous in done.iter() {
                let projection = dot(current, previous);
                for (x, p) in current.iter_mut().zip(previous) {
                    *x -= projection * p;
                }
            }
        }
        let norm = dot(current, current).sqrt();
        if norm > COLLAPSE_EPSILON {
            current.iter_mut().for_each(|x| *x /= norm);
        } else {
            current.iter_mut().for_each(|x| *x = 0.0);
        }
    }
}

/// `‖N − B(BᵀN)‖_F` for orthonormal blocks `B` and `N`.
#[expect(
    clippy::float_arithmetic,
    reason = "The drift is a Frobenius norm of projection residuals."
)]
fn subspace_drift(basis: &[Vec<f64>], next: &[Vec<f64>]) -> f64 {
    next.iter()
        .map(|n| {
            let mut residual = n.clone();
            for b in basis {
                let projection = dot(b, n);
                for (r, x) in residual.iter_mut().zip(b) {
                    *r -= projection * x;
                }
            }
            dot(&residual, &residual)
        })
        .sum::<f64>()
        .sqrt()
}

/// Cyclic Jacobi eigen-decomposition of a small symmetric matrix.
///
/// Returns the eigenvalues and a matrix whose columns are the matching
/// eigenvectors.
#[expect(
    clippy::indexing_slicing,
    clippy::float_arithmetic,
    reason = "Jacobi rotations update a small square matrix in place by row and column."
)]
pub(super) fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _ in 0..MAX_JACOBI_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off < 1e-30 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                let apq = a[p][q];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let sign = if theta < 0.0 { -1.0 } else { 1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for row in &mut a {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in &mut v {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}
