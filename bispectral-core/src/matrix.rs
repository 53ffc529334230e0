//! Dense user × hashtag matrices built from sparse interactions.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    Result,
    error::BispectralError,
    identity::{IdentityIndex, Interaction},
    mapping::IndexMapping,
};

/// How repeated `(user, hashtag)` pairs are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// The last entry replaces earlier ones.
    #[default]
    Overwrite,
    /// Entries are summed.
    Accumulate,
}

/// What happens when a stored weight would exceed the configured limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Fail with [`BispectralError::WeightOverflow`].
    #[default]
    Reject,
    /// Clamp to the limit and log a warning. Lossy.
    Saturate,
}

/// Storage rules applied by [`MatrixBuilder`].
///
/// # Examples
/// ```
/// use bispectral_core::{CollisionPolicy, OverflowPolicy, WeightPolicy};
///
/// let policy = WeightPolicy::default();
/// assert_eq!(policy.collision, CollisionPolicy::Overwrite);
/// assert_eq!(policy.overflow, OverflowPolicy::Reject);
/// assert_eq!(policy.limit, u32::from(u16::MAX));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightPolicy {
    /// Handling of repeated pairs.
    pub collision: CollisionPolicy,
    /// Handling of weights above `limit`.
    pub overflow: OverflowPolicy,
    /// Largest weight a cell may hold.
    pub limit: u32,
}

impl WeightPolicy {
    /// Default cell limit, matching 16-bit storage.
    pub const DEFAULT_LIMIT: u32 = u16::MAX as u32;
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            collision: CollisionPolicy::default(),
            overflow: OverflowPolicy::default(),
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Row-major matrix of non-negative weights; rows are users and columns are
/// hashtags. Zero means "no edge".
///
/// # Examples
/// ```
/// use bispectral_core::AdjacencyMatrix;
///
/// let m = AdjacencyMatrix::from_rows(&[vec![1, 0, 2], vec![0, 3, 0]]).expect("rectangular");
/// assert_eq!(m.rows(), 2);
/// assert_eq!(m.columns(), 3);
/// assert_eq!(m.row_sum(0), 3);
/// assert_eq!(m.column_sum(1), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    rows: usize,
    columns: usize,
    data: Vec<u32>,
}

impl AdjacencyMatrix {
    /// Creates an all-zero matrix.
    #[must_use]
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            data: vec![0; rows * columns],
        }
    }

    /// Builds a matrix from explicit rows. Returns `None` when the rows differ
    /// in length.
    #[must_use]
    pub fn from_rows(rows: &[Vec<u32>]) -> Option<Self> {
        let columns = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != columns) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            columns,
            data: rows.concat(),
        })
    }

    /// Number of rows (users).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (hashtags).
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Returns `true` when either dimension is zero.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.rows == 0 || self.columns == 0
    }

    /// Weight at `(row, column)`.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<u32> {
        if column >= self.columns {
            return None;
        }
        self.data.get(row * self.columns + column).copied()
    }

    /// Borrows row `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[u32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.columns;
        self.data.get(start..start + self.columns)
    }

    /// Iterates over the rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[u32]> {
        // `chunks_exact(0)` panics, and a zero-width matrix has no meaningful rows.
        self.data
            .chunks_exact(self.columns.max(1))
            .take(if self.columns == 0 { 0 } else { self.rows })
    }

    /// Sum of row `row`; zero when out of range.
    #[must_use]
    pub fn row_sum(&self, row: usize) -> u64 {
        self.row(row)
            .map_or(0, |values| values.iter().map(|&w| u64::from(w)).sum())
    }

    /// Sum of column `column`; zero when out of range.
    #[must_use]
    pub fn column_sum(&self, column: usize) -> u64 {
        if column >= self.columns {
            return 0;
        }
        self.iter_rows()
            .filter_map(|row| row.get(column))
            .map(|&w| u64::from(w))
            .sum()
    }

    /// Sums of every row.
    #[must_use]
    pub fn row_sums(&self) -> Vec<u64> {
        (0..self.rows).map(|row| self.row_sum(row)).collect()
    }

    /// Sums of every column.
    #[must_use]
    pub fn column_sums(&self) -> Vec<u64> {
        let mut sums = vec![0_u64; self.columns];
        for row in self.iter_rows() {
            for (sum, &w) in sums.iter_mut().zip(row) {
                *sum += u64::from(w);
            }
        }
        sums
    }

    /// Returns a new matrix holding the rows named by `mapping`, in mapping
    /// order. Indices outside the matrix are skipped.
    #[must_use]
    pub fn select_rows(&self, mapping: &IndexMapping) -> Self {
        let mut data = Vec::with_capacity(mapping.len() * self.columns);
        let mut rows = 0;
        for old in mapping.iter() {
            if let Some(row) = self.row(old) {
                data.extend_from_slice(row);
                rows += 1;
            }
        }
        Self {
            rows,
            columns: self.columns,
            data,
        }
    }

    /// Returns a new matrix holding the columns named by `mapping`, in mapping
    /// order. Indices outside the matrix are skipped.
    #[must_use]
    pub fn select_columns(&self, mapping: &IndexMapping) -> Self {
        let kept: Vec<usize> = mapping.iter().filter(|&c| c < self.columns).collect();
        let mut data = Vec::with_capacity(self.rows * kept.len());
        for row in self.iter_rows() {
            data.extend(kept.iter().filter_map(|&c| row.get(c)));
        }
        Self {
            rows: self.rows,
            columns: kept.len(),
            data,
        }
    }

    fn cell_mut(&mut self, row: usize, column: usize) -> Option<&mut u32> {
        if column >= self.columns {
            return None;
        }
        self.data.get_mut(row * self.columns + column)
    }
}

/// Unweighted companion of an [`AdjacencyMatrix`]: a mark wherever an input
/// entry exists, regardless of its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceMatrix {
    rows: usize,
    columns: usize,
    marks: Vec<bool>,
}

impl PresenceMatrix {
    fn empty(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            marks: vec![false; rows * columns],
        }
    }

    /// Number of rows (users).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (hashtags).
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Whether an edge was recorded at `(row, column)`.
    #[must_use]
    pub fn contains(&self, row: usize, column: usize) -> bool {
        column < self.columns
            && self
                .marks
                .get(row * self.columns + column)
                .copied()
                .unwrap_or(false)
    }

    /// Number of distinct users per hashtag.
    #[must_use]
    pub fn column_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0_usize; self.columns];
        if self.columns == 0 {
            return degrees;
        }
        for row in self.marks.chunks_exact(self.columns) {
            for (degree, &mark) in degrees.iter_mut().zip(row) {
                *degree += usize::from(mark);
            }
        }
        degrees
    }
}

/// Output of [`MatrixBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltMatrices {
    /// Weighted adjacency matrix.
    pub weights: AdjacencyMatrix,
    /// Presence marks used for degree filtering.
    pub presence: PresenceMatrix,
}

/// Materialises dense matrices from sparse interactions.
///
/// # Examples
/// ```
/// use bispectral_core::{IdentityIndex, Interaction, MatrixBuilder, WeightPolicy};
///
/// let input = vec![
///     Interaction::new("u1", "ada", "#a", 2),
///     Interaction::new("u2", "bob", "#b", 5),
/// ];
/// let index = IdentityIndex::build(&input);
/// let built = MatrixBuilder::new(WeightPolicy::default()).build(&index, &input)?;
/// assert_eq!(built.weights.get(1, 1), Some(5));
/// assert_eq!(built.presence.column_degrees(), vec![1, 1]);
/// # Ok::<(), bispectral_core::BispectralError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixBuilder {
    policy: WeightPolicy,
}

impl MatrixBuilder {
    /// Creates a builder applying `policy`.
    #[must_use]
    pub const fn new(policy: WeightPolicy) -> Self {
        Self { policy }
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> WeightPolicy {
        self.policy
    }

    /// Fills the weighted and presence matrices for `input`.
    ///
    /// Entries whose user or hashtag is unknown to `index` are skipped.
    ///
    /// # Errors
    /// Returns [`BispectralError::WeightOverflow`] when a cell would exceed the
    /// policy limit under [`OverflowPolicy::Reject`].
    #[instrument(
        name = "core.build_matrix",
        err,
        skip(self, index, input),
        fields(
            users = index.user_count(),
            hashtags = index.hashtag_count(),
            collision = ?self.policy.collision,
            limit = self.policy.limit,
        ),
    )]
    pub fn build(&self, index: &IdentityIndex, input: &[Interaction]) -> Result<BuiltMatrices> {
        let (rows, columns) = (index.user_count(), index.hashtag_count());
        let mut weights = AdjacencyMatrix::zeros(rows, columns);
        let mut presence = PresenceMatrix::empty(rows, columns);

        for entry in input {
            let (Some(row), Some(column)) = (
                index.user_index(&entry.user_id),
                index.hashtag_index(&entry.hashtag),
            ) else {
                continue;
            };
            let Some(cell) = weights.cell_mut(row, column) else {
                continue;
            };
            let candidate = match self.policy.collision {
                CollisionPolicy::Overwrite => entry.weight,
                CollisionPolicy::Accumulate => u64::from(*cell).saturating_add(entry.weight),
            };
            *cell = self.fit(entry, candidate)?;
            if let Some(mark) = presence.marks.get_mut(row * columns + column) {
                *mark = true;
            }
        }

        debug!(rows, columns, "matrices materialised");
        Ok(BuiltMatrices { weights, presence })
    }

    fn fit(&self, entry: &Interaction, candidate: u64) -> Result<u32> {
        let limit = self.policy.limit;
        if candidate <= u64::from(limit) {
            return Ok(u32::try_from(candidate).unwrap_or(limit));
        }
        match self.policy.overflow {
            OverflowPolicy::Reject => Err(BispectralError::WeightOverflow {
                user_id: Arc::from(entry.user_id.as_str()),
                hashtag: Arc::from(entry.hashtag.as_str()),
                weight: candidate,
                limit,
            }),
            OverflowPolicy::Saturate => {
                warn!(
                    user_id = entry.user_id.as_str(),
                    hashtag = entry.hashtag.as_str(),
                    weight = candidate,
                    limit,
                    "weight saturated at storage limit"
                );
                Ok(limit)
            }
        }
    }
}
