//! Index mappings produced by filtering and their composition.
//!
//! Every filter shrinks one matrix axis and records where each surviving
//! entry came from. A [`MappingChain`] stacks those records so an index into
//! the most recent matrix can be walked back to the identity index in one
//! call, instead of nesting lookups by hand at every stage.

use crate::error::MappingError;

/// New (post-filter) index → old (pre-filter) index.
///
/// Built by enumerating a keep-vector and assigning consecutive new indices to
/// the kept positions, so the mapping is strictly increasing and its length is
/// the number of `true` entries.
///
/// # Examples
/// ```
/// use bispectral_core::IndexMapping;
///
/// let mapping = IndexMapping::from_keep(&[false, true, true, false, true]);
/// assert_eq!(mapping.len(), 3);
/// assert_eq!(mapping.resolve(0), Some(1));
/// assert_eq!(mapping.resolve(2), Some(4));
/// assert_eq!(mapping.resolve(3), None);
/// assert_eq!(mapping.source_len(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMapping {
    old: Vec<usize>,
    source_len: usize,
}

impl IndexMapping {
    /// Derives a mapping from a keep-vector.
    #[must_use]
    pub fn from_keep(keep: &[bool]) -> Self {
        let old = keep
            .iter()
            .enumerate()
            .filter_map(|(index, &kept)| kept.then_some(index))
            .collect();
        Self {
            old,
            source_len: keep.len(),
        }
    }

    /// Number of surviving entries (the mapping's domain size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.old.len()
    }

    /// Returns `true` when nothing survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }

    /// Length of the axis the mapping was derived from.
    #[must_use]
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Old index for `new`, or `None` outside the domain.
    #[must_use]
    pub fn resolve(&self, new: usize) -> Option<usize> {
        self.old.get(new).copied()
    }

    /// Old indices in new-index order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.old.iter().copied()
    }

    /// Old indices as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.old
    }
}

/// Ordered composition of [`IndexMapping`]s, oldest first.
///
/// [`resolve`](Self::resolve) applies the most recent mapping first and the
/// oldest last, yielding an index into the original identity index. An empty
/// chain is the identity.
///
/// # Examples
/// ```
/// use bispectral_core::{IndexMapping, MappingChain};
///
/// // Keep columns 1, 2 and 4, then keep the last two survivors.
/// let chain = MappingChain::new()
///     .then(IndexMapping::from_keep(&[false, true, true, false, true]))
///     .then(IndexMapping::from_keep(&[false, true, true]));
/// assert_eq!(chain.resolve(0)?, 2);
/// assert_eq!(chain.resolve(1)?, 4);
/// assert!(chain.resolve(2).is_err());
/// # Ok::<(), bispectral_core::MappingError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingChain {
    links: Vec<IndexMapping>,
}

impl MappingChain {
    /// Creates the identity chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new chain with `mapping` appended as the most recent link.
    #[must_use]
    pub fn then(&self, mapping: IndexMapping) -> Self {
        let mut links = self.links.clone();
        links.push(mapping);
        Self { links }
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` for the identity chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links, oldest first.
    #[must_use]
    pub fn links(&self) -> &[IndexMapping] {
        &self.links
    }

    /// Domain size of the chain: the length of the most recent link.
    ///
    /// `None` for the identity chain, whose domain is unbounded.
    #[must_use]
    pub fn domain_len(&self) -> Option<usize> {
        self.links.last().map(IndexMapping::len)
    }

    /// Walks `index` from the newest link back to an original dense index.
    ///
    /// # Errors
    /// Returns [`MappingError::OutOfRange`] naming the first link whose domain
    /// does not contain the intermediate index.
    pub fn resolve(&self, index: usize) -> Result<usize, MappingError> {
        self.links
            .iter()
            .enumerate()
            .rev()
            .try_fold(index, |current, (link, mapping)| {
                mapping.resolve(current).ok_or(MappingError::OutOfRange {
                    index: current,
                    len: mapping.len(),
                    link,
                })
            })
    }
}
