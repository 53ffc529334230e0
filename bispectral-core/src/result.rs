//! Result types for co-clustering passes.
//!
//! A cluster is the pair of its user list and its hashtag list. Labels are
//! assigned independently to rows and columns, so the two lists of a cluster
//! are reported side by side rather than as a single combined structure.

use std::fmt;

/// Label assigned by the co-clustering oracle to a row or a column.
///
/// # Examples
/// ```
/// use bispectral_core::ClusterLabel;
///
/// let label = ClusterLabel::new(4);
/// assert_eq!(label.get(), 4);
/// assert_eq!(label.to_string(), "4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClusterLabel(u32);

impl ClusterLabel {
    /// Creates a new cluster label.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(label: u32) -> Self { Self(label) }

    /// Returns the underlying numeric label.
    #[rustfmt::skip]
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Converts a slot index into a label, or `None` when it exceeds `u32`.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }

    /// Returns the label as a slot index into per-cluster storage.
    #[rustfmt::skip]
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user reported as a cluster member.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserEntry {
    /// Display name of the user.
    pub username: String,
    /// Sum of the user's row in the matrix active at the pass.
    pub weight: u64,
}

/// A hashtag reported as a cluster member.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashtagEntry {
    /// The hashtag text.
    pub hashtag: String,
    /// Sum of the hashtag's column in the matrix active at the pass.
    pub weight: u64,
}

/// Members sharing one label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cluster {
    /// Users in ascending active-row order.
    pub users: Vec<UserEntry>,
    /// Hashtags in ascending active-column order.
    pub hashtags: Vec<HashtagEntry>,
}

impl Cluster {
    /// Total number of users and hashtags in the cluster.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.users.len() + self.hashtags.len()
    }

    /// Returns `true` when the cluster has at least one user and one hashtag.
    #[must_use]
    pub fn spans_both_axes(&self) -> bool {
        !self.users.is_empty() && !self.hashtags.is_empty()
    }

    /// Returns `true` when neither axis has any member.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.hashtags.is_empty()
    }
}

/// Named, weighted cluster membership for one co-clustering pass.
///
/// Slot `i` holds the cluster labelled `i`; every label in `0..k` has a slot,
/// even when the oracle assigned nothing to it.
///
/// # Examples
/// ```
/// use bispectral_core::{Cluster, ClusterLabel, ClusterResults, UserEntry};
///
/// let mut clusters = vec![Cluster::default(), Cluster::default()];
/// clusters[1].users.push(UserEntry { username: "ada".into(), weight: 3 });
/// let results = ClusterResults::from_clusters(clusters);
/// assert_eq!(results.k(), 2);
/// assert_eq!(results.user_total(), 1);
/// assert_eq!(results.largest_label(), Some(ClusterLabel::new(1)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterResults {
    clusters: Vec<Cluster>,
}

impl ClusterResults {
    /// Wraps per-label clusters, indexed by label.
    #[must_use]
    pub fn from_clusters(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }

    /// Number of label slots.
    #[must_use]
    pub fn k(&self) -> usize {
        self.clusters.len()
    }

    /// Returns the cluster for `label`, if the label is in range.
    #[must_use]
    pub fn cluster(&self, label: ClusterLabel) -> Option<&Cluster> {
        self.clusters.get(label.index())
    }

    /// Iterates over `(label, cluster)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (ClusterLabel, &Cluster)> {
        self.clusters
            .iter()
            .zip(0_u32..)
            .map(|(cluster, label)| (ClusterLabel::new(label), cluster))
    }

    /// Total number of users across all clusters.
    #[must_use]
    pub fn user_total(&self) -> usize {
        self.clusters.iter().map(|c| c.users.len()).sum()
    }

    /// Total number of hashtags across all clusters.
    #[must_use]
    pub fn hashtag_total(&self) -> usize {
        self.clusters.iter().map(|c| c.hashtags.len()).sum()
    }

    /// Label of the cluster with the most members; ties go to the lower label.
    ///
    /// Only clusters holding at least one user and one hashtag compete, since
    /// any other cluster cannot be re-clustered. When no cluster spans both
    /// axes the largest non-empty cluster is returned instead. Returns `None`
    /// when every cluster is empty.
    #[must_use]
    pub fn largest_label(&self) -> Option<ClusterLabel> {
        self.largest_where(Cluster::spans_both_axes)
            .or_else(|| self.largest_where(|cluster| !cluster.is_empty()))
    }

    fn largest_where(&self, eligible: impl Fn(&Cluster) -> bool) -> Option<ClusterLabel> {
        self.iter()
            .filter(|(_, cluster)| eligible(cluster))
            .fold(None, |best: Option<(ClusterLabel, usize)>, (label, cluster)| {
                let size = cluster.member_count();
                match best {
                    Some((_, best_size)) if best_size >= size => best,
                    _ => Some((label, size)),
                }
            })
            .map(|(label, _)| label)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ClusterResults {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.clusters.len()))?;
        for (label, cluster) in self.iter() {
            map.serialize_entry(&label.to_string(), cluster)?;
        }
        map.end()
    }
}
