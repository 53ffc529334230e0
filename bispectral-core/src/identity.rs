//! Dense index assignment for users and hashtags.
//!
//! The identity index is the outermost link of every mapping chain: once the
//! filters have been unwound, a dense index is turned back into a user id (and
//! username) or a hashtag here.

use std::collections::HashMap;

use tracing::{debug, instrument};

/// One sparse input entry: a user interacted with a hashtag `weight` times.
///
/// # Examples
/// ```
/// use bispectral_core::Interaction;
///
/// let entry = Interaction::new("42", "ada", "#rust", 3);
/// assert_eq!(entry.user_id, "42");
/// assert_eq!(entry.weight, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interaction {
    /// Opaque user identifier.
    pub user_id: String,
    /// Display name attached to the user.
    pub username: String,
    /// Hashtag text.
    pub hashtag: String,
    /// Interaction count.
    pub weight: u64,
}

impl Interaction {
    /// Convenience constructor.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        hashtag: impl Into<String>,
        weight: u64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            hashtag: hashtag.into(),
            weight,
        }
    }
}

/// Bidirectional tables between entity identifiers and dense indices.
///
/// Indices are assigned on first occurrence in input order, independently for
/// users and hashtags. When a user id appears with several usernames the last
/// one wins.
///
/// # Examples
/// ```
/// use bispectral_core::{IdentityIndex, Interaction};
///
/// let input = vec![
///     Interaction::new("u1", "ada", "#a", 1),
///     Interaction::new("u2", "bob", "#a", 1),
///     Interaction::new("u1", "ada", "#b", 2),
/// ];
/// let index = IdentityIndex::build(&input);
/// assert_eq!(index.user_count(), 2);
/// assert_eq!(index.hashtag_index("#b"), Some(1));
/// assert_eq!(index.user_id(1), Some("u2"));
/// assert_eq!(index.username("u1"), Some("ada"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    user_ids: Vec<String>,
    user_lookup: HashMap<String, usize>,
    hashtags: Vec<String>,
    hashtag_lookup: HashMap<String, usize>,
    usernames: HashMap<String, String>,
}

impl IdentityIndex {
    /// Assigns dense indices to every distinct user and hashtag in `input`.
    #[instrument(name = "core.identity", skip(input), fields(entries = input.len()))]
    pub fn build(input: &[Interaction]) -> Self {
        let mut index = Self::default();
        for entry in input {
            index
                .usernames
                .insert(entry.user_id.clone(), entry.username.clone());
            claim(&mut index.user_ids, &mut index.user_lookup, &entry.user_id);
            claim(&mut index.hashtags, &mut index.hashtag_lookup, &entry.hashtag);
        }
        debug!(
            users = index.user_count(),
            hashtags = index.hashtag_count(),
            "identity index built"
        );
        index
    }

    /// Number of distinct users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }

    /// Number of distinct hashtags.
    #[must_use]
    pub fn hashtag_count(&self) -> usize {
        self.hashtags.len()
    }

    /// Dense index of `user_id`.
    #[must_use]
    pub fn user_index(&self, user_id: &str) -> Option<usize> {
        self.user_lookup.get(user_id).copied()
    }

    /// Dense index of `hashtag`.
    #[must_use]
    pub fn hashtag_index(&self, hashtag: &str) -> Option<usize> {
        self.hashtag_lookup.get(hashtag).copied()
    }

    /// User id stored at dense index `index`.
    #[must_use]
    pub fn user_id(&self, index: usize) -> Option<&str> {
        self.user_ids.get(index).map(String::as_str)
    }

    /// Hashtag stored at dense index `index`.
    #[must_use]
    pub fn hashtag(&self, index: usize) -> Option<&str> {
        self.hashtags.get(index).map(String::as_str)
    }

    /// Display name recorded for `user_id`.
    #[must_use]
    pub fn username(&self, user_id: &str) -> Option<&str> {
        self.usernames.get(user_id).map(String::as_str)
    }
}

fn claim(ids: &mut Vec<String>, lookup: &mut HashMap<String, usize>, id: &str) {
    if !lookup.contains_key(id) {
        lookup.insert(id.to_owned(), ids.len());
        ids.push(id.to_owned());
    }
}
