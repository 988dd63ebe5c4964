//! Tags
//!
//! The unordered set of lowercase labels attached to an item. Stored as a
//! sorted, deduplicated `SmallVec` so membership and intersection checks can
//! use binary search and two-pointer scans.

use std::cmp::Ordering;

use smallvec::SmallVec;

/// A set of lowercase tags.
///
/// Labels are lowercased on construction, so all comparisons are effectively
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: SmallVec<[String; 5]>,
}

impl TagSet {
    /// Create a tag set from owned labels.
    #[must_use]
    pub fn new(tags: impl IntoIterator<Item = String>) -> Self {
        let mut tags: SmallVec<[String; 5]> =
            tags.into_iter().map(|tag| tag.to_lowercase()).collect();

        tags.sort();
        tags.dedup();

        Self { tags }
    }

    /// Create a tag set from string slices.
    #[must_use]
    pub fn from_strs(tags: &[&str]) -> Self {
        Self::new(tags.iter().map(ToString::to_string))
    }

    /// The empty tag set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tags: SmallVec::new(),
        }
    }

    /// Whether the set contains the given tag (compared lowercased).
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.binary_search(&tag.to_lowercase()).is_ok()
    }

    /// Whether this set and `other` share at least one tag.
    ///
    /// Two-pointer scan over the sorted vectors, O(n + m).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let mut left = self.tags.iter();
        let mut right = other.tags.iter();
        let mut left_tag = left.next();
        let mut right_tag = right.next();

        while let (Some(l), Some(r)) = (left_tag, right_tag) {
            match l.cmp(r) {
                Ordering::Equal => return true,
                Ordering::Less => left_tag = left.next(),
                Ordering::Greater => right_tag = right.next(),
            }
        }

        false
    }

    /// Whether every tag in `other` is present in this set.
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        let mut left = self.tags.iter().peekable();

        'outer: for wanted in &other.tags {
            while let Some(have) = left.peek() {
                match (*have).cmp(wanted) {
                    Ordering::Equal => {
                        left.next();
                        continue 'outer;
                    }
                    Ordering::Less => {
                        left.next();
                    }
                    Ordering::Greater => return false,
                }
            }

            return false;
        }

        true
    }

    /// Add a tag, keeping the set sorted and deduplicated.
    pub fn add(&mut self, tag: &str) {
        let tag = tag.to_lowercase();

        if let Err(pos) = self.tags.binary_search(&tag) {
            self.tags.insert(pos, tag);
        }
    }

    /// Remove a tag if present.
    pub fn remove(&mut self, tag: &str) {
        if let Ok(pos) = self.tags.binary_search(&tag.to_lowercase()) {
            self.tags.remove(pos);
        }
    }

    /// Iterate over the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<String> for TagSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter)
    }
}
