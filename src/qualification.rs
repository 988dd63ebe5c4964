//! Qualification
//!
//! Nested boolean rule trees evaluated against an item's tag set. Promotions
//! use qualifications to decide which items they may redeem against; the same
//! API answers standalone "does this product qualify" queries.

use smallvec::{SmallVec, smallvec};

use crate::tags::TagSet;

/// Boolean operation used to combine qualification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// All child rules must match.
    And,

    /// At least one child rule must match.
    Or,
}

/// Single qualification rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Item must have every listed tag. An empty tag list never matches.
    HasAll(TagSet),

    /// Item must have at least one listed tag. An empty tag list never matches.
    HasAny(TagSet),

    /// Item must have none of the listed tags. An empty tag list always matches.
    HasNone(TagSet),

    /// Nested qualification group, fully resolved at construction time.
    Group(Box<Qualification>),
}

/// Qualification expression for item-tag matching.
///
/// An empty rule list always matches, regardless of operator; this models the
/// "no constraint" authoring case.
#[derive(Debug, Clone)]
pub struct Qualification {
    /// How `rules` are combined.
    pub op: BoolOp,

    /// Child rules. Empty means "match all items".
    pub rules: SmallVec<[Rule; 2]>,
}

impl Qualification {
    /// Create a qualification from operator and rules.
    #[must_use]
    pub fn new(op: BoolOp, rules: SmallVec<[Rule; 2]>) -> Self {
        Self { op, rules }
    }

    /// Match all items.
    #[must_use]
    pub fn match_all() -> Self {
        Self {
            op: BoolOp::And,
            rules: SmallVec::new(),
        }
    }

    /// Match items carrying at least one of the given tags.
    ///
    /// An empty tag set degrades to [`match_all`](Self::match_all).
    #[must_use]
    pub fn match_any(tags: TagSet) -> Self {
        if tags.is_empty() {
            return Self::match_all();
        }

        Self {
            op: BoolOp::And,
            rules: smallvec![Rule::HasAny(tags)],
        }
    }

    /// Evaluate the qualification against an item's tags.
    #[must_use]
    pub fn matches(&self, item_tags: &TagSet) -> bool {
        if self.rules.is_empty() {
            return true;
        }

        match self.op {
            BoolOp::And => self.rules.iter().all(|rule| rule.matches(item_tags)),
            BoolOp::Or => self.rules.iter().any(|rule| rule.matches(item_tags)),
        }
    }
}

impl Default for Qualification {
    fn default() -> Self {
        Self::match_all()
    }
}

impl Rule {
    #[must_use]
    fn matches(&self, item_tags: &TagSet) -> bool {
        match self {
            Self::HasAll(tags) => !tags.is_empty() && item_tags.is_superset_of(tags),
            Self::HasAny(tags) => !tags.is_empty() && item_tags.intersects(tags),
            Self::HasNone(tags) => !item_tags.intersects(tags),
            Self::Group(group) => group.matches(item_tags),
        }
    }
}
