//! Promotions
//!
//! The four promotion types and the budget machinery they share. Each
//! promotion owns a stable [`PromotionKey`], qualification rules deciding
//! which items it touches, a discount, and a [`PromotionBudget`]. Application
//! mutates item prices in place and records redemptions against each item.

use slotmap::new_key_type;

use crate::{
    discounts::DiscountError,
    promotions::budget::{BudgetTracker, PromotionBudget},
    stack::evaluation::TrackedItem,
    tags::TagSet,
};

pub mod budget;
pub mod direct;
pub mod mix_and_match;
pub mod positional;
pub mod tiered_threshold;

pub use direct::DirectPromotion;
pub use mix_and_match::{MixAndMatchPromotion, Slot};
pub use positional::PositionalPromotion;
pub use tiered_threshold::{Tier, TieredThresholdPromotion};

new_key_type! {
    /// Stable identity for a promotion within a stack.
    pub struct PromotionKey;
}

/// Any of the supported promotion types.
#[derive(Debug, Clone)]
pub enum Promotion<'a> {
    /// A discount applied to every qualifying item independently.
    Direct(DirectPromotion<'a>),

    /// A discount applied to positions within windows of qualifying items.
    Positional(PositionalPromotion<'a>),

    /// A group discount over combos drawn from labelled slots.
    MixAndMatch(MixAndMatchPromotion<'a>),

    /// A group discount selected by spend or count thresholds.
    TieredThreshold(TieredThresholdPromotion<'a>),
}

impl<'a> Promotion<'a> {
    /// Return the promotion's key.
    #[must_use]
    pub fn key(&self) -> PromotionKey {
        match self {
            Self::Direct(promotion) => promotion.key(),
            Self::Positional(promotion) => promotion.key(),
            Self::MixAndMatch(promotion) => promotion.key(),
            Self::TieredThreshold(promotion) => promotion.key(),
        }
    }

    /// Return the promotion's budget.
    #[must_use]
    pub fn budget(&self) -> &PromotionBudget<'a> {
        match self {
            Self::Direct(promotion) => promotion.budget(),
            Self::Positional(promotion) => promotion.budget(),
            Self::MixAndMatch(promotion) => promotion.budget(),
            Self::TieredThreshold(promotion) => promotion.budget(),
        }
    }

    /// Check whether an item with these tags could take part in the
    /// promotion, ignoring arity, thresholds, and budget.
    #[must_use]
    pub fn qualifies(&self, tags: &TagSet) -> bool {
        match self {
            Self::Direct(promotion) => promotion.qualification().matches(tags),
            Self::Positional(promotion) => promotion.qualification().matches(tags),
            Self::MixAndMatch(promotion) => promotion
                .slots()
                .iter()
                .any(|slot| slot.qualification.matches(tags)),
            Self::TieredThreshold(promotion) => promotion
                .tiers()
                .iter()
                .any(|tier| tier.contribution.matches(tags) || tier.eligible.matches(tags)),
        }
    }

    /// Apply the promotion to the tracked items, consuming budget per
    /// redemption unit.
    pub(crate) fn apply(
        &self,
        items: &mut [TrackedItem<'a>],
        tracker: &mut BudgetTracker,
    ) -> Result<(), DiscountError> {
        match self {
            Self::Direct(promotion) => promotion.apply(items, tracker),
            Self::Positional(promotion) => promotion.apply(items, tracker),
            Self::MixAndMatch(promotion) => promotion.apply(items, tracker),
            Self::TieredThreshold(promotion) => promotion.apply(items, tracker),
        }
    }
}

impl<'a> From<DirectPromotion<'a>> for Promotion<'a> {
    fn from(promotion: DirectPromotion<'a>) -> Self {
        Self::Direct(promotion)
    }
}

impl<'a> From<PositionalPromotion<'a>> for Promotion<'a> {
    fn from(promotion: PositionalPromotion<'a>) -> Self {
        Self::Positional(promotion)
    }
}

impl<'a> From<MixAndMatchPromotion<'a>> for Promotion<'a> {
    fn from(promotion: MixAndMatchPromotion<'a>) -> Self {
        Self::MixAndMatch(promotion)
    }
}

impl<'a> From<TieredThresholdPromotion<'a>> for Promotion<'a> {
    fn from(promotion: TieredThresholdPromotion<'a>) -> Self {
        Self::TieredThreshold(promotion)
    }
}
