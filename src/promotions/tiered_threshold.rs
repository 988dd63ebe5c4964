//! Tiered Threshold Promotion
//!
//! A promotion whose reward depends on how much qualifying spend or how many
//! qualifying items are present. Tiers are checked in declaration order and
//! the first tier whose threshold is met wins; its group discount is applied
//! across the tier's eligible items.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    discounts::{DiscountError, GroupDiscount},
    promotions::{PromotionKey, budget::{BudgetTracker, PromotionBudget}},
    qualification::Qualification,
    stack::evaluation::TrackedItem,
};

/// One tier of a tiered threshold promotion.
#[derive(Debug, Clone)]
pub struct Tier<'a> {
    /// Which items count towards the tier's thresholds.
    pub contribution: Qualification,

    /// Which items receive the tier's discount once the threshold is met.
    pub eligible: Qualification,

    /// Lower bound on qualifying spend, inclusive.
    pub min_spend: Option<Money<'a, Currency>>,

    /// Upper bound on qualifying spend, exclusive. Only meaningful with `min_spend`.
    pub max_spend: Option<Money<'a, Currency>>,

    /// Lower bound on qualifying item count, inclusive.
    pub min_count: Option<u32>,

    /// Upper bound on qualifying item count, exclusive. Only meaningful with `min_count`.
    pub max_count: Option<u32>,

    /// Discount applied across the eligible items.
    pub discount: GroupDiscount<'a>,
}

impl<'a> Tier<'a> {
    /// Check the tier's thresholds against qualifying spend and count.
    ///
    /// A tier with a spend dimension matches when spend falls inside
    /// `[min_spend, max_spend)`; a count dimension likewise. A tier with both
    /// dimensions matches when either does, and a tier with neither always
    /// matches, which makes it a catch-all final tier.
    #[must_use]
    pub fn threshold_met(&self, spend_minor: i64, count: u32) -> bool {
        let by_spend = self.min_spend.map(|lower| {
            spend_minor >= lower.to_minor_units()
                && self
                    .max_spend
                    .is_none_or(|upper| spend_minor < upper.to_minor_units())
        });

        let by_count = self.min_count.map(|lower| {
            count >= lower && self.max_count.is_none_or(|upper| count < upper)
        });

        match (by_spend, by_count) {
            (None, None) => true,
            _ => by_spend.unwrap_or(false) || by_count.unwrap_or(false),
        }
    }
}

/// A group discount selected by spend or count thresholds over qualifying items.
#[derive(Debug, Clone)]
pub struct TieredThresholdPromotion<'a> {
    key: PromotionKey,
    tiers: Vec<Tier<'a>>,
    budget: PromotionBudget<'a>,
}

impl<'a> TieredThresholdPromotion<'a> {
    /// Create a new tiered threshold promotion.
    pub fn new(key: PromotionKey, tiers: Vec<Tier<'a>>, budget: PromotionBudget<'a>) -> Self {
        Self { key, tiers, budget }
    }

    /// Return the promotion key.
    pub fn key(&self) -> PromotionKey {
        self.key
    }

    /// Return the tiers in declaration order.
    pub fn tiers(&self) -> &[Tier<'a>] {
        &self.tiers
    }

    /// Return the budget.
    pub const fn budget(&self) -> &PromotionBudget<'a> {
        &self.budget
    }

    /// Select the first tier whose threshold is met and attempt one
    /// budget-gated redemption covering all of its eligible items.
    pub(crate) fn apply(
        &self,
        items: &mut [TrackedItem<'a>],
        tracker: &mut BudgetTracker,
    ) -> Result<(), DiscountError> {
        let Some(tier) = self.select_tier(items) else {
            return Ok(());
        };

        let eligible: SmallVec<[usize; 10]> = items
            .iter()
            .enumerate()
            .filter(|(_, tracked)| tier.eligible.matches(tracked.item.tags()))
            .map(|(idx, _)| idx)
            .collect();

        let mut prices: SmallVec<[_; 10]> = SmallVec::new();

        for &idx in &eligible {
            if let Some(tracked) = items.get(idx) {
                prices.push(*tracked.item.price());
            }
        }

        let Some(first) = prices.first() else {
            return Ok(());
        };
        let currency = first.currency();

        let finals = tier.discount.apply(&prices)?;

        let original_minor: i64 = prices.iter().map(|p| p.to_minor_units()).sum();
        let final_minor: i64 = finals.iter().map(|p| p.to_minor_units()).sum();
        let savings = Money::from_minor(original_minor - final_minor, currency);

        if !tracker.try_consume(&savings) {
            return Ok(());
        }

        for (&idx, final_price) in eligible.iter().zip(finals) {
            if let Some(tracked) = items.get_mut(idx) {
                tracked.redeem(self.key, final_price);
            }
        }

        Ok(())
    }

    fn select_tier(&self, items: &[TrackedItem<'a>]) -> Option<&Tier<'a>> {
        self.tiers.iter().find(|tier| {
            let mut spend_minor: i64 = 0;
            let mut count: u32 = 0;

            for tracked in items {
                if tier.contribution.matches(tracked.item.tags()) {
                    spend_minor += tracked.item.price().to_minor_units();
                    count += 1;
                }
            }

            tier.threshold_met(spend_minor, count)
        })
    }
}
