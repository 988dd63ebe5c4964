//! Direct Promotion
//!
//! A percentage discount, amount discount, or amount override applied
//! independently to every qualifying item, in input order, one redemption
//! attempt per item.

use crate::{
    discounts::{DiscountError, SimpleDiscount},
    promotions::{PromotionKey, budget::{BudgetTracker, PromotionBudget}},
    qualification::Qualification,
    stack::evaluation::TrackedItem,
};

/// A discount applied directly to all qualifying items.
#[derive(Debug, Clone)]
pub struct DirectPromotion<'a> {
    key: PromotionKey,
    qualification: Qualification,
    discount: SimpleDiscount<'a>,
    budget: PromotionBudget<'a>,
}

impl<'a> DirectPromotion<'a> {
    /// Create a new direct promotion.
    pub fn new(
        key: PromotionKey,
        qualification: Qualification,
        discount: SimpleDiscount<'a>,
        budget: PromotionBudget<'a>,
    ) -> Self {
        Self {
            key,
            qualification,
            discount,
            budget,
        }
    }

    /// Return the promotion key.
    pub fn key(&self) -> PromotionKey {
        self.key
    }

    /// Return the qualification.
    pub fn qualification(&self) -> &Qualification {
        &self.qualification
    }

    /// Return the discount.
    pub fn discount(&self) -> &SimpleDiscount<'a> {
        &self.discount
    }

    /// Return the budget.
    pub const fn budget(&self) -> &PromotionBudget<'a> {
        &self.budget
    }

    /// Attempt one budget-gated redemption per qualifying item, in input order.
    pub(crate) fn apply(
        &self,
        items: &mut [TrackedItem<'a>],
        tracker: &mut BudgetTracker,
    ) -> Result<(), DiscountError> {
        for tracked in items.iter_mut() {
            if !self.qualification.matches(tracked.item.tags()) {
                continue;
            }

            let original = *tracked.item.price();
            let final_price = self.discount.apply(&original)?;
            let savings = original.sub(final_price)?;

            if tracker.try_consume(&savings) {
                tracked.redeem(self.key, final_price);
            }
        }

        Ok(())
    }
}
