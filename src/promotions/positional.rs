//! Positional Promotion
//!
//! Groups qualifying items into fixed-size windows in input order and
//! discounts the items at configured positions within each complete window.
//! Classic "buy one get one free" is a window of two with position one
//! discounted at 100%.

use smallvec::SmallVec;

use crate::{
    discounts::{DiscountError, SimpleDiscount},
    promotions::{PromotionKey, budget::{BudgetTracker, PromotionBudget}},
    qualification::Qualification,
    stack::evaluation::TrackedItem,
};

/// A discount applied to specific positions within windows of qualifying items.
#[derive(Debug, Clone)]
pub struct PositionalPromotion<'a> {
    key: PromotionKey,
    qualification: Qualification,
    size: u16,
    positions: SmallVec<[u16; 4]>,
    discount: SimpleDiscount<'a>,
    budget: PromotionBudget<'a>,
}

impl<'a> PositionalPromotion<'a> {
    /// Create a new positional promotion.
    ///
    /// `positions` are zero-based offsets into each window; offsets at or
    /// beyond `size` are ignored during application.
    pub fn new(
        key: PromotionKey,
        qualification: Qualification,
        size: u16,
        positions: SmallVec<[u16; 4]>,
        discount: SimpleDiscount<'a>,
        budget: PromotionBudget<'a>,
    ) -> Self {
        Self {
            key,
            qualification,
            size,
            positions,
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

    /// Return the window size.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Return the discounted window positions.
    pub fn positions(&self) -> &[u16] {
        &self.positions
    }

    /// Return the budget.
    pub const fn budget(&self) -> &PromotionBudget<'a> {
        &self.budget
    }

    /// Fill windows with qualifying items in input order and attempt one
    /// budget-gated redemption per discounted position in each complete
    /// window. A trailing partial window redeems nothing.
    pub(crate) fn apply(
        &self,
        items: &mut [TrackedItem<'a>],
        tracker: &mut BudgetTracker,
    ) -> Result<(), DiscountError> {
        if self.size == 0 {
            return Ok(());
        }

        let mut window: SmallVec<[usize; 8]> = SmallVec::new();

        for idx in 0..items.len() {
            let qualifies = items
                .get(idx)
                .is_some_and(|tracked| self.qualification.matches(tracked.item.tags()));

            if !qualifies {
                continue;
            }

            window.push(idx);

            if window.len() < usize::from(self.size) {
                continue;
            }

            for &position in &self.positions {
                let Some(&item_idx) = window.get(usize::from(position)) else {
                    continue;
                };
                let Some(tracked) = items.get_mut(item_idx) else {
                    continue;
                };

                let original = *tracked.item.price();
                let final_price = self.discount.apply(&original)?;
                let savings = original.sub(final_price)?;

                if tracker.try_consume(&savings) {
                    tracked.redeem(self.key, final_price);
                }
            }

            window.clear();
        }

        Ok(())
    }
}
