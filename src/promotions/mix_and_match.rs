//! Mix And Match Promotion
//!
//! Items are assigned to labelled slots by qualification and slot capacity,
//! then complete combos are formed greedily in input order and the group
//! discount is applied across each combo. "Meal deal" pricing is the canonical case:
//! one main, one side, and one drink for a fixed total.

use rusty_money::Money;
use smallvec::SmallVec;

use crate::{
    discounts::{DiscountError, GroupDiscount},
    promotions::{PromotionKey, budget::{BudgetTracker, PromotionBudget}},
    qualification::Qualification,
    stack::evaluation::TrackedItem,
};

/// One labelled slot in a mix-and-match combo.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Human-readable slot label, e.g. "main" or "drink".
    pub label: String,

    /// Which items may fill this slot.
    pub qualification: Qualification,

    /// Items required to fill the slot in each combo. Zero is treated as one.
    pub min: usize,

    /// Optional per-combo capacity. A slot at capacity spills further items
    /// to the next matching slot.
    pub max: Option<usize>,
}

impl Slot {
    /// Create a slot requiring exactly one item.
    #[must_use]
    pub fn single(label: impl Into<String>, qualification: Qualification) -> Self {
        Self {
            label: label.into(),
            qualification,
            min: 1,
            max: None,
        }
    }

    fn arity(&self) -> usize {
        self.min.max(1)
    }

    fn capacity(&self) -> usize {
        self.max.map_or_else(|| self.arity(), |max| max.max(self.arity()))
    }
}

/// A group discount applied across combos of items drawn from labelled slots.
#[derive(Debug, Clone)]
pub struct MixAndMatchPromotion<'a> {
    key: PromotionKey,
    slots: Vec<Slot>,
    discount: GroupDiscount<'a>,
    budget: PromotionBudget<'a>,
}

impl<'a> MixAndMatchPromotion<'a> {
    /// Create a new mix-and-match promotion.
    pub fn new(
        key: PromotionKey,
        slots: Vec<Slot>,
        discount: GroupDiscount<'a>,
        budget: PromotionBudget<'a>,
    ) -> Self {
        Self {
            key,
            slots,
            discount,
            budget,
        }
    }

    /// Return the promotion key.
    pub fn key(&self) -> PromotionKey {
        self.key
    }

    /// Return the combo slots.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Return the budget.
    pub const fn budget(&self) -> &PromotionBudget<'a> {
        &self.budget
    }

    /// Bucket items into slots, form combos in input order, and attempt one
    /// budget-gated redemption per combo.
    ///
    /// Combos form in rounds. Within a round each item joins the first slot
    /// whose qualification it matches and which still has capacity; a full
    /// slot spills the item to the next matching slot. A round completes
    /// when every slot holds at least its minimum, and the combo takes
    /// everything assigned in that round. A combo rejected by the budget
    /// still consumes its items; they do not return to the pool for later
    /// combos.
    pub(crate) fn apply(
        &self,
        items: &mut [TrackedItem<'a>],
        tracker: &mut BudgetTracker,
    ) -> Result<(), DiscountError> {
        if self.slots.is_empty() {
            return Ok(());
        }

        let mut consumed = vec![false; items.len()];

        loop {
            let mut round: Vec<Vec<usize>> = vec![Vec::new(); self.slots.len()];

            for (idx, tracked) in items.iter().enumerate() {
                if consumed.get(idx).copied().unwrap_or(true) {
                    continue;
                }

                for (slot_idx, slot) in self.slots.iter().enumerate() {
                    let Some(bucket) = round.get_mut(slot_idx) else {
                        continue;
                    };

                    if bucket.len() < slot.capacity()
                        && slot.qualification.matches(tracked.item.tags())
                    {
                        bucket.push(idx);
                        break;
                    }
                }
            }

            let complete = self
                .slots
                .iter()
                .enumerate()
                .all(|(slot_idx, slot)| round.get(slot_idx).map_or(0, Vec::len) >= slot.arity());

            if !complete {
                break;
            }

            let mut combo: SmallVec<[usize; 8]> = SmallVec::new();

            for bucket in &round {
                combo.extend_from_slice(bucket);
            }

            for &idx in &combo {
                if let Some(flag) = consumed.get_mut(idx) {
                    *flag = true;
                }
            }

            self.redeem_combo(&combo, items, tracker)?;
        }

        Ok(())
    }

    fn redeem_combo(
        &self,
        combo: &[usize],
        items: &mut [TrackedItem<'a>],
        tracker: &mut BudgetTracker,
    ) -> Result<(), DiscountError> {
        let mut prices: SmallVec<[_; 8]> = SmallVec::new();

        for &idx in combo {
            if let Some(tracked) = items.get(idx) {
                prices.push(*tracked.item.price());
            }
        }

        let Some(first) = prices.first() else {
            return Ok(());
        };
        let currency = first.currency();

        let finals = self.discount.apply(&prices)?;

        let original_minor: i64 = prices.iter().map(|p| p.to_minor_units()).sum();
        let final_minor: i64 = finals.iter().map(|p| p.to_minor_units()).sum();
        let savings = Money::from_minor(original_minor - final_minor, currency);

        if !tracker.try_consume(&savings) {
            return Ok(());
        }

        for (&idx, final_price) in combo.iter().zip(finals) {
            if let Some(tracked) = items.get_mut(idx) {
                tracked.redeem(self.key, final_price);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::{items::Item, tags::TagSet};

    use super::*;

    fn tracked<'a>(minor: i64, tag: &str) -> TrackedItem<'a> {
        TrackedItem::new(
            0,
            Item::with_tags("item", Money::from_minor(minor, GBP), TagSet::from_strs(&[tag])),
        )
    }

    fn meal_deal<'a>() -> MixAndMatchPromotion<'a> {
        MixAndMatchPromotion::new(
            PromotionKey::default(),
            vec![
                Slot::single("main", Qualification::match_any(TagSet::from_strs(&["main"]))),
                Slot::single("side", Qualification::match_any(TagSet::from_strs(&["side"]))),
                Slot::single("drink", Qualification::match_any(TagSet::from_strs(&["drink"]))),
            ],
            GroupDiscount::OverrideTotal(Money::from_minor(380, GBP)),
            PromotionBudget::unlimited(),
        )
    }

    #[test]
    fn forms_one_combo_and_distributes_the_override() -> TestResult {
        let promo = meal_deal();

        let mut items = [
            tracked(250, "main"),
            tracked(175, "side"),
            tracked(125, "drink"),
        ];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        let prices: Vec<i64> = items
            .iter()
            .map(|t| t.item.price().to_minor_units())
            .collect();

        // Proportional shares of 380 over 250/175/125, remainder to the first.
        assert_eq!(prices, [174, 120, 86]);
        assert_eq!(prices.iter().sum::<i64>(), 380);

        Ok(())
    }

    #[test]
    fn incomplete_combo_redeems_nothing() -> TestResult {
        let promo = meal_deal();

        let mut items = [tracked(250, "main"), tracked(175, "side")];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        let prices: Vec<i64> = items
            .iter()
            .map(|t| t.item.price().to_minor_units())
            .collect();

        assert_eq!(prices, [250, 175]);

        Ok(())
    }

    #[test]
    fn one_item_fills_at_most_one_slot() -> TestResult {
        // One item matches both slots but may occupy only the first, leaving
        // the second unfilled; no combo forms.
        let promo = MixAndMatchPromotion::new(
            PromotionKey::default(),
            vec![
                Slot::single("main", Qualification::match_any(TagSet::from_strs(&["food"]))),
                Slot::single("side", Qualification::match_any(TagSet::from_strs(&["food"]))),
            ],
            GroupDiscount::OverrideTotal(Money::from_minor(100, GBP)),
            PromotionBudget::unlimited(),
        );

        let mut items = [tracked(250, "food")];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        assert_eq!(
            items.first().map(|t| t.item.price().to_minor_units()),
            Some(250)
        );

        Ok(())
    }

    #[test]
    fn dual_qualified_items_spill_to_the_next_open_slot() -> TestResult {
        // Both slots accept "food"; once the first slot is full the second
        // item spills to the next matching slot and the pair forms a combo.
        let promo = MixAndMatchPromotion::new(
            PromotionKey::default(),
            vec![
                Slot {
                    label: "first".to_string(),
                    qualification: Qualification::match_any(TagSet::from_strs(&["food"])),
                    min: 1,
                    max: Some(1),
                },
                Slot {
                    label: "second".to_string(),
                    qualification: Qualification::match_any(TagSet::from_strs(&["food"])),
                    min: 1,
                    max: Some(1),
                },
            ],
            GroupDiscount::OverrideTotal(Money::from_minor(300, GBP)),
            PromotionBudget::unlimited(),
        );

        let mut items = [tracked(200, "food"), tracked(200, "food")];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        let prices: Vec<i64> = items
            .iter()
            .map(|t| t.item.price().to_minor_units())
            .collect();

        assert_eq!(prices.iter().sum::<i64>(), 300);
        assert!(items.iter().all(|t| !t.redemptions.is_empty()));

        Ok(())
    }

    #[test]
    fn a_slot_takes_up_to_its_max_per_combo() -> TestResult {
        // min 1, max 3: one combo absorbs all three snacks at the bundle price.
        let promo = MixAndMatchPromotion::new(
            PromotionKey::default(),
            vec![Slot {
                label: "snacks".to_string(),
                qualification: Qualification::match_any(TagSet::from_strs(&["snack"])),
                min: 1,
                max: Some(3),
            }],
            GroupDiscount::OverrideTotal(Money::from_minor(250, GBP)),
            PromotionBudget::unlimited(),
        );

        let mut items = [
            tracked(100, "snack"),
            tracked(100, "snack"),
            tracked(100, "snack"),
        ];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        let prices: Vec<i64> = items
            .iter()
            .map(|t| t.item.price().to_minor_units())
            .collect();

        assert_eq!(prices.iter().sum::<i64>(), 250);
        assert_eq!(tracker.consumed_count(), 1, "one combo, one application");

        Ok(())
    }

    #[test]
    fn forms_multiple_combos_until_a_slot_runs_dry() -> TestResult {
        let promo = meal_deal();

        let mut items = [
            tracked(250, "main"),
            tracked(250, "main"),
            tracked(175, "side"),
            tracked(175, "side"),
            tracked(125, "drink"),
        ];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        let redeemed = items
            .iter()
            .filter(|t| !t.redemptions.is_empty())
            .count();

        // Only one drink, so only one combo forms.
        assert_eq!(redeemed, 3);

        Ok(())
    }

    #[test]
    fn budget_rejected_combo_still_consumes_items() -> TestResult {
        let promo = MixAndMatchPromotion::new(
            PromotionKey::default(),
            vec![Slot::single("pair", Qualification::match_all())],
            GroupDiscount::AmountOffTotal(Money::from_minor(100, GBP)),
            PromotionBudget::with_application_limit(1),
        );

        let mut items = [
            tracked(300, "x"),
            tracked(300, "x"),
            tracked(300, "x"),
        ];
        let mut tracker = promo.budget().tracker();

        promo.apply(&mut items, &mut tracker)?;

        let redeemed = items
            .iter()
            .filter(|t| !t.redemptions.is_empty())
            .count();

        assert_eq!(redeemed, 1);
        assert_eq!(tracker.consumed_count(), 1);

        Ok(())
    }
}
