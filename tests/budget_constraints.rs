//! Integration tests for promotion budget enforcement during processing.
//!
//! Budgets gate each redemption unit: an item for direct and positional
//! promotions, a combo for mix-and-match, a tier group for tiered threshold.
//! A rejected unit is skipped silently; processing always succeeds.

use rusty_money::{Money, iso::GBP};
use slotmap::SlotMap;
use testresult::TestResult;

use tillroll::prelude::*;

#[test]
fn application_limit_caps_direct_redemptions() -> TestResult {
    let mut keys = SlotMap::<PromotionKey, ()>::with_key();
    let key = keys.insert(());

    let stack = Stack::single_layer([Promotion::from(DirectPromotion::new(
        key,
        Qualification::match_all(),
        SimpleDiscount::AmountOff(Money::from_minor(50, GBP)),
        PromotionBudget::with_application_limit(1),
    ))])?;

    let items = [
        Item::new("first", Money::from_minor(200, GBP)),
        Item::new("second", Money::from_minor(200, GBP)),
    ];

    let receipt = stack.process(&items, GBP)?;

    // Only the first item redeems; the second hits the application limit.
    assert_eq!(receipt.total().to_minor_units(), 350);
    assert_eq!(receipt.full_price_items(), [1]);

    Ok(())
}

#[test]
fn monetary_limit_rejects_redemptions_that_would_exceed_it() -> TestResult {
    let mut keys = SlotMap::<PromotionKey, ()>::with_key();
    let key = keys.insert(());

    let stack = Stack::single_layer([Promotion::from(DirectPromotion::new(
        key,
        Qualification::match_all(),
        SimpleDiscount::AmountOff(Money::from_minor(50, GBP)),
        PromotionBudget::with_monetary_limit(Money::from_minor(80, GBP)),
    ))])?;

    let items = [
        Item::new("a", Money::from_minor(500, GBP)),
        Item::new("b", Money::from_minor(500, GBP)),
        Item::new("c", Money::from_minor(500, GBP)),
    ];

    let receipt = stack.process(&items, GBP)?;

    // First redemption consumes 50 of 80; each further 50 would exceed the
    // limit, so only one item redeems.
    assert_eq!(receipt.total().to_minor_units(), 1450);
    assert_eq!(receipt.redemptions().len(), 1);

    Ok(())
}

#[test]
fn seeded_consumption_counts_against_the_limit() -> TestResult {
    let mut keys = SlotMap::<PromotionKey, ()>::with_key();
    let key = keys.insert(());

    let budget = PromotionBudget::with_application_limit(2).consumed(1, None);

    let stack = Stack::single_layer([Promotion::from(DirectPromotion::new(
        key,
        Qualification::match_all(),
        SimpleDiscount::AmountOff(Money::from_minor(25, GBP)),
        budget,
    ))])?;

    let items = [
        Item::new("a", Money::from_minor(100, GBP)),
        Item::new("b", Money::from_minor(100, GBP)),
    ];

    let receipt = stack.process(&items, GBP)?;

    // One of the two applications was consumed before this run.
    assert_eq!(receipt.total().to_minor_units(), 175);
    assert_eq!(receipt.redemptions().len(), 1);

    Ok(())
}

#[test]
fn mix_and_match_budget_gates_whole_combos() -> TestResult {
    let mut keys = SlotMap::<PromotionKey, ()>::with_key();
    let key = keys.insert(());

    let slots = vec![
        Slot::single("main", Qualification::match_any(TagSet::from_strs(&["main"]))),
        Slot::single("drink", Qualification::match_any(TagSet::from_strs(&["drink"]))),
    ];

    let stack = Stack::single_layer([Promotion::from(MixAndMatchPromotion::new(
        key,
        slots,
        GroupDiscount::OverrideTotal(Money::from_minor(250, GBP)),
        PromotionBudget::with_application_limit(1),
    ))])?;

    let main = || {
        Item::with_tags("roll", Money::from_minor(200, GBP), TagSet::from_strs(&["main"]))
    };
    let drink = || {
        Item::with_tags("juice", Money::from_minor(100, GBP), TagSet::from_strs(&["drink"]))
    };

    let receipt = stack.process(&[main(), drink(), main(), drink()], GBP)?;

    // First combo redeems at 250; the second combo is rejected as a whole
    // and its two items stay at full price.
    assert_eq!(receipt.subtotal().to_minor_units(), 600);
    assert_eq!(receipt.total().to_minor_units(), 550);
    assert_eq!(receipt.redemptions().len(), 2, "only the first combo's items");

    Ok(())
}

#[test]
fn budget_spans_layers_within_one_run() -> TestResult {
    let mut keys = SlotMap::<PromotionKey, ()>::with_key();
    let router_key = keys.insert(());
    let shared_key = keys.insert(());

    let half_price_snacks = Promotion::from(DirectPromotion::new(
        router_key,
        Qualification::match_any(TagSet::from_strs(&["snack"])),
        SimpleDiscount::PercentageOff(0.50.into()),
        PromotionBudget::unlimited(),
    ));

    let capped = |key| {
        Promotion::from(DirectPromotion::new(
            key,
            Qualification::match_all(),
            SimpleDiscount::AmountOff(Money::from_minor(20, GBP)),
            PromotionBudget::with_application_limit(1),
        ))
    };

    let mut builder = StackBuilder::new();

    let router = builder.add_layer("Snacks", [half_price_snacks], OutputMode::Split);
    let a = builder.add_layer("A", [capped(shared_key)], OutputMode::PassThrough);
    let b = builder.add_layer("B", [capped(shared_key)], OutputMode::PassThrough);

    builder.set_root(router);
    builder.connect_split(router, a, b)?;

    let stack = Stack::from_builder(builder)?;

    let items = [
        Item::with_tags("crisps", Money::from_minor(100, GBP), TagSet::from_strs(&["snack"])),
        Item::new("paper", Money::from_minor(100, GBP)),
    ];

    let receipt = stack.process(&items, GBP)?;

    let capped_redemptions = receipt
        .redemptions()
        .values()
        .flat_map(|r| r.iter())
        .filter(|r| r.promotion == shared_key)
        .count();

    // The capped promotion appears on both branches but draws from a single
    // budget, so it redeems exactly once across the run.
    assert_eq!(capped_redemptions, 1);
    assert_eq!(receipt.total().to_minor_units(), 130);

    Ok(())
}
