//! Meal Deal Demo
//!
//! Builds a two-layer stack from YAML: a meal deal layer (main + side +
//! drink for a fixed price) followed by a member discount layer, then
//! processes a small basket and prints the rendered receipt.
//!
//! Run with: `cargo run --example meal_deal`

use anyhow::Result;
use rusty_money::{Money, iso::GBP};

use tillroll::prelude::*;

const STACK_YAML: &str = r"
root: meal-deals
layers:
  - reference: meal-deals
    output: pass-through
    next: loyalty
    promotions:
      - type: mix-and-match
        name: Lunch Meal Deal
        slots:
          - label: main
            qualification:
              rules:
                - !has-any [main]
          - label: side
            qualification:
              rules:
                - !has-any [side]
          - label: drink
            qualification:
              rules:
                - !has-any [drink]
        discount:
          kind: override-total
          amount: 3.80 GBP
  - reference: loyalty
    output: pass-through
    promotions:
      - type: direct
        name: Member 10%
        qualification:
          rules:
            - !has-any [member-eligible]
        discount:
          kind: percentage-off
          basis-points: 1000
";

/// Meal Deal Demo
#[expect(clippy::print_stdout, reason = "Example code")]
pub fn main() -> Result<()> {
    let (stack, names) = StackConfig::from_yaml(STACK_YAML)?.build()?;

    let items = [
        Item::with_tags(
            "chicken wrap",
            Money::from_minor(2_50, GBP),
            TagSet::from_strs(&["main", "member-eligible"]),
        ),
        Item::with_tags(
            "sea salt crisps",
            Money::from_minor(1_75, GBP),
            TagSet::from_strs(&["side"]),
        ),
        Item::with_tags(
            "still water",
            Money::from_minor(1_25, GBP),
            TagSet::from_strs(&["drink"]),
        ),
        Item::with_tags(
            "chocolate bar",
            Money::from_minor(95, GBP),
            TagSet::from_strs(&["member-eligible"]),
        ),
    ];

    let receipt = stack.process(&items, GBP)?;

    println!("{}", receipt.to_table(&items, &names)?);
    println!(
        "You saved {} ({:.1}%)",
        receipt.savings()?,
        receipt.savings_percent()? * rust_decimal::Decimal::from(100)
    );

    Ok(())
}
