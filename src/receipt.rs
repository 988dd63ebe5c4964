//! Receipt

use std::io;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};
use slotmap::SecondaryMap;
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::{items::Item, promotions::PromotionKey};

/// Errors that can occur when rendering a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// IO error while writing the rendered receipt.
    #[error("io error writing receipt")]
    Io(#[from] io::Error),
}

/// A single promotion redemption recorded against an item.
///
/// `(item_idx, redemption_idx)` is stable for a given stack and input, so
/// callers can persist redemptions against their own records.
#[derive(Debug, Clone)]
pub struct Redemption<'a> {
    /// Key of the promotion that redeemed.
    pub promotion: PromotionKey,

    /// Index of the item in the original input slice.
    pub item_idx: usize,

    /// Caller-supplied reference of the item, echoed back for persistence.
    pub item_reference: String,

    /// Position of this redemption in the item's redemption sequence.
    pub redemption_idx: usize,

    /// Item price when the promotion was applied.
    pub original_price: Money<'a, Currency>,

    /// Item price after the promotion was applied.
    pub final_price: Money<'a, Currency>,
}

impl<'a> Redemption<'a> {
    /// The discount value of this redemption.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction operation fails.
    pub fn savings(&self) -> Result<Money<'a, Currency>, MoneyError> {
        self.original_price.sub(self.final_price)
    }
}

/// Final receipt for a processed list of items.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    /// Indexes of input items that were purchased at full price
    full_price_items: SmallVec<[usize; 10]>,

    /// Redemption details keyed by input item index.
    ///
    /// Each item may have multiple redemptions (one per layer that touched it),
    /// ordered by application.
    redemptions: FxHashMap<usize, SmallVec<[Redemption<'a>; 3]>>,

    /// Total cost before any redemptions
    subtotal: Money<'a, Currency>,

    /// Total amount paid for all items after redemptions
    total: Money<'a, Currency>,

    /// Currency used for all monetary values
    currency: &'a Currency,
}

impl<'a> Receipt<'a> {
    /// Create a new receipt with the given details.
    #[must_use]
    pub fn new(
        full_price_items: SmallVec<[usize; 10]>,
        redemptions: FxHashMap<usize, SmallVec<[Redemption<'a>; 3]>>,
        subtotal: Money<'a, Currency>,
        total: Money<'a, Currency>,
        currency: &'a Currency,
    ) -> Self {
        Self {
            full_price_items,
            redemptions,
            subtotal,
            total,
            currency,
        }
    }

    /// Total cost before any redemptions.
    #[must_use]
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Total amount paid for all items.
    #[must_use]
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Calculate the savings made by applying promotions.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction operation fails.
    pub fn savings(&self) -> Result<Money<'a, Currency>, MoneyError> {
        self.subtotal.sub(self.total)
    }

    /// Calculates the savings as a percentage of the pre-discount subtotal.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction operation fails.
    pub fn savings_percent(&self) -> Result<Percentage, MoneyError> {
        let savings_minor = self.savings()?.to_minor_units();
        let subtotal_minor = self.subtotal.to_minor_units();

        if subtotal_minor == 0 {
            return Ok(Percentage::from(0.0));
        }

        // Do the ratio in decimal space to avoid integer truncation.
        let savings_dec = Decimal::from_i64(savings_minor).unwrap_or(Decimal::ZERO);
        let subtotal_dec = Decimal::from_i64(subtotal_minor).unwrap_or(Decimal::ZERO);

        Ok(Percentage::from(savings_dec / subtotal_dec))
    }

    /// Indexes of items purchased at full price (no redemptions).
    #[must_use]
    pub fn full_price_items(&self) -> &[usize] {
        &self.full_price_items
    }

    /// Redemption details keyed by input item index.
    #[must_use]
    pub fn redemptions(&self) -> &FxHashMap<usize, SmallVec<[Redemption<'a>; 3]>> {
        &self.redemptions
    }

    /// Lookup the redemptions for a given input item index.
    ///
    /// Returns a slice of redemptions in application order.
    pub fn redemptions_for_item(&self, item_idx: usize) -> Option<&[Redemption<'a>]> {
        self.redemptions.get(&item_idx).map(SmallVec::as_slice)
    }

    /// Currency used for all monetary values.
    #[must_use]
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Render the receipt as a table, followed by a savings summary.
    ///
    /// `promotion_names` supplies display names for promotion keys; unnamed
    /// promotions render as "promotion".
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if the receipt cannot be written.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        items: &[Item<'_>],
        promotion_names: &SecondaryMap<PromotionKey, String>,
    ) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Base Price", "Final Price", "Savings", "Promotion"]);

        for (item_idx, item) in items.iter().enumerate() {
            match self.redemptions_for_item(item_idx) {
                Some(redemptions) => {
                    append_redeemed_rows(&mut builder, item_idx, item, redemptions, promotion_names)?;
                }
                None => {
                    builder.push_record([
                        format!("#{}", item_idx + 1),
                        item.reference().to_string(),
                        format!("{}", item.price()),
                        format!("{}", item.price()),
                        String::new(),
                        String::new(),
                    ]);
                }
            }
        }

        let mut table = builder.build();

        table
            .with(Style::sharp())
            .modify(Columns::new(2..=4), Alignment::right());

        writeln!(out, "{table}")?;

        writeln!(out, "Subtotal: {}", self.subtotal)?;
        writeln!(out, "Savings:  {}", self.savings()?)?;
        writeln!(out, "Total:    {}", self.total)?;

        Ok(())
    }

    /// Render the receipt to a `String`.
    ///
    /// Convenience over [`write_to`](Self::write_to) for callers that want
    /// the rendered text rather than streaming it.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if the receipt cannot be rendered.
    pub fn to_table(
        &self,
        items: &[Item<'_>],
        promotion_names: &SecondaryMap<PromotionKey, String>,
    ) -> Result<String, ReceiptError> {
        let mut rendered = Vec::new();

        self.write_to(&mut rendered, items, promotion_names)?;

        Ok(String::from_utf8_lossy(&rendered).into_owned())
    }
}

fn append_redeemed_rows(
    builder: &mut Builder,
    item_idx: usize,
    item: &Item<'_>,
    redemptions: &[Redemption<'_>],
    promotion_names: &SecondaryMap<PromotionKey, String>,
) -> Result<(), ReceiptError> {
    for (idx, redemption) in redemptions.iter().enumerate() {
        let promotion_name = promotion_names
            .get(redemption.promotion)
            .map_or("promotion", String::as_str);

        let [index_cell, reference_cell] = if idx == 0 {
            [format!("#{}", item_idx + 1), item.reference().to_string()]
        } else {
            [String::new(), String::new()]
        };

        builder.push_record([
            index_cell,
            reference_cell,
            format!("{}", redemption.original_price),
            format!("{}", redemption.final_price),
            format!("{}", redemption.savings()?),
            promotion_name.to_string(),
        ]);
    }

    Ok(())
}
