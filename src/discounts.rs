//! Discounts
//!
//! Pure price-transform arithmetic. [`SimpleDiscount`] covers the per-item
//! kinds used by direct and positional promotions; [`GroupDiscount`] covers
//! the kinds applied across a qualifying group of items by mix-and-match and
//! tiered threshold promotions.
//!
//! Percentage math rounds the resulting price to the nearest minor unit,
//! half away from zero. Amount math is exact integer subtraction. Negative
//! results clamp to zero.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::items::cheapest_index;

/// Errors specific to discount calculations.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// No items provided, so currency cannot be determined.
    #[error("no items provided; cannot determine currency for discount")]
    NoItems,

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Per-item discount kinds used by direct and positional promotions.
#[derive(Debug, Copy, Clone)]
pub enum SimpleDiscount<'a> {
    /// Apply a percentage discount (e.g., "25% off").
    PercentageOff(Percentage),

    /// Replace the item price with a fixed amount (e.g., "£5 each").
    AmountOverride(Money<'a, Currency>),

    /// Subtract a fixed amount from the item price (e.g., "£2 off").
    AmountOff(Money<'a, Currency>),
}

impl<'a> SimpleDiscount<'a> {
    /// Calculate the discounted price for a single item price.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Percentage calculation overflows or cannot be safely represented.
    /// - Money arithmetic fails (for example a currency mismatch).
    pub fn apply(&self, price: &Money<'a, Currency>) -> Result<Money<'a, Currency>, DiscountError> {
        let discounted_minor = match self {
            Self::PercentageOff(pct) => apply_percent_off(pct, price.to_minor_units())?,
            Self::AmountOverride(amount) => amount.to_minor_units(),
            Self::AmountOff(amount) => price.sub(*amount)?.to_minor_units(),
        };

        Ok(Money::from_minor(
            discounted_minor.max(0),
            price.currency(),
        ))
    }
}

/// Group discount kinds used by mix-and-match and tiered threshold promotions.
///
/// "Each item" kinds apply the simple transform independently to every item
/// in the group. "Total" kinds transform the sum of the group's prices and
/// distribute the result back across items. "Cheapest" kinds transform only
/// the lowest-priced item, leaving the others untouched.
#[derive(Debug, Clone)]
pub enum GroupDiscount<'a> {
    /// Percentage discount applied independently to each item.
    PercentageOffEachItem(Percentage),

    /// Fixed amount subtracted from each item's price.
    AmountOffEachItem(Money<'a, Currency>),

    /// Each item's price is overridden to a fixed amount.
    OverrideEachItem(Money<'a, Currency>),

    /// Fixed amount subtracted from the total of the group.
    AmountOffTotal(Money<'a, Currency>),

    /// The group as a whole costs a fixed total.
    OverrideTotal(Money<'a, Currency>),

    /// Percentage discount applied only to the cheapest item in the group.
    PercentageOffCheapest(Percentage),

    /// The cheapest item's price is set to a fixed amount.
    OverrideCheapest(Money<'a, Currency>),
}

impl<'a> GroupDiscount<'a> {
    /// Calculate adjusted prices for a group of item prices.
    ///
    /// Returns one adjusted price per input price, in the same order. For the
    /// "Total" kinds the adjusted prices sum exactly to the transformed
    /// total: each item takes its proportional share (rounded down) and the
    /// remainder is assigned to the first item in encounter order.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::NoItems`] for an empty group, or a wrapped
    /// percentage/money error from the underlying arithmetic.
    pub fn apply(
        &self,
        prices: &[Money<'a, Currency>],
    ) -> Result<SmallVec<[Money<'a, Currency>; 10]>, DiscountError> {
        let first = prices.first().ok_or(DiscountError::NoItems)?;
        let currency = first.currency();

        let finals_minor: SmallVec<[i64; 10]> = match self {
            Self::PercentageOffEachItem(pct) => prices
                .iter()
                .map(|price| {
                    apply_percent_off(pct, price.to_minor_units()).map(|v| v.max(0))
                })
                .collect::<Result<_, _>>()?,
            Self::AmountOffEachItem(amount) => {
                let off = amount.to_minor_units();

                prices
                    .iter()
                    .map(|price| (price.to_minor_units() - off).max(0))
                    .collect()
            }
            Self::OverrideEachItem(amount) => {
                let target = amount.to_minor_units().max(0);

                prices.iter().map(|_| target).collect()
            }
            Self::AmountOffTotal(amount) => {
                let total: i64 = prices.iter().map(|p| p.to_minor_units()).sum();
                let target = (total - amount.to_minor_units()).max(0);

                distribute_to_target(prices, target)
            }
            Self::OverrideTotal(amount) => {
                let target = amount.to_minor_units().max(0);

                distribute_to_target(prices, target)
            }
            Self::PercentageOffCheapest(pct) => {
                let cheapest = cheapest_index(prices).ok_or(DiscountError::NoItems)?;

                let mut finals: SmallVec<[i64; 10]> =
                    prices.iter().map(|p| p.to_minor_units()).collect();

                if let Some(minor) = finals.get_mut(cheapest) {
                    *minor = apply_percent_off(pct, *minor)?.max(0);
                }

                finals
            }
            Self::OverrideCheapest(amount) => {
                let cheapest = cheapest_index(prices).ok_or(DiscountError::NoItems)?;

                let mut finals: SmallVec<[i64; 10]> =
                    prices.iter().map(|p| p.to_minor_units()).collect();

                if let Some(minor) = finals.get_mut(cheapest) {
                    *minor = amount.to_minor_units().max(0);
                }

                finals
            }
        };

        Ok(finals_minor
            .into_iter()
            .map(|minor| Money::from_minor(minor, currency))
            .collect())
    }
}

/// Apply a percentage discount to a minor-unit amount. The retained price
/// is rounded to the nearest minor unit, half away from zero, so a 10%
/// discount on 75 yields 68 (67.5 rounded), not 75 minus a rounded 8.
pub(crate) fn apply_percent_off(
    percent: &Percentage,
    minor: i64,
) -> Result<i64, DiscountError> {
    let Some(minor_dec) = Decimal::from_i64(minor) else {
        unreachable!("always returns `Some` for every `i64`")
    };

    let retained = minor_dec - *percent * minor_dec;
    let rounded = retained.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    rounded.to_i64().ok_or(DiscountError::PercentConversion)
}

/// Distribute `target` minor units across prices, proportional to each
/// original price, with the rounding remainder assigned to the first price.
///
/// If the original total is zero (all items free), the whole target lands on
/// the first item so the sum invariant still holds.
fn distribute_to_target(
    prices: &[Money<'_, Currency>],
    target: i64,
) -> SmallVec<[i64; 10]> {
    let total: i64 = prices.iter().map(|p| p.to_minor_units()).sum();

    let mut finals: SmallVec<[i64; 10]> = if total == 0 {
        prices.iter().map(|_| 0).collect()
    } else {
        prices
            .iter()
            .map(|price| {
                let share =
                    i128::from(price.to_minor_units()) * i128::from(target) / i128::from(total);

                // Shares are bounded by `target`, which fits in i64.
                i64::try_from(share).unwrap_or(0)
            })
            .collect()
    };

    let assigned: i64 = finals.iter().sum();
    let remainder = target - assigned;

    if let Some(head) = finals.first_mut() {
        *head += remainder;
    }

    finals
}
