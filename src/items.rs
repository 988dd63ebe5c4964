//! Items

use rusty_money::{Money, iso::Currency};

use crate::tags::TagSet;

/// A priced, tagged unit being discounted.
///
/// The `reference` is an opaque identifier supplied by the caller (for
/// example a cart-line id) and is echoed back on redemptions so the caller
/// can persist them against its own records.
#[derive(Clone, Debug, PartialEq)]
pub struct Item<'a> {
    reference: String,
    price: Money<'a, Currency>,
    tags: TagSet,
}

impl<'a> Item<'a> {
    /// Creates a new item with the given price and empty tags.
    #[must_use]
    pub fn new(reference: impl Into<String>, price: Money<'a, Currency>) -> Self {
        Self::with_tags(reference, price, TagSet::empty())
    }

    /// Creates a new item with the given price and tags.
    pub fn with_tags(reference: impl Into<String>, price: Money<'a, Currency>, tags: TagSet) -> Self {
        Self {
            reference: reference.into(),
            price,
            tags,
        }
    }

    /// Returns the caller-supplied reference for the item.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Returns the price of the item.
    pub fn price(&self) -> &Money<'a, Currency> {
        &self.price
    }

    /// Returns the tags for the item.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the tags for the item, mutably.
    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// Replaces the item's price with a discounted one.
    pub(crate) fn set_price(&mut self, price: Money<'a, Currency>) {
        self.price = price;
    }
}

/// Returns the index of the cheapest price, ties broken by encounter order.
pub(crate) fn cheapest_index(prices: &[Money<'_, Currency>]) -> Option<usize> {
    prices
        .iter()
        .enumerate()
        .min_by_key(|(_, price)| price.to_minor_units())
        .map(|(idx, _)| idx)
}
