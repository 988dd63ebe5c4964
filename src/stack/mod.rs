//! Promotion Stack
//!
//! A DAG-based promotion layering system where each node is a "layer" holding
//! an ordered list of promotions. Items flow between layers with updated
//! prices, allowing discounts to stack across layers, and routing edges
//! decide which items reach which downstream layers.

use petgraph::{graph::NodeIndex, stable_graph::StableDiGraph};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use self::{
    edge::ItemFlow,
    evaluation::{TrackedItem, TrackedItems, evaluate_layer},
    node::LayerNode,
};
use crate::{
    items::Item,
    promotions::{Promotion, PromotionKey, budget::BudgetTracker},
    receipt::{Receipt, Redemption},
};

pub mod builder;
pub mod error;

pub(crate) mod edge;
pub(crate) mod evaluation;
pub(crate) mod node;

pub use builder::StackBuilder;
pub use error::StackError;
pub use node::{LayerKey, OutputMode};

/// A validated promotion stack ready for processing.
///
/// Wraps a directed acyclic graph where each node is a promotion layer.
/// Items flow from the root through the graph, accumulating redemptions as
/// they pass through each layer.
#[derive(Debug)]
pub struct Stack<'a> {
    graph: StableDiGraph<LayerNode<'a>, ItemFlow>,
    root: NodeIndex,
}

impl<'a> Stack<'a> {
    /// Create a promotion stack from a builder.
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] if the stack fails validation.
    pub fn from_builder(builder: StackBuilder<'a>) -> Result<Self, StackError> {
        let (graph, root) = builder.build()?;

        Ok(Self { graph, root })
    }

    /// Create a single-layer stack applying all provided promotions in order.
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] if any promotion key is duplicated.
    pub fn single_layer(
        promotions: impl IntoIterator<Item = Promotion<'a>>,
    ) -> Result<Self, StackError> {
        let mut builder = StackBuilder::new();
        let root = builder.add_layer("Default", promotions, OutputMode::PassThrough);
        builder.set_root(root);

        Self::from_builder(builder)
    }

    /// Process a list of items through the stack and produce a receipt.
    ///
    /// Starting from the root, each layer applies its promotions sequentially
    /// in declaration order and routes items to successor layers with updated
    /// prices. Budget state is shared per promotion across the whole run, so
    /// a promotion reachable via two branches draws from a single budget.
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] if any item is priced in a currency other
    /// than `currency`, or if discount arithmetic fails in any layer.
    pub fn process(
        &self,
        items: &[Item<'a>],
        currency: &'a Currency,
    ) -> Result<Receipt<'a>, StackError> {
        for (idx, item) in items.iter().enumerate() {
            let found = item.price().currency();

            if found != currency {
                return Err(StackError::CurrencyMismatch {
                    item: idx,
                    found: found.iso_alpha_code,
                    expected: currency.iso_alpha_code,
                });
            }
        }

        let tracked: TrackedItems<'a> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| TrackedItem::new(idx, item.clone()))
            .collect();

        let mut trackers: SecondaryMap<PromotionKey, BudgetTracker> = SecondaryMap::new();

        for node in self.graph.node_weights() {
            for promotion in &node.promotions {
                trackers.insert(promotion.key(), promotion.budget().tracker());
            }
        }

        let final_items = evaluate_layer(&self.graph, self.root, tracked, &mut trackers)?;

        let subtotal = items
            .iter()
            .try_fold(Money::from_minor(0, currency), |acc, item| {
                acc.add(*item.price())
            })?;

        let mut total = Money::from_minor(0, currency);

        let mut redemptions: FxHashMap<usize, SmallVec<[Redemption<'a>; 3]>> =
            FxHashMap::default();

        let mut full_price_items: SmallVec<[usize; 10]> = SmallVec::new();

        for tracked in final_items {
            total = total.add(*tracked.item.price())?;

            if tracked.redemptions.is_empty() {
                full_price_items.push(tracked.original_idx);
            } else {
                redemptions.insert(tracked.original_idx, tracked.redemptions);
            }
        }

        // Split routing reorders items; restore input order for the receipt.
        full_price_items.sort_unstable();

        Ok(Receipt::new(
            full_price_items,
            redemptions,
            subtotal,
            total,
            currency,
        ))
    }
}
