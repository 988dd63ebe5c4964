//! DFS stack evaluation engine.

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use rusty_money::{Money, iso::Currency};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::{
    items::Item,
    promotions::{PromotionKey, budget::BudgetTracker},
    receipt::Redemption,
    stack::{
        edge::ItemFlow,
        error::StackError,
        node::{LayerNode, OutputMode},
    },
};

pub(crate) type TrackedItems<'a> = SmallVec<[TrackedItem<'a>; 8]>;

/// An item flowing through the stack, carrying provenance information.
#[derive(Debug, Clone)]
pub(crate) struct TrackedItem<'a> {
    /// Index of this item in the original input slice
    pub original_idx: usize,

    /// The item with its current (possibly discounted) price
    pub item: Item<'a>,

    /// Redemptions accumulated across layers
    pub redemptions: SmallVec<[Redemption<'a>; 3]>,

    /// Whether the item redeemed a promotion in the layer currently being
    /// evaluated. Reset at each layer entry; drives `Split` routing.
    layer_redeemed: bool,
}

impl<'a> TrackedItem<'a> {
    pub(crate) fn new(original_idx: usize, item: Item<'a>) -> Self {
        Self {
            original_idx,
            item,
            redemptions: SmallVec::new(),
            layer_redeemed: false,
        }
    }

    /// Record a redemption and move the item to its new price.
    pub(crate) fn redeem(&mut self, promotion: PromotionKey, final_price: Money<'a, Currency>) {
        self.redemptions.push(Redemption {
            promotion,
            item_idx: self.original_idx,
            item_reference: self.item.reference().to_string(),
            redemption_idx: self.redemptions.len(),
            original_price: *self.item.price(),
            final_price,
        });

        self.item.set_price(final_price);
        self.layer_redeemed = true;
    }
}

/// Evaluate a single layer in the promotion stack.
///
/// Applies the layer's promotions sequentially in declaration order, then
/// routes items to successors based on the layer's output mode.
///
/// # Errors
///
/// Returns a [`StackError`] if discount arithmetic fails in any promotion.
pub(crate) fn evaluate_layer<'a>(
    graph: &StableDiGraph<LayerNode<'a>, ItemFlow>,
    node_idx: NodeIndex,
    mut items: TrackedItems<'a>,
    trackers: &mut SecondaryMap<PromotionKey, BudgetTracker>,
) -> Result<TrackedItems<'a>, StackError> {
    if items.is_empty() {
        return Ok(TrackedItems::new());
    }

    let Some(node) = graph.node_weight(node_idx) else {
        return Ok(items);
    };

    // Split routing considers only redemptions made in this layer.
    for tracked in &mut items {
        tracked.layer_redeemed = false;
    }

    for promotion in &node.promotions {
        let Some(tracker) = trackers.get_mut(promotion.key()) else {
            continue;
        };

        promotion.apply(&mut items, tracker)?;
    }

    route_to_successors(graph, node_idx, node.output_mode, items, trackers)
}

/// Route items to successor layers based on output mode.
fn route_to_successors<'a>(
    graph: &StableDiGraph<LayerNode<'a>, ItemFlow>,
    node_idx: NodeIndex,
    output_mode: OutputMode,
    items: TrackedItems<'a>,
    trackers: &mut SecondaryMap<PromotionKey, BudgetTracker>,
) -> Result<TrackedItems<'a>, StackError> {
    let edges: SmallVec<[(NodeIndex, ItemFlow); 2]> = graph
        .edges(node_idx)
        .map(|e| (e.target(), *e.weight()))
        .collect();

    match output_mode {
        OutputMode::PassThrough => {
            let successor = edges.iter().find(|(_, w)| *w == ItemFlow::All);

            match successor {
                Some((target, _)) => evaluate_layer(graph, *target, items, trackers),
                None => Ok(items),
            }
        }
        OutputMode::Split => {
            let mut participating: TrackedItems<'a> = TrackedItems::new();
            let mut non_participating: TrackedItems<'a> = TrackedItems::new();

            for item in items {
                if item.layer_redeemed {
                    participating.push(item);
                } else {
                    non_participating.push(item);
                }
            }

            let participating_target = edges
                .iter()
                .find(|(_, w)| *w == ItemFlow::Participating)
                .map(|(t, _)| *t);

            let non_participating_target = edges
                .iter()
                .find(|(_, w)| *w == ItemFlow::NonParticipating)
                .map(|(t, _)| *t);

            let mut final_items: TrackedItems<'a> = TrackedItems::new();

            if let Some(target) = participating_target
                && !participating.is_empty()
            {
                final_items.extend(evaluate_layer(graph, target, participating, trackers)?);
            } else {
                final_items.extend(participating);
            }

            if let Some(target) = non_participating_target
                && !non_participating.is_empty()
            {
                final_items.extend(evaluate_layer(graph, target, non_participating, trackers)?);
            } else {
                final_items.extend(non_participating);
            }

            Ok(final_items)
        }
    }
}
