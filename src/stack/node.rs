//! Layer node weights

use serde::Deserialize;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::promotions::Promotion;

/// How items are routed to successor layers after a layer has applied its
/// promotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// All items flow to a single successor via an `All` edge.
    /// The layer may have zero or one outgoing edge.
    #[serde(alias = "pass_through", alias = "passthrough")]
    PassThrough,

    /// Items that redeemed in this layer flow to one successor, items that
    /// did not to another. The layer may have one or two outgoing edges:
    /// `Participating`, `NonParticipating`, or both.
    Split,
}

new_key_type! {
    /// Key identifying a layer in the stack.
    pub struct LayerKey;
}

/// A node in the promotion stack holding an ordered list of promotions.
#[derive(Debug, Clone)]
pub struct LayerNode<'a> {
    /// Key for this layer.
    pub key: LayerKey,

    /// Human-readable layer label, used in receipts and diagnostics.
    pub label: String,

    /// Promotions applied sequentially within this layer, in declaration order.
    pub promotions: SmallVec<[Promotion<'a>; 5]>,

    /// How items are routed to successor layers.
    pub output_mode: OutputMode,
}
