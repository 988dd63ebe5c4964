//! Stack errors

use rusty_money::MoneyError;
use thiserror::Error;

use crate::{discounts::DiscountError, promotions::PromotionKey, stack::LayerKey};

/// Errors that can occur when building or processing a promotion stack.
#[derive(Debug, Error)]
pub enum StackError {
    /// No root layer was set before building the stack.
    #[error("no root layer set on the promotion stack")]
    NoRoot,

    /// The stack contains a cycle, which is not allowed.
    #[error("promotion stack contains a cycle")]
    CycleDetected,

    /// A layer in the stack is not reachable from the root.
    #[error("stack contains unreachable layers")]
    UnreachableLayer,

    /// A promotion key appears more than once in a single path through the stack.
    #[error("promotion {key:?} appears multiple times in path: {path:?}")]
    DuplicatePromotionInPath {
        /// The duplicate promotion key
        key: PromotionKey,

        /// Keys of layers in the path where duplication occurred
        path: Vec<LayerKey>,
    },

    /// An edge was connected to a layer that does not exist in the stack.
    #[error("layer {0} does not exist in the stack")]
    UnknownLayer(usize),

    /// A `PassThrough` layer has more than one outgoing edge.
    #[error("pass-through layer {0} has more than one successor")]
    PassThroughMultipleSuccessors(usize),

    /// A `Split` layer does not have one or two valid outgoing split edges.
    #[error(
        "split layer has incorrect successor edges (need one or two: participating and/or non-participating)"
    )]
    SplitSuccessorMismatch,

    /// An item is priced in a different currency than the stack was asked to
    /// process.
    #[error("item {item} is priced in {found}, expected {expected}")]
    CurrencyMismatch {
        /// Index of the offending item
        item: usize,

        /// ISO code of the item's currency
        found: &'static str,

        /// ISO code of the processing currency
        expected: &'static str,
    },

    /// Discount arithmetic failed while applying a promotion.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Money arithmetic error during processing.
    #[error(transparent)]
    Money(#[from] MoneyError),
}
