//! Tillroll prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    config::{ConfigError, StackConfig},
    discounts::{DiscountError, GroupDiscount, SimpleDiscount},
    items::Item,
    pricing::{TotalPriceError, total_price},
    promotions::{
        DirectPromotion, MixAndMatchPromotion, PositionalPromotion, Promotion, PromotionKey,
        Slot, Tier, TieredThresholdPromotion,
        budget::{BudgetTracker, PromotionBudget},
    },
    qualification::{BoolOp, Qualification, Rule},
    receipt::{Receipt, ReceiptError, Redemption},
    stack::{LayerKey, OutputMode, Stack, StackBuilder, StackError},
    tags::TagSet,
};
