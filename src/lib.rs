//! Tillroll
//!
//! Tillroll is a promotion routing and pricing engine. Retailers configure
//! promotions (tag-based qualification, a discount, a redemption budget) and
//! arrange them into an ordered graph of layers; processing a list of priced,
//! tagged items through the layer stack yields a receipt of per-item prices
//! and the redemptions that produced them.

pub mod config;
pub mod discounts;
pub mod items;
pub mod prelude;
pub mod pricing;
pub mod promotions;
pub mod qualification;
pub mod receipt;
pub mod stack;
pub mod tags;
