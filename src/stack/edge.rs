//! Layer edge weights

/// Edge weight in a promotion stack, describing which items flow along this edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemFlow {
    /// All items flow along this edge.
    /// Used with [`super::node::OutputMode::PassThrough`] layers.
    All,

    /// Only items that redeemed a promotion in the source layer.
    /// Used with [`super::node::OutputMode::Split`] layers.
    Participating,

    /// Only items that did NOT redeem a promotion in the source layer.
    /// Used with [`super::node::OutputMode::Split`] layers.
    NonParticipating,
}
