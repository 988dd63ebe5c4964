//! Builder for constructing validated promotion stacks.

use std::collections::hash_map::RandomState;

use petgraph::{
    algo::{is_cyclic_directed, simple_paths::all_simple_paths},
    graph::NodeIndex,
    stable_graph::StableDiGraph,
    visit::Dfs,
};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::{
    promotions::Promotion,
    stack::{
        edge::ItemFlow,
        error::StackError,
        node::{LayerKey, LayerNode, OutputMode},
    },
};

/// Builder for constructing a validated [`super::Stack`].
///
/// Ensures the stack satisfies all structural invariants before producing
/// a `Stack`.
#[derive(Debug)]
pub struct StackBuilder<'a> {
    graph: StableDiGraph<LayerNode<'a>, ItemFlow>,
    root: Option<NodeIndex>,
    layer_keys: SlotMap<LayerKey, ()>,
}

impl<'a> StackBuilder<'a> {
    /// Create a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            root: None,
            layer_keys: SlotMap::with_key(),
        }
    }

    /// Add a layer to the stack.
    ///
    /// Promotion key uniqueness is validated per-path during stack finalization.
    pub fn add_layer(
        &mut self,
        label: impl Into<String>,
        promotions: impl IntoIterator<Item = Promotion<'a>>,
        output_mode: OutputMode,
    ) -> NodeIndex {
        let key = self.layer_keys.insert(());

        let node = LayerNode {
            key,
            label: label.into(),
            promotions: promotions.into_iter().collect(),
            output_mode,
        };

        self.graph.add_node(node)
    }

    /// Set the root layer of the stack (processing starts here).
    pub fn set_root(&mut self, node: NodeIndex) {
        self.root = Some(node);
    }

    fn ensure_layers_exist(&self, nodes: &[NodeIndex]) -> Result<(), StackError> {
        for &node in nodes {
            if self.graph.node_weight(node).is_none() {
                return Err(StackError::UnknownLayer(node.index()));
            }
        }

        Ok(())
    }

    /// Connect a `PassThrough` layer to its single successor via an `All` edge.
    ///
    /// # Errors
    ///
    /// Returns an error if either layer does not exist or the source layer
    /// already has an outgoing edge.
    pub fn connect_pass_through(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
    ) -> Result<(), StackError> {
        self.ensure_layers_exist(&[from, to])?;

        if self.graph.edges(from).count() > 0 {
            return Err(StackError::PassThroughMultipleSuccessors(from.index()));
        }

        self.graph.add_edge(from, to, ItemFlow::All);

        Ok(())
    }

    /// Connect a `Split` layer to its two successors: items that redeemed in
    /// the layer flow to `participating_to`, the rest to `non_participating_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if any layer does not exist or the source layer
    /// already has outgoing edges.
    pub fn connect_split(
        &mut self,
        from: NodeIndex,
        participating_to: NodeIndex,
        non_participating_to: NodeIndex,
    ) -> Result<(), StackError> {
        self.ensure_layers_exist(&[from, participating_to, non_participating_to])?;

        if self.graph.edges(from).count() > 0 {
            return Err(StackError::SplitSuccessorMismatch);
        }

        self.graph
            .add_edge(from, participating_to, ItemFlow::Participating);

        self.graph
            .add_edge(from, non_participating_to, ItemFlow::NonParticipating);

        Ok(())
    }

    /// Connect a `Split` layer with only a participating items target.
    /// Non-participating items will stop at this layer.
    ///
    /// # Errors
    ///
    /// Returns an error if either layer does not exist or the source layer
    /// already has outgoing edges.
    pub fn connect_split_participating_only(
        &mut self,
        from: NodeIndex,
        participating_to: NodeIndex,
    ) -> Result<(), StackError> {
        self.ensure_layers_exist(&[from, participating_to])?;

        if self.graph.edges(from).count() > 0 {
            return Err(StackError::SplitSuccessorMismatch);
        }

        self.graph
            .add_edge(from, participating_to, ItemFlow::Participating);

        Ok(())
    }

    /// Connect a `Split` layer with only a non-participating items target.
    /// Participating items will stop at this layer.
    ///
    /// # Errors
    ///
    /// Returns an error if either layer does not exist or the source layer
    /// already has outgoing edges.
    pub fn connect_split_non_participating_only(
        &mut self,
        from: NodeIndex,
        non_participating_to: NodeIndex,
    ) -> Result<(), StackError> {
        self.ensure_layers_exist(&[from, non_participating_to])?;

        if self.graph.edges(from).count() > 0 {
            return Err(StackError::SplitSuccessorMismatch);
        }

        self.graph
            .add_edge(from, non_participating_to, ItemFlow::NonParticipating);

        Ok(())
    }

    /// Build and validate the promotion stack.
    ///
    /// # Validation rules
    ///
    /// 1. A root layer must be set
    /// 2. The stack must not contain cycles
    /// 3. All layers must be reachable from the root
    /// 4. `PassThrough` layers must have 0 or 1 outgoing `All` edges
    /// 5. `Split` layers must have 1 or 2 edges: at least one of `Participating` or `NonParticipating`
    /// 6. No promotion key appears more than once in any single root-to-leaf path
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] if any validation rule is violated.
    pub(crate) fn build(
        self,
    ) -> Result<(StableDiGraph<LayerNode<'a>, ItemFlow>, NodeIndex), StackError> {
        // 1. Root must be set
        let root = self.root.ok_or(StackError::NoRoot)?;

        // 2. No cycles
        if is_cyclic_directed(&self.graph) {
            return Err(StackError::CycleDetected);
        }

        // 3. All layers reachable from root
        let mut dfs = Dfs::new(&self.graph, root);
        let mut reachable_count = 0_usize;

        while dfs.next(&self.graph).is_some() {
            reachable_count = reachable_count.saturating_add(1);
        }

        if reachable_count != self.graph.node_count() {
            return Err(StackError::UnreachableLayer);
        }

        // 4 & 5. Validate output mode vs edges for each layer
        for node_idx in self.graph.node_indices() {
            let Some(node) = self.graph.node_weight(node_idx) else {
                continue;
            };

            let edges: SmallVec<[&ItemFlow; 3]> =
                self.graph.edges(node_idx).map(|e| e.weight()).collect();

            match node.output_mode {
                OutputMode::PassThrough => {
                    if edges.len() > 1 {
                        return Err(StackError::PassThroughMultipleSuccessors(node_idx.index()));
                    }

                    if edges.len() == 1 && edges.first() != Some(&&ItemFlow::All) {
                        return Err(StackError::PassThroughMultipleSuccessors(node_idx.index()));
                    }
                }
                OutputMode::Split => {
                    let has_participating = edges.iter().any(|e| **e == ItemFlow::Participating);
                    let has_non_participating =
                        edges.iter().any(|e| **e == ItemFlow::NonParticipating);

                    // Split layers need 1-2 edges, each Participating or NonParticipating
                    if edges.is_empty()
                        || edges.len() > 2
                        || (!has_participating && !has_non_participating)
                    {
                        return Err(StackError::SplitSuccessorMismatch);
                    }

                    for edge in &edges {
                        if **edge != ItemFlow::Participating && **edge != ItemFlow::NonParticipating
                        {
                            return Err(StackError::SplitSuccessorMismatch);
                        }
                    }
                }
            }
        }

        // 6. Per-path promotion uniqueness
        validate_path_promotion_uniqueness(&self.graph, root)?;

        Ok((self.graph, root))
    }
}

/// Validate that no promotion key appears more than once in any single path.
fn validate_path_promotion_uniqueness(
    graph: &StableDiGraph<LayerNode<'_>, ItemFlow>,
    root: NodeIndex,
) -> Result<(), StackError> {
    // Find all leaf layers (no outgoing edges)
    let leaf_nodes: SmallVec<[NodeIndex; 10]> = graph
        .node_indices()
        .filter(|&node_idx| graph.edges(node_idx).count() == 0)
        .collect();

    // Special case: single-layer stack (root is leaf)
    if leaf_nodes.is_empty() || (leaf_nodes.len() == 1 && leaf_nodes.first().copied() == Some(root))
    {
        return validate_single_layer(graph, root);
    }

    for leaf in &leaf_nodes {
        let paths = all_simple_paths::<Vec<NodeIndex>, _, RandomState>(graph, root, *leaf, 0, None);

        for path in paths {
            validate_path(&path, graph)?;
        }
    }

    Ok(())
}

/// Validate promotion uniqueness for a single path.
fn validate_path(
    path: &[NodeIndex],
    graph: &StableDiGraph<LayerNode<'_>, ItemFlow>,
) -> Result<(), StackError> {
    let mut seen_in_path = FxHashSet::default();
    let mut path_keys: SmallVec<[LayerKey; 5]> = SmallVec::new();

    for &node_idx in path {
        let Some(node) = graph.node_weight(node_idx) else {
            continue;
        };

        path_keys.push(node.key);

        for promotion in &node.promotions {
            let key = promotion.key();

            if !seen_in_path.insert(key) {
                return Err(StackError::DuplicatePromotionInPath {
                    key,
                    path: path_keys.into_vec(),
                });
            }
        }
    }

    Ok(())
}

/// Validate a single-layer stack (root is leaf).
fn validate_single_layer(
    graph: &StableDiGraph<LayerNode<'_>, ItemFlow>,
    root: NodeIndex,
) -> Result<(), StackError> {
    let Some(node) = graph.node_weight(root) else {
        return Ok(());
    };

    let mut seen = FxHashSet::default();

    for promotion in &node.promotions {
        let key = promotion.key();

        if !seen.insert(key) {
            return Err(StackError::DuplicatePromotionInPath {
                key,
                path: vec![node.key],
            });
        }
    }

    Ok(())
}

impl Default for StackBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;

    use crate::{
        discounts::SimpleDiscount,
        promotions::{DirectPromotion, Promotion, PromotionKey, budget::PromotionBudget},
        qualification::Qualification,
        tags::TagSet,
    };

    use super::*;

    fn test_promotion(key: PromotionKey) -> Promotion<'static> {
        Promotion::from(DirectPromotion::new(
            key,
            Qualification::match_any(TagSet::from_strs(&["a"])),
            SimpleDiscount::PercentageOff(Percentage::from(0.10)),
            PromotionBudget::unlimited(),
        ))
    }

    #[test]
    fn build_single_layer_stack() {
        let mut builder = StackBuilder::new();
        let node = builder.add_layer(
            "Store",
            [test_promotion(PromotionKey::default())],
            OutputMode::PassThrough,
        );

        builder.set_root(node);

        assert!(builder.build().is_ok());
    }

    #[test]
    fn build_rejects_no_root() {
        let builder = StackBuilder::new();

        assert!(matches!(builder.build(), Err(StackError::NoRoot)));
    }

    #[test]
    fn allow_same_promotion_in_different_paths() {
        let mut builder = StackBuilder::new();
        let mut keys = slotmap::SlotMap::<PromotionKey, ()>::with_key();
        let shared_key = keys.insert(());
        let k1 = keys.insert(());
        let k2 = keys.insert(());

        // Root splits into two paths; each path uses the same promotion.
        let root = builder.add_layer("Root", [test_promotion(k1)], OutputMode::Split);

        let participating = builder.add_layer(
            "Participating",
            [test_promotion(k2), test_promotion(shared_key)],
            OutputMode::PassThrough,
        );

        let non_participating = builder.add_layer(
            "NonParticipating",
            [test_promotion(shared_key)],
            OutputMode::PassThrough,
        );

        builder.set_root(root);
        assert!(
            builder
                .connect_split(root, participating, non_participating)
                .is_ok()
        );

        let result = builder.build();

        assert!(
            result.is_ok(),
            "same promotion in different paths should be allowed, got: {:?}",
            result.as_ref().err()
        );
    }

    #[test]
    fn reject_duplicate_in_same_path() {
        let mut builder = StackBuilder::new();
        let key = PromotionKey::default();

        let layer1 = builder.add_layer("Layer1", [test_promotion(key)], OutputMode::PassThrough);
        let layer2 = builder.add_layer("Layer2", [test_promotion(key)], OutputMode::PassThrough);

        builder.set_root(layer1);
        assert!(builder.connect_pass_through(layer1, layer2).is_ok());

        assert!(matches!(
            builder.build(),
            Err(StackError::DuplicatePromotionInPath { .. })
        ));
    }

    #[test]
    fn reject_duplicate_in_single_layer() {
        let mut builder = StackBuilder::new();
        let key = PromotionKey::default();

        let node = builder.add_layer(
            "Store",
            [test_promotion(key), test_promotion(key)],
            OutputMode::PassThrough,
        );

        builder.set_root(node);

        assert!(matches!(
            builder.build(),
            Err(StackError::DuplicatePromotionInPath { .. })
        ));
    }

    #[test]
    fn build_rejects_unreachable_layers() {
        let mut builder = StackBuilder::new();

        let mut keys = slotmap::SlotMap::<PromotionKey, ()>::with_key();
        let k1 = keys.insert(());
        let k2 = keys.insert(());

        let root = builder.add_layer("Root", [test_promotion(k1)], OutputMode::PassThrough);
        let _isolated = builder.add_layer("Isolated", [test_promotion(k2)], OutputMode::PassThrough);

        builder.set_root(root);

        assert!(matches!(
            builder.build(),
            Err(StackError::UnreachableLayer)
        ));
    }

    #[test]
    fn build_split_layer_without_edges_fails() {
        let mut builder = StackBuilder::new();

        let node = builder.add_layer(
            "Store",
            [test_promotion(PromotionKey::default())],
            OutputMode::Split,
        );

        builder.set_root(node);

        assert!(matches!(
            builder.build(),
            Err(StackError::SplitSuccessorMismatch)
        ));
    }

    #[test]
    fn build_valid_split_stack() {
        let mut builder = StackBuilder::new();
        let mut keys = slotmap::SlotMap::<PromotionKey, ()>::with_key();
        let k1 = keys.insert(());
        let k2 = keys.insert(());
        let k3 = keys.insert(());

        let root = builder.add_layer("Store", [test_promotion(k1)], OutputMode::Split);
        let participating = builder.add_layer("Loyalty", [test_promotion(k2)], OutputMode::PassThrough);
        let non_participating = builder.add_layer("Coupons", [test_promotion(k3)], OutputMode::PassThrough);

        builder.set_root(root);

        assert!(
            builder
                .connect_split(root, participating, non_participating)
                .is_ok()
        );

        assert!(builder.build().is_ok());
    }

    #[test]
    fn connect_pass_through_rejects_second_edge() {
        let mut builder = StackBuilder::new();
        let mut keys = slotmap::SlotMap::<PromotionKey, ()>::with_key();
        let k1 = keys.insert(());
        let k2 = keys.insert(());
        let k3 = keys.insert(());

        let root = builder.add_layer("Root", [test_promotion(k1)], OutputMode::PassThrough);
        let n2 = builder.add_layer("N2", [test_promotion(k2)], OutputMode::PassThrough);
        let n3 = builder.add_layer("N3", [test_promotion(k3)], OutputMode::PassThrough);

        assert!(builder.connect_pass_through(root, n2).is_ok());

        assert!(matches!(
            builder.connect_pass_through(root, n3),
            Err(StackError::PassThroughMultipleSuccessors(_))
        ));
    }

    #[test]
    fn connect_split_rejects_second_edge() {
        let mut builder = StackBuilder::new();
        let key = PromotionKey::default();

        let root = builder.add_layer("Root", [test_promotion(key)], OutputMode::Split);
        let a = builder.add_layer("A", std::iter::empty::<Promotion>(), OutputMode::PassThrough);
        let b = builder.add_layer("B", std::iter::empty::<Promotion>(), OutputMode::PassThrough);

        assert!(builder.connect_split(root, a, b).is_ok());
        assert!(matches!(
            builder.connect_split(root, b, a),
            Err(StackError::SplitSuccessorMismatch)
        ));
    }

    #[test]
    fn connect_split_single_sided_edges_validate() {
        let mut keys = slotmap::SlotMap::<PromotionKey, ()>::with_key();
        let k1 = keys.insert(());
        let k2 = keys.insert(());

        let mut builder = StackBuilder::new();
        let root = builder.add_layer("Root", [test_promotion(k1)], OutputMode::Split);
        let leaf = builder.add_layer("Leaf", [test_promotion(k2)], OutputMode::PassThrough);

        builder.set_root(root);

        assert!(builder.connect_split_participating_only(root, leaf).is_ok());
        assert!(builder.build().is_ok());

        let mut keys = slotmap::SlotMap::<PromotionKey, ()>::with_key();
        let k1 = keys.insert(());
        let k2 = keys.insert(());

        let mut builder = StackBuilder::new();
        let root = builder.add_layer("Root", [test_promotion(k1)], OutputMode::Split);
        let leaf = builder.add_layer("Leaf", [test_promotion(k2)], OutputMode::PassThrough);

        builder.set_root(root);

        assert!(
            builder
                .connect_split_non_participating_only(root, leaf)
                .is_ok()
        );
        assert!(builder.build().is_ok());
    }

    #[test]
    fn connect_rejects_unknown_layer() {
        let mut builder = StackBuilder::new();

        let root = builder.add_layer("Root", std::iter::empty::<Promotion>(), OutputMode::PassThrough);

        assert!(matches!(
            builder.connect_pass_through(root, NodeIndex::new(42)),
            Err(StackError::UnknownLayer(42))
        ));
    }

    #[test]
    fn build_rejects_cycle() {
        let mut builder = StackBuilder::new();

        let root = builder.add_layer("Root", std::iter::empty::<Promotion>(), OutputMode::PassThrough);
        let leaf = builder.add_layer("Leaf", std::iter::empty::<Promotion>(), OutputMode::PassThrough);

        builder.set_root(root);

        builder.graph.add_edge(root, leaf, ItemFlow::All);
        builder.graph.add_edge(leaf, root, ItemFlow::All);

        assert!(matches!(builder.build(), Err(StackError::CycleDetected)));
    }

    #[test]
    fn build_rejects_invalid_edge_types_for_output_mode() {
        let mut builder = StackBuilder::new();

        let root = builder.add_layer("Root", std::iter::empty::<Promotion>(), OutputMode::PassThrough);
        let child = builder.add_layer("Child", std::iter::empty::<Promotion>(), OutputMode::PassThrough);

        builder.set_root(root);
        builder.graph.add_edge(root, child, ItemFlow::Participating);

        assert!(matches!(
            builder.build(),
            Err(StackError::PassThroughMultipleSuccessors(_))
        ));

        let mut builder = StackBuilder::new();

        let root = builder.add_layer("Root", std::iter::empty::<Promotion>(), OutputMode::Split);
        let child = builder.add_layer("Child", std::iter::empty::<Promotion>(), OutputMode::PassThrough);

        builder.set_root(root);
        builder.graph.add_edge(root, child, ItemFlow::All);

        assert!(matches!(
            builder.build(),
            Err(StackError::SplitSuccessorMismatch)
        ));
    }
}
