/*!
 * Tree Model Trait
 * The unguarded tree structure a policy lattice is laid over
 */

use crate::core::types::NodeId;

/// A hierarchical structure in the privileged domain.
///
/// The model is the raw tree; all policy enforcement happens in
/// `GuardedTree`, which consults the per-node policy before delegating
/// here. Implementations perform no access control of their own.
pub trait TreeModel {
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeId, name: &str);

    /// Insert `child` under `parent` at `index`, detaching it from any
    /// previous parent.
    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId);

    fn remove_child(&mut self, parent: NodeId, child: NodeId);

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId);

    /// Concatenated text content of the node's subtree.
    fn text(&self, node: NodeId) -> String;

    fn set_text(&mut self, node: NodeId, text: &str);
}
