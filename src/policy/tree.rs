/*!
 * Guarded Tree
 * Policy enforcement layered over a raw tree model
 *
 * Every node must be adopted (assigned a policy) before any guarded
 * operation touches it. Reads degrade silently where the policy hides
 * structure; mutations fault. Structural mutations additionally check that
 * the moved node's policy is monotone under its destination.
 */

use crate::core::errors::{Fault, GuestFault, InternalFault};
use crate::core::types::{MembraneResult, NodeId};
use crate::policy::traits::TreeModel;
use crate::policy::NodePolicy;
use ahash::RandomState;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role a node plays when it is adopted into a guarded tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTag {
    /// Tree root; fully editable.
    Root,
    /// Inherits its parent's child policy.
    Ordinary,
    /// Opaque override, subject to the monotonicity check.
    Opaque,
    /// Foreign override, subject to the monotonicity check.
    Foreign,
}

pub struct GuardedTree<T: TreeModel> {
    model: T,
    policies: HashMap<NodeId, NodePolicy, RandomState>,
}

impl<T: TreeModel> GuardedTree<T> {
    pub fn new(model: T) -> Self {
        Self {
            model,
            policies: HashMap::default(),
        }
    }

    pub fn model(&self) -> &T {
        &self.model
    }

    /// Adopt a node with no assigned parent, typically the root. The policy
    /// is taken as given; there is nothing to be monotone under.
    pub fn adopt_root(&mut self, node: NodeId, policy: NodePolicy) {
        debug!("adopt root node {node} as {policy}");
        self.policies.insert(node, policy);
    }

    /// Adopt a node under its parent's inherited child policy.
    pub fn adopt(&mut self, node: NodeId) -> MembraneResult<NodePolicy> {
        let inherited = self.inherited_policy(node)?;
        self.policies.insert(node, inherited);
        Ok(inherited)
    }

    /// Adopt a node by role.
    pub fn adopt_tagged(&mut self, node: NodeId, tag: NodeTag) -> MembraneResult<()> {
        match tag {
            NodeTag::Root => {
                self.adopt_root(node, NodePolicy::Editable);
                Ok(())
            }
            NodeTag::Ordinary => self.adopt(node).map(|_| ()),
            NodeTag::Opaque => self.adopt_with_policy(node, NodePolicy::Opaque),
            NodeTag::Foreign => self.adopt_with_policy(node, NodePolicy::Foreign),
        }
    }

    /// Adopt a node with an explicit policy, which must be monotone under
    /// the policy it would otherwise inherit.
    pub fn adopt_with_policy(&mut self, node: NodeId, policy: NodePolicy) -> MembraneResult<()> {
        let inherited = self.inherited_policy(node)?;
        inherited.assert_restricted_by(policy)?;
        debug!("adopt node {node} as {policy} under inherited {inherited}");
        self.policies.insert(node, policy);
        Ok(())
    }

    fn inherited_policy(&self, node: NodeId) -> MembraneResult<NodePolicy> {
        let parent = match self.model.parent(node) {
            Some(parent) => parent,
            None => return Err(InternalFault::UnassignedNode { node }.into()),
        };
        Ok(self.policy_of(parent)?.child_policy()?)
    }

    pub fn policy_of(&self, node: NodeId) -> Result<NodePolicy, InternalFault> {
        self.policies
            .get(&node)
            .copied()
            .ok_or(InternalFault::UnassignedNode { node })
    }

    // Reads. Policies that hide structure degrade these silently rather
    // than faulting, so confined code cannot detect hidden content by
    // distinguishing "absent" from "denied".

    pub fn parent(&self, node: NodeId) -> MembraneResult<Option<NodeId>> {
        if !self.policy_of(node)?.upward_navigation() {
            return Ok(None);
        }
        Ok(self.model.parent(node))
    }

    pub fn children(&self, node: NodeId) -> MembraneResult<Vec<NodeId>> {
        if !self.policy_of(node)?.children_visible() {
            return Ok(Vec::new());
        }
        Ok(self.model.children(node))
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> MembraneResult<Option<String>> {
        if !self.policy_of(node)?.attributes_visible() {
            return Err(GuestFault::AccessDenied {
                property: name.to_string(),
            }
            .into());
        }
        Ok(self.model.attribute(node, name))
    }

    pub fn attribute_names(&self, node: NodeId) -> MembraneResult<Vec<String>> {
        if !self.policy_of(node)?.attributes_visible() {
            return Ok(Vec::new());
        }
        Ok(self.model.attribute_names(node))
    }

    pub fn text(&self, node: NodeId) -> MembraneResult<String> {
        if !self.policy_of(node)?.children_visible() {
            return Ok(String::new());
        }
        Ok(self.model.text(node))
    }

    /// Gate for host-specific operations outside the basic read and edit
    /// set. Opaque and foreign nodes are restricted.
    pub fn require_unrestricted(&self, node: NodeId) -> MembraneResult<()> {
        Ok(self.policy_of(node)?.require_unrestricted()?)
    }

    // Mutations. The policy check always precedes the model call.

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> MembraneResult<()> {
        self.policy_of(node)?.require_editable()?;
        self.model.set_attribute(node, name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> MembraneResult<()> {
        self.policy_of(node)?.require_editable()?;
        self.model.remove_attribute(node, name);
        Ok(())
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> MembraneResult<()> {
        self.policy_of(node)?.require_children_editable()?;
        self.model.set_text(node, text);
        Ok(())
    }

    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> MembraneResult<()> {
        self.check_adoption(parent, child)?;
        self.model.insert_child(parent, index, child);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> MembraneResult<()> {
        self.policy_of(parent)?.require_children_editable()?;
        self.policy_of(child)?.require_editable()?;
        self.model.remove_child(parent, child);
        Ok(())
    }

    pub fn replace_child(
        &mut self,
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> MembraneResult<()> {
        self.policy_of(old)?.require_editable()?;
        self.check_adoption(parent, new)?;
        self.model.replace_child(parent, old, new);
        Ok(())
    }

    /// A node may move under `parent` only when the parent's subtree is
    /// editable, the node itself is editable, and the node's policy is
    /// monotone under the parent's child policy.
    fn check_adoption(&self, parent: NodeId, child: NodeId) -> Result<(), Fault> {
        let parent_policy = self.policy_of(parent)?;
        parent_policy.require_children_editable()?;
        let child_policy = self.policy_of(child)?;
        child_policy.require_editable()?;
        parent_policy.child_policy()?.assert_restricted_by(child_policy)?;
        Ok(())
    }
}
