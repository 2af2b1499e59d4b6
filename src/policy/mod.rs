/*!
 * Access Policy Lattice
 * Per-node confinement policies for wrapped tree structures
 *
 * Five policies ordered by the set of operations they permit. Each policy
 * also determines the policy its children inherit, and an explicitly
 * assigned child policy must be monotone: it may never grant an operation
 * the inherited policy denies.
 */

mod tree;

pub mod traits;

pub use tree::{GuardedTree, NodeTag};

use crate::core::errors::{GuestFault, InternalFault};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// The operations a node policy permits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PolicyFlags: u8 {
        const CHILDREN_VISIBLE = 1 << 0;
        const ATTRIBUTES_VISIBLE = 1 << 1;
        const EDITABLE = 1 << 2;
        const CHILDREN_EDITABLE = 1 << 3;
        const UPWARD_NAVIGATION = 1 << 4;
        const UNRESTRICTED = 1 << 5;
    }
}

/// Access policy assigned to one node of a guarded tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePolicy {
    /// Full access.
    Editable,
    /// Readable in full, no mutation anywhere below.
    ReadOnly,
    /// The node's own attributes are editable but its subtree is read-only.
    ReadOnlyChildren,
    /// The node itself reveals nothing beyond its children's existence.
    Opaque,
    /// Completely invisible; recursing into it is an integration defect.
    Foreign,
}

impl NodePolicy {
    pub const fn flags(self) -> PolicyFlags {
        match self {
            NodePolicy::Editable => PolicyFlags::all(),
            NodePolicy::ReadOnly => PolicyFlags::CHILDREN_VISIBLE
                .union(PolicyFlags::ATTRIBUTES_VISIBLE)
                .union(PolicyFlags::UPWARD_NAVIGATION)
                .union(PolicyFlags::UNRESTRICTED),
            NodePolicy::ReadOnlyChildren => PolicyFlags::CHILDREN_VISIBLE
                .union(PolicyFlags::ATTRIBUTES_VISIBLE)
                .union(PolicyFlags::EDITABLE)
                .union(PolicyFlags::UPWARD_NAVIGATION)
                .union(PolicyFlags::UNRESTRICTED),
            NodePolicy::Opaque => {
                PolicyFlags::CHILDREN_VISIBLE.union(PolicyFlags::UPWARD_NAVIGATION)
            }
            NodePolicy::Foreign => PolicyFlags::empty(),
        }
    }

    pub fn children_visible(self) -> bool {
        self.flags().contains(PolicyFlags::CHILDREN_VISIBLE)
    }

    pub fn attributes_visible(self) -> bool {
        self.flags().contains(PolicyFlags::ATTRIBUTES_VISIBLE)
    }

    pub fn editable(self) -> bool {
        self.flags().contains(PolicyFlags::EDITABLE)
    }

    pub fn children_editable(self) -> bool {
        self.flags().contains(PolicyFlags::CHILDREN_EDITABLE)
    }

    pub fn upward_navigation(self) -> bool {
        self.flags().contains(PolicyFlags::UPWARD_NAVIGATION)
    }

    pub fn unrestricted(self) -> bool {
        self.flags().contains(PolicyFlags::UNRESTRICTED)
    }

    /// The policy children inherit when none is assigned explicitly. An
    /// opaque node's children are readable; only the node itself hides its
    /// content. Foreign nodes must never be recursed into.
    pub fn child_policy(self) -> Result<NodePolicy, InternalFault> {
        match self {
            NodePolicy::Editable => Ok(NodePolicy::Editable),
            NodePolicy::ReadOnly | NodePolicy::ReadOnlyChildren | NodePolicy::Opaque => {
                Ok(NodePolicy::ReadOnly)
            }
            NodePolicy::Foreign => Err(InternalFault::ForeignChildPolicy),
        }
    }

    /// Monotonicity check: `assigned` may not grant any operation `self`
    /// (the inherited policy) denies.
    pub fn assert_restricted_by(self, assigned: NodePolicy) -> Result<(), InternalFault> {
        if assigned.flags().intersects(!self.flags()) {
            return Err(InternalFault::MonotonicityViolation {
                inherited: self,
                assigned,
            });
        }
        Ok(())
    }

    pub fn require_editable(self) -> Result<(), GuestFault> {
        if self.editable() {
            Ok(())
        } else {
            Err(GuestFault::NotEditable)
        }
    }

    pub fn require_children_editable(self) -> Result<(), GuestFault> {
        if self.children_editable() {
            Ok(())
        } else {
            Err(GuestFault::NotEditable)
        }
    }

    pub fn require_unrestricted(self) -> Result<(), GuestFault> {
        if self.unrestricted() {
            Ok(())
        } else {
            Err(GuestFault::Restricted)
        }
    }
}

impl fmt::Display for NodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodePolicy::Editable => "editable",
            NodePolicy::ReadOnly => "read-only",
            NodePolicy::ReadOnlyChildren => "read-only-children",
            NodePolicy::Opaque => "opaque",
            NodePolicy::Foreign => "foreign",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [NodePolicy; 5] = [
        NodePolicy::Editable,
        NodePolicy::ReadOnly,
        NodePolicy::ReadOnlyChildren,
        NodePolicy::Opaque,
        NodePolicy::Foreign,
    ];

    #[test]
    fn test_flag_tables() {
        assert!(NodePolicy::Editable.children_editable());
        assert!(NodePolicy::ReadOnly.children_visible());
        assert!(!NodePolicy::ReadOnly.editable());
        assert!(NodePolicy::ReadOnlyChildren.editable());
        assert!(!NodePolicy::ReadOnlyChildren.children_editable());
        assert!(NodePolicy::Opaque.children_visible());
        assert!(!NodePolicy::Opaque.attributes_visible());
        assert!(!NodePolicy::Opaque.unrestricted());
        assert_eq!(NodePolicy::Foreign.flags(), PolicyFlags::empty());
    }

    #[test]
    fn test_child_policies() {
        assert_eq!(
            NodePolicy::Editable.child_policy().unwrap(),
            NodePolicy::Editable
        );
        for policy in [
            NodePolicy::ReadOnly,
            NodePolicy::ReadOnlyChildren,
            NodePolicy::Opaque,
        ] {
            assert_eq!(policy.child_policy().unwrap(), NodePolicy::ReadOnly);
        }
        assert_eq!(
            NodePolicy::Foreign.child_policy().unwrap_err(),
            InternalFault::ForeignChildPolicy
        );
    }

    #[test]
    fn test_monotonicity_direction() {
        // Tightening is allowed.
        assert!(NodePolicy::Editable
            .assert_restricted_by(NodePolicy::ReadOnly)
            .is_ok());
        // Loosening faults.
        let err = NodePolicy::ReadOnly
            .assert_restricted_by(NodePolicy::Editable)
            .unwrap_err();
        assert_eq!(
            err,
            InternalFault::MonotonicityViolation {
                inherited: NodePolicy::ReadOnly,
                assigned: NodePolicy::Editable,
            }
        );
        // ReadOnlyChildren grants edit, which Opaque denies.
        assert!(NodePolicy::Opaque
            .assert_restricted_by(NodePolicy::ReadOnlyChildren)
            .is_err());
    }

    fn any_policy() -> impl Strategy<Value = NodePolicy> {
        proptest::sample::select(ALL.as_slice())
    }

    proptest! {
        #[test]
        fn prop_restriction_is_flag_subset(inherited in any_policy(), assigned in any_policy()) {
            let subset = inherited.flags().contains(assigned.flags());
            prop_assert_eq!(inherited.assert_restricted_by(assigned).is_ok(), subset);
        }

        #[test]
        fn prop_foreign_is_the_bottom(policy in any_policy()) {
            prop_assert!(policy.assert_restricted_by(NodePolicy::Foreign).is_ok());
            prop_assert!(NodePolicy::Editable.assert_restricted_by(policy).is_ok());
        }

        #[test]
        fn prop_restriction_is_reflexive(policy in any_policy()) {
            prop_assert!(policy.assert_restricted_by(policy).is_ok());
        }
    }
}
