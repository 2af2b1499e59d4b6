/*!
 * Fault Types
 * The membrane's fault taxonomy with thiserror, miette, and serde support
 *
 * Two disjoint families. Guest-visible faults are ordinary conditions the
 * confined code can catch and recover from. Internal consistency faults
 * indicate a defect in the privileged-domain integration; they are never
 * constructed from guest input and should propagate to the embedding
 * application's top-level error boundary.
 */

use crate::core::types::{FeralId, NodeId};
use crate::core::values::TameValue;
use crate::policy::NodePolicy;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A sanitized fault payload delivered to confined code.
///
/// Produced by the exception sanitizer: either the tamed twin of the
/// privileged payload, or a neutral fault carrying only a stringified
/// description when taming failed. A neutral fault holds no reference of any
/// kind.
#[derive(Debug, Clone, PartialEq)]
pub struct TameFault {
    name: String,
    message: String,
    payload: Option<TameValue>,
}

impl TameFault {
    pub fn new(name: impl Into<String>, message: impl Into<String>, payload: TameValue) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            payload: Some(payload),
        }
    }

    /// A fault carrying only its description.
    pub fn neutral(message: impl Into<String>) -> Self {
        Self {
            name: "Error".into(),
            message: message.into(),
            payload: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&TameValue> {
        self.payload.as_ref()
    }

    pub fn is_neutral(&self) -> bool {
        self.payload.is_none()
    }
}

impl fmt::Display for TameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Faults reported to confined code; catchable and recoverable by the guest.
#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
pub enum GuestFault {
    #[error("Access denied: no grant for property {property:?}")]
    #[diagnostic(
        code(membrane::access_denied),
        help("Properties without a declared grant are inaccessible on a wrapper.")
    )]
    AccessDenied { property: String },

    #[error("Node not editable")]
    #[diagnostic(
        code(membrane::not_editable),
        help("The node's access policy denies this mutation.")
    )]
    NotEditable,

    #[error("Node is restricted")]
    #[diagnostic(
        code(membrane::restricted),
        help("The node's access policy marks it restricted; unrestricted operations are denied.")
    )]
    Restricted,

    #[error("Receiver is not a wrapper with a live privileged twin")]
    #[diagnostic(
        code(membrane::receiver_mismatch),
        help("Method-bearing callables require a confined wrapper as their receiver.")
    )]
    ReceiverMismatch,

    #[error("Duplicate association: {detail}")]
    #[diagnostic(
        code(membrane::guest_duplicate_association),
        help("A constructor re-entered the membrane and double-registered its instance.")
    )]
    DuplicateAssociation { detail: String },

    #[error("Value cannot cross the membrane: {detail}")]
    #[diagnostic(
        code(membrane::untamed_value),
        help("Only scalars, copyable built-ins, and wrappers with a privileged twin cross back.")
    )]
    UntamedValue { detail: String },

    #[error("Privileged fault: {0}")]
    #[diagnostic(code(membrane::raised))]
    Raised(TameFault),
}

/// Integration defects in the privileged domain; fail fast, never recovered.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "fault", content = "details", rename_all = "snake_case")]
pub enum InternalFault {
    #[error("Unclassifiable object {object}: no declared profile and not a copyable built-in")]
    #[diagnostic(
        code(membrane::unclassifiable),
        help("Declare a capability profile for every shape exposed through the membrane.")
    )]
    Unclassifiable { object: FeralId },

    #[error("Non-monotonic node policy: {assigned} under inherited {inherited}")]
    #[diagnostic(
        code(membrane::policy_monotonicity),
        help("An explicit child policy must deny everything the inherited policy denies.")
    )]
    MonotonicityViolation {
        inherited: NodePolicy,
        assigned: NodePolicy,
    },

    #[error("Duplicate association for privileged object {object}: {detail}")]
    #[diagnostic(
        code(membrane::duplicate_association),
        help("Identity confusion between domains; the membrane may be compromised.")
    )]
    DuplicateAssociation { object: FeralId, detail: String },

    #[error("Declaration on fixed object {object}")]
    #[diagnostic(
        code(membrane::already_fixed),
        help("All declarations for a shape must happen before its first wrap.")
    )]
    AlreadyFixed { object: FeralId },

    #[error("Invalid property name: {name:?}")]
    #[diagnostic(
        code(membrane::invalid_property_name),
        help("Numeric names and names ending in `__` cannot carry grants.")
    )]
    InvalidPropertyName { name: String },

    #[error("Foreign node policy has no child policy")]
    #[diagnostic(
        code(membrane::foreign_child_policy),
        help("Foreign nodes must never be recursed into.")
    )]
    ForeignChildPolicy,

    #[error("Superclass {superclass} of constructor {name:?} is not a declared constructor")]
    #[diagnostic(code(membrane::superclass_not_constructor))]
    SuperclassNotConstructor { superclass: FeralId, name: String },

    #[error("Advice target {object} is not a declared callable")]
    #[diagnostic(code(membrane::not_advisable))]
    NotAdvisable { object: FeralId },

    #[error("Method grant resolved to a non-callable value on object {object}")]
    #[diagnostic(code(membrane::method_not_callable))]
    MethodNotCallable { object: FeralId },

    #[error("No access policy assigned to node {node}")]
    #[diagnostic(
        code(membrane::unassigned_node),
        help("Every node must be adopted before guarded operations touch it.")
    )]
    UnassignedNode { node: NodeId },
}

/// Unified fault type for membrane operations.
#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
pub enum Fault {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Guest(#[from] GuestFault),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Internal(#[from] InternalFault),
}

impl Fault {
    /// Guest faults are catchable by confined code; internal faults are not.
    pub fn is_guest_visible(&self) -> bool {
        matches!(self, Fault::Guest(_))
    }

    pub fn guest(&self) -> Option<&GuestFault> {
        match self {
            Fault::Guest(g) => Some(g),
            Fault::Internal(_) => None,
        }
    }

    pub fn internal(&self) -> Option<&InternalFault> {
        match self {
            Fault::Guest(_) => None,
            Fault::Internal(i) => Some(i),
        }
    }
}
