/*!
 * Confined Wrappers
 * The objects exposed to untrusted code
 *
 * A wrapper's property table is built once from the declared capability
 * profile and sealed before the wrapper is returned; there is no way to add
 * or remove properties afterward. A wrapper never embeds its privileged
 * twin: the correspondence is looked up in the table on every forwarded
 * operation.
 */

use crate::core::types::WrapperId;
use crate::schema::{Grant, GrantSet};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Shared handle to a confined wrapper. Confined identity is `Rc` identity:
/// wrapping the same privileged object twice yields the same `TameRef`.
pub type TameRef = Rc<Wrapper>;

/// Getter installed for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Getter {
    /// Forward to the privileged property and tame the result.
    Forward,
    /// Yield a callable bound to the receiving wrapper.
    BoundMethod,
    Deny,
}

/// Setter installed for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Setter {
    /// Untame the value and forward to the privileged property.
    Forward,
    /// Same forwarding path, installed without a paired getter.
    Override,
    Deny,
}

/// Accessor pair for one declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PropertySpec {
    pub getter: Getter,
    pub setter: Setter,
}

impl PropertySpec {
    /// Read-only forwarding, used for every snapshotted property of a
    /// read-only record.
    pub fn read_only() -> Self {
        Self {
            getter: Getter::Forward,
            setter: Setter::Deny,
        }
    }

    /// Accessors for a granted record property. `Method` wins the getter
    /// over `Read`; a setter coexists with `Method` only when `Write` is
    /// explicitly also granted; `Override` installs a setter on its own.
    pub fn from_grants(grants: GrantSet) -> Self {
        let getter = if grants.allows(Grant::Method) {
            Getter::BoundMethod
        } else if grants.allows(Grant::Read) {
            Getter::Forward
        } else {
            Getter::Deny
        };
        let setter = if grants.allows(Grant::Override)
            || (grants.allows(Grant::Method) && grants.allows(Grant::Write))
        {
            Setter::Override
        } else if grants.allows(Grant::Write) && !grants.allows(Grant::Method) {
            Setter::Forward
        } else {
            Setter::Deny
        };
        Self { getter, setter }
    }

    /// Accessors for a property granted on a callable: only plain reads and
    /// writes apply there.
    pub fn from_function_grants(grants: GrantSet) -> Self {
        Self {
            getter: if grants.allows(Grant::Read) {
                Getter::Forward
            } else {
                Getter::Deny
            },
            setter: if grants.allows(Grant::Write) {
                Setter::Forward
            } else {
                Setter::Deny
            },
        }
    }
}

/// What kind of callable a callable wrapper forwards to.
#[derive(Clone)]
pub(crate) enum CallableKind {
    /// Invocation substitutes the host's neutral receiver.
    Function,
    /// Invocation requires a wrapper receiver with a live privileged twin.
    Method,
    /// Callable with constructor semantics; plain calls forward like a
    /// function.
    Constructor,
    /// Synthesized by a `Method` grant getter; the receiver is captured
    /// weakly on the confined side and its privileged twin is looked up at
    /// call time.
    BoundMethod {
        receiver: Weak<Wrapper>,
        property: String,
    },
}

impl std::fmt::Debug for CallableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallableKind::Function => write!(f, "Function"),
            CallableKind::Method => write!(f, "Method"),
            CallableKind::Constructor => write!(f, "Constructor"),
            CallableKind::BoundMethod { property, .. } => {
                write!(f, "BoundMethod({property:?})")
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct RecordShape {
    pub properties: BTreeMap<String, PropertySpec>,
    pub has_resolver: bool,
}

#[derive(Debug)]
pub(crate) struct CallableShape {
    pub kind: CallableKind,
    pub name: String,
    pub properties: BTreeMap<String, PropertySpec>,
}

#[derive(Debug)]
pub(crate) enum Shape {
    Record(RecordShape),
    Callable(CallableShape),
}

/// The object exposed to untrusted code.
#[derive(Debug)]
pub struct Wrapper {
    id: WrapperId,
    shape: Shape,
}

impl Wrapper {
    pub(crate) fn new(id: WrapperId, shape: Shape) -> TameRef {
        Rc::new(Self { id, shape })
    }

    pub fn id(&self) -> WrapperId {
        self.id
    }

    pub(crate) fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.shape, Shape::Callable(_))
    }

    /// Declared name of a callable wrapper.
    pub fn callable_name(&self) -> Option<&str> {
        match &self.shape {
            Shape::Callable(c) => Some(&c.name),
            Shape::Record(_) => None,
        }
    }

    /// The fixed enumeration of declared property names, snapshotted at
    /// construction.
    pub fn property_names(&self) -> Vec<String> {
        let table = match &self.shape {
            Shape::Record(r) => &r.properties,
            Shape::Callable(c) => &c.properties,
        };
        table.keys().cloned().collect()
    }

    pub(crate) fn property(&self, name: &str) -> Option<&PropertySpec> {
        match &self.shape {
            Shape::Record(r) => r.properties.get(name),
            Shape::Callable(c) => c.properties.get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(kinds: &[Grant]) -> GrantSet {
        let mut set = GrantSet::default();
        for k in kinds {
            set.grant(*k);
        }
        set
    }

    #[test]
    fn test_read_grant_installs_forward_getter_only() {
        let spec = PropertySpec::from_grants(grants(&[Grant::Read]));
        assert_eq!(spec.getter, Getter::Forward);
        assert_eq!(spec.setter, Setter::Deny);
    }

    #[test]
    fn test_method_grant_wins_getter_and_blocks_setter() {
        let spec = PropertySpec::from_grants(grants(&[Grant::Method, Grant::Read]));
        assert_eq!(spec.getter, Getter::BoundMethod);
        assert_eq!(spec.setter, Setter::Deny);
    }

    #[test]
    fn test_method_plus_write_installs_override_setter() {
        let spec = PropertySpec::from_grants(grants(&[Grant::Method, Grant::Write]));
        assert_eq!(spec.getter, Getter::BoundMethod);
        assert_eq!(spec.setter, Setter::Override);
    }

    #[test]
    fn test_override_needs_no_paired_read() {
        let spec = PropertySpec::from_grants(grants(&[Grant::Override]));
        assert_eq!(spec.getter, Getter::Deny);
        assert_eq!(spec.setter, Setter::Override);
    }

    #[test]
    fn test_function_properties_ignore_method_grants() {
        let spec = PropertySpec::from_function_grants(grants(&[Grant::Method, Grant::Write]));
        assert_eq!(spec.getter, Getter::Deny);
        assert_eq!(spec.setter, Setter::Forward);
    }

    #[test]
    fn test_property_enumeration_is_sorted_and_fixed() {
        let mut properties = BTreeMap::new();
        properties.insert("b".to_string(), PropertySpec::read_only());
        properties.insert("a".to_string(), PropertySpec::read_only());
        let wrapper = Wrapper::new(
            1,
            Shape::Record(RecordShape {
                properties,
                has_resolver: false,
            }),
        );
        assert_eq!(wrapper.property_names(), vec!["a", "b"]);
        assert!(!wrapper.is_callable());
    }
}
