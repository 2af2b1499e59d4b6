/*!
 * Membrane Traits
 * Boundary contracts with the privileged-domain integration
 */

use crate::core::types::FeralId;
use crate::core::values::FeralValue;

/// A fault raised by privileged code while servicing a forwarded call.
///
/// The payload is a privileged-side value; it must pass through the
/// exception sanitizer before anything derived from it reaches confined
/// code.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivilegedFault(pub FeralValue);

impl PrivilegedFault {
    pub fn message(message: impl Into<String>) -> Self {
        PrivilegedFault(FeralValue::Fault(crate::core::values::FaultRecord::new(
            "Error",
            message,
        )))
    }
}

/// Direct constructor linkage of a privileged object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorLink {
    /// A plain record with no constructor beyond the base object shape.
    BaseRecord,
    /// Constructed by the named privileged constructor.
    Constructor(FeralId),
    /// The host cannot determine the constructor.
    Unknown,
}

/// Privileged accessor interface.
///
/// A trusted collaborator, assumed non-hostile; everything it returns is
/// still tamed before confined code can see it. The membrane holds no
/// internal borrow across these calls, so an implementation may re-enter
/// it, a constructor body taming values mid-construction for instance.
/// Re-entrant registration of an instance still under construction is
/// detected and surfaces as a guest-visible duplicate-association fault.
pub trait PrivilegedAccess {
    /// Read a property of a privileged object.
    fn get_property(&self, obj: FeralId, property: &str)
        -> Result<FeralValue, PrivilegedFault>;

    /// Write a property of a privileged object.
    fn set_property(
        &self,
        obj: FeralId,
        property: &str,
        value: FeralValue,
    ) -> Result<(), PrivilegedFault>;

    /// Invoke a privileged callable with an explicit receiver.
    fn invoke(
        &self,
        fun: FeralId,
        receiver: FeralValue,
        args: Vec<FeralValue>,
    ) -> Result<FeralValue, PrivilegedFault>;

    /// Own, enumerable property names of a privileged object.
    fn get_own_property_names(&self, obj: FeralId) -> Vec<String>;

    /// Direct constructor linkage used by the classifier.
    fn direct_constructor_of(&self, obj: FeralId) -> ConstructorLink;

    /// Create a fresh privileged instance carrying `ctor`'s declared
    /// superclass linkage, without running the constructor body.
    fn create_instance(&self, ctor: FeralId) -> Result<FeralId, PrivilegedFault>;

    /// The fixed neutral receiver substituted for plain function calls. The
    /// caller's own graph is never used as a receiver.
    fn neutral_receiver(&self) -> FeralValue {
        FeralValue::Null
    }

    /// Stringify a value for neutral faults. The default never exposes
    /// anything about a privileged object beyond the fact that one exists.
    fn describe(&self, value: &FeralValue) -> String {
        match value {
            FeralValue::Null => "null".to_string(),
            FeralValue::Bool(b) => b.to_string(),
            FeralValue::Int(i) => i.to_string(),
            FeralValue::Float(f) => f.to_string(),
            FeralValue::Text(s) => s.clone(),
            FeralValue::Timestamp(t) => format!("timestamp {t}"),
            FeralValue::Pattern(p) => format!("pattern /{}/", p.source),
            FeralValue::Fault(record) => format!("{}: {}", record.name, record.message),
            FeralValue::Sequence(_) | FeralValue::Object(_) => "Error".to_string(),
        }
    }
}

/// Fallback two-tier resolution for "named item" style lookups.
///
/// Consulted only after the fixed declared properties miss; supplied per
/// object-kind by the privileged integration.
pub trait NamedItemResolver {
    /// Resolve a name to a privileged value, or decline.
    fn lookup(&self, name: &str) -> Option<FeralValue>;

    /// Reverse mapping: the name under which a value is published, if any.
    fn name_of(&self, value: &FeralValue) -> Option<String>;
}
