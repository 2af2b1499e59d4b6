/*!
 * Schema Module
 * Capability declaration table, grants, and property-name guards
 *
 * The schema is populated once per exposed shape by the privileged
 * integration, before any instance of that shape is wrapped. The classifier
 * interprets it to pick a capability profile for every object crossing the
 * membrane; anything undeclared and not transparently copyable is a fatal
 * integration defect, never a silent pass-through.
 */

mod declare;
mod grants;
mod validate;

pub use declare::{CapabilityProfile, FunctionAdvice, Proceed, TamingSchema};
pub use grants::{Grant, GrantMap, GrantSet};
pub use validate::{is_exposable_name, is_numeric_name, is_reserved_name, validate_property_name};
