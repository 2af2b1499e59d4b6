/*!
 * Property Name Guards
 * Validation applied to every declared property name
 */

use crate::core::errors::InternalFault;

/// Names that parse as non-negative integers address sequence slots, not
/// properties, and cannot carry grants.
pub fn is_numeric_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

/// Names ending in a double underscore are reserved for the privileged
/// domain's own bookkeeping and never cross the membrane.
pub fn is_reserved_name(name: &str) -> bool {
    name.ends_with("__")
}

pub fn validate_property_name(name: &str) -> Result<(), InternalFault> {
    if name.is_empty() || is_numeric_name(name) || is_reserved_name(name) {
        return Err(InternalFault::InvalidPropertyName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Filter applied when snapshotting property names from the privileged side.
pub fn is_exposable_name(name: &str) -> bool {
    !name.is_empty() && !is_numeric_name(name) && !is_reserved_name(name)
}
