/*!
 * Grants
 * Per-property capability grants interpreted by the wrapper factory
 */

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One permitted operation on one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    /// Reads forward to the privileged property and tame the result.
    Read,
    /// Writes untame the value and forward to the privileged property.
    Write,
    /// Reads yield a bound callable instead of a raw value.
    Method,
    /// A setter is installed without requiring a paired `Read`; bypasses the
    /// normal getter round-trip.
    Override,
}

bitflags! {
    /// The set of grants declared for one property.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GrantSet: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const METHOD = 1 << 2;
        const OVERRIDE = 1 << 3;
    }
}

impl GrantSet {
    pub fn grant(&mut self, kind: Grant) {
        self.insert(kind.into());
    }

    pub fn allows(&self, kind: Grant) -> bool {
        self.contains(kind.into())
    }
}

impl From<Grant> for GrantSet {
    fn from(kind: Grant) -> Self {
        match kind {
            Grant::Read => GrantSet::READ,
            Grant::Write => GrantSet::WRITE,
            Grant::Method => GrantSet::METHOD,
            Grant::Override => GrantSet::OVERRIDE,
        }
    }
}

/// Property name to declared grants; ordered so wrapper property tables are
/// deterministic.
pub type GrantMap = BTreeMap<String, GrantSet>;
