/*!
 * Value Crossings
 * Copy-vs-wrap decisions for values crossing the membrane
 */

use crate::core::errors::GuestFault;
use crate::core::types::MembraneResult;
use crate::core::values::{FeralValue, TameValue};
use crate::membrane::{Membrane, PrivilegedAccess};
use std::rc::Rc;

impl<A: PrivilegedAccess> Membrane<A> {
    /// Cross a privileged value inward. Scalars and copyable built-ins are
    /// deep-copied; sequences arrive frozen; object references are wrapped
    /// through the correspondence table.
    pub fn tame(&self, value: &FeralValue) -> MembraneResult<TameValue> {
        let tamed = match value {
            FeralValue::Null => TameValue::Null,
            FeralValue::Bool(b) => TameValue::Bool(*b),
            FeralValue::Int(i) => TameValue::Int(*i),
            FeralValue::Float(f) => TameValue::Float(*f),
            FeralValue::Text(s) => TameValue::Text(s.clone()),
            FeralValue::Timestamp(t) => TameValue::Timestamp(*t),
            FeralValue::Pattern(p) => TameValue::Pattern(p.clone()),
            FeralValue::Fault(record) => TameValue::Fault(record.clone()),
            FeralValue::Sequence(items) => {
                let crossed: Vec<TameValue> = items
                    .iter()
                    .map(|item| self.tame(item))
                    .collect::<MembraneResult<_>>()?;
                TameValue::Sequence(Rc::from(crossed))
            }
            FeralValue::Object(id) => return Ok(TameValue::Object(self.wrap(*id)?)),
        };
        self.note_copy();
        Ok(tamed)
    }

    /// Cross a confined value outward. The mirror of `tame`: copyables are
    /// copied back, wrappers are replaced by their privileged twin. A
    /// wrapper without a live twin cannot cross.
    pub fn untame(&self, value: &TameValue) -> MembraneResult<FeralValue> {
        let crossed = match value {
            TameValue::Null => FeralValue::Null,
            TameValue::Bool(b) => FeralValue::Bool(*b),
            TameValue::Int(i) => FeralValue::Int(*i),
            TameValue::Float(f) => FeralValue::Float(*f),
            TameValue::Text(s) => FeralValue::Text(s.clone()),
            TameValue::Timestamp(t) => FeralValue::Timestamp(*t),
            TameValue::Pattern(p) => FeralValue::Pattern(p.clone()),
            TameValue::Fault(record) => FeralValue::Fault(record.clone()),
            TameValue::Sequence(items) => FeralValue::Sequence(
                items
                    .iter()
                    .map(|item| self.untame(item))
                    .collect::<MembraneResult<_>>()?,
            ),
            TameValue::Object(wrapper) => {
                return match self.table_twin(wrapper) {
                    Some(id) => Ok(FeralValue::Object(id)),
                    None => Err(GuestFault::UntamedValue {
                        detail: "wrapper has no privileged twin".to_string(),
                    }
                    .into()),
                };
            }
        };
        self.note_copy();
        Ok(crossed)
    }

    fn table_twin(&self, wrapper: &super::Wrapper) -> Option<crate::core::types::FeralId> {
        self.table.borrow().lookup_privileged(wrapper)
    }

    fn note_copy(&self) {
        self.copies.set(self.copies.get() + 1);
    }
}
