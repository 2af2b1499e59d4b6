/*!
 * Value Model
 * The two mirrored value types that cross the membrane
 *
 * A privileged reference is unrepresentable on the confined side by
 * construction: `FeralValue` can only name privileged objects, `TameValue`
 * can only name confined wrappers. Scalars and the transparently-copyable
 * built-ins (sequences, timestamps, patterns, typed fault records) exist in
 * both and are deep-copied when they cross.
 */

use crate::core::types::FeralId;
use crate::membrane::wrapper::TameRef;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Pattern object exchanged by value (source text plus flags, never a
/// compiled host matcher).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PatternSpec {
    pub source: String,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub multi_line: bool,
    #[serde(default)]
    pub global: bool,
}

impl PatternSpec {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Typed error record exchanged by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FaultRecord {
    pub name: String,
    pub message: String,
}

impl FaultRecord {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A value on the privileged side of the membrane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FeralValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Pattern(PatternSpec),
    Fault(FaultRecord),
    Sequence(Vec<FeralValue>),
    /// Reference into the privileged object graph.
    Object(FeralId),
}

impl FeralValue {
    /// True when the value copies across the membrane rather than being
    /// wrapped. Sequences are copyable even when their elements are not;
    /// elements are crossed recursively.
    pub fn is_copyable(&self) -> bool {
        !matches!(self, FeralValue::Object(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FeralValue::Null => "null",
            FeralValue::Bool(_) => "bool",
            FeralValue::Int(_) => "int",
            FeralValue::Float(_) => "float",
            FeralValue::Text(_) => "text",
            FeralValue::Timestamp(_) => "timestamp",
            FeralValue::Pattern(_) => "pattern",
            FeralValue::Fault(_) => "fault",
            FeralValue::Sequence(_) => "sequence",
            FeralValue::Object(_) => "object",
        }
    }
}

/// A value on the confined side of the membrane.
///
/// Sequences are frozen on arrival (`Rc<[TameValue]>` has no mutation entry
/// point), so a copied sequence can be shared with guest code without a
/// write path back into it.
#[derive(Debug, Clone)]
pub enum TameValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(i64),
    Pattern(PatternSpec),
    Fault(FaultRecord),
    Sequence(Rc<[TameValue]>),
    /// Reference to a confined wrapper.
    Object(TameRef),
}

impl TameValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TameValue::Null => "null",
            TameValue::Bool(_) => "bool",
            TameValue::Int(_) => "int",
            TameValue::Float(_) => "float",
            TameValue::Text(_) => "text",
            TameValue::Timestamp(_) => "timestamp",
            TameValue::Pattern(_) => "pattern",
            TameValue::Fault(_) => "fault",
            TameValue::Sequence(_) => "sequence",
            TameValue::Object(_) => "object",
        }
    }

    /// Identity comparison: wrappers compare by reference, sequences by
    /// element-wise identity, scalars by value.
    pub fn same_identity(&self, other: &TameValue) -> bool {
        match (self, other) {
            (TameValue::Object(a), TameValue::Object(b)) => Rc::ptr_eq(a, b),
            (TameValue::Sequence(a), TameValue::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_identity(y))
            }
            _ => self == other,
        }
    }

    pub fn as_wrapper(&self) -> Option<&TameRef> {
        match self {
            TameValue::Object(w) => Some(w),
            _ => None,
        }
    }
}

// Scalars compare by value, objects by wrapper identity.
impl PartialEq for TameValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TameValue::Null, TameValue::Null) => true,
            (TameValue::Bool(a), TameValue::Bool(b)) => a == b,
            (TameValue::Int(a), TameValue::Int(b)) => a == b,
            (TameValue::Float(a), TameValue::Float(b)) => a == b,
            (TameValue::Text(a), TameValue::Text(b)) => a == b,
            (TameValue::Timestamp(a), TameValue::Timestamp(b)) => a == b,
            (TameValue::Pattern(a), TameValue::Pattern(b)) => a == b,
            (TameValue::Fault(a), TameValue::Fault(b)) => a == b,
            (TameValue::Sequence(a), TameValue::Sequence(b)) => a == b,
            (TameValue::Object(a), TameValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copyable_classification() {
        assert!(FeralValue::Int(1).is_copyable());
        assert!(FeralValue::Sequence(vec![FeralValue::Object(7)]).is_copyable());
        assert!(!FeralValue::Object(7).is_copyable());
    }

    #[test]
    fn test_feral_value_serde_shape() {
        let v = FeralValue::Fault(FaultRecord::new("TypeError", "nope"));
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"type\":\"fault\""), "{json}");
        let back: FeralValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_tame_scalar_equality() {
        assert_eq!(TameValue::Int(3), TameValue::Int(3));
        assert_ne!(TameValue::Int(3), TameValue::Text("3".into()));
        assert!(TameValue::Null.same_identity(&TameValue::Null));
    }
}
