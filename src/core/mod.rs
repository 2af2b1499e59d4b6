/*!
 * Core Module
 * Identifier types, the cross-membrane value model, and the fault taxonomy
 */

pub mod errors;
pub mod types;
pub mod values;

pub use errors::{Fault, GuestFault, InternalFault, TameFault};
pub use types::{FeralId, MembraneResult, NodeId, WrapperId};
pub use values::{FaultRecord, FeralValue, PatternSpec, TameValue};
