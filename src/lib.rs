/*!
 * Capability Confinement Membrane Library
 * Taming membrane, capability schema, and access-policy lattice
 */

pub mod core;
pub mod membrane;
pub mod policy;
pub mod schema;
pub mod table;

// Re-exports
pub use crate::core::{
    FaultRecord, FeralId, FeralValue, Fault, GuestFault, InternalFault, MembraneResult, NodeId,
    PatternSpec, TameFault, TameValue, WrapperId,
};
pub use membrane::{
    ConstructorLink, Membrane, MembraneStats, NamedItemResolver, PrivilegedAccess,
    PrivilegedFault, TameRef, Wrapper,
};
pub use policy::traits::TreeModel;
pub use policy::{GuardedTree, NodePolicy, NodeTag, PolicyFlags};
pub use schema::{CapabilityProfile, FunctionAdvice, Grant, GrantMap, GrantSet, Proceed};
pub use table::{CorrespondenceTable, TableStats};
