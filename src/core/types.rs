/*!
 * Core Types
 * Common identifier types used across the membrane
 */

/// Handle naming an object in the privileged domain.
///
/// Issued by the embedding host; the membrane never owns the object behind it
/// and only keeps non-owning associations keyed by this id.
pub type FeralId = u64;

/// Session-unique identity of a confined wrapper.
///
/// Wrapper ids are never reused within a confinement session, so a stale
/// correspondence entry can never alias a newer wrapper.
pub type WrapperId = u64;

/// Handle naming a node of a wrapped tree structure.
pub type NodeId = u64;

/// Common result type for membrane operations
pub type MembraneResult<T> = Result<T, super::errors::Fault>;
