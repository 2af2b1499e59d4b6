/*!
 * Taming Schema
 * The declaration table consulted by the capability classifier
 *
 * All declarations for a shape must happen before the first instance of that
 * shape is wrapped. Wrapping fixes the object: its classification can never
 * change afterward, and further declarations on it are a fatal precondition
 * violation.
 */

use crate::core::errors::InternalFault;
use crate::core::types::FeralId;
use crate::core::values::FeralValue;
use crate::membrane::traits::{NamedItemResolver, PrivilegedFault};
use crate::schema::grants::{Grant, GrantMap, GrantSet};
use crate::schema::validate::validate_property_name;
use ahash::RandomState;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Declared shape describing how a privileged object may be exposed.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityProfile {
    /// Fixed enumeration of forward-and-tame getters; no mutation entry
    /// point exists.
    ReadOnlyRecord,
    /// Accessors synthesized per declared grant; everything else is denied.
    MutableRecordWithGrants(GrantMap),
    /// Plain callable; invocation substitutes the host's neutral receiver.
    Function(String),
    /// Callable as a constructor and as a plain forwarding call.
    Constructor {
        name: String,
        superclass: Option<FeralId>,
    },
    /// Callable requiring a confined wrapper with a live privileged twin as
    /// its receiver.
    MethodBearing(String),
}

#[derive(Debug, Clone, PartialEq)]
enum DeclaredProfile {
    ReadOnlyRecord,
    Function(String),
    Constructor {
        name: String,
        superclass: Option<FeralId>,
    },
    MethodBearing(String),
}

/// Continuation handed to around-advice: runs the rest of the advice chain
/// and the underlying privileged call.
pub type Proceed<'a> = &'a dyn Fn(Vec<FeralValue>) -> Result<FeralValue, PrivilegedFault>;

/// Advice installed around a declared callable; runs on the privileged side
/// of the membrane.
#[derive(Clone)]
pub enum FunctionAdvice {
    /// Rewrites the argument vector before the call proceeds.
    Before(Rc<dyn Fn(Vec<FeralValue>) -> Vec<FeralValue>>),
    /// Rewrites the successful result after the call returns.
    After(Rc<dyn Fn(FeralValue) -> FeralValue>),
    /// Full interception; receives a `proceed` continuation.
    Around(Rc<dyn Fn(Proceed<'_>, Vec<FeralValue>) -> Result<FeralValue, PrivilegedFault>>),
}

impl std::fmt::Debug for FunctionAdvice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            FunctionAdvice::Before(_) => "Before",
            FunctionAdvice::After(_) => "After",
            FunctionAdvice::Around(_) => "Around",
        };
        f.debug_tuple(kind).finish()
    }
}

/// The session-scoped declaration table.
///
/// Each confinement session owns its own schema; no state is shared between
/// sessions.
#[derive(Default)]
pub struct TamingSchema {
    profiles: HashMap<FeralId, DeclaredProfile, RandomState>,
    grants: HashMap<FeralId, GrantMap, RandomState>,
    resolvers: HashMap<FeralId, Rc<dyn NamedItemResolver>, RandomState>,
    advice: HashMap<FeralId, Vec<FunctionAdvice>, RandomState>,
    fixed: HashSet<FeralId, RandomState>,
}

impl TamingSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_can_declare(&self, obj: FeralId) -> Result<(), InternalFault> {
        if self.fixed.contains(&obj) {
            return Err(InternalFault::AlreadyFixed { object: obj });
        }
        Ok(())
    }

    fn set_profile(&mut self, obj: FeralId, profile: DeclaredProfile) {
        if let Some(old) = self.profiles.insert(obj, profile) {
            warn!("redeclared profile for object {obj} (was {old:?})");
        }
    }

    pub fn declare_read_only_record(&mut self, obj: FeralId) -> Result<(), InternalFault> {
        self.check_can_declare(obj)?;
        debug!("declare object {obj} as read-only record");
        self.set_profile(obj, DeclaredProfile::ReadOnlyRecord);
        Ok(())
    }

    pub fn declare_function(&mut self, obj: FeralId, name: &str) -> Result<(), InternalFault> {
        self.check_can_declare(obj)?;
        debug!("declare object {obj} as function {name:?}");
        self.set_profile(obj, DeclaredProfile::Function(name.to_string()));
        Ok(())
    }

    /// The superclass, when given, must itself already be declared as a
    /// constructor; the linkage is cloned on the privileged side whenever an
    /// instance is constructed.
    pub fn declare_constructor(
        &mut self,
        obj: FeralId,
        superclass: Option<FeralId>,
        name: &str,
    ) -> Result<(), InternalFault> {
        self.check_can_declare(obj)?;
        if let Some(sup) = superclass {
            if !matches!(
                self.profiles.get(&sup),
                Some(DeclaredProfile::Constructor { .. })
            ) {
                return Err(InternalFault::SuperclassNotConstructor {
                    superclass: sup,
                    name: name.to_string(),
                });
            }
        }
        debug!("declare object {obj} as constructor {name:?} (super {superclass:?})");
        self.set_profile(
            obj,
            DeclaredProfile::Constructor {
                name: name.to_string(),
                superclass,
            },
        );
        Ok(())
    }

    pub fn declare_method(&mut self, obj: FeralId, name: &str) -> Result<(), InternalFault> {
        self.check_can_declare(obj)?;
        debug!("declare object {obj} as method-bearing callable {name:?}");
        self.set_profile(obj, DeclaredProfile::MethodBearing(name.to_string()));
        Ok(())
    }

    pub fn declare_grant(
        &mut self,
        obj: FeralId,
        property: &str,
        kind: Grant,
    ) -> Result<(), InternalFault> {
        self.check_can_declare(obj)?;
        validate_property_name(property)?;
        debug!("grant {kind:?} on {obj}.{property}");
        self.grants
            .entry(obj)
            .or_default()
            .entry(property.to_string())
            .or_insert_with(GrantSet::default)
            .grant(kind);
        Ok(())
    }

    pub fn declare_named_resolver(
        &mut self,
        obj: FeralId,
        resolver: Rc<dyn NamedItemResolver>,
    ) -> Result<(), InternalFault> {
        self.check_can_declare(obj)?;
        self.resolvers.insert(obj, resolver);
        Ok(())
    }

    /// Advice may be installed at any time, but only on declared callables.
    pub fn advise(&mut self, obj: FeralId, advice: FunctionAdvice) -> Result<(), InternalFault> {
        match self.profiles.get(&obj) {
            Some(
                DeclaredProfile::Function(_)
                | DeclaredProfile::Constructor { .. }
                | DeclaredProfile::MethodBearing(_),
            ) => {
                self.advice.entry(obj).or_default().push(advice);
                Ok(())
            }
            _ => Err(InternalFault::NotAdvisable { object: obj }),
        }
    }

    /// Locks the object's classification; called when the object is wrapped.
    pub fn fix(&mut self, obj: FeralId) {
        self.fixed.insert(obj);
    }

    pub fn is_fixed(&self, obj: FeralId) -> bool {
        self.fixed.contains(&obj)
    }

    /// Profile declared directly on the object, falling back to a grant-map
    /// record when grants were declared without a shape profile.
    pub fn profile_of(&self, obj: FeralId) -> Option<CapabilityProfile> {
        match self.profiles.get(&obj) {
            Some(DeclaredProfile::ReadOnlyRecord) => Some(CapabilityProfile::ReadOnlyRecord),
            Some(DeclaredProfile::Function(name)) => {
                Some(CapabilityProfile::Function(name.clone()))
            }
            Some(DeclaredProfile::Constructor { name, superclass }) => {
                Some(CapabilityProfile::Constructor {
                    name: name.clone(),
                    superclass: *superclass,
                })
            }
            Some(DeclaredProfile::MethodBearing(name)) => {
                Some(CapabilityProfile::MethodBearing(name.clone()))
            }
            None => self
                .grants
                .get(&obj)
                .map(|g| CapabilityProfile::MutableRecordWithGrants(g.clone())),
        }
    }

    /// Profile of an instance whose direct constructor is `ctor`: the
    /// constructor's grant map applies to every instance.
    pub fn instance_profile(&self, ctor: FeralId) -> Option<CapabilityProfile> {
        match self.profiles.get(&ctor) {
            Some(DeclaredProfile::Constructor { .. }) => Some(
                CapabilityProfile::MutableRecordWithGrants(
                    self.grants.get(&ctor).cloned().unwrap_or_default(),
                ),
            ),
            _ => None,
        }
    }

    pub fn is_declared_constructor(&self, obj: FeralId) -> bool {
        matches!(
            self.profiles.get(&obj),
            Some(DeclaredProfile::Constructor { .. })
        )
    }

    pub fn grants_of(&self, obj: FeralId) -> GrantMap {
        self.grants.get(&obj).cloned().unwrap_or_default()
    }

    pub fn resolver_of(&self, obj: FeralId) -> Option<Rc<dyn NamedItemResolver>> {
        self.resolvers.get(&obj).cloned()
    }

    pub fn advice_chain(&self, obj: FeralId) -> Vec<FunctionAdvice> {
        self.advice.get(&obj).cloned().unwrap_or_default()
    }
}
