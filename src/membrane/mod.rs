/*!
 * Confinement Membrane
 * Wrapping, forwarding, and invocation across the trust boundary
 *
 * One `Membrane` per confinement session. Every privileged object reaching
 * confined code goes through `wrap`, which classifies it against the taming
 * schema, builds a sealed wrapper, and registers the pair in the identity
 * correspondence table. All forwarded operations re-resolve the privileged
 * twin through the table; wrappers never hold their twin directly.
 *
 * Single-session, single-threaded by design. Interior mutability is plain
 * `RefCell`/`Cell`; no borrow is held across a call into the privileged
 * accessor, so a well-behaved host cannot deadlock or poison the membrane.
 */

pub mod traits;
pub(crate) mod wrapper;

mod copy;
mod faults;

use crate::core::errors::{Fault, GuestFault, InternalFault};
use crate::core::types::{FeralId, MembraneResult, WrapperId};
use crate::core::values::{FeralValue, TameValue};
use crate::schema::{
    is_exposable_name, CapabilityProfile, FunctionAdvice, Grant, TamingSchema,
};
use crate::table::CorrespondenceTable;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub use traits::{ConstructorLink, NamedItemResolver, PrivilegedAccess, PrivilegedFault};
pub use wrapper::{TameRef, Wrapper};

use wrapper::{CallableKind, CallableShape, PropertySpec, RecordShape, Shape};

/// Counter snapshot for one confinement session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembraneStats {
    /// Wrappers created, including synthesized bound methods.
    pub wraps: u64,
    /// `wrap` calls satisfied from the correspondence table.
    pub memo_hits: u64,
    /// Copyable values crossed in either direction.
    pub copies: u64,
    /// Property accesses denied for lack of a grant.
    pub denials: u64,
    /// Privileged faults downgraded to a neutral description.
    pub neutral_faults: u64,
    /// Live correspondence entries.
    pub live_entries: usize,
    /// Dead correspondence entries evicted so far.
    pub swept_entries: u64,
}

/// A capability confinement membrane over one privileged accessor.
pub struct Membrane<A: PrivilegedAccess> {
    access: A,
    schema: RefCell<TamingSchema>,
    table: RefCell<CorrespondenceTable>,
    next_wrapper: Cell<WrapperId>,
    wraps: Cell<u64>,
    memo_hits: Cell<u64>,
    copies: Cell<u64>,
    denials: Cell<u64>,
    neutral_faults: Cell<u64>,
}

impl<A: PrivilegedAccess> Membrane<A> {
    pub fn new(access: A) -> Self {
        Self {
            access,
            schema: RefCell::new(TamingSchema::new()),
            table: RefCell::new(CorrespondenceTable::new()),
            next_wrapper: Cell::new(1),
            wraps: Cell::new(0),
            memo_hits: Cell::new(0),
            copies: Cell::new(0),
            denials: Cell::new(0),
            neutral_faults: Cell::new(0),
        }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    // Declarations. All must precede the first wrap of the object they
    // describe; the schema enforces this through the fixed set.

    pub fn declare_read_only_record(&self, obj: FeralId) -> MembraneResult<()> {
        Ok(self.schema.borrow_mut().declare_read_only_record(obj)?)
    }

    pub fn declare_function(&self, obj: FeralId, name: &str) -> MembraneResult<()> {
        Ok(self.schema.borrow_mut().declare_function(obj, name)?)
    }

    pub fn declare_constructor(
        &self,
        obj: FeralId,
        superclass: Option<FeralId>,
        name: &str,
    ) -> MembraneResult<()> {
        Ok(self
            .schema
            .borrow_mut()
            .declare_constructor(obj, superclass, name)?)
    }

    pub fn declare_method(&self, obj: FeralId, name: &str) -> MembraneResult<()> {
        Ok(self.schema.borrow_mut().declare_method(obj, name)?)
    }

    pub fn declare_grant(&self, obj: FeralId, property: &str, kind: Grant) -> MembraneResult<()> {
        Ok(self.schema.borrow_mut().declare_grant(obj, property, kind)?)
    }

    pub fn declare_named_resolver(
        &self,
        obj: FeralId,
        resolver: Rc<dyn NamedItemResolver>,
    ) -> MembraneResult<()> {
        Ok(self
            .schema
            .borrow_mut()
            .declare_named_resolver(obj, resolver)?)
    }

    pub fn advise(&self, obj: FeralId, advice: FunctionAdvice) -> MembraneResult<()> {
        Ok(self.schema.borrow_mut().advise(obj, advice)?)
    }

    /// Produce the confined twin of a privileged object, creating and
    /// registering a wrapper on first crossing. Wrapping fixes the object:
    /// its classification can never change afterward.
    pub fn wrap(&self, obj: FeralId) -> MembraneResult<TameRef> {
        if let Some(existing) = self.table.borrow().lookup_confined(obj) {
            self.memo_hits.set(self.memo_hits.get() + 1);
            return Ok(existing);
        }
        let profile = self.classify(obj)?;
        let shape = self.build_shape(obj, &profile);
        let wrapper = Wrapper::new(self.next_id(), shape);
        self.table.borrow_mut().associate(obj, &wrapper)?;
        self.schema.borrow_mut().fix(obj);
        self.wraps.set(self.wraps.get() + 1);
        debug!("wrapped privileged object {obj} as wrapper {}", wrapper.id());
        Ok(wrapper)
    }

    /// Force a fresh wrapper for a privileged object, replacing any existing
    /// correspondence in both directions. The old wrapper, if still held by
    /// confined code, keeps its shape but loses its twin.
    pub fn rewrap(&self, obj: FeralId) -> MembraneResult<TameRef> {
        let profile = self.classify(obj)?;
        let shape = self.build_shape(obj, &profile);
        let wrapper = Wrapper::new(self.next_id(), shape);
        self.table.borrow_mut().reassociate(obj, &wrapper);
        self.schema.borrow_mut().fix(obj);
        self.wraps.set(self.wraps.get() + 1);
        debug!("rewrapped privileged object {obj} as wrapper {}", wrapper.id());
        Ok(wrapper)
    }

    pub fn has_confined_twin(&self, obj: FeralId) -> bool {
        self.table.borrow().has_confined_twin(obj)
    }

    pub fn has_privileged_twin(&self, wrapper: &Wrapper) -> bool {
        self.table.borrow().has_privileged_twin(wrapper)
    }

    /// Read a property through the wrapper's sealed accessor table.
    /// Deny-by-default: anything without an installed getter faults, after
    /// the optional named-item resolver has been given a chance.
    pub fn get(&self, wrapper: &TameRef, property: &str) -> MembraneResult<TameValue> {
        match wrapper.property(property).map(|spec| spec.getter) {
            Some(wrapper::Getter::Forward) => {
                let feral = self.feral_twin(wrapper)?;
                let value = self
                    .access
                    .get_property(feral, property)
                    .map_err(|f| self.raised(f))?;
                self.tame(&value)
            }
            Some(wrapper::Getter::BoundMethod) => Ok(TameValue::Object(
                self.bind_method(wrapper, property),
            )),
            Some(wrapper::Getter::Deny) => self.denied(property),
            None => self.resolve_or_deny(wrapper, property),
        }
    }

    /// Write a property through the wrapper's sealed accessor table.
    pub fn set(&self, wrapper: &TameRef, property: &str, value: &TameValue) -> MembraneResult<()> {
        match wrapper.property(property).map(|spec| spec.setter) {
            Some(wrapper::Setter::Forward | wrapper::Setter::Override) => {
                let feral = self.feral_twin(wrapper)?;
                let value = self.untame(value)?;
                self.access
                    .set_property(feral, property, value)
                    .map_err(|f| self.raised(f))?;
                Ok(())
            }
            Some(wrapper::Setter::Deny) | None => self.denied(property),
        }
    }

    /// Invoke a callable wrapper.
    ///
    /// Plain functions and constructors called as functions never see the
    /// caller's receiver; the host's neutral receiver is substituted.
    /// Method-bearing callables require a wrapper receiver with a live
    /// privileged twin. Bound methods re-resolve both their receiver and
    /// the underlying callable at call time.
    pub fn call(
        &self,
        fun: &TameRef,
        receiver: Option<&TameRef>,
        args: &[TameValue],
    ) -> MembraneResult<TameValue> {
        let kind = match fun.shape() {
            Shape::Callable(c) => c.kind.clone(),
            Shape::Record(_) => {
                return Err(GuestFault::UntamedValue {
                    detail: "wrapper is not callable".to_string(),
                }
                .into())
            }
        };
        let args = self.untame_all(args)?;
        let (fun_id, feral_receiver) = match kind {
            CallableKind::Function | CallableKind::Constructor => {
                (self.feral_twin(fun)?, self.access.neutral_receiver())
            }
            CallableKind::Method => {
                let wrapper = receiver.ok_or(GuestFault::ReceiverMismatch)?;
                let twin = self
                    .table
                    .borrow()
                    .lookup_privileged(wrapper)
                    .ok_or(GuestFault::ReceiverMismatch)?;
                (self.feral_twin(fun)?, FeralValue::Object(twin))
            }
            CallableKind::BoundMethod {
                receiver: weak,
                property,
            } => {
                let wrapper = weak.upgrade().ok_or(GuestFault::ReceiverMismatch)?;
                let twin = self
                    .table
                    .borrow()
                    .lookup_privileged(&wrapper)
                    .ok_or(GuestFault::ReceiverMismatch)?;
                let method = self
                    .access
                    .get_property(twin, &property)
                    .map_err(|f| self.raised(f))?;
                match method {
                    FeralValue::Object(id) => (id, FeralValue::Object(twin)),
                    _ => return Err(InternalFault::MethodNotCallable { object: twin }.into()),
                }
            }
        };
        let result = self
            .invoke_advised(fun_id, &feral_receiver, args)
            .map_err(|f| self.raised(f))?;
        self.tame(&result)
    }

    /// Invoke a constructor wrapper with constructor semantics: a fresh
    /// privileged instance is created with the declared superclass linkage,
    /// the constructor body runs against it, and the instance is wrapped
    /// under the constructor's instance grants.
    pub fn construct(&self, ctor: &TameRef, args: &[TameValue]) -> MembraneResult<TameRef> {
        let ctor_id = self.feral_twin(ctor)?;
        match ctor.shape() {
            Shape::Callable(c) if matches!(c.kind, CallableKind::Constructor) => {}
            _ => {
                return Err(GuestFault::UntamedValue {
                    detail: "wrapper is not a constructor".to_string(),
                }
                .into())
            }
        }
        let args = self.untame_all(args)?;
        let instance = self
            .access
            .create_instance(ctor_id)
            .map_err(|f| self.raised(f))?;
        self.invoke_advised(ctor_id, &FeralValue::Object(instance), args)
            .map_err(|f| self.raised(f))?;
        let profile = self
            .schema
            .borrow()
            .instance_profile(ctor_id)
            .ok_or(InternalFault::Unclassifiable { object: instance })?;
        let shape = self.build_shape(instance, &profile);
        let wrapper = Wrapper::new(self.next_id(), shape);
        // A constructor body that somehow registered its own instance is
        // identity confusion surfaced to the guest, not a membrane defect.
        self.table
            .borrow_mut()
            .associate(instance, &wrapper)
            .map_err(|fault| match fault {
                InternalFault::DuplicateAssociation { detail, .. } => {
                    Fault::Guest(GuestFault::DuplicateAssociation { detail })
                }
                other => other.into(),
            })?;
        self.schema.borrow_mut().fix(instance);
        self.wraps.set(self.wraps.get() + 1);
        Ok(wrapper)
    }

    /// Reverse lookup through the named-item resolver installed on the
    /// record behind `wrapper`: the name under which `value` is published,
    /// if any.
    pub fn resolve_name(
        &self,
        wrapper: &TameRef,
        value: &TameValue,
    ) -> MembraneResult<Option<String>> {
        let feral = self.feral_twin(wrapper)?;
        let resolver = match self.schema.borrow().resolver_of(feral) {
            Some(r) => r,
            None => return Ok(None),
        };
        let value = self.untame(value)?;
        Ok(resolver.name_of(&value))
    }

    /// Evict correspondence entries whose wrapper has been collected.
    pub fn sweep(&self) -> usize {
        self.table.borrow_mut().sweep()
    }

    pub fn stats(&self) -> MembraneStats {
        let table = self.table.borrow().stats();
        MembraneStats {
            wraps: self.wraps.get(),
            memo_hits: self.memo_hits.get(),
            copies: self.copies.get(),
            denials: self.denials.get(),
            neutral_faults: self.neutral_faults.get(),
            live_entries: table.live_entries,
            swept_entries: table.swept_entries,
        }
    }

    /// Pick the capability profile for a privileged object: its own declared
    /// profile first, then its direct constructor's instance grants.
    fn classify(&self, obj: FeralId) -> MembraneResult<CapabilityProfile> {
        if let Some(profile) = self.schema.borrow().profile_of(obj) {
            return Ok(profile);
        }
        if let ConstructorLink::Constructor(ctor) = self.access.direct_constructor_of(obj) {
            if let Some(profile) = self.schema.borrow().instance_profile(ctor) {
                return Ok(profile);
            }
        }
        Err(InternalFault::Unclassifiable { object: obj }.into())
    }

    fn build_shape(&self, obj: FeralId, profile: &CapabilityProfile) -> Shape {
        match profile {
            CapabilityProfile::ReadOnlyRecord => {
                // Snapshot the privileged object's own property names once;
                // the enumeration never changes afterward.
                let properties = self
                    .access
                    .get_own_property_names(obj)
                    .into_iter()
                    .filter(|name| is_exposable_name(name))
                    .map(|name| (name, PropertySpec::read_only()))
                    .collect();
                Shape::Record(RecordShape {
                    properties,
                    has_resolver: self.schema.borrow().resolver_of(obj).is_some(),
                })
            }
            CapabilityProfile::MutableRecordWithGrants(grants) => {
                let properties = grants
                    .iter()
                    .map(|(name, set)| (name.clone(), PropertySpec::from_grants(*set)))
                    .collect();
                Shape::Record(RecordShape {
                    properties,
                    has_resolver: self.schema.borrow().resolver_of(obj).is_some(),
                })
            }
            CapabilityProfile::Function(name) => Shape::Callable(CallableShape {
                kind: CallableKind::Function,
                name: name.clone(),
                properties: self.callable_properties(obj),
            }),
            CapabilityProfile::Constructor { name, .. } => Shape::Callable(CallableShape {
                kind: CallableKind::Constructor,
                name: name.clone(),
                // Grants declared on a constructor describe its instances,
                // not the constructor object itself.
                properties: BTreeMap::new(),
            }),
            CapabilityProfile::MethodBearing(name) => Shape::Callable(CallableShape {
                kind: CallableKind::Method,
                name: name.clone(),
                properties: self.callable_properties(obj),
            }),
        }
    }

    fn callable_properties(&self, obj: FeralId) -> BTreeMap<String, PropertySpec> {
        self.schema
            .borrow()
            .grants_of(obj)
            .iter()
            .map(|(name, set)| (name.clone(), PropertySpec::from_function_grants(*set)))
            .collect()
    }

    /// Synthesize a fresh bound-method wrapper. Bound methods are not
    /// registered in the correspondence table: each read yields a new one,
    /// and reading never touches the privileged side.
    fn bind_method(&self, receiver: &TameRef, property: &str) -> TameRef {
        self.wraps.set(self.wraps.get() + 1);
        Wrapper::new(
            self.next_id(),
            Shape::Callable(CallableShape {
                kind: CallableKind::BoundMethod {
                    receiver: Rc::downgrade(receiver),
                    property: property.to_string(),
                },
                name: property.to_string(),
                properties: BTreeMap::new(),
            }),
        )
    }

    fn resolve_or_deny(&self, wrapper: &TameRef, property: &str) -> MembraneResult<TameValue> {
        let has_resolver = matches!(wrapper.shape(), Shape::Record(r) if r.has_resolver);
        if has_resolver && is_exposable_name(property) {
            let feral = self.feral_twin(wrapper)?;
            let resolver = self.schema.borrow().resolver_of(feral);
            if let Some(resolver) = resolver {
                if let Some(value) = resolver.lookup(property) {
                    return self.tame(&value);
                }
            }
        }
        self.denied(property)
    }

    fn denied<T>(&self, property: &str) -> MembraneResult<T> {
        self.denials.set(self.denials.get() + 1);
        Err(GuestFault::AccessDenied {
            property: property.to_string(),
        }
        .into())
    }

    fn feral_twin(&self, wrapper: &Wrapper) -> MembraneResult<FeralId> {
        self.table
            .borrow()
            .lookup_privileged(wrapper)
            .ok_or_else(|| {
                GuestFault::UntamedValue {
                    detail: "wrapper has no privileged twin".to_string(),
                }
                .into()
            })
    }

    fn untame_all(&self, values: &[TameValue]) -> MembraneResult<Vec<FeralValue>> {
        values.iter().map(|v| self.untame(v)).collect()
    }

    /// Run the advice chain installed on a callable, inside-out around the
    /// underlying privileged invocation.
    fn invoke_advised(
        &self,
        fun: FeralId,
        receiver: &FeralValue,
        args: Vec<FeralValue>,
    ) -> Result<FeralValue, PrivilegedFault> {
        let chain = self.schema.borrow().advice_chain(fun);
        self.invoke_chain(&chain, fun, receiver, args)
    }

    fn invoke_chain(
        &self,
        chain: &[FunctionAdvice],
        fun: FeralId,
        receiver: &FeralValue,
        args: Vec<FeralValue>,
    ) -> Result<FeralValue, PrivilegedFault> {
        match chain.split_first() {
            None => self.access.invoke(fun, receiver.clone(), args),
            Some((FunctionAdvice::Before(advice), rest)) => {
                self.invoke_chain(rest, fun, receiver, advice(args))
            }
            Some((FunctionAdvice::After(advice), rest)) => self
                .invoke_chain(rest, fun, receiver, args)
                .map(|result| advice(result)),
            Some((FunctionAdvice::Around(advice), rest)) => {
                advice(&|args| self.invoke_chain(rest, fun, receiver, args), args)
            }
        }
    }

    fn next_id(&self) -> WrapperId {
        let id = self.next_wrapper.get();
        self.next_wrapper.set(id + 1);
        id
    }
}
