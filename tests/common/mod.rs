/*!
 * Shared test host
 * An in-memory privileged object graph for membrane integration tests
 */

use membrane::{ConstructorLink, FeralId, FeralValue, PrivilegedAccess, PrivilegedFault};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub type Behavior = Rc<dyn Fn(FeralValue, Vec<FeralValue>) -> Result<FeralValue, PrivilegedFault>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct TestObject {
    properties: BTreeMap<String, FeralValue>,
    constructed_by: Option<FeralId>,
    behavior: Option<Behavior>,
}

/// Privileged side of the tests: a mutable object graph plus callables
/// backed by closures.
#[derive(Default)]
pub struct TestHost {
    objects: RefCell<BTreeMap<FeralId, TestObject>>,
    next_id: Cell<FeralId>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            objects: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(10_000),
        }
    }

    pub fn add_object(&self, id: FeralId, properties: &[(&str, FeralValue)]) {
        let object = TestObject {
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..TestObject::default()
        };
        self.objects.borrow_mut().insert(id, object);
    }

    pub fn add_callable(&self, id: FeralId, behavior: Behavior) {
        let object = TestObject {
            behavior: Some(behavior),
            ..TestObject::default()
        };
        self.objects.borrow_mut().insert(id, object);
    }

    pub fn property(&self, id: FeralId, name: &str) -> Option<FeralValue> {
        self.objects.borrow().get(&id)?.properties.get(name).cloned()
    }

    pub fn set_raw_property(&self, id: FeralId, name: &str, value: FeralValue) {
        if let Some(object) = self.objects.borrow_mut().get_mut(&id) {
            object.properties.insert(name.to_string(), value);
        }
    }
}

impl PrivilegedAccess for TestHost {
    fn get_property(&self, obj: FeralId, property: &str) -> Result<FeralValue, PrivilegedFault> {
        self.objects
            .borrow()
            .get(&obj)
            .and_then(|o| o.properties.get(property).cloned())
            .ok_or_else(|| PrivilegedFault::message(format!("no property {property:?}")))
    }

    fn set_property(
        &self,
        obj: FeralId,
        property: &str,
        value: FeralValue,
    ) -> Result<(), PrivilegedFault> {
        let mut objects = self.objects.borrow_mut();
        let object = objects
            .get_mut(&obj)
            .ok_or_else(|| PrivilegedFault::message("no such object"))?;
        object.properties.insert(property.to_string(), value);
        Ok(())
    }

    fn invoke(
        &self,
        fun: FeralId,
        receiver: FeralValue,
        args: Vec<FeralValue>,
    ) -> Result<FeralValue, PrivilegedFault> {
        // Clone the behavior out so it may re-borrow the graph.
        let behavior = self
            .objects
            .borrow()
            .get(&fun)
            .and_then(|o| o.behavior.clone())
            .ok_or_else(|| PrivilegedFault::message("not callable"))?;
        behavior(receiver, args)
    }

    fn get_own_property_names(&self, obj: FeralId) -> Vec<String> {
        self.objects
            .borrow()
            .get(&obj)
            .map(|o| o.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn direct_constructor_of(&self, obj: FeralId) -> ConstructorLink {
        match self.objects.borrow().get(&obj).and_then(|o| o.constructed_by) {
            Some(ctor) => ConstructorLink::Constructor(ctor),
            None => ConstructorLink::Unknown,
        }
    }

    fn create_instance(&self, ctor: FeralId) -> Result<FeralId, PrivilegedFault> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.objects.borrow_mut().insert(
            id,
            TestObject {
                constructed_by: Some(ctor),
                ..TestObject::default()
            },
        );
        Ok(id)
    }
}
