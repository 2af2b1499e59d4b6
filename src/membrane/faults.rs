/*!
 * Exception Sanitizer
 * Fault payloads crossing the membrane in either direction
 *
 * A privileged fault payload is tamed like any other value; when taming
 * fails the guest receives a neutral fault carrying only a stringified
 * description, never the payload itself. The outward direction mirrors
 * this for guest faults propagating into privileged code.
 */

use crate::core::errors::{Fault, GuestFault, TameFault};
use crate::core::values::{FaultRecord, FeralValue};
use crate::membrane::traits::{PrivilegedAccess, PrivilegedFault};
use crate::membrane::Membrane;
use log::warn;

impl<A: PrivilegedAccess> Membrane<A> {
    /// Sanitize a privileged fault for delivery to confined code.
    pub fn sanitize_fault(&self, fault: PrivilegedFault) -> TameFault {
        let PrivilegedFault(payload) = fault;
        // A typed fault record already separates name from message; only
        // untyped payloads fall back to the host's description.
        let (name, message) = match &payload {
            FeralValue::Fault(record) => (record.name.clone(), record.message.clone()),
            _ => ("Error".to_string(), self.access.describe(&payload)),
        };
        match self.tame(&payload) {
            Ok(tamed) => TameFault::new(name, message, tamed),
            Err(_) => {
                self.neutral_faults.set(self.neutral_faults.get() + 1);
                warn!("untameable fault payload downgraded to neutral: {message}");
                TameFault::neutral(message)
            }
        }
    }

    /// Cross a guest fault outward as a privileged fault value. Only the
    /// payload of a raised fault can carry structure; every other guest
    /// fault crosses as its typed description.
    pub fn desanitize_fault(&self, fault: &GuestFault) -> FeralValue {
        if let GuestFault::Raised(raised) = fault {
            if let Some(payload) = raised.payload() {
                if let Ok(crossed) = self.untame(payload) {
                    return crossed;
                }
            }
            return FeralValue::Fault(FaultRecord::new(raised.name(), raised.message()));
        }
        FeralValue::Fault(FaultRecord::new("Error", fault.to_string()))
    }

    pub(crate) fn raised(&self, fault: PrivilegedFault) -> Fault {
        GuestFault::Raised(self.sanitize_fault(fault)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::values::TameValue;
    use crate::membrane::traits::ConstructorLink;
    use crate::schema::Grant;

    struct FaultyHost;

    impl PrivilegedAccess for FaultyHost {
        fn get_property(
            &self,
            _: crate::core::types::FeralId,
            _: &str,
        ) -> Result<FeralValue, PrivilegedFault> {
            Err(PrivilegedFault(FeralValue::Object(99)))
        }
        fn set_property(
            &self,
            _: crate::core::types::FeralId,
            _: &str,
            _: FeralValue,
        ) -> Result<(), PrivilegedFault> {
            Ok(())
        }
        fn invoke(
            &self,
            _: crate::core::types::FeralId,
            _: FeralValue,
            _: Vec<FeralValue>,
        ) -> Result<FeralValue, PrivilegedFault> {
            Err(PrivilegedFault(FeralValue::Fault(FaultRecord::new(
                "TypeError",
                "bad call",
            ))))
        }
        fn get_own_property_names(&self, _: crate::core::types::FeralId) -> Vec<String> {
            Vec::new()
        }
        fn direct_constructor_of(&self, _: crate::core::types::FeralId) -> ConstructorLink {
            ConstructorLink::Unknown
        }
        fn create_instance(
            &self,
            _: crate::core::types::FeralId,
        ) -> Result<crate::core::types::FeralId, PrivilegedFault> {
            Err(PrivilegedFault::message("not a constructor"))
        }
    }

    #[test]
    fn test_untameable_payload_becomes_neutral() {
        let membrane = Membrane::new(FaultyHost);
        // Object 99 is undeclared, so the payload cannot be tamed.
        let fault = membrane.sanitize_fault(PrivilegedFault(FeralValue::Object(99)));
        assert!(fault.is_neutral());
        assert_eq!(fault.name(), "Error");
        assert_eq!(fault.message(), "Error");
        assert_eq!(membrane.stats().neutral_faults, 1);
    }

    #[test]
    fn test_typed_fault_record_keeps_its_name() {
        let membrane = Membrane::new(FaultyHost);
        let fault = membrane.sanitize_fault(PrivilegedFault(FeralValue::Fault(FaultRecord::new(
            "RangeError",
            "out of range",
        ))));
        assert!(!fault.is_neutral());
        assert_eq!(fault.name(), "RangeError");
        assert_eq!(fault.message(), "out of range");
        assert_eq!(fault.to_string(), "RangeError: out of range");
    }

    #[test]
    fn test_faulting_getter_surfaces_as_neutral_guest_fault() {
        let membrane = Membrane::new(FaultyHost);
        membrane.declare_grant(1, "x", Grant::Read).unwrap();
        let w = membrane.wrap(1).unwrap();
        let err = membrane.get(&w, "x").unwrap_err();
        match err.guest() {
            Some(GuestFault::Raised(fault)) => {
                assert!(fault.is_neutral());
                assert_eq!(fault.message(), "Error");
            }
            other => panic!("unexpected fault {other:?}"),
        }
    }

    #[test]
    fn test_desanitize_round_trips_a_typed_fault() {
        let membrane = Membrane::new(FaultyHost);
        let guest = GuestFault::Raised(TameFault::new(
            "TypeError",
            "bad call",
            TameValue::Fault(FaultRecord::new("TypeError", "bad call")),
        ));
        assert_eq!(
            membrane.desanitize_fault(&guest),
            FeralValue::Fault(FaultRecord::new("TypeError", "bad call"))
        );
    }

    #[test]
    fn test_desanitize_denial_is_a_plain_description() {
        let membrane = Membrane::new(FaultyHost);
        let guest = GuestFault::AccessDenied {
            property: "secret".to_string(),
        };
        match membrane.desanitize_fault(&guest) {
            FeralValue::Fault(record) => {
                assert_eq!(record.name, "Error");
                assert!(record.message.contains("secret"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
