use serde::{Deserialize, Serialize};

use hsgw_types::{ChargingAddresses, RegistrationState};

/// The authoritative record for an implicit registration set, keyed by its
/// default IMPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultImpu {
    pub impu: String,
    pub associated_impus: Vec<String>,
    pub impis: Vec<String>,
    pub registration_state: RegistrationState,
    pub charging_addresses: ChargingAddresses,
    pub service_profile: String,
    pub expiry: u64,
    /// Store token from the replica this record was read from; never on the
    /// wire.
    #[serde(skip)]
    pub cas: u64,
}

impl DefaultImpu {
    pub fn has_associated_impu(&self, impu: &str) -> bool {
        self.associated_impus.iter().any(|i| i == impu)
    }
}

/// Pointer from a non-default public identity back to its default IMPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedImpu {
    pub impu: String,
    pub default_impu: String,
    pub expiry: u64,
    #[serde(skip)]
    pub cas: u64,
}

/// An IMPU record is either the default record or an associated pointer,
/// never both; the `type` tag on the wire distinguishes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Impu {
    Default(DefaultImpu),
    Associated(AssociatedImpu),
}

impl Impu {
    pub fn impu(&self) -> &str {
        match self {
            Impu::Default(d) => &d.impu,
            Impu::Associated(a) => &a.impu,
        }
    }

    pub fn cas(&self) -> u64 {
        match self {
            Impu::Default(d) => d.cas,
            Impu::Associated(a) => a.cas,
        }
    }

    pub fn set_cas(&mut self, cas: u64) {
        match self {
            Impu::Default(d) => d.cas = cas,
            Impu::Associated(a) => a.cas = cas,
        }
    }

    pub fn expiry(&self) -> u64 {
        match self {
            Impu::Default(d) => d.expiry,
            Impu::Associated(a) => a.expiry,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Impu::Default(_))
    }

    pub fn as_default(&self) -> Option<&DefaultImpu> {
        match self {
            Impu::Default(d) => Some(d),
            Impu::Associated(_) => None,
        }
    }
}

/// The set of default IMPUs a private identity is authorized for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpiMapping {
    pub impi: String,
    pub default_impus: Vec<String>,
    pub expiry: u64,
    #[serde(skip)]
    pub cas: u64,
}

impl ImpiMapping {
    /// A freshly synthesized mapping; `cas == 0` marks it as never stored.
    pub fn new(impi: impl Into<String>, default_impus: Vec<String>, expiry: u64) -> Self {
        Self { impi: impi.into(), default_impus, expiry, cas: 0 }
    }

    pub fn has_default_impu(&self, impu: &str) -> bool {
        self.default_impus.iter().any(|i| i == impu)
    }

    pub fn add_default_impu(&mut self, impu: &str) {
        if !self.has_default_impu(impu) {
            self.default_impus.push(impu.to_string());
        }
    }

    pub fn remove_default_impu(&mut self, impu: &str) {
        self.default_impus.retain(|i| i != impu);
    }

    pub fn is_empty(&self) -> bool {
        self.default_impus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_record() -> DefaultImpu {
        DefaultImpu {
            impu: "sip:alice@example.com".into(),
            associated_impus: vec!["tel:+15551234".into()],
            impis: vec!["alice@example.com".into()],
            registration_state: RegistrationState::Registered,
            charging_addresses: ChargingAddresses::new(vec!["ccf1".into()], vec![]),
            service_profile: "<IMSSubscription/>".into(),
            expiry: 1700000000,
            cas: 42,
        }
    }

    #[test]
    fn default_impu_wire_shape_is_stable() {
        let json = serde_json::to_value(Impu::Default(default_record())).unwrap();
        assert_eq!(json["type"], "default");
        assert_eq!(json["impu"], "sip:alice@example.com");
        assert_eq!(json["associated_impus"][0], "tel:+15551234");
        assert_eq!(json["impis"][0], "alice@example.com");
        assert_eq!(json["registration_state"], 0);
        assert_eq!(json["charging_addresses"]["ccfs"][0], "ccf1");
        assert_eq!(json["service_profile"], "<IMSSubscription/>");
        assert_eq!(json["expiry"], 1700000000);
        // The CAS token is replica-local and must never reach the wire.
        assert!(json.get("cas").is_none());
    }

    #[test]
    fn associated_impu_wire_shape_is_stable() {
        let assoc = AssociatedImpu {
            impu: "tel:+15551234".into(),
            default_impu: "sip:alice@example.com".into(),
            expiry: 1700000000,
            cas: 7,
        };
        let json = serde_json::to_value(Impu::Associated(assoc)).unwrap();
        assert_eq!(json["type"], "associated");
        assert_eq!(json["default_impu"], "sip:alice@example.com");
        assert!(json.get("cas").is_none());
    }

    #[test]
    fn wire_round_trip_preserves_variant() {
        let original = Impu::Default(default_record());
        let bytes = serde_json::to_vec(&original).unwrap();
        let mut decoded: Impu = serde_json::from_slice(&bytes).unwrap();
        decoded.set_cas(42);
        assert_eq!(decoded, original);
    }

    #[test]
    fn impi_mapping_membership_ops() {
        let mut mapping = ImpiMapping::new("alice@example.com", vec!["sip:a@x".into()], 100);
        assert!(mapping.has_default_impu("sip:a@x"));
        mapping.add_default_impu("sip:b@x");
        mapping.add_default_impu("sip:b@x");
        assert_eq!(mapping.default_impus.len(), 2);
        mapping.remove_default_impu("sip:a@x");
        mapping.remove_default_impu("sip:b@x");
        assert!(mapping.is_empty());
    }
}
