use hsgw_types::ChargingAddresses;

use crate::irs::ImplicitRegistrationSet;

/// Every IRS a private identity is authorized for, materialized for
/// push-profile handling: a charging-address change from the HSS has to be
/// applied to each stored registration set.
#[derive(Debug)]
pub struct ImsSubscription {
    impi: String,
    irss: Vec<ImplicitRegistrationSet>,
}

impl ImsSubscription {
    pub fn new(impi: impl Into<String>, irss: Vec<ImplicitRegistrationSet>) -> Self {
        Self { impi: impi.into(), irss }
    }

    pub fn impi(&self) -> &str {
        &self.impi
    }

    pub fn irss(&self) -> &[ImplicitRegistrationSet] {
        &self.irss
    }

    pub fn irss_mut(&mut self) -> &mut [ImplicitRegistrationSet] {
        &mut self.irss
    }

    /// Apply new charging addresses across the whole subscription.
    pub fn set_charging_addresses(&mut self, addresses: &ChargingAddresses) {
        for irs in &mut self.irss {
            irs.set_charging_addresses(addresses.clone());
        }
    }

    /// Replace the stored service profile of the IRS keyed by
    /// `default_impu`, if this subscription holds it.
    pub fn irs_for_impu(&mut self, default_impu: &str) -> Option<&mut ImplicitRegistrationSet> {
        self.irss.iter_mut().find(|irs| irs.default_impu() == default_impu)
    }
}
