use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use hsgw_store::DefaultImpu;
use hsgw_types::{extract_identities, ChargingAddresses, RegistrationState};

use crate::Result;

pub(crate) fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Per-element change tracking since the handle was read or synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedState {
    Added,
    Unchanged,
    Deleted,
}

pub(crate) type Tracked = HashMap<String, TrackedState>;

/// Reconcile a caller-supplied element list against tracked state.
///
/// Elements missing from `updated` are marked DELETED; elements new to the
/// tracking (or previously DELETED) are marked ADDED; the rest keep their
/// state.
fn set_elements(updated: &[String], data: &mut Tracked) {
    for (element, state) in data.iter_mut() {
        if !updated.contains(element) {
            *state = TrackedState::Deleted;
        }
    }

    for element in updated {
        match data.get(element) {
            None | Some(TrackedState::Deleted) => {
                data.insert(element.clone(), TrackedState::Added);
            }
            _ => {}
        }
    }
}

/// Fold store-side elements into tracked state, placing unseen elements in
/// `state` and leaving known elements alone.
fn merge_from_store(store_elements: &[String], data: &mut Tracked, state: TrackedState) {
    for element in store_elements {
        data.entry(element.clone()).or_insert(state);
    }
}

fn mark_all_deleted(data: &mut Tracked) {
    for state in data.values_mut() {
        *state = TrackedState::Deleted;
    }
}

fn in_state(data: &Tracked, wanted: TrackedState) -> Vec<String> {
    let mut elements: Vec<String> = data
        .iter()
        .filter(|(_, state)| **state == wanted)
        .map(|(element, _)| element.clone())
        .collect();
    elements.sort();
    elements
}

/// A live handle onto one implicit registration set.
///
/// Not thread-safe by design; a handle is owned by the single request that
/// reads, mutates and writes it. Concurrent handles race through the
/// store's CAS.
#[derive(Debug, Clone)]
pub struct ImplicitRegistrationSet {
    default_impu: String,
    ttl: u64,
    registration_state: RegistrationState,
    registration_state_set: bool,
    service_profile: String,
    service_profile_set: bool,
    charging_addresses: ChargingAddresses,
    charging_addresses_set: bool,
    impis: Tracked,
    associated_impus: Tracked,
    existing: bool,
    refreshed: bool,
    changed: bool,
    origin: Option<String>,
    cas: u64,
}

impl ImplicitRegistrationSet {
    /// Synthesize a handle for an IRS that has not been read from any
    /// replica (initial registration).
    pub fn new(default_impu: impl Into<String>) -> Self {
        Self {
            default_impu: default_impu.into(),
            ttl: 0,
            registration_state: RegistrationState::NotRegistered,
            registration_state_set: false,
            service_profile: String::new(),
            service_profile_set: false,
            charging_addresses: ChargingAddresses::default(),
            charging_addresses_set: false,
            impis: Tracked::new(),
            associated_impus: Tracked::new(),
            existing: false,
            refreshed: false,
            changed: false,
            origin: None,
            cas: 0,
        }
    }

    /// Build a handle from a record read off a replica.
    pub(crate) fn from_store(origin: &str, record: DefaultImpu) -> Self {
        let now = now_epoch();
        let mut impis = Tracked::new();
        merge_from_store(&record.impis, &mut impis, TrackedState::Unchanged);
        let mut associated_impus = Tracked::new();
        merge_from_store(&record.associated_impus, &mut associated_impus, TrackedState::Unchanged);

        Self {
            default_impu: record.impu,
            ttl: record.expiry.saturating_sub(now),
            registration_state: record.registration_state,
            registration_state_set: false,
            service_profile: record.service_profile,
            service_profile_set: false,
            charging_addresses: record.charging_addresses,
            charging_addresses_set: false,
            impis,
            associated_impus,
            existing: true,
            refreshed: false,
            changed: false,
            origin: Some(origin.to_string()),
            cas: record.cas,
        }
    }

    pub fn default_impu(&self) -> &str {
        &self.default_impu
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.registration_state
    }

    pub fn service_profile(&self) -> &str {
        &self.service_profile
    }

    pub fn charging_addresses(&self) -> &ChargingAddresses {
        &self.charging_addresses
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn is_existing(&self) -> bool {
        self.existing
    }

    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// The absolute expiry every record in this IRS is written with.
    pub(crate) fn expiry_epoch(&self) -> u64 {
        now_epoch() + self.ttl
    }

    pub fn set_registration_state(&mut self, state: RegistrationState) {
        self.registration_state = state;
        self.registration_state_set = true;
        self.changed = true;
    }

    /// Install a freshly received service profile. The associated-IMPU set
    /// is re-derived from the identities the profile names (the default
    /// IMPU itself is kept out of the pointer set).
    pub fn set_service_profile(&mut self, xml: &str) -> Result<()> {
        let mut identities = extract_identities(xml)?;
        identities.retain(|identity| identity != &self.default_impu);
        set_elements(&identities, &mut self.associated_impus);
        self.service_profile = xml.to_string();
        self.service_profile_set = true;
        self.changed = true;
        Ok(())
    }

    /// Replace the associated-IMPU set directly (used when the caller has
    /// already resolved identities).
    pub fn set_associated_impus(&mut self, impus: Vec<String>) {
        let filtered: Vec<String> =
            impus.into_iter().filter(|impu| impu != &self.default_impu).collect();
        set_elements(&filtered, &mut self.associated_impus);
        self.changed = true;
    }

    pub fn set_charging_addresses(&mut self, addresses: ChargingAddresses) {
        self.charging_addresses = addresses;
        self.charging_addresses_set = true;
        self.changed = true;
    }

    /// Confirm the IRS with a fresh TTL; the write becomes a refresh and is
    /// authoritative over staler store state.
    pub fn set_ttl(&mut self, ttl: u64) {
        self.ttl = ttl;
        self.refreshed = true;
        self.changed = true;
    }

    pub fn add_associated_impi(&mut self, impi: &str) {
        self.impis.insert(impi.to_string(), TrackedState::Added);
        self.changed = true;
    }

    pub fn delete_associated_impi(&mut self, impi: &str) {
        self.impis.insert(impi.to_string(), TrackedState::Deleted);
        self.changed = true;
    }

    pub fn set_associated_impis(&mut self, impis: Vec<String>) {
        set_elements(&impis, &mut self.impis);
        self.changed = true;
    }

    pub(crate) fn mark_as_refreshed(&mut self) {
        self.refreshed = true;
    }

    pub(crate) fn delete_assoc_impus(&mut self) {
        mark_all_deleted(&mut self.associated_impus);
    }

    pub(crate) fn delete_impis(&mut self) {
        mark_all_deleted(&mut self.impis);
    }

    pub fn impis(&self, state: TrackedState) -> Vec<String> {
        in_state(&self.impis, state)
    }

    pub fn associated_impus(&self, state: TrackedState) -> Vec<String> {
        in_state(&self.associated_impus, state)
    }

    /// All IMPIs that survive the pending write.
    pub fn active_impis(&self) -> Vec<String> {
        let mut impis = self.impis(TrackedState::Added);
        impis.extend(self.impis(TrackedState::Unchanged));
        impis.sort();
        impis
    }

    /// All associated IMPUs that survive the pending write.
    pub fn active_associated_impus(&self) -> Vec<String> {
        let mut impus = self.associated_impus(TrackedState::Added);
        impus.extend(self.associated_impus(TrackedState::Unchanged));
        impus.sort();
        impus
    }

    /// Materialize the default-IMPU record for a write, carrying `cas`.
    pub(crate) fn to_record(&self, cas: u64) -> DefaultImpu {
        DefaultImpu {
            impu: self.default_impu.clone(),
            associated_impus: self.active_associated_impus(),
            impis: self.active_impis(),
            registration_state: self.registration_state,
            charging_addresses: self.charging_addresses.clone(),
            service_profile: self.service_profile.clone(),
            expiry: self.expiry_epoch(),
            cas,
        }
    }

    /// The record for a given replica, only if the handle's token came from
    /// that replica.
    pub(crate) fn record_for_store(&self, store_name: &str) -> Option<DefaultImpu> {
        match &self.origin {
            Some(origin) if origin == store_name => Some(self.to_record(self.cas)),
            _ => None,
        }
    }

    /// Merge store-side state into the handle: fields the caller did not
    /// touch are taken from the store, and unseen set elements join the
    /// tracking. A refreshed handle treats store-only elements as stale
    /// (DELETED); otherwise the store is believed (UNCHANGED) and its TTL
    /// adopted.
    pub(crate) fn update_from_store(&mut self, record: &DefaultImpu) {
        if !self.registration_state_set {
            self.registration_state = record.registration_state;
        }
        if !self.service_profile_set {
            self.service_profile = record.service_profile.clone();
        }
        if !self.charging_addresses_set {
            self.charging_addresses = record.charging_addresses.clone();
        }

        let state = if self.refreshed {
            // Refresh never shortens the record's life (I4).
            let now = now_epoch();
            let store_ttl = record.expiry.saturating_sub(now);
            if store_ttl > self.ttl {
                self.ttl = store_ttl;
            }
            TrackedState::Deleted
        } else {
            let now = now_epoch();
            self.ttl = record.expiry.saturating_sub(now);
            TrackedState::Unchanged
        };

        merge_from_store(&record.impis, &mut self.impis, state);
        merge_from_store(&record.associated_impus, &mut self.associated_impus, state);
    }
}
