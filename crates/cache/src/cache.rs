use std::sync::Arc;
use std::time::Instant;

use hsgw_middleware::Metrics;
use hsgw_store::{AssociatedImpu, DefaultImpu, ImpiMapping, Impu, ImpuStore};

use crate::irs::{ImplicitRegistrationSet, TrackedState};
use crate::subscription::ImsSubscription;
use crate::{CacheError, Result};

const MAX_CAS_RETRIES: usize = 5;

#[derive(Clone, Copy, PartialEq)]
enum ImpuAction {
    Set,
    Delete,
}

/// Write-through, geo-redundant IRS cache over one local replica and any
/// number of remotes.
///
/// The local replica is authoritative for writes from this node; remote
/// writes are best-effort and self-heal on the next access that touches the
/// affected key.
pub struct IrsCache {
    local: ImpuStore,
    remotes: Vec<ImpuStore>,
    metrics: Arc<Metrics>,
}

impl IrsCache {
    pub fn new(local: ImpuStore, remotes: Vec<ImpuStore>, metrics: Arc<Metrics>) -> Self {
        Self { local, remotes, metrics }
    }

    /// Synthesize a handle for an IRS the store has never seen.
    pub fn create_implicit_registration_set(&self, impu: &str) -> ImplicitRegistrationSet {
        ImplicitRegistrationSet::new(impu)
    }

    // GR read: local first, then each remote in order, first hit wins.
    // Replica errors are logged and treated as misses so a downed replica
    // does not take reads out.
    async fn get_impu_gr(&self, impu: &str) -> Option<(String, Impu)> {
        for store in std::iter::once(&self.local).chain(self.remotes.iter()) {
            match store.get_impu(impu).await {
                Ok(Some(record)) => return Some((store.name().to_string(), record)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(replica = store.name(), %impu, error = %e, "IMPU read failed")
                }
            }
        }
        None
    }

    async fn get_impi_mapping_gr(&self, impi: &str) -> Option<ImpiMapping> {
        for store in std::iter::once(&self.local).chain(self.remotes.iter()) {
            match store.get_impi_mapping(impi).await {
                Ok(Some(mapping)) => return Some(mapping),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(replica = store.name(), %impi, error = %e, "IMPI read failed")
                }
            }
        }
        None
    }

    pub async fn get_implicit_registration_set_for_impu(
        &self,
        impu: &str,
    ) -> Result<ImplicitRegistrationSet> {
        let start = Instant::now();
        let result = self.get_irs_for_impu_inner(impu).await;
        self.metrics.observe_cache_latency(start.elapsed());
        result
    }

    async fn get_irs_for_impu_inner(&self, impu: &str) -> Result<ImplicitRegistrationSet> {
        let Some((origin, record)) = self.get_impu_gr(impu).await else {
            tracing::debug!(impu, "No IMPU record found");
            return Err(CacheError::NotFound);
        };

        let (origin, default) = match record {
            Impu::Default(default) => (origin, default),
            Impu::Associated(assoc) => {
                tracing::info!(impu, default_impu = %assoc.default_impu, "IMPU maps to default IMPU");

                let Some((origin, target)) = self.get_impu_gr(&assoc.default_impu).await else {
                    tracing::debug!(impu, "No record behind associated pointer");
                    return Err(CacheError::NotFound);
                };

                match target {
                    // The resolved default must point back at us, or the
                    // pointer belongs to a renumbered subscriber: treat the
                    // window condition as a miss.
                    Impu::Default(default) if default.has_associated_impu(impu) => {
                        (origin, default)
                    }
                    Impu::Default(_) => {
                        tracing::info!(impu, "Default IMPU does not list IMPU as associated");
                        return Err(CacheError::NotFound);
                    }
                    Impu::Associated(_) => {
                        tracing::info!(impu, "Non-default record behind associated pointer");
                        return Err(CacheError::NotFound);
                    }
                }
            }
        };

        Ok(ImplicitRegistrationSet::from_store(&origin, default))
    }

    /// Batch lookup by IMPU. Misses are skipped; the result is the union of
    /// successes.
    pub async fn get_implicit_registration_sets_for_impus(
        &self,
        impus: &[String],
    ) -> Result<Vec<ImplicitRegistrationSet>> {
        let mut result = Vec::new();
        for impu in impus {
            match self.get_irs_for_impu_inner(impu).await {
                Ok(irs) => result.push(irs),
                Err(CacheError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    /// Batch lookup by IMPI, via the IMPI mappings.
    pub async fn get_implicit_registration_sets_for_impis(
        &self,
        impis: &[String],
    ) -> Result<Vec<ImplicitRegistrationSet>> {
        let mut result = Vec::new();
        for impi in impis {
            let Some(mapping) = self.get_impi_mapping_gr(impi).await else {
                continue;
            };
            let mut found =
                self.get_implicit_registration_sets_for_impus(&mapping.default_impus).await?;
            result.append(&mut found);
        }
        Ok(result)
    }

    /// Save an IRS, including the associated-IMPU pointers and the IMPI
    /// mapping table.
    pub async fn put_implicit_registration_set(
        &self,
        irs: &mut ImplicitRegistrationSet,
    ) -> Result<()> {
        if !irs.has_changed() {
            return Ok(());
        }

        let start = Instant::now();
        let result = self.perform(irs, ImpuAction::Set).await;
        self.metrics.observe_cache_latency(start.elapsed());
        result
    }

    /// Remove an IRS everywhere. Idempotent: deleting an IRS that is
    /// already gone returns OK.
    pub async fn delete_implicit_registration_set(
        &self,
        irs: &mut ImplicitRegistrationSet,
    ) -> Result<()> {
        if !irs.is_existing() {
            tracing::warn!(impu = irs.default_impu(), "Attempted to delete IRS which was never stored");
            return Ok(());
        }

        let start = Instant::now();
        let result = self.perform(irs, ImpuAction::Delete).await;
        self.metrics.observe_cache_latency(start.elapsed());
        result
    }

    /// Delete several registration sets (registration-termination). A set
    /// that is already gone is skipped; any other failure aborts.
    pub async fn delete_implicit_registration_sets(
        &self,
        irss: &mut [ImplicitRegistrationSet],
    ) -> Result<()> {
        for irs in irss.iter_mut() {
            match self.delete_implicit_registration_set(irs).await {
                Ok(()) | Err(CacheError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Every IRS reachable from an IMPI, for push-profile handling.
    pub async fn get_ims_subscription(&self, impi: &str) -> Result<ImsSubscription> {
        let start = Instant::now();
        let result = async {
            let Some(mapping) = self.get_impi_mapping_gr(impi).await else {
                return Err(CacheError::NotFound);
            };
            let irss =
                self.get_implicit_registration_sets_for_impus(&mapping.default_impus).await?;
            Ok(ImsSubscription::new(impi, irss))
        }
        .await;
        self.metrics.observe_cache_latency(start.elapsed());
        result
    }

    /// Save every IRS the push changed.
    pub async fn put_ims_subscription(&self, subscription: &mut ImsSubscription) -> Result<()> {
        for irs in subscription.irss_mut() {
            self.put_implicit_registration_set(irs).await?;
        }
        Ok(())
    }

    // Local replica first; a local failure is fatal for the operation.
    // Remote failures are logged and absorbed: the local write has
    // succeeded, and remotes converge on the next access.
    async fn perform(&self, irs: &mut ImplicitRegistrationSet, action: ImpuAction) -> Result<()> {
        self.apply_to_store(irs, &self.local, action).await?;

        for remote in &self.remotes {
            if let Err(e) = self.apply_to_store(irs, remote, action).await {
                tracing::warn!(
                    replica = remote.name(),
                    impu = irs.default_impu(),
                    error = %e,
                    "Remote replica write failed; will self-heal"
                );
            }
        }
        Ok(())
    }

    async fn apply_to_store(
        &self,
        irs: &mut ImplicitRegistrationSet,
        store: &ImpuStore,
        action: ImpuAction,
    ) -> Result<()> {
        if action == ImpuAction::Delete {
            // Deleting reconfirms our view of the world; stale store state
            // must lose.
            irs.mark_as_refreshed();
        }

        self.write_default_impu(irs, store, action).await?;

        if action == ImpuAction::Delete {
            irs.delete_assoc_impus();
            irs.delete_impis();
        }

        // Phases B and C never roll back phase A: the default record is
        // authoritative and a later read heals the edges.
        self.write_associated_pointers(irs, store).await;
        self.write_impi_mappings(irs, store).await;
        Ok(())
    }

    // Phase A: the default-IMPU record itself, CAS-looped.
    async fn write_default_impu(
        &self,
        irs: &mut ImplicitRegistrationSet,
        store: &ImpuStore,
        action: ImpuAction,
    ) -> Result<()> {
        let mut candidate: Option<DefaultImpu> = irs.record_for_store(store.name());
        let mut contention_retries = 0;

        loop {
            let attempt = match candidate.take() {
                Some(record) => {
                    let record = Impu::Default(record);
                    match action {
                        ImpuAction::Set => store.set_impu(&record).await,
                        ImpuAction::Delete => store.delete_impu(&record).await,
                    }
                }
                None => {
                    // No usable token for this replica: read its view and
                    // reconcile.
                    match store.get_impu(irs.default_impu()).await? {
                        None => match action {
                            ImpuAction::Delete => return Ok(()),
                            ImpuAction::Set => {
                                store.add_impu(&Impu::Default(irs.to_record(0))).await
                            }
                        },
                        Some(Impu::Default(stored)) => {
                            irs.update_from_store(&stored);
                            candidate = Some(irs.to_record(stored.cas));
                            continue;
                        }
                        Some(stored) if irs.is_refreshed() => {
                            // The key became an associated pointer under us,
                            // but our data has just been reconfirmed by the
                            // HSS: authoritative replace.
                            candidate = Some(irs.to_record(stored.cas()));
                            continue;
                        }
                        Some(_) => {
                            tracing::warn!(
                                impu = irs.default_impu(),
                                replica = store.name(),
                                "Default IMPU key holds an associated pointer and write is not a refresh"
                            );
                            return Err(CacheError::Conflict(irs.default_impu().to_string()));
                        }
                    }
                }
            };

            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.is_contention() => {
                    contention_retries += 1;
                    if contention_retries >= MAX_CAS_RETRIES {
                        return Err(CacheError::RetriesExhausted(irs.default_impu().to_string()));
                    }
                }
                Err(e) if e.is_not_found() => {
                    if action == ImpuAction::Delete {
                        return Ok(());
                    }
                    // The record evaporated between read and write; re-drive
                    // through the create path.
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // Phase B: associated-IMPU pointer records. Blind writes by design; a
    // lost update re-adds the same pointer. Failures are logged only.
    async fn write_associated_pointers(&self, irs: &ImplicitRegistrationSet, store: &ImpuStore) {
        for impu in irs.associated_impus(TrackedState::Deleted) {
            let mut retries = 0;
            loop {
                let current = match store.get_impu(&impu).await {
                    Ok(current) => current,
                    Err(e) => {
                        tracing::warn!(replica = store.name(), %impu, error = %e, "Pointer read failed");
                        break;
                    }
                };

                match current {
                    Some(Impu::Associated(assoc)) if assoc.default_impu == irs.default_impu() => {
                        match store.delete_impu(&Impu::Associated(assoc)).await {
                            Ok(()) => break,
                            Err(e) if e.is_contention() && retries < MAX_CAS_RETRIES => {
                                retries += 1;
                            }
                            Err(e) if e.is_not_found() => break,
                            Err(e) => {
                                tracing::warn!(replica = store.name(), %impu, error = %e, "Pointer delete failed");
                                break;
                            }
                        }
                    }
                    // A default record or somebody else's pointer: not ours
                    // to remove.
                    _ => break,
                }
            }
        }

        let mut to_write = irs.associated_impus(TrackedState::Added);
        if irs.is_refreshed() {
            to_write.extend(irs.associated_impus(TrackedState::Unchanged));
        }

        let expiry = irs.expiry_epoch();
        for impu in to_write {
            if impu == irs.default_impu() {
                continue;
            }
            let pointer = Impu::Associated(AssociatedImpu {
                impu: impu.clone(),
                default_impu: irs.default_impu().to_string(),
                expiry,
                cas: 0,
            });
            if let Err(e) = store.set_impu_without_cas(&pointer).await {
                tracing::warn!(replica = store.name(), %impu, error = %e, "Pointer write failed");
            }
        }
    }

    // Phase C: the IMPI mapping table. Mappings are arrays mutated by
    // multiple nodes, so every update is CAS-looped.
    async fn write_impi_mappings(&self, irs: &ImplicitRegistrationSet, store: &ImpuStore) {
        for impi in irs.impis(TrackedState::Deleted) {
            let mut retries = 0;
            loop {
                let mapping = match store.get_impi_mapping(&impi).await {
                    Ok(mapping) => mapping,
                    Err(e) => {
                        tracing::warn!(replica = store.name(), %impi, error = %e, "Mapping read failed");
                        break;
                    }
                };
                let Some(mut mapping) = mapping else { break };
                if !mapping.has_default_impu(irs.default_impu()) {
                    break;
                }

                mapping.remove_default_impu(irs.default_impu());
                let result = if mapping.is_empty() {
                    store.delete_impi_mapping(&mapping).await
                } else {
                    store.set_impi_mapping(&mapping).await
                };
                match result {
                    Ok(()) => break,
                    Err(e) if e.is_contention() && retries < MAX_CAS_RETRIES => retries += 1,
                    Err(e) if e.is_not_found() => break,
                    Err(e) => {
                        tracing::warn!(replica = store.name(), %impi, error = %e, "Mapping update failed");
                        break;
                    }
                }
            }
        }

        if irs.is_refreshed() {
            for impi in irs.impis(TrackedState::Unchanged) {
                let mut retries = 0;
                loop {
                    let expiry = irs.expiry_epoch();
                    let mapping = match store.get_impi_mapping(&impi).await {
                        Ok(mapping) => mapping,
                        Err(e) => {
                            tracing::warn!(replica = store.name(), %impi, error = %e, "Mapping read failed");
                            break;
                        }
                    };

                    // The mapping may have been deleted and re-added behind
                    // our back; re-insert ourselves if needed (heals the
                    // IMPI-coverage invariant).
                    let mapping = match mapping {
                        Some(mut mapping) => {
                            mapping.expiry = expiry;
                            mapping.add_default_impu(irs.default_impu());
                            mapping
                        }
                        None => ImpiMapping::new(
                            impi.clone(),
                            vec![irs.default_impu().to_string()],
                            expiry,
                        ),
                    };

                    match store.set_impi_mapping(&mapping).await {
                        Ok(()) => break,
                        Err(e)
                            if (e.is_contention() || e.is_not_found())
                                && retries < MAX_CAS_RETRIES =>
                        {
                            retries += 1;
                        }
                        Err(e) => {
                            tracing::warn!(replica = store.name(), %impi, error = %e, "Mapping refresh failed");
                            break;
                        }
                    }
                }
            }
        }

        for impi in irs.impis(TrackedState::Added) {
            // Multiple IMPIs mapping to multiple IRSs is rare, so try the
            // optimistic create first and fall back to read-modify-write.
            let mut mapping = ImpiMapping::new(
                impi.clone(),
                vec![irs.default_impu().to_string()],
                irs.expiry_epoch(),
            );
            let mut retries = 0;
            loop {
                match store.set_impi_mapping(&mapping).await {
                    Ok(()) => break,
                    Err(e) if e.is_contention() && retries < MAX_CAS_RETRIES => {
                        retries += 1;
                        match store.get_impi_mapping(&impi).await {
                            Ok(Some(mut stored)) => {
                                if stored.has_default_impu(irs.default_impu())
                                    && !irs.is_refreshed()
                                {
                                    // Present already and we are not
                                    // refreshing: the data is good as-is.
                                    break;
                                }
                                stored.add_default_impu(irs.default_impu());
                                if irs.is_refreshed() {
                                    stored.expiry = irs.expiry_epoch();
                                }
                                mapping = stored;
                            }
                            Ok(None) => {
                                mapping.cas = 0;
                            }
                            Err(e) => {
                                tracing::warn!(replica = store.name(), %impi, error = %e, "Mapping read failed");
                                break;
                            }
                        }
                    }
                    Err(e) if e.is_not_found() && retries < MAX_CAS_RETRIES => {
                        retries += 1;
                        mapping.cas = 0;
                    }
                    Err(e) => {
                        tracing::warn!(replica = store.name(), %impi, error = %e, "Mapping create failed");
                        break;
                    }
                }
            }
        }
    }
}
