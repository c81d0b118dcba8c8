use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use hsgw_cache::{CacheError, IrsCache};
use hsgw_middleware::{InMemoryKvStore, KvError, KvStore, KvValue, Metrics};
use hsgw_store::{AssociatedImpu, DefaultImpu, Impu, ImpuStore};
use hsgw_types::{ChargingAddresses, RegistrationState};

const ALICE: &str = "sip:alice@example.com";
const ALICE_TEL: &str = "tel:+15551234";
const ALICE_IMPI: &str = "alice@example.com";
const BOB_IMPI: &str = "bob@example.com";

fn now_epoch() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

fn profile_xml() -> String {
    format!(
        "<IMSSubscription><ServiceProfile>\
         <PublicIdentity><Identity>{ALICE}</Identity></PublicIdentity>\
         <PublicIdentity><Identity>{ALICE_TEL}</Identity></PublicIdentity>\
         </ServiceProfile></IMSSubscription>"
    )
}

struct Fixture {
    cache: IrsCache,
    local: ImpuStore,
    remote: Option<ImpuStore>,
}

fn fixture() -> Fixture {
    let local_kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new("local"));
    let cache = IrsCache::new(
        ImpuStore::new(Arc::clone(&local_kv)),
        vec![],
        Arc::new(Metrics::new()),
    );
    Fixture { cache, local: ImpuStore::new(local_kv), remote: None }
}

fn fixture_with_remote() -> Fixture {
    let local_kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new("local"));
    let remote_kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new("remote-a"));
    let cache = IrsCache::new(
        ImpuStore::new(Arc::clone(&local_kv)),
        vec![ImpuStore::new(Arc::clone(&remote_kv))],
        Arc::new(Metrics::new()),
    );
    Fixture {
        cache,
        local: ImpuStore::new(local_kv),
        remote: Some(ImpuStore::new(remote_kv)),
    }
}

async fn register_alice(fx: &Fixture) {
    let mut irs = fx.cache.create_implicit_registration_set(ALICE);
    irs.set_ttl(3600);
    irs.set_registration_state(RegistrationState::Registered);
    irs.set_service_profile(&profile_xml()).unwrap();
    irs.add_associated_impi(ALICE_IMPI);
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();
}

fn assert_expiry_close(expiry: u64, ttl: u64) {
    let expected = now_epoch() + ttl;
    assert!(
        expiry >= expected - 5 && expiry <= expected + 5,
        "expiry {expiry} not within 5s of {expected}"
    );
}

// S1: initial registration writes the default record, the pointer records
// and the IMPI mapping, all sharing one expiry.
#[tokio::test]
async fn initial_registration_writes_all_three_tables() {
    let fx = fixture();
    register_alice(&fx).await;

    let default = fx.local.get_impu(ALICE).await.unwrap().unwrap();
    let Impu::Default(default) = default else { panic!("expected default record") };
    assert_eq!(default.registration_state, RegistrationState::Registered);
    assert_eq!(default.impis, vec![ALICE_IMPI]);
    assert_eq!(default.associated_impus, vec![ALICE_TEL]);
    assert_expiry_close(default.expiry, 3600);

    let pointer = fx.local.get_impu(ALICE_TEL).await.unwrap().unwrap();
    let Impu::Associated(pointer) = pointer else { panic!("expected associated record") };
    assert_eq!(pointer.default_impu, ALICE);
    assert_expiry_close(pointer.expiry, 3600);

    let mapping = fx.local.get_impi_mapping(ALICE_IMPI).await.unwrap().unwrap();
    assert_eq!(mapping.default_impus, vec![ALICE]);
    assert_expiry_close(mapping.expiry, 3600);
}

// S2: re-registration with a new binding grows the IMPI set and refreshes
// the whole IRS.
#[tokio::test]
async fn reregistration_adds_impi_and_refreshes() {
    let fx = fixture();
    register_alice(&fx).await;

    let mut irs = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    assert!(irs.is_existing());
    irs.set_ttl(3600);
    irs.add_associated_impi(BOB_IMPI);
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();

    let default = fx.local.get_impu(ALICE).await.unwrap().unwrap();
    let Impu::Default(default) = default else { panic!("expected default record") };
    let mut impis = default.impis.clone();
    impis.sort();
    assert_eq!(impis, vec![ALICE_IMPI, BOB_IMPI]);

    let mapping = fx.local.get_impi_mapping(BOB_IMPI).await.unwrap().unwrap();
    assert_eq!(mapping.default_impus, vec![ALICE]);

    let pointer = fx.local.get_impu(ALICE_TEL).await.unwrap().unwrap();
    assert_expiry_close(pointer.expiry(), 3600);
}

// S3: deregistering the whole IRS removes all three kinds of record.
#[tokio::test]
async fn deregistration_removes_all_records() {
    let fx = fixture();
    register_alice(&fx).await;

    let mut irs = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    fx.cache.delete_implicit_registration_set(&mut irs).await.unwrap();

    assert!(fx.local.get_impu(ALICE).await.unwrap().is_none());
    assert!(fx.local.get_impu(ALICE_TEL).await.unwrap().is_none());
    assert!(fx.local.get_impi_mapping(ALICE_IMPI).await.unwrap().is_none());
}

// S3 variant: an IMPI authorized for two IRSs keeps its mapping, rewritten
// without the deleted default.
#[tokio::test]
async fn deregistration_rewrites_shared_impi_mapping() {
    let fx = fixture();
    register_alice(&fx).await;

    let second = "sip:alice-work@example.com";
    let mut irs = fx.cache.create_implicit_registration_set(second);
    irs.set_ttl(3600);
    irs.set_registration_state(RegistrationState::Registered);
    irs.add_associated_impi(ALICE_IMPI);
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();

    let mapping = fx.local.get_impi_mapping(ALICE_IMPI).await.unwrap().unwrap();
    assert_eq!(mapping.default_impus.len(), 2);

    let mut first = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    fx.cache.delete_implicit_registration_set(&mut first).await.unwrap();

    let mapping = fx.local.get_impi_mapping(ALICE_IMPI).await.unwrap().unwrap();
    assert_eq!(mapping.default_impus, vec![second]);
}

// S4: reading an associated IMPU resolves one hop to the default record.
#[tokio::test]
async fn associated_impu_resolves_to_default() {
    let fx = fixture();
    register_alice(&fx).await;

    let irs = fx.cache.get_implicit_registration_set_for_impu(ALICE_TEL).await.unwrap();
    assert_eq!(irs.default_impu(), ALICE);
    assert_eq!(irs.registration_state(), RegistrationState::Registered);
    assert_eq!(irs.active_impis(), vec![ALICE_IMPI]);
}

// S5: a pointer whose default record is missing or does not point back is
// a miss, never a partial IRS.
#[tokio::test]
async fn broken_back_pointer_is_not_found() {
    let fx = fixture();
    let orphan = Impu::Associated(AssociatedImpu {
        impu: ALICE_TEL.into(),
        default_impu: ALICE.into(),
        expiry: now_epoch() + 3600,
        cas: 0,
    });
    fx.local.set_impu_without_cas(&orphan).await.unwrap();

    let err = fx.cache.get_implicit_registration_set_for_impu(ALICE_TEL).await.unwrap_err();
    assert!(matches!(err, CacheError::NotFound));

    // Now add a default record that does not list the tel URI.
    let default = Impu::Default(DefaultImpu {
        impu: ALICE.into(),
        associated_impus: vec![],
        impis: vec![ALICE_IMPI.into()],
        registration_state: RegistrationState::Registered,
        charging_addresses: ChargingAddresses::default(),
        service_profile: String::new(),
        expiry: now_epoch() + 3600,
        cas: 0,
    });
    fx.local.add_impu(&default).await.unwrap();

    let err = fx.cache.get_implicit_registration_set_for_impu(ALICE_TEL).await.unwrap_err();
    assert!(matches!(err, CacheError::NotFound));
}

// P1: put followed by get on the same node returns what was written.
#[tokio::test]
async fn put_then_get_round_trips() {
    let fx = fixture();
    register_alice(&fx).await;

    let irs = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    assert_eq!(irs.default_impu(), ALICE);
    assert_eq!(irs.registration_state(), RegistrationState::Registered);
    assert_eq!(irs.service_profile(), profile_xml());
    assert_eq!(irs.active_impis(), vec![ALICE_IMPI]);
    assert_eq!(irs.active_associated_impus(), vec![ALICE_TEL]);
    assert!(irs.ttl() > 3590 && irs.ttl() <= 3600);
}

// P2: deleting an IRS is idempotent.
#[tokio::test]
async fn delete_is_idempotent() {
    let fx = fixture();
    register_alice(&fx).await;

    let mut irs = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    fx.cache.delete_implicit_registration_set(&mut irs).await.unwrap();
    fx.cache.delete_implicit_registration_set(&mut irs).await.unwrap();
    assert!(fx.local.get_impu(ALICE).await.unwrap().is_none());

    // A handle that was never stored also deletes cleanly.
    let mut unstored = fx.cache.create_implicit_registration_set("sip:ghost@example.com");
    fx.cache.delete_implicit_registration_set(&mut unstored).await.unwrap();
}

// P3: after a profile change drops an associated IMPU, its pointer record
// converges away.
#[tokio::test]
async fn dropped_associated_impu_converges() {
    let fx = fixture();
    register_alice(&fx).await;

    let mut irs = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    irs.set_ttl(3600);
    let narrower = format!(
        "<IMSSubscription><ServiceProfile>\
         <PublicIdentity><Identity>{ALICE}</Identity></PublicIdentity>\
         </ServiceProfile></IMSSubscription>"
    );
    irs.set_service_profile(&narrower).unwrap();
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();

    assert!(fx.local.get_impu(ALICE_TEL).await.unwrap().is_none());
    let Impu::Default(default) = fx.local.get_impu(ALICE).await.unwrap().unwrap() else {
        panic!("expected default record");
    };
    assert!(default.associated_impus.is_empty());
}

// P4: a writer holding a stale token merges rather than clobbering the
// interleaved write.
#[tokio::test]
async fn concurrent_put_with_stale_cas_merges() {
    let fx = fixture();
    register_alice(&fx).await;

    let mut first = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    let mut second = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();

    first.set_ttl(3600);
    first.add_associated_impi(BOB_IMPI);
    fx.cache.put_implicit_registration_set(&mut first).await.unwrap();

    second.set_charging_addresses(ChargingAddresses::new(vec!["ccf9".into()], vec![]));
    fx.cache.put_implicit_registration_set(&mut second).await.unwrap();

    let Impu::Default(default) = fx.local.get_impu(ALICE).await.unwrap().unwrap() else {
        panic!("expected default record");
    };
    // The second writer's charging change landed without undoing the first
    // writer's new IMPI.
    assert!(default.impis.contains(&BOB_IMPI.to_string()));
    assert_eq!(default.charging_addresses.ccfs, vec!["ccf9"]);
}

#[tokio::test]
async fn gr_read_falls_back_to_remote_and_put_heals_local() {
    let fx = fixture_with_remote();
    let remote = fx.remote.as_ref().unwrap();

    let record = Impu::Default(DefaultImpu {
        impu: ALICE.into(),
        associated_impus: vec![],
        impis: vec![ALICE_IMPI.into()],
        registration_state: RegistrationState::Registered,
        charging_addresses: ChargingAddresses::default(),
        service_profile: String::new(),
        expiry: now_epoch() + 3600,
        cas: 0,
    });
    remote.add_impu(&record).await.unwrap();

    let mut irs = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    assert_eq!(irs.default_impu(), ALICE);

    irs.set_ttl(3600);
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();

    // The local replica was created by the put even though the read came
    // from the remote.
    assert!(fx.local.get_impu(ALICE).await.unwrap().is_some());
    assert!(remote.get_impu(ALICE).await.unwrap().is_some());
}

struct DownKvStore;

#[async_trait]
impl KvStore for DownKvStore {
    fn name(&self) -> &str {
        "remote-down"
    }

    async fn get(&self, _key: &str) -> Result<Option<KvValue>, KvError> {
        Err(KvError::Backend("connection refused".into()))
    }

    async fn add(&self, _key: &str, _value: Bytes, _expiry: u64) -> Result<(), KvError> {
        Err(KvError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Bytes, _cas: u64, _expiry: u64) -> Result<(), KvError> {
        Err(KvError::Backend("connection refused".into()))
    }

    async fn set_unconditional(
        &self,
        _key: &str,
        _value: Bytes,
        _expiry: u64,
    ) -> Result<(), KvError> {
        Err(KvError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str, _cas: u64) -> Result<(), KvError> {
        Err(KvError::Backend("connection refused".into()))
    }
}

// A downed remote neither fails writes nor reads; the local replica
// carries the operation.
#[tokio::test]
async fn downed_remote_is_best_effort() {
    let local_kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new("local"));
    let cache = IrsCache::new(
        ImpuStore::new(Arc::clone(&local_kv)),
        vec![ImpuStore::new(Arc::new(DownKvStore))],
        Arc::new(Metrics::new()),
    );
    let verify = ImpuStore::new(local_kv);

    let mut irs = cache.create_implicit_registration_set(ALICE);
    irs.set_ttl(3600);
    irs.set_registration_state(RegistrationState::Registered);
    cache.put_implicit_registration_set(&mut irs).await.unwrap();

    assert!(verify.get_impu(ALICE).await.unwrap().is_some());
    let read = cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    assert_eq!(read.default_impu(), ALICE);
}

#[tokio::test]
async fn batch_lookups_accumulate_and_skip_misses() {
    let fx = fixture();
    register_alice(&fx).await;

    let second = "sip:carol@example.com";
    let mut irs = fx.cache.create_implicit_registration_set(second);
    irs.set_ttl(3600);
    irs.set_registration_state(RegistrationState::Registered);
    irs.add_associated_impi("carol@example.com");
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();

    let found = fx
        .cache
        .get_implicit_registration_sets_for_impus(&[
            ALICE.to_string(),
            "sip:missing@example.com".to_string(),
            second.to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let found = fx
        .cache
        .get_implicit_registration_sets_for_impis(&[
            ALICE_IMPI.to_string(),
            "missing@example.com".to_string(),
            "carol@example.com".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn ims_subscription_updates_every_irs() {
    let fx = fixture();
    register_alice(&fx).await;

    let second = "sip:alice-work@example.com";
    let mut irs = fx.cache.create_implicit_registration_set(second);
    irs.set_ttl(3600);
    irs.set_registration_state(RegistrationState::Registered);
    irs.add_associated_impi(ALICE_IMPI);
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();

    let mut subscription = fx.cache.get_ims_subscription(ALICE_IMPI).await.unwrap();
    assert_eq!(subscription.irss().len(), 2);

    let addresses = ChargingAddresses::new(vec!["ccf-new".into()], vec!["ecf-new".into()]);
    subscription.set_charging_addresses(&addresses);
    fx.cache.put_ims_subscription(&mut subscription).await.unwrap();

    for impu in [ALICE, second] {
        let Impu::Default(default) = fx.local.get_impu(impu).await.unwrap().unwrap() else {
            panic!("expected default record");
        };
        assert_eq!(default.charging_addresses, addresses);
    }
}

#[tokio::test]
async fn bulk_delete_tolerates_missing_sets() {
    let fx = fixture();
    register_alice(&fx).await;

    let mut first = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    let copy = fx.cache.get_implicit_registration_set_for_impu(ALICE).await.unwrap();
    fx.cache.delete_implicit_registration_set(&mut first).await.unwrap();

    // The second handle now points at nothing; the bulk delete still
    // reports success.
    let mut sets = vec![copy];
    fx.cache.delete_implicit_registration_sets(&mut sets).await.unwrap();
    assert!(fx.local.get_impu(ALICE).await.unwrap().is_none());
}
