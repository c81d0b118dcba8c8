use std::sync::Arc;

use hsgw_cache::IrsCache;
use hsgw_diameter::cx::charging_information_avp;
use hsgw_diameter::dictionary::*;
use hsgw_diameter::{Avp, IncomingRequestHandler, Message};
use hsgw_hss::CxPushHandler;
use hsgw_middleware::{InMemoryKvStore, KvStore, Metrics};
use hsgw_store::{Impu, ImpuStore};
use hsgw_types::{ChargingAddresses, RegistrationState};

const ALICE: &str = "sip:alice@example.com";
const ALICE_TEL: &str = "tel:+15551234";
const ALICE_IMPI: &str = "alice@example.com";

struct Fixture {
    cache: Arc<IrsCache>,
    handler: Arc<CxPushHandler>,
    verify: ImpuStore,
}

fn fixture() -> Fixture {
    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new("local"));
    let metrics = Arc::new(Metrics::new());
    let cache = Arc::new(IrsCache::new(
        ImpuStore::new(Arc::clone(&kv)),
        vec![],
        Arc::clone(&metrics),
    ));
    let handler = CxPushHandler::new(Arc::clone(&cache), metrics);
    Fixture { cache, handler, verify: ImpuStore::new(kv) }
}

fn profile(identities: &[&str]) -> String {
    let mut xml = String::from("<IMSSubscription><ServiceProfile>");
    for identity in identities {
        xml.push_str(&format!("<PublicIdentity><Identity>{identity}</Identity></PublicIdentity>"));
    }
    xml.push_str("</ServiceProfile></IMSSubscription>");
    xml
}

async fn register_alice(fx: &Fixture) {
    let mut irs = fx.cache.create_implicit_registration_set(ALICE);
    irs.set_ttl(3600);
    irs.set_registration_state(RegistrationState::Registered);
    irs.set_service_profile(&profile(&[ALICE, ALICE_TEL])).unwrap();
    irs.add_associated_impi(ALICE_IMPI);
    fx.cache.put_implicit_registration_set(&mut irs).await.unwrap();
}

fn ppr(impi: &str) -> Message {
    Message::request(CMD_PUSH_PROFILE, CX_APPLICATION_ID)
        .with_avp(Avp::utf8(AVP_SESSION_ID, None, "hss;1;1"))
        .with_avp(Avp::utf8(AVP_USER_NAME, None, impi))
}

fn rtr(impi: &str) -> Message {
    Message::request(CMD_REGISTRATION_TERMINATION, CX_APPLICATION_ID)
        .with_avp(Avp::utf8(AVP_SESSION_ID, None, "hss;2;2"))
        .with_avp(Avp::utf8(AVP_USER_NAME, None, impi))
}

#[tokio::test]
async fn ppr_updates_charging_addresses_across_the_subscription() {
    let fx = fixture();
    register_alice(&fx).await;

    let addresses = ChargingAddresses::new(vec!["ccf-new".into()], vec!["ecf-new".into()]);
    let request = ppr(ALICE_IMPI).with_avp(charging_information_avp(&addresses));

    let answer = fx.handler.handle_request(request).await.unwrap();
    assert_eq!(answer.result_code().unwrap(), DIAMETER_SUCCESS);
    assert_eq!(answer.session_id().unwrap(), "hss;1;1");

    let Impu::Default(default) = fx.verify.get_impu(ALICE).await.unwrap().unwrap() else {
        panic!("expected default record");
    };
    assert_eq!(default.charging_addresses, addresses);
}

#[tokio::test]
async fn ppr_applies_pushed_profile_and_reshapes_pointers() {
    let fx = fixture();
    register_alice(&fx).await;

    let new_profile = profile(&[ALICE, "tel:+19998887777"]);
    let request = ppr(ALICE_IMPI).with_avp(Avp::utf8(AVP_USER_DATA, Some(VENDOR_3GPP), &new_profile));

    let answer = fx.handler.handle_request(request).await.unwrap();
    assert_eq!(answer.result_code().unwrap(), DIAMETER_SUCCESS);

    let Impu::Default(default) = fx.verify.get_impu(ALICE).await.unwrap().unwrap() else {
        panic!("expected default record");
    };
    assert_eq!(default.service_profile, new_profile);
    assert_eq!(default.associated_impus, vec!["tel:+19998887777"]);

    // Pointer table follows the profile change.
    assert!(fx.verify.get_impu("tel:+19998887777").await.unwrap().is_some());
    assert!(fx.verify.get_impu(ALICE_TEL).await.unwrap().is_none());
}

#[tokio::test]
async fn ppr_for_unknown_impi_is_user_unknown() {
    let fx = fixture();
    let answer = fx.handler.handle_request(ppr("ghost@example.com")).await.unwrap();
    assert_eq!(answer.experimental_result_code().unwrap(), ERROR_USER_UNKNOWN);
}

#[tokio::test]
async fn ppr_profile_for_unknown_set_is_rejected() {
    let fx = fixture();
    register_alice(&fx).await;

    let foreign_profile = profile(&["sip:somebody-else@example.com"]);
    let request =
        ppr(ALICE_IMPI).with_avp(Avp::utf8(AVP_USER_DATA, Some(VENDOR_3GPP), &foreign_profile));

    let answer = fx.handler.handle_request(request).await.unwrap();
    assert_eq!(answer.result_code().unwrap(), DIAMETER_UNABLE_TO_COMPLY);
}

#[tokio::test]
async fn rtr_deletes_the_registration_sets_of_the_impi() {
    let fx = fixture();
    register_alice(&fx).await;

    let answer = fx.handler.handle_request(rtr(ALICE_IMPI)).await.unwrap();
    assert_eq!(answer.result_code().unwrap(), DIAMETER_SUCCESS);
    assert_eq!(answer.session_id().unwrap(), "hss;2;2");

    assert!(fx.verify.get_impu(ALICE).await.unwrap().is_none());
    assert!(fx.verify.get_impu(ALICE_TEL).await.unwrap().is_none());
    assert!(fx.verify.get_impi_mapping(ALICE_IMPI).await.unwrap().is_none());
}

#[tokio::test]
async fn rtr_by_public_identity_deletes_that_set() {
    let fx = fixture();
    register_alice(&fx).await;

    let request = rtr(ALICE_IMPI)
        .with_avp(Avp::utf8(AVP_PUBLIC_IDENTITY, Some(VENDOR_3GPP), ALICE_TEL));
    let answer = fx.handler.handle_request(request).await.unwrap();
    assert_eq!(answer.result_code().unwrap(), DIAMETER_SUCCESS);
    assert!(fx.verify.get_impu(ALICE).await.unwrap().is_none());
}

#[tokio::test]
async fn rtr_for_unknown_user_answers_user_unknown() {
    let fx = fixture();
    let answer = fx.handler.handle_request(rtr("ghost@example.com")).await.unwrap();
    assert_eq!(answer.experimental_result_code().unwrap(), ERROR_USER_UNKNOWN);
}
