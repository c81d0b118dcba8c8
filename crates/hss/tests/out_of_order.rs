use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use hsgw_diameter::cx::{answer_for, digest_auth_data_item, AnswerResult, CxAddress};
use hsgw_diameter::dictionary::{AVP_USER_NAME, DIAMETER_SUCCESS};
use hsgw_diameter::transport::ChannelTransport;
use hsgw_diameter::{DiameterStack, Message};
use hsgw_hss::{
    DiameterHssConnection, HssConnection, MultimediaAuthRequest, ResultCode, SchemeConfig,
};
use hsgw_middleware::Metrics;

fn mar_for(impi: &str) -> MultimediaAuthRequest {
    MultimediaAuthRequest {
        impi: impi.into(),
        impu: format!("sip:{impi}"),
        scheme: "SIP Digest".into(),
        authorization: None,
        server_name: "sip:scscf1.example.com".into(),
    }
}

// Answers arrive in the reverse order of the requests; session-id matching
// must hand each caller its own answer.
#[tokio::test]
async fn reordered_answers_reach_their_own_transactions() {
    let (transport, mut wire) = ChannelTransport::new();
    let (inject, incoming) = mpsc::channel(8);
    let stack = DiameterStack::new(transport, incoming, Duration::from_secs(1));
    let connection = Arc::new(DiameterHssConnection::new(
        stack,
        CxAddress {
            origin_host: "hs1.example.com".into(),
            origin_realm: "example.com".into(),
            dest_realm: "hss.example.com".into(),
            dest_host: "hss1.hss.example.com".into(),
        },
        SchemeConfig::default(),
        Arc::new(Metrics::new()),
    ));

    let first = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.send_multimedia_auth(mar_for("alice@example.com")).await })
    };
    let request_a = wire.recv().await.unwrap();

    let second = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.send_multimedia_auth(mar_for("bob@example.com")).await })
    };
    let request_b = wire.recv().await.unwrap();

    // The fake HSS answers bob first, each answer tagged with a distinct
    // HA1 so delivery can be verified per caller.
    let answer = |request: &Message| {
        let impi = request.str_avp(AVP_USER_NAME).unwrap();
        answer_for(request, AnswerResult::Code(DIAMETER_SUCCESS)).with_avp(digest_auth_data_item(
            "SIP Digest",
            &format!("ha1-of-{impi}"),
            "example.com",
            "auth",
        ))
    };
    inject.send(answer(&request_b)).await.unwrap();
    inject.send(answer(&request_a)).await.unwrap();

    let answer_a = first.await.unwrap();
    let answer_b = second.await.unwrap();

    assert_eq!(answer_a.result_code, ResultCode::Success);
    assert_eq!(
        answer_a.auth_vector.unwrap().as_digest().unwrap().ha1,
        "ha1-of-alice@example.com"
    );
    assert_eq!(answer_b.result_code, ResultCode::Success);
    assert_eq!(
        answer_b.auth_vector.unwrap().as_digest().unwrap().ha1,
        "ha1-of-bob@example.com"
    );
}
