//! Typed construction and parsing of the Cx command subset.

use bytes::Bytes;

use hsgw_types::{ChargingAddresses, ServerCapabilities};

use crate::avp::{self, Avp};
use crate::dictionary::*;
use crate::message::Message;

/// Cx addressing configuration stamped on every outbound request.
#[derive(Debug, Clone)]
pub struct CxAddress {
    pub origin_host: String,
    pub origin_realm: String,
    pub dest_realm: String,
    pub dest_host: String,
}

fn request_skeleton(code: u32, address: &CxAddress, session_id: &str) -> Message {
    Message::request(code, CX_APPLICATION_ID)
        .with_avp(Avp::utf8(AVP_SESSION_ID, None, session_id))
        .with_avp(Avp::grouped(
            AVP_VENDOR_SPECIFIC_APPLICATION_ID,
            None,
            vec![
                Avp::unsigned32(AVP_VENDOR_ID, None, VENDOR_3GPP),
                Avp::unsigned32(AVP_AUTH_APPLICATION_ID, None, CX_APPLICATION_ID),
            ],
        ))
        .with_avp(Avp::enumerated(AVP_AUTH_SESSION_STATE, None, NO_STATE_MAINTAINED))
        .with_avp(Avp::utf8(AVP_ORIGIN_HOST, None, &address.origin_host))
        .with_avp(Avp::utf8(AVP_ORIGIN_REALM, None, &address.origin_realm))
        .with_avp(Avp::utf8(AVP_DESTINATION_REALM, None, &address.dest_realm))
        .with_avp(Avp::utf8(AVP_DESTINATION_HOST, None, &address.dest_host))
}

#[allow(clippy::too_many_arguments)]
pub fn multimedia_auth_request(
    address: &CxAddress,
    session_id: &str,
    impi: &str,
    impu: &str,
    scheme: &str,
    authorization: Option<&[u8]>,
    server_name: &str,
) -> Message {
    let mut auth_data = vec![Avp::utf8(AVP_SIP_AUTHENTICATION_SCHEME, Some(VENDOR_3GPP), scheme)];
    if let Some(auts) = authorization {
        auth_data.push(Avp::octets(
            AVP_SIP_AUTHORIZATION,
            Some(VENDOR_3GPP),
            Bytes::copy_from_slice(auts),
        ));
    }

    request_skeleton(CMD_MULTIMEDIA_AUTH, address, session_id)
        .with_avp(Avp::utf8(AVP_USER_NAME, None, impi))
        .with_avp(Avp::utf8(AVP_PUBLIC_IDENTITY, Some(VENDOR_3GPP), impu))
        .with_avp(Avp::unsigned32(AVP_SIP_NUMBER_AUTH_ITEMS, Some(VENDOR_3GPP), 1))
        .with_avp(Avp::grouped(AVP_SIP_AUTH_DATA_ITEM, Some(VENDOR_3GPP), auth_data))
        .with_avp(Avp::utf8(AVP_SERVER_NAME, Some(VENDOR_3GPP), server_name))
}

pub fn user_authorization_request(
    address: &CxAddress,
    session_id: &str,
    impi: &str,
    impu: &str,
    visited_network: &str,
    auth_type: i32,
) -> Message {
    request_skeleton(CMD_USER_AUTHORIZATION, address, session_id)
        .with_avp(Avp::utf8(AVP_USER_NAME, None, impi))
        .with_avp(Avp::utf8(AVP_PUBLIC_IDENTITY, Some(VENDOR_3GPP), impu))
        .with_avp(Avp::octets(
            AVP_VISITED_NETWORK_IDENTIFIER,
            Some(VENDOR_3GPP),
            Bytes::copy_from_slice(visited_network.as_bytes()),
        ))
        .with_avp(Avp::enumerated(AVP_USER_AUTHORIZATION_TYPE, Some(VENDOR_3GPP), auth_type))
}

pub fn location_info_request(address: &CxAddress, session_id: &str, impu: &str) -> Message {
    request_skeleton(CMD_LOCATION_INFO, address, session_id)
        .with_avp(Avp::utf8(AVP_PUBLIC_IDENTITY, Some(VENDOR_3GPP), impu))
}

#[allow(clippy::too_many_arguments)]
pub fn server_assignment_request(
    address: &CxAddress,
    session_id: &str,
    impi: Option<&str>,
    impu: &str,
    server_name: &str,
    assignment_type: i32,
    wildcard_impu: Option<&str>,
) -> Message {
    let mut message = request_skeleton(CMD_SERVER_ASSIGNMENT, address, session_id);
    if let Some(impi) = impi {
        message.add_avp(Avp::utf8(AVP_USER_NAME, None, impi));
    }
    message.add_avp(Avp::utf8(AVP_PUBLIC_IDENTITY, Some(VENDOR_3GPP), impu));
    message.add_avp(Avp::utf8(AVP_SERVER_NAME, Some(VENDOR_3GPP), server_name));
    message.add_avp(Avp::enumerated(
        AVP_SERVER_ASSIGNMENT_TYPE,
        Some(VENDOR_3GPP),
        assignment_type,
    ));
    message.add_avp(Avp::enumerated(AVP_USER_DATA_ALREADY_AVAILABLE, Some(VENDOR_3GPP), 0));
    if let Some(wildcard) = wildcard_impu {
        message.add_avp(Avp::utf8(AVP_WILDCARDED_PUBLIC_IDENTITY, Some(VENDOR_3GPP), wildcard));
    }
    message
}

/// The Result-Code or Experimental-Result an answer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerResult {
    Code(u32),
    Experimental(u32),
}

impl AnswerResult {
    pub fn avp(&self) -> Avp {
        match self {
            AnswerResult::Code(code) => Avp::unsigned32(AVP_RESULT_CODE, None, *code),
            AnswerResult::Experimental(code) => Avp::grouped(
                AVP_EXPERIMENTAL_RESULT,
                None,
                vec![
                    Avp::unsigned32(AVP_VENDOR_ID, None, VENDOR_3GPP),
                    Avp::unsigned32(AVP_EXPERIMENTAL_RESULT_CODE, None, *code),
                ],
            ),
        }
    }
}

/// Answer template carrying the session id and result of the request it
/// answers. Used by this node when acting as the server side (PPA/RTA) and
/// by test fakes standing in for the HSS.
pub fn answer_for(request: &Message, result: AnswerResult) -> Message {
    let mut answer = request.answer();
    if let Some(session_id) = request.session_id() {
        answer.add_avp(Avp::utf8(AVP_SESSION_ID, None, &session_id));
    }
    answer.add_avp(result.avp());
    answer
}

/// Parsed SIP-Auth-Data-Item contents.
#[derive(Debug, Clone, Default)]
pub struct AuthDataItem {
    pub scheme: Option<String>,
    pub authenticate: Option<Bytes>,
    pub authorization: Option<Bytes>,
    pub confidentiality_key: Option<Bytes>,
    pub integrity_key: Option<Bytes>,
    pub digest_ha1: Option<String>,
    pub digest_realm: Option<String>,
    pub digest_qop: Option<String>,
}

pub fn auth_data_item(message: &Message) -> Option<AuthDataItem> {
    let members = message.avp(AVP_SIP_AUTH_DATA_ITEM)?.as_grouped().ok()?;
    let mut item = AuthDataItem::default();

    for member in &members {
        match member.code {
            AVP_SIP_AUTHENTICATION_SCHEME => item.scheme = member.as_utf8().ok(),
            AVP_SIP_AUTHENTICATE => item.authenticate = Some(member.data.clone()),
            AVP_SIP_AUTHORIZATION => item.authorization = Some(member.data.clone()),
            AVP_CONFIDENTIALITY_KEY => item.confidentiality_key = Some(member.data.clone()),
            AVP_INTEGRITY_KEY => item.integrity_key = Some(member.data.clone()),
            AVP_SIP_DIGEST_AUTHENTICATE => {
                if let Ok(digest) = member.as_grouped() {
                    item.digest_ha1 =
                        avp::find(&digest, AVP_DIGEST_HA1).and_then(|a| a.as_utf8().ok());
                    item.digest_realm =
                        avp::find(&digest, AVP_DIGEST_REALM).and_then(|a| a.as_utf8().ok());
                    item.digest_qop =
                        avp::find(&digest, AVP_DIGEST_QOP).and_then(|a| a.as_utf8().ok());
                }
            }
            _ => {}
        }
    }
    Some(item)
}

/// Build the SIP-Auth-Data-Item for a digest MAA.
pub fn digest_auth_data_item(scheme: &str, ha1: &str, realm: &str, qop: &str) -> Avp {
    Avp::grouped(
        AVP_SIP_AUTH_DATA_ITEM,
        Some(VENDOR_3GPP),
        vec![
            Avp::utf8(AVP_SIP_AUTHENTICATION_SCHEME, Some(VENDOR_3GPP), scheme),
            Avp::grouped(
                AVP_SIP_DIGEST_AUTHENTICATE,
                Some(VENDOR_3GPP),
                vec![
                    Avp::utf8(AVP_DIGEST_REALM, None, realm),
                    Avp::utf8(AVP_DIGEST_QOP, None, qop),
                    Avp::utf8(AVP_DIGEST_HA1, None, ha1),
                ],
            ),
        ],
    )
}

/// Build the SIP-Auth-Data-Item for an AKA MAA, raw octets as the HSS
/// supplies them.
pub fn aka_auth_data_item(
    scheme: &str,
    challenge: &[u8],
    response: &[u8],
    crypt_key: &[u8],
    integrity_key: &[u8],
) -> Avp {
    Avp::grouped(
        AVP_SIP_AUTH_DATA_ITEM,
        Some(VENDOR_3GPP),
        vec![
            Avp::utf8(AVP_SIP_AUTHENTICATION_SCHEME, Some(VENDOR_3GPP), scheme),
            Avp::octets(AVP_SIP_AUTHENTICATE, Some(VENDOR_3GPP), Bytes::copy_from_slice(challenge)),
            Avp::octets(AVP_SIP_AUTHORIZATION, Some(VENDOR_3GPP), Bytes::copy_from_slice(response)),
            Avp::octets(
                AVP_CONFIDENTIALITY_KEY,
                Some(VENDOR_3GPP),
                Bytes::copy_from_slice(crypt_key),
            ),
            Avp::octets(
                AVP_INTEGRITY_KEY,
                Some(VENDOR_3GPP),
                Bytes::copy_from_slice(integrity_key),
            ),
        ],
    )
}

pub fn server_capabilities(message: &Message) -> Option<ServerCapabilities> {
    let members = message.avp(AVP_SERVER_CAPABILITIES)?.as_grouped().ok()?;
    let mut capabilities = ServerCapabilities::default();
    for member in &members {
        match member.code {
            AVP_MANDATORY_CAPABILITY => {
                if let Ok(value) = member.as_unsigned32() {
                    capabilities.mandatory.push(value as i32);
                }
            }
            AVP_OPTIONAL_CAPABILITY => {
                if let Ok(value) = member.as_unsigned32() {
                    capabilities.optional.push(value as i32);
                }
            }
            AVP_SERVER_NAME => {
                if let Ok(value) = member.as_utf8() {
                    capabilities.server_name = value;
                }
            }
            _ => {}
        }
    }
    Some(capabilities)
}

pub fn server_capabilities_avp(capabilities: &ServerCapabilities) -> Avp {
    let mut members = Vec::new();
    for value in &capabilities.mandatory {
        members.push(Avp::unsigned32(AVP_MANDATORY_CAPABILITY, Some(VENDOR_3GPP), *value as u32));
    }
    for value in &capabilities.optional {
        members.push(Avp::unsigned32(AVP_OPTIONAL_CAPABILITY, Some(VENDOR_3GPP), *value as u32));
    }
    if !capabilities.server_name.is_empty() {
        members.push(Avp::utf8(AVP_SERVER_NAME, Some(VENDOR_3GPP), &capabilities.server_name));
    }
    Avp::grouped(AVP_SERVER_CAPABILITIES, Some(VENDOR_3GPP), members)
}

pub fn charging_addresses(message: &Message) -> Option<ChargingAddresses> {
    let members = message.avp(AVP_CHARGING_INFORMATION)?.as_grouped().ok()?;
    let mut addresses = ChargingAddresses::default();
    let mut secondary_ccf = None;
    let mut secondary_ecf = None;

    for member in &members {
        let Ok(value) = member.as_utf8() else { continue };
        match member.code {
            AVP_PRIMARY_CHARGING_COLLECTION_FUNCTION_NAME => addresses.ccfs.insert(0, value),
            AVP_SECONDARY_CHARGING_COLLECTION_FUNCTION_NAME => secondary_ccf = Some(value),
            AVP_PRIMARY_EVENT_CHARGING_FUNCTION_NAME => addresses.ecfs.insert(0, value),
            AVP_SECONDARY_EVENT_CHARGING_FUNCTION_NAME => secondary_ecf = Some(value),
            _ => {}
        }
    }
    addresses.ccfs.extend(secondary_ccf);
    addresses.ecfs.extend(secondary_ecf);
    Some(addresses)
}

pub fn charging_information_avp(addresses: &ChargingAddresses) -> Avp {
    let mut members = Vec::new();
    if let Some(ccf) = addresses.primary_ccf() {
        members.push(Avp::utf8(
            AVP_PRIMARY_CHARGING_COLLECTION_FUNCTION_NAME,
            Some(VENDOR_3GPP),
            ccf,
        ));
    }
    if let Some(ccf) = addresses.secondary_ccf() {
        members.push(Avp::utf8(
            AVP_SECONDARY_CHARGING_COLLECTION_FUNCTION_NAME,
            Some(VENDOR_3GPP),
            ccf,
        ));
    }
    if let Some(ecf) = addresses.primary_ecf() {
        members.push(Avp::utf8(AVP_PRIMARY_EVENT_CHARGING_FUNCTION_NAME, Some(VENDOR_3GPP), ecf));
    }
    if let Some(ecf) = addresses.secondary_ecf() {
        members.push(Avp::utf8(
            AVP_SECONDARY_EVENT_CHARGING_FUNCTION_NAME,
            Some(VENDOR_3GPP),
            ecf,
        ));
    }
    Avp::grouped(AVP_CHARGING_INFORMATION, Some(VENDOR_3GPP), members)
}

/// All Public-Identity AVPs on a message (RTR carries several).
pub fn public_identities(message: &Message) -> Vec<String> {
    message
        .avps_with(AVP_PUBLIC_IDENTITY)
        .filter_map(|avp| avp.as_utf8().ok())
        .collect()
}

/// Private identities named by an Associated-Identities group.
pub fn associated_identities(message: &Message) -> Vec<String> {
    let Some(avp) = message.avp(AVP_ASSOCIATED_IDENTITIES) else { return Vec::new() };
    let Ok(members) = avp.as_grouped() else { return Vec::new() };
    members
        .iter()
        .filter(|member| member.code == AVP_USER_NAME)
        .filter_map(|member| member.as_utf8().ok())
        .collect()
}

/// Deregistration-Reason code on an RTR.
pub fn deregistration_reason(message: &Message) -> Option<i32> {
    let members = message.avp(AVP_DEREGISTRATION_REASON)?.as_grouped().ok()?;
    avp::find(&members, AVP_REASON_CODE)?.as_enumerated().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> CxAddress {
        CxAddress {
            origin_host: "hs1.example.com".into(),
            origin_realm: "example.com".into(),
            dest_realm: "hss.example.com".into(),
            dest_host: "hss1.hss.example.com".into(),
        }
    }

    #[test]
    fn mar_carries_addressing_and_scheme() {
        let mar = multimedia_auth_request(
            &address(),
            "hs1;1;1",
            "alice@example.com",
            "sip:alice@example.com",
            "SIP Digest",
            None,
            "sip:scscf1.example.com",
        );
        assert_eq!(mar.code, CMD_MULTIMEDIA_AUTH);
        assert!(mar.is_request());
        assert_eq!(mar.str_avp(AVP_DESTINATION_REALM).unwrap(), "hss.example.com");
        assert_eq!(mar.str_avp(AVP_DESTINATION_HOST).unwrap(), "hss1.hss.example.com");

        let item = auth_data_item(&mar).unwrap();
        assert_eq!(item.scheme.unwrap(), "SIP Digest");
        assert!(item.authorization.is_none());
    }

    #[test]
    fn mar_resync_carries_authorization() {
        let mar = multimedia_auth_request(
            &address(),
            "hs1;1;2",
            "alice@example.com",
            "sip:alice@example.com",
            "Digest-AKAv1-MD5",
            Some(b"auts-blob"),
            "sip:scscf1.example.com",
        );
        let item = auth_data_item(&mar).unwrap();
        assert_eq!(item.authorization.unwrap(), Bytes::from_static(b"auts-blob"));
    }

    #[test]
    fn digest_item_round_trips() {
        let answer = Message::request(CMD_MULTIMEDIA_AUTH, CX_APPLICATION_ID)
            .answer()
            .with_avp(digest_auth_data_item("SIP Digest", "ha1secret", "example.com", "auth"));
        let item = auth_data_item(&answer).unwrap();
        assert_eq!(item.digest_ha1.unwrap(), "ha1secret");
        assert_eq!(item.digest_realm.unwrap(), "example.com");
        assert_eq!(item.digest_qop.unwrap(), "auth");
    }

    #[test]
    fn aka_item_round_trips_raw_octets() {
        let answer = Message::request(CMD_MULTIMEDIA_AUTH, CX_APPLICATION_ID)
            .answer()
            .with_avp(aka_auth_data_item("Digest-AKAv1-MD5", b"challenge", b"response", b"ck", b"ik"));
        let item = auth_data_item(&answer).unwrap();
        assert_eq!(item.authenticate.unwrap(), Bytes::from_static(b"challenge"));
        assert_eq!(item.authorization.unwrap(), Bytes::from_static(b"response"));
        assert_eq!(item.confidentiality_key.unwrap(), Bytes::from_static(b"ck"));
        assert_eq!(item.integrity_key.unwrap(), Bytes::from_static(b"ik"));
    }

    #[test]
    fn server_capabilities_round_trip() {
        let capabilities = ServerCapabilities {
            mandatory: vec![1, 2],
            optional: vec![3],
            server_name: "sip:scscf2.example.com".into(),
        };
        let message = Message::request(CMD_USER_AUTHORIZATION, CX_APPLICATION_ID)
            .answer()
            .with_avp(server_capabilities_avp(&capabilities));
        assert_eq!(server_capabilities(&message).unwrap(), capabilities);
    }

    #[test]
    fn charging_information_round_trip_orders_primary_first() {
        let addresses = ChargingAddresses::new(
            vec!["ccf1".into(), "ccf2".into()],
            vec!["ecf1".into(), "ecf2".into()],
        );
        let message = Message::request(CMD_PUSH_PROFILE, CX_APPLICATION_ID)
            .with_avp(charging_information_avp(&addresses));
        assert_eq!(charging_addresses(&message).unwrap(), addresses);
    }

    #[test]
    fn answer_for_echoes_session_and_result() {
        let request = request_skeleton(CMD_PUSH_PROFILE, &address(), "hs1;9;9");
        let answer = answer_for(&request, AnswerResult::Code(DIAMETER_SUCCESS));
        assert!(!answer.is_request());
        assert_eq!(answer.session_id().unwrap(), "hs1;9;9");
        assert_eq!(answer.result_code().unwrap(), DIAMETER_SUCCESS);

        let rejected = answer_for(&request, AnswerResult::Experimental(ERROR_USER_UNKNOWN));
        assert_eq!(rejected.experimental_result_code().unwrap(), ERROR_USER_UNKNOWN);
    }

    #[test]
    fn associated_identities_extracts_user_names() {
        let rtr = Message::request(CMD_REGISTRATION_TERMINATION, CX_APPLICATION_ID)
            .with_avp(Avp::grouped(
                AVP_ASSOCIATED_IDENTITIES,
                Some(VENDOR_3GPP),
                vec![
                    Avp::utf8(AVP_USER_NAME, None, "alice@example.com"),
                    Avp::utf8(AVP_USER_NAME, None, "alice2@example.com"),
                ],
            ))
            .with_avp(Avp::utf8(AVP_PUBLIC_IDENTITY, Some(VENDOR_3GPP), "sip:alice@example.com"));
        assert_eq!(
            associated_identities(&rtr),
            vec!["alice@example.com", "alice2@example.com"]
        );
        assert_eq!(public_identities(&rtr), vec!["sip:alice@example.com"]);
    }
}
