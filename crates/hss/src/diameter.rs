use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use hsgw_diameter::cx::{self, CxAddress};
use hsgw_diameter::dictionary::{
    AVP_SERVER_NAME, AVP_USER_DATA, AVP_WILDCARDED_PUBLIC_IDENTITY,
    DIAMETER_AUTHORIZATION_REJECTED, DIAMETER_SUCCESS, DIAMETER_TOO_BUSY,
    DIAMETER_UNABLE_TO_DELIVER, ERROR_IDENTITIES_DONT_MATCH, ERROR_IDENTITY_NOT_REGISTERED,
    ERROR_IN_ASSIGNMENT_TYPE, ERROR_ROAMING_NOT_ALLOWED, ERROR_USER_UNKNOWN,
};
use hsgw_diameter::message::new_session_id;
use hsgw_diameter::{DiameterError, DiameterStack, Message};
use hsgw_middleware::Metrics;
use hsgw_types::{AkaAuthVector, AuthVector, DigestAuthVector};

use crate::api::{
    HssConnection, LocationInfoAnswer, LocationInfoRequest, MultimediaAuthAnswer,
    MultimediaAuthRequest, ResultCode, SchemeConfig, ServerAssignmentAnswer,
    ServerAssignmentRequest, UserAuthAnswer, UserAuthRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Mar,
    Uar,
    Lir,
    Sar,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Mar => "MAR",
            Command::Uar => "UAR",
            Command::Lir => "LIR",
            Command::Sar => "SAR",
        }
    }
}

// The fixed Cx result-code classification. Experimental 5032 is a success
// on LIA only (the verbatim code still reaches the control plane), and
// 5065 signals a wildcard replacement on SAA only.
fn map_result(command: Command, answer: &Message) -> (ResultCode, u32) {
    if let Some(code) = answer.result_code() {
        let mapped = match code {
            DIAMETER_SUCCESS => ResultCode::Success,
            DIAMETER_TOO_BUSY => ResultCode::Timeout,
            DIAMETER_UNABLE_TO_DELIVER => ResultCode::ServerUnavailable,
            DIAMETER_AUTHORIZATION_REJECTED => ResultCode::Forbidden,
            _ => ResultCode::Unknown,
        };
        return (mapped, code);
    }

    if let Some(code) = answer.experimental_result_code() {
        let mapped = match code {
            ERROR_USER_UNKNOWN | ERROR_IDENTITIES_DONT_MATCH => ResultCode::NotFound,
            ERROR_ROAMING_NOT_ALLOWED => ResultCode::Forbidden,
            ERROR_IDENTITY_NOT_REGISTERED if command == Command::Lir => ResultCode::Success,
            ERROR_IN_ASSIGNMENT_TYPE if command == Command::Sar => ResultCode::NewWildcard,
            _ => ResultCode::Unknown,
        };
        return (mapped, code);
    }

    (ResultCode::Unknown, 0)
}

/// HSS connection over a Cx Diameter peer.
pub struct DiameterHssConnection {
    stack: Arc<DiameterStack>,
    address: CxAddress,
    schemes: SchemeConfig,
    metrics: Arc<Metrics>,
}

impl DiameterHssConnection {
    pub fn new(
        stack: Arc<DiameterStack>,
        address: CxAddress,
        schemes: SchemeConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { stack, address, schemes, metrics }
    }

    fn session_id(&self) -> String {
        new_session_id(&self.address.origin_host)
    }

    async fn exchange(&self, command: Command, request: Message) -> (ResultCode, u32, Option<Message>) {
        match self.stack.send_request(request).await {
            Ok(answer) => {
                let (result_code, verbatim) = map_result(command, &answer);
                self.metrics.record_cx_result(command.name(), verbatim as i32);
                (result_code, verbatim, Some(answer))
            }
            Err(DiameterError::Timeout) => {
                self.metrics.record_cx_result(command.name(), 0);
                (ResultCode::Timeout, 0, None)
            }
            Err(e) => {
                tracing::warn!(command = command.name(), error = %e, "Cx send failed");
                self.metrics.record_cx_result(command.name(), 0);
                (ResultCode::ServerUnavailable, 0, None)
            }
        }
    }

    fn observe(&self, command: Command, start: Instant) {
        let seconds = start.elapsed().as_secs_f64();
        self.metrics.hss_latency.observe(seconds);
        match command {
            Command::Mar => self.metrics.hss_digest_latency.observe(seconds),
            Command::Sar => self.metrics.hss_subscription_latency.observe(seconds),
            _ => {}
        }
    }

    fn parse_maa(&self, answer: &Message) -> MultimediaAuthAnswer {
        let Some(item) = cx::auth_data_item(answer) else {
            return MultimediaAuthAnswer {
                result_code: ResultCode::Unknown,
                scheme: None,
                auth_vector: None,
            };
        };
        let scheme = item.scheme.clone().unwrap_or_default();

        if scheme == self.schemes.digest {
            let Some(ha1) = item.digest_ha1 else {
                return MultimediaAuthAnswer {
                    result_code: ResultCode::Unknown,
                    scheme: Some(scheme),
                    auth_vector: None,
                };
            };
            let vector = DigestAuthVector::new(
                ha1,
                item.digest_realm.unwrap_or_default(),
                item.digest_qop,
            );
            return MultimediaAuthAnswer {
                result_code: ResultCode::Success,
                scheme: Some(scheme),
                auth_vector: Some(AuthVector::Digest(vector)),
            };
        }

        let aka_version = if scheme == self.schemes.akav1 {
            Some(1)
        } else if scheme == self.schemes.akav2 {
            Some(2)
        } else {
            None
        };

        match aka_version {
            Some(version) => {
                match (
                    item.authenticate,
                    item.authorization,
                    item.confidentiality_key,
                    item.integrity_key,
                ) {
                    (Some(challenge), Some(response), Some(ck), Some(ik)) => {
                        let vector =
                            AkaAuthVector::from_raw(version, &challenge, &response, &ck, &ik);
                        MultimediaAuthAnswer {
                            result_code: ResultCode::Success,
                            scheme: Some(scheme),
                            auth_vector: Some(AuthVector::Aka(vector)),
                        }
                    }
                    _ => {
                        tracing::warn!(%scheme, "AKA answer missing challenge material");
                        MultimediaAuthAnswer {
                            result_code: ResultCode::Unknown,
                            scheme: Some(scheme),
                            auth_vector: None,
                        }
                    }
                }
            }
            None => {
                tracing::info!(%scheme, "HSS returned unconsumable authentication scheme");
                MultimediaAuthAnswer {
                    result_code: ResultCode::UnknownAuthScheme,
                    scheme: Some(scheme),
                    auth_vector: None,
                }
            }
        }
    }
}

#[async_trait]
impl HssConnection for DiameterHssConnection {
    async fn send_multimedia_auth(
        &self,
        request: MultimediaAuthRequest,
    ) -> MultimediaAuthAnswer {
        let start = Instant::now();
        let message = cx::multimedia_auth_request(
            &self.address,
            &self.session_id(),
            &request.impi,
            &request.impu,
            &request.scheme,
            request.authorization.as_deref(),
            &request.server_name,
        );

        let (result_code, _, answer) = self.exchange(Command::Mar, message).await;
        let result = match (result_code, answer) {
            (ResultCode::Success, Some(answer)) => self.parse_maa(&answer),
            (result_code, _) => {
                MultimediaAuthAnswer { result_code, scheme: None, auth_vector: None }
            }
        };
        self.observe(Command::Mar, start);
        result
    }

    async fn send_user_auth(&self, request: UserAuthRequest) -> UserAuthAnswer {
        let start = Instant::now();
        let message = cx::user_authorization_request(
            &self.address,
            &self.session_id(),
            &request.impi,
            &request.impu,
            &request.visited_network,
            request.auth_type.code(),
        );

        let (result_code, diameter_result, answer) = self.exchange(Command::Uar, message).await;
        let result = UserAuthAnswer {
            result_code,
            diameter_result,
            server_name: answer.as_ref().and_then(|a| a.str_avp(AVP_SERVER_NAME)),
            server_capabilities: answer.as_ref().and_then(cx::server_capabilities),
        };
        self.observe(Command::Uar, start);
        result
    }

    async fn send_location_info(&self, request: LocationInfoRequest) -> LocationInfoAnswer {
        let start = Instant::now();
        let message = cx::location_info_request(&self.address, &self.session_id(), &request.impu);

        let (result_code, diameter_result, answer) = self.exchange(Command::Lir, message).await;
        let result = LocationInfoAnswer {
            result_code,
            diameter_result,
            server_name: answer.as_ref().and_then(|a| a.str_avp(AVP_SERVER_NAME)),
            server_capabilities: answer.as_ref().and_then(cx::server_capabilities),
            wildcard_impu: answer
                .as_ref()
                .and_then(|a| a.str_avp(AVP_WILDCARDED_PUBLIC_IDENTITY)),
        };
        self.observe(Command::Lir, start);
        result
    }

    async fn send_server_assignment(
        &self,
        request: ServerAssignmentRequest,
    ) -> ServerAssignmentAnswer {
        let start = Instant::now();
        let message = cx::server_assignment_request(
            &self.address,
            &self.session_id(),
            request.impi.as_deref(),
            &request.impu,
            &request.server_name,
            request.assignment_type.code(),
            request.wildcard_impu.as_deref(),
        );

        let (result_code, _, answer) = self.exchange(Command::Sar, message).await;
        let result = ServerAssignmentAnswer {
            result_code,
            service_profile: answer
                .as_ref()
                .and_then(|a| a.str_avp(AVP_USER_DATA))
                .unwrap_or_default(),
            charging_addresses: answer
                .as_ref()
                .and_then(cx::charging_addresses)
                .unwrap_or_default(),
            wildcard_impu: answer
                .as_ref()
                .and_then(|a| a.str_avp(AVP_WILDCARDED_PUBLIC_IDENTITY)),
        };
        self.observe(Command::Sar, start);
        result
    }
}
