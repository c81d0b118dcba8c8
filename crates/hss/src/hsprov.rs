use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use hsgw_diameter::dictionary::DIAMETER_SUCCESS;
use hsgw_middleware::Metrics;
use hsgw_provstore::{HsProvStore, ProvError};
use hsgw_types::AuthVector;

use crate::api::{
    HssConnection, LocationInfoAnswer, LocationInfoRequest, MultimediaAuthAnswer,
    MultimediaAuthRequest, ResultCode, SchemeConfig, ServerAssignmentAnswer,
    ServerAssignmentRequest, UserAuthAnswer, UserAuthRequest,
};

// Store failures other than a clean miss look like an unresponsive HSS to
// the caller, which retries exactly as it would on a Cx timeout.
fn map_prov_error(e: &ProvError) -> ResultCode {
    match e {
        ProvError::NotFound => ResultCode::NotFound,
        _ => ResultCode::Timeout,
    }
}

/// HSS connection backed by the provisioning store, for deployments with
/// no Cx peer. Digest only; registration state is inferred from the
/// presence of subscription XML.
pub struct HsProvHssConnection {
    store: Arc<HsProvStore>,
    /// The configured local S-CSCF, returned wherever a Cx HSS would name
    /// a server.
    server_name: String,
    schemes: SchemeConfig,
    metrics: Arc<Metrics>,
}

impl HsProvHssConnection {
    pub fn new(
        store: Arc<HsProvStore>,
        server_name: String,
        schemes: SchemeConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { store, server_name, schemes, metrics }
    }
}

#[async_trait]
impl HssConnection for HsProvHssConnection {
    async fn send_multimedia_auth(
        &self,
        request: MultimediaAuthRequest,
    ) -> MultimediaAuthAnswer {
        let start = Instant::now();

        // AKA needs sequence-number state only a real HSS has.
        if request.scheme != self.schemes.digest {
            tracing::info!(scheme = %request.scheme, "Provisioning store cannot serve non-digest schemes");
            return MultimediaAuthAnswer {
                result_code: ResultCode::UnknownAuthScheme,
                scheme: Some(request.scheme),
                auth_vector: None,
            };
        }

        let impu = (!request.impu.is_empty()).then_some(request.impu.as_str());
        let result = match self.store.get_auth_vector(&request.impi, impu).await {
            Ok(vector) => MultimediaAuthAnswer {
                result_code: ResultCode::Success,
                scheme: Some(request.scheme.clone()),
                auth_vector: Some(AuthVector::Digest(vector)),
            },
            Err(e) => {
                tracing::debug!(impi = %request.impi, error = %e, "Auth vector lookup failed");
                MultimediaAuthAnswer {
                    result_code: map_prov_error(&e),
                    scheme: None,
                    auth_vector: None,
                }
            }
        };

        let seconds = start.elapsed().as_secs_f64();
        self.metrics.hss_latency.observe(seconds);
        self.metrics.hss_digest_latency.observe(seconds);
        result
    }

    async fn send_user_auth(&self, _request: UserAuthRequest) -> UserAuthAnswer {
        // No Cx peer to authorize against: answer with the local server.
        UserAuthAnswer {
            result_code: ResultCode::Success,
            diameter_result: DIAMETER_SUCCESS,
            server_name: Some(self.server_name.clone()),
            server_capabilities: None,
        }
    }

    async fn send_location_info(&self, request: LocationInfoRequest) -> LocationInfoAnswer {
        let start = Instant::now();

        let result = match self.store.get_reg_data(&request.impu).await {
            Ok(data) if !data.service_profile.is_empty() => LocationInfoAnswer {
                result_code: ResultCode::Success,
                diameter_result: DIAMETER_SUCCESS,
                server_name: Some(self.server_name.clone()),
                server_capabilities: None,
                wildcard_impu: None,
            },
            // A row without subscription XML means nobody is registered
            // here.
            Ok(_) => LocationInfoAnswer {
                result_code: ResultCode::NotFound,
                diameter_result: 0,
                server_name: None,
                server_capabilities: None,
                wildcard_impu: None,
            },
            Err(e) => LocationInfoAnswer {
                result_code: map_prov_error(&e),
                diameter_result: 0,
                server_name: None,
                server_capabilities: None,
                wildcard_impu: None,
            },
        };

        self.metrics.hss_latency.observe(start.elapsed().as_secs_f64());
        result
    }

    async fn send_server_assignment(
        &self,
        request: ServerAssignmentRequest,
    ) -> ServerAssignmentAnswer {
        let start = Instant::now();

        let result = if request.assignment_type.is_deregistration() {
            // Nothing to tear down in a read-only store.
            ServerAssignmentAnswer {
                result_code: ResultCode::Success,
                service_profile: String::new(),
                charging_addresses: Default::default(),
                wildcard_impu: None,
            }
        } else {
            match self.store.get_reg_data(&request.impu).await {
                Ok(data) if !data.service_profile.is_empty() => ServerAssignmentAnswer {
                    result_code: ResultCode::Success,
                    service_profile: data.service_profile,
                    charging_addresses: data.charging_addresses,
                    wildcard_impu: None,
                },
                Ok(_) => ServerAssignmentAnswer {
                    result_code: ResultCode::NotFound,
                    service_profile: String::new(),
                    charging_addresses: Default::default(),
                    wildcard_impu: None,
                },
                Err(e) => ServerAssignmentAnswer {
                    result_code: map_prov_error(&e),
                    service_profile: String::new(),
                    charging_addresses: Default::default(),
                    wildcard_impu: None,
                },
            }
        };

        let seconds = start.elapsed().as_secs_f64();
        self.metrics.hss_latency.observe(seconds);
        self.metrics.hss_subscription_latency.observe(seconds);
        result
    }
}
