use async_trait::async_trait;
use std::sync::Arc;

use hsgw_cache::{CacheError, IrsCache};
use hsgw_diameter::cx::{self, AnswerResult};
use hsgw_diameter::dictionary::{
    AVP_USER_DATA, AVP_USER_NAME, CMD_PUSH_PROFILE, CMD_REGISTRATION_TERMINATION,
    DIAMETER_SUCCESS, DIAMETER_UNABLE_TO_COMPLY, ERROR_USER_UNKNOWN,
};
use hsgw_diameter::{IncomingRequestHandler, Message};
use hsgw_middleware::Metrics;
use hsgw_types::extract_identities;

fn verbatim(result: AnswerResult) -> i32 {
    match result {
        AnswerResult::Code(code) | AnswerResult::Experimental(code) => code as i32,
    }
}

/// Services HSS-initiated Cx requests: push-profile updates and
/// registration terminations, applied to the IRS cache and acknowledged.
pub struct CxPushHandler {
    cache: Arc<IrsCache>,
    metrics: Arc<Metrics>,
}

impl CxPushHandler {
    pub fn new(cache: Arc<IrsCache>, metrics: Arc<Metrics>) -> Arc<Self> {
        Arc::new(Self { cache, metrics })
    }

    async fn handle_ppr(&self, request: &Message) -> AnswerResult {
        let Some(impi) = request.str_avp(AVP_USER_NAME) else {
            tracing::warn!("PPR without User-Name");
            return AnswerResult::Experimental(ERROR_USER_UNKNOWN);
        };

        let mut subscription = match self.cache.get_ims_subscription(&impi).await {
            Ok(subscription) => subscription,
            Err(CacheError::NotFound) => {
                tracing::info!(%impi, "PPR for IMPI with no cached state");
                return AnswerResult::Experimental(ERROR_USER_UNKNOWN);
            }
            Err(e) => {
                tracing::warn!(%impi, error = %e, "PPR subscription lookup failed");
                return AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY);
            }
        };

        if let Some(addresses) = cx::charging_addresses(request) {
            subscription.set_charging_addresses(&addresses);
        }

        if let Some(xml) = request.str_avp(AVP_USER_DATA) {
            let identities = match extract_identities(&xml) {
                Ok(identities) => identities,
                Err(e) => {
                    tracing::warn!(%impi, error = %e, "PPR user data is not a valid profile");
                    return AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY);
                }
            };

            // The pushed profile applies to the registration set whose
            // default IMPU it names; a profile for an unknown set is
            // rejected rather than guessed at.
            let mut applied = false;
            for identity in &identities {
                if let Some(irs) = subscription.irs_for_impu(identity) {
                    if let Err(e) = irs.set_service_profile(&xml) {
                        tracing::warn!(%impi, error = %e, "Failed to apply pushed profile");
                        return AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY);
                    }
                    applied = true;
                    break;
                }
            }
            if !applied {
                tracing::info!(%impi, "Pushed profile names no stored registration set");
                return AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY);
            }
        }

        match self.cache.put_ims_subscription(&mut subscription).await {
            Ok(()) => AnswerResult::Code(DIAMETER_SUCCESS),
            Err(e) => {
                tracing::warn!(%impi, error = %e, "Failed to save pushed subscription state");
                AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY)
            }
        }
    }

    async fn handle_rtr(&self, request: &Message) -> AnswerResult {
        let mut impis = Vec::new();
        if let Some(impi) = request.str_avp(AVP_USER_NAME) {
            impis.push(impi);
        }
        impis.extend(cx::associated_identities(request));
        let impus = cx::public_identities(request);

        tracing::info!(
            impis = impis.len(),
            impus = impus.len(),
            reason = ?cx::deregistration_reason(request),
            "Registration termination"
        );

        let found = if impus.is_empty() {
            self.cache.get_implicit_registration_sets_for_impis(&impis).await
        } else {
            self.cache.get_implicit_registration_sets_for_impus(&impus).await
        };

        let mut irss = match found {
            Ok(irss) => irss,
            Err(e) => {
                tracing::warn!(error = %e, "RTR registration-set lookup failed");
                return AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY);
            }
        };

        if irss.is_empty() {
            return AnswerResult::Experimental(ERROR_USER_UNKNOWN);
        }

        match self.cache.delete_implicit_registration_sets(&mut irss).await {
            Ok(()) => AnswerResult::Code(DIAMETER_SUCCESS),
            Err(e) => {
                tracing::warn!(error = %e, "RTR delete failed");
                AnswerResult::Code(DIAMETER_UNABLE_TO_COMPLY)
            }
        }
    }
}

#[async_trait]
impl IncomingRequestHandler for CxPushHandler {
    async fn handle_request(&self, request: Message) -> Option<Message> {
        let result = match request.code {
            CMD_PUSH_PROFILE => {
                let result = self.handle_ppr(&request).await;
                self.metrics.record_cx_result("PPR", verbatim(result));
                result
            }
            CMD_REGISTRATION_TERMINATION => {
                let result = self.handle_rtr(&request).await;
                self.metrics.record_cx_result("RTR", verbatim(result));
                result
            }
            other => {
                tracing::warn!(code = other, "Unexpected incoming Cx request");
                return None;
            }
        };
        Some(cx::answer_for(&request, result))
    }
}
