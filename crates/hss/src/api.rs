use async_trait::async_trait;

use hsgw_types::{
    AuthVector, ChargingAddresses, ServerAssignmentType, ServerCapabilities,
    UserAuthorizationType,
};

/// Caller-visible outcome of an HSS exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    ServerUnavailable,
    NotFound,
    Forbidden,
    Timeout,
    /// Server-assignment only: the HSS supplied a replacement wildcard
    /// identity the caller must retry with.
    NewWildcard,
    UnknownAuthScheme,
    Unknown,
}

/// Authentication-scheme literals used on MAR/MAA.
#[derive(Debug, Clone)]
pub struct SchemeConfig {
    pub digest: String,
    pub akav1: String,
    pub akav2: String,
    pub unknown: String,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            digest: "SIP Digest".into(),
            akav1: "Digest-AKAv1-MD5".into(),
            akav2: "Digest-AKAv2-SHA-256".into(),
            unknown: "Unknown".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultimediaAuthRequest {
    pub impi: String,
    pub impu: String,
    /// Scheme literal to request, as resolved against the configured
    /// scheme names.
    pub scheme: String,
    /// Resync token on AKA re-authentication.
    pub authorization: Option<Vec<u8>>,
    pub server_name: String,
}

#[derive(Debug, Clone)]
pub struct MultimediaAuthAnswer {
    pub result_code: ResultCode,
    pub scheme: Option<String>,
    pub auth_vector: Option<AuthVector>,
}

#[derive(Debug, Clone)]
pub struct UserAuthRequest {
    pub impi: String,
    pub impu: String,
    pub visited_network: String,
    pub auth_type: UserAuthorizationType,
}

#[derive(Debug, Clone)]
pub struct UserAuthAnswer {
    pub result_code: ResultCode,
    /// The Diameter result surfaced verbatim to the control plane.
    pub diameter_result: u32,
    pub server_name: Option<String>,
    pub server_capabilities: Option<ServerCapabilities>,
}

#[derive(Debug, Clone)]
pub struct LocationInfoRequest {
    pub impu: String,
}

#[derive(Debug, Clone)]
pub struct LocationInfoAnswer {
    pub result_code: ResultCode,
    pub diameter_result: u32,
    pub server_name: Option<String>,
    pub server_capabilities: Option<ServerCapabilities>,
    pub wildcard_impu: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerAssignmentRequest {
    pub impi: Option<String>,
    pub impu: String,
    pub server_name: String,
    pub assignment_type: ServerAssignmentType,
    pub wildcard_impu: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerAssignmentAnswer {
    pub result_code: ResultCode,
    pub service_profile: String,
    pub charging_addresses: ChargingAddresses,
    pub wildcard_impu: Option<String>,
}

/// The four send-operations every HSS connection provides. Errors never
/// escape as host-language failures; every outcome is a typed answer with
/// a result code.
#[async_trait]
pub trait HssConnection: Send + Sync {
    async fn send_multimedia_auth(&self, request: MultimediaAuthRequest)
        -> MultimediaAuthAnswer;

    async fn send_user_auth(&self, request: UserAuthRequest) -> UserAuthAnswer;

    async fn send_location_info(&self, request: LocationInfoRequest) -> LocationInfoAnswer;

    async fn send_server_assignment(
        &self,
        request: ServerAssignmentRequest,
    ) -> ServerAssignmentAnswer;
}
