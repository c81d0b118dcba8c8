//! hsgw-hss: the HSS connection layer
//!
//! One interface with four send-operations (multimedia-auth, user-auth,
//! location-info, server-assignment) and two interchangeable
//! implementations: a Cx Diameter client against a real HSS, and a
//! provisioning-store reader for deployments without a Cx peer. Also owns
//! the handling of HSS-initiated pushes (PPR/RTR) against the IRS cache.

pub mod api;
pub mod diameter;
pub mod hsprov;
pub mod push;

pub use api::{
    HssConnection, LocationInfoAnswer, LocationInfoRequest, MultimediaAuthAnswer,
    MultimediaAuthRequest, ResultCode, SchemeConfig, ServerAssignmentAnswer,
    ServerAssignmentRequest, UserAuthAnswer, UserAuthRequest,
};
pub use diameter::DiameterHssConnection;
pub use hsprov::HsProvHssConnection;
pub use push::CxPushHandler;
