//! hsgw-types: Shared subscriber-state domain types
//!
//! Registration state, charging addresses, authentication vectors and the
//! Cx enumerations shared between the cache, the provisioning store and the
//! HSS connection layers.

pub mod auth;
pub mod charging;
pub mod error;
pub mod profile;
pub mod registration;
pub mod server;

pub use auth::{AkaAuthVector, AuthVector, DigestAuthVector};
pub use charging::ChargingAddresses;
pub use error::TypesError;
pub use profile::extract_identities;
pub use registration::RegistrationState;
pub use server::{ServerAssignmentType, ServerCapabilities, UserAuthorizationType};

pub type Result<T> = std::result::Result<T, TypesError>;
