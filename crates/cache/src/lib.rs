//! hsgw-cache: the implicit-registration-set cache
//!
//! Maintains the tri-relational subscriber model (default IMPU, associated
//! IMPUs, IMPI mappings) across one local and any number of remote CAS
//! replicas. Default/associated/IMPI relations form a three-way graph with
//! back-pointers; this crate models them as three keyed tables with healing
//! invariants rather than pointer cycles, and treats convergence as the
//! correctness criterion.

pub mod cache;
pub mod error;
pub mod irs;
pub mod subscription;

pub use cache::IrsCache;
pub use error::CacheError;
pub use irs::{ImplicitRegistrationSet, TrackedState};
pub use subscription::ImsSubscription;

pub type Result<T> = std::result::Result<T, CacheError>;
