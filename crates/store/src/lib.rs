//! hsgw-store: Typed layer over the CAS-capable KV client
//!
//! Serializes default-IMPU records, associated-IMPU pointers and IMPI
//! mappings to a self-describing JSON document whose on-wire shape is part
//! of the compatibility surface: a rolling upgrade must be able to read
//! records written by older nodes.

pub mod error;
pub mod impu_store;
pub mod records;

pub use error::StoreError;
pub use impu_store::ImpuStore;
pub use records::{AssociatedImpu, DefaultImpu, ImpiMapping, Impu};

pub type Result<T> = std::result::Result<T, StoreError>;
