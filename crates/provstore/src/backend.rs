use async_trait::async_trait;

use crate::Result;

// Column family and column names; these mirror the provisioning schema and
// are part of the compatibility surface.
pub const CF_IMPU: &str = "impu";
pub const CF_IMPI: &str = "impi";

pub const COL_IMS_SUB_XML: &str = "ims_subscription_xml";
pub const COL_PRIMARY_CCF: &str = "primary_ccf";
pub const COL_SECONDARY_CCF: &str = "secondary_ccf";
pub const COL_PRIMARY_ECF: &str = "primary_ecf";
pub const COL_SECONDARY_ECF: &str = "secondary_ecf";

pub const COL_DIGEST_HA1: &str = "digest_ha1";
pub const COL_DIGEST_REALM: &str = "digest_realm";
pub const COL_DIGEST_QOP: &str = "digest_qop";
pub const COL_PUBLIC_ID_PREFIX: &str = "public_id_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    One,
    Two,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: String,
}

impl Column {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// One provisioning-store host.
///
/// Returns the subset of `columns` present on the row. A row with none of
/// the requested columns is `NotFound`.
#[async_trait]
pub trait ProvBackend: Send + Sync {
    fn id(&self) -> &str;

    async fn get_columns(
        &self,
        family: &str,
        key: &str,
        columns: &[String],
        level: ConsistencyLevel,
    ) -> Result<Vec<Column>>;
}
