use std::sync::Arc;

use hsgw_middleware::WorkerPool;
use hsgw_types::{ChargingAddresses, DigestAuthVector};

use crate::backend::{
    CF_IMPI, CF_IMPU, COL_DIGEST_HA1, COL_DIGEST_QOP, COL_DIGEST_REALM, COL_IMS_SUB_XML,
    COL_PRIMARY_CCF, COL_PRIMARY_ECF, COL_PUBLIC_ID_PREFIX, COL_SECONDARY_CCF, COL_SECONDARY_ECF,
};
use crate::ha::HaReader;
use crate::{ProvError, Result};

/// A provisioning-store read, dispatched through the worker pool.
#[derive(Debug, Clone)]
pub enum ProvOp {
    GetRegData { impu: String },
    GetAuthVector { impi: String, impu: Option<String> },
}

impl ProvOp {
    fn label(&self) -> &'static str {
        match self {
            ProvOp::GetRegData { .. } => "prov_get_reg_data",
            ProvOp::GetAuthVector { .. } => "prov_get_auth_vector",
        }
    }
}

/// Registration data of record: the subscription XML plus charging
/// addresses, primary-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegData {
    pub service_profile: String,
    pub charging_addresses: ChargingAddresses,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvResult {
    RegData(RegData),
    AuthVector(DigestAuthVector),
}

/// Provisioning-store client: owns the HA reader and services operations
/// on the shared worker pool.
pub struct HsProvStore {
    reader: Arc<HaReader>,
    pool: Arc<WorkerPool>,
}

impl HsProvStore {
    pub fn new(reader: Arc<HaReader>, pool: Arc<WorkerPool>) -> Self {
        Self { reader, pool }
    }

    pub async fn perform(&self, op: ProvOp) -> Result<ProvResult> {
        let reader = Arc::clone(&self.reader);
        let label = op.label();
        self.pool
            .execute(label, async move { dispatch(&reader, op).await })
            .await
            .map_err(|e| ProvError::Unknown(format!("worker pool: {e}")))?
    }

    pub async fn get_reg_data(&self, impu: &str) -> Result<RegData> {
        match self.perform(ProvOp::GetRegData { impu: impu.to_string() }).await? {
            ProvResult::RegData(data) => Ok(data),
            ProvResult::AuthVector(_) => Err(ProvError::Unknown("mismatched result".into())),
        }
    }

    pub async fn get_auth_vector(
        &self,
        impi: &str,
        impu: Option<&str>,
    ) -> Result<DigestAuthVector> {
        let op = ProvOp::GetAuthVector {
            impi: impi.to_string(),
            impu: impu.map(str::to_string),
        };
        match self.perform(op).await? {
            ProvResult::AuthVector(av) => Ok(av),
            ProvResult::RegData(_) => Err(ProvError::Unknown("mismatched result".into())),
        }
    }
}

// The single worker-loop switch over operation variants.
async fn dispatch(reader: &HaReader, op: ProvOp) -> Result<ProvResult> {
    match op {
        ProvOp::GetRegData { impu } => get_reg_data(reader, &impu).await.map(ProvResult::RegData),
        ProvOp::GetAuthVector { impi, impu } => get_auth_vector(reader, &impi, impu.as_deref())
            .await
            .map(ProvResult::AuthVector),
    }
}

async fn get_reg_data(reader: &HaReader, impu: &str) -> Result<RegData> {
    tracing::debug!(impu, "Issuing registration-data read");
    let columns: Vec<String> = [
        COL_IMS_SUB_XML,
        COL_PRIMARY_CCF,
        COL_SECONDARY_CCF,
        COL_PRIMARY_ECF,
        COL_SECONDARY_ECF,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    let result = reader.ha_get_columns(CF_IMPU, impu, &columns).await?;

    let mut data = RegData::default();
    let mut primary_ccf = None;
    let mut secondary_ccf = None;
    let mut primary_ecf = None;
    let mut secondary_ecf = None;

    for column in result {
        match column.name.as_str() {
            COL_IMS_SUB_XML => data.service_profile = column.value,
            COL_PRIMARY_CCF if !column.value.is_empty() => primary_ccf = Some(column.value),
            COL_SECONDARY_CCF if !column.value.is_empty() => secondary_ccf = Some(column.value),
            COL_PRIMARY_ECF if !column.value.is_empty() => primary_ecf = Some(column.value),
            COL_SECONDARY_ECF if !column.value.is_empty() => secondary_ecf = Some(column.value),
            _ => {}
        }
    }

    data.charging_addresses.ccfs = [primary_ccf, secondary_ccf].into_iter().flatten().collect();
    data.charging_addresses.ecfs = [primary_ecf, secondary_ecf].into_iter().flatten().collect();
    Ok(data)
}

async fn get_auth_vector(
    reader: &HaReader,
    impi: &str,
    impu: Option<&str>,
) -> Result<DigestAuthVector> {
    tracing::debug!(impi, "Looking for authentication vector");
    let mut columns: Vec<String> = [COL_DIGEST_HA1, COL_DIGEST_REALM, COL_DIGEST_QOP]
        .iter()
        .map(|c| c.to_string())
        .collect();

    // When asked to verify the IMPI has an associated public identity, the
    // dynamic membership column is requested as well.
    let public_id_column = impu.map(|impu| format!("{COL_PUBLIC_ID_PREFIX}{impu}"));
    if let Some(column) = &public_id_column {
        columns.push(column.clone());
    }

    let result = reader.ha_get_columns(CF_IMPI, impi, &columns).await?;

    let mut ha1 = None;
    let mut realm = String::new();
    let mut qop = None;
    let mut public_id_found = false;

    for column in result {
        if column.name == COL_DIGEST_HA1 {
            ha1 = Some(column.value);
        } else if column.name == COL_DIGEST_REALM {
            realm = column.value;
        } else if column.name == COL_DIGEST_QOP {
            qop = Some(column.value);
        } else if Some(&column.name) == public_id_column.as_ref() {
            public_id_found = true;
        }
    }

    if public_id_column.is_some() && !public_id_found {
        tracing::debug!(impi, "IMPI exists but is not associated with the requested IMPU");
        return Err(ProvError::NotFound);
    }

    match ha1 {
        // HA1 cannot be defaulted; a row without it is a miss.
        None => {
            tracing::debug!(impi, "HA1 column not found");
            Err(ProvError::NotFound)
        }
        Some(ha1) if ha1.is_empty() => {
            tracing::debug!(impi, "HA1 column empty");
            Err(ProvError::NotFound)
        }
        Some(ha1) => Ok(DigestAuthVector::new(ha1, realm, qop)),
    }
}
