use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolError, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::backend::{
    Column, ConsistencyLevel, ProvBackend, CF_IMPI, CF_IMPU, COL_DIGEST_HA1, COL_DIGEST_QOP,
    COL_DIGEST_REALM, COL_IMS_SUB_XML, COL_PRIMARY_CCF, COL_PRIMARY_ECF, COL_PUBLIC_ID_PREFIX,
    COL_SECONDARY_CCF, COL_SECONDARY_ECF,
};
use crate::{ProvError, Result};

const IMPU_QUERY: &str = "SELECT ims_subscription_xml, primary_ccf, secondary_ccf, \
     primary_ecf, secondary_ecf FROM impu WHERE impu = $1";
const IMPI_QUERY: &str = "SELECT digest_ha1, digest_realm, digest_qop FROM impi WHERE impi = $1";
const PUBLIC_ID_QUERY: &str = "SELECT 1 FROM impi_public_id WHERE impi = $1 AND impu = $2";

fn map_pool_error(e: PoolError) -> ProvError {
    match e {
        PoolError::Timeout(_) => ProvError::Timeout,
        other => ProvError::Connection(other.to_string()),
    }
}

fn map_query_error(e: tokio_postgres::Error) -> ProvError {
    ProvError::Unknown(e.to_string())
}

/// One provisioning-store host backed by postgres.
///
/// The wide-column `public_id_<impu>` membership markers are modeled as
/// rows of an `impi_public_id` table; everything else maps column-for-
/// column. Consistency levels are advisory against a single-node store.
pub struct PostgresProvBackend {
    id: String,
    pool: Pool,
}

impl PostgresProvBackend {
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self> {
        let config: tokio_postgres::Config = url
            .parse()
            .map_err(|e: tokio_postgres::Error| ProvError::Connection(e.to_string()))?;
        let manager = Manager::from_config(
            config,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );
        let pool = Pool::builder(manager)
            .max_size(16)
            .build()
            .map_err(|e| ProvError::Connection(e.to_string()))?;

        Ok(Self { id: id.into(), pool })
    }

    async fn impu_columns(&self, key: &str, columns: &[String]) -> Result<Vec<Column>> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        let row = client
            .query_opt(IMPU_QUERY, &[&key])
            .await
            .map_err(map_query_error)?
            .ok_or(ProvError::NotFound)?;

        let mut result = Vec::new();
        for name in columns {
            match name.as_str() {
                COL_IMS_SUB_XML | COL_PRIMARY_CCF | COL_SECONDARY_CCF | COL_PRIMARY_ECF
                | COL_SECONDARY_ECF => {
                    let value: Option<String> =
                        row.try_get(name.as_str()).map_err(map_query_error)?;
                    if let Some(value) = value {
                        result.push(Column::new(name.clone(), value));
                    }
                }
                _ => {}
            }
        }
        Ok(result)
    }

    async fn impi_columns(&self, key: &str, columns: &[String]) -> Result<Vec<Column>> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        let row = client
            .query_opt(IMPI_QUERY, &[&key])
            .await
            .map_err(map_query_error)?;

        let mut result = Vec::new();
        for name in columns {
            match name.as_str() {
                COL_DIGEST_HA1 | COL_DIGEST_REALM | COL_DIGEST_QOP => {
                    if let Some(row) = &row {
                        let value: Option<String> =
                            row.try_get(name.as_str()).map_err(map_query_error)?;
                        if let Some(value) = value {
                            result.push(Column::new(name.clone(), value));
                        }
                    }
                }
                name if name.starts_with(COL_PUBLIC_ID_PREFIX) => {
                    let impu = &name[COL_PUBLIC_ID_PREFIX.len()..];
                    let marker = client
                        .query_opt(PUBLIC_ID_QUERY, &[&key, &impu])
                        .await
                        .map_err(map_query_error)?;
                    if marker.is_some() {
                        result.push(Column::new(name.clone(), ""));
                    }
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl ProvBackend for PostgresProvBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_columns(
        &self,
        family: &str,
        key: &str,
        columns: &[String],
        _level: ConsistencyLevel,
    ) -> Result<Vec<Column>> {
        let result = match family {
            CF_IMPU => self.impu_columns(key, columns).await?,
            CF_IMPI => self.impi_columns(key, columns).await?,
            other => return Err(ProvError::Unknown(format!("unknown column family {other}"))),
        };

        if result.is_empty() {
            return Err(ProvError::NotFound);
        }
        Ok(result)
    }
}
