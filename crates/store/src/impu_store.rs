use bytes::Bytes;
use std::sync::Arc;

use hsgw_middleware::KvStore;

use crate::records::{Impu, ImpiMapping};
use crate::Result;

// IMPU and IMPI identities share one key space in the backing store, so
// records are namespaced by kind.
fn impu_key(impu: &str) -> String {
    format!("impu/{impu}")
}

fn impi_key(impi: &str) -> String {
    format!("impi/{impi}")
}

/// Typed record operations against a single KV replica.
pub struct ImpuStore {
    kv: Arc<dyn KvStore>,
}

impl ImpuStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Replica label, used for origin tracking on read handles.
    pub fn name(&self) -> &str {
        self.kv.name()
    }

    pub async fn get_impu(&self, impu: &str) -> Result<Option<Impu>> {
        match self.kv.get(&impu_key(impu)).await? {
            None => Ok(None),
            Some(read) => {
                let mut record: Impu = serde_json::from_slice(&read.value)?;
                record.set_cas(read.cas);
                Ok(Some(record))
            }
        }
    }

    /// Create a record that must not already exist.
    pub async fn add_impu(&self, record: &Impu) -> Result<()> {
        let body = Bytes::from(serde_json::to_vec(record)?);
        self.kv.add(&impu_key(record.impu()), body, record.expiry()).await?;
        Ok(())
    }

    /// Conditionally replace a record using its read-time token.
    pub async fn set_impu(&self, record: &Impu) -> Result<()> {
        let body = Bytes::from(serde_json::to_vec(record)?);
        self.kv
            .set(&impu_key(record.impu()), body, record.cas(), record.expiry())
            .await?;
        Ok(())
    }

    /// Blind overwrite, reserved for the associated-IMPU pointer path where
    /// a lost update merely re-adds the same pointer.
    pub async fn set_impu_without_cas(&self, record: &Impu) -> Result<()> {
        let body = Bytes::from(serde_json::to_vec(record)?);
        self.kv
            .set_unconditional(&impu_key(record.impu()), body, record.expiry())
            .await?;
        Ok(())
    }

    pub async fn delete_impu(&self, record: &Impu) -> Result<()> {
        self.kv.delete(&impu_key(record.impu()), record.cas()).await?;
        Ok(())
    }

    pub async fn get_impi_mapping(&self, impi: &str) -> Result<Option<ImpiMapping>> {
        match self.kv.get(&impi_key(impi)).await? {
            None => Ok(None),
            Some(read) => {
                let mut mapping: ImpiMapping = serde_json::from_slice(&read.value)?;
                mapping.cas = read.cas;
                Ok(Some(mapping))
            }
        }
    }

    /// Store a mapping. A mapping that has never been read from this
    /// replica (`cas == 0`) is created, which contends with any concurrent
    /// creator; an existing mapping is replaced conditionally.
    pub async fn set_impi_mapping(&self, mapping: &ImpiMapping) -> Result<()> {
        let body = Bytes::from(serde_json::to_vec(mapping)?);
        let key = impi_key(&mapping.impi);
        if mapping.cas == 0 {
            self.kv.add(&key, body, mapping.expiry).await?;
        } else {
            self.kv.set(&key, body, mapping.cas, mapping.expiry).await?;
        }
        Ok(())
    }

    pub async fn delete_impi_mapping(&self, mapping: &ImpiMapping) -> Result<()> {
        self.kv.delete(&impi_key(&mapping.impi), mapping.cas).await?;
        Ok(())
    }
}
