use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::backend::{Column, ConsistencyLevel, ProvBackend};
use crate::{ProvError, Result};

/// In-memory provisioning rows for tests and development.
pub struct MemoryProvBackend {
    id: String,
    rows: RwLock<HashMap<(String, String), HashMap<String, String>>>,
}

impl MemoryProvBackend {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), rows: RwLock::new(HashMap::new()) }
    }

    pub async fn insert_column(&self, family: &str, key: &str, column: &str, value: &str) {
        let mut rows = self.rows.write().await;
        rows.entry((family.to_string(), key.to_string()))
            .or_default()
            .insert(column.to_string(), value.to_string());
    }
}

#[async_trait]
impl ProvBackend for MemoryProvBackend {
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
        let rows = self.rows.read().await;
        let row = rows
            .get(&(family.to_string(), key.to_string()))
            .ok_or(ProvError::NotFound)?;

        let found: Vec<Column> = columns
            .iter()
            .filter_map(|name| row.get(name).map(|value| Column::new(name.clone(), value.clone())))
            .collect();

        if found.is_empty() {
            return Err(ProvError::NotFound);
        }
        Ok(found)
    }
}
