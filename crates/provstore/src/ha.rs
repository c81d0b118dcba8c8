use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::backend::{Column, ConsistencyLevel, ProvBackend};
use crate::{ProvError, Result};

const BLACKLIST_FOR: Duration = Duration::from_secs(30);

/// High-availability row reader over a set of provisioning-store hosts.
///
/// Reads start at the configured consistency level against the first live
/// host. On timeout or unavailability the same host is retried at level
/// ONE; a second failure blacklists the host and the read moves to the
/// next one. NotFound and non-retryable errors surface immediately.
pub struct HaReader {
    hosts: Vec<Arc<dyn ProvBackend>>,
    start_level: ConsistencyLevel,
    blacklist: Mutex<HashMap<String, Instant>>,
}

impl HaReader {
    pub fn new(hosts: Vec<Arc<dyn ProvBackend>>, start_level: ConsistencyLevel) -> Self {
        Self { hosts, start_level, blacklist: Mutex::new(HashMap::new()) }
    }

    async fn host_order(&self) -> Vec<Arc<dyn ProvBackend>> {
        let mut blacklist = self.blacklist.lock().await;
        let now = Instant::now();
        blacklist.retain(|_, until| *until > now);

        let (live, parked): (Vec<_>, Vec<_>) = self
            .hosts
            .iter()
            .cloned()
            .partition(|host| !blacklist.contains_key(host.id()));

        // Blacklisted hosts stay usable as a last resort.
        live.into_iter().chain(parked).collect()
    }

    async fn park(&self, host: &Arc<dyn ProvBackend>) {
        tracing::warn!(host = host.id(), "Blacklisting provisioning-store host");
        self.blacklist
            .lock()
            .await
            .insert(host.id().to_string(), Instant::now() + BLACKLIST_FOR);
    }

    pub async fn ha_get_columns(
        &self,
        family: &str,
        key: &str,
        columns: &[String],
    ) -> Result<Vec<Column>> {
        let mut last_error = ProvError::Unavailable;

        for host in self.host_order().await {
            match host.get_columns(family, key, columns, self.start_level).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => {
                    last_error = e.clone();
                    tracing::debug!(host = host.id(), error = %e, "Read failed at start level");

                    if self.start_level == ConsistencyLevel::Two {
                        // Escalation step: same host, weaker consistency.
                        match host.get_columns(family, key, columns, ConsistencyLevel::One).await
                        {
                            Ok(result) => return Ok(result),
                            Err(e) if e.is_retryable() => last_error = e,
                            Err(e) => return Err(e),
                        }
                    }

                    self.park(&host).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}
