use hsgw_provstore::ConsistencyLevel;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HssMode {
    Diameter,
    ProvisioningStore,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hss_mode: HssMode,

    // Cx addressing
    pub origin_host: String,
    pub origin_realm: String,
    pub dest_realm: String,
    pub dest_host: String,
    /// Resolved socket address of the Diameter peer (peer resolution is
    /// handled outside this process).
    pub hss_peer_addr: String,
    pub diameter_timeout_ms: u64,

    // Authentication-scheme literals used on MAR/MAA
    pub digest_scheme: String,
    pub aka_scheme: String,
    pub akav2_scheme: String,

    // KV replicas
    pub kv_local_addr: String,
    pub kv_remote_addrs: Vec<String>,

    // Worker pool
    pub worker_threads: usize,
    /// 0 means unbounded (enqueue never blocks).
    pub max_queue: usize,

    /// Default TTL written on cache refresh.
    pub reg_ttl_s: u64,

    // Provisioning-store mode
    pub server_name: String,
    pub provstore_urls: Vec<String>,
    pub consistency_level_read: ConsistencyLevel,

    pub metrics_addr: String,
}

fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let hss_mode = match get("HSS_MODE").as_deref() {
            None | Some("diameter") => HssMode::Diameter,
            Some("provisioning_store") => HssMode::ProvisioningStore,
            Some(other) => return Err(Error::Config(format!("unknown HSS_MODE '{other}'"))),
        };

        let consistency_level_read = match get("CONSISTENCY_LEVEL_READ").as_deref() {
            None | Some("two") => ConsistencyLevel::Two,
            Some("one") => ConsistencyLevel::One,
            Some(other) => {
                return Err(Error::Config(format!("unknown CONSISTENCY_LEVEL_READ '{other}'")))
            }
        };

        let diameter_timeout_ms = match get("DIAMETER_TIMEOUT_MS") {
            Some(v) => v
                .parse()
                .map_err(|_| Error::Config(format!("bad DIAMETER_TIMEOUT_MS '{v}'")))?,
            None => 1000,
        };

        let worker_threads = match get("WORKER_THREADS") {
            Some(v) => {
                v.parse().map_err(|_| Error::Config(format!("bad WORKER_THREADS '{v}'")))?
            }
            None => 8,
        };

        let max_queue = match get("MAX_QUEUE") {
            Some(v) => v.parse().map_err(|_| Error::Config(format!("bad MAX_QUEUE '{v}'")))?,
            None => 1024,
        };

        let reg_ttl_s = match get("REG_TTL_S") {
            Some(v) => v.parse().map_err(|_| Error::Config(format!("bad REG_TTL_S '{v}'")))?,
            None => 3600,
        };

        let kv_local_addr = get("KV_LOCAL_ADDR")
            .unwrap_or_else(|| "redis://localhost:6379".into());

        let config = Self {
            hss_mode,
            origin_host: get("ORIGIN_HOST").unwrap_or_else(|| "hsgw.local".into()),
            origin_realm: get("ORIGIN_REALM").unwrap_or_else(|| "local".into()),
            dest_realm: get("DEST_REALM").unwrap_or_default(),
            dest_host: get("DEST_HOST").unwrap_or_default(),
            hss_peer_addr: get("HSS_PEER_ADDR").unwrap_or_default(),
            diameter_timeout_ms,
            digest_scheme: get("DIGEST_SCHEME").unwrap_or_else(|| "SIP Digest".into()),
            aka_scheme: get("AKA_SCHEME").unwrap_or_else(|| "Digest-AKAv1-MD5".into()),
            akav2_scheme: get("AKAV2_SCHEME").unwrap_or_else(|| "Digest-AKAv2-SHA-256".into()),
            kv_local_addr,
            kv_remote_addrs: parse_list(get("KV_REMOTE_ADDRS")),
            worker_threads,
            max_queue,
            reg_ttl_s,
            server_name: get("SERVER_NAME").unwrap_or_default(),
            provstore_urls: parse_list(get("PROVSTORE_URLS")),
            consistency_level_read,
            metrics_addr: get("METRICS_ADDR").unwrap_or_else(|| "0.0.0.0:9090".into()),
        };

        if config.hss_mode == HssMode::Diameter && config.hss_peer_addr.is_empty() {
            return Err(Error::Config("HSS_PEER_ADDR required in diameter mode".into()));
        }
        if config.hss_mode == HssMode::ProvisioningStore && config.provstore_urls.is_empty() {
            return Err(Error::Config(
                "PROVSTORE_URLS required in provisioning_store mode".into(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_in_diameter_mode() {
        let config = Config::from_lookup(lookup(&[("HSS_PEER_ADDR", "hss1:3868")])).unwrap();
        assert_eq!(config.hss_mode, HssMode::Diameter);
        assert_eq!(config.diameter_timeout_ms, 1000);
        assert_eq!(config.reg_ttl_s, 3600);
        assert_eq!(config.digest_scheme, "SIP Digest");
        assert_eq!(config.consistency_level_read, ConsistencyLevel::Two);
        assert!(config.kv_remote_addrs.is_empty());
    }

    #[test]
    fn remote_replica_list_is_comma_separated() {
        let config = Config::from_lookup(lookup(&[
            ("HSS_PEER_ADDR", "hss1:3868"),
            ("KV_REMOTE_ADDRS", "redis://site-b:6379, redis://site-c:6379"),
        ]))
        .unwrap();
        assert_eq!(
            config.kv_remote_addrs,
            vec!["redis://site-b:6379", "redis://site-c:6379"]
        );
    }

    #[test]
    fn provisioning_store_mode_requires_urls() {
        let err = Config::from_lookup(lookup(&[("HSS_MODE", "provisioning_store")])).unwrap_err();
        assert!(err.to_string().contains("PROVSTORE_URLS"));

        let config = Config::from_lookup(lookup(&[
            ("HSS_MODE", "provisioning_store"),
            ("PROVSTORE_URLS", "postgres://cass-1/hs"),
            ("CONSISTENCY_LEVEL_READ", "one"),
        ]))
        .unwrap();
        assert_eq!(config.hss_mode, HssMode::ProvisioningStore);
        assert_eq!(config.consistency_level_read, ConsistencyLevel::One);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Config::from_lookup(lookup(&[("HSS_MODE", "carrier-pigeon")])).unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
