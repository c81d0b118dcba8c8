use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hsgw_cache::IrsCache;
use hsgw_diameter::cx::CxAddress;
use hsgw_diameter::{DiameterStack, TcpTransport};
use hsgw_hss::{CxPushHandler, DiameterHssConnection, HsProvHssConnection, HssConnection, SchemeConfig};
use hsgw_middleware::{Metrics, PoolObserver, RedisKvStore, WorkerPool};
use hsgw_provstore::{HaReader, HsProvStore, PostgresProvBackend, ProvBackend};
use hsgw_store::ImpuStore;

mod config;
mod error;

use config::{Config, HssMode};
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Prometheus metrics endpoint
async fn metrics_handler(
    axum::extract::State(registry): axum::extract::State<Registry>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buf = Vec::new();
    encoder.encode(&metric_families, &mut buf).unwrap_or_default();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buf,
    )
}

fn scheme_config(config: &Config) -> SchemeConfig {
    SchemeConfig {
        digest: config.digest_scheme.clone(),
        akav1: config.aka_scheme.clone(),
        akav2: config.akav2_scheme.clone(),
        unknown: "Unknown".into(),
    }
}

async fn build_cache(config: &Config, metrics: Arc<Metrics>) -> Result<Arc<IrsCache>> {
    let local = ImpuStore::new(Arc::new(
        RedisKvStore::new("local", &config.kv_local_addr).await?,
    ));

    let mut remotes = Vec::with_capacity(config.kv_remote_addrs.len());
    for (index, addr) in config.kv_remote_addrs.iter().enumerate() {
        let name = format!("remote-{index}");
        remotes.push(ImpuStore::new(Arc::new(RedisKvStore::new(name, addr).await?)));
    }

    Ok(Arc::new(IrsCache::new(local, remotes, metrics)))
}

async fn build_hss_connection(
    config: &Config,
    cache: Arc<IrsCache>,
    pool: Arc<WorkerPool>,
    metrics: Arc<Metrics>,
) -> Result<Arc<dyn HssConnection>> {
    match config.hss_mode {
        HssMode::Diameter => {
            let (transport, incoming) = TcpTransport::connect(&config.hss_peer_addr).await?;
            let stack = DiameterStack::new(
                transport,
                incoming,
                Duration::from_millis(config.diameter_timeout_ms),
            );
            stack
                .set_request_handler(CxPushHandler::new(cache, Arc::clone(&metrics)))
                .await;

            let address = CxAddress {
                origin_host: config.origin_host.clone(),
                origin_realm: config.origin_realm.clone(),
                dest_realm: config.dest_realm.clone(),
                dest_host: config.dest_host.clone(),
            };
            Ok(Arc::new(DiameterHssConnection::new(
                stack,
                address,
                scheme_config(config),
                metrics,
            )))
        }
        HssMode::ProvisioningStore => {
            let mut hosts: Vec<Arc<dyn ProvBackend>> =
                Vec::with_capacity(config.provstore_urls.len());
            for (index, url) in config.provstore_urls.iter().enumerate() {
                hosts.push(Arc::new(PostgresProvBackend::new(format!("prov-{index}"), url)?));
            }
            let reader = Arc::new(HaReader::new(hosts, config.consistency_level_read));
            let store = Arc::new(HsProvStore::new(reader, pool));
            Ok(Arc::new(HsProvHssConnection::new(
                store,
                config.server_name.clone(),
                scheme_config(config),
                metrics,
            )))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        mode = ?config.hss_mode,
        kv_local = %config.kv_local_addr,
        kv_remotes = config.kv_remote_addrs.len(),
        workers = config.worker_threads,
        max_queue = config.max_queue,
        reg_ttl_s = config.reg_ttl_s,
        "Starting hsgwd"
    );

    let metrics = Arc::new(Metrics::new());

    // Spawn metrics HTTP server
    let registry = metrics.registry.clone();
    let metrics_addr = config.metrics_addr.clone();
    tokio::spawn(async move {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(|| async { "ok" }))
            .with_state(registry);

        match tokio::net::TcpListener::bind(&metrics_addr).await {
            Ok(listener) => {
                tracing::info!(addr = %metrics_addr, "Metrics server listening");
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "Metrics server failed");
                }
            }
            Err(e) => tracing::error!(addr = %metrics_addr, error = %e, "Metrics bind failed"),
        }
    });

    let pool = Arc::new(WorkerPool::new(
        config.worker_threads,
        config.max_queue,
        Arc::clone(&metrics) as Arc<dyn PoolObserver>,
    ));

    let cache = build_cache(&config, Arc::clone(&metrics)).await?;
    let connection =
        build_hss_connection(&config, Arc::clone(&cache), Arc::clone(&pool), Arc::clone(&metrics))
            .await?;

    tracing::info!("hsgwd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    drop(connection);
    drop(cache);
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.shutdown().await;
    }

    Ok(())
}
