//! hsgw-middleware: Pluggable infrastructure for the subscriber-state core
//!
//! Provides the CAS-capable key-value client trait with in-memory and Redis
//! backends, the bounded worker pool that services store operations, and the
//! prometheus counter/latency tables updated on every completion.

pub mod kv;
pub mod memory;
pub mod metrics;
pub mod pool;
pub mod redis_store;

pub use kv::{KvError, KvStore, KvValue};
pub use memory::InMemoryKvStore;
pub use metrics::Metrics;
pub use pool::{NullObserver, PoolError, PoolObserver, WorkerPool};
pub use redis_store::RedisKvStore;
