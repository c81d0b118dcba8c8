use async_trait::async_trait;
use bytes::Bytes;
use redis::Script;

use crate::kv::{KvError, KvStore, KvValue};

// Each record is a hash of {cas, v} so the token survives in the store
// itself; redis has no native memcached-style cas, so the conditional
// operations run as Lua for atomicity. Expiry rides on EXPIREAT.

const ADD_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'cas', 1, 'v', ARGV[1])
redis.call('EXPIREAT', KEYS[1], ARGV[2])
return 1
"#;

const SET_SCRIPT: &str = r#"
local cur = redis.call('HGET', KEYS[1], 'cas')
if not cur then
  return -1
end
if cur ~= ARGV[2] then
  return 0
end
redis.call('HSET', KEYS[1], 'cas', cur + 1, 'v', ARGV[1])
redis.call('EXPIREAT', KEYS[1], ARGV[3])
return 1
"#;

const SET_UNCONDITIONAL_SCRIPT: &str = r#"
local cur = redis.call('HGET', KEYS[1], 'cas')
local next = 1
if cur then
  next = cur + 1
end
redis.call('HSET', KEYS[1], 'cas', next, 'v', ARGV[1])
redis.call('EXPIREAT', KEYS[1], ARGV[2])
return 1
"#;

const DELETE_SCRIPT: &str = r#"
local cur = redis.call('HGET', KEYS[1], 'cas')
if not cur then
  return -1
end
if cur ~= ARGV[1] then
  return 0
end
redis.call('DEL', KEYS[1])
return 1
"#;

/// Redis-backed CAS replica.
pub struct RedisKvStore {
    name: String,
    conn: redis::aio::MultiplexedConnection,
}

impl RedisKvStore {
    pub async fn new(name: impl Into<String>, redis_url: &str) -> Result<Self, KvError> {
        let name = name.into();
        let client =
            redis::Client::open(redis_url).map_err(|e| KvError::Backend(e.to_string()))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;

        // Test connection
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;

        tracing::info!(replica = %name, "Connected to Redis KV replica");
        Ok(Self { name, conn })
    }

    fn map_script_result(code: i64) -> Result<(), KvError> {
        match code {
            1 => Ok(()),
            0 => Err(KvError::Contention),
            _ => Err(KvError::NotFound),
        }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<KvValue>, KvError> {
        let mut conn = self.conn.clone();
        let (cas, value): (Option<u64>, Option<Vec<u8>>) = redis::cmd("HMGET")
            .arg(key)
            .arg("cas")
            .arg("v")
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;

        match (cas, value) {
            (Some(cas), Some(value)) => Ok(Some(KvValue { value: Bytes::from(value), cas })),
            _ => Ok(None),
        }
    }

    async fn add(&self, key: &str, value: Bytes, expiry: u64) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let code: i64 = Script::new(ADD_SCRIPT)
            .key(key)
            .arg(value.as_ref())
            .arg(expiry)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Self::map_script_result(code)
    }

    async fn set(&self, key: &str, value: Bytes, cas: u64, expiry: u64) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let code: i64 = Script::new(SET_SCRIPT)
            .key(key)
            .arg(value.as_ref())
            .arg(cas)
            .arg(expiry)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Self::map_script_result(code)
    }

    async fn set_unconditional(
        &self,
        key: &str,
        value: Bytes,
        expiry: u64,
    ) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let code: i64 = Script::new(SET_UNCONDITIONAL_SCRIPT)
            .key(key)
            .arg(value.as_ref())
            .arg(expiry)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Self::map_script_result(code)
    }

    async fn delete(&self, key: &str, cas: u64) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let code: i64 = Script::new(DELETE_SCRIPT)
            .key(key)
            .arg(cas)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Self::map_script_result(code)
    }
}
