//! Redis Backend
//!
//! Two storage layouts, chosen from configuration:
//!
//! - **Native TTL** (`ttl > 0` and `inMemTTL` off): each entry is its own
//!   expiring key `prefix:type:id`, and the ids of a type are tracked in the set
//!   `prefix:type` so listing needs no key-space scan. Reads refresh the expiry.
//! - **Hash** (no TTL, or TTL kept in process): all entries of a type are fields
//!   of the hash `prefix:type`.
//!
//! Multi-key updates run as `MULTI/EXEC` pipelines so concurrent readers never
//! see an item key without its set membership or the reverse. Ids whose key
//! Redis already expired are pruned from the set by a script that re-checks
//! each key on the server.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::debug;

use super::Backend;
use crate::cache::Payload;
use crate::config::{BackendKind, CacheConfig};
use crate::error::{CacheError, Result};

// == Redis Backend ==
/// Redis storage using a lazily established connection manager.
pub struct RedisBackend {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    prefix: Option<String>,
    /// Expiry delegated to Redis, `None` in hash mode
    native_ttl_ms: Option<u64>,
}

impl RedisBackend {
    // == Constructor ==
    /// Creates a backend from `host`, `port`, `prefix`, `ttl` and `inMemTTL`.
    ///
    /// Does not connect; the connection is opened by the first operation.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let url = format!("redis://{}:{}/", config.host(), config.port());
        let client = redis::Client::open(url.as_str()).map_err(|e| {
            CacheError::Configuration(format!("invalid redis endpoint '{}': {}", url, e))
        })?;

        let ttl_seconds = config.ttl_seconds();
        let native_ttl_ms = if !config.in_mem_ttl() && ttl_seconds > 0 {
            Some(native_ttl_millis(ttl_seconds)?)
        } else {
            None
        };

        Ok(Self {
            client,
            conn: OnceCell::new(),
            prefix: config.prefix().map(str::to_string),
            native_ttl_ms,
        })
    }

    /// Returns a handle to the shared connection, connecting on first use.
    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                debug!(endpoint = ?self.client.get_connection_info().addr, "Connected to redis");
                Ok::<_, CacheError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }

    // == Keys ==
    /// Key of the type's hash (hash mode) or id set (native mode).
    fn type_key(&self, type_: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, type_),
            None => type_.to_string(),
        }
    }

    /// Key of a single expiring entry (native mode).
    fn item_key(&self, type_: &str, id: &str) -> String {
        format!("{}:{}", self.type_key(type_), id)
    }

    // == Prune ==
    /// Removes `candidates` from the id set of `type_key` whose item key is gone.
    ///
    /// Runs as one server-side script: an id stored again since it was read as
    /// missing still has its key and keeps its membership.
    async fn prune_expired(
        &self,
        conn: &mut ConnectionManager,
        type_key: &str,
        candidates: &[String],
    ) -> Result<usize> {
        let script = redis::Script::new(PRUNE_EXPIRED_IDS);
        let mut invocation = script.key(type_key);
        for id in candidates {
            invocation.arg(id);
        }
        let pruned: usize = invocation.invoke_async(conn).await?;
        Ok(pruned)
    }
}

/// Item keys are `<type key>:<id>`, matching [`RedisBackend::item_key`].
const PRUNE_EXPIRED_IDS: &str = r"
local pruned = 0
for _, id in ipairs(ARGV) do
    if redis.call('EXISTS', KEYS[1] .. ':' .. id) == 0 then
        pruned = pruned + redis.call('SREM', KEYS[1], id)
    end
end
return pruned
";

/// Converts a native TTL to the millisecond value passed to `PX`/`PEXPIRE`.
fn native_ttl_millis(ttl_seconds: u64) -> Result<u64> {
    ttl_seconds
        .checked_mul(1000)
        .filter(|ms| i64::try_from(*ms).is_ok())
        .ok_or_else(|| {
            CacheError::Configuration(format!("ttl of {} seconds is out of range", ttl_seconds))
        })
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("endpoint", &self.client.get_connection_info().addr)
            .field("prefix", &self.prefix)
            .field("native_ttl_ms", &self.native_ttl_ms)
            .field("connected", &self.conn.initialized())
            .finish()
    }
}

#[async_trait]
impl Backend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn native_ttl(&self) -> bool {
        self.native_ttl_ms.is_some()
    }

    async fn store(&self, type_: &str, id: &str, payload: Payload) -> Result<Payload> {
        let encoded = serde_json::to_string(&payload)?;
        let type_key = self.type_key(type_);
        let mut conn = self.connection().await?;

        match self.native_ttl_ms {
            Some(ttl_ms) => {
                let _: () = redis::pipe()
                    .atomic()
                    .cmd("SET")
                    .arg(self.item_key(type_, id))
                    .arg(&encoded)
                    .arg("PX")
                    .arg(ttl_ms)
                    .ignore()
                    .sadd(&type_key, id)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                conn.hset::<_, _, _, ()>(&type_key, id, &encoded).await?;
            }
        }
        Ok(payload)
    }

    async fn fetch(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        let mut conn = self.connection().await?;

        let raw: Option<String> = match self.native_ttl_ms {
            Some(ttl_ms) => {
                let item_key = self.item_key(type_, id);
                let (raw,): (Option<String>,) = redis::pipe()
                    .atomic()
                    .cmd("PEXPIRE")
                    .arg(&item_key)
                    .arg(ttl_ms)
                    .ignore()
                    .get(&item_key)
                    .query_async(&mut conn)
                    .await?;
                raw
            }
            None => conn.hget(self.type_key(type_), id).await?,
        };
        decode(raw)
    }

    async fn list(&self, type_: &str) -> Result<Vec<Payload>> {
        let map = self.map(type_).await?;
        Ok(map.into_values().collect())
    }

    async fn map(&self, type_: &str) -> Result<HashMap<String, Payload>> {
        let type_key = self.type_key(type_);
        let mut conn = self.connection().await?;

        if self.native_ttl_ms.is_none() {
            let raw: HashMap<String, String> = conn.hgetall(&type_key).await?;
            return raw
                .into_iter()
                .map(|(id, text)| -> Result<(String, Payload)> {
                    Ok((id, serde_json::from_str(&text)?))
                })
                .collect();
        }

        let ids: Vec<String> = conn.smembers(&type_key).await?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.item_key(type_, id)).collect();
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        let (map, expired) = reconcile(ids, values)?;
        if !expired.is_empty() {
            let pruned = self.prune_expired(&mut conn, &type_key, &expired).await?;
            debug!(type_key = %type_key, pruned, "Pruned expired ids");
        }
        Ok(map)
    }

    async fn remove(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        let type_key = self.type_key(type_);
        let mut conn = self.connection().await?;

        let (raw,): (Option<String>,) = match self.native_ttl_ms {
            Some(_) => {
                let item_key = self.item_key(type_, id);
                redis::pipe()
                    .atomic()
                    .get(&item_key)
                    .del(&item_key)
                    .ignore()
                    .srem(&type_key, id)
                    .ignore()
                    .query_async(&mut conn)
                    .await?
            }
            None => {
                redis::pipe()
                    .atomic()
                    .hget(&type_key, id)
                    .hdel(&type_key, id)
                    .ignore()
                    .query_async(&mut conn)
                    .await?
            }
        };
        decode(raw)
    }

    async fn clear(&self, type_: &str) -> Result<()> {
        let type_key = self.type_key(type_);
        let mut conn = self.connection().await?;

        if self.native_ttl_ms.is_some() {
            let ids: Vec<String> = conn.smembers(&type_key).await?;
            if !ids.is_empty() {
                let keys: Vec<String> = ids.iter().map(|id| self.item_key(type_, id)).collect();
                let _: () = redis::pipe()
                    .atomic()
                    .del(&keys)
                    .ignore()
                    .del(&type_key)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
                return Ok(());
            }
        }

        conn.del::<_, ()>(&type_key).await?;
        Ok(())
    }
}

/// Pairs the members of an id set with the values `MGET` returned for them.
///
/// Returns the live entries and the ids whose item key came back empty.
fn reconcile(
    ids: Vec<String>,
    values: Vec<Option<String>>,
) -> Result<(HashMap<String, Payload>, Vec<String>)> {
    let mut map = HashMap::with_capacity(ids.len());
    let mut missing = Vec::new();
    for (id, value) in ids.into_iter().zip(values) {
        match value {
            Some(text) => {
                map.insert(id, serde_json::from_str(&text)?);
            }
            None => missing.push(id),
        }
    }
    Ok((map, missing))
}

/// Parses a stored value, treating a missing value as absent.
fn decode(raw: Option<String>) -> Result<Option<Payload>> {
    Ok(raw.map(|text| serde_json::from_str(&text)).transpose()?)
}
