//! `Dragonfly` (Redis-compatible) entity store.
//!
//! Entity documents are stored as JSON with a separate version counter so
//! that compare-and-swap runs inside a Lua script without decoding JSON
//! server-side. Every multi-key write goes through one script call, which
//! `Dragonfly` executes atomically.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `entity:{id}:state` | JSON | Full entity document |
//! | `entity:{id}:version` | Integer | Version counter checked on write |
//! | `world:entities` | Set | Ids of every stored entity |
//! | `feed:kills` | List | Kill records, oldest first |
//! | `feed:history` | List | History records, oldest first |

use fred::prelude::*;

use cellblock_types::{Entity, EntityId, Feed, FeedRecord};

use crate::error::StoreError;
use crate::store::{EntityStore, StoreBatch};

/// Set of every stored entity id.
const ENTITY_INDEX_KEY: &str = "world:entities";

/// Check versions for every write, then apply writes and appends.
///
/// `KEYS`: for each write its state key then its version key, then one
/// feed key per append. `ARGV[1]` is the write count, followed by an
/// (expected version, JSON) pair per write, then one JSON record per append.
///
/// Returns 0 on success, `i` if write `i` conflicted, `-i` if it is missing.
const COMMIT_SCRIPT: &str = r"
local n = tonumber(ARGV[1])
for i = 1, n do
  local current = redis.call('GET', KEYS[2 * i])
  if not current then
    return -i
  end
  if current ~= ARGV[2 * i] then
    return i
  end
end
for i = 1, n do
  redis.call('SET', KEYS[2 * i - 1], ARGV[2 * i + 1])
  redis.call('INCR', KEYS[2 * i])
end
local feeds = #KEYS - 2 * n
for j = 1, feeds do
  redis.call('RPUSH', KEYS[2 * n + j], ARGV[2 * n + 1 + j])
end
return 0
";

/// Store a new entity unless its version key already exists.
///
/// `KEYS`: state key, version key, index key. `ARGV`: JSON, id.
const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[2]) == 1 then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1])
redis.call('SET', KEYS[2], '1')
redis.call('SADD', KEYS[3], ARGV[2])
return 1
";

fn state_key(id: EntityId) -> String {
    format!("entity:{id}:state")
}

fn version_key(id: EntityId) -> String {
    format!("entity:{id}:version")
}

fn feed_key(feed: Feed) -> String {
    format!("feed:{}", feed.as_str())
}

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and implements [`EntityStore`] over
/// the key patterns listed in the module docs.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), StoreError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Run the commit script and translate its result.
    async fn run_commit(&self, batch: &StoreBatch) -> Result<Vec<Entity>, StoreError> {
        let mut keys = Vec::with_capacity(
            batch
                .writes
                .len()
                .saturating_mul(2)
                .saturating_add(batch.appends.len()),
        );
        let mut args = Vec::with_capacity(keys.capacity().saturating_add(1));
        args.push(batch.writes.len().to_string());

        let mut stored = Vec::with_capacity(batch.writes.len());
        for entity in &batch.writes {
            let mut next = entity.clone();
            next.version = entity.version.saturating_add(1);
            keys.push(state_key(entity.id));
            keys.push(version_key(entity.id));
            args.push(entity.version.to_string());
            args.push(serde_json::to_string(&next)?);
            stored.push(next);
        }
        for record in &batch.appends {
            keys.push(feed_key(record.feed()));
            args.push(serde_json::to_string(record)?);
        }

        let status: i64 = self.client.eval(COMMIT_SCRIPT, keys, args).await?;
        match status {
            0 => Ok(stored),
            code => {
                let index = usize::try_from(code.unsigned_abs())
                    .unwrap_or(usize::MAX)
                    .saturating_sub(1);
                let Some(entity) = batch.writes.get(index) else {
                    return Err(StoreError::Backend(format!(
                        "commit script returned unexpected status {code}"
                    )));
                };
                if code < 0 {
                    Err(StoreError::NotFound(entity.id))
                } else {
                    Err(StoreError::Conflict {
                        id: entity.id,
                        expected: entity.version,
                    })
                }
            }
        }
    }
}

impl EntityStore for DragonflyStore {
    async fn get(&self, id: EntityId) -> Result<Entity, StoreError> {
        let value: Option<String> = self.client.get(state_key(id)).await?;
        value.map_or_else(
            || Err(StoreError::NotFound(id)),
            |s| Ok(serde_json::from_str(&s)?),
        )
    }

    async fn insert(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let mut stored = entity.clone();
        stored.version = 1;
        let keys = vec![
            state_key(entity.id),
            version_key(entity.id),
            ENTITY_INDEX_KEY.to_owned(),
        ];
        let args = vec![serde_json::to_string(&stored)?, entity.id.to_string()];
        let inserted: i64 = self.client.eval(INSERT_SCRIPT, keys, args).await?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(entity.id));
        }
        tracing::debug!(entity_id = %entity.id, "Entity inserted");
        Ok(stored)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let batch = StoreBatch::new().write(entity.clone());
        self.run_commit(&batch)
            .await?
            .pop()
            .ok_or(StoreError::NotFound(entity.id))
    }

    async fn append(&self, record: &FeedRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let _: u64 = self
            .client
            .rpush(feed_key(record.feed()), json.as_str())
            .await?;
        Ok(())
    }

    async fn commit(&self, batch: &StoreBatch) -> Result<Vec<Entity>, StoreError> {
        self.run_commit(batch).await
    }

    async fn list(&self) -> Result<Vec<Entity>, StoreError> {
        let members: Vec<String> = self.client.smembers(ENTITY_INDEX_KEY).await?;
        let mut entities = Vec::with_capacity(members.len());
        for member in &members {
            let id = member
                .parse::<uuid::Uuid>()
                .map(EntityId::from)
                .map_err(|e| {
                    StoreError::Config(format!("Invalid UUID in {ENTITY_INDEX_KEY}: {e}"))
                })?;
            match self.get(id).await {
                Ok(entity) => entities.push(entity),
                Err(StoreError::NotFound(_)) => {
                    tracing::warn!(entity_id = %id, "Indexed entity has no state document");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entities)
    }

    async fn read_feed(&self, feed: Feed) -> Result<Vec<FeedRecord>, StoreError> {
        let values: Vec<String> = self.client.lrange(feed_key(feed), 0, -1).await?;
        let mut records = Vec::with_capacity(values.len());
        for v in &values {
            let parsed: FeedRecord = serde_json::from_str(v)?;
            records.push(parsed);
        }
        Ok(records)
    }
}
