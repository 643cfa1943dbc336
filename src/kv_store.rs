// src/kv_store.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{bson::doc, Collection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::MongoDB;
use crate::error::AppResult;

/// Durable mapping from string key to JSON value.
///
/// Each call is an independent round-trip; there are no multi-key transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> AppResult<()>;

    /// Returns whether a value was present.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// All values whose key starts with `prefix`, in key order.
    async fn get_by_prefix(&self, prefix: &str) -> AppResult<Vec<Value>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct KvEntry {
    #[serde(rename = "_id")]
    key: String,
    value: Value,
}

/// Store backed by a single MongoDB collection of `{_id: key, value}` documents.
pub struct MongoKvStore {
    collection: Collection<KvEntry>,
}

impl MongoKvStore {
    pub fn new(mongodb: &MongoDB, collection_name: &str) -> Self {
        Self {
            collection: mongodb.db.collection::<KvEntry>(collection_name),
        }
    }
}

#[async_trait]
impl KeyValueStore for MongoKvStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let entry = self.collection.find_one(doc! { "_id": key }).await?;
        Ok(entry.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let entry = KvEntry {
            key: key.to_string(),
            value,
        };
        self.collection
            .replace_one(doc! { "_id": key }, &entry)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let res = self.collection.delete_one(doc! { "_id": key }).await?;
        Ok(res.deleted_count > 0)
    }

    async fn get_by_prefix(&self, prefix: &str) -> AppResult<Vec<Value>> {
        let pattern = format!("^{}", regex::escape(prefix));
        let entries: Vec<KvEntry> = self
            .collection
            .find(doc! { "_id": { "$regex": pattern } })
            .sort(doc! { "_id": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(entries.into_iter().map(|e| e.value).collect())
    }
}

/// In-process store, used for local runs and tests.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn get_by_prefix(&self, prefix: &str) -> AppResult<Vec<Value>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }
}
