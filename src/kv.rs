//! The generic key/value storage contract the dashboard persists its records through.
//!
//! The contract itself only stores opaque bytes. On top of it, clients keep JSON documents and
//! maintain a JSON array of every key they wrote under [`INDEX_KEY`]; the helpers in this module
//! implement that client-side convention.
use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// Key of the JSON array listing every other key
pub const INDEX_KEY: &str = "__index__";

#[derive(Debug, Error)]
pub enum KvError {
    #[error("value under {key:?} is not valid JSON: {source}")]
    Json {
        key: String,
        source: serde_json::Error,
    },

    #[error("{0:?} is reserved for the key index")]
    ReservedKey(String),
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: HashMap<String, Vec<u8>>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Unset keys read as empty bytes
    pub fn get_data(&self, key: &str) -> &[u8] {
        return self
            .entries
            .get(key)
            .map(|value| value.as_slice())
            .unwrap_or(&[]);
    }

    pub fn set_data(&mut self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_string(), value);
    }
}

/// Every key recorded in the index, in insertion order
pub fn keys(store: &KeyValueStore) -> Result<Vec<String>, KvError> {
    let raw = store.get_data(INDEX_KEY);
    if raw.is_empty() {
        return Ok(vec![]);
    }
    return serde_json::from_slice(raw).map_err(|source| KvError::Json {
        key: INDEX_KEY.to_string(),
        source,
    });
}

fn write_index(store: &mut KeyValueStore, keys: &[String]) -> Result<(), KvError> {
    let raw = serde_json::to_vec(keys).map_err(|source| KvError::Json {
        key: INDEX_KEY.to_string(),
        source,
    })?;
    store.set_data(INDEX_KEY, raw);
    return Ok(());
}

/// Store `value` as JSON under `key` and make sure the key is listed in the index
pub fn put_json<T: Serialize>(
    store: &mut KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), KvError> {
    if key == INDEX_KEY {
        return Err(KvError::ReservedKey(key.to_string()));
    }
    let raw = serde_json::to_vec(value).map_err(|source| KvError::Json {
        key: key.to_string(),
        source,
    })?;
    let mut index = keys(store)?;
    store.set_data(key, raw);
    if !index.iter().any(|existing| existing == key) {
        index.push(key.to_string());
        write_index(store, &index)?;
    }
    debug!(key, "stored record");
    return Ok(());
}

/// `None` for keys never written or removed
pub fn get_json<T: DeserializeOwned>(
    store: &KeyValueStore,
    key: &str,
) -> Result<Option<T>, KvError> {
    let raw = store.get_data(key);
    if raw.is_empty() {
        return Ok(None);
    }
    return serde_json::from_slice(raw)
        .map(Some)
        .map_err(|source| KvError::Json {
            key: key.to_string(),
            source,
        });
}

/// Clear the value and drop the key from the index
pub fn remove(store: &mut KeyValueStore, key: &str) -> Result<bool, KvError> {
    if key == INDEX_KEY {
        return Err(KvError::ReservedKey(key.to_string()));
    }
    let mut index = keys(store)?;
    let before = index.len();
    index.retain(|existing| existing != key);
    store.set_data(key, vec![]);
    if index.len() == before {
        return Ok(false);
    }
    write_index(store, &index)?;
    return Ok(true);
}
