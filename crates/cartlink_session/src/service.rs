//! Virtual remote storage service.
//!
//! Every operation is gated on an established session and charged a
//! simulated transfer delay derived from the current network conditions.
//! Delays are always slept with the session lock released, so the sync
//! daemon keeps ticking while a slow transfer is "in flight".

use crate::config::LinkConfig;
use crate::connection::{unix_now, LinkCore};
use crate::error::{LinkError, LinkResult};
use cartlink_codec::{encoded_len, Value};
use cartlink_store::StoreError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Session-gated storage operations over the link's storage tree.
pub struct StorageService {
    core: Arc<Mutex<LinkCore>>,
    config: LinkConfig,
}

impl StorageService {
    pub(crate) fn new(core: Arc<Mutex<LinkCore>>, config: LinkConfig) -> Self {
        Self { core, config }
    }

    /// Stores `value` at `path`, replacing any existing leaf. Returns the
    /// encoded size charged against the quota.
    pub fn store(&self, path: &str, value: Value) -> LinkResult<u64> {
        let size = encoded_len(&value) as u64;
        self.simulate_transfer(size)?;

        let mut core = self.core.lock();
        core.require_connected()?;
        let charged = core.tree.insert(path, value)?;
        debug!(path, bytes = charged, "stored");
        Ok(charged)
    }

    /// Retrieves the value stored at `path`.
    pub fn retrieve(&self, path: &str) -> LinkResult<Value> {
        let (value, size) = {
            let core = self.core.lock();
            core.require_connected()?;
            let value = core.tree.get(path)?.clone();
            let size = core.tree.size_of(path)?;
            (value, size)
        };
        self.simulate_transfer(size)?;
        Ok(value)
    }

    /// Deletes the leaf at `path`, crediting its recorded size back to the
    /// quota.
    pub fn delete(&self, path: &str) -> LinkResult<()> {
        self.simulate_transfer(0)?;
        let mut core = self.core.lock();
        core.require_connected()?;
        core.tree.remove(path)?;
        debug!(path, "deleted");
        Ok(())
    }

    /// Lists the immediate children under `path`, in sorted order.
    pub fn list(&self, path: &str) -> LinkResult<Vec<String>> {
        self.simulate_transfer(0)?;
        let core = self.core.lock();
        core.require_connected()?;
        Ok(core.tree.list(path)?)
    }

    /// Whether a leaf exists at `path`.
    pub fn contains(&self, path: &str) -> LinkResult<bool> {
        let core = self.core.lock();
        core.require_connected()?;
        Ok(core.tree.contains(path))
    }

    // --- Namespaced wrappers ------------------------------------------

    /// Stores a custom level under `extended_levels/`, stamping creation
    /// metadata with the current session.
    pub fn store_custom_level(&self, level_id: &str, level: Value) -> LinkResult<u64> {
        let level_id = validated_id(level_id, "level id")?;
        let session_id = self.session_id()?;
        let now = unix_now() as i64;
        let stamped = merged_record(
            level,
            vec![
                ("created_at".into(), Value::Integer(now)),
                ("created_by".into(), Value::Text(session_id)),
                ("last_modified".into(), Value::Integer(now)),
            ],
        );
        self.store(&format!("extended_levels/{level_id}"), stamped)
    }

    /// Retrieves a custom level by id.
    pub fn get_custom_level(&self, level_id: &str) -> LinkResult<Value> {
        let level_id = validated_id(level_id, "level id")?;
        self.retrieve(&format!("extended_levels/{level_id}"))
    }

    /// Lists stored custom level ids. An untouched namespace lists as
    /// empty rather than missing.
    pub fn list_custom_levels(&self) -> LinkResult<Vec<String>> {
        match self.list("extended_levels") {
            Ok(ids) => Ok(ids),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Saves a game state snapshot under the content's save namespace,
    /// stamping the save time and session.
    pub fn save_game_state(&self, save_id: &str, state: Value) -> LinkResult<u64> {
        let save_id = validated_id(save_id, "save id")?;
        let session_id = self.session_id()?;
        let stamped = merged_record(
            state,
            vec![
                ("saved_at".into(), Value::Integer(unix_now() as i64)),
                ("session_id".into(), Value::Text(session_id)),
            ],
        );
        let path = format!("save_data/{}/{save_id}", self.content_hash()?);
        self.store(&path, stamped)
    }

    /// Loads a previously saved game state.
    pub fn load_game_state(&self, save_id: &str) -> LinkResult<Value> {
        let save_id = validated_id(save_id, "save id")?;
        let path = format!("save_data/{}/{save_id}", self.content_hash()?);
        self.retrieve(&path)
    }

    /// Lists save ids for the running content. An untouched namespace
    /// lists as empty rather than missing.
    pub fn list_game_saves(&self) -> LinkResult<Vec<String>> {
        let path = format!("save_data/{}", self.content_hash()?);
        match self.list(&path) {
            Ok(ids) => Ok(ids),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    // --- Internals ----------------------------------------------------

    fn session_id(&self) -> LinkResult<String> {
        let core = self.core.lock();
        core.require_connected()?;
        core.session_id.clone().ok_or(LinkError::NotConnected)
    }

    fn content_hash(&self) -> LinkResult<String> {
        let core = self.core.lock();
        core.require_connected()?;
        Ok(core.content_hash.clone())
    }

    /// Gates on the session, then sleeps the simulated delay for moving
    /// `size` bytes. The lock is released before sleeping.
    fn simulate_transfer(&self, size: u64) -> LinkResult<()> {
        let delay = {
            let core = self.core.lock();
            core.require_connected()?;
            core.model
                .conditions()
                .transfer_delay(size, self.config.max_transfer_delay)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }
}

/// Merges `updates` into `value`. Record payloads keep their existing
/// fields (updates win on key collision); any other payload is wrapped as
/// a `payload` field first.
pub(crate) fn merged_record(value: Value, updates: Vec<(String, Value)>) -> Value {
    let mut fields: Vec<(String, Value)> = match value {
        Value::Record(fields) => fields,
        other => vec![("payload".to_string(), other)],
    };
    for (key, update) in updates {
        fields.retain(|(existing, _)| existing != &key);
        fields.push((key, update));
    }
    Value::record(fields)
}

/// Ids become a single path segment; anything that would change the path
/// shape is rejected.
fn validated_id<'a>(id: &'a str, what: &str) -> LinkResult<&'a str> {
    if id.is_empty() || id.contains('/') {
        return Err(LinkError::Store(StoreError::invalid_path(
            id,
            format!("{what} must be a single non-empty path segment"),
        )));
    }
    Ok(id)
}
