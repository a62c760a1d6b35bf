//! Connection state machine.
//!
//! A [`Link`] models the cartridge's session with the remote service:
//! `Disconnected -> Connecting -> Connected`, with a simulated handshake
//! delay, a small refusal probability, and baseline storage namespaces
//! seeded on every successful connect.

use crate::config::LinkConfig;
use crate::daemon::SyncDaemon;
use crate::error::{LinkError, LinkResult};
use crate::netsim::{ConditionModel, NetworkConditions};
use crate::service::{merged_record, StorageService};
use cartlink_store::StorageTree;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::thread;
use std::time::{Instant, SystemTime};
use tracing::{info, warn};
use cartlink_codec::Value;

/// Connection state of a link session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No session; every service operation fails with `NotConnected`.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Session established; the sync daemon is running.
    Connected,
}

/// A point-in-time snapshot of the session and its counters.
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// Current connection state.
    pub state: LinkState,
    /// Session identifier, when connected.
    pub session_id: Option<String>,
    /// Stable content identity hash.
    pub content_hash: String,
    /// Current simulated network conditions.
    pub conditions: NetworkConditions,
    /// Storage quota in bytes.
    pub capacity: u64,
    /// Bytes currently charged against the quota.
    pub used_bytes: u64,
    /// Bytes still available under the quota.
    pub available_bytes: u64,
    /// Successful connects over the lifetime of the link.
    pub connects: u64,
    /// Background syncs that succeeded.
    pub syncs_completed: u64,
    /// Background syncs that failed their quality draw.
    pub syncs_failed: u64,
    /// Background auto-saves written.
    pub autosaves: u64,
    /// Unix timestamp of the last successful sync.
    pub last_sync_unix: Option<u64>,
}

/// Mutable session state. One lock guards all of it; simulated delays are
/// always slept with the lock released.
pub(crate) struct LinkCore {
    pub(crate) state: LinkState,
    pub(crate) session_id: Option<String>,
    pub(crate) content_hash: String,
    pub(crate) tree: StorageTree,
    pub(crate) model: ConditionModel,
    pub(crate) rng: StdRng,
    pub(crate) session_seq: u64,
    pub(crate) connects: u64,
    pub(crate) syncs_completed: u64,
    pub(crate) syncs_failed: u64,
    pub(crate) autosaves: u64,
    pub(crate) last_sync_unix: Option<u64>,
    pub(crate) last_sync_at: Option<Instant>,
}

impl LinkCore {
    fn new(config: &LinkConfig) -> Self {
        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let model = ConditionModel::new(&mut rng, config.incident_probability);
        Self {
            state: LinkState::Disconnected,
            session_id: None,
            content_hash: content_hash(config),
            tree: StorageTree::new(config.capacity),
            model,
            rng,
            session_seq: 0,
            connects: 0,
            syncs_completed: 0,
            syncs_failed: 0,
            autosaves: 0,
            last_sync_unix: None,
            last_sync_at: None,
        }
    }

    pub(crate) fn require_connected(&self) -> LinkResult<()> {
        match self.state {
            LinkState::Connected => Ok(()),
            _ => Err(LinkError::NotConnected),
        }
    }

    pub(crate) fn mark_synced(&mut self) -> u64 {
        let now = unix_now();
        self.last_sync_unix = Some(now);
        self.last_sync_at = Some(Instant::now());
        self.syncs_completed += 1;
        now
    }

    /// Completes a handshake: allocates a session id, seeds the baseline
    /// namespaces, and moves to `Connected`.
    fn establish(&mut self, config: &LinkConfig) -> LinkResult<String> {
        self.session_seq += 1;
        self.connects += 1;
        let session_id = format!("LNK_{}_{:04}", unix_now(), self.session_seq);

        self.tree.insert(
            "system/info",
            Value::record(vec![
                (
                    "protocol_version".into(),
                    Value::Text(config.protocol_version.clone()),
                ),
                ("content_hash".into(), Value::Text(self.content_hash.clone())),
                ("connect_count".into(), Value::Integer(self.connects as i64)),
            ]),
        )?;

        let profile_path = format!("game_data/{}/profile", self.content_hash);
        if !self.tree.contains(&profile_path) {
            let short = &self.content_hash[..8.min(self.content_hash.len())];
            self.tree.insert(
                &profile_path,
                Value::record(vec![
                    ("name".into(), Value::Text(format!("content_{short}"))),
                    (
                        "first_connected".into(),
                        Value::Integer(unix_now() as i64),
                    ),
                    ("last_active".into(), Value::Integer(0)),
                ]),
            )?;
        }

        self.mark_synced();
        self.session_id = Some(session_id.clone());
        self.state = LinkState::Connected;
        Ok(session_id)
    }

    fn stats(&self, capacity: u64) -> LinkStats {
        LinkStats {
            state: self.state,
            session_id: self.session_id.clone(),
            content_hash: self.content_hash.clone(),
            conditions: self.model.conditions(),
            capacity,
            used_bytes: self.tree.used_bytes(),
            available_bytes: self.tree.available_bytes(),
            connects: self.connects,
            syncs_completed: self.syncs_completed,
            syncs_failed: self.syncs_failed,
            autosaves: self.autosaves,
            last_sync_unix: self.last_sync_unix,
        }
    }
}

/// A link session: the connection state machine plus its storage service
/// and background sync daemon.
pub struct Link {
    config: LinkConfig,
    core: Arc<Mutex<LinkCore>>,
    service: StorageService,
    daemon: Mutex<Option<SyncDaemon>>,
}

impl Link {
    /// Creates a disconnected link with the given configuration.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        let core = Arc::new(Mutex::new(LinkCore::new(&config)));
        let service = StorageService::new(Arc::clone(&core), config.clone());
        Self {
            config,
            core,
            service,
            daemon: Mutex::new(None),
        }
    }

    /// The configuration this link was created with.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The storage service bound to this link's session.
    #[must_use]
    pub fn service(&self) -> &StorageService {
        &self.service
    }

    /// Whether a session is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.core.lock().state, LinkState::Connected)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.core.lock().state
    }

    /// Snapshot of session counters and network conditions.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.core.lock().stats(self.config.capacity)
    }

    /// Establishes a session. Idempotent: connecting while connected
    /// returns the existing session id. The handshake sleeps twice the
    /// current latency (capped), then a small probability of refusal
    /// applies.
    pub fn connect(&self) -> LinkResult<String> {
        let delay = {
            let mut core = self.core.lock();
            if let LinkState::Connected = core.state {
                if let Some(id) = core.session_id.clone() {
                    return Ok(id);
                }
            }
            core.state = LinkState::Connecting;
            let latency = core.model.conditions().latency;
            (latency * 2).min(self.config.connect_delay_cap)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let session_id = {
            let mut core = self.core.lock();
            if core.rng.gen::<f64>() < self.config.refusal_probability {
                core.state = LinkState::Disconnected;
                warn!("link service refused connection");
                return Err(LinkError::ConnectionRefused);
            }
            match core.establish(&self.config) {
                Ok(id) => id,
                Err(e) => {
                    core.state = LinkState::Disconnected;
                    return Err(e);
                }
            }
        };

        self.start_daemon();
        info!(session = %session_id, "link established");
        Ok(session_id)
    }

    /// Tears down the session. Stops the daemon with a bounded wait,
    /// stamps the profile's last-active time, and moves to
    /// `Disconnected`. Idempotent.
    pub fn disconnect(&self) {
        self.stop_daemon();
        let mut core = self.core.lock();
        if !matches!(core.state, LinkState::Connected) {
            core.state = LinkState::Disconnected;
            return;
        }

        let profile_path = format!("game_data/{}/profile", core.content_hash);
        let profile = core.tree.get(&profile_path).ok().cloned();
        if let Some(profile) = profile {
            let updated = merged_record(
                profile,
                vec![("last_active".into(), Value::Integer(unix_now() as i64))],
            );
            if let Err(e) = core.tree.insert(&profile_path, updated) {
                warn!(error = %e, "failed to stamp profile on disconnect");
            }
        }

        core.session_id = None;
        core.state = LinkState::Disconnected;
        info!("link closed");
    }

    /// Foreground synchronization: sleeps one latency beat, then marks the
    /// session synced and returns the new last-sync timestamp.
    pub fn force_sync(&self) -> LinkResult<u64> {
        let delay = {
            let core = self.core.lock();
            core.require_connected()?;
            core.model
                .conditions()
                .transfer_delay(0, self.config.max_transfer_delay)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut core = self.core.lock();
        core.require_connected()?;
        Ok(core.mark_synced())
    }

    fn start_daemon(&self) {
        let mut slot = self.daemon.lock();
        if slot.is_none() {
            *slot = Some(SyncDaemon::spawn(
                Arc::clone(&self.core),
                self.config.clone(),
            ));
        }
    }

    fn stop_daemon(&self) {
        let daemon = self.daemon.lock().take();
        if let Some(daemon) = daemon {
            if !daemon.stop(self.config.daemon_join_timeout) {
                warn!("sync daemon did not stop within the join timeout");
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.stop_daemon();
    }
}

/// Current Unix time in whole seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Stable identity hash for the running content: SHA-256 over the image
/// bytes when present, otherwise over the content tag.
fn content_hash(config: &LinkConfig) -> String {
    let mut hasher = Sha256::new();
    match &config.content_image {
        Some(image) => hasher.update(image),
        None => hasher.update(config.content_tag.as_bytes()),
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in &digest[..16] {
        let _ = std::fmt::Write::write_fmt(&mut out, format_args!("{byte:02x}"));
    }
    out
}
