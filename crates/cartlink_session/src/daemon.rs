//! Background sync daemon.
//!
//! A single worker thread ticks at a fixed period. Each tick drifts the
//! simulated network conditions, attempts a periodic sync whose success
//! probability equals the current connection quality, and occasionally
//! writes an auto-save. Auto-saves go straight to the storage tree with no
//! simulated transfer delay.

use crate::config::LinkConfig;
use crate::connection::{unix_now, LinkCore, LinkState};
use crate::service::merged_record;
use cartlink_codec::Value;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Handle to the background worker thread.
pub(crate) struct SyncDaemon {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl SyncDaemon {
    /// Spawns the worker. It runs until [`SyncDaemon::stop`] is called or
    /// the handle is dropped.
    pub(crate) fn spawn(core: Arc<Mutex<LinkCore>>, config: LinkConfig) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(config.tick) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => tick(&core, &config),
            }
        });
        Self { stop_tx, handle }
    }

    /// Signals the worker and waits up to `timeout` for it to finish.
    /// Returns whether the thread was joined.
    pub(crate) fn stop(self, timeout: Duration) -> bool {
        let _ = self.stop_tx.send(());
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.handle.join().is_ok()
    }
}

/// One daemon tick. Runs entirely under the session lock; nothing here
/// sleeps.
fn tick(core: &Mutex<LinkCore>, config: &LinkConfig) {
    let mut guard = core.lock();
    let core = &mut *guard;

    core.model.drift(&mut core.rng);

    if core.state != LinkState::Connected {
        return;
    }

    let due = match core.last_sync_at {
        Some(at) => at.elapsed() >= config.sync_interval,
        None => true,
    };
    if due {
        let quality = core.model.conditions().quality;
        if core.rng.gen::<f64>() < quality {
            let ts = core.mark_synced();
            debug!(ts, "background sync complete");
        } else {
            core.syncs_failed += 1;
            warn!(quality, "background sync failed");
        }
    }

    if core.rng.gen::<f64>() < config.autosave_probability {
        autosave(core);
    }
}

/// Writes a synthetic auto-save snapshot for the running content.
fn autosave(core: &mut LinkCore) {
    let snapshot = merged_record(
        Value::record(vec![
            (
                "random_seed".into(),
                Value::Integer(core.rng.gen_range(1..=1_000_000)),
            ),
            (
                "game_flags".into(),
                Value::Integer(core.rng.gen_range(1..=65_535)),
            ),
        ]),
        vec![
            ("auto_save".into(), Value::Bool(true)),
            ("saved_at".into(), Value::Integer(unix_now() as i64)),
            (
                "session_id".into(),
                Value::Text(core.session_id.clone().unwrap_or_default()),
            ),
        ],
    );

    let path = format!("save_data/{}/auto_save", core.content_hash);
    match core.tree.insert(&path, snapshot) {
        Ok(bytes) => {
            core.autosaves += 1;
            debug!(bytes, "auto-save written");
        }
        Err(e) => warn!(error = %e, "auto-save skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::connection::Link;

    fn fast_config() -> LinkConfig {
        LinkConfig::new("daemon_test")
            .immediate()
            .with_rng_seed(21)
            .with_tick(Duration::from_millis(5))
            .with_incident_probability(0.0)
    }

    #[test]
    fn daemon_syncs_when_interval_elapses() {
        let link = Link::new(
            fast_config()
                .with_sync_interval(Duration::ZERO)
                .with_autosave_probability(0.0),
        );
        link.connect().unwrap();
        let baseline = link.stats().syncs_completed;

        let deadline = Instant::now() + Duration::from_secs(2);
        while link.stats().syncs_completed == baseline && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(link.stats().syncs_completed > baseline);
        assert!(link.stats().last_sync_unix.is_some());
    }

    #[test]
    fn daemon_writes_autosaves() {
        let link = Link::new(
            fast_config()
                .with_sync_interval(Duration::from_secs(3600))
                .with_autosave_probability(1.0),
        );
        link.connect().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while link.stats().autosaves == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(link.stats().autosaves > 0);

        let saves = link.service().list_game_saves().unwrap();
        assert!(saves.contains(&"auto_save".to_string()));
        let snapshot = link.service().load_game_state("auto_save").unwrap();
        assert_eq!(snapshot.get("auto_save").and_then(Value::as_bool), Some(true));
        assert!(snapshot.get("random_seed").is_some());
    }

    #[test]
    fn disconnect_stops_the_daemon() {
        let link = Link::new(
            fast_config()
                .with_sync_interval(Duration::from_secs(3600))
                .with_autosave_probability(1.0),
        );
        link.connect().unwrap();
        link.disconnect();

        let settled = link.stats().autosaves;
        thread::sleep(Duration::from_millis(100));
        assert_eq!(link.stats().autosaves, settled);
    }

    #[test]
    fn stop_joins_promptly() {
        let link = Link::new(fast_config());
        link.connect().unwrap();
        let start = Instant::now();
        link.disconnect();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
