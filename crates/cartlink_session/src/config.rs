//! Configuration for link sessions.

use std::time::Duration;

/// Configuration for a link session.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Total remote storage quota in encoded bytes.
    pub capacity: u64,
    /// Protocol version string reported under `system/info`.
    pub protocol_version: String,
    /// Identifying tag for the running content, hashed into the content ID
    /// when no image bytes are supplied.
    pub content_tag: String,
    /// Raw content image bytes, hashed into the content ID when present.
    pub content_image: Option<Vec<u8>>,
    /// Probability that a connection attempt is refused.
    pub refusal_probability: f64,
    /// Interval between background synchronization attempts.
    pub sync_interval: Duration,
    /// Daemon tick period.
    pub tick: Duration,
    /// Per-tick probability of a background auto-save.
    pub autosave_probability: f64,
    /// Per-tick probability of a network incident.
    pub incident_probability: f64,
    /// Upper bound on any simulated transfer delay.
    pub max_transfer_delay: Duration,
    /// Upper bound on the simulated connection handshake delay.
    pub connect_delay_cap: Duration,
    /// How long to wait for the daemon thread when stopping it.
    pub daemon_join_timeout: Duration,
    /// Seed for the session's random draws. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl LinkConfig {
    /// Creates a configuration for the given content tag.
    pub fn new(content_tag: impl Into<String>) -> Self {
        Self {
            capacity: 1024 * 1024 * 1024,
            protocol_version: "CLv3.1".to_string(),
            content_tag: content_tag.into(),
            content_image: None,
            refusal_probability: 0.05,
            sync_interval: Duration::from_secs(300),
            tick: Duration::from_secs(1),
            autosave_probability: 0.1,
            incident_probability: 0.01,
            max_transfer_delay: Duration::from_secs(2),
            connect_delay_cap: Duration::from_secs(1),
            daemon_join_timeout: Duration::from_secs(1),
            rng_seed: None,
        }
    }

    /// Sets the storage quota.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the content image whose hash identifies the running content.
    pub fn with_content_image(mut self, image: Vec<u8>) -> Self {
        self.content_image = Some(image);
        self
    }

    /// Sets the connection refusal probability.
    pub fn with_refusal_probability(mut self, probability: f64) -> Self {
        self.refusal_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Sets the background sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the daemon tick period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the per-tick auto-save probability.
    pub fn with_autosave_probability(mut self, probability: f64) -> Self {
        self.autosave_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Sets the per-tick network incident probability.
    pub fn with_incident_probability(mut self, probability: f64) -> Self {
        self.incident_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Sets the cap on simulated transfer delays.
    pub fn with_max_transfer_delay(mut self, cap: Duration) -> Self {
        self.max_transfer_delay = cap;
        self
    }

    /// Sets the cap on the simulated handshake delay.
    pub fn with_connect_delay_cap(mut self, cap: Duration) -> Self {
        self.connect_delay_cap = cap;
        self
    }

    /// Sets the bounded wait used when joining the daemon thread.
    pub fn with_daemon_join_timeout(mut self, timeout: Duration) -> Self {
        self.daemon_join_timeout = timeout;
        self
    }

    /// Seeds the session's random draws for reproducible runs.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Disables simulated delays and connection refusals. Intended for
    /// embedding hosts that want deterministic, instantaneous behavior.
    pub fn immediate(mut self) -> Self {
        self.refusal_probability = 0.0;
        self.max_transfer_delay = Duration::ZERO;
        self.connect_delay_cap = Duration::ZERO;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new("unidentified_content")
    }
}
