//! Simulated network conditions.
//!
//! The link pretends to speak to a remote service over a flaky consumer
//! connection. Conditions drift a little every daemon tick: rare incidents
//! spike latency and degrade quality, and quiet ticks recover both toward
//! their nominal values.

use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;
use tracing::info;

/// Latency floor that recovery converges toward.
const NOMINAL_LATENCY: Duration = Duration::from_millis(50);

/// Latency ceiling during incidents.
const MAX_LATENCY: Duration = Duration::from_secs(2);

/// Quality floor during incidents.
const QUALITY_FLOOR: f64 = 0.3;

/// A snapshot of the simulated link conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConditions {
    /// Fixed per-operation delay.
    pub latency: Duration,
    /// Throughput in bytes per second.
    pub bandwidth: u64,
    /// Connection quality in `[0, 1]`. Doubles as the per-attempt
    /// probability that a background sync succeeds.
    pub quality: f64,
}

impl NetworkConditions {
    /// Simulated delay for transferring `size` encoded bytes, capped at
    /// `cap`. A zero cap disables delay simulation entirely.
    #[must_use]
    pub fn transfer_delay(&self, size: u64, cap: Duration) -> Duration {
        if cap.is_zero() {
            return Duration::ZERO;
        }
        let quality = self.quality.max(0.01);
        let bandwidth = self.bandwidth.max(1) as f64;
        let transfer = size as f64 / bandwidth / quality;
        let total = self.latency.as_secs_f64() + transfer;
        Duration::from_secs_f64(total).min(cap)
    }
}

/// Evolves [`NetworkConditions`] over time.
#[derive(Debug)]
pub struct ConditionModel {
    conditions: NetworkConditions,
    incident_probability: f64,
}

impl ConditionModel {
    /// Draws initial conditions from `rng`: 50-200ms latency, 0.5-2.0 MB/s
    /// bandwidth, 0.8-1.0 quality.
    pub fn new(rng: &mut StdRng, incident_probability: f64) -> Self {
        Self {
            conditions: NetworkConditions {
                latency: Duration::from_millis(rng.gen_range(50..=200)),
                bandwidth: rng.gen_range(512_000..=2_048_000),
                quality: rng.gen_range(0.8..=1.0),
            },
            incident_probability,
        }
    }

    /// Current conditions.
    #[must_use]
    pub fn conditions(&self) -> NetworkConditions {
        self.conditions
    }

    /// Advances the model by one tick. Returns true when an incident fired.
    pub fn drift(&mut self, rng: &mut StdRng) -> bool {
        let c = &mut self.conditions;
        if rng.gen::<f64>() < self.incident_probability {
            let spike = rng.gen_range(1.0..3.0);
            c.latency = c.latency.mul_f64(spike).min(MAX_LATENCY);
            c.quality = (c.quality * rng.gen_range(0.7..1.0)).max(QUALITY_FLOOR);
            info!(
                latency_ms = c.latency.as_millis() as u64,
                quality = c.quality,
                "network incident"
            );
            true
        } else {
            c.latency = c.latency.mul_f64(0.95).max(NOMINAL_LATENCY);
            c.quality = (c.quality * 1.01).min(1.0);
            false
        }
    }
}
