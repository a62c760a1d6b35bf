//! # CartLink Bridge
//!
//! The host-facing half of CartLink: a fixed 8 KiB register window that
//! turns bounds-checked buffer writes into command dispatches against the
//! simulated link service, and a lifecycle facade for embedding hosts.
//!
//! A host maps the window at [`WINDOW_BASE`], forwards guest accesses to
//! [`CartLink::read`]/[`CartLink::write`], and reads command responses
//! back out of the response area (or via [`CartLink::take_response`]).
//!
//! ## Usage
//!
//! ```
//! use cartlink_bridge::{AccessSize, CartLink};
//! use cartlink_session::LinkConfig;
//!
//! let cart = CartLink::initialize(LinkConfig::new("demo").immediate().with_rng_seed(1));
//! // Command 0x01 (QueryAvailableSpace), no parameters.
//! cart.write(0, 0x0100_0000, AccessSize::Word);
//! let response = cart.take_response().unwrap();
//! assert!(!response.is_empty());
//! cart.shutdown();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod command;
mod dispatch;

pub use bridge::{
    AccessSize, RegisterBridge, READY_FLAG_OFFSET, RESPONSE_LEN_OFFSET, RESPONSE_PAYLOAD_OFFSET,
    TRIGGER_OFFSET, WINDOW_BASE, WINDOW_LEN,
};
pub use command::{CommandId, CommandParams, CommandReply, ErrorCode, LeaderboardEntry};
pub use dispatch::Dispatcher;

use cartlink_session::{Link, LinkConfig, LinkResult, LinkStats};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// The complete link module as a host embeds it: shared session state, the
/// register window, and lifecycle entry points.
pub struct CartLink {
    link: Arc<Link>,
    bridge: Mutex<RegisterBridge>,
}

impl CartLink {
    /// Builds the module in the disconnected state. Safe to call before
    /// any content is loaded; nothing connects until a command fires or
    /// [`CartLink::connect`] is called.
    #[must_use]
    pub fn initialize(config: LinkConfig) -> Self {
        let link = Arc::new(Link::new(config));
        let bridge = Mutex::new(RegisterBridge::new(Dispatcher::new(Arc::clone(&link))));
        info!("cartlink initialized");
        Self { link, bridge }
    }

    /// Establishes a session. Idempotent.
    pub fn connect(&self) -> LinkResult<String> {
        self.link.connect()
    }

    /// Tears down the session and stops the sync daemon. Idempotent.
    pub fn disconnect(&self) {
        self.link.disconnect();
    }

    /// Whether a session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Session statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.link.stats()
    }

    /// The underlying link, for hosts that drive storage directly.
    #[must_use]
    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    /// Reads from the register window. Command dispatch never happens on
    /// the read path.
    #[must_use]
    pub fn read(&self, offset: usize, size: AccessSize) -> u32 {
        self.bridge.lock().read(offset, size)
    }

    /// Reads a raw byte range from the window.
    #[must_use]
    pub fn read_block(&self, offset: usize, len: usize) -> Vec<u8> {
        self.bridge.lock().read_block(offset, len)
    }

    /// Writes to the register window. A 4-byte write at offset 0 fires the
    /// command trigger; the dispatched command completes before this call
    /// returns.
    pub fn write(&self, offset: usize, value: u32, size: AccessSize) {
        self.bridge.lock().write(offset, value, size);
    }

    /// Writes a raw byte range into the window.
    pub fn write_block(&self, offset: usize, bytes: &[u8]) {
        self.bridge.lock().write_block(offset, bytes);
    }

    /// Returns the pending response and clears the ready flag.
    pub fn take_response(&self) -> Option<Vec<u8>> {
        self.bridge.lock().take_response()
    }

    /// Shuts the module down: disconnects (stopping the daemon with a
    /// bounded wait). Idempotent and safe without a prior connect.
    pub fn shutdown(&self) {
        self.link.disconnect();
        info!("cartlink shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cart() -> CartLink {
        CartLink::initialize(
            LinkConfig::new("facade_test")
                .immediate()
                .with_rng_seed(31)
                .with_autosave_probability(0.0)
                .with_incident_probability(0.0),
        )
    }

    #[test]
    fn shutdown_without_connect_is_safe() {
        let cart = test_cart();
        cart.shutdown();
        cart.shutdown();
        assert!(!cart.is_connected());
    }

    #[test]
    fn lifecycle_roundtrip() {
        let cart = test_cart();
        let session = cart.connect().unwrap();
        assert!(session.starts_with("LNK_"));
        assert!(cart.is_connected());
        cart.shutdown();
        assert!(!cart.is_connected());
    }

    #[test]
    fn window_access_works_through_facade() {
        let cart = test_cart();
        cart.write(0x800, 0x1234, AccessSize::Half);
        assert_eq!(cart.read(0x800, AccessSize::Half), 0x1234);
    }
}
