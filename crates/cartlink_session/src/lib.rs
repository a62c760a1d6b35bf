//! # CartLink Session
//!
//! The simulated online service behind the CartLink register window: a
//! connection state machine, a quota-accounted virtual storage service,
//! and a background sync daemon, all sharing one session lock.
//!
//! A [`Link`] starts `Disconnected`. [`Link::connect`] performs a
//! simulated handshake (with a small refusal probability), seeds the
//! baseline storage namespaces, and starts the daemon. Storage access
//! goes through [`StorageService`], which charges simulated transfer
//! delays outside the lock so the daemon never stalls behind a slow
//! transfer.
//!
//! ## Usage
//!
//! ```
//! use cartlink_session::{Link, LinkConfig};
//! use cartlink_codec::Value;
//!
//! let link = Link::new(LinkConfig::new("demo_cart").immediate().with_rng_seed(1));
//! let session = link.connect().unwrap();
//! assert!(session.starts_with("LNK_"));
//!
//! link.service().store("scores/best", Value::Integer(9500)).unwrap();
//! assert_eq!(
//!     link.service().retrieve("scores/best").unwrap(),
//!     Value::Integer(9500),
//! );
//! link.disconnect();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod daemon;
mod error;
mod netsim;
mod service;

pub use config::LinkConfig;
pub use connection::{Link, LinkState, LinkStats};
pub use error::{LinkError, LinkResult};
pub use netsim::{ConditionModel, NetworkConditions};
pub use service::StorageService;
