//! # CartLink Store
//!
//! The storage tree backing the virtual remote storage service: an ordered
//! hierarchy of named nodes addressed by slash-delimited paths, with byte
//! quota accounting built in.
//!
//! Leaves hold [`cartlink_codec::Value`] payloads. Each leaf records its
//! encoded size at write time, so deletes always credit exactly what the
//! store charged, even if the encoding of the live value were to change.
//!
//! ## Usage
//!
//! ```
//! use cartlink_store::StorageTree;
//! use cartlink_codec::Value;
//!
//! let mut tree = StorageTree::new(1024);
//! tree.insert("save_data/slot_1", Value::Integer(7)).unwrap();
//! assert_eq!(tree.get("save_data/slot_1").unwrap(), &Value::Integer(7));
//! assert_eq!(tree.list("save_data").unwrap(), vec!["slot_1".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod tree;

pub use error::{StoreError, StoreResult};
pub use tree::StorageTree;
