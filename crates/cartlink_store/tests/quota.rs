//! Property tests for quota accounting.

use cartlink_codec::Value;
use cartlink_store::{StorageTree, StoreError};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Insert { path: String, len: usize },
    Remove { path: String },
}

fn path_strategy() -> impl Strategy<Value = String> {
    // Small key space so inserts, replacements, and removes collide often
    prop::collection::vec("[a-d]", 1..4).prop_map(|segments| segments.join("/"))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (path_strategy(), 0..128usize).prop_map(|(path, len)| Op::Insert { path, len }),
        1 => path_strategy().prop_map(|path| Op::Remove { path }),
    ]
}

proptest! {
    /// After any operation sequence, used bytes equal the sum of the sizes
    /// of the currently stored leaves, and never exceed capacity.
    #[test]
    fn used_bytes_matches_live_leaves(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let capacity = 2048u64;
        let mut tree = StorageTree::new(capacity);
        // Shadow model: path -> recorded size
        let mut model: BTreeMap<String, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert { path, len } => {
                    match tree.insert(&path, Value::Bytes(vec![0xaa; len])) {
                        Ok(size) => {
                            model.insert(path, size);
                        }
                        Err(StoreError::QuotaExceeded { .. }) => {
                            // Rejected stores must leave accounting untouched
                        }
                        Err(StoreError::InvalidPath { .. }) => {
                            // Path collides with an existing branch/leaf shape
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("unexpected: {e}"))),
                    }
                }
                Op::Remove { path } => {
                    if tree.remove(&path).is_ok() {
                        model.remove(&path);
                    }
                }
            }

            let expected: u64 = model.values().sum();
            prop_assert_eq!(tree.used_bytes(), expected);
            prop_assert!(tree.used_bytes() <= capacity);
        }
    }
}
