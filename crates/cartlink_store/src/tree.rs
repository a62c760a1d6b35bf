//! The hierarchical storage tree.

use crate::error::{StoreError, StoreResult};
use cartlink_codec::{encoded_len, Value};
use std::collections::BTreeMap;

/// A node in the storage tree.
#[derive(Debug, Clone)]
enum Node {
    /// A stored payload with its encoded size recorded at write time.
    Leaf { value: Value, size: u64 },
    /// An interior node holding named children in sorted order.
    Branch(BTreeMap<String, Node>),
}

/// A hierarchical key/value store with byte quota accounting.
///
/// Paths are slash-delimited; intermediate segments are created on demand
/// when storing. Only leaves hold payloads, and only leaves are removable.
///
/// # Invariants
///
/// - `used_bytes` equals the sum of the recorded sizes of all current leaves
/// - `used_bytes` never exceeds `capacity`; stores that would exceed it are
///   rejected before any mutation
/// - Removing a leaf credits the size recorded when it was written, never a
///   re-serialization of the live value
#[derive(Debug, Clone)]
pub struct StorageTree {
    root: BTreeMap<String, Node>,
    capacity: u64,
    used: u64,
}

impl StorageTree {
    /// Creates an empty tree with the given capacity in bytes.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            root: BTreeMap::new(),
            capacity,
            used: 0,
        }
    }

    /// Total declared capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes currently charged against the quota.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    /// Bytes still available under the quota.
    #[must_use]
    pub fn available_bytes(&self) -> u64 {
        self.capacity - self.used
    }

    /// Stores a payload at `path`, creating intermediate nodes on demand.
    ///
    /// Replacing an existing leaf credits its recorded size before charging
    /// the new one. Returns the encoded size that was charged.
    ///
    /// # Errors
    ///
    /// - `QuotaExceeded` if the store would push usage above capacity; the
    ///   tree is left unmodified
    /// - `InvalidPath` if the path is empty, has empty segments, descends
    ///   through an existing leaf, or addresses an existing interior node
    pub fn insert(&mut self, path: &str, value: Value) -> StoreResult<u64> {
        let segments = split_path(path)?;
        let new_size = encoded_len(&value) as u64;

        // Walk without mutating first: the quota check must happen before
        // any intermediate nodes are created.
        let old_size = match self.peek(&segments) {
            Peek::Leaf(size) => Some(size),
            Peek::Branch => {
                return Err(StoreError::invalid_path(
                    path,
                    "path addresses an interior node",
                ))
            }
            Peek::Obstructed => {
                return Err(StoreError::invalid_path(
                    path,
                    "path descends through a stored payload",
                ))
            }
            Peek::Vacant => None,
        };

        let projected = self.used - old_size.unwrap_or(0) + new_size;
        if projected > self.capacity {
            return Err(StoreError::QuotaExceeded {
                requested: new_size,
                available: self.capacity - self.used + old_size.unwrap_or(0),
            });
        }

        let (last, interior) = match segments.split_last() {
            Some(parts) => parts,
            None => return Err(StoreError::invalid_path(path, "empty path")),
        };
        let mut current = &mut self.root;
        for segment in interior {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Node::Branch(BTreeMap::new()));
            match entry {
                Node::Branch(children) => current = children,
                // peek() already ruled this out
                Node::Leaf { .. } => {
                    return Err(StoreError::invalid_path(
                        path,
                        "path descends through a stored payload",
                    ))
                }
            }
        }
        current.insert(
            (*last).to_string(),
            Node::Leaf {
                value,
                size: new_size,
            },
        );

        self.used = projected;
        Ok(new_size)
    }

    /// Returns the payload stored at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no leaf exists at the path (interior nodes are not
    /// retrievable payloads).
    pub fn get(&self, path: &str) -> StoreResult<&Value> {
        let segments = split_path(path)?;
        match self.node(&segments) {
            Some(Node::Leaf { value, .. }) => Ok(value),
            _ => Err(StoreError::not_found(path)),
        }
    }

    /// Returns the recorded encoded size of the leaf at `path`.
    pub fn size_of(&self, path: &str) -> StoreResult<u64> {
        let segments = split_path(path)?;
        match self.node(&segments) {
            Some(Node::Leaf { size, .. }) => Ok(*size),
            _ => Err(StoreError::not_found(path)),
        }
    }

    /// Returns true if a leaf exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        split_path(path)
            .ok()
            .and_then(|segments| self.node(&segments))
            .map_or(false, |node| matches!(node, Node::Leaf { .. }))
    }

    /// Removes the leaf at `path` and returns its payload.
    ///
    /// Exactly the targeted leaf is removed; siblings and the parent chain
    /// stay in place. The recorded size is credited back to the quota.
    ///
    /// # Errors
    ///
    /// `NotFound` if the path does not name a leaf (interior nodes cannot
    /// be removed).
    pub fn remove(&mut self, path: &str) -> StoreResult<Value> {
        let segments = split_path(path)?;
        let (last, interior) = match segments.split_last() {
            Some(parts) => parts,
            None => return Err(StoreError::invalid_path(path, "empty path")),
        };

        let mut current = &mut self.root;
        for segment in interior {
            match current.get_mut(*segment) {
                Some(Node::Branch(children)) => current = children,
                _ => return Err(StoreError::not_found(path)),
            }
        }

        match current.get(*last) {
            Some(Node::Leaf { .. }) => {}
            _ => return Err(StoreError::not_found(path)),
        }
        match current.remove(*last) {
            Some(Node::Leaf { value, size }) => {
                self.used -= size;
                Ok(value)
            }
            // checked just above
            _ => Err(StoreError::not_found(path)),
        }
    }

    /// Lists the child names of the interior node at `path`, in order.
    ///
    /// The empty path lists the root.
    ///
    /// # Errors
    ///
    /// `NotFound` if the path names a leaf or does not exist.
    pub fn list(&self, path: &str) -> StoreResult<Vec<String>> {
        if path.is_empty() {
            return Ok(self.root.keys().cloned().collect());
        }
        let segments = split_path(path)?;
        match self.node(&segments) {
            Some(Node::Branch(children)) => Ok(children.keys().cloned().collect()),
            _ => Err(StoreError::not_found(path)),
        }
    }

    fn node(&self, segments: &[&str]) -> Option<&Node> {
        let (first, rest) = segments.split_first()?;
        let mut node = self.root.get(*first)?;
        for segment in rest {
            match node {
                Node::Branch(children) => node = children.get(*segment)?,
                Node::Leaf { .. } => return None,
            }
        }
        Some(node)
    }

    fn peek(&self, segments: &[&str]) -> Peek {
        let (first, rest) = match segments.split_first() {
            Some(parts) => parts,
            None => return Peek::Vacant,
        };
        let mut node = match self.root.get(*first) {
            Some(node) => node,
            None => return Peek::Vacant,
        };
        for segment in rest {
            match node {
                Node::Branch(children) => match children.get(*segment) {
                    Some(child) => node = child,
                    None => return Peek::Vacant,
                },
                Node::Leaf { .. } => return Peek::Obstructed,
            }
        }
        match node {
            Node::Leaf { size, .. } => Peek::Leaf(*size),
            Node::Branch(_) => Peek::Branch,
        }
    }
}

/// What the tree holds at a prospective insert path.
enum Peek {
    /// Nothing stored along or at the path.
    Vacant,
    /// A leaf with the recorded size.
    Leaf(u64),
    /// An interior node.
    Branch,
    /// A leaf blocks an intermediate segment.
    Obstructed,
}

fn split_path(path: &str) -> StoreResult<Vec<&str>> {
    if path.is_empty() {
        return Err(StoreError::invalid_path(path, "empty path"));
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::invalid_path(path, "empty path segment"));
    }
    Ok(segments)
}
