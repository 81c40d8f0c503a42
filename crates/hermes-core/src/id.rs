//! Identity types for Hermes
//!
//! Identifiers are short base32 strings so they stay readable in logs and
//! on the line-oriented client protocol.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// RFC 4648 base32 alphabet
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Length of a generated node identifier
pub const NODE_ID_LEN: usize = 4;

/// Length of the per-connection message id prefix
pub const CONNECTION_PREFIX_LEN: usize = 8;

/// Generate a random base32 string of `len` characters
pub fn random_base32(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

/// Node identity - random, generated once per process
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Generate a fresh random node id
    pub fn generate() -> Self {
        NodeId(random_base32(NODE_ID_LEN))
    }

    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message identity - the deduplication key across the mesh
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msg({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        MessageId(id)
    }
}

/// Per-connection message id generator
///
/// Ids have the form `{node}.{prefix}:{seq}`. The prefix is drawn once per
/// connection and the sequence starts at 1. Including the node id keeps two
/// nodes that happen to draw the same prefix from colliding.
#[derive(Debug)]
pub struct IdGenerator {
    node: NodeId,
    prefix: String,
    seq: u64,
}

impl IdGenerator {
    pub fn new(node: NodeId) -> Self {
        Self::with_prefix(node, random_base32(CONNECTION_PREFIX_LEN))
    }

    pub fn with_prefix(node: NodeId, prefix: impl Into<String>) -> Self {
        IdGenerator {
            node,
            prefix: prefix.into(),
            seq: 0,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next id in the sequence
    pub fn next_id(&mut self) -> MessageId {
        self.seq += 1;
        MessageId(format!("{}.{}:{}", self.node, self.prefix, self.seq))
    }
}
