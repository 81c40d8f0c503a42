//! Node configuration

use hermes_core::{HermesError, HermesResult};
use hermes_hub::DEFAULT_DEDUP_CAPACITY;
use hermes_wire::{MAX_FRAME_SIZE, MAX_LINE_SIZE};

/// Hermes node configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// Message ids remembered by the hub for deduplication
    pub dedup_capacity: usize,
    /// Mailbox size of each replica link writer
    pub replica_buffer: usize,
    /// Mailbox size of each v1 client writer
    pub v1_buffer: usize,
    /// Largest JSON object accepted on a replica link
    pub max_frame_size: usize,
    /// Longest mode or v1 line accepted from a client
    pub max_line_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            replica_buffer: 8,
            v1_buffer: 4,
            max_frame_size: MAX_FRAME_SIZE,
            max_line_size: MAX_LINE_SIZE,
        }
    }
}

impl NodeConfig {
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    pub fn with_replica_buffer(mut self, buffer: usize) -> Self {
        self.replica_buffer = buffer;
        self
    }

    pub fn with_v1_buffer(mut self, buffer: usize) -> Self {
        self.v1_buffer = buffer;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_max_line_size(mut self, size: usize) -> Self {
        self.max_line_size = size;
        self
    }

    /// Reject settings the node cannot run with
    ///
    /// A dedup capacity of 0 would make the window unbounded, so it is
    /// refused here even though the cache itself accepts it.
    pub fn validate(&self) -> HermesResult<()> {
        if self.dedup_capacity == 0 {
            return Err(HermesError::Config("dedup capacity must be positive".into()));
        }
        if self.replica_buffer == 0 || self.v1_buffer == 0 {
            return Err(HermesError::Config("subscriber buffers must be positive".into()));
        }
        if self.max_frame_size == 0 || self.max_line_size == 0 {
            return Err(HermesError::Config("size limits must be positive".into()));
        }
        Ok(())
    }
}
