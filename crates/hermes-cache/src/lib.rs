//! Hermes Cache - Bounded recency caches
//!
//! This crate provides:
//! - `RecencyCache`: single-owner LRU map with O(1) get/set/pop
//! - `SharedCache`: mutex-guarded handle over a `RecencyCache`

pub mod lru;
pub mod shared;

pub use lru::RecencyCache;
pub use shared::SharedCache;
