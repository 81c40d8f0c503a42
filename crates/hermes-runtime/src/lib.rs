//! Hermes Runtime - replication node
//!
//! A [`Node`] owns one [`Hub`](hermes_hub::Hub) and serves a TCP listener.
//! Each accepted connection picks a protocol with its first line:
//! 1. `replica`: messages are exchanged with a peer node as a JSON stream;
//!    everything decoded is republished locally, deduplicated by id
//! 2. `v1`: text lines in are published, every hub message goes out as a line
//!
//! Following a peer dials it and starts the same replica exchange from the
//! connecting side, which is how nodes form a gossip mesh.

pub mod config;
pub mod node;
mod session;

pub use config::*;
pub use node::*;
