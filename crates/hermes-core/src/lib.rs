//! Hermes Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every Hermes layer:
//! - Identifiers (NodeId, MessageId, IdGenerator)
//! - The replicated Message
//! - Error and result types

pub mod id;
pub mod message;
pub mod error;

pub use id::*;
pub use message::*;
pub use error::*;
