//! Hermes Hub - single-process message broadcaster
//!
//! Publishers push messages, subscribers are bounded mailboxes. The hub:
//! - suppresses messages whose id it has already seen (bounded dedup window)
//! - never blocks a publisher: a full mailbox drops the message for that
//!   subscriber only
//! - serializes publish/subscribe/unsubscribe so delivery attempts follow
//!   publish order

pub mod hub;
pub mod subscription;

pub use hub::*;
pub use subscription::*;
