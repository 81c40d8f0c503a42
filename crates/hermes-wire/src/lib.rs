//! Hermes Wire - protocols spoken on a node's TCP listener
//!
//! Every connection opens with one mode line:
//! - `replica`: both sides then exchange a stream of JSON messages
//! - `v1`: newline-terminated text, one message content per line
//!
//! Anything else is answered with `unknown client type` and closed.

pub mod mode;
pub mod codec;
pub mod line;

pub use mode::*;
pub use codec::*;
pub use line::*;
