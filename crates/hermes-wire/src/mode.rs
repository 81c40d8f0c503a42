//! Mode negotiation

use std::fmt;

/// Marker line sent by a replica peer
pub const REPLICA_MARKER: &str = "replica";

/// Marker line sent by a text client
pub const V1_MARKER: &str = "v1";

/// Response to an unrecognized mode line
pub const UNKNOWN_CLIENT_RESPONSE: &str = "unknown client type\n";

/// Protocol selected by the first line of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Node-to-node JSON stream
    Replica,
    /// Human/line text client
    V1,
}

impl ClientMode {
    /// Parse a mode line; surrounding whitespace is ignored
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            REPLICA_MARKER => Some(ClientMode::Replica),
            V1_MARKER => Some(ClientMode::V1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientMode::Replica => REPLICA_MARKER,
            ClientMode::V1 => V1_MARKER,
        }
    }

    /// Line a client writes to select this mode
    pub fn handshake_line(self) -> String {
        format!("{}\n", self.as_str())
    }
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(ClientMode::parse("replica\n"), Some(ClientMode::Replica));
        assert_eq!(ClientMode::parse("  v1\r\n"), Some(ClientMode::V1));
        assert_eq!(ClientMode::parse("V1"), None);
        assert_eq!(ClientMode::parse(""), None);
        assert_eq!(ClientMode::parse("hello"), None);
    }

    #[test]
    fn test_handshake_line() {
        assert_eq!(ClientMode::Replica.handshake_line(), "replica\n");
        assert_eq!(ClientMode::V1.handshake_line(), "v1\n");
    }
}
