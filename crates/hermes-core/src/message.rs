//! Replicated message
//!
//! The JSON field names are the replica wire format and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MessageId;

/// A message flowing through the hub and across replica links
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "MessageID")]
    pub id: MessageId,
    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,
    #[serde(rename = "Content")]
    pub content: String,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(id: impl Into<MessageId>, content: impl Into<String>) -> Self {
        Self::with_created(id, Utc::now(), content)
    }

    pub fn with_created(
        id: impl Into<MessageId>,
        created: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Message {
            id: id.into(),
            created,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let created = DateTime::parse_from_rfc3339("2016-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let msg = Message::with_created("abc:1", created, "hello");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["MessageID"], "abc:1");
        assert_eq!(json["Content"], "hello");
        assert_eq!(json["Created"], "2016-03-01T10:00:00Z");
    }

    #[test]
    fn test_decode_with_offset_timestamp() {
        let raw = r#"{"MessageID":"p:7","Created":"2016-03-01T12:30:00.123456789+02:00","Content":"hi"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();

        assert_eq!(msg.id, MessageId::from("p:7"));
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.created.to_rfc3339(), "2016-03-01T10:30:00.123456789+00:00");
    }
}
