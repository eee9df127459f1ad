use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A serialized payload delivered on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Position of the message in the broker's global log.
    pub offset: u64,
    /// Topic the message was published to.
    pub topic: String,
    /// Serialized payload (JSON).
    pub payload: String,
    /// When the broker accepted the message.
    pub published_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(offset: u64, topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            offset,
            topic: topic.into(),
            payload: payload.into(),
            published_at: Utc::now(),
        }
    }

    /// Deserializes the payload into `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        value: u32,
    }

    #[test]
    fn decode_reads_json_payload() {
        let message = Message::new(0, "ping", r#"{"value": 7, "extra": true}"#);
        let ping: Ping = message.decode().unwrap();
        assert_eq!(ping, Ping { value: 7 });
    }

    #[test]
    fn decode_reports_malformed_payload() {
        let message = Message::new(0, "ping", "not json");
        let result: crate::Result<Ping> = message.decode();
        assert!(matches!(result, Err(crate::BrokerError::Serialization(_))));
    }
}
