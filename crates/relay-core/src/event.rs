//! Event payloads handed to the broadcaster.

use serde::Serialize;
use std::sync::Arc;

/// A notification event, serialized once and shared across recipients.
///
/// The payload is rendered to JSON text at construction time so that a
/// broadcast clones an `Arc` per recipient instead of re-serializing, and
/// every recipient receives byte-identical text.
#[derive(Debug, Clone)]
pub struct Event {
    text: Arc<str>,
}

impl Event {
    /// Serialize a payload into an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be rendered as JSON.
    pub fn new<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        let text = serde_json::to_string(payload)?;
        Ok(Self { text: text.into() })
    }

    /// The serialized JSON text of this event.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Size of the serialized payload in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = Event::new(&json!({"new_favorite_number": 42})).unwrap();
        assert_eq!(event.as_str(), r#"{"new_favorite_number":42}"#);
        assert_eq!(event.payload_size(), event.as_str().len());
    }

    #[test]
    fn test_event_clones_share_text() {
        let event = Event::new(&json!({"k": "v"})).unwrap();
        let clone = event.clone();
        assert_eq!(event.as_str(), clone.as_str());
        assert!(std::ptr::eq(event.as_str(), clone.as_str()));
    }
}
