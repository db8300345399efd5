//! Server → client wire events (spec §3 `Event`, §6.1).
//!
//! Grounded on the teacher's `WsJsonMessage` (`ws_audio.rs`) and
//! `CallMessage` (`call_server.rs`): a `#[serde(tag = "type")]` enum with
//! per-variant `rename` to the wire's snake_case type strings.

use serde::Serialize;

use crate::session_id::SessionId;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "session_created")]
    SessionCreated { session_id: SessionId },

    #[serde(rename = "partial")]
    Partial {
        language: String,
        text: String,
        timestamp: f64,
    },

    #[serde(rename = "final")]
    Final {
        language: String,
        text: String,
        timestamp: f64,
        is_speech_final: bool,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl Event {
    pub fn partial(language: Option<&str>, text: String, timestamp: f64) -> Self {
        Event::Partial {
            language: language.unwrap_or_default().to_string(),
            text,
            timestamp,
        }
    }

    pub fn r#final(language: Option<&str>, text: String, timestamp: f64) -> Self {
        Event::Final {
            language: language.unwrap_or_default().to_string(),
            text,
            timestamp,
            is_speech_final: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_created_serializes_with_type_tag() {
        let event = Event::SessionCreated {
            session_id: SessionId::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_created");
        assert!(json["session_id"].is_string());
    }

    #[test]
    fn final_always_carries_is_speech_final_true() {
        let event = Event::r#final(Some("en"), "hello".to_string(), 1.5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "final");
        assert_eq!(json["is_speech_final"], true);
        assert_eq!(json["language"], "en");
    }

    #[test]
    fn partial_defaults_language_to_empty_string() {
        let event = Event::partial(None, "hi".to_string(), 0.3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["language"], "");
    }

    #[test]
    fn error_serializes_message_field() {
        let event = Event::error("config required");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "config required");
    }
}
