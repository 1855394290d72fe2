//! WebSocket Protocol Types
//!
//! Events for client-server communication over the persistent channel. The
//! tag names are the wire contract: they match what browser clients emit and
//! listen for, so renaming a variant here is a breaking protocol change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// Events sent FROM the client TO the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Post a message to the room. The `user` field is client-asserted and
    /// trusted as-is; `timestamp` is optional and store-assigned when absent.
    #[serde(rename = "sendMessage")]
    SendMessage {
        user: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// The named user started composing. Broadcast-only, never persisted.
    #[serde(rename = "typing")]
    Typing { username: String },

    /// The named user stopped composing.
    #[serde(rename = "stopTyping")]
    StopTyping { username: String },
}

/// Events sent FROM the relay TO clients. Every one of these is delivered to
/// all connected sessions except the originator — the sender renders its own
/// message optimistically and is never echoed back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "receiveMessage")]
    ReceiveMessage {
        user: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "userTyping")]
    UserTyping { username: String },

    #[serde(rename = "userStoppedTyping")]
    UserStoppedTyping { username: String },
}

impl ServerEvent {
    pub fn from_message(msg: &ChatMessage) -> Self {
        Self::ReceiveMessage {
            user: msg.user.clone(),
            text: msg.text.clone(),
            timestamp: msg.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn send_message_wire_format() {
        let json = r#"{"type":"sendMessage","user":"Alice","text":"hi","timestamp":"2024-05-01T12:00:00Z"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage {
                user,
                text,
                timestamp,
            } => {
                assert_eq!(user, "Alice");
                assert_eq!(text, "hi");
                assert!(timestamp.is_some());
            }
            _ => panic!("Expected SendMessage"),
        }
    }

    #[test]
    fn send_message_timestamp_is_optional() {
        let json = r#"{"type":"sendMessage","user":"Alice","text":"hi"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage { timestamp, .. } => assert!(timestamp.is_none()),
            _ => panic!("Expected SendMessage"),
        }
    }

    #[test]
    fn typing_events_wire_format() {
        let typing: ClientEvent = serde_json::from_str(r#"{"type":"typing","username":"Bob"}"#).unwrap();
        assert!(matches!(typing, ClientEvent::Typing { username } if username == "Bob"));

        let stop: ClientEvent =
            serde_json::from_str(r#"{"type":"stopTyping","username":"Bob"}"#).unwrap();
        assert!(matches!(stop, ClientEvent::StopTyping { username } if username == "Bob"));
    }

    #[test]
    fn receive_message_serializes_with_wire_tag() {
        let event = ServerEvent::ReceiveMessage {
            user: "Alice".to_string(),
            text: "hi".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "receiveMessage",
                "user": "Alice",
                "text": "hi",
                "timestamp": "2024-05-01T12:00:00Z",
            })
        );
    }

    #[test]
    fn typing_server_events_serialize_with_wire_tags() {
        let typing = ServerEvent::UserTyping {
            username: "Bob".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&typing).unwrap(),
            serde_json::json!({"type": "userTyping", "username": "Bob"})
        );

        let stopped = ServerEvent::UserStoppedTyping {
            username: "Bob".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&stopped).unwrap(),
            serde_json::json!({"type": "userStoppedTyping", "username": "Bob"})
        );
    }
}
