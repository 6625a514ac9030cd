//! Realtime notification channel frames.
//!
//! The channel carries small JSON objects tagged by `type`. The client sends
//! `auth` once per connection and `ping` while authenticated; the server
//! answers with `auth_ok`/`pong` and otherwise pushes bare notification
//! objects (whose own `type` field is the notification category).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FrameError;
use crate::models::NotificationEvent;

/// Frames sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth { token: String },
    Ping,
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }
}

/// Frames received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    AuthOk,
    Pong,
    Notification(NotificationEvent),
}

impl ServerFrame {
    /// Decode a text frame.
    ///
    /// Control frames are recognized by their `type`; everything else must
    /// have the shape of a [`NotificationEvent`].
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::Json)?;
        if !value.is_object() {
            return Err(FrameError::NotAnObject);
        }

        match value.get("type").and_then(Value::as_str) {
            Some("auth_ok") => Ok(ServerFrame::AuthOk),
            Some("pong") => Ok(ServerFrame::Pong),
            _ => serde_json::from_value(value)
                .map(ServerFrame::Notification)
                .map_err(FrameError::Shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationCategory;

    #[test]
    fn client_frames_match_wire_format() {
        let auth = ClientFrame::Auth {
            token: "abc".to_string(),
        };
        assert_eq!(auth.to_json().unwrap(), r#"{"type":"auth","token":"abc"}"#);
        assert_eq!(ClientFrame::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn decodes_control_frames() {
        assert_eq!(ServerFrame::decode(r#"{"type":"auth_ok"}"#).unwrap(), ServerFrame::AuthOk);
        assert_eq!(ServerFrame::decode(r#"{"type":"pong"}"#).unwrap(), ServerFrame::Pong);
    }

    #[test]
    fn decodes_notification() {
        let frame = ServerFrame::decode(
            r#"{"id":"n1","type":"calculation_done","title":"X","message":"done","link":"/calculations/7","read":false,"created_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        let ServerFrame::Notification(ev) = frame else {
            panic!("expected notification, got {frame:?}");
        };
        assert_eq!(ev.id.as_str(), "n1");
        assert_eq!(ev.category, NotificationCategory::CalculationDone);
        assert_eq!(ev.link.as_deref(), Some("/calculations/7"));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(ServerFrame::decode("not json"), Err(FrameError::Json(_))));
        assert!(matches!(ServerFrame::decode("[1,2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(ServerFrame::decode(r#"{"foo":1}"#), Err(FrameError::Shape(_))));
    }
}
