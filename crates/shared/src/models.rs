//! Notification data models shared by the dashboard client and backend tooling.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// --- Identity ---

/// Server-assigned notification identity.
///
/// The backend emits numeric ids on some endpoints and string ids on others,
/// so both are accepted and held as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Ok(Self(s)),
            RawId::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

// --- Notifications ---

/// Kind of state change a notification describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    NewEmail,
    SyncComplete,
    CalculationDone,
    StatusChanged,
    DocumentUploaded,
    /// Any kind this client does not know yet.
    #[serde(other)]
    Other,
}

/// A server-pushed record describing a change relevant to the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub category: NotificationCategory,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(alias = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

/// Response body of the notification listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationEvent>,
    #[serde(default)]
    pub unread_count: usize,
}

/// Query parameters for the notification listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationQuery {
    pub unread_only: bool,
    pub limit: usize,
}

impl NotificationQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            unread_only: false,
            limit,
        }
    }

    pub fn unread(limit: usize) -> Self {
        Self {
            unread_only: true,
            limit,
        }
    }

    /// Render as `key=value` pairs for a query string.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if self.unread_only {
            pairs.push(("unread_only", "true".to_string()));
        }
        pairs
    }
}
