//! Transient user-facing popups.
//!
//! The store raises toasts; rendering them is the UI's job. [`ToastSink`] is
//! the seam between the two and must never block.

use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use mfgdesk_shared::NotificationEvent;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

/// A popup to show for a limited time.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    /// Where to navigate when the toast's action is clicked
    pub link: Option<String>,
    pub duration: Duration,
}

impl Toast {
    pub fn for_notification(event: &NotificationEvent, duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            level: ToastLevel::Info,
            title: event.title.clone(),
            message: event.message.clone(),
            link: event.link.clone(),
            duration,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            level: ToastLevel::Error,
            title: title.into(),
            message: message.into(),
            link: None,
            duration,
        }
    }
}

/// Receives toasts for presentation.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}

/// Sink that forwards toasts over an unbounded channel to a UI task.
#[derive(Clone)]
pub struct ChannelToasts {
    sender: UnboundedSender<Toast>,
}

impl ChannelToasts {
    pub fn channel() -> (Self, UnboundedReceiver<Toast>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl ToastSink for ChannelToasts {
    fn show(&self, toast: Toast) {
        if let Err(e) = self.sender.unbounded_send(toast) {
            crate::log_debug!("Dropping toast, receiver gone: {}", e);
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToasts;

impl ToastSink for NoToasts {
    fn show(&self, _toast: Toast) {}
}
