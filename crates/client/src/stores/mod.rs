//! Application state shared across the session.

pub mod notifications;

pub use notifications::{NotificationState, NotificationStore};
