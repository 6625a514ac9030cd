//! MfgDesk notification client
//!
//! Real-time notification delivery for the manufacturing dashboard: a
//! supervised WebSocket session, a deduplicating dispatcher and the
//! notification store the UI renders from.

pub mod logging;

pub mod api_client;
pub mod config;
pub mod credentials;
pub mod session;
pub mod stores;
pub mod toast;
pub mod ws;

pub use api_client::{ApiClient, NotificationApi};
pub use config::{ClientConfig, ConfigError, ReconnectConfig};
pub use credentials::{Credential, Credentials};
pub use session::NotificationSession;
pub use stores::{NotificationState, NotificationStore};
pub use toast::{ChannelToasts, NoToasts, Toast, ToastLevel, ToastSink};
pub use ws::{SessionPhase, WsConnection, WsHandle};
