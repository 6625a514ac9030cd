//! WebSocket module for real-time notification delivery.
//!
//! This module provides:
//! - The session transport with its auth handshake and keep-alive
//! - A reconnection supervisor with a fixed delay and a retry ceiling
//! - Deduplication of redelivered events and fan-out to subscribers
//!
//! # Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────┐
//!   │               WsConnection task               │
//!   │                                               │
//!   │  socket ──► ServerFrame::decode ──┐           │
//!   │                                   ▼           │
//!   │  Supervisor ◄── inputs      Deduplicator      │
//!   │      │                            │           │
//!   │      ▼ effects (timers, send)     ▼           │
//!   │  keep-alive / reconnect      Dispatcher       │
//!   └───────────────────────────────────┬───────────┘
//!                                       │ unbounded queues
//!                        ┌──────────────┼──────────────┐
//!                        ▼              ▼              ▼
//!                 NotificationStore  other subscribers ...
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let credentials = Credentials::new(Some(Credential::new(token)));
//! let connection = WsConnection::spawn(ClientConfig::from_env(), credentials.clone());
//! let mut events = connection.handle().subscribe();
//! while let Some(event) = events.next().await {
//!     println!("{}: {}", event.title, event.message);
//! }
//! ```

mod connection;
mod dispatch;
mod supervisor;

pub use connection::{WsConnection, WsHandle};
pub use dispatch::{Deduplicator, Dispatcher};
pub use supervisor::{transition, Effect, Input, SessionPhase, Supervisor, SupervisorState};
