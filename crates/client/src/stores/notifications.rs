//! Notification store.
//!
//! Holds every notification seen during the session (most recent first)
//! and the unread counter that drives the badge. All mutations go through a
//! single `send_modify`, so subscribers never see the list and the counter
//! disagree.
//!
//! `mark_read` and `mark_all_read` are optimistic: the local change is
//! visible immediately and is *not* rolled back when the server refuses it.
//! The user gets an error toast instead, and the next `load_initial` brings
//! the list back in line with the server.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::StreamExt;
use mfgdesk_shared::{NotificationEvent, NotificationId, NotificationQuery};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api_client::NotificationApi;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::toast::{Toast, ToastSink};

/// Snapshot of the held notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    items: VecDeque<NotificationEvent>,
    unread: usize,
}

impl NotificationState {
    /// All held notifications, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.items.iter()
    }

    /// The `n` most recent notifications, for dropdowns and lists.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &NotificationEvent> {
        self.items.iter().take(n)
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationEvent> {
        self.items.iter().find(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Returns `false` if an entry with the same id is already held.
    fn insert_newest(&mut self, event: NotificationEvent) -> bool {
        if self.get(&event.id).is_some() {
            return false;
        }
        if event.is_unread() {
            self.unread += 1;
        }
        self.items.push_front(event);
        true
    }

    /// Returns `true` if the entry went from unread to read.
    fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|e| &e.id == id) {
            Some(entry) if entry.is_unread() => {
                entry.read = true;
                self.unread -= 1;
                true
            }
            _ => false,
        }
    }

    /// Returns how many entries changed.
    fn mark_all_read(&mut self) -> usize {
        let changed = self.unread;
        for entry in self.items.iter_mut() {
            entry.read = true;
        }
        self.unread = 0;
        changed
    }

    /// Make `baseline` (from the server) the held list, keeping entries that
    /// were pushed after the server built it.
    fn reconcile(&mut self, baseline: Vec<NotificationEvent>) {
        let newest = baseline.iter().map(|e| e.created_at).max();
        let pushed_since: Vec<NotificationEvent> = {
            let known: HashSet<&NotificationId> = baseline.iter().map(|e| &e.id).collect();
            self.items
                .drain(..)
                .filter(|e| !known.contains(&e.id))
                .filter(|e| newest.map_or(true, |newest| e.created_at > newest))
                .collect()
        };

        let mut seen = HashSet::new();
        self.items = pushed_since
            .into_iter()
            .chain(baseline)
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        self.unread = self.items.iter().filter(|e| e.is_unread()).count();
    }

    fn clear(&mut self) {
        self.items.clear();
        self.unread = 0;
    }
}

struct Inner {
    state: watch::Sender<NotificationState>,
    api: Arc<dyn NotificationApi>,
    credentials: Credentials,
    toasts: Arc<dyn ToastSink>,
    initial_limit: usize,
    toast_duration: Duration,
}

/// Session-wide notification store. Clones share the same state.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Inner>,
}

impl NotificationStore {
    pub fn new(
        config: &ClientConfig,
        api: Arc<dyn NotificationApi>,
        credentials: Credentials,
        toasts: Arc<dyn ToastSink>,
    ) -> Self {
        let (state, _rx) = watch::channel(NotificationState::default());
        Self {
            inner: Arc::new(Inner {
                state,
                api,
                credentials,
                toasts,
                initial_limit: config.initial_limit,
                toast_duration: config.toast_duration,
            }),
        }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.inner.state.subscribe()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.state.borrow().unread_count()
    }

    /// Fetch the most recent notifications and make them the baseline.
    ///
    /// Does nothing without a credential. Failures are logged and leave the
    /// held state untouched.
    pub async fn load_initial(&self) {
        let Some(credential) = self.inner.credentials.current() else {
            crate::log_debug!("Skipping notification load, no credential");
            return;
        };

        let query = NotificationQuery::recent(self.inner.initial_limit);
        let page = match self.inner.api.fetch_notifications(&credential, query).await {
            Ok(page) => page,
            Err(e) => {
                crate::log_warn!("Failed to load notifications: {}", e);
                return;
            }
        };

        if self.inner.credentials.current().as_ref() != Some(&credential) {
            crate::log_debug!("Credential changed during notification load, discarding result");
            return;
        }

        let fetched = page.notifications.len();
        self.inner.state.send_modify(|state| state.reconcile(page.notifications));

        let held_unread = self.unread_count();
        if held_unread != page.unread_count {
            crate::log_debug!(
                "Server reports {} unread, {} among the {} held",
                page.unread_count,
                held_unread,
                fetched
            );
        }
        crate::log_info!("Loaded {} notifications ({} unread)", fetched, held_unread);
    }

    /// Add a first-seen notification and raise a toast for it.
    ///
    /// Events arriving while signed out are dropped. The credential is
    /// checked under the state lock, so an event racing a logout either lands
    /// before `clear` or not at all.
    pub fn on_event_dispatched(&self, event: NotificationEvent) {
        let toast = Toast::for_notification(&event, self.inner.toast_duration);
        let credentials = &self.inner.credentials;
        let inserted = self.inner.state.send_if_modified(|state| {
            if !credentials.is_present() {
                crate::log_debug!(
                    "Dropping notification {} received while signed out",
                    event.id
                );
                return false;
            }
            state.insert_newest(event)
        });
        if inserted {
            self.inner.toasts.show(toast);
        }
    }

    /// Mark one notification read locally, then confirm with the server.
    pub async fn mark_read(&self, id: &NotificationId) {
        self.inner.state.send_if_modified(|state| state.mark_read(id));

        let Some(credential) = self.inner.credentials.current() else {
            crate::log_debug!("Not confirming read of {}, no credential", id);
            return;
        };
        if let Err(e) = self.inner.api.mark_read(&credential, id).await {
            crate::log_warn!("Server rejected read of {}: {}", id, e);
            self.inner.toasts.show(Toast::error(
                "Could not mark notification as read",
                e.user_message(),
                self.inner.toast_duration,
            ));
        }
    }

    /// Mark everything read locally, then confirm with the server.
    pub async fn mark_all_read(&self) {
        self.inner
            .state
            .send_if_modified(|state| state.mark_all_read() > 0);

        let Some(credential) = self.inner.credentials.current() else {
            crate::log_debug!("Not confirming read-all, no credential");
            return;
        };
        if let Err(e) = self.inner.api.mark_all_read(&credential).await {
            crate::log_warn!("Server rejected read-all: {}", e);
            self.inner.toasts.show(Toast::error(
                "Could not mark notifications as read",
                e.user_message(),
                self.inner.toast_duration,
            ));
        }
    }

    /// Drop everything held (end of the signed-in session).
    pub fn clear(&self) {
        self.inner.state.send_modify(NotificationState::clear);
    }

    /// Feed dispatched events into the store until the sender side closes.
    pub fn attach(&self, mut events: UnboundedReceiver<NotificationEvent>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                store.on_event_dispatched(event);
            }
            crate::log_debug!("Notification event stream ended");
        })
    }
}
