//! Event deduplication and fan-out.
//!
//! The server may redeliver notifications after a reconnect, so every event
//! passes through [`Deduplicator`] before [`Dispatcher`] hands it to
//! subscribers.

use std::collections::HashSet;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use mfgdesk_shared::{NotificationEvent, NotificationId};

/// Remembers every notification id seen during the session.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<NotificationId>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time an id is offered, `false` afterwards.
    pub fn admit(&mut self, event: &NotificationEvent) -> bool {
        self.seen.insert(event.id.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Fans events out to subscribers without waiting on any of them.
///
/// Each subscriber owns an unbounded queue; delivery happens whenever the
/// subscriber's task next polls it.
#[derive(Debug, Default)]
pub struct Dispatcher {
    subscribers: Vec<UnboundedSender<NotificationEvent>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<NotificationEvent> {
        let (tx, rx) = unbounded();
        self.add(tx);
        rx
    }

    pub fn add(&mut self, subscriber: UnboundedSender<NotificationEvent>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Queue `event` for every live subscriber; closed ones are dropped.
    pub fn dispatch(&mut self, event: &NotificationEvent) {
        self.subscribers
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures_util::StreamExt;
    use mfgdesk_shared::NotificationCategory;

    fn event(id: &str) -> NotificationEvent {
        NotificationEvent {
            id: id.into(),
            category: NotificationCategory::NewEmail,
            title: format!("Mail {id}"),
            message: String::new(),
            link: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn repeated_ids_are_admitted_once() {
        let mut dedup = Deduplicator::new();
        let ids = ["a", "b", "a", "c", "b", "a"];
        let admitted: Vec<_> = ids
            .iter()
            .filter(|id| dedup.admit(&event(id)))
            .copied()
            .collect();
        assert_eq!(admitted, vec!["a", "b", "c"]);
        assert_eq!(dedup.len(), 3);

        dedup.clear();
        assert!(dedup.is_empty());
        assert!(dedup.admit(&event("a")));
    }

    #[tokio::test]
    async fn dispatch_reaches_every_subscriber_in_order() {
        let mut dispatcher = Dispatcher::new();
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();

        dispatcher.dispatch(&event("1"));
        dispatcher.dispatch(&event("2"));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.next().await.unwrap().id.as_str(), "1");
            assert_eq!(rx.next().await.unwrap().id.as_str(), "2");
        }
    }

    #[test]
    fn closed_subscribers_are_pruned() {
        let mut dispatcher = Dispatcher::new();
        let kept = dispatcher.subscribe();
        drop(dispatcher.subscribe());
        assert_eq!(dispatcher.subscriber_count(), 2);

        dispatcher.dispatch(&event("1"));
        assert_eq!(dispatcher.subscriber_count(), 1);
        drop(kept);
    }
}
