//! Change fan-out to live subscriptions.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use super::{Change, Topic};

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, (Topic, Sender<Change>)>,
}

/// Routes published changes to the subscriptions whose topic matches.
#[derive(Clone, Default)]
pub struct ChangeHub {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription for `topic`.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (sender, receiver) = channel();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, (topic.clone(), sender));
        info!(subscription = id, ?topic, "subscribed");

        Subscription {
            id,
            topic,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a change to every matching subscription. Returns deliveries.
    pub fn publish(&self, change: Change) -> usize {
        let topic = change.topic();
        let registry = lock(&self.registry);
        let mut delivered = 0;
        for (id, (subscribed, sender)) in registry.subscribers.iter() {
            if *subscribed == topic && sender.send(change.clone()).is_ok() {
                delivered += 1;
                debug!(subscription = id, "change delivered");
            }
        }
        delivered
    }

    /// Distinct topics with at least one live subscription.
    pub fn active_topics(&self) -> Vec<Topic> {
        let registry = lock(&self.registry);
        let mut topics: Vec<Topic> = Vec::new();
        for (topic, _) in registry.subscribers.values() {
            if !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }
        topics
    }

    /// Live subscriptions for `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        lock(&self.registry)
            .subscribers
            .values()
            .filter(|(t, _)| t == topic)
            .count()
    }
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    // A panic while holding the lock leaves the map itself intact.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A live change-notification subscription.
///
/// Unregisters itself when dropped.
pub struct Subscription {
    id: u64,
    topic: Topic,
    receiver: Receiver<Change>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Take every queued change without blocking.
    pub fn drain(&self) -> Vec<Change> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).subscribers.remove(&self.id);
            info!(subscription = self.id, topic = ?self.topic, "unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawEventRow, RawSubjectRow};

    fn event_change(subject_id: &str) -> Change {
        Change::EventInserted(RawEventRow {
            subject_id: subject_id.into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_publish_routes_by_topic() {
        let hub = ChangeHub::new();
        let subjects = hub.subscribe(Topic::Subjects);
        let s1 = hub.subscribe(Topic::events("S1"));
        let s2 = hub.subscribe(Topic::events("S2"));

        assert_eq!(hub.publish(event_change("S1")), 1);
        assert_eq!(
            hub.publish(Change::SubjectInserted(RawSubjectRow::default())),
            1
        );

        assert_eq!(s1.drain().len(), 1);
        assert!(s2.drain().is_empty());
        assert_eq!(subjects.drain().len(), 1);
        // Drained changes are not delivered twice
        assert!(s1.drain().is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = ChangeHub::new();
        let sub = hub.subscribe(Topic::events("S1"));
        assert_eq!(hub.subscriber_count(&Topic::events("S1")), 1);
        assert_eq!(hub.active_topics(), vec![Topic::events("S1")]);

        drop(sub);
        assert_eq!(hub.subscriber_count(&Topic::events("S1")), 0);
        assert_eq!(hub.publish(event_change("S1")), 0);
    }

    #[test]
    fn test_subscription_outlives_hub() {
        let hub = ChangeHub::new();
        let sub = hub.subscribe(Topic::Subjects);
        drop(hub);
        assert!(sub.drain().is_empty());
        drop(sub);
    }
}
