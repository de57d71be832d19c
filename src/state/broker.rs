//! Per-team publish/subscribe used by the SSE streams.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::sse::TeamEvent;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<TeamEvent>,
}

/// Registry of team subscribers with bounded, non-blocking delivery.
pub struct Broker {
    subscribers: DashMap<Uuid, Vec<Subscriber>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Broker {
    /// Create a broker whose subscribers buffer up to `capacity` events each.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        })
    }

    /// Register a subscriber for `team_id`. Dropping the returned handle unsubscribes it.
    pub fn subscribe(self: &Arc<Self>, team_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(team_id)
            .or_default()
            .push(Subscriber { id, tx });
        debug!(%team_id, subscriber = id, "team subscriber registered");

        Subscription {
            broker: Arc::clone(self),
            team_id,
            id,
            inner: ReceiverStream::new(rx),
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, team_id: Uuid, id: u64) {
        let emptied = match self.subscribers.get_mut(&team_id) {
            Some(mut entry) => {
                entry.retain(|subscriber| subscriber.id != id);
                entry.is_empty()
            }
            None => false,
        };
        if emptied {
            self.subscribers
                .remove_if(&team_id, |_, subscribers| subscribers.is_empty());
        }
        debug!(%team_id, subscriber = id, "team subscriber removed");
    }

    /// Deliver `event` to every subscriber of `team_id` without waiting.
    ///
    /// Subscribers with a full buffer miss this event; closed ones are pruned.
    pub fn publish(&self, team_id: Uuid, event: TeamEvent) {
        let emptied = match self.subscribers.get_mut(&team_id) {
            Some(mut entry) => {
                entry.retain(|subscriber| match subscriber.tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!(%team_id, subscriber = subscriber.id, "subscriber lagging, event dropped");
                        true
                    }
                    Err(TrySendError::Closed(_)) => false,
                });
                entry.is_empty()
            }
            None => return,
        };
        if emptied {
            self.subscribers
                .remove_if(&team_id, |_, subscribers| subscribers.is_empty());
        }
    }

    /// Number of live subscribers for `team_id`.
    pub fn subscriber_count(&self, team_id: Uuid) -> usize {
        self.subscribers
            .get(&team_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

/// Stream of events for one team, unsubscribed when dropped.
pub struct Subscription {
    broker: Arc<Broker>,
    team_id: Uuid,
    id: u64,
    inner: ReceiverStream<TeamEvent>,
}

impl Subscription {
    /// Team this subscription listens to.
    pub fn team_id(&self) -> Uuid {
        self.team_id
    }
}

impl Stream for Subscription {
    type Item = TeamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.team_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn event(team_id: Uuid, stage: u32) -> TeamEvent {
        TeamEvent::stage_completed(Uuid::nil(), team_id, stage)
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let broker = Broker::new(4);
        let team_id = Uuid::new_v4();
        broker.publish(team_id, event(team_id, 1));
        assert_eq!(broker.subscriber_count(team_id), 0);
    }

    #[tokio::test]
    async fn full_subscriber_only_drops_its_own_copy() {
        let broker = Broker::new(1);
        let team_id = Uuid::new_v4();
        let mut slow = broker.subscribe(team_id);
        let mut fast = broker.subscribe(team_id);

        broker.publish(team_id, event(team_id, 1));
        assert_eq!(fast.next().await, Some(event(team_id, 1)));

        // `slow` still holds stage 1, so stage 2 is dropped for it only.
        broker.publish(team_id, event(team_id, 2));
        assert_eq!(fast.next().await, Some(event(team_id, 2)));
        assert_eq!(slow.next().await, Some(event(team_id, 1)));

        broker.publish(team_id, event(team_id, 3));
        assert_eq!(slow.next().await, Some(event(team_id, 3)));
        assert_eq!(broker.subscriber_count(team_id), 2);
    }

    #[tokio::test]
    async fn events_are_scoped_to_their_team() {
        let broker = Broker::new(4);
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let mut sub_a = broker.subscribe(team_a);
        let _sub_b = broker.subscribe(team_b);

        broker.publish(team_b, event(team_b, 1));
        broker.publish(team_a, event(team_a, 2));
        assert_eq!(sub_a.next().await, Some(event(team_a, 2)));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let broker = Broker::new(4);
        let team_id = Uuid::new_v4();
        let first = broker.subscribe(team_id);
        let second = broker.subscribe(team_id);
        assert_eq!(broker.subscriber_count(team_id), 2);

        drop(first);
        assert_eq!(broker.subscriber_count(team_id), 1);
        drop(second);
        assert_eq!(broker.subscriber_count(team_id), 0);
        assert!(broker.subscribers.get(&team_id).is_none());
    }
}
