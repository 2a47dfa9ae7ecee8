//! Refresh notifications for the presentation layer.
//!
//! Every fetch cycle announces itself with a `refresh_started` event and ends
//! with a `refresh_finished` event carrying the full published result.
//! Subscribers see only the events of the consumer they subscribed to.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::{Category, ConsumerId, StationTimetable, TrafficReport};

/// Buffered events per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Result published at the end of a fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", content = "result", rename_all = "lowercase")]
pub enum Published {
    Timetables(Vec<StationTimetable>),
    Traffic(Vec<TrafficReport>),
}

impl Published {
    pub fn category(&self) -> Category {
        match self {
            Published::Timetables(_) => Category::Timetables,
            Published::Traffic(_) => Category::Traffic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// The consumer was registered and its snapshots are empty.
    Registered,
    /// A fetch cycle started; drives a loading indicator.
    RefreshStarted { category: Category },
    /// A fetch cycle published; replaces the displayed content.
    RefreshFinished(Published),
}

impl EventKind {
    /// Short name, used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Registered => "registered",
            EventKind::RefreshStarted { .. } => "refresh_started",
            EventKind::RefreshFinished(_) => "refresh_finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub consumer: ConsumerId,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Broadcast channel of events for all consumers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<Event>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Events with no subscriber are dropped.
    pub fn publish(&self, consumer: &ConsumerId, kind: EventKind) {
        let event = Event {
            consumer: consumer.clone(),
            kind,
        };
        // An error only means nobody is listening right now.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to the events of one consumer.
    pub fn subscribe(&self, consumer: ConsumerId) -> Subscription {
        Subscription {
            consumer,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Event stream of one consumer.
#[derive(Debug)]
pub struct Subscription {
    consumer: ConsumerId,
    receiver: broadcast::Receiver<Arc<Event>>,
}

impl Subscription {
    pub fn consumer(&self) -> &ConsumerId {
        &self.consumer
    }

    /// Wait for the next event of this consumer.
    ///
    /// A subscriber that falls behind skips the events it missed; the next
    /// `refresh_finished` carries complete content again. Returns `None` once
    /// the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.consumer == self.consumer => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(consumer = %self.consumer, skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_filters_by_consumer() {
        let bus = EventBus::new();
        let hallway = ConsumerId::from("hallway");
        let kitchen = ConsumerId::from("kitchen");
        let mut events = bus.subscribe(hallway.clone());

        bus.publish(&kitchen, EventKind::Registered);
        bus.publish(
            &hallway,
            EventKind::RefreshStarted {
                category: Category::Traffic,
            },
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event.consumer, hallway);
        assert_eq!(
            event.kind,
            EventKind::RefreshStarted {
                category: Category::Traffic
            }
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(&ConsumerId::from("nobody"), EventKind::Registered);
    }

    #[tokio::test]
    async fn closed_bus_ends_subscription() {
        let bus = EventBus::new();
        let mut events = bus.subscribe(ConsumerId::from("hallway"));
        drop(bus);

        assert!(events.recv().await.is_none());
    }

    #[test]
    fn event_wire_shape() {
        let event = Event {
            consumer: ConsumerId::from("hallway"),
            kind: EventKind::RefreshFinished(Published::Traffic(Vec::new())),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["consumer"], "hallway");
        assert_eq!(json["kind"], "refresh_finished");
        assert_eq!(json["category"], "traffic");
        assert_eq!(json["result"], serde_json::json!([]));

        let started = serde_json::to_value(Event {
            consumer: ConsumerId::from("hallway"),
            kind: EventKind::RefreshStarted {
                category: Category::Timetables,
            },
        })
        .unwrap();
        assert_eq!(started["kind"], "refresh_started");
        assert_eq!(started["category"], "timetables");
    }
}
