//! Fan-out of lead events to connected observers
//!
//! Publishing is fire-and-forget: events go to whoever is subscribed at that
//! moment, nothing is buffered for observers that join later, and a missing
//! audience is not an error.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::models::Lead;
use crate::scheduler::StatsSnapshot;

/// Default per-observer buffer before a slow observer starts lagging
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// ============================================================================
// Events
// ============================================================================

/// Events pushed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum LeadEvent {
    /// A lead stamped with the rotated source
    #[serde(rename = "newLead")]
    NewLead(Lead),

    /// Dashboard counters after the emission that produced them
    #[serde(rename = "updateStats")]
    UpdateStats(StatsSnapshot),
}

impl LeadEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewLead(_) => "newLead",
            Self::UpdateStats(_) => "updateStats",
        }
    }

    /// JSON payload without the event envelope
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            Self::NewLead(lead) => serde_json::to_string(lead),
            Self::UpdateStats(stats) => serde_json::to_string(stats),
        }
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Sink the emission loop publishes into
pub trait EventPublisher: Send + Sync {
    /// Deliver an event to all current observers, returning how many
    fn publish(&self, event: LeadEvent) -> usize;
}

/// [`EventPublisher`] over a `tokio::sync::broadcast` channel
#[derive(Debug)]
pub struct BroadcastHub {
    sender: broadcast::Sender<LeadEvent>,
    published: AtomicU64,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Register a new observer; it sees only events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LeadEvent> {
        self.sender.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published since creation, whether or not anyone listened
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventPublisher for BroadcastHub {
    fn publish(&self, event: LeadEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let name = event.name();
        // send only fails when nobody is subscribed
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = name, receivers, "event published");
                receivers
            }
            Err(_) => {
                tracing::debug!(event = name, "event published with no observers");
                0
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{StatsAggregator, StatsSeed};

    fn stats_event() -> LeadEvent {
        let stats = StatsAggregator::new(StatsSeed::default(), Some(1)).unwrap();
        LeadEvent::UpdateStats(stats.snapshot())
    }

    #[test]
    fn test_publish_without_observers() {
        let hub = BroadcastHub::new(8);
        assert_eq!(hub.observer_count(), 0);
        assert_eq!(hub.publish(stats_event()), 0);
        assert_eq!(hub.published_count(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_observers() {
        let hub = BroadcastHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let event = LeadEvent::NewLead(Lead::new("Asha Verma", "9876500001"));
        assert_eq!(hub.publish(event.clone()), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_no_history() {
        let hub = BroadcastHub::new(8);
        let _early = hub.subscribe();
        hub.publish(stats_event());

        let mut late = hub.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_observer_count_tracks_drops() {
        let hub = BroadcastHub::default();
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_eq!(hub.observer_count(), 2);
        drop(a);
        assert_eq!(hub.observer_count(), 1);
        drop(b);
        assert_eq!(hub.observer_count(), 0);
    }

    #[test]
    fn test_event_wire_format() {
        let lead = Lead::new("Ravi Jain", "9876500002");
        let event = LeadEvent::NewLead(lead.clone());
        assert_eq!(event.name(), "newLead");

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "newLead");
        assert_eq!(json["data"]["name"], "Ravi Jain");

        let payload: serde_json::Value =
            serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(payload["mobile"], "9876500002");

        let stats = stats_event();
        assert_eq!(stats.name(), "updateStats");
        let payload: serde_json::Value =
            serde_json::from_str(&stats.payload_json().unwrap()).unwrap();
        assert_eq!(payload["dailyLeadsCount"], 0);
        assert_eq!(payload["activeCrawlers"], 12);
        assert!(payload["conversionRateChange"].is_number());
    }
}
