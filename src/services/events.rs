//! Event system for marketplace mutations
//!
//! Every successful write emits a [`MarketEvent`] on the shared bus. The
//! binary attaches a logging listener; other subscribers (notifications,
//! cache invalidation) can attach the same way.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Marketplace events emitted by services
#[derive(Debug, Clone)]
pub enum MarketEvent {
    ProfileSaved {
        user_id: String,
    },

    OrganizationCreated {
        id: String,
        name: String,
        org_type: String,
    },
    LogisticsUpdated {
        organization_id: String,
    },

    ProductCreated {
        id: String,
        organization_id: String,
        is_surplus: bool,
    },
    ProductAvailabilityChanged {
        id: String,
        available: bool,
    },

    DemandRequestCreated {
        id: String,
        organization_id: String,
        product_name: String,
    },
    DemandRequestStatusChanged {
        id: String,
        status: String,
    },
    OfferCreated {
        id: String,
        demand_request_id: String,
        farm_organization_id: String,
    },
    OfferStatusChanged {
        id: String,
        status: String,
    },

    CommitmentCreated {
        id: String,
        restaurant_organization_id: String,
        farm_organization_id: String,
    },
    CommitmentStatusChanged {
        id: String,
        from: String,
        to: String,
    },
    DeliveryScheduled {
        id: String,
        commitment_id: String,
        scheduled_date: String,
    },
    DeliveryUpdated {
        id: String,
        commitment_id: String,
        status: String,
    },

    MessageSent {
        id: String,
        from_organization_id: String,
        to_organization_id: String,
    },
    MessageRead {
        id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &MarketEvent);
}

/// Broadcast bus for marketplace events
pub struct EventBus {
    sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: MarketEvent) {
        trace!(event = ?event, "Emitting market event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &MarketEvent) {
        match event {
            MarketEvent::OrganizationCreated { id, name, org_type } => {
                info!(id = %id, name = %name, org_type = %org_type, "Organization created");
            }
            MarketEvent::CommitmentCreated {
                id,
                restaurant_organization_id,
                farm_organization_id,
            } => {
                info!(
                    id = %id,
                    restaurant = %restaurant_organization_id,
                    farm = %farm_organization_id,
                    "Commitment created"
                );
            }
            MarketEvent::CommitmentStatusChanged { id, from, to } => {
                info!(id = %id, from = %from, to = %to, "Commitment status changed");
            }
            MarketEvent::DeliveryUpdated { id, commitment_id, status } => {
                debug!(id = %id, commitment = %commitment_id, status = %status, "Delivery updated");
            }
            MarketEvent::OfferStatusChanged { id, status } => {
                debug!(id = %id, status = %status, "Offer decided");
            }
            _ => {
                trace!(event = ?event, "Market event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(MarketEvent::MessageRead { id: "m1".into() });

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timeout")
            .expect("recv");
        assert!(matches!(event, MarketEvent::MessageRead { id } if id == "m1"));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(MarketEvent::ProfileSaved { user_id: "u1".into() });
    }
}
