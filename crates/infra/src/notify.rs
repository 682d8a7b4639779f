//! Fire-and-forget notifications emitted by the warehouse service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rackwms_core::{LanewayId, LocationId, OutboundOrderId};
use rackwms_events::{Event, EventBus, Notification};

pub const ORDER_CLOSED: &str = "outbound.order.closed";
pub const LOCATION_CHANGED: &str = "location.changed";

/// Events the core announces after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WarehouseEvent {
    OrderClosed {
        order_id: OutboundOrderId,
        order_code: String,
        occurred_at: DateTime<Utc>,
    },
    LocationChanged {
        location_id: LocationId,
        location_code: String,
        laneway_id: Option<LanewayId>,
        inbound_disabled: bool,
        exists: bool,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for WarehouseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WarehouseEvent::OrderClosed { .. } => ORDER_CLOSED,
            WarehouseEvent::LocationChanged { .. } => LOCATION_CHANGED,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WarehouseEvent::OrderClosed { occurred_at, .. }
            | WarehouseEvent::LocationChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Receiver of warehouse notifications. Failures never propagate.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &WarehouseEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _event: &WarehouseEvent) {}
}

/// Sink publishing [`Notification`] envelopes on an event bus.
#[derive(Debug)]
pub struct BusSink<B> {
    bus: B,
}

impl<B> BusSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> NotificationSink for BusSink<B>
where
    B: EventBus<Notification>,
{
    fn notify(&self, event: &WarehouseEvent) {
        let notification = match Notification::from_event(event) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(
                    event_type = event.event_type(),
                    error = %e,
                    "dropping notification"
                );
                return;
            }
        };
        if let Err(e) = self.bus.publish(notification) {
            tracing::warn!(
                event_type = event.event_type(),
                error = ?e,
                "notification publish failed"
            );
        }
    }
}
