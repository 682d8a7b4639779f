use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::event::Event;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("failed to serialize notification payload: {0}")]
    Serialize(String),
}

/// Envelope delivered to notification consumers.
///
/// Carries the event type tag, schema version and a JSON payload so that
/// consumers outside the core do not need the typed event definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    event_id: Uuid,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    payload: JsonValue,
}

impl Notification {
    pub fn new(
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            event_version,
            occurred_at,
            payload,
        }
    }

    /// Wrap a typed event, serializing it into the payload.
    pub fn from_event<E>(event: &E) -> Result<Self, NotificationError>
    where
        E: Event + Serialize,
    {
        let payload =
            serde_json::to_value(event).map_err(|e| NotificationError::Serialize(e.to_string()))?;
        Ok(Self::new(
            event.event_type(),
            event.version(),
            event.occurred_at(),
            payload,
        ))
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }
}
