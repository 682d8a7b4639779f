use chrono::{DateTime, Utc};

/// A warehouse event.
///
/// Events are immutable facts with a stable type tag
/// (e.g. "outbound.order.closed") and a schema version.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event type identifier.
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}
