//! Warehouse notifications: event trait, notification envelope and pub/sub
//! transport.
//!
//! The fulfillment core fires notifications after an outbound order closes
//! or a location changes state. Delivery is fire-and-forget; consumers
//! (dashboards, device drivers) live outside the core.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{Notification, NotificationError};
