//! Infrastructure layer: transactional store, fulfillment engines, config,
//! notifications and the service facade tying them together.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod notify;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use cache::LocationCodeCache;
pub use config::{AllocationOptions, MAX_CHUNK_SIZE, WmsConfig};
pub use engine::{AllocationSummary, PickRequest, Rejection};
pub use error::{StoreError, WmsError, WmsResult};
pub use factory::{DefaultEntityFactory, EntityFactory};
pub use notify::{BusSink, NotificationSink, NullSink, WarehouseEvent};
pub use service::{ReceivedStock, WarehouseService};
pub use store::{InMemoryWarehouseStore, WarehouseStore, WarehouseTx};
