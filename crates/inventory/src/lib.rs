//! Inventory domain module: stock identities, unit loads and the storage
//! topology (locations, double-deep cells, laneways).
//!
//! Pure domain logic only (no IO, no persistence). Counter maintenance for
//! locations and laneway usage statistics lives here as plain state
//! transitions; the capacity tracker in `rackwms-infra` sequences them inside
//! a transaction.

pub mod laneway;
pub mod location;
pub mod stock;
pub mod unit_load;

pub use laneway::{Laneway, LanewayUsage, UsageMap};
pub use location::{
    Cell, CellShape, DEPTH_FAR, DEPTH_NEAR, Location, LocationKind, NON_EXISTENT_LOCATION_CODE,
    OccupancyChange, StorageProfileKey,
};
pub use stock::StockIdentity;
pub use unit_load::{AllocationTarget, InventoryItem, ItemDecrease, TransportTask, UnitLoad};
