//! `rackwms-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the warehouse
//! crates (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::{Entity, Versioned};
pub use error::{DomainError, DomainResult};
pub use id::{
    AllocationId, CellId, DemandLineId, FlowId, InventoryItemId, LanewayId, LocationId,
    OutboundOrderId, UnitLoadId,
};
pub use quantity::Quantity;
pub use value_object::ValueObject;
