//! Fulfillment engines. Each function runs inside the caller's unit of
//! work and leaves committing to it.

pub mod allocation;
pub mod capacity;
pub mod deallocation;
pub mod ledger;
pub mod picking;

pub use allocation::{AllocationSummary, Rejection};
pub use picking::PickRequest;
