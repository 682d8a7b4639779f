//! Outbound demand: orders, demand lines and allocation records.
//!
//! Pure domain logic only. An order's reservations live on its lines, so
//! the order is the consistency boundary for shortage bookkeeping.

pub mod order;

pub use order::{AllocationRecord, DemandLine, NewDemandLine, OutboundOrder};
