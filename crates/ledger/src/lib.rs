//! Stock ledger (append-only movement log with running balances).
//!
//! Pure domain logic only: no IO, no persistence concerns.

pub mod ledger;

pub use ledger::{
    FlowMetadata, MovementDirection, StockBalance, StockLedgerEntry, StockMovement, replay,
};
