//! Transactional persistence boundary of the warehouse core.
//!
//! Every public operation runs as one unit of work through
//! [`WarehouseStore::transaction`]: either all writes of the closure become
//! visible or none do. Aggregates (orders, unit loads) are saved with a
//! compare-and-swap on their version counter.

pub mod candidates;
pub mod in_memory;

pub use candidates::{Candidate, CandidateCursor, CandidateKey, CandidateQuery};
pub use in_memory::InMemoryWarehouseStore;

use std::sync::Arc;

use rackwms_core::{CellId, LanewayId, LocationId, OutboundOrderId, UnitLoadId};
use rackwms_inventory::{Cell, Laneway, Location, StockIdentity, UnitLoad};
use rackwms_ledger::{StockBalance, StockLedgerEntry};
use rackwms_outbound::OutboundOrder;

use crate::error::WmsResult;

/// Operations available inside one unit of work.
pub trait WarehouseTx {
    fn order(&self, id: OutboundOrderId) -> WmsResult<OutboundOrder>;
    fn insert_order(&mut self, order: OutboundOrder) -> WmsResult<()>;
    /// Compare-and-swap save; bumps `order`'s version on success.
    fn save_order(&mut self, order: &mut OutboundOrder) -> WmsResult<()>;

    fn unit_load(&self, id: UnitLoadId) -> WmsResult<UnitLoad>;
    fn unit_load_by_code(&self, code: &str) -> WmsResult<UnitLoad>;
    fn insert_unit_load(&mut self, unit_load: UnitLoad) -> WmsResult<()>;
    /// Compare-and-swap save; bumps `unit_load`'s version on success.
    fn save_unit_load(&mut self, unit_load: &mut UnitLoad) -> WmsResult<()>;
    /// Compare-and-swap delete.
    fn delete_unit_load(&mut self, unit_load: &UnitLoad) -> WmsResult<()>;
    fn unit_loads_at(&self, location_id: LocationId) -> WmsResult<Vec<UnitLoad>>;

    fn location(&self, id: LocationId) -> WmsResult<Location>;
    fn location_by_code(&self, code: &str) -> WmsResult<Location>;
    /// `(code, id)` of every location, for code lookup caches.
    fn location_codes(&self) -> WmsResult<Vec<(String, LocationId)>>;
    fn save_location(&mut self, location: Location) -> WmsResult<()>;
    fn locations_in_laneway(&self, laneway_id: LanewayId) -> WmsResult<Vec<Location>>;

    fn cell(&self, id: CellId) -> WmsResult<Cell>;
    fn save_cell(&mut self, cell: Cell) -> WmsResult<()>;

    fn laneway(&self, id: LanewayId) -> WmsResult<Laneway>;
    fn save_laneway(&mut self, laneway: Laneway) -> WmsResult<()>;

    /// One page of candidates strictly after `after`, in [`CandidateKey`]
    /// order, at most `limit` long.
    fn candidate_page(
        &self,
        query: &CandidateQuery,
        after: Option<&CandidateKey>,
        limit: usize,
    ) -> WmsResult<Vec<Candidate>>;

    /// Candidates held on the given unit loads (ignoring the query's
    /// exclusion of forced loads), in [`CandidateKey`] order.
    fn candidates_on(
        &self,
        query: &CandidateQuery,
        unit_loads: &[UnitLoadId],
    ) -> WmsResult<Vec<Candidate>>;

    fn stock_balance(&self, stock: &StockIdentity) -> WmsResult<Option<StockBalance>>;
    fn save_stock_balance(&mut self, balance: StockBalance) -> WmsResult<()>;
    /// Append-only; entries are never updated or removed.
    fn append_flow(&mut self, entry: StockLedgerEntry) -> WmsResult<()>;
    /// Entries of one stock identity in posting order.
    fn flows(&self, stock: &StockIdentity) -> WmsResult<Vec<StockLedgerEntry>>;
}

/// Source of units of work.
pub trait WarehouseStore: Send + Sync {
    /// Run `work` atomically. An `Err` discards every write it made.
    fn transaction<R, F>(&self, work: F) -> WmsResult<R>
    where
        F: FnOnce(&mut dyn WarehouseTx) -> WmsResult<R>;
}

impl<S: WarehouseStore> WarehouseStore for Arc<S> {
    fn transaction<R, F>(&self, work: F) -> WmsResult<R>
    where
        F: FnOnce(&mut dyn WarehouseTx) -> WmsResult<R>,
    {
        (**self).transaction(work)
    }
}
