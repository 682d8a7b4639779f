//! Construction of new warehouse entities.
//!
//! Deployments that attach extra data to unit loads, items or ledger rows
//! plug in their own factory; the engines never construct these directly.

use chrono::{DateTime, Utc};

use rackwms_core::{DomainResult, FlowId, InventoryItemId, LocationId, Quantity, UnitLoadId};
use rackwms_inventory::{InventoryItem, StockIdentity, UnitLoad};
use rackwms_ledger::{StockBalance, StockLedgerEntry, StockMovement};

pub trait EntityFactory: Send + Sync {
    fn new_unit_load(
        &self,
        code: &str,
        location_id: LocationId,
        now: DateTime<Utc>,
    ) -> DomainResult<UnitLoad>;

    fn new_item(
        &self,
        unit_load_id: UnitLoadId,
        stock: StockIdentity,
        quantity: Quantity,
        out_ordering: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryItem>;

    fn new_flow(
        &self,
        movement: StockMovement,
        balance: Quantity,
        now: DateTime<Utc>,
    ) -> StockLedgerEntry;

    fn new_stock(&self, stock: StockIdentity, now: DateTime<Utc>) -> StockBalance;
}

/// Factory producing the stock entity types with fresh v7 ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEntityFactory;

impl EntityFactory for DefaultEntityFactory {
    fn new_unit_load(
        &self,
        code: &str,
        location_id: LocationId,
        now: DateTime<Utc>,
    ) -> DomainResult<UnitLoad> {
        UnitLoad::new(UnitLoadId::new(), code, location_id, now)
    }

    fn new_item(
        &self,
        unit_load_id: UnitLoadId,
        stock: StockIdentity,
        quantity: Quantity,
        out_ordering: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryItem> {
        InventoryItem::new(
            InventoryItemId::new(),
            unit_load_id,
            stock,
            quantity,
            out_ordering,
            now,
        )
    }

    fn new_flow(
        &self,
        movement: StockMovement,
        balance: Quantity,
        now: DateTime<Utc>,
    ) -> StockLedgerEntry {
        StockLedgerEntry::new(FlowId::new(), movement, balance, now)
    }

    fn new_stock(&self, stock: StockIdentity, now: DateTime<Utc>) -> StockBalance {
        StockBalance::open(stock, now)
    }
}
