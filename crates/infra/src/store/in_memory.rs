//! In-memory implementation of the warehouse store.
//!
//! A unit of work runs against a cloned working copy of the whole state
//! under the write lock; the copy replaces the committed state only when
//! the closure returns `Ok`.

use std::collections::HashMap;
use std::sync::RwLock;

use rackwms_core::{
    CellId, DomainError, Entity, ExpectedVersion, LanewayId, LocationId, OutboundOrderId,
    UnitLoadId, Versioned,
};
use rackwms_inventory::{Cell, InventoryItem, Laneway, Location, StockIdentity, UnitLoad};
use rackwms_ledger::{StockBalance, StockLedgerEntry};
use rackwms_outbound::OutboundOrder;

use super::candidates::{Candidate, CandidateKey, CandidateQuery};
use super::{WarehouseStore, WarehouseTx};
use crate::error::{StoreError, WmsResult};

#[derive(Debug, Clone, Default)]
struct WarehouseState {
    orders: HashMap<OutboundOrderId, OutboundOrder>,
    unit_loads: HashMap<UnitLoadId, UnitLoad>,
    locations: HashMap<LocationId, Location>,
    cells: HashMap<CellId, Cell>,
    laneways: HashMap<LanewayId, Laneway>,
    balances: HashMap<StockIdentity, StockBalance>,
    flows: Vec<StockLedgerEntry>,
}

/// Process-local transactional store, used by tests and single-node setups.
#[derive(Debug)]
pub struct InMemoryWarehouseStore {
    state: RwLock<WarehouseState>,
    non_existent_location: LocationId,
}

impl InMemoryWarehouseStore {
    /// Empty store seeded with the virtual `N` location.
    pub fn new() -> Self {
        let virtual_location = Location::non_existent(LocationId::new());
        let non_existent_location = virtual_location.id_typed();

        let mut state = WarehouseState::default();
        state.locations.insert(non_existent_location, virtual_location);

        Self {
            state: RwLock::new(state),
            non_existent_location,
        }
    }

    /// Id of the seeded virtual location.
    pub fn non_existent_location(&self) -> LocationId {
        self.non_existent_location
    }

    /// Number of ledger entries committed so far.
    pub fn flow_count(&self) -> WmsResult<usize> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.flows.len())
    }
}

impl Default for InMemoryWarehouseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WarehouseStore for InMemoryWarehouseStore {
    fn transaction<R, F>(&self, work: F) -> WmsResult<R>
    where
        F: FnOnce(&mut dyn WarehouseTx) -> WmsResult<R>,
    {
        let mut committed = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let mut tx = InMemoryTx {
            state: committed.clone(),
        };
        let out = work(&mut tx)?;
        *committed = tx.state;
        Ok(out)
    }
}

type Keyed<'a> = (CandidateKey, &'a InventoryItem, &'a UnitLoad, &'a Location);

struct InMemoryTx {
    state: WarehouseState,
}

impl InMemoryTx {
    fn located(&self, unit_load: &UnitLoad) -> WmsResult<&Location> {
        self.state
            .locations
            .get(&unit_load.location_id())
            .ok_or_else(|| DomainError::not_found(Location::KIND, unit_load.location_id()).into())
    }

    fn key(&self, item: &InventoryItem, location: &Location) -> CandidateKey {
        let shape_rank = location
            .cell_id()
            .and_then(|id| self.state.cells.get(&id))
            .map_or(0, |cell| cell.retrieval_rank(location.depth()));

        CandidateKey {
            out_ordering: item.out_ordering().to_string(),
            shape_rank,
            orientation_order: location.orientation_order(),
            depth: location.depth(),
            item_id: item.id_typed(),
        }
    }

    fn candidate(
        &self,
        key: CandidateKey,
        item: &InventoryItem,
        unit_load: &UnitLoad,
        location: &Location,
    ) -> Candidate {
        let laneway_offline = location
            .laneway_id()
            .and_then(|id| self.state.laneways.get(&id))
            .is_some_and(Laneway::offline);

        Candidate {
            key,
            item: item.clone(),
            unit_load: unit_load.clone(),
            location: location.clone(),
            laneway_offline,
            forced: false,
        }
    }

    /// Matching items past `after`, keyed but not yet materialized.
    fn keyed<'a>(
        &'a self,
        query: &CandidateQuery,
        unit_loads: impl Iterator<Item = &'a UnitLoad>,
        after: Option<&CandidateKey>,
    ) -> WmsResult<Vec<Keyed<'a>>> {
        let mut out = Vec::new();
        for ul in unit_loads {
            let location = self.located(ul)?;
            for item in ul.items().iter().filter(|i| query.selects(i, ul)) {
                let key = self.key(item, location);
                if after.is_none_or(|after| &key > after) {
                    out.push((key, item, ul, location));
                }
            }
        }
        Ok(out)
    }

    fn ordered(&self, mut keyed: Vec<Keyed<'_>>) -> Vec<Candidate> {
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed
            .into_iter()
            .map(|(key, item, ul, location)| self.candidate(key, item, ul, location))
            .collect()
    }
}

impl WarehouseTx for InMemoryTx {
    fn order(&self, id: OutboundOrderId) -> WmsResult<OutboundOrder> {
        self.state
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(OutboundOrder::KIND, id).into())
    }

    fn insert_order(&mut self, order: OutboundOrder) -> WmsResult<()> {
        let id = order.id_typed();
        if self.state.orders.contains_key(&id) {
            return Err(StoreError::Duplicate {
                kind: OutboundOrder::KIND,
                key: id.to_string(),
            }
            .into());
        }
        self.state.orders.insert(id, order);
        Ok(())
    }

    fn save_order(&mut self, order: &mut OutboundOrder) -> WmsResult<()> {
        let id = order.id_typed();
        let stored = self
            .state
            .orders
            .get(&id)
            .ok_or_else(|| DomainError::not_found(OutboundOrder::KIND, id))?;
        ExpectedVersion::of(&*order).check(OutboundOrder::KIND, stored.version())?;
        order.bump_version();
        self.state.orders.insert(id, order.clone());
        Ok(())
    }

    fn unit_load(&self, id: UnitLoadId) -> WmsResult<UnitLoad> {
        self.state
            .unit_loads
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(UnitLoad::KIND, id).into())
    }

    fn unit_load_by_code(&self, code: &str) -> WmsResult<UnitLoad> {
        self.state
            .unit_loads
            .values()
            .find(|ul| ul.code() == code)
            .cloned()
            .ok_or_else(|| DomainError::not_found(UnitLoad::KIND, code).into())
    }

    fn insert_unit_load(&mut self, unit_load: UnitLoad) -> WmsResult<()> {
        let id = unit_load.id_typed();
        if self.state.unit_loads.contains_key(&id)
            || self.state.unit_loads.values().any(|ul| ul.code() == unit_load.code())
        {
            return Err(StoreError::Duplicate {
                kind: UnitLoad::KIND,
                key: unit_load.code().to_string(),
            }
            .into());
        }
        self.state.unit_loads.insert(id, unit_load);
        Ok(())
    }

    fn save_unit_load(&mut self, unit_load: &mut UnitLoad) -> WmsResult<()> {
        let id = unit_load.id_typed();
        let stored = self
            .state
            .unit_loads
            .get(&id)
            .ok_or_else(|| DomainError::not_found(UnitLoad::KIND, id))?;
        ExpectedVersion::of(&*unit_load).check(UnitLoad::KIND, stored.version())?;
        unit_load.bump_version();
        self.state.unit_loads.insert(id, unit_load.clone());
        Ok(())
    }

    fn delete_unit_load(&mut self, unit_load: &UnitLoad) -> WmsResult<()> {
        let id = unit_load.id_typed();
        let stored = self
            .state
            .unit_loads
            .get(&id)
            .ok_or_else(|| DomainError::not_found(UnitLoad::KIND, id))?;
        ExpectedVersion::of(unit_load).check(UnitLoad::KIND, stored.version())?;
        self.state.unit_loads.remove(&id);
        Ok(())
    }

    fn unit_loads_at(&self, location_id: LocationId) -> WmsResult<Vec<UnitLoad>> {
        Ok(self
            .state
            .unit_loads
            .values()
            .filter(|ul| ul.location_id() == location_id)
            .cloned()
            .collect())
    }

    fn location(&self, id: LocationId) -> WmsResult<Location> {
        self.state
            .locations
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Location::KIND, id).into())
    }

    fn location_by_code(&self, code: &str) -> WmsResult<Location> {
        self.state
            .locations
            .values()
            .find(|l| l.code() == code)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Location::KIND, code).into())
    }

    fn location_codes(&self) -> WmsResult<Vec<(String, LocationId)>> {
        Ok(self
            .state
            .locations
            .values()
            .map(|l| (l.code().to_string(), l.id_typed()))
            .collect())
    }

    fn save_location(&mut self, location: Location) -> WmsResult<()> {
        let id = location.id_typed();
        if self
            .state
            .locations
            .values()
            .any(|l| l.code() == location.code() && l.id_typed() != id)
        {
            return Err(StoreError::Duplicate {
                kind: Location::KIND,
                key: location.code().to_string(),
            }
            .into());
        }
        self.state.locations.insert(id, location);
        Ok(())
    }

    fn locations_in_laneway(&self, laneway_id: LanewayId) -> WmsResult<Vec<Location>> {
        Ok(self
            .state
            .locations
            .values()
            .filter(|l| l.laneway_id() == Some(laneway_id))
            .cloned()
            .collect())
    }

    fn cell(&self, id: CellId) -> WmsResult<Cell> {
        self.state
            .cells
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Cell::KIND, id).into())
    }

    fn save_cell(&mut self, cell: Cell) -> WmsResult<()> {
        self.state.cells.insert(cell.id_typed(), cell);
        Ok(())
    }

    fn laneway(&self, id: LanewayId) -> WmsResult<Laneway> {
        self.state
            .laneways
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Laneway::KIND, id).into())
    }

    fn save_laneway(&mut self, laneway: Laneway) -> WmsResult<()> {
        self.state.laneways.insert(laneway.id_typed(), laneway);
        Ok(())
    }

    fn candidate_page(
        &self,
        query: &CandidateQuery,
        after: Option<&CandidateKey>,
        limit: usize,
    ) -> WmsResult<Vec<Candidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let unit_loads = self
            .state
            .unit_loads
            .values()
            .filter(|ul| !query.skip_unit_loads.contains(&ul.id_typed()));
        let mut keyed = self.keyed(query, unit_loads, after)?;

        // Only the first `limit` keys are ordered.
        if keyed.len() > limit {
            keyed.select_nth_unstable_by(limit - 1, |a, b| a.0.cmp(&b.0));
            keyed.truncate(limit);
        }
        Ok(self.ordered(keyed))
    }

    fn candidates_on(
        &self,
        query: &CandidateQuery,
        unit_loads: &[UnitLoadId],
    ) -> WmsResult<Vec<Candidate>> {
        let mut loads = Vec::with_capacity(unit_loads.len());
        for id in unit_loads {
            let ul = self
                .state
                .unit_loads
                .get(id)
                .ok_or_else(|| DomainError::not_found(UnitLoad::KIND, id))?;
            loads.push(ul);
        }
        let keyed = self.keyed(query, loads.into_iter(), None)?;
        Ok(self.ordered(keyed))
    }

    fn stock_balance(&self, stock: &StockIdentity) -> WmsResult<Option<StockBalance>> {
        Ok(self.state.balances.get(stock).cloned())
    }

    fn save_stock_balance(&mut self, balance: StockBalance) -> WmsResult<()> {
        self.state.balances.insert(balance.stock().clone(), balance);
        Ok(())
    }

    fn append_flow(&mut self, entry: StockLedgerEntry) -> WmsResult<()> {
        if self.state.flows.iter().any(|f| f.id_typed() == entry.id_typed()) {
            return Err(StoreError::Duplicate {
                kind: StockLedgerEntry::KIND,
                key: entry.id_typed().to_string(),
            }
            .into());
        }
        self.state.flows.push(entry);
        Ok(())
    }

    fn flows(&self, stock: &StockIdentity) -> WmsResult<Vec<StockLedgerEntry>> {
        Ok(self
            .state
            .flows
            .iter()
            .filter(|f| f.stock() == stock)
            .cloned()
            .collect())
    }
}
