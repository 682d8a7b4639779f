//! Public entry point of the warehouse core.
//!
//! Each operation is one unit of work against the store. Notifications go
//! out only after the unit of work committed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use rackwms_core::{
    DemandLineId, Entity, ExpectedVersion, LanewayId, OutboundOrderId, Quantity, UnitLoadId,
    Versioned,
};
use rackwms_inventory::{Laneway, Location, NON_EXISTENT_LOCATION_CODE, StockIdentity, UnitLoad};
use rackwms_ledger::{FlowMetadata, MovementDirection, StockLedgerEntry, StockMovement};
use rackwms_outbound::{AllocationRecord, NewDemandLine, OutboundOrder};

use crate::cache::LocationCodeCache;
use crate::config::{AllocationOptions, WmsConfig};
use crate::engine::{allocation, capacity, deallocation, ledger, picking};
use crate::engine::{AllocationSummary, PickRequest};
use crate::error::WmsResult;
use crate::factory::{DefaultEntityFactory, EntityFactory};
use crate::notify::{NotificationSink, NullSink, WarehouseEvent};
use crate::store::WarehouseStore;

/// Business type stamped on ledger entries of received stock.
pub const BUSINESS_TYPE_INBOUND: &str = "inbound";
/// Operation type of the entries posted by [`WarehouseService::register_unit_load`].
pub const OPERATION_RECEIVE: &str = "receive";

/// One item of a unit load being registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedStock {
    pub stock: StockIdentity,
    pub quantity: Quantity,
    pub out_ordering: String,
}

impl ReceivedStock {
    pub fn new(stock: StockIdentity, quantity: Quantity, out_ordering: impl Into<String>) -> Self {
        Self {
            stock,
            quantity,
            out_ordering: out_ordering.into(),
        }
    }
}

pub struct WarehouseService<S, N = NullSink> {
    store: S,
    sink: N,
    factory: Box<dyn EntityFactory>,
    config: WmsConfig,
    locations: LocationCodeCache,
}

impl<S: WarehouseStore> WarehouseService<S> {
    /// Service without notifications.
    pub fn new(store: S, config: WmsConfig) -> Self {
        Self::with_sink(store, NullSink, config)
    }
}

impl<S, N> WarehouseService<S, N>
where
    S: WarehouseStore,
    N: NotificationSink,
{
    pub fn with_sink(store: S, sink: N, config: WmsConfig) -> Self {
        Self {
            store,
            sink,
            factory: Box::new(DefaultEntityFactory),
            config,
            locations: LocationCodeCache::new(),
        }
    }

    pub fn with_factory(mut self, factory: impl EntityFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &WmsConfig {
        &self.config
    }

    pub fn location_cache(&self) -> &LocationCodeCache {
        &self.locations
    }

    /// Allocation options carrying this deployment's defaults.
    pub fn default_options(&self) -> AllocationOptions {
        AllocationOptions::from_config(&self.config)
    }

    // ---- outbound orders ----

    #[instrument(skip(self))]
    pub fn create_order(&self, code: &str) -> WmsResult<OutboundOrderId> {
        let order = OutboundOrder::new(OutboundOrderId::new(), code, Utc::now())?;
        let id = order.id_typed();
        self.store.transaction(|tx| tx.insert_order(order))?;
        info!(order = code, "outbound order created");
        Ok(id)
    }

    /// Add a demand line to an order last seen at `expected`.
    #[instrument(skip(self, line), fields(material = %line.material))]
    pub fn add_demand_line(
        &self,
        order_id: OutboundOrderId,
        expected: ExpectedVersion,
        line: NewDemandLine,
    ) -> WmsResult<DemandLineId> {
        self.store.transaction(|tx| {
            let mut order = tx.order(order_id)?;
            expected.check(OutboundOrder::KIND, order.version())?;
            let line_id = order.add_line(line)?;
            tx.save_order(&mut order)?;
            Ok(line_id)
        })
    }

    /// Reserve stock for every short line of the order.
    #[instrument(skip(self, options))]
    pub fn allocate(
        &self,
        order_id: OutboundOrderId,
        options: &AllocationOptions,
    ) -> WmsResult<AllocationSummary> {
        self.store.transaction(|tx| {
            allocation::allocate(tx, order_id, options, &self.config, Utc::now())
        })
    }

    #[instrument(skip(self))]
    pub fn deallocate_in_rack(&self, order_id: OutboundOrderId) -> WmsResult<usize> {
        self.store
            .transaction(|tx| deallocation::deallocate_in_rack(tx, order_id))
    }

    #[instrument(skip(self))]
    pub fn deallocate(
        &self,
        order_id: OutboundOrderId,
        unit_load_id: UnitLoadId,
    ) -> WmsResult<Vec<AllocationRecord>> {
        self.store
            .transaction(|tx| deallocation::deallocate(tx, order_id, unit_load_id))
    }

    #[instrument(skip(self, requests), fields(requests = requests.len()))]
    pub fn pick(
        &self,
        unit_load_code: &str,
        requests: &[PickRequest],
        operation_type: &str,
    ) -> WmsResult<Vec<StockLedgerEntry>> {
        self.store.transaction(|tx| {
            picking::pick(
                tx,
                self.factory.as_ref(),
                &self.config,
                unit_load_code,
                requests,
                operation_type,
                Utc::now(),
            )
        })
    }

    /// Close an order without outstanding reservations.
    #[instrument(skip(self))]
    pub fn close_order(&self, order_id: OutboundOrderId) -> WmsResult<()> {
        let order = self.store.transaction(|tx| {
            let mut order = tx.order(order_id)?;
            order.close()?;
            tx.save_order(&mut order)?;
            Ok(order)
        })?;

        info!(order = order.code(), "outbound order closed");
        self.sink.notify(&WarehouseEvent::OrderClosed {
            order_id,
            order_code: order.code().to_string(),
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    // ---- unit loads and locations ----

    /// Register a new unit load with its items on the virtual location,
    /// posting an inbound ledger entry per item, and optionally place it.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub fn register_unit_load(
        &self,
        code: &str,
        items: Vec<ReceivedStock>,
        location_code: Option<&str>,
    ) -> WmsResult<UnitLoadId> {
        self.store.transaction(|tx| {
            let now = Utc::now();
            let virtual_location = tx.location_by_code(NON_EXISTENT_LOCATION_CODE)?;
            let mut unit_load = self.factory.new_unit_load(code, virtual_location.id_typed(), now)?;

            for received in items {
                let item = self.factory.new_item(
                    unit_load.id_typed(),
                    received.stock.clone(),
                    received.quantity,
                    &received.out_ordering,
                    now,
                )?;
                unit_load.add_item(item)?;

                let movement = StockMovement::new(
                    received.stock,
                    received.quantity,
                    MovementDirection::Inbound,
                    FlowMetadata::new(BUSINESS_TYPE_INBOUND, OPERATION_RECEIVE).unit_load(code),
                )?;
                ledger::post_movement(tx, self.factory.as_ref(), movement, true, now)?;
            }

            if let Some(location_code) = location_code {
                let to = self.locations.resolve(&*tx, location_code)?;
                capacity::relocate(tx, &mut unit_load, to, now)?;
            }

            let id = unit_load.id_typed();
            tx.insert_unit_load(unit_load)?;
            info!(unit_load = code, "unit load registered");
            Ok(id)
        })
    }

    /// Move a unit load to another location.
    #[instrument(skip(self))]
    pub fn relocate_unit_load(&self, unit_load_code: &str, location_code: &str) -> WmsResult<()> {
        self.store.transaction(|tx| {
            let mut unit_load = tx.unit_load_by_code(unit_load_code)?;
            let to = self.locations.resolve(&*tx, location_code)?;
            capacity::relocate(tx, &mut unit_load, to, Utc::now())?;
            tx.save_unit_load(&mut unit_load)
        })
    }

    #[instrument(skip(self))]
    pub fn set_inbound_disabled(&self, location_code: &str, disabled: bool) -> WmsResult<Location> {
        let location = self.store.transaction(|tx| {
            let id = self.locations.resolve(&*tx, location_code)?;
            capacity::set_inbound_disabled(tx, id, disabled, Utc::now())
        })?;
        self.announce(&location);
        Ok(location)
    }

    #[instrument(skip(self))]
    pub fn set_location_exists(&self, location_code: &str, exists: bool) -> WmsResult<Location> {
        let location = self.store.transaction(|tx| {
            let id = self.locations.resolve(&*tx, location_code)?;
            capacity::set_exists(tx, id, exists, Utc::now())
        })?;
        self.announce(&location);
        Ok(location)
    }

    #[instrument(skip(self))]
    pub fn rebuild_laneway_stat(&self, laneway_id: LanewayId) -> WmsResult<Laneway> {
        self.store
            .transaction(|tx| capacity::rebuild_stat(tx, laneway_id, Utc::now()))
    }

    /// Replay the ledger of a stock identity against its balance.
    #[instrument(skip(self, stock), fields(stock = %stock))]
    pub fn ledger_audit(&self, stock: &StockIdentity) -> WmsResult<Quantity> {
        self.store.transaction(|tx| ledger::audit(&*tx, stock))
    }

    // ---- reads ----

    pub fn order(&self, order_id: OutboundOrderId) -> WmsResult<OutboundOrder> {
        self.store.transaction(|tx| tx.order(order_id))
    }

    pub fn unit_load(&self, code: &str) -> WmsResult<UnitLoad> {
        self.store.transaction(|tx| tx.unit_load_by_code(code))
    }

    pub fn location(&self, code: &str) -> WmsResult<Location> {
        self.store.transaction(|tx| tx.location_by_code(code))
    }

    pub fn laneway(&self, laneway_id: LanewayId) -> WmsResult<Laneway> {
        self.store.transaction(|tx| tx.laneway(laneway_id))
    }

    pub fn stock_balance(&self, stock: &StockIdentity) -> WmsResult<Quantity> {
        self.store.transaction(|tx| {
            Ok(tx
                .stock_balance(stock)?
                .map_or(Quantity::ZERO, |b| b.balance()))
        })
    }

    pub fn flows(&self, stock: &StockIdentity) -> WmsResult<Vec<StockLedgerEntry>> {
        self.store.transaction(|tx| tx.flows(stock))
    }

    fn announce(&self, location: &Location) {
        self.sink.notify(&WarehouseEvent::LocationChanged {
            location_id: location.id_typed(),
            location_code: location.code().to_string(),
            laneway_id: location.laneway_id(),
            inbound_disabled: location.inbound_disabled(),
            exists: location.exists(),
            occurred_at: Utc::now(),
        });
    }
}
