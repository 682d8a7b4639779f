use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rackwms_core::quantity::ensure_positive;
use rackwms_core::{
    AggregateRoot, DomainError, DomainResult, Entity, InventoryItemId, LocationId,
    OutboundOrderId, Quantity, UnitLoadId, Versioned,
};

use crate::stock::StockIdentity;

/// What a unit load is currently reserved for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AllocationTarget {
    OutboundOrder(OutboundOrderId),
}

/// Outstanding transport task of a unit load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportTask {
    pub task_code: String,
    /// Task type tag, e.g. "relocation", "housekeeping", "outbound".
    pub task_type: String,
    pub from_location: LocationId,
    pub to_location: LocationId,
}

/// A quantity of one stock identity held on a unit load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    unit_load_id: UnitLoadId,
    stock: StockIdentity,
    quantity: Quantity,
    /// Priority tiebreak for allocation (e.g. expiry date as `YYYYMMDD`),
    /// compared lexicographically, smallest first.
    out_ordering: String,
    received_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(
        id: InventoryItemId,
        unit_load_id: UnitLoadId,
        stock: StockIdentity,
        quantity: Quantity,
        out_ordering: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_positive("item quantity", quantity)?;
        Ok(Self {
            id,
            unit_load_id,
            stock,
            quantity,
            out_ordering: out_ordering.into(),
            received_at,
        })
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn unit_load_id(&self) -> UnitLoadId {
        self.unit_load_id
    }

    pub fn stock(&self) -> &StockIdentity {
        &self.stock
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn out_ordering(&self) -> &str {
        &self.out_ordering
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl Entity for InventoryItem {
    type Id = InventoryItemId;
    const KIND: &'static str = "inventory item";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Outcome of removing quantity from an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDecrease {
    pub stock: StockIdentity,
    pub remaining: Quantity,
    /// The item reached zero and was removed from the unit load.
    pub item_removed: bool,
}

/// Aggregate root: a physical container (pallet) holding inventory items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLoad {
    id: UnitLoadId,
    code: String,
    location_id: LocationId,
    items: Vec<InventoryItem>,
    transport_task: Option<TransportTask>,
    has_counting_error: bool,
    op_hint: Option<String>,
    allocation_target: Option<AllocationTarget>,
    created_at: DateTime<Utc>,
    version: u64,
}

impl UnitLoad {
    pub fn new(
        id: UnitLoadId,
        code: impl Into<String>,
        location_id: LocationId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("unit load code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            location_id,
            items: Vec::new(),
            transport_task: None,
            has_counting_error: false,
            op_hint: None,
            allocation_target: None,
            created_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> UnitLoadId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn item(&self, item_id: InventoryItemId) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn transport_task(&self) -> Option<&TransportTask> {
        self.transport_task.as_ref()
    }

    /// True while a transport task is outstanding.
    pub fn being_moved(&self) -> bool {
        self.transport_task.is_some()
    }

    pub fn has_counting_error(&self) -> bool {
        self.has_counting_error
    }

    pub fn op_hint(&self) -> Option<&str> {
        self.op_hint.as_deref()
    }

    pub fn allocation_target(&self) -> Option<AllocationTarget> {
        self.allocation_target
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the unit load is free or already reserved to `order_id`.
    pub fn is_allocatable_to(&self, order_id: OutboundOrderId) -> bool {
        match self.allocation_target {
            None => true,
            Some(AllocationTarget::OutboundOrder(id)) => id == order_id,
        }
    }

    pub fn add_item(&mut self, item: InventoryItem) -> DomainResult<()> {
        if item.unit_load_id != self.id {
            return Err(DomainError::invariant(format!(
                "item {} belongs to unit load {}, not {}",
                item.id, item.unit_load_id, self.id
            )));
        }
        if self.items.iter().any(|i| i.id == item.id) {
            return Err(DomainError::conflict(format!(
                "item {} already on unit load {}",
                item.id, self.code
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Remove `qty` from an item; an item that reaches zero is dropped.
    pub fn decrease_item(
        &mut self,
        item_id: InventoryItemId,
        qty: Quantity,
    ) -> DomainResult<ItemDecrease> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| DomainError::not_found(InventoryItem::KIND, item_id))?;

        let item = &mut self.items[idx];
        let remaining = item.quantity - qty;
        if remaining < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "item {item_id} quantity would become negative ({} - {qty})",
                item.quantity
            )));
        }
        item.quantity = remaining;
        let stock = item.stock.clone();

        let item_removed = remaining.is_zero();
        if item_removed {
            self.items.remove(idx);
        }

        Ok(ItemDecrease {
            stock,
            remaining,
            item_removed,
        })
    }

    pub fn set_location(&mut self, location_id: LocationId) {
        self.location_id = location_id;
    }

    pub fn set_transport_task(&mut self, task: Option<TransportTask>) {
        self.transport_task = task;
    }

    pub fn set_counting_error(&mut self, flag: bool) {
        self.has_counting_error = flag;
    }

    pub fn set_op_hint(&mut self, hint: Option<String>) {
        self.op_hint = hint.filter(|h| !h.trim().is_empty());
    }

    /// Reserve the unit load to an order (or confirm an existing reservation).
    pub fn set_allocation_target(&mut self, order_id: OutboundOrderId) -> DomainResult<()> {
        match self.allocation_target {
            None => {
                self.allocation_target = Some(AllocationTarget::OutboundOrder(order_id));
                Ok(())
            }
            Some(AllocationTarget::OutboundOrder(id)) if id == order_id => Ok(()),
            Some(AllocationTarget::OutboundOrder(id)) => Err(DomainError::invariant(format!(
                "unit load {} is already allocated to order {id}",
                self.code
            ))),
        }
    }

    pub fn clear_allocation_target(&mut self) {
        self.allocation_target = None;
    }
}

impl Entity for UnitLoad {
    type Id = UnitLoadId;
    const KIND: &'static str = "unit load";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Versioned for UnitLoad {
    fn version(&self) -> u64 {
        self.version
    }

    fn bump_version(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for UnitLoad {}
