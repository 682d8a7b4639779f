use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rackwms_core::quantity::ensure_positive;
use rackwms_core::{
    AggregateRoot, AllocationId, DemandLineId, DomainError, DomainResult, Entity,
    InventoryItemId, OutboundOrderId, Quantity, UnitLoadId, Versioned,
};
use rackwms_inventory::StockIdentity;

/// Reservation of part of an inventory item for a demand line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: AllocationId,
    pub item_id: InventoryItemId,
    pub unit_load_id: UnitLoadId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

/// Input for adding a line to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDemandLine {
    pub material: String,
    pub batch: Option<String>,
    pub stock_status: Option<String>,
    pub uom: Option<String>,
    pub required: Quantity,
}

impl NewDemandLine {
    pub fn new(material: impl Into<String>, required: Quantity) -> Self {
        Self {
            material: material.into(),
            batch: None,
            stock_status: None,
            uom: None,
            required,
        }
    }

    pub fn batch(mut self, batch: impl Into<String>) -> Self {
        self.batch = Some(batch.into());
        self
    }

    pub fn stock_status(mut self, status: impl Into<String>) -> Self {
        self.stock_status = Some(status.into());
        self
    }

    pub fn uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }
}

/// One line of outbound demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandLine {
    id: DemandLineId,
    line_no: u32,
    material: String,
    batch: Option<String>,
    stock_status: Option<String>,
    uom: Option<String>,
    required: Quantity,
    delivered: Quantity,
    allocations: Vec<AllocationRecord>,
}

impl DemandLine {
    pub fn id_typed(&self) -> DemandLineId {
        self.id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn batch(&self) -> Option<&str> {
        self.batch.as_deref()
    }

    pub fn stock_status(&self) -> Option<&str> {
        self.stock_status.as_deref()
    }

    pub fn uom(&self) -> Option<&str> {
        self.uom.as_deref()
    }

    pub fn required(&self) -> Quantity {
        self.required
    }

    pub fn delivered(&self) -> Quantity {
        self.delivered
    }

    pub fn allocations(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    /// Sum of all reservations on this line.
    pub fn reserved(&self) -> Quantity {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    /// required − delivered − reserved, before clamping. Negative only after
    /// an explicitly allowed over-delivery.
    pub fn raw_shortage(&self) -> Quantity {
        self.required - self.delivered - self.reserved()
    }

    /// Remaining unmet need.
    pub fn shortage(&self) -> Quantity {
        self.raw_shortage().max(Decimal::ZERO)
    }

    /// Quantity of `item_id` reserved on this line.
    pub fn reserved_on_item(&self, item_id: InventoryItemId) -> Quantity {
        self.allocations
            .iter()
            .filter(|a| a.item_id == item_id)
            .map(|a| a.quantity)
            .sum()
    }

    /// Stock identity check; unset batch/status/uom act as wildcards.
    pub fn accepts(&self, stock: &StockIdentity) -> bool {
        fn wildcard(want: &Option<String>, have: &str) -> bool {
            want.as_deref().is_none_or(|w| w == have)
        }

        self.material == stock.material
            && wildcard(&self.batch, &stock.batch)
            && wildcard(&self.stock_status, &stock.stock_status)
            && wildcard(&self.uom, &stock.uom)
    }

    fn reserve(
        &mut self,
        item_id: InventoryItemId,
        unit_load_id: UnitLoadId,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DomainResult<AllocationRecord> {
        ensure_positive("allocation quantity", quantity)?;
        if quantity > self.shortage() {
            return Err(DomainError::invariant(format!(
                "line {} would be over-allocated ({quantity} > shortage {})",
                self.line_no,
                self.shortage()
            )));
        }
        let record = AllocationRecord {
            id: AllocationId::new(),
            item_id,
            unit_load_id,
            quantity,
            created_at: now,
        };
        self.allocations.push(record.clone());
        Ok(record)
    }

    fn fulfil(&mut self, quantity: Quantity, allow_over_delivery: bool) -> DomainResult<()> {
        let delivered = self.delivered + quantity;
        if delivered > self.required && !allow_over_delivery {
            return Err(DomainError::precondition(format!(
                "line {} would be over-delivered ({delivered} > required {})",
                self.line_no, self.required
            )));
        }
        self.delivered = delivered;
        Ok(())
    }
}

impl Entity for DemandLine {
    type Id = DemandLineId;
    const KIND: &'static str = "demand line";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: OutboundOrder (demand header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundOrder {
    id: OutboundOrderId,
    code: String,
    closed: bool,
    lines: Vec<DemandLine>,
    created_at: DateTime<Utc>,
    version: u64,
}

impl OutboundOrder {
    pub fn new(
        id: OutboundOrderId,
        code: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("order code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            closed: false,
            lines: Vec::new(),
            created_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> OutboundOrderId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn lines(&self) -> &[DemandLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn line(&self, line_id: DemandLineId) -> DomainResult<&DemandLine> {
        self.lines
            .iter()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(DemandLine::KIND, line_id))
    }

    pub fn ensure_open(&self) -> DomainResult<()> {
        if self.closed {
            return Err(DomainError::precondition(format!(
                "outbound order {} is closed",
                self.code
            )));
        }
        Ok(())
    }

    pub fn add_line(&mut self, line: NewDemandLine) -> DomainResult<DemandLineId> {
        self.ensure_open()?;
        if line.material.trim().is_empty() {
            return Err(DomainError::validation("material cannot be empty"));
        }
        ensure_positive("required quantity", line.required)?;

        let id = DemandLineId::new();
        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        self.lines.push(DemandLine {
            id,
            line_no,
            material: line.material,
            batch: line.batch,
            stock_status: line.stock_status,
            uom: line.uom,
            required: line.required,
            delivered: Decimal::ZERO,
            allocations: Vec::new(),
        });
        Ok(id)
    }

    /// Quantity of `item_id` already reserved by any line of this order.
    pub fn reserved_on_item(&self, item_id: InventoryItemId) -> Quantity {
        self.lines.iter().map(|l| l.reserved_on_item(item_id)).sum()
    }

    /// Record a reservation on a line.
    pub fn reserve(
        &mut self,
        line_id: DemandLineId,
        item_id: InventoryItemId,
        unit_load_id: UnitLoadId,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DomainResult<AllocationRecord> {
        self.ensure_open()?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(DemandLine::KIND, line_id))?;
        line.reserve(item_id, unit_load_id, quantity, now)
    }

    /// Locate an allocation record and the line that owns it.
    pub fn find_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Option<(&DemandLine, &AllocationRecord)> {
        self.lines.iter().find_map(|l| {
            l.allocations
                .iter()
                .find(|a| a.id == allocation_id)
                .map(|a| (l, a))
        })
    }

    /// Unit loads holding at least one reservation of this order.
    pub fn reserved_unit_loads(&self) -> BTreeSet<UnitLoadId> {
        self.lines
            .iter()
            .flat_map(|l| l.allocations.iter().map(|a| a.unit_load_id))
            .collect()
    }

    pub fn has_reservations(&self) -> bool {
        self.lines.iter().any(|l| !l.allocations.is_empty())
    }

    /// Drop every reservation against `unit_load_id`, on every line.
    /// Returns the removed records.
    pub fn release_unit_load(&mut self, unit_load_id: UnitLoadId) -> Vec<AllocationRecord> {
        let mut released = Vec::new();
        for line in &mut self.lines {
            let (gone, kept): (Vec<_>, Vec<_>) = line
                .allocations
                .drain(..)
                .partition(|a| a.unit_load_id == unit_load_id);
            line.allocations = kept;
            released.extend(gone);
        }
        released
    }

    /// Add picked quantity to a line's delivered total.
    pub fn fulfil(
        &mut self,
        line_id: DemandLineId,
        quantity: Quantity,
        allow_over_delivery: bool,
    ) -> DomainResult<()> {
        self.ensure_open()?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(DemandLine::KIND, line_id))?;
        line.fulfil(quantity, allow_over_delivery)
    }

    /// Close the order. Outstanding reservations must be released first.
    pub fn close(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        if self.has_reservations() {
            return Err(DomainError::precondition(format!(
                "outbound order {} still has reservations",
                self.code
            )));
        }
        self.closed = true;
        Ok(())
    }
}

impl Entity for OutboundOrder {
    type Id = OutboundOrderId;
    const KIND: &'static str = "outbound order";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Versioned for OutboundOrder {
    fn version(&self) -> u64 {
        self.version
    }

    fn bump_version(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for OutboundOrder {}
