//! Conversion of reservations into shipped quantity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rackwms_core::{AllocationId, DemandLineId, DomainError, InventoryItemId, Quantity};
use rackwms_inventory::AllocationTarget;
use rackwms_ledger::{FlowMetadata, MovementDirection, StockLedgerEntry, StockMovement};

use super::{capacity, deallocation, ledger};
use crate::config::WmsConfig;
use crate::error::WmsResult;
use crate::factory::EntityFactory;
use crate::store::WarehouseTx;

/// Business type stamped on ledger entries of picks.
pub const BUSINESS_TYPE_OUTBOUND: &str = "outbound";

/// Quantity to take against one allocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRequest {
    pub allocation_id: AllocationId,
    pub quantity: Quantity,
}

impl PickRequest {
    pub fn new(allocation_id: AllocationId, quantity: Quantity) -> Self {
        Self {
            allocation_id,
            quantity,
        }
    }
}

struct PlannedPick {
    line_id: DemandLineId,
    item_id: InventoryItemId,
    quantity: Quantity,
}

/// Pick from the unit load `unit_load_code` at a station.
///
/// Every request is validated before anything changes. The unit load is
/// then released from its order as a whole; requested quantities leave the
/// unit load, count towards their lines and are posted as outbound ledger
/// entries. A unit load left without items is deleted.
pub fn pick(
    tx: &mut dyn WarehouseTx,
    factory: &dyn EntityFactory,
    config: &WmsConfig,
    unit_load_code: &str,
    requests: &[PickRequest],
    operation_type: &str,
    now: DateTime<Utc>,
) -> WmsResult<Vec<StockLedgerEntry>> {
    let mut unit_load = tx.unit_load_by_code(unit_load_code)?;
    let location = tx.location(unit_load.location_id())?;
    if location.is_storage() {
        return Err(DomainError::precondition(format!(
            "unit load {unit_load_code} is still in storage location {}",
            location.code()
        ))
        .into());
    }

    let Some(AllocationTarget::OutboundOrder(order_id)) = unit_load.allocation_target() else {
        return Err(DomainError::precondition(format!(
            "unit load {unit_load_code} is not allocated to an outbound order"
        ))
        .into());
    };
    let mut order = tx.order(order_id)?;
    order.ensure_open()?;

    let mut seen = BTreeSet::new();
    let mut plan = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity < Decimal::ZERO {
            return Err(DomainError::precondition(format!(
                "pick quantity for allocation {} is negative",
                request.allocation_id
            ))
            .into());
        }
        if !seen.insert(request.allocation_id) {
            return Err(DomainError::precondition(format!(
                "allocation {} requested twice",
                request.allocation_id
            ))
            .into());
        }
        let (line, record) = order.find_allocation(request.allocation_id).ok_or_else(|| {
            DomainError::precondition(format!(
                "allocation {} does not belong to order {}",
                request.allocation_id,
                order.code()
            ))
        })?;
        if record.unit_load_id != unit_load.id_typed() {
            return Err(DomainError::precondition(format!(
                "allocation {} is not on unit load {unit_load_code}",
                request.allocation_id
            ))
            .into());
        }
        if request.quantity > record.quantity {
            return Err(DomainError::precondition(format!(
                "pick of {} exceeds the {} reserved by allocation {}",
                request.quantity, record.quantity, request.allocation_id
            ))
            .into());
        }
        plan.push(PlannedPick {
            line_id: line.id_typed(),
            item_id: record.item_id,
            quantity: request.quantity,
        });
    }

    deallocation::release(tx, &mut order, &mut unit_load)?;

    if plan.iter().all(|p| p.quantity.is_zero()) {
        tx.save_order(&mut order)?;
        info!(
            unit_load = unit_load_code,
            order = order.code(),
            "nothing picked, unit load released"
        );
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for step in plan.iter().filter(|p| p.quantity > Decimal::ZERO) {
        let decrease = unit_load.decrease_item(step.item_id, step.quantity)?;
        debug!(
            item = %step.item_id,
            picked = %step.quantity,
            remaining = %decrease.remaining,
            item_removed = decrease.item_removed,
            "item decreased"
        );
        order.fulfil(step.line_id, step.quantity, config.allow_over_delivery)?;

        let metadata = FlowMetadata::new(BUSINESS_TYPE_OUTBOUND, operation_type)
            .document(order.code())
            .unit_load(unit_load.code());
        let movement = StockMovement::new(
            decrease.stock,
            step.quantity,
            MovementDirection::Outbound,
            metadata,
        )?;
        entries.push(ledger::post_movement(tx, factory, movement, true, now)?);
    }

    if unit_load.is_empty() {
        if !location.is_non_existent() {
            capacity::decrease_unitload_count(tx, location.id_typed(), now)?;
        }
        tx.delete_unit_load(&unit_load)?;
    } else {
        tx.save_unit_load(&mut unit_load)?;
    }
    tx.save_order(&mut order)?;

    info!(
        unit_load = unit_load_code,
        order = order.code(),
        entries = entries.len(),
        removed = unit_load.is_empty(),
        "pick completed"
    );
    Ok(entries)
}
