//! Release of reservations, always a whole unit load at a time.

use tracing::{info, warn};

use rackwms_core::{DomainError, OutboundOrderId, UnitLoadId};
use rackwms_inventory::{AllocationTarget, UnitLoad};
use rackwms_outbound::{AllocationRecord, OutboundOrder};

use crate::error::WmsResult;
use crate::store::WarehouseTx;

/// Drop every reservation `order` holds on `unit_load` and clear the unit
/// load's allocation target. The unit load is saved; the caller saves the
/// order.
pub fn release(
    tx: &mut dyn WarehouseTx,
    order: &mut OutboundOrder,
    unit_load: &mut UnitLoad,
) -> WmsResult<Vec<AllocationRecord>> {
    order.ensure_open()?;
    match unit_load.allocation_target() {
        Some(AllocationTarget::OutboundOrder(id)) if id == order.id_typed() => {}
        _ => {
            return Err(DomainError::precondition(format!(
                "unit load {} is not allocated to order {}",
                unit_load.code(),
                order.code()
            ))
            .into());
        }
    }

    let released = order.release_unit_load(unit_load.id_typed());
    unit_load.clear_allocation_target();
    tx.save_unit_load(unit_load)?;
    Ok(released)
}

/// Release every unit load of the order that sits in storage and is not on
/// the move. Returns the number of unit loads released.
pub fn deallocate_in_rack(tx: &mut dyn WarehouseTx, order_id: OutboundOrderId) -> WmsResult<usize> {
    let mut order = tx.order(order_id)?;
    order.ensure_open()?;

    let mut released = 0;
    for unit_load_id in order.reserved_unit_loads() {
        let mut unit_load = tx.unit_load(unit_load_id)?;
        if unit_load.being_moved() {
            continue;
        }
        if !tx.location(unit_load.location_id())?.is_storage() {
            continue;
        }
        release(tx, &mut order, &mut unit_load)?;
        released += 1;
    }

    if released > 0 {
        tx.save_order(&mut order)?;
    }
    info!(order = order.code(), unit_loads = released, "in-rack reservations released");
    Ok(released)
}

/// Release one unit load of the order, wherever it is.
pub fn deallocate(
    tx: &mut dyn WarehouseTx,
    order_id: OutboundOrderId,
    unit_load_id: UnitLoadId,
) -> WmsResult<Vec<AllocationRecord>> {
    let mut order = tx.order(order_id)?;
    let mut unit_load = tx.unit_load(unit_load_id)?;
    if unit_load.being_moved() {
        warn!(
            unit_load = unit_load.code(),
            order = order.code(),
            "releasing a unit load that is being moved"
        );
    }

    let released = release(tx, &mut order, &mut unit_load)?;
    tx.save_order(&mut order)?;
    info!(
        order = order.code(),
        unit_load = unit_load.code(),
        records = released.len(),
        "unit load released"
    );
    Ok(released)
}
