//! Reservation of stock against outbound demand.
//!
//! Lines are served one after another in line order. For each line the
//! candidate stream is walked until the line's shortage reaches zero or the
//! stream runs out; running out is not an error.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, trace};

use rackwms_core::{DemandLineId, DomainError, OutboundOrderId, Quantity, UnitLoadId};
use rackwms_outbound::{DemandLine, OutboundOrder};

use crate::config::{AllocationOptions, WmsConfig};
use crate::error::WmsResult;
use crate::store::{Candidate, CandidateCursor, CandidateQuery, WarehouseTx};

/// Why a candidate was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Excluded,
    StockMismatch,
    AllocatedElsewhere,
    CountingError,
    BeingMoved,
    OpHint,
    OutsideArea,
    LanewayOffline,
}

/// Result of one allocation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationSummary {
    pub reservations: usize,
    pub reserved: Quantity,
    /// Lines still short after the run.
    pub short_lines: Vec<DemandLineId>,
    pub pages_fetched: usize,
}

/// Matching rules applied to every streamed candidate.
pub fn check_candidate(
    candidate: &Candidate,
    line: &DemandLine,
    order_id: OutboundOrderId,
    options: &AllocationOptions,
    config: &WmsConfig,
) -> Result<(), Rejection> {
    let ul = &candidate.unit_load;

    if options.exclude_unit_loads.contains(ul.code()) {
        return Err(Rejection::Excluded);
    }
    if !line.accepts(candidate.item.stock()) {
        return Err(Rejection::StockMismatch);
    }
    if !ul.is_allocatable_to(order_id) {
        return Err(Rejection::AllocatedElsewhere);
    }
    if ul.has_counting_error() {
        return Err(Rejection::CountingError);
    }
    if let Some(task) = ul.transport_task() {
        if !config.non_blocking_task_types.contains(&task.task_type) {
            return Err(Rejection::BeingMoved);
        }
    }
    if ul.op_hint().is_some() {
        return Err(Rejection::OpHint);
    }
    if candidate.forced {
        return Ok(());
    }
    if !options.areas.is_empty() && !options.areas.contains(candidate.location.area()) {
        return Err(Rejection::OutsideArea);
    }
    if options.skip_offline_laneways && candidate.laneway_offline {
        return Err(Rejection::LanewayOffline);
    }
    Ok(())
}

/// Serve every short line of an order.
pub fn allocate(
    tx: &mut dyn WarehouseTx,
    order_id: OutboundOrderId,
    options: &AllocationOptions,
    config: &WmsConfig,
    now: DateTime<Utc>,
) -> WmsResult<AllocationSummary> {
    let mut order = tx.order(order_id)?;
    order.ensure_open()?;

    let forced = forced_unit_loads(&*tx, options)?;
    let mut summary = AllocationSummary::default();

    let line_ids: Vec<DemandLineId> = order.lines().iter().map(|l| l.id_typed()).collect();
    for line_id in line_ids {
        allocate_line(tx, &mut order, line_id, &forced, options, config, now, &mut summary)?;
        if order.line(line_id)?.shortage() > Decimal::ZERO {
            summary.short_lines.push(line_id);
        }
    }

    info!(
        order = order.code(),
        reservations = summary.reservations,
        reserved = %summary.reserved,
        short_lines = summary.short_lines.len(),
        "allocation finished"
    );
    Ok(summary)
}

/// Force-included unit loads in the order given, minus excluded codes.
/// An unknown code is an error.
fn forced_unit_loads(
    tx: &dyn WarehouseTx,
    options: &AllocationOptions,
) -> WmsResult<Vec<UnitLoadId>> {
    let mut seen = BTreeSet::new();
    let mut forced = Vec::new();
    for code in &options.include_unit_loads {
        if options.exclude_unit_loads.contains(code) || !seen.insert(code.as_str()) {
            continue;
        }
        forced.push(tx.unit_load_by_code(code)?.id_typed());
    }
    Ok(forced)
}

/// Walk the candidate stream of one line until it is satisfied.
#[allow(clippy::too_many_arguments)]
pub fn allocate_line(
    tx: &mut dyn WarehouseTx,
    order: &mut OutboundOrder,
    line_id: DemandLineId,
    forced: &[UnitLoadId],
    options: &AllocationOptions,
    config: &WmsConfig,
    now: DateTime<Utc>,
    summary: &mut AllocationSummary,
) -> WmsResult<()> {
    let line = order.line(line_id)?;
    if line.shortage() <= Decimal::ZERO {
        return Ok(());
    }

    let query = CandidateQuery::for_line(line).excluding(&options.exclude_unit_loads);
    let mut cursor = CandidateCursor::new(query, forced.to_vec(), options.effective_chunk_size());

    loop {
        let line = order.line(line_id)?;
        if line.shortage() <= Decimal::ZERO {
            break;
        }
        let Some(candidate) = cursor.next_candidate(&*tx)? else {
            break;
        };
        if let Err(reason) = check_candidate(&candidate, line, order.id_typed(), options, config) {
            trace!(item = %candidate.item.id_typed(), ?reason, "candidate rejected");
            continue;
        }

        let reserved = allocate_item(tx, order, line_id, &candidate, now)?;
        if reserved > Decimal::ZERO {
            summary.reservations += 1;
            summary.reserved += reserved;
        }
    }

    summary.pages_fetched += cursor.pages_fetched();
    Ok(())
}

/// Reserve as much of one candidate item as the line still needs.
///
/// Works on fresh copies of the unit load, so a candidate snapshot that
/// went stale is re-evaluated rather than trusted. Returns the quantity
/// reserved (zero when nothing was needed or nothing was left).
pub fn allocate_item(
    tx: &mut dyn WarehouseTx,
    order: &mut OutboundOrder,
    line_id: DemandLineId,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> WmsResult<Quantity> {
    let shortage = order.line(line_id)?.shortage();
    if shortage <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let mut unit_load = tx.unit_load(candidate.unit_load.id_typed())?;
    if !unit_load.is_allocatable_to(order.id_typed()) {
        return Ok(Decimal::ZERO);
    }
    let item_id = candidate.item.id_typed();
    let Some(item) = unit_load.item(item_id) else {
        return Ok(Decimal::ZERO);
    };

    let available = item.quantity() - order.reserved_on_item(item_id);
    if available < Decimal::ZERO {
        return Err(DomainError::invariant(format!(
            "item {item_id} on unit load {} is over-reserved by {}",
            unit_load.code(),
            -available
        ))
        .into());
    }

    let quantity = available.min(shortage);
    if quantity <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let record = order.reserve(line_id, item_id, unit_load.id_typed(), quantity, now)?;
    unit_load.set_allocation_target(order.id_typed())?;
    tx.save_unit_load(&mut unit_load)?;
    tx.save_order(order)?;

    debug!(
        allocation = %record.id,
        unit_load = unit_load.code(),
        item = %item_id,
        quantity = %quantity,
        "stock reserved"
    );
    Ok(quantity)
}
