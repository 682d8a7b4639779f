//! Posting of stock movements to the append-only ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use rackwms_core::{DomainError, Quantity};
use rackwms_inventory::StockIdentity;
use rackwms_ledger::{StockLedgerEntry, StockMovement, replay};

use crate::error::WmsResult;
use crate::factory::EntityFactory;
use crate::store::WarehouseTx;

/// Append one ledger entry for `movement`.
///
/// With `update_balance` the running balance of the stock identity is
/// upserted first (opened through the factory on first use) and the entry
/// records the new balance. Without it the entry records the balance as it
/// stands.
pub fn post_movement(
    tx: &mut dyn WarehouseTx,
    factory: &dyn EntityFactory,
    movement: StockMovement,
    update_balance: bool,
    now: DateTime<Utc>,
) -> WmsResult<StockLedgerEntry> {
    let current = tx.stock_balance(&movement.stock)?;

    let balance = if update_balance {
        let mut stock_balance =
            current.unwrap_or_else(|| factory.new_stock(movement.stock.clone(), now));
        let after = stock_balance.apply(&movement, now);
        tx.save_stock_balance(stock_balance)?;
        after
    } else {
        current.map_or(Decimal::ZERO, |b| b.balance())
    };

    let entry = factory.new_flow(movement, balance, now);
    debug!(
        flow = %entry.id_typed(),
        stock = %entry.stock(),
        quantity = %entry.signed_quantity(),
        balance = %balance,
        "ledger entry posted"
    );
    tx.append_flow(entry.clone())?;
    Ok(entry)
}

/// Replay the ledger of one stock identity and check it against every
/// recorded snapshot and the materialized balance.
pub fn audit(tx: &dyn WarehouseTx, stock: &StockIdentity) -> WmsResult<Quantity> {
    let entries = tx.flows(stock)?;
    let replayed = replay(&entries).map_err(|(flow, expected)| {
        DomainError::invariant(format!(
            "ledger entry {flow} of {stock} records a balance other than {expected}"
        ))
    })?;

    let materialized = tx
        .stock_balance(stock)?
        .map_or(Decimal::ZERO, |b| b.balance());
    if materialized != replayed {
        return Err(DomainError::invariant(format!(
            "balance of {stock} is {materialized}, ledger replays to {replayed}"
        ))
        .into());
    }
    Ok(replayed)
}
