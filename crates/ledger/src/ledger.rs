use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rackwms_core::quantity::ensure_positive;
use rackwms_core::{DomainResult, Entity, FlowId, Quantity};
use rackwms_inventory::StockIdentity;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Inbound,
    Outbound,
}

impl MovementDirection {
    pub fn signed(self, quantity: Quantity) -> Quantity {
        match self {
            MovementDirection::Inbound => quantity,
            MovementDirection::Outbound => -quantity,
        }
    }
}

/// Business context recorded with a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMetadata {
    /// e.g. "outbound_order", "receiving".
    pub business_type: String,
    /// e.g. "pick", "register".
    pub operation_type: String,
    /// Originating document (order code, receipt number).
    pub document_code: Option<String>,
    pub unit_load_code: Option<String>,
}

impl FlowMetadata {
    pub fn new(business_type: impl Into<String>, operation_type: impl Into<String>) -> Self {
        Self {
            business_type: business_type.into(),
            operation_type: operation_type.into(),
            document_code: None,
            unit_load_code: None,
        }
    }

    pub fn document(mut self, code: impl Into<String>) -> Self {
        self.document_code = Some(code.into());
        self
    }

    pub fn unit_load(mut self, code: impl Into<String>) -> Self {
        self.unit_load_code = Some(code.into());
        self
    }
}

/// A movement about to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub stock: StockIdentity,
    /// Positive magnitude; the direction carries the sign.
    pub quantity: Quantity,
    pub direction: MovementDirection,
    pub metadata: FlowMetadata,
}

impl StockMovement {
    pub fn new(
        stock: StockIdentity,
        quantity: Quantity,
        direction: MovementDirection,
        metadata: FlowMetadata,
    ) -> DomainResult<Self> {
        ensure_positive("movement quantity", quantity)?;
        Ok(Self {
            stock,
            quantity,
            direction,
            metadata,
        })
    }

    pub fn signed_quantity(&self) -> Quantity {
        self.direction.signed(self.quantity)
    }
}

/// Immutable ledger entry ("flow").
///
/// `balance` is the balance of the stock identity right after this entry was
/// posted: a snapshot, not a live value. Replaying entries in order must
/// reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    id: FlowId,
    stock: StockIdentity,
    quantity: Quantity,
    direction: MovementDirection,
    metadata: FlowMetadata,
    balance: Quantity,
    posted_at: DateTime<Utc>,
}

impl StockLedgerEntry {
    pub fn new(
        id: FlowId,
        movement: StockMovement,
        balance: Quantity,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            stock: movement.stock,
            quantity: movement.quantity,
            direction: movement.direction,
            metadata: movement.metadata,
            balance,
            posted_at,
        }
    }

    pub fn id_typed(&self) -> FlowId {
        self.id
    }

    pub fn stock(&self) -> &StockIdentity {
        &self.stock
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn direction(&self) -> MovementDirection {
        self.direction
    }

    pub fn signed_quantity(&self) -> Quantity {
        self.direction.signed(self.quantity)
    }

    pub fn metadata(&self) -> &FlowMetadata {
        &self.metadata
    }

    pub fn balance(&self) -> Quantity {
        self.balance
    }

    pub fn posted_at(&self) -> DateTime<Utc> {
        self.posted_at
    }
}

impl Entity for StockLedgerEntry {
    type Id = FlowId;
    const KIND: &'static str = "stock ledger entry";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Materialized running balance of one stock identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    stock: StockIdentity,
    balance: Quantity,
    /// Baseline for stock aging, stamped when the balance is first created.
    age_baseline: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl StockBalance {
    /// Open a balance at zero.
    pub fn open(stock: StockIdentity, now: DateTime<Utc>) -> Self {
        Self {
            stock,
            balance: Decimal::ZERO,
            age_baseline: now,
            modified_at: now,
        }
    }

    pub fn stock(&self) -> &StockIdentity {
        &self.stock
    }

    pub fn balance(&self) -> Quantity {
        self.balance
    }

    pub fn age_baseline(&self) -> DateTime<Utc> {
        self.age_baseline
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Apply a movement and return the resulting balance.
    pub fn apply(&mut self, movement: &StockMovement, now: DateTime<Utc>) -> Quantity {
        self.balance += movement.signed_quantity();
        self.modified_at = now;
        self.balance
    }
}

/// Replay entries in posting order and return the final balance.
///
/// Stops at the first entry whose recorded balance disagrees with the
/// running sum and returns it as `Err` (the offending entry's id and the
/// expected balance).
pub fn replay<'a>(
    entries: impl IntoIterator<Item = &'a StockLedgerEntry>,
) -> Result<Quantity, (FlowId, Quantity)> {
    let mut running = Decimal::ZERO;
    for entry in entries {
        running += entry.signed_quantity();
        if entry.balance != running {
            return Err((entry.id, running));
        }
    }
    Ok(running)
}
