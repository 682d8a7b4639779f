use serde::{Deserialize, Serialize};

use rackwms_core::ValueObject;

/// Identity of a fungible stock pool.
///
/// Two inventory items with equal identities are interchangeable for
/// fulfillment purposes; the stock ledger keeps one running balance per
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockIdentity {
    pub material: String,
    pub batch: String,
    pub stock_status: String,
    pub uom: String,
}

impl ValueObject for StockIdentity {}

impl StockIdentity {
    pub fn new(
        material: impl Into<String>,
        batch: impl Into<String>,
        stock_status: impl Into<String>,
        uom: impl Into<String>,
    ) -> Self {
        Self {
            material: material.into(),
            batch: batch.into(),
            stock_status: stock_status.into(),
            uom: uom.into(),
        }
    }
}

impl core::fmt::Display for StockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.material, self.batch, self.stock_status, self.uom
        )
    }
}
