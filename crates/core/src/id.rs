//! Strongly-typed identifiers used across the warehouse domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so ids created later sort later.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a unit load (pallet / container).
    UnitLoadId,
    "UnitLoadId"
);
uuid_id!(
    /// Identifier of an inventory item inside a unit load.
    InventoryItemId,
    "InventoryItemId"
);
uuid_id!(
    /// Identifier of an outbound order (demand header).
    OutboundOrderId,
    "OutboundOrderId"
);
uuid_id!(DemandLineId, "DemandLineId");
uuid_id!(
    /// Identifier of an allocation record (reservation).
    AllocationId,
    "AllocationId"
);
uuid_id!(LocationId, "LocationId");
uuid_id!(LanewayId, "LanewayId");
uuid_id!(
    /// Identifier of a double-deep rack cell (near + far slot pair).
    CellId,
    "CellId"
);
uuid_id!(
    /// Identifier of a stock ledger entry.
    FlowId,
    "FlowId"
);
