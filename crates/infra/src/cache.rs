//! Location code lookup cache.
//!
//! Owned by the service and passed where needed; there is no process-wide
//! instance. Maps codes to ids only: existence and every other attribute
//! are read from the transaction. A hit is checked against the
//! transaction before it is trusted, so entries loaded by a unit of work
//! that later rolled back never leak out.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use rackwms_core::{DomainError, Entity, LocationId};
use rackwms_inventory::Location;

use crate::error::{StoreError, WmsResult};
use crate::store::WarehouseTx;

#[derive(Debug, Default)]
pub struct LocationCodeCache {
    entries: RwLock<Option<HashMap<String, LocationId>>>,
}

impl LocationCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)load every code from the store.
    pub fn init(&self, tx: &dyn WarehouseTx) -> WmsResult<usize> {
        let codes: HashMap<String, LocationId> = tx.location_codes()?.into_iter().collect();
        let len = codes.len();
        *self.entries.write().map_err(|_| StoreError::Poisoned)? = Some(codes);
        debug!(locations = len, "location code cache loaded");
        Ok(len)
    }

    pub fn invalidate(&self) {
        match self.entries.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        debug!("location code cache invalidated");
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.read().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Id of the location with `code`. A miss or a stale hit reloads once
    /// before failing, so locations created after the last load are found.
    pub fn resolve(&self, tx: &dyn WarehouseTx, code: &str) -> WmsResult<LocationId> {
        if let Some(id) = self.lookup(code)? {
            match tx.location(id) {
                Ok(location) if location.code() == code => return Ok(id),
                Ok(_) => {}
                Err(err) if matches!(err.as_domain(), Some(DomainError::NotFound(_))) => {}
                Err(err) => return Err(err),
            }
        }
        self.init(tx)?;
        self.lookup(code)?
            .ok_or_else(|| DomainError::not_found(Location::KIND, code).into())
    }

    fn lookup(&self, code: &str) -> WmsResult<Option<LocationId>> {
        let guard = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.as_ref().and_then(|m| m.get(code).copied()))
    }
}
