//! Location occupancy counters, cell shapes and laneway usage statistics.
//!
//! Every capacity-affecting mutation is applied incrementally here;
//! [`rebuild_stat`] recomputes a laneway from scratch and must agree with
//! the incremental path.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use rackwms_core::{DomainError, LanewayId, LocationId};
use rackwms_inventory::{Laneway, Location, OccupancyChange, UnitLoad};

use crate::error::WmsResult;
use crate::store::WarehouseTx;

/// A unit load entered `location_id`.
pub fn increase_unitload_count(
    tx: &mut dyn WarehouseTx,
    location_id: LocationId,
    now: DateTime<Utc>,
) -> WmsResult<Location> {
    let mut loc = tx.location(location_id)?;
    let change = loc.increase_unitload_count()?;
    after_occupancy(tx, loc, change, now)
}

/// A unit load left `location_id`.
pub fn decrease_unitload_count(
    tx: &mut dyn WarehouseTx,
    location_id: LocationId,
    now: DateTime<Utc>,
) -> WmsResult<Location> {
    let mut loc = tx.location(location_id)?;
    let change = loc.decrease_unitload_count()?;
    after_occupancy(tx, loc, change, now)
}

fn after_occupancy(
    tx: &mut dyn WarehouseTx,
    loc: Location,
    change: OccupancyChange,
    now: DateTime<Utc>,
) -> WmsResult<Location> {
    tx.save_location(loc.clone())?;
    refresh_cell(tx, &loc)?;

    if change.is_noop() || !loc.exists() {
        return Ok(loc);
    }
    if let Some(mut laneway) = owning_laneway(tx, &loc)? {
        if laneway.usage_mut().apply_occupancy(loc.profile(), &change, now) {
            tx.save_laneway(laneway)?;
        } else {
            warn_missing_entry(&laneway, &loc);
        }
    }
    Ok(loc)
}

/// Toggle the inbound-disabled flag of a location.
pub fn set_inbound_disabled(
    tx: &mut dyn WarehouseTx,
    location_id: LocationId,
    disabled: bool,
    now: DateTime<Utc>,
) -> WmsResult<Location> {
    let mut loc = tx.location(location_id)?;
    if loc.inbound_disabled() == disabled {
        return Ok(loc);
    }
    let change = loc.set_inbound_disabled(disabled);
    tx.save_location(loc.clone())?;

    if loc.exists() {
        if let Some(mut laneway) = owning_laneway(tx, &loc)? {
            let delta = if disabled { 1 } else { -1 };
            if laneway
                .usage_mut()
                .apply_inbound_flag(loc.profile(), delta, &change, now)
            {
                tx.save_laneway(laneway)?;
            } else {
                warn_missing_entry(&laneway, &loc);
            }
        }
    }
    Ok(loc)
}

/// Toggle the `exists` flag; the location's whole contribution enters or
/// leaves its laneway statistics.
pub fn set_exists(
    tx: &mut dyn WarehouseTx,
    location_id: LocationId,
    exists: bool,
    now: DateTime<Utc>,
) -> WmsResult<Location> {
    let mut loc = tx.location(location_id)?;
    if loc.is_non_existent() {
        return Err(DomainError::precondition(format!(
            "virtual location {} cannot be toggled",
            loc.code()
        ))
        .into());
    }
    if !loc.set_exists(exists) {
        return Ok(loc);
    }
    tx.save_location(loc.clone())?;

    if let Some(mut laneway) = owning_laneway(tx, &loc)? {
        if laneway.usage_mut().apply_existence(&loc, exists, now) {
            tx.save_laneway(laneway)?;
        } else {
            warn_missing_entry(&laneway, &loc);
        }
    }
    Ok(loc)
}

/// Recount a laneway's usage map over its existing locations.
pub fn rebuild_stat(
    tx: &mut dyn WarehouseTx,
    laneway_id: LanewayId,
    now: DateTime<Utc>,
) -> WmsResult<Laneway> {
    let mut laneway = tx.laneway(laneway_id)?;
    let locations = tx.locations_in_laneway(laneway_id)?;
    laneway.rebuild_usage(&locations, now);
    debug!(
        laneway = laneway.code(),
        profiles = laneway.usage().len(),
        "laneway usage rebuilt"
    );
    tx.save_laneway(laneway.clone())?;
    Ok(laneway)
}

/// Move a unit load between locations, keeping counters in step. The
/// virtual location is never counted. The caller saves the unit load.
pub fn relocate(
    tx: &mut dyn WarehouseTx,
    unit_load: &mut UnitLoad,
    to: LocationId,
    now: DateTime<Utc>,
) -> WmsResult<()> {
    let from = unit_load.location_id();
    if from == to {
        return Ok(());
    }

    let target = tx.location(to)?;
    if target.is_non_existent() {
        return Err(DomainError::precondition(format!(
            "unit load {} cannot be moved back to the virtual location",
            unit_load.code()
        ))
        .into());
    }
    if !target.exists() {
        return Err(DomainError::precondition(format!(
            "location {} does not exist physically",
            target.code()
        ))
        .into());
    }

    if !tx.location(from)?.is_non_existent() {
        decrease_unitload_count(tx, from, now)?;
    }
    increase_unitload_count(tx, to, now)?;
    unit_load.set_location(to);
    Ok(())
}

/// Recompute the shape of the cell owning `loc`, if any.
fn refresh_cell(tx: &mut dyn WarehouseTx, loc: &Location) -> WmsResult<()> {
    let Some(cell_id) = loc.cell_id() else {
        return Ok(());
    };
    let mut cell = tx.cell(cell_id)?;
    let near_loaded = slot_loaded(tx, cell.near(), loc)?;
    let far_loaded = slot_loaded(tx, cell.far(), loc)?;
    if cell.update_shape(near_loaded, far_loaded) {
        debug!(cell = %cell_id, shape = ?cell.shape(), "cell shape changed");
        tx.save_cell(cell)?;
    }
    Ok(())
}

fn slot_loaded(
    tx: &dyn WarehouseTx,
    slot: Option<LocationId>,
    changed: &Location,
) -> WmsResult<bool> {
    match slot {
        None => Ok(false),
        Some(id) if id == changed.id_typed() => Ok(changed.is_loaded()),
        Some(id) => Ok(tx.location(id)?.is_loaded()),
    }
}

fn owning_laneway(tx: &dyn WarehouseTx, loc: &Location) -> WmsResult<Option<Laneway>> {
    loc.laneway_id().map(|id| tx.laneway(id)).transpose()
}

fn warn_missing_entry(laneway: &Laneway, loc: &Location) {
    warn!(
        laneway = laneway.code(),
        location = loc.code(),
        profile = ?loc.profile(),
        "no usage entry for storage profile, change dropped until rebuild"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackwms_core::UnitLoadId;
    use rackwms_inventory::{LocationKind, StorageProfileKey};

    use crate::store::{InMemoryWarehouseStore, WarehouseStore};

    fn seeded() -> (InMemoryWarehouseStore, LanewayId, LocationId) {
        let store = InMemoryWarehouseStore::new();
        let laneway = LanewayId::new();
        let location = LocationId::new();
        store
            .transaction(|tx| {
                tx.save_laneway(Laneway::new(laneway, "L1"))?;
                let profile = StorageProfileKey::default();
                let loc = Location::new(location, "R-01", LocationKind::Storage, "A", profile)?
                    .in_rack(laneway, None, 1, 0)?;
                tx.save_location(loc)?;
                rebuild_stat(tx, laneway, Utc::now()).map(|_| ())
            })
            .unwrap();
        (store, laneway, location)
    }

    #[test]
    fn occupancy_flips_reach_the_laneway() {
        let (store, laneway, location) = seeded();
        let now = Utc::now();

        let usage = store
            .transaction(|tx| {
                increase_unitload_count(tx, location, now)?;
                increase_unitload_count(tx, location, now)?;
                Ok(tx.laneway(laneway)?.usage().get(&StorageProfileKey::default()).copied())
            })
            .unwrap()
            .unwrap();
        // Second load does not flip the loaded predicate again.
        assert_eq!(usage.counts(), (1, 0, 1, 0));
    }

    #[test]
    fn emptying_an_empty_location_is_fatal() {
        let (store, _, location) = seeded();
        let err = store
            .transaction(|tx| decrease_unitload_count(tx, location, Utc::now()))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unit_loads_never_move_back_to_the_virtual_location() {
        let (store, _, location) = seeded();
        let err = store
            .transaction(|tx| {
                let mut ul = UnitLoad::new(UnitLoadId::new(), "UL-1", location, Utc::now())?;
                relocate(tx, &mut ul, store.non_existent_location(), Utc::now())
            })
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Precondition(_))));
    }
}
