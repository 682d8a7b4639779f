use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rackwms_core::{Entity, LanewayId};

use crate::location::{Location, OccupancyChange, StorageProfileKey};

/// Usage counters of one storage profile within a laneway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanewayUsage {
    pub total: i64,
    pub available: i64,
    pub loaded: i64,
    pub inbound_disabled: i64,
    pub modified_at: DateTime<Utc>,
}

impl LanewayUsage {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            available: 0,
            loaded: 0,
            inbound_disabled: 0,
            modified_at: now,
        }
    }

    /// Counter tuple `(total, available, loaded, inbound_disabled)`,
    /// without the timestamp.
    pub fn counts(&self) -> (i64, i64, i64, i64) {
        (self.total, self.available, self.loaded, self.inbound_disabled)
    }

    fn add_location(&mut self, loc: &Location, sign: i64) {
        self.total += sign;
        if loc.is_loaded() {
            self.loaded += sign;
        }
        if loc.is_available() {
            self.available += sign;
        }
        if loc.inbound_disabled() {
            self.inbound_disabled += sign;
        }
    }
}

/// Cached usage statistics of a laneway, keyed by storage profile.
///
/// Maintained incrementally on every location mutation and rebuildable from
/// scratch; both paths must yield the same counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageMap {
    entries: BTreeMap<StorageProfileKey, LanewayUsage>,
}

impl UsageMap {
    /// Recount from the given locations; locations with `exists == false`
    /// are ignored.
    pub fn recount<'a>(
        locations: impl IntoIterator<Item = &'a Location>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entries: BTreeMap<StorageProfileKey, LanewayUsage> = BTreeMap::new();
        for loc in locations.into_iter().filter(|l| l.exists()) {
            entries
                .entry(loc.profile().clone())
                .or_insert_with(|| LanewayUsage::empty(now))
                .add_location(loc, 1);
        }
        Self { entries }
    }

    pub fn get(&self, key: &StorageProfileKey) -> Option<&LanewayUsage> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StorageProfileKey, &LanewayUsage)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Counters only, with all-zero entries dropped. Two maps describing the
    /// same occupancy compare equal here even if one still carries an entry
    /// whose last location stopped existing.
    pub fn normalized(&self) -> BTreeMap<StorageProfileKey, (i64, i64, i64, i64)> {
        self.entries
            .iter()
            .filter(|(_, u)| u.counts() != (0, 0, 0, 0))
            .map(|(k, u)| (k.clone(), u.counts()))
            .collect()
    }

    /// Apply a loaded/available flip. Returns false when no entry exists for
    /// the key; the change is dropped and the map stays stale until rebuilt.
    pub fn apply_occupancy(
        &mut self,
        key: &StorageProfileKey,
        change: &OccupancyChange,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(usage) = self.entries.get_mut(key) else {
            return false;
        };
        usage.loaded += change.loaded_delta();
        usage.available += change.available_delta();
        usage.modified_at = now;
        true
    }

    /// Apply an inbound-disabled flag flip (already applied to `change`).
    pub fn apply_inbound_flag(
        &mut self,
        key: &StorageProfileKey,
        disabled_delta: i64,
        change: &OccupancyChange,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(usage) = self.entries.get_mut(key) else {
            return false;
        };
        usage.inbound_disabled += disabled_delta;
        usage.available += change.available_delta();
        usage.modified_at = now;
        true
    }

    /// Add (`exists == true`) or remove a location's whole contribution.
    pub fn apply_existence(&mut self, loc: &Location, exists: bool, now: DateTime<Utc>) -> bool {
        let Some(usage) = self.entries.get_mut(loc.profile()) else {
            return false;
        };
        usage.add_location(loc, if exists { 1 } else { -1 });
        usage.modified_at = now;
        true
    }
}

/// Automated storage aisle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Laneway {
    id: LanewayId,
    code: String,
    offline: bool,
    usage: UsageMap,
}

impl Laneway {
    pub fn new(id: LanewayId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            offline: false,
            usage: UsageMap::default(),
        }
    }

    pub fn id_typed(&self) -> LanewayId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn usage(&self) -> &UsageMap {
        &self.usage
    }

    pub fn usage_mut(&mut self) -> &mut UsageMap {
        &mut self.usage
    }

    /// Replace the cached statistics with a full recount over the laneway's
    /// locations. Locations of other laneways are ignored.
    pub fn rebuild_usage<'a>(
        &mut self,
        locations: impl IntoIterator<Item = &'a Location>,
        now: DateTime<Utc>,
    ) {
        let id = self.id;
        self.usage = UsageMap::recount(
            locations
                .into_iter()
                .filter(move |l| l.laneway_id() == Some(id)),
            now,
        );
    }
}

impl Entity for Laneway {
    type Id = LanewayId;
    const KIND: &'static str = "laneway";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
