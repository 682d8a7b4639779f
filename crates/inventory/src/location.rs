use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rackwms_core::{CellId, DomainError, DomainResult, Entity, LanewayId, LocationId, ValueObject};

/// Near slot of a double-deep cell.
pub const DEPTH_NEAR: u8 = 1;
/// Far slot of a double-deep cell; reachable only through the near slot.
pub const DEPTH_FAR: u8 = 2;
/// Code of the virtual location holding registered but unplaced unit loads.
pub const NON_EXISTENT_LOCATION_CODE: &str = "N";

/// What a location physically is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Rack or floor storage slot.
    Storage,
    /// Staging / pick station; picking only happens here.
    Station,
    /// Virtual location of unit loads that are registered but not yet placed.
    NonExistent,
}

/// Storage profile of a location; laneway usage statistics are grouped by it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageProfileKey {
    pub storage_group: String,
    pub weight_limit: Decimal,
    pub height_limit: Decimal,
    pub spec: String,
}

impl ValueObject for StorageProfileKey {}

/// Loaded/available predicates captured around a location mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyChange {
    pub was_loaded: bool,
    pub was_available: bool,
    pub is_loaded: bool,
    pub is_available: bool,
}

impl OccupancyChange {
    pub fn loaded_delta(&self) -> i64 {
        flip(self.was_loaded, self.is_loaded)
    }

    pub fn available_delta(&self) -> i64 {
        flip(self.was_available, self.is_available)
    }

    pub fn is_noop(&self) -> bool {
        self.loaded_delta() == 0 && self.available_delta() == 0
    }
}

fn flip(before: bool, after: bool) -> i64 {
    match (before, after) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// A place a unit load can be: rack slot, station, or the virtual `N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    code: String,
    kind: LocationKind,
    area: String,
    pub inbound_count: u32,
    pub inbound_limit: u32,
    pub outbound_count: u32,
    pub outbound_limit: u32,
    inbound_disabled: bool,
    pub outbound_disabled: bool,
    exists: bool,
    profile: StorageProfileKey,
    unitload_count: u32,
    laneway_id: Option<LanewayId>,
    cell_id: Option<CellId>,
    depth: u8,
    orientation_order: i32,
}

impl Location {
    pub fn new(
        id: LocationId,
        code: impl Into<String>,
        kind: LocationKind,
        area: impl Into<String>,
        profile: StorageProfileKey,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("location code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            kind,
            area: area.into(),
            inbound_count: 0,
            inbound_limit: 1,
            outbound_count: 0,
            outbound_limit: 1,
            inbound_disabled: false,
            outbound_disabled: false,
            exists: true,
            profile,
            unitload_count: 0,
            laneway_id: None,
            cell_id: None,
            depth: DEPTH_NEAR,
            orientation_order: 0,
        })
    }

    /// The virtual location `N`; it carries no capacity.
    pub fn non_existent(id: LocationId) -> Self {
        Self {
            id,
            code: NON_EXISTENT_LOCATION_CODE.to_string(),
            kind: LocationKind::NonExistent,
            area: String::new(),
            inbound_count: 0,
            inbound_limit: 0,
            outbound_count: 0,
            outbound_limit: 0,
            inbound_disabled: true,
            outbound_disabled: false,
            exists: true,
            profile: StorageProfileKey::default(),
            unitload_count: 0,
            laneway_id: None,
            cell_id: None,
            depth: DEPTH_NEAR,
            orientation_order: 0,
        }
    }

    /// Place the location in a laneway rack, optionally as part of a
    /// double-deep cell at the given depth.
    pub fn in_rack(
        mut self,
        laneway_id: LanewayId,
        cell_id: Option<CellId>,
        depth: u8,
        orientation_order: i32,
    ) -> DomainResult<Self> {
        if depth != DEPTH_NEAR && depth != DEPTH_FAR {
            return Err(DomainError::validation(format!(
                "rack depth must be {DEPTH_NEAR} or {DEPTH_FAR} (got {depth})"
            )));
        }
        self.laneway_id = Some(laneway_id);
        self.cell_id = cell_id;
        self.depth = depth;
        self.orientation_order = orientation_order;
        Ok(self)
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    pub fn is_storage(&self) -> bool {
        self.kind == LocationKind::Storage
    }

    pub fn is_non_existent(&self) -> bool {
        self.kind == LocationKind::NonExistent
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn profile(&self) -> &StorageProfileKey {
        &self.profile
    }

    pub fn unitload_count(&self) -> u32 {
        self.unitload_count
    }

    pub fn laneway_id(&self) -> Option<LanewayId> {
        self.laneway_id
    }

    pub fn cell_id(&self) -> Option<CellId> {
        self.cell_id
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn orientation_order(&self) -> i32 {
        self.orientation_order
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn inbound_disabled(&self) -> bool {
        self.inbound_disabled
    }

    pub fn is_loaded(&self) -> bool {
        self.unitload_count > 0
    }

    pub fn is_available(&self) -> bool {
        !self.is_loaded() && !self.inbound_disabled
    }

    /// True when another unit load may be sent here.
    pub fn accepts_inbound(&self) -> bool {
        self.exists && !self.inbound_disabled && self.inbound_count < self.inbound_limit
    }

    fn snapshot(&self) -> (bool, bool) {
        (self.is_loaded(), self.is_available())
    }

    fn change_since(&self, before: (bool, bool)) -> OccupancyChange {
        OccupancyChange {
            was_loaded: before.0,
            was_available: before.1,
            is_loaded: self.is_loaded(),
            is_available: self.is_available(),
        }
    }

    fn ensure_countable(&self) -> DomainResult<()> {
        if self.is_non_existent() {
            return Err(DomainError::invariant(format!(
                "unit load count of virtual location {} must not change",
                self.code
            )));
        }
        Ok(())
    }

    /// A unit load entered the location.
    pub fn increase_unitload_count(&mut self) -> DomainResult<OccupancyChange> {
        self.ensure_countable()?;
        let before = self.snapshot();
        self.unitload_count += 1;
        Ok(self.change_since(before))
    }

    /// A unit load left the location.
    pub fn decrease_unitload_count(&mut self) -> DomainResult<OccupancyChange> {
        self.ensure_countable()?;
        if self.unitload_count == 0 {
            return Err(DomainError::invariant(format!(
                "unit load count of location {} is already zero",
                self.code
            )));
        }
        let before = self.snapshot();
        self.unitload_count -= 1;
        Ok(self.change_since(before))
    }

    pub fn set_inbound_disabled(&mut self, disabled: bool) -> OccupancyChange {
        let before = self.snapshot();
        self.inbound_disabled = disabled;
        self.change_since(before)
    }

    /// Toggle the `exists` flag. Counters are untouched; only aggregate
    /// statistics treat non-existent locations as absent.
    pub fn set_exists(&mut self, exists: bool) -> bool {
        let changed = self.exists != exists;
        self.exists = exists;
        changed
    }
}

impl Entity for Location {
    type Id = LocationId;
    const KIND: &'static str = "location";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Occupancy shape of a double-deep cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellShape {
    Empty,
    NearOnly,
    FarOnly,
    Full,
}

impl CellShape {
    pub fn from_occupancy(near_loaded: bool, far_loaded: bool) -> Self {
        match (near_loaded, far_loaded) {
            (false, false) => CellShape::Empty,
            (true, false) => CellShape::NearOnly,
            (false, true) => CellShape::FarOnly,
            (true, true) => CellShape::Full,
        }
    }

    /// The far slot cannot be reached while the near slot holds a load.
    pub fn far_blocked(self) -> bool {
        matches!(self, CellShape::NearOnly | CellShape::Full)
    }
}

/// Near/far slot pair of a double-deep rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    id: CellId,
    near: Option<LocationId>,
    far: Option<LocationId>,
    shape: CellShape,
}

impl Cell {
    pub fn new(id: CellId, near: Option<LocationId>, far: Option<LocationId>) -> Self {
        Self {
            id,
            near,
            far,
            shape: CellShape::Empty,
        }
    }

    pub fn id_typed(&self) -> CellId {
        self.id
    }

    pub fn near(&self) -> Option<LocationId> {
        self.near
    }

    pub fn far(&self) -> Option<LocationId> {
        self.far
    }

    pub fn shape(&self) -> CellShape {
        self.shape
    }

    /// Recompute the shape from the current occupancy of both slots.
    /// Returns true if the shape changed.
    pub fn update_shape(&mut self, near_loaded: bool, far_loaded: bool) -> bool {
        let shape = CellShape::from_occupancy(near_loaded, far_loaded);
        let changed = shape != self.shape;
        self.shape = shape;
        changed
    }

    /// Retrieval rank of a slot of this cell at `depth`:
    /// 0 = directly reachable, 1 = behind a loaded near slot.
    pub fn retrieval_rank(&self, depth: u8) -> i32 {
        if depth == DEPTH_FAR && self.shape.far_blocked() {
            1
        } else {
            0
        }
    }
}

impl Entity for Cell {
    type Id = CellId;
    const KIND: &'static str = "cell";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
