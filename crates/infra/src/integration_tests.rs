//! End-to-end tests of the warehouse service over the in-memory store.
//!
//! Covers: allocation ordering and filters, deallocation, picking with
//! ledger posting, capacity statistics, notifications and rollback.

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rackwms_core::{
    AllocationId, CellId, DemandLineId, DomainError, ExpectedVersion, InventoryItemId, LanewayId,
    LocationId, OutboundOrderId, UnitLoadId, Versioned,
};
use rackwms_events::{EventBus, InMemoryEventBus, Notification};
use rackwms_inventory::{
    AllocationTarget, Cell, CellShape, DEPTH_FAR, DEPTH_NEAR, Laneway, Location, LocationKind,
    StockIdentity, StorageProfileKey, TransportTask,
};
use rackwms_ledger::MovementDirection;
use rackwms_outbound::{DemandLine, NewDemandLine};

use crate::notify::{LOCATION_CHANGED, ORDER_CLOSED};
use crate::{
    AllocationOptions, BusSink, InMemoryWarehouseStore, PickRequest, ReceivedStock,
    WarehouseService, WarehouseStore, WarehouseTx, WmsConfig, WmsResult,
};

type Bus = Arc<InMemoryEventBus<Notification>>;
type Service = WarehouseService<Arc<InMemoryWarehouseStore>, BusSink<Bus>>;

struct Fixture {
    svc: Service,
    bus: Bus,
    laneway: LanewayId,
    remote_laneway: LanewayId,
}

const RACKS: [&str; 7] = ["R-01", "R-02", "R-03", "R-04", "R-05", "R-06", "B-01"];

fn profile() -> StorageProfileKey {
    StorageProfileKey {
        storage_group: "HB".into(),
        weight_limit: dec!(1000),
        height_limit: dec!(1.8),
        spec: "EUR".into(),
    }
}

fn stock() -> StockIdentity {
    StockIdentity::new("M", "B", "OK", "EA")
}

#[allow(clippy::too_many_arguments)]
fn rack(
    tx: &mut dyn WarehouseTx,
    id: LocationId,
    code: &str,
    area: &str,
    laneway: LanewayId,
    cell: Option<CellId>,
    depth: u8,
    orientation: i32,
) -> WmsResult<()> {
    let loc = Location::new(id, code, LocationKind::Storage, area, profile())?
        .in_rack(laneway, cell, depth, orientation)?;
    tx.save_location(loc)
}

/// Laneway L1: R-01..R-04 (area A), double-deep cell R-05 near / R-06 far
/// (area A), B-01 (area B). Laneway L2: X-01 (area A). Station ST-1.
fn fixture() -> Fixture {
    rackwms_observability::init_for_tests();

    let store = Arc::new(InMemoryWarehouseStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let svc = WarehouseService::with_sink(store, BusSink::new(bus.clone()), WmsConfig::default());

    let laneway = LanewayId::new();
    let remote_laneway = LanewayId::new();
    svc.store()
        .transaction(|tx| {
            tx.save_laneway(Laneway::new(laneway, "L1"))?;
            tx.save_laneway(Laneway::new(remote_laneway, "L2"))?;
            for (i, code) in RACKS[..4].iter().enumerate() {
                rack(tx, LocationId::new(), code, "A", laneway, None, DEPTH_NEAR, i as i32 + 1)?;
            }

            let (near, far, cell) = (LocationId::new(), LocationId::new(), CellId::new());
            tx.save_cell(Cell::new(cell, Some(near), Some(far)))?;
            rack(tx, near, "R-05", "A", laneway, Some(cell), DEPTH_NEAR, 0)?;
            rack(tx, far, "R-06", "A", laneway, Some(cell), DEPTH_FAR, 0)?;

            rack(tx, LocationId::new(), "B-01", "B", laneway, None, DEPTH_NEAR, 7)?;
            rack(tx, LocationId::new(), "X-01", "A", remote_laneway, None, DEPTH_NEAR, 1)?;

            let station = LocationKind::Station;
            tx.save_location(Location::new(LocationId::new(), "ST-1", station, "OUT", profile())?)
        })
        .unwrap();
    svc.rebuild_laneway_stat(laneway).unwrap();
    svc.rebuild_laneway_stat(remote_laneway).unwrap();

    Fixture {
        svc,
        bus,
        laneway,
        remote_laneway,
    }
}

impl Fixture {
    fn receive(&self, code: &str, qty: Decimal, ordering: &str, location: &str) -> UnitLoadId {
        self.receive_stock(code, stock(), qty, ordering, location)
    }

    fn receive_stock(
        &self,
        code: &str,
        stock: StockIdentity,
        qty: Decimal,
        ordering: &str,
        location: &str,
    ) -> UnitLoadId {
        let received = vec![ReceivedStock::new(stock, qty, ordering)];
        self.svc.register_unit_load(code, received, Some(location)).unwrap()
    }

    fn order(&self, code: &str, qty: Decimal) -> (OutboundOrderId, DemandLineId) {
        let id = self.svc.create_order(code).unwrap();
        let line = self
            .svc
            .add_demand_line(id, ExpectedVersion::Any, NewDemandLine::new("M", qty).batch("B"))
            .unwrap();
        (id, line)
    }

    fn line(&self, order: OutboundOrderId, line: DemandLineId) -> DemandLine {
        self.svc.order(order).unwrap().line(line).unwrap().clone()
    }

    fn item_of(&self, unit_load_code: &str) -> InventoryItemId {
        self.svc.unit_load(unit_load_code).unwrap().items()[0].id_typed()
    }

    fn target_of(&self, unit_load_code: &str) -> Option<AllocationTarget> {
        self.svc.unit_load(unit_load_code).unwrap().allocation_target()
    }

    fn set_task(&self, unit_load_code: &str, task_type: &str) {
        self.svc
            .store()
            .transaction(|tx| {
                let mut ul = tx.unit_load_by_code(unit_load_code)?;
                let at = ul.location_id();
                ul.set_transport_task(Some(TransportTask {
                    task_code: format!("T-{unit_load_code}"),
                    task_type: task_type.into(),
                    from_location: at,
                    to_location: at,
                }));
                tx.save_unit_load(&mut ul)
            })
            .unwrap();
    }

    fn allocate(&self, order: OutboundOrderId) -> crate::AllocationSummary {
        self.svc.allocate(order, &self.svc.default_options()).unwrap()
    }
}

fn domain_err<T: std::fmt::Debug>(result: WmsResult<T>) -> DomainError {
    result.unwrap_err().as_domain().cloned().expect("domain error")
}

// ---- allocation ----

#[test]
fn allocation_follows_out_ordering() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    let (order, line) = f.order("SO-1", dec!(100));

    let summary = f.allocate(order);
    assert_eq!(summary.reserved, dec!(100));
    assert_eq!(summary.reservations, 2);
    assert!(summary.short_lines.is_empty());

    let line = f.line(order, line);
    assert_eq!(line.reserved_on_item(f.item_of("UL-1")), dec!(60));
    assert_eq!(line.reserved_on_item(f.item_of("UL-2")), dec!(40));
    assert_eq!(line.shortage(), dec!(0));
    assert_eq!(f.target_of("UL-2"), Some(AllocationTarget::OutboundOrder(order)));
}

#[test]
fn non_blocking_transport_task_does_not_prevent_allocation() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    f.set_task("UL-2", "relocation");
    let (order, line) = f.order("SO-1", dec!(100));

    f.allocate(order);

    let line = f.line(order, line);
    assert_eq!(line.reserved_on_item(f.item_of("UL-2")), dec!(40));
    assert_eq!(line.shortage(), dec!(0));
}

#[test]
fn blocking_transport_task_skips_the_unit_load() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    f.set_task("UL-2", "outbound");
    let (order, line) = f.order("SO-1", dec!(100));

    let summary = f.allocate(order);

    assert_eq!(f.line(order, line).shortage(), dec!(40));
    assert_eq!(summary.short_lines, vec![line]);
    assert_eq!(f.target_of("UL-2"), None);
}

#[test]
fn excluded_unit_load_is_never_considered() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    let (order, line) = f.order("SO-1", dec!(100));

    let options = f.svc.default_options().exclude("UL-1");
    f.svc.allocate(order, &options).unwrap();

    let line = f.line(order, line);
    assert_eq!(line.reserved(), dec!(80));
    assert_eq!(line.shortage(), dec!(20));
    assert_eq!(f.target_of("UL-1"), None);
}

#[test]
fn repeated_allocation_changes_nothing() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    let (order, _) = f.order("SO-1", dec!(200));

    let first = f.allocate(order);
    assert_eq!(first.reserved, dec!(140));
    let after_first = f.svc.order(order).unwrap();
    let ul_after_first = f.svc.unit_load("UL-1").unwrap();

    let second = f.allocate(order);
    assert_eq!(second.reservations, 0);
    assert_eq!(second.reserved, dec!(0));
    assert_eq!(f.svc.order(order).unwrap(), after_first);
    assert_eq!(f.svc.unit_load("UL-1").unwrap(), ul_after_first);
}

#[test]
fn stock_reserved_to_one_order_is_not_offered_to_another() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    let (first, _) = f.order("SO-1", dec!(100));
    let (second, second_line) = f.order("SO-2", dec!(100));

    f.allocate(first);
    let summary = f.allocate(second);

    assert_eq!(summary.reservations, 0);
    assert_eq!(f.line(second, second_line).shortage(), dec!(100));
}

#[test]
fn area_filter_and_force_include() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-4", dec!(30), "9", "B-01");

    let (order, line) = f.order("SO-1", dec!(50));
    f.svc
        .allocate(order, &f.svc.default_options().areas(["A"]))
        .unwrap();
    assert_eq!(f.line(order, line).reserved_on_item(f.item_of("UL-1")), dec!(50));
    assert_eq!(f.target_of("UL-4"), None);
    f.svc.deallocate_in_rack(order).unwrap();

    // Force-included loads come first and ignore the area filter.
    let options = f.svc.default_options().areas(["A"]).include("UL-4");
    f.svc.allocate(order, &options).unwrap();
    let line = f.line(order, line);
    assert_eq!(line.reserved_on_item(f.item_of("UL-4")), dec!(30));
    assert_eq!(line.reserved_on_item(f.item_of("UL-1")), dec!(20));
}

#[test]
fn exclusion_wins_over_inclusion() {
    let f = fixture();
    f.receive("UL-4", dec!(30), "9", "B-01");
    let (order, line) = f.order("SO-1", dec!(10));

    let options = f.svc.default_options().include("UL-4").exclude("UL-4");
    f.svc.allocate(order, &options).unwrap();

    assert_eq!(f.line(order, line).shortage(), dec!(10));
}

#[test]
fn unknown_force_include_code_is_rejected() {
    let f = fixture();
    let (order, _) = f.order("SO-1", dec!(10));

    let options = f.svc.default_options().include("NOPE");
    let err = domain_err(f.svc.allocate(order, &options));
    assert!(matches!(err, DomainError::NotFound(_)));
}

#[test]
fn offline_laneways_are_skipped_unless_disabled_or_forced() {
    let f = fixture();
    f.receive("UL-5", dec!(10), "1", "X-01");
    f.svc
        .store()
        .transaction(|tx| {
            let mut laneway = tx.laneway(f.remote_laneway)?;
            laneway.set_offline(true);
            tx.save_laneway(laneway)
        })
        .unwrap();
    let (order, line) = f.order("SO-1", dec!(10));

    f.allocate(order);
    assert_eq!(f.line(order, line).shortage(), dec!(10));

    let forced = f.svc.default_options().include("UL-5");
    f.svc.allocate(order, &forced).unwrap();
    assert_eq!(f.line(order, line).shortage(), dec!(0));
    f.svc.deallocate_in_rack(order).unwrap();

    let relaxed = f.svc.default_options().skip_offline_laneways(false);
    f.svc.allocate(order, &relaxed).unwrap();
    assert_eq!(f.line(order, line).shortage(), dec!(0));
}

#[test]
fn counting_errors_and_op_hints_block_allocation() {
    let f = fixture();
    f.receive("UL-1", dec!(10), "1", "R-01");
    f.receive("UL-2", dec!(10), "2", "R-02");
    f.svc
        .store()
        .transaction(|tx| {
            let mut counted = tx.unit_load_by_code("UL-1")?;
            counted.set_counting_error(true);
            tx.save_unit_load(&mut counted)?;
            let mut hinted = tx.unit_load_by_code("UL-2")?;
            hinted.set_op_hint(Some("inspect".into()));
            tx.save_unit_load(&mut hinted)
        })
        .unwrap();
    let (order, line) = f.order("SO-1", dec!(5));

    let summary = f.allocate(order);

    assert_eq!(summary.reservations, 0);
    assert_eq!(f.line(order, line).shortage(), dec!(5));
}

#[test]
fn blocked_far_slot_sorts_after_accessible_stock() {
    let f = fixture();
    // Far slot has the lowest orientation and would come first on its own.
    f.receive("UL-F", dec!(10), "1", "R-06");
    f.receive("UL-A", dec!(10), "1", "R-01");

    let (open, open_line) = f.order("SO-1", dec!(10));
    f.allocate(open);
    assert_eq!(f.line(open, open_line).reserved_on_item(f.item_of("UL-F")), dec!(10));
    f.svc.deallocate_in_rack(open).unwrap();

    f.receive_stock("UL-N", StockIdentity::new("OTHER", "B", "OK", "EA"), dec!(1), "0", "R-05");
    let shape = f
        .svc
        .store()
        .transaction(|tx| {
            let far = tx.location_by_code("R-06")?;
            let cell = far.cell_id().expect("R-06 is in a cell");
            Ok(tx.cell(cell)?.shape())
        })
        .unwrap();
    assert_eq!(shape, CellShape::Full);

    f.allocate(open);
    let line = f.line(open, open_line);
    assert_eq!(line.reserved_on_item(f.item_of("UL-A")), dec!(10));
    assert_eq!(line.reserved_on_item(f.item_of("UL-F")), dec!(0));
}

#[test]
fn small_pages_still_reach_every_candidate() {
    let f = fixture();
    for (i, code) in RACKS[..4].iter().enumerate() {
        f.receive(&format!("UL-{i}"), dec!(5), &i.to_string(), code);
    }
    let (order, line) = f.order("SO-1", dec!(18));

    let summary = f
        .svc
        .allocate(order, &f.svc.default_options().chunk_size(1))
        .unwrap();

    assert_eq!(summary.reservations, 4);
    assert!(summary.pages_fetched >= 4);
    assert_eq!(f.line(order, line).shortage(), dec!(0));
}

#[test]
fn satisfied_line_fetches_no_further_pages() {
    let f = fixture();
    for (i, code) in RACKS[..3].iter().enumerate() {
        f.receive(&format!("UL-{i}"), dec!(5), &i.to_string(), code);
    }
    let (order, line) = f.order("SO-1", dec!(5));

    let summary = f
        .svc
        .allocate(order, &f.svc.default_options().chunk_size(1))
        .unwrap();

    assert_eq!(summary.reservations, 1);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(f.line(order, line).shortage(), dec!(0));
}

#[test]
fn concurrent_allocations_never_over_reserve() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    let orders: Vec<_> = (0..4)
        .map(|i| f.order(&format!("SO-{i}"), dec!(50)).0)
        .collect();
    let options = f.svc.default_options();

    std::thread::scope(|s| {
        for order in &orders {
            let svc = &f.svc;
            let options = &options;
            s.spawn(move || svc.allocate(*order, options).unwrap());
        }
    });

    for code in ["UL-1", "UL-2"] {
        let ul = f.svc.unit_load(code).unwrap();
        let item = ul.items()[0].id_typed();
        let reserved: Decimal = orders
            .iter()
            .map(|o| f.svc.order(*o).unwrap().reserved_on_item(item))
            .sum();
        assert!(reserved <= ul.items()[0].quantity());
    }
}

// ---- deallocation ----

#[test]
fn deallocation_restores_the_pre_allocation_state() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    f.receive("UL-2", dec!(80), "2", "R-02");
    let (order, line) = f.order("SO-1", dec!(100));

    f.allocate(order);
    let released = f.svc.deallocate_in_rack(order).unwrap();

    assert_eq!(released, 2);
    let line = f.line(order, line);
    assert!(line.allocations().is_empty());
    assert_eq!(line.shortage(), line.required());
    assert_eq!(f.target_of("UL-1"), None);
    assert_eq!(f.target_of("UL-2"), None);
}

#[test]
fn in_rack_release_skips_loads_outside_storage_or_on_the_move() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "1", "R-01");
    let ul2 = f.receive("UL-2", dec!(80), "2", "R-02");
    f.receive("UL-3", dec!(10), "3", "R-03");
    f.set_task("UL-3", "relocation");
    let (order, _) = f.order("SO-1", dec!(150));
    f.allocate(order);
    f.svc.relocate_unit_load("UL-2", "ST-1").unwrap();

    assert_eq!(f.svc.deallocate_in_rack(order).unwrap(), 1);
    assert_eq!(f.target_of("UL-1"), None);
    assert_eq!(f.target_of("UL-2"), Some(AllocationTarget::OutboundOrder(order)));
    assert_eq!(f.target_of("UL-3"), Some(AllocationTarget::OutboundOrder(order)));

    let records = f.svc.deallocate(order, ul2).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].quantity, dec!(80));
    assert_eq!(f.target_of("UL-2"), None);
}

#[test]
fn deallocating_a_load_of_another_order_is_rejected() {
    let f = fixture();
    let ul = f.receive("UL-1", dec!(60), "1", "R-01");
    let (mine, _) = f.order("SO-1", dec!(10));
    let (other, _) = f.order("SO-2", dec!(10));
    f.allocate(mine);

    let err = domain_err(f.svc.deallocate(other, ul));
    assert!(matches!(err, DomainError::Precondition(_)));
    assert_eq!(f.target_of("UL-1"), Some(AllocationTarget::OutboundOrder(mine)));
}

// ---- picking ----

/// UL-3 with `qty` reserved against a fresh order and moved to the station.
fn staged(
    f: &Fixture,
    qty: Decimal,
    demand: Decimal,
) -> (OutboundOrderId, DemandLineId, AllocationId) {
    let ul = f.receive("UL-3", qty, "1", "R-03");
    let (order, line) = f.order("SO-P", demand);
    f.allocate(order);
    let allocation = f
        .line(order, line)
        .allocations()
        .iter()
        .find(|a| a.unit_load_id == ul)
        .map(|a| a.id)
        .expect("reservation on UL-3");
    f.svc.relocate_unit_load("UL-3", "ST-1").unwrap();
    (order, line, allocation)
}

#[test]
fn full_pick_removes_the_unit_load() {
    let f = fixture();
    let (order, line, allocation) = staged(&f, dec!(60), dec!(60));
    assert_eq!(f.svc.location("ST-1").unwrap().unitload_count(), 1);
    assert_eq!(f.svc.location("R-03").unwrap().unitload_count(), 0);

    let entries = f
        .svc
        .pick("UL-3", &[PickRequest::new(allocation, dec!(60))], "pick")
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction(), MovementDirection::Outbound);
    assert_eq!(entries[0].quantity(), dec!(60));
    assert_eq!(entries[0].balance(), dec!(0));
    assert_eq!(entries[0].metadata().unit_load_code.as_deref(), Some("UL-3"));
    assert_eq!(entries[0].metadata().document_code.as_deref(), Some("SO-P"));

    assert!(matches!(domain_err(f.svc.unit_load("UL-3")), DomainError::NotFound(_)));
    let line = f.line(order, line);
    assert_eq!(line.delivered(), dec!(60));
    assert!(line.allocations().is_empty());
    assert_eq!(line.shortage(), dec!(0));
    assert!(!f.svc.order(order).unwrap().has_reservations());
    assert_eq!(f.svc.location("ST-1").unwrap().unitload_count(), 0);
    assert_eq!(f.svc.ledger_audit(&stock()).unwrap(), dec!(0));
}

#[test]
fn partial_pick_keeps_the_remainder_unreserved() {
    let f = fixture();
    let (order, line, allocation) = staged(&f, dec!(80), dec!(50));

    f.svc
        .pick("UL-3", &[PickRequest::new(allocation, dec!(30))], "pick")
        .unwrap();

    let ul = f.svc.unit_load("UL-3").unwrap();
    assert_eq!(ul.items()[0].quantity(), dec!(50));
    assert_eq!(ul.allocation_target(), None);
    let line = f.line(order, line);
    assert_eq!(line.delivered(), dec!(30));
    assert_eq!(line.shortage(), dec!(20));
    assert_eq!(f.svc.stock_balance(&stock()).unwrap(), dec!(50));
}

#[test]
fn zero_pick_only_releases() {
    let f = fixture();
    let (order, line, allocation) = staged(&f, dec!(60), dec!(60));
    let version = f.svc.order(order).unwrap().version();

    let entries = f
        .svc
        .pick("UL-3", &[PickRequest::new(allocation, dec!(0))], "pick")
        .unwrap();

    assert!(entries.is_empty());
    assert_eq!(f.target_of("UL-3"), None);
    assert_eq!(f.line(order, line).delivered(), dec!(0));
    assert!(f.svc.order(order).unwrap().version() > version);
    assert_eq!(f.svc.store().flow_count().unwrap(), 1);
}

#[test]
fn pick_preconditions_are_checked_before_any_change() {
    let f = fixture();
    f.receive("UL-1", dec!(10), "1", "R-01");
    let (order, line, allocation) = staged(&f, dec!(60), dec!(70));
    let other_allocation = f
        .line(order, line)
        .allocations()
        .iter()
        .find(|a| a.id != allocation)
        .map(|a| a.id)
        .expect("second reservation on UL-1");
    let before = f.svc.order(order).unwrap();

    let pick_one = |code: &str, allocation: AllocationId, qty: Decimal| {
        domain_err(f.svc.pick(code, &[PickRequest::new(allocation, qty)], "pick"))
    };

    let too_much = pick_one("UL-3", allocation, dec!(61));
    assert!(matches!(too_much, DomainError::Precondition(_)));

    let negative = pick_one("UL-3", allocation, dec!(-1));
    assert!(matches!(negative, DomainError::Precondition(_)));

    let wrong_load = pick_one("UL-3", other_allocation, dec!(1));
    assert!(matches!(wrong_load, DomainError::Precondition(_)));

    let in_rack = pick_one("UL-1", other_allocation, dec!(1));
    assert!(matches!(in_rack, DomainError::Precondition(_)));

    assert_eq!(f.svc.order(order).unwrap(), before);
    assert_eq!(f.target_of("UL-3"), Some(AllocationTarget::OutboundOrder(order)));
}

#[test]
fn failed_pick_rolls_back_the_release() {
    let f = fixture();
    let (order, _, allocation) = staged(&f, dec!(60), dec!(60));
    f.svc
        .store()
        .transaction(|tx| {
            let mut ul = tx.unit_load_by_code("UL-3")?;
            let item = ul.items()[0].id_typed();
            ul.decrease_item(item, dec!(50))?;
            tx.save_unit_load(&mut ul)
        })
        .unwrap();
    let before = f.svc.order(order).unwrap();

    let err = f
        .svc
        .pick("UL-3", &[PickRequest::new(allocation, dec!(60))], "pick")
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(f.svc.order(order).unwrap(), before);
    assert_eq!(f.target_of("UL-3"), Some(AllocationTarget::OutboundOrder(order)));
    assert_eq!(f.svc.unit_load("UL-3").unwrap().items()[0].quantity(), dec!(10));
    assert_eq!(f.svc.store().flow_count().unwrap(), 1);
}

#[test]
fn stale_order_edit_after_pick_conflicts() {
    let f = fixture();
    let (order, _, allocation) = staged(&f, dec!(60), dec!(60));
    let stale = f.svc.order(order).unwrap();

    f.svc
        .pick("UL-3", &[PickRequest::new(allocation, dec!(60))], "pick")
        .unwrap();

    let err = domain_err(f.svc.add_demand_line(
        order,
        ExpectedVersion::of(&stale),
        NewDemandLine::new("M", dec!(5)),
    ));
    assert!(matches!(err, DomainError::Conflict(_)));

    let fresh = f.svc.order(order).unwrap();
    f.svc
        .add_demand_line(order, ExpectedVersion::of(&fresh), NewDemandLine::new("M", dec!(5)))
        .unwrap();
}

// ---- ledger ----

#[test]
fn ledger_replays_to_the_balance() {
    let f = fixture();
    f.receive("UL-1", dec!(60), "9", "R-01");
    let (_, _, allocation) = staged(&f, dec!(80), dec!(30));
    f.svc
        .pick("UL-3", &[PickRequest::new(allocation, dec!(30))], "pick")
        .unwrap();

    let flows = f.svc.flows(&stock()).unwrap();
    let balances: Vec<_> = flows.iter().map(|e| e.balance()).collect();
    assert_eq!(balances, vec![dec!(60), dec!(140), dec!(110)]);
    assert_eq!(f.svc.ledger_audit(&stock()).unwrap(), dec!(110));
    assert_eq!(f.svc.stock_balance(&stock()).unwrap(), dec!(110));
}

// ---- capacity ----

#[test]
fn rebuilt_laneway_counts_match_incremental_ones() {
    let f = fixture();
    let laneway = LanewayId::new();
    f.svc
        .store()
        .transaction(|tx| {
            tx.save_laneway(Laneway::new(laneway, "L3"))?;
            for i in 1..=5 {
                rack(tx, LocationId::new(), &format!("E-0{i}"), "E", laneway, None, DEPTH_NEAR, i)?;
            }
            Ok(())
        })
        .unwrap();
    f.svc.rebuild_laneway_stat(laneway).unwrap();

    f.receive("UL-1", dec!(10), "1", "E-01");
    f.receive("UL-2", dec!(10), "1", "E-02");
    f.svc.set_inbound_disabled("E-03", true).unwrap();

    let incremental = f.svc.laneway(laneway).unwrap();
    assert_eq!(incremental.usage().get(&profile()).unwrap().counts(), (5, 2, 2, 1));

    let rebuilt = f.svc.rebuild_laneway_stat(laneway).unwrap();
    assert_eq!(rebuilt.usage().get(&profile()).unwrap().counts(), (5, 2, 2, 1));
}

#[test]
fn location_changes_are_announced() {
    let f = fixture();
    let sub = f.bus.subscribe();

    f.svc.set_inbound_disabled("R-01", true).unwrap();
    let note = sub.try_recv().unwrap();
    assert_eq!(note.event_type(), LOCATION_CHANGED);
    assert_eq!(note.payload()["location_code"], "R-01");
    assert_eq!(note.payload()["inbound_disabled"], true);

    assert!(f.svc.location_cache().is_loaded());

    let loc = f.svc.set_location_exists("R-02", false).unwrap();
    assert!(!loc.exists());
    assert!(f.svc.location_cache().is_loaded());
    assert_eq!(f.svc.location("R-02").unwrap().id_typed(), loc.id_typed());
    let note = sub.try_recv().unwrap();
    assert_eq!(note.payload()["exists"], false);

    let usage = f.svc.laneway(f.laneway).unwrap();
    assert_eq!(usage.usage().get(&profile()).unwrap().total, 6);
}

#[test]
fn closing_requires_released_reservations() {
    let f = fixture();
    let sub = f.bus.subscribe();
    f.receive("UL-1", dec!(60), "1", "R-01");
    let (order, _) = f.order("SO-1", dec!(10));
    f.allocate(order);

    assert!(matches!(domain_err(f.svc.close_order(order)), DomainError::Precondition(_)));

    f.svc.deallocate_in_rack(order).unwrap();
    f.svc.close_order(order).unwrap();
    let note = sub.try_recv().unwrap();
    assert_eq!(note.event_type(), ORDER_CLOSED);

    let err = domain_err(f.svc.allocate(order, &AllocationOptions::default()));
    assert!(matches!(err, DomainError::Precondition(_)));
}

#[derive(Debug, Clone)]
enum CapacityOp {
    Move(usize, usize),
    Inbound(usize, bool),
    Exists(usize, bool),
}

fn capacity_op() -> impl Strategy<Value = CapacityOp> {
    prop_oneof![
        (0..3usize, 0..RACKS.len()).prop_map(|(ul, loc)| CapacityOp::Move(ul, loc)),
        (0..RACKS.len(), any::<bool>()).prop_map(|(loc, flag)| CapacityOp::Inbound(loc, flag)),
        (0..RACKS.len(), any::<bool>()).prop_map(|(loc, flag)| CapacityOp::Exists(loc, flag)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        ..ProptestConfig::default()
    })]

    #[test]
    fn usage_stays_in_step_with_a_rebuild(ops in prop::collection::vec(capacity_op(), 1..40)) {
        let f = fixture();
        for i in 0..3 {
            let received = vec![ReceivedStock::new(stock(), dec!(1), "1")];
            f.svc.register_unit_load(&format!("P-{i}"), received, None).unwrap();
        }

        for op in ops {
            // Rejected moves (e.g. into a non-existent location) roll back.
            let _ = match op {
                CapacityOp::Move(ul, loc) => {
                    f.svc.relocate_unit_load(&format!("P-{ul}"), RACKS[loc])
                }
                CapacityOp::Inbound(loc, flag) => {
                    f.svc.set_inbound_disabled(RACKS[loc], flag).map(|_| ())
                }
                CapacityOp::Exists(loc, flag) => {
                    f.svc.set_location_exists(RACKS[loc], flag).map(|_| ())
                }
            };
        }

        let incremental = f.svc.laneway(f.laneway).unwrap().usage().normalized();
        let rebuilt = f.svc.rebuild_laneway_stat(f.laneway).unwrap().usage().normalized();
        prop_assert_eq!(incremental, rebuilt);

        let (shape, near, far) = f.svc.store().transaction(|tx| {
            let near = tx.location_by_code("R-05")?;
            let far = tx.location_by_code("R-06")?;
            let cell = tx.cell(near.cell_id().expect("R-05 is in a cell"))?;
            Ok((cell.shape(), near.is_loaded(), far.is_loaded()))
        }).unwrap();
        prop_assert_eq!(shape, CellShape::from_occupancy(near, far));
    }

    #[test]
    fn reservations_never_exceed_stock(
        stock_qty in prop::collection::vec(1u32..100, 1..4),
        demands in prop::collection::vec(1u32..150, 1..4),
    ) {
        let f = fixture();
        for (i, q) in stock_qty.iter().enumerate() {
            f.receive(&format!("UL-{i}"), Decimal::from(*q), &i.to_string(), RACKS[i]);
        }
        let orders: Vec<_> = demands
            .iter()
            .enumerate()
            .map(|(i, q)| f.order(&format!("SO-{i}"), Decimal::from(*q)))
            .collect();
        for (order, _) in &orders {
            f.allocate(*order);
        }

        for (i, q) in stock_qty.iter().enumerate() {
            let item = f.item_of(&format!("UL-{i}"));
            let reserved: Decimal = orders
                .iter()
                .map(|(o, _)| f.svc.order(*o).unwrap().reserved_on_item(item))
                .sum();
            prop_assert!(reserved <= Decimal::from(*q));
        }
        for (order, line) in &orders {
            prop_assert!(f.line(*order, *line).raw_shortage() >= Decimal::ZERO);
        }
    }
}
