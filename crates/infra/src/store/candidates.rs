//! Candidate streaming for allocation.
//!
//! The candidate set is every in-stock item matching a demand line's stock
//! filter, warehouse-wide. It is pulled in bounded pages with keyset
//! pagination on [`CandidateKey`], so an allocation pass that is satisfied
//! early never touches the remaining pages.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use rackwms_core::{InventoryItemId, UnitLoadId};
use rackwms_inventory::{InventoryItem, Location, UnitLoad};
use rackwms_outbound::DemandLine;

use super::WarehouseTx;
use crate::error::WmsResult;

/// Total order of the candidate stream.
///
/// Field order is the tiebreak chain: out-ordering (FIFO/FEFO) first, then
/// retrieval rank of the slot (accessible before blocked double-deep far
/// slots), then orientation, then rack depth, then item id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateKey {
    pub out_ordering: String,
    pub shape_rank: i32,
    pub orientation_order: i32,
    pub depth: u8,
    pub item_id: InventoryItemId,
}

/// Store-side filter of the candidate stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateQuery {
    pub material: String,
    pub batch: Option<String>,
    pub stock_status: Option<String>,
    pub uom: Option<String>,
    /// Unit load codes that must never be returned.
    pub exclude_codes: BTreeSet<String>,
    /// Unit loads omitted from the page stream (evaluated separately).
    pub skip_unit_loads: BTreeSet<UnitLoadId>,
}

impl CandidateQuery {
    pub fn for_line(line: &DemandLine) -> Self {
        Self {
            material: line.material().to_string(),
            batch: line.batch().map(String::from),
            stock_status: line.stock_status().map(String::from),
            uom: line.uom().map(String::from),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, codes: &BTreeSet<String>) -> Self {
        self.exclude_codes = codes.clone();
        self
    }

    pub fn skipping(mut self, unit_loads: impl IntoIterator<Item = UnitLoadId>) -> Self {
        self.skip_unit_loads = unit_loads.into_iter().collect();
        self
    }

    /// Stock filter + code exclusion; the engine applies the full matching
    /// rules on top.
    pub fn selects(&self, item: &InventoryItem, unit_load: &UnitLoad) -> bool {
        let stock = item.stock();
        stock.material == self.material
            && self.batch.as_deref().is_none_or(|b| b == stock.batch)
            && self.stock_status.as_deref().is_none_or(|s| s == stock.stock_status)
            && self.uom.as_deref().is_none_or(|u| u == stock.uom)
            && !self.exclude_codes.contains(unit_load.code())
    }
}

/// One item offered to the allocation engine, with the context the
/// matching rules need. Snapshots may be stale by the time the engine
/// reserves; the engine reloads before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: CandidateKey,
    pub item: InventoryItem,
    pub unit_load: UnitLoad,
    pub location: Location,
    pub laneway_offline: bool,
    /// Came from the force-include list.
    pub forced: bool,
}

/// Lazy, restartable cursor over the candidates of one query.
///
/// Force-included unit loads are yielded first, then the ordered page
/// stream (which skips them).
#[derive(Debug, Clone)]
pub struct CandidateCursor {
    query: CandidateQuery,
    forced: Vec<UnitLoadId>,
    page_size: usize,
    buffer: VecDeque<Candidate>,
    after: Option<CandidateKey>,
    forced_loaded: bool,
    exhausted: bool,
    pages_fetched: usize,
}

impl CandidateCursor {
    pub fn new(query: CandidateQuery, forced: Vec<UnitLoadId>, page_size: usize) -> Self {
        let query = query.skipping(forced.iter().copied());
        Self {
            query,
            forced,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            after: None,
            forced_loaded: false,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Next candidate, fetching a new page when the buffer runs dry.
    pub fn next_candidate(&mut self, tx: &dyn WarehouseTx) -> WmsResult<Option<Candidate>> {
        if !self.forced_loaded {
            self.forced_loaded = true;
            if !self.forced.is_empty() {
                let mut forced = tx.candidates_on(&self.query, &self.forced)?;
                for c in &mut forced {
                    c.forced = true;
                }
                self.buffer.extend(forced);
            }
        }

        loop {
            if let Some(c) = self.buffer.pop_front() {
                return Ok(Some(c));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = tx.candidate_page(&self.query, self.after.as_ref(), self.page_size)?;
            self.pages_fetched += 1;
            if page.len() < self.page_size {
                self.exhausted = true;
            }
            if let Some(last) = page.last() {
                self.after = Some(last.key.clone());
            }
            self.buffer.extend(page);
        }
    }

    /// Start over from the first candidate. The page counter restarts too.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.after = None;
        self.forced_loaded = false;
        self.exhausted = false;
        self.pages_fetched = 0;
    }

    /// Number of store round-trips for pages since creation or the last
    /// [`reset`](Self::reset).
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}
