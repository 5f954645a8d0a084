use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};
use types::{CellState, ClassPlacement, Hhmm, PlacementId, RawDay, Slot, Turno};

use crate::time::{add_blocks, blocks_between, day_index, parse_time, BlockTable};

pub const DAYS: usize = 6;

/// One weekday: block start -> occupant, `None` when free.
pub type DayColumn = BTreeMap<Hhmm, Option<CellState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunLocation {
    pub day: usize,
    pub start: Hhmm,
}

/// Copy-on-write week grid. Cloning is three refcount bumps; writes only
/// copy the touched day, so earlier snapshots stay valid for undo.
#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyGrid {
    blocks: Arc<BlockTable>,
    days: Arc<[Arc<DayColumn>; DAYS]>,
    index: Arc<HashMap<PlacementId, RunLocation>>,
}

impl WeeklyGrid {
    pub fn empty(blocks: BlockTable) -> Self {
        let column: Arc<DayColumn> = Arc::new(blocks.starts().iter().map(|&b| (b, None)).collect());
        Self {
            blocks: Arc::new(blocks),
            days: Arc::new(std::array::from_fn(|_| column.clone())),
            index: Default::default(),
        }
    }

    pub fn blocks(&self) -> &BlockTable {
        &self.blocks
    }

    pub fn day(&self, day: usize) -> Option<&DayColumn> {
        self.days.get(day).map(|c| c.as_ref())
    }

    pub fn cell(&self, day: usize, at: Hhmm) -> Option<&CellState> {
        self.day(day)?.get(&at)?.as_ref()
    }

    /// True only for a known, unoccupied cell.
    pub fn is_free(&self, day: usize, at: Hhmm) -> bool {
        matches!(self.day(day).and_then(|c| c.get(&at)), Some(None))
    }

    pub fn with_cell(&self, day: usize, at: Hhmm, cell: Option<CellState>) -> WeeklyGrid {
        let mut next = self.clone();
        next.put(day, at, cell);
        next
    }

    pub(crate) fn put(&mut self, day: usize, at: Hhmm, cell: Option<CellState>) -> bool {
        if !self.day(day).is_some_and(|c| c.contains_key(&at)) {
            warn!(day, %at, "write outside the grid ignored");
            return false;
        }
        let new_head = cell
            .as_ref()
            .filter(|c| c.is_head())
            .map(|c| c.class_data.id.clone());

        let days = Arc::make_mut(&mut self.days);
        let column = Arc::make_mut(&mut days[day]);
        let Some(slot) = column.get_mut(&at) else {
            return false;
        };
        let old = std::mem::replace(slot, cell);

        let loc = RunLocation { day, start: at };
        let index = Arc::make_mut(&mut self.index);
        if let Some(old) = old.filter(|c| c.is_head()) {
            if index.get(&old.class_data.id) == Some(&loc) {
                index.remove(&old.class_data.id);
            }
        }
        if let Some(id) = new_head {
            index.insert(id, loc);
        }
        true
    }

    pub fn locate(&self, id: &PlacementId) -> Option<RunLocation> {
        self.index.get(id).copied()
    }

    pub fn placement(&self, id: &PlacementId) -> Option<&ClassPlacement> {
        let loc = self.locate(id)?;
        self.cell(loc.day, loc.start).map(|c| &c.class_data)
    }

    /// Block starts covered by a placement's run, in order.
    pub fn run_blocks(&self, id: &PlacementId) -> Option<(RunLocation, Vec<Hhmm>)> {
        let loc = self.locate(id)?;
        let head = self.cell(loc.day, loc.start)?;
        let blocks = (0..head.block_span)
            .map(|k| add_blocks(loc.start, k as i32))
            .collect();
        Some((loc, blocks))
    }

    pub fn slot_of(&self, id: &PlacementId) -> Option<Slot> {
        let (loc, blocks) = self.run_blocks(id)?;
        Some(Slot {
            day_index: loc.day,
            start_block: loc.start,
            end_block: *blocks.last()?,
            required_blocks: blocks.len() as u32,
            blocks,
        })
    }

    /// Head cells of every run, ordered by day then start.
    pub fn heads(&self) -> impl Iterator<Item = (usize, Hhmm, &CellState)> {
        self.days.iter().enumerate().flat_map(|(d, col)| {
            col.iter()
                .filter_map(move |(&at, cell)| cell.as_ref().filter(|c| c.is_head()).map(|c| (d, at, c)))
        })
    }

    pub fn placement_count(&self) -> usize {
        self.index.len()
    }

    /// Builds a grid from the backend's per-day payload. Unknown days and
    /// malformed or off-grid classes are skipped.
    pub fn hydrate(raw: &[RawDay], blocks: BlockTable) -> WeeklyGrid {
        let mut grid = WeeklyGrid::empty(blocks);
        for raw_day in raw {
            let Some(day) = day_index(&raw_day.day_name) else {
                warn!(day = %raw_day.day_name, "unknown day in schedule payload, skipped");
                continue;
            };
            for class in &raw_day.classes {
                let (Some(start), Some(end)) = (parse_time(&class.start_time), parse_time(&class.end_time)) else {
                    warn!(id = %class.id, start = %class.start_time, end = %class.end_time, "malformed class times, skipped");
                    continue;
                };
                let Some(span) = blocks_between(start, end) else {
                    warn!(id = %class.id, %start, %end, "class ends before it starts, skipped");
                    continue;
                };
                let run: Vec<Hhmm> = (0..span).map(|k| add_blocks(start, k as i32)).collect();
                if !run.iter().all(|&b| grid.is_free(day, b)) {
                    warn!(id = %class.id, day, %start, "class is off-grid or overlaps another, skipped");
                    continue;
                }
                let placement = ClassPlacement {
                    id: class.id.clone(),
                    professor_id: class.professor_id.clone(),
                    classroom_id: class.classroom_id.clone(),
                    curricular_unit_id: class.curricular_unit_id.clone(),
                    day_index: day,
                    start_time: start,
                    end_time: add_blocks(start, span as i32),
                    required_blocks: span,
                    is_new: false,
                    is_moved: false,
                    conflicts: None,
                };
                grid.write_run(&placement, day, &run);
            }
        }
        debug!(placements = grid.placement_count(), "grid hydrated");
        grid
    }

    pub fn hydrate_for(raw: &[RawDay], turno: Option<Turno>) -> WeeklyGrid {
        let blocks = match turno {
            Some(t) => BlockTable::standard().narrow(t),
            None => BlockTable::standard(),
        };
        Self::hydrate(raw, blocks)
    }

    pub(crate) fn write_run(&mut self, placement: &ClassPlacement, day: usize, run: &[Hhmm]) {
        let span = run.len() as u32;
        for (k, &at) in run.iter().enumerate() {
            self.put(
                day,
                at,
                Some(CellState {
                    class_data: placement.clone(),
                    block_index: k as u32,
                    block_span: span,
                }),
            );
        }
    }
}
