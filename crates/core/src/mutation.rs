use tracing::{debug, warn};
use types::{ClassPlacement, ClassRequest, PlacementId, Slot, LOCAL_ID_PREFIX};
use uuid::Uuid;

use crate::error::EngineError;
use crate::grid::WeeklyGrid;
use crate::pending::PendingDeletions;
use crate::time::add_blocks;

pub fn local_id() -> PlacementId {
    PlacementId(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()))
}

/// Clears every cell of the placement's run. A placement that is not on the
/// grid leaves it unchanged.
pub fn vacate(grid: &WeeklyGrid, id: &PlacementId) -> WeeklyGrid {
    let Some((loc, run)) = grid.run_blocks(id) else {
        debug!(%id, "placement not on grid, nothing to vacate");
        return grid.clone();
    };
    let mut next = grid.clone();
    for at in run {
        if next.cell(loc.day, at).is_some_and(|c| &c.class_data.id == id) {
            next.put(loc.day, at, None);
        }
    }
    next
}

/// Writes `placement` as one run over `slot`, stamping its day and times
/// from the slot. Every target cell must exist and be free.
pub fn occupy(grid: &WeeklyGrid, mut placement: ClassPlacement, slot: &Slot) -> Result<WeeklyGrid, EngineError> {
    let (day, start) = (slot.day_index, slot.start_block);
    let Some(&last) = slot.blocks.last() else {
        return Err(EngineError::SlotOutsideGrid { day, start });
    };
    let column = grid.day(day).ok_or(EngineError::SlotOutsideGrid { day, start })?;
    for at in &slot.blocks {
        match column.get(at) {
            None => return Err(EngineError::SlotOutsideGrid { day, start }),
            Some(Some(cell)) => {
                return Err(EngineError::CellOccupied {
                    day,
                    at: *at,
                    by: cell.class_data.id.clone(),
                })
            }
            Some(None) => {}
        }
    }

    placement.day_index = day;
    placement.start_time = start;
    placement.end_time = add_blocks(last, 1);
    placement.required_blocks = slot.blocks.len() as u32;

    let mut next = grid.clone();
    next.write_run(&placement, day, &slot.blocks);
    Ok(next)
}

/// Unplaced -> Placed. Classes without a backend id get a local one and are
/// flagged new; a persisted class placed again is flagged moved.
pub fn place(grid: &WeeklyGrid, class: &ClassRequest, slot: &Slot) -> Result<(WeeklyGrid, PlacementId), EngineError> {
    let id = class.id.clone().unwrap_or_else(local_id);
    let is_new = id.is_local();
    let placement = ClassPlacement {
        id: id.clone(),
        professor_id: class.professor_id.clone(),
        classroom_id: class.classroom_id.clone(),
        curricular_unit_id: class.curricular_unit_id.clone(),
        day_index: slot.day_index,
        start_time: slot.start_block,
        end_time: slot.end_block,
        required_blocks: slot.blocks.len() as u32,
        is_new,
        is_moved: !is_new,
        conflicts: None,
    };
    let next = occupy(grid, placement, slot)?;
    debug!(%id, day = slot.day_index, start = %slot.start_block, is_new, "class placed");
    Ok((next, id))
}

/// Placed -> Placed. New classes keep only their `is_new` flag.
pub fn move_placement(grid: &WeeklyGrid, current: &ClassPlacement, slot: &Slot) -> Result<WeeklyGrid, EngineError> {
    if grid.locate(&current.id).is_none() {
        warn!(id = %current.id, "moving a class that is not on the grid");
    }
    let vacated = vacate(grid, &current.id);
    let mut moved = current.clone();
    moved.is_moved = !moved.is_new;
    let next = occupy(&vacated, moved, slot)?;
    debug!(id = %current.id, day = slot.day_index, start = %slot.start_block, "class moved");
    Ok(next)
}

/// Placed -> Removed. Persisted placements are queued for deletion.
pub fn remove(grid: &WeeklyGrid, id: &PlacementId, pending: &mut PendingDeletions) -> WeeklyGrid {
    let Some(placement) = grid.placement(id) else {
        warn!(%id, "removing a class that is not on the grid");
        return grid.clone();
    };
    if !placement.is_new {
        pending.insert(id.clone());
    }
    vacate(grid, id)
}

/// Rewrites every cell of a run with an edited copy of its placement. The
/// edit may change the id; the index follows.
pub fn update_placement<F>(grid: &WeeklyGrid, id: &PlacementId, edit: F) -> WeeklyGrid
where
    F: FnOnce(&mut ClassPlacement),
{
    let (Some(placement), Some((loc, run))) = (grid.placement(id), grid.run_blocks(id)) else {
        warn!(%id, "cannot update a class that is not on the grid");
        return grid.clone();
    };
    let mut updated = placement.clone();
    edit(&mut updated);
    let mut next = vacate(grid, id);
    next.write_run(&updated, loc.day, &run);
    next
}
