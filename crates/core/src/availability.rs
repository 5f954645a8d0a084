use tracing::{debug, warn};
use types::{AvailabilityWindow, Hhmm, Slot};

use crate::grid::WeeklyGrid;
use crate::time::{add_blocks, day_index, parse_time};

/// Every run of `required_blocks` consecutive grid blocks inside `window`
/// that is empty on the grid and accepted by `is_free(day, start, blocks)`.
///
/// Unusable windows (inactive, unknown day, unreadable or inverted times)
/// yield nothing.
pub fn find_candidate_slots<F>(
    window: &AvailabilityWindow,
    required_blocks: u32,
    grid: &WeeklyGrid,
    is_free: F,
) -> Vec<Slot>
where
    F: Fn(usize, Hhmm, u32) -> bool,
{
    if !window.active {
        debug!(day = %window.day_of_week, "inactive availability window skipped");
        return Vec::new();
    }
    let Some(day) = day_index(&window.day_of_week) else {
        warn!(day = %window.day_of_week, "availability window on unknown day skipped");
        return Vec::new();
    };
    let bounds = window
        .start_time
        .as_deref()
        .and_then(parse_time)
        .zip(window.end_time.as_deref().and_then(parse_time));
    let Some((from, to)) = bounds else {
        warn!(
            day = %window.day_of_week,
            start = ?window.start_time,
            end = ?window.end_time,
            "availability window with unreadable times skipped"
        );
        return Vec::new();
    };
    if from >= to {
        warn!(day = %window.day_of_week, %from, %to, "availability window is empty or inverted");
        return Vec::new();
    }
    if required_blocks == 0 {
        return Vec::new();
    }

    let candidates = grid.blocks().fitting(from, to);
    let n = required_blocks as usize;
    if candidates.len() < n {
        return Vec::new();
    }

    candidates
        .windows(n)
        .filter(|run| is_consecutive(run))
        .filter(|run| run.iter().all(|&b| grid.is_free(day, b)))
        .filter(|run| is_free(day, run[0], required_blocks))
        .map(|run| Slot {
            day_index: day,
            start_block: run[0],
            end_block: run[n - 1],
            blocks: run.to_vec(),
            required_blocks,
        })
        .collect()
}

// A narrowed table can skip blocks; a run must not jump over a gap.
fn is_consecutive(run: &[Hhmm]) -> bool {
    run.windows(2).all(|p| p[0] < p[1] && add_blocks(p[0], 1) == p[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::BlockTable;
    use proptest::prelude::*;
    use types::{CellState, ClassPlacement, Turno};

    fn window(day: &str, start: &str, end: &str) -> AvailabilityWindow {
        AvailabilityWindow {
            day_of_week: day.into(),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            active: true,
        }
    }

    fn starts(slots: &[Slot]) -> Vec<Hhmm> {
        slots.iter().map(|s| s.start_block).collect()
    }

    fn always(_: usize, _: Hhmm, _: u32) -> bool {
        true
    }

    #[test]
    fn slides_over_a_morning_window() {
        let grid = WeeklyGrid::empty(BlockTable::standard());
        let slots = find_candidate_slots(&window("lunes", "07:00", "10:00"), 2, &grid, always);
        assert_eq!(starts(&slots), vec![Hhmm(700), Hhmm(745), Hhmm(830)]);
        let last = &slots[2];
        assert_eq!(last.day_index, 0);
        assert_eq!(last.end_block, Hhmm(915));
        assert_eq!(last.blocks, vec![Hhmm(830), Hhmm(915)]);
        assert_eq!(last.required_blocks, 2);
    }

    #[test]
    fn rejects_unusable_windows() {
        let grid = WeeklyGrid::empty(BlockTable::standard());
        let mut inactive = window("lunes", "07:00", "10:00");
        inactive.active = false;
        let mut missing = window("lunes", "07:00", "10:00");
        missing.end_time = None;
        for w in [
            inactive,
            missing,
            window("domingo", "07:00", "10:00"),
            window("lunes", "aa:00", "10:00"),
            window("lunes", "10:00", "10:00"),
            window("lunes", "10:00", "07:00"),
        ] {
            assert!(find_candidate_slots(&w, 1, &grid, always).is_empty(), "{w:?}");
        }
    }

    #[test]
    fn window_too_short_yields_nothing() {
        let grid = WeeklyGrid::empty(BlockTable::standard());
        assert!(find_candidate_slots(&window("martes", "07:00", "08:30"), 3, &grid, always).is_empty());
        assert!(find_candidate_slots(&window("martes", "07:00", "08:30"), 0, &grid, always).is_empty());
    }

    #[test]
    fn occupied_cells_block_runs() {
        let placement = ClassPlacement {
            id: "busy".into(),
            professor_id: "other".into(),
            classroom_id: "r".into(),
            curricular_unit_id: "u".into(),
            day_index: 0,
            start_time: Hhmm(745),
            end_time: Hhmm(830),
            required_blocks: 1,
            is_new: false,
            is_moved: false,
            conflicts: None,
        };
        let grid = WeeklyGrid::empty(BlockTable::standard()).with_cell(
            0,
            Hhmm(745),
            Some(CellState { class_data: placement, block_index: 0, block_span: 1 }),
        );
        let slots = find_candidate_slots(&window("lunes", "07:00", "10:00"), 2, &grid, always);
        assert_eq!(starts(&slots), vec![Hhmm(830)]);
    }

    #[test]
    fn predicate_sees_the_whole_run() {
        let grid = WeeklyGrid::empty(BlockTable::standard());
        let slots = find_candidate_slots(&window("lunes", "07:00", "10:00"), 2, &grid, |day, start, n| {
            assert_eq!((day, n), (0, 2));
            start != Hhmm(745)
        });
        assert_eq!(starts(&slots), vec![Hhmm(700), Hhmm(830)]);
    }

    #[test]
    fn runs_never_cross_a_gap_in_the_table() {
        let full = BlockTable::standard();
        let mut starts_list = full.narrow(Turno::Manana).starts().to_vec();
        starts_list.extend_from_slice(full.narrow(Turno::Noche).starts());
        let grid = WeeklyGrid::empty(BlockTable::from_starts(starts_list));
        let slots = find_candidate_slots(&window("lunes", "11:30", "20:30"), 2, &grid, always);
        assert_eq!(starts(&slots), vec![Hhmm(1130), Hhmm(1815), Hhmm(1900)]);
    }

    proptest! {
        #[test]
        fn slot_blocks_are_strictly_consecutive(
            from in 0usize..18,
            len in 1usize..18,
            required in 1u32..6,
        ) {
            let table = BlockTable::standard();
            let starts = table.starts();
            let to_idx = (from + len).min(starts.len());
            let from_t = starts[from];
            let to_t = add_blocks(starts[to_idx - 1], 1);
            let grid = WeeklyGrid::empty(table.clone());
            let w = window("viernes", &from_t.to_string(), &to_t.to_string());
            for slot in find_candidate_slots(&w, required, &grid, always) {
                prop_assert_eq!(slot.blocks.len(), required as usize);
                prop_assert!(slot.blocks.windows(2).all(|p| p[0] < p[1]));
                prop_assert_eq!(slot.blocks[0], slot.start_block);
                prop_assert_eq!(*slot.blocks.last().unwrap(), slot.end_block);
            }
        }
    }
}
