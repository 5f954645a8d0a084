use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use types::{AvailabilityWindow, ClassRequest, ClassroomId, ProfessorId, ResourceBooking, Slot};

use crate::availability::find_candidate_slots;
use crate::conflict::is_resource_free;
use crate::grid::WeeklyGrid;
use crate::pending::PendingDeletions;

/// Everything slot search needs to know about the class's professor and
/// classroom, fetched once per pending move.
#[derive(Clone, Debug, Default)]
pub struct SearchContext {
    pub availability: Vec<AvailabilityWindow>,
    pub professor_bookings: HashMap<ProfessorId, Vec<ResourceBooking>>,
    pub classroom_bookings: HashMap<ClassroomId, Vec<ResourceBooking>>,
}

pub fn required_blocks(class: &ClassRequest) -> Option<u32> {
    match class.required_blocks {
        Some(n) if n > 0 => u32::try_from(n).ok(),
        _ => None,
    }
}

/// Legal placements for `class`: inside one of the professor's windows,
/// on free grid cells, with both professor and classroom unbooked.
pub fn compute_available_slots(
    class: &ClassRequest,
    windows: &[AvailabilityWindow],
    grid: &WeeklyGrid,
    professor_bookings: &HashMap<ProfessorId, Vec<ResourceBooking>>,
    classroom_bookings: &HashMap<ClassroomId, Vec<ResourceBooking>>,
    pending: &PendingDeletions,
) -> Vec<Slot> {
    let Some(blocks) = required_blocks(class) else {
        warn!(required = ?class.required_blocks, unit = %class.curricular_unit_id, "invalid block count, no slots");
        return Vec::new();
    };
    if windows.is_empty() {
        debug!(professor = %class.professor_id, "professor has no availability windows");
        return Vec::new();
    }

    let exclude = class.id.as_ref();
    let both_free = |day, start, n| {
        is_resource_free(&class.professor_id, day, start, n, professor_bookings, exclude, pending)
            && is_resource_free(&class.classroom_id, day, start, n, classroom_bookings, exclude, pending)
    };

    // Overlapping windows would offer the same slot twice.
    let mut seen = HashSet::new();
    let slots: Vec<Slot> = windows
        .iter()
        .flat_map(|w| find_candidate_slots(w, blocks, grid, both_free))
        .filter(|s| seen.insert((s.day_index, s.start_block)))
        .collect();
    debug!(count = slots.len(), professor = %class.professor_id, classroom = %class.classroom_id, "slots computed");
    slots
}

pub fn compute_for_context(
    class: &ClassRequest,
    ctx: &SearchContext,
    grid: &WeeklyGrid,
    pending: &PendingDeletions,
) -> Vec<Slot> {
    compute_available_slots(
        class,
        &ctx.availability,
        grid,
        &ctx.professor_bookings,
        &ctx.classroom_bookings,
        pending,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::BlockTable;
    use types::{BookedClass, Hhmm};

    fn class(blocks: Option<i64>) -> ClassRequest {
        ClassRequest {
            id: None,
            professor_id: "prof".into(),
            classroom_id: "room".into(),
            curricular_unit_id: "calculo".into(),
            required_blocks: blocks,
        }
    }

    fn monday(start: &str, end: &str) -> AvailabilityWindow {
        AvailabilityWindow {
            day_of_week: "lunes".into(),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            active: true,
        }
    }

    fn booked(id: &str, start: &str, end: &str) -> Vec<ResourceBooking> {
        vec![ResourceBooking {
            day_of_week: "lunes".into(),
            classes: vec![BookedClass {
                schedule_id: id.into(),
                start_time: start.into(),
                end_time: end.into(),
            }],
        }]
    }

    fn starts(slots: &[Slot]) -> Vec<Hhmm> {
        slots.iter().map(|s| s.start_block).collect()
    }

    fn empty() -> WeeklyGrid {
        WeeklyGrid::empty(BlockTable::standard())
    }

    #[test]
    fn free_morning_offers_three_slots() {
        let slots = compute_available_slots(
            &class(Some(2)),
            &[monday("07:00", "10:00")],
            &empty(),
            &HashMap::new(),
            &HashMap::new(),
            &PendingDeletions::new(),
        );
        assert_eq!(starts(&slots), vec![Hhmm(700), Hhmm(745), Hhmm(830)]);
    }

    #[test]
    fn professor_booking_removes_overlapping_slots() {
        let none = PendingDeletions::new();
        let prof = HashMap::from([(ProfessorId::from("prof"), booked("elsewhere", "08:00", "08:45"))]);
        let single = compute_available_slots(&class(Some(1)), &[monday("07:00", "10:00")], &empty(), &prof, &HashMap::new(), &none);
        assert_eq!(starts(&single), vec![Hhmm(700), Hhmm(915)]);

        let prof = HashMap::from([(ProfessorId::from("prof"), booked("elsewhere", "08:30", "09:15"))]);
        let double = compute_available_slots(&class(Some(2)), &[monday("07:00", "10:00")], &empty(), &prof, &HashMap::new(), &none);
        assert_eq!(starts(&double), vec![Hhmm(700)]);
    }

    #[test]
    fn every_two_block_run_spans_an_early_booking() {
        // 07:00-08:30, 07:45-09:15 and 08:30-10:00 all overlap 08:00-08:45.
        let prof = HashMap::from([(ProfessorId::from("prof"), booked("elsewhere", "08:00", "08:45"))]);
        let slots = compute_available_slots(
            &class(Some(2)),
            &[monday("07:00", "10:00")],
            &empty(),
            &prof,
            &HashMap::new(),
            &PendingDeletions::new(),
        );
        assert!(slots.is_empty(), "{:?}", starts(&slots));
    }

    #[test]
    fn classroom_booking_is_checked_too() {
        let room = HashMap::from([(ClassroomId::from("room"), booked("other", "07:00", "07:45"))]);
        let slots = compute_available_slots(
            &class(Some(2)),
            &[monday("07:00", "10:00")],
            &empty(),
            &HashMap::new(),
            &room,
            &PendingDeletions::new(),
        );
        assert_eq!(starts(&slots), vec![Hhmm(745), Hhmm(830)]);
    }

    #[test]
    fn moving_class_does_not_collide_with_itself() {
        let prof = HashMap::from([(ProfessorId::from("prof"), booked("me", "07:00", "08:30"))]);
        let mut moving = class(Some(2));
        let none = PendingDeletions::new();
        let stuck = compute_available_slots(&moving, &[monday("07:00", "10:00")], &empty(), &prof, &HashMap::new(), &none);
        assert_eq!(starts(&stuck), vec![Hhmm(830)]);

        moving.id = Some("me".into());
        let free = compute_available_slots(&moving, &[monday("07:00", "10:00")], &empty(), &prof, &HashMap::new(), &none);
        assert_eq!(starts(&free), vec![Hhmm(700), Hhmm(745), Hhmm(830)]);
    }

    #[test]
    fn invalid_block_counts_yield_nothing() {
        for n in [None, Some(0), Some(-3), Some(i64::from(u32::MAX) + 1)] {
            let slots = compute_available_slots(
                &class(n),
                &[monday("07:00", "10:00")],
                &empty(),
                &HashMap::new(),
                &HashMap::new(),
                &PendingDeletions::new(),
            );
            assert!(slots.is_empty(), "{n:?}");
        }
    }

    #[test]
    fn no_windows_no_slots() {
        let slots = compute_available_slots(&class(Some(1)), &[], &empty(), &HashMap::new(), &HashMap::new(), &PendingDeletions::new());
        assert!(slots.is_empty());
    }

    #[test]
    fn windows_are_concatenated_without_repeats() {
        let mut tuesday = monday("13:00", "14:30");
        tuesday.day_of_week = "martes".into();
        let ctx = SearchContext {
            availability: vec![monday("07:00", "08:30"), monday("07:00", "09:15"), tuesday],
            ..Default::default()
        };
        let slots = compute_for_context(&class(Some(1)), &ctx, &empty(), &PendingDeletions::new());
        let got: Vec<_> = slots.iter().map(|s| (s.day_index, s.start_block)).collect();
        assert_eq!(
            got,
            vec![(0, Hhmm(700)), (0, Hhmm(745)), (0, Hhmm(830)), (1, Hhmm(1300)), (1, Hhmm(1345))]
        );
    }
}
