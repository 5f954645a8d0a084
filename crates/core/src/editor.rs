use serde::Serialize;
use tracing::{debug, info, warn};
use types::{ClassPlacement, ClassRequest, GridOwner, PlacementId, SectionSchedule, Slot};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::grid::WeeklyGrid;
use crate::mutation::{move_placement, place, remove, vacate};
use crate::pending::PendingDeletions;
use crate::reconcile::{commit_pending_changes, CommitReport};
use crate::slots::{compute_for_context, SearchContext};
use crate::PersistenceApi;

/// A class waiting for the user to pick one of its offered slots.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingSelection {
    pub class: ClassRequest,
    pub available_slots: Vec<Slot>,
    /// Where the class sits now; `None` for a class not yet on the grid.
    pub original_slot: Option<Slot>,
}

#[derive(Clone, Debug)]
struct Snapshot {
    grid: WeeklyGrid,
    pending: PendingDeletions,
}

/// One editing session over one resource's week.
#[derive(Debug)]
pub struct ScheduleEditor {
    owner: GridOwner,
    grid: WeeklyGrid,
    pending: PendingDeletions,
    history: Vec<Snapshot>,
    selection: Option<PendingSelection>,
}

pub fn request_for(p: &ClassPlacement) -> ClassRequest {
    ClassRequest {
        id: Some(p.id.clone()),
        professor_id: p.professor_id.clone(),
        classroom_id: p.classroom_id.clone(),
        curricular_unit_id: p.curricular_unit_id.clone(),
        required_blocks: Some(i64::from(p.required_blocks)),
    }
}

impl ScheduleEditor {
    pub fn new(owner: GridOwner, grid: WeeklyGrid) -> Self {
        Self {
            owner,
            grid,
            pending: PendingDeletions::new(),
            history: Vec::new(),
            selection: None,
        }
    }

    pub fn hydrate(owner: GridOwner, schedule: &SectionSchedule) -> Self {
        Self::new(owner, WeeklyGrid::hydrate_for(&schedule.days, schedule.turno))
    }

    pub fn owner(&self) -> &GridOwner {
        &self.owner
    }

    pub fn grid(&self) -> &WeeklyGrid {
        &self.grid
    }

    pub fn pending_deletions(&self) -> &PendingDeletions {
        &self.pending
    }

    pub fn selection(&self) -> Option<&PendingSelection> {
        self.selection.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty() || self.grid.heads().any(|(_, _, c)| c.class_data.is_dirty())
    }

    /// Runs slot search for `class` and holds the result until `choose` or
    /// `cancel`. A class already on the grid is searched with its own run
    /// vacated so it can stay put or shift within its current span.
    pub fn begin(&mut self, class: ClassRequest, ctx: &SearchContext) -> &[Slot] {
        let on_grid = class.id.as_ref().filter(|id| self.grid.locate(id).is_some());
        let original_slot = on_grid.and_then(|id| self.grid.slot_of(id));
        let available_slots = match on_grid {
            Some(id) => compute_for_context(&class, ctx, &vacate(&self.grid, id), &self.pending),
            None => compute_for_context(&class, ctx, &self.grid, &self.pending),
        };
        debug!(
            owner = ?self.owner,
            class = ?class.id,
            offered = available_slots.len(),
            moving = original_slot.is_some(),
            "selection started"
        );
        let selection = self.selection.insert(PendingSelection { class, available_slots, original_slot });
        &selection.available_slots
    }

    /// Starts a move for a placement already on the grid.
    pub fn begin_move(&mut self, id: &PlacementId, ctx: &SearchContext) -> Result<&[Slot], EngineError> {
        let class = self
            .grid
            .placement(id)
            .map(request_for)
            .ok_or_else(|| EngineError::UnknownPlacement(id.clone()))?;
        Ok(self.begin(class, ctx))
    }

    pub fn cancel(&mut self) -> Option<PendingSelection> {
        let dropped = self.selection.take();
        if dropped.is_some() {
            debug!(owner = ?self.owner, "selection cancelled");
        }
        dropped
    }

    /// Places or moves the pending class into `slot`, which must be one of
    /// the slots `begin` offered.
    pub fn choose(&mut self, slot: &Slot) -> Result<PlacementId, EngineError> {
        let selection = self.selection.as_ref().ok_or(EngineError::NoPendingSelection)?;
        let offered = selection
            .available_slots
            .iter()
            .find(|s| s.day_index == slot.day_index && s.start_block == slot.start_block)
            .ok_or(EngineError::SlotNotOffered { day: slot.day_index, start: slot.start_block })?;

        let current = selection.class.id.as_ref().and_then(|id| self.grid.placement(id));
        let (next, id) = match current {
            Some(current) => {
                // The offered slots were checked for the requested resources.
                let mut moving = current.clone();
                moving.professor_id = selection.class.professor_id.clone();
                moving.classroom_id = selection.class.classroom_id.clone();
                moving.curricular_unit_id = selection.class.curricular_unit_id.clone();
                (move_placement(&self.grid, &moving, offered)?, moving.id)
            }
            None => place(&self.grid, &selection.class, offered)?,
        };
        self.checkpoint();
        self.grid = next;
        self.selection = None;
        Ok(id)
    }

    /// Takes a placement off the grid. Persisted ones are queued for deletion.
    pub fn remove(&mut self, id: &PlacementId) -> Result<(), EngineError> {
        if self.grid.placement(id).is_none() {
            return Err(EngineError::UnknownPlacement(id.clone()));
        }
        self.checkpoint();
        self.grid = remove(&self.grid, id, &mut self.pending);
        if self.selection.as_ref().is_some_and(|s| s.class.id.as_ref() == Some(id)) {
            self.selection = None;
        }
        Ok(())
    }

    /// Restores the grid and pending deletions from before the last
    /// `choose` or `remove`. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(prev) = self.history.pop() else {
            return false;
        };
        self.grid = prev.grid;
        self.pending = prev.pending;
        self.selection = None;
        true
    }

    pub async fn commit<A>(&mut self, api: &A) -> CommitReport
    where
        A: PersistenceApi + ?Sized,
    {
        if self.selection.take().is_some() {
            warn!(owner = ?self.owner, "committing with an open selection, dropped");
        }
        let (next, report) = commit_pending_changes(api, &self.grid, &mut self.pending).await;
        self.grid = next;
        self.history.clear();
        info!(owner = ?self.owner, clean = report.is_clean(), "session committed");
        report
    }

    fn checkpoint(&mut self) {
        self.history.push(Snapshot {
            grid: self.grid.clone(),
            pending: self.pending.clone(),
        });
    }
}
