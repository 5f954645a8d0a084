use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sched_core::directory::ResourceDirectory;
use sched_core::editor::{request_for, PendingSelection, ScheduleEditor};
use sched_core::grid::{WeeklyGrid, DAYS};
use sched_core::reconcile::CommitReport;
use sched_core::time::BlockTable;
use sched_core::{EngineError, PersistenceApi};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use types::{CellState, ClassRequest, GridOwner, Hhmm, PlacementId, SectionId, Slot, Weekday};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(pub String);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("backend: {0:#}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    pub start: Hhmm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<CellState>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub day: Weekday,
    pub cells: Vec<CellView>,
}

/// What a client needs to redraw one editing session.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: SessionId,
    pub owner: GridOwner,
    pub days: Vec<DayView>,
    pub pending_deletions: Vec<PlacementId>,
    pub selection: Option<PendingSelection>,
    pub can_undo: bool,
    pub unsaved_changes: bool,
}

fn days_of(grid: &WeeklyGrid) -> Vec<DayView> {
    (0..DAYS)
        .filter_map(|d| {
            let day = Weekday::from_index(d)?;
            let cells = grid
                .day(d)?
                .iter()
                .map(|(start, cell)| CellView { start: *start, cell: cell.clone() })
                .collect();
            Some(DayView { day, cells })
        })
        .collect()
}

fn view_of(id: &SessionId, ed: &ScheduleEditor) -> SessionView {
    SessionView {
        id: id.clone(),
        owner: ed.owner().clone(),
        days: days_of(ed.grid()),
        pending_deletions: ed.pending_deletions().iter().cloned().collect(),
        selection: ed.selection().cloned(),
        can_undo: ed.can_undo(),
        unsaved_changes: ed.has_unsaved_changes(),
    }
}

type Shared = Arc<Mutex<ScheduleEditor>>;

/// Open editing sessions, each owning one `ScheduleEditor`. Booking snapshots
/// are cached once for all sessions.
pub struct InMemSessions<A: PersistenceApi + ?Sized> {
    inner: Arc<RwLock<HashMap<SessionId, Shared>>>,
    directory: Arc<ResourceDirectory<A>>,
}

impl<A: PersistenceApi + ?Sized> Clone for InMemSessions<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            directory: self.directory.clone(),
        }
    }
}

impl<A: PersistenceApi + ?Sized> InMemSessions<A> {
    pub fn new(api: Arc<A>, cache_ttl: Duration) -> Self {
        Self {
            inner: Default::default(),
            directory: Arc::new(ResourceDirectory::new(api, cache_ttl)),
        }
    }

    fn insert(&self, editor: ScheduleEditor) -> SessionId {
        let id = SessionId(Uuid::new_v4().to_string());
        info!(session = %id.0, owner = ?editor.owner(), "session opened");
        self.inner.write().insert(id.clone(), Arc::new(Mutex::new(editor)));
        id
    }

    fn editor(&self, id: &SessionId) -> Result<Shared, SessionError> {
        self.inner
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.0.clone()))
    }

    /// Hydrates a section's week from the backend.
    pub async fn open_section(&self, section: &SectionId) -> Result<SessionId, SessionError> {
        let schedule = self.directory.api().get_section_schedule(section).await?;
        Ok(self.insert(ScheduleEditor::hydrate(GridOwner::Section(section.clone()), &schedule)))
    }

    /// Professor and classroom views start from an empty institutional day.
    ///
    /// The owner is not hydrated onto the grid: the backend only reports a
    /// resource's bookings as bare time ranges, without the counterpart
    /// resource or unit a placement needs. Those bookings still constrain
    /// slot search through the directory, so a session can add classes for
    /// the owner but cannot move or remove the ones it already has.
    pub fn open_empty(&self, owner: GridOwner) -> SessionId {
        self.insert(ScheduleEditor::new(owner, WeeklyGrid::empty(BlockTable::standard())))
    }

    pub fn close(&self, id: &SessionId) -> bool {
        let closed = self.inner.write().remove(id).is_some();
        if closed {
            info!(session = %id.0, "session closed");
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub async fn view(&self, id: &SessionId) -> Result<SessionView, SessionError> {
        let editor = self.editor(id)?;
        let ed = editor.lock().await;
        Ok(view_of(id, &ed))
    }

    pub async fn begin(&self, id: &SessionId, class: ClassRequest) -> Result<Vec<Slot>, SessionError> {
        let editor = self.editor(id)?;
        let mut ed = editor.lock().await;
        let ctx = self
            .directory
            .load_context(&class.professor_id, &class.classroom_id)
            .await?;
        Ok(ed.begin(class, &ctx).to_vec())
    }

    pub async fn begin_move(&self, id: &SessionId, placement: &PlacementId) -> Result<Vec<Slot>, SessionError> {
        let editor = self.editor(id)?;
        let mut ed = editor.lock().await;
        let class = ed
            .grid()
            .placement(placement)
            .map(request_for)
            .ok_or_else(|| EngineError::UnknownPlacement(placement.clone()))?;
        let ctx = self
            .directory
            .load_context(&class.professor_id, &class.classroom_id)
            .await?;
        Ok(ed.begin(class, &ctx).to_vec())
    }

    pub async fn cancel(&self, id: &SessionId) -> Result<bool, SessionError> {
        let editor = self.editor(id)?;
        let cancelled = editor.lock().await.cancel().is_some();
        Ok(cancelled)
    }

    pub async fn choose(&self, id: &SessionId, slot: &Slot) -> Result<PlacementId, SessionError> {
        let editor = self.editor(id)?;
        let placed = editor.lock().await.choose(slot)?;
        debug!(session = %id.0, placement = %placed, "slot chosen");
        Ok(placed)
    }

    pub async fn remove(&self, id: &SessionId, placement: &PlacementId) -> Result<(), SessionError> {
        let editor = self.editor(id)?;
        editor.lock().await.remove(placement)?;
        Ok(())
    }

    pub async fn undo(&self, id: &SessionId) -> Result<bool, SessionError> {
        let editor = self.editor(id)?;
        let undone = editor.lock().await.undo();
        Ok(undone)
    }

    pub async fn commit(&self, id: &SessionId) -> Result<CommitReport, SessionError> {
        let editor = self.editor(id)?;
        let mut ed = editor.lock().await;
        let report = ed.commit(self.directory.api().as_ref()).await;
        if !report.outcomes.is_empty() {
            // Bookings changed on the backend; every cached snapshot may be stale.
            self.directory.clear();
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::reconcile::ItemOutcome;
    use store_mem::MemStore;

    fn sessions(store: &Arc<MemStore>) -> InMemSessions<MemStore> {
        InMemSessions::new(store.clone(), Duration::from_secs(300))
    }

    fn at(slots: &[Slot], day: usize, start: Hhmm) -> Slot {
        slots
            .iter()
            .find(|s| s.day_index == day && s.start_block == start)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn open_hydrates_the_section() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let id = sessions.open_section(&"sec-1".into()).await.unwrap();

        let view = sessions.view(&id).await.unwrap();
        assert_eq!(view.owner, GridOwner::Section("sec-1".into()));
        assert_eq!(view.days.len(), 6);
        let monday = &view.days[0];
        assert_eq!(monday.cells.first().map(|c| c.start), Some(Hhmm::new(7, 0)));
        assert_eq!(monday.cells.last().map(|c| c.start), Some(Hhmm::new(12, 15)));
        assert!(monday.cells[0].cell.as_ref().is_some_and(|c| c.is_head()));
        assert!(!view.unsaved_changes);
    }

    #[tokio::test]
    async fn move_and_commit_reaches_the_backend() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let id = sessions.open_section(&"sec-1".into()).await.unwrap();

        let slots = sessions.begin_move(&id, &"1".into()).await.unwrap();
        assert_eq!(slots.iter().filter(|s| s.day_index == 0).count(), 7);
        sessions.choose(&id, &at(&slots, 0, Hhmm::new(10, 0))).await.unwrap();
        assert!(sessions.view(&id).await.unwrap().unsaved_changes);

        let report = sessions.commit(&id).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(store.placement(&"1".into()).unwrap().start_time, Hhmm::new(10, 0));
        assert!(!sessions.view(&id).await.unwrap().unsaved_changes);
    }

    #[tokio::test]
    async fn new_class_gets_the_backend_id() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let id = sessions.open_section(&"sec-1".into()).await.unwrap();

        let class = ClassRequest {
            id: None,
            professor_id: "prof-1".into(),
            classroom_id: "aula-102".into(),
            curricular_unit_id: "fisica".into(),
            required_blocks: Some(2),
        };
        let slots = sessions.begin(&id, class).await.unwrap();
        assert!(slots.iter().all(|s| s.start_block >= Hhmm::new(8, 30) || s.day_index != 0));
        let local = sessions.choose(&id, &at(&slots, 2, Hhmm::new(7, 0))).await.unwrap();
        assert!(local.is_local());

        let report = sessions.commit(&id).await.unwrap();
        let [ItemOutcome::Created { id: server_id, .. }] = &report.outcomes[..] else {
            panic!("unexpected outcomes {report:?}");
        };
        assert_eq!(store.len(), 2);
        assert!(store.placement(server_id).is_some());
    }

    #[tokio::test]
    async fn removal_is_sent_on_commit() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let id = sessions.open_section(&"sec-1".into()).await.unwrap();

        sessions.remove(&id, &"1".into()).await.unwrap();
        assert_eq!(sessions.view(&id).await.unwrap().pending_deletions, vec![PlacementId::from("1")]);
        assert_eq!(store.len(), 1);
        sessions.commit(&id).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn a_concurrent_booking_comes_back_as_a_conflict() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let a = sessions.open_section(&"sec-1".into()).await.unwrap();
        let b = sessions.open_section(&"sec-1".into()).await.unwrap();
        let class = ClassRequest {
            id: None,
            professor_id: "prof-1".into(),
            classroom_id: "aula-102".into(),
            curricular_unit_id: "fisica".into(),
            required_blocks: Some(2),
        };

        // Both sessions see Wednesday 07:00 free and take it.
        for s in [&a, &b] {
            let slots = sessions.begin(s, class.clone()).await.unwrap();
            sessions.choose(s, &at(&slots, 2, Hhmm::new(7, 0))).await.unwrap();
        }
        assert!(sessions.commit(&b).await.unwrap().is_clean());

        let report = sessions.commit(&a).await.unwrap();
        assert!(report.has_conflicts);
        let view = sessions.view(&a).await.unwrap();
        let cell = view.days[2].cells[0].cell.as_ref().unwrap();
        assert!(cell.class_data.is_new);
        assert_eq!(cell.class_data.conflicts.as_ref().map(Vec::len), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn unknown_sessions_and_placements_are_errors() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let missing = SessionId("nope".into());
        assert!(matches!(sessions.undo(&missing).await, Err(SessionError::NotFound(_))));

        let id = sessions.open_empty(GridOwner::Professor("prof-1".into()));
        assert!(matches!(
            sessions.remove(&id, &"404".into()).await,
            Err(SessionError::Engine(EngineError::UnknownPlacement(_)))
        ));
        assert!(matches!(
            sessions.begin_move(&id, &"1".into()).await,
            Err(SessionError::Engine(EngineError::UnknownPlacement(_)))
        ));
        assert!(sessions.close(&id));
        assert!(!sessions.close(&id));
    }

    #[tokio::test]
    async fn professor_sessions_start_empty_but_respect_bookings() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        let id = sessions.open_empty(GridOwner::Professor("prof-1".into()));

        let view = sessions.view(&id).await.unwrap();
        assert!(view.days.iter().flat_map(|d| &d.cells).all(|c| c.cell.is_none()));

        let class = ClassRequest {
            id: None,
            professor_id: "prof-1".into(),
            classroom_id: "aula-102".into(),
            curricular_unit_id: "fisica".into(),
            required_blocks: Some(2),
        };
        let slots = sessions.begin(&id, class).await.unwrap();
        let monday: Vec<Hhmm> = slots.iter().filter(|s| s.day_index == 0).map(|s| s.start_block).collect();
        assert_eq!(monday.first(), Some(&Hhmm::new(8, 30)));
        assert_eq!(monday.len(), 5);
    }

    #[tokio::test]
    async fn unknown_section_is_a_backend_error() {
        let store = Arc::new(MemStore::demo());
        let sessions = sessions(&store);
        assert!(matches!(
            sessions.open_section(&"sec-9".into()).await,
            Err(SessionError::Backend(_))
        ));
        assert!(sessions.is_empty());
    }
}
