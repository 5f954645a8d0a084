//! In-memory backend. Answers saves the way the real one does, including
//! the double-booking check and its `conflicts` payload.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use sched_core::conflict::spans_overlap;
use sched_core::time::minutes_of;
use sched_core::PersistenceApi;
use serde_json::json;
use tracing::{debug, info};
use types::{
    AvailabilityWindow, BookedClass, ClassroomId, Conflict, CurricularUnitId, DeleteResponse, Hhmm, PlacementId,
    PlacementPayload, ProfessorId, RawClass, RawDay, ResourceBooking, SaveResponse, SectionId, SectionSchedule,
    Turno, Weekday,
};

#[derive(Clone, Debug)]
struct Section {
    turno: Option<Turno>,
    units: HashSet<CurricularUnitId>,
}

#[derive(Default)]
struct State {
    availability: HashMap<ProfessorId, Vec<AvailabilityWindow>>,
    sections: HashMap<SectionId, Section>,
    placements: BTreeMap<PlacementId, PlacementPayload>,
    next_id: u64,
}

impl State {
    fn mint_id(&mut self) -> PlacementId {
        self.next_id += 1;
        PlacementId(self.next_id.to_string())
    }

    fn conflicts_for(&self, payload: &PlacementPayload, skip: Option<&PlacementId>) -> Vec<Conflict> {
        let (start, end) = (minutes_of(payload.start_time), minutes_of(payload.end_time));
        let mut found = Vec::new();
        for (id, other) in &self.placements {
            if Some(id) == skip || other.day_of_week != payload.day_of_week {
                continue;
            }
            if !spans_overlap(start, end, minutes_of(other.start_time), minutes_of(other.end_time)) {
                continue;
            }
            let details = json!({
                "scheduleId": id,
                "dayOfWeek": other.day_of_week,
                "startTime": other.start_time,
                "endTime": other.end_time,
            });
            if other.professor_id == payload.professor_id {
                found.push(Conflict {
                    r#type: "professor".into(),
                    message: format!("professor {} already teaches at {}", payload.professor_id, other.start_time),
                    details: details.clone(),
                });
            }
            if other.classroom_id == payload.classroom_id {
                found.push(Conflict {
                    r#type: "classroom".into(),
                    message: format!("classroom {} is taken at {}", payload.classroom_id, other.start_time),
                    details,
                });
            }
        }
        found
    }

    fn bookings_where<F>(&self, pred: F) -> Vec<ResourceBooking>
    where
        F: Fn(&PlacementPayload) -> bool,
    {
        let mut by_day: BTreeMap<usize, Vec<BookedClass>> = BTreeMap::new();
        for (id, p) in self.placements.iter().filter(|(_, p)| pred(p)) {
            by_day.entry(p.day_of_week.index()).or_default().push(BookedClass {
                schedule_id: id.clone(),
                start_time: p.start_time.to_string(),
                end_time: p.end_time.to_string(),
            });
        }
        by_day
            .into_iter()
            .filter_map(|(d, classes)| {
                Some(ResourceBooking {
                    day_of_week: Weekday::from_index(d)?.name().to_string(),
                    classes,
                })
            })
            .collect()
    }
}

fn rejected(message: impl Into<String>) -> SaveResponse {
    SaveResponse {
        success: false,
        message: Some(message.into()),
        ..Default::default()
    }
}

fn malformed(payload: &PlacementPayload) -> Option<String> {
    if payload.start_time >= payload.end_time {
        return Some(format!("start {} is not before end {}", payload.start_time, payload.end_time));
    }
    if payload.required_blocks == 0 {
        return Some("requiredBlocks must be positive".into());
    }
    None
}

#[derive(Default)]
pub struct MemStore {
    state: RwLock<State>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_availability(&self, professor: ProfessorId, windows: Vec<AvailabilityWindow>) {
        self.state.write().availability.insert(professor, windows);
    }

    /// A section's schedule is every placement of one of its curricular units.
    pub fn add_section(&self, id: SectionId, turno: Option<Turno>, units: impl IntoIterator<Item = CurricularUnitId>) {
        let section = Section { turno, units: units.into_iter().collect() };
        self.state.write().sections.insert(id, section);
    }

    /// Stores a placement without the double-booking check.
    pub fn seed(&self, payload: PlacementPayload) -> PlacementId {
        let mut state = self.state.write();
        let id = state.mint_id();
        state.placements.insert(id.clone(), payload);
        id
    }

    pub fn placement(&self, id: &PlacementId) -> Option<PlacementPayload> {
        self.state.read().placements.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().placements.is_empty()
    }

    /// Small fixture for running the service without a backend.
    pub fn demo() -> Self {
        let store = Self::new();
        let window = |day: &str, from: &str, to: &str| AvailabilityWindow {
            day_of_week: day.into(),
            start_time: Some(from.into()),
            end_time: Some(to.into()),
            active: true,
        };
        store.set_availability(
            "prof-1".into(),
            vec![window("lunes", "07:00", "13:00"), window("miercoles", "07:00", "13:00")],
        );
        store.set_availability("prof-2".into(), vec![window("martes", "13:00", "18:15")]);
        store.add_section(
            "sec-1".into(),
            Some(Turno::Manana),
            [CurricularUnitId::from("calculo"), CurricularUnitId::from("fisica")],
        );
        store.seed(PlacementPayload {
            professor_id: "prof-1".into(),
            classroom_id: "aula-101".into(),
            curricular_unit_id: "calculo".into(),
            day_of_week: Weekday::Lunes,
            start_time: Hhmm::new(7, 0),
            end_time: Hhmm::new(8, 30),
            required_blocks: 2,
        });
        store
    }
}

#[async_trait]
impl PersistenceApi for MemStore {
    async fn get_professor_availability(&self, id: &ProfessorId) -> anyhow::Result<Vec<AvailabilityWindow>> {
        Ok(self.state.read().availability.get(id).cloned().unwrap_or_default())
    }

    async fn get_professor_bookings(&self, id: &ProfessorId) -> anyhow::Result<Vec<ResourceBooking>> {
        Ok(self.state.read().bookings_where(|p| &p.professor_id == id))
    }

    async fn get_classroom_bookings(&self, id: &ClassroomId) -> anyhow::Result<Vec<ResourceBooking>> {
        Ok(self.state.read().bookings_where(|p| &p.classroom_id == id))
    }

    async fn create_class_placement(&self, payload: &PlacementPayload) -> anyhow::Result<SaveResponse> {
        if let Some(why) = malformed(payload) {
            return Ok(rejected(why));
        }
        let mut state = self.state.write();
        let conflicts = state.conflicts_for(payload, None);
        if !conflicts.is_empty() {
            debug!(count = conflicts.len(), "create refused");
            return Ok(SaveResponse { success: false, conflicts, ..Default::default() });
        }
        let id = state.mint_id();
        state.placements.insert(id.clone(), payload.clone());
        info!(%id, "placement created");
        Ok(SaveResponse { success: true, id: Some(id), ..Default::default() })
    }

    async fn update_class_placement(&self, id: &PlacementId, payload: &PlacementPayload) -> anyhow::Result<SaveResponse> {
        if let Some(why) = malformed(payload) {
            return Ok(rejected(why));
        }
        let mut state = self.state.write();
        if !state.placements.contains_key(id) {
            return Ok(rejected(format!("placement {id} does not exist")));
        }
        let conflicts = state.conflicts_for(payload, Some(id));
        if !conflicts.is_empty() {
            debug!(%id, count = conflicts.len(), "update refused");
            return Ok(SaveResponse { success: false, conflicts, ..Default::default() });
        }
        state.placements.insert(id.clone(), payload.clone());
        info!(%id, "placement updated");
        Ok(SaveResponse { success: true, id: Some(id.clone()), ..Default::default() })
    }

    async fn delete_class_placement(&self, id: &PlacementId) -> anyhow::Result<DeleteResponse> {
        let removed = self.state.write().placements.remove(id).is_some();
        if removed {
            info!(%id, "placement deleted");
            return Ok(DeleteResponse { success: true, message: None });
        }
        Ok(DeleteResponse {
            success: false,
            message: Some(format!("placement {id} does not exist")),
        })
    }

    async fn get_section_schedule(&self, id: &SectionId) -> anyhow::Result<SectionSchedule> {
        let state = self.state.read();
        let section = state
            .sections
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("section {id} not found"))?;
        let mut by_day: BTreeMap<usize, Vec<RawClass>> = BTreeMap::new();
        for (pid, p) in state.placements.iter().filter(|(_, p)| section.units.contains(&p.curricular_unit_id)) {
            by_day.entry(p.day_of_week.index()).or_default().push(RawClass {
                id: pid.clone(),
                professor_id: p.professor_id.clone(),
                classroom_id: p.classroom_id.clone(),
                curricular_unit_id: p.curricular_unit_id.clone(),
                start_time: p.start_time.to_string(),
                end_time: p.end_time.to_string(),
            });
        }
        let days = by_day
            .into_iter()
            .filter_map(|(d, classes)| {
                Some(RawDay {
                    day_name: Weekday::from_index(d)?.name().to_string(),
                    classes,
                })
            })
            .collect();
        Ok(SectionSchedule { days, turno: section.turno })
    }
}
