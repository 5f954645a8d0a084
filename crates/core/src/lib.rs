pub mod availability;
pub mod cache;
pub mod conflict;
pub mod directory;
pub mod editor;
pub mod error;
pub mod grid;
pub mod mutation;
pub mod pending;
pub mod reconcile;
pub mod slots;
pub mod time;

use async_trait::async_trait;

pub use error::EngineError;
pub use types::{
    AvailabilityWindow, ClassPlacement, ClassRequest, ClassroomId, DeleteResponse, GridOwner, Hhmm,
    PlacementId, PlacementPayload, ProfessorId, ResourceBooking, SaveResponse, SectionId,
    SectionSchedule, Slot,
};

/// The backend the engine reads bookings from and writes placements to.
///
/// A rejected save is an `Ok` response with `success == false`; `Err` is
/// reserved for transport and decoding failures.
#[async_trait]
pub trait PersistenceApi: Send + Sync + 'static {
    async fn get_professor_availability(&self, id: &ProfessorId) -> anyhow::Result<Vec<AvailabilityWindow>>;
    async fn get_professor_bookings(&self, id: &ProfessorId) -> anyhow::Result<Vec<ResourceBooking>>;
    async fn get_classroom_bookings(&self, id: &ClassroomId) -> anyhow::Result<Vec<ResourceBooking>>;
    async fn create_class_placement(&self, payload: &PlacementPayload) -> anyhow::Result<SaveResponse>;
    async fn update_class_placement(
        &self,
        id: &PlacementId,
        payload: &PlacementPayload,
    ) -> anyhow::Result<SaveResponse>;
    async fn delete_class_placement(&self, id: &PlacementId) -> anyhow::Result<DeleteResponse>;
    async fn get_section_schedule(&self, id: &SectionId) -> anyhow::Result<SectionSchedule>;
}
