use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::debug;
use types::{AvailabilityWindow, ClassroomId, ProfessorId, ResourceBooking};

use crate::cache::BookingCache;
use crate::slots::SearchContext;
use crate::PersistenceApi;

#[derive(Clone, Debug, Default)]
pub struct ProfessorSnapshot {
    pub availability: Vec<AvailabilityWindow>,
    pub bookings: Vec<ResourceBooking>,
}

/// Read side of the backend with a booking cache in front of it.
pub struct ResourceDirectory<A: ?Sized> {
    api: Arc<A>,
    professors: BookingCache<ProfessorId, ProfessorSnapshot>,
    classrooms: BookingCache<ClassroomId, Vec<ResourceBooking>>,
}

impl<A> ResourceDirectory<A>
where
    A: PersistenceApi + ?Sized,
{
    pub fn new(api: Arc<A>, ttl: Duration) -> Self {
        Self {
            api,
            professors: BookingCache::new(ttl),
            classrooms: BookingCache::new(ttl),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub async fn professor(&self, id: &ProfessorId) -> anyhow::Result<ProfessorSnapshot> {
        if let Some(hit) = self.professors.get(id) {
            debug!(professor = %id, "professor snapshot from cache");
            return Ok(hit);
        }
        let (availability, bookings) = tokio::try_join!(
            self.api.get_professor_availability(id),
            self.api.get_professor_bookings(id),
        )
        .with_context(|| format!("loading professor {id}"))?;
        let snap = ProfessorSnapshot { availability, bookings };
        self.professors.set(id.clone(), snap.clone(), Instant::now());
        Ok(snap)
    }

    pub async fn classroom(&self, id: &ClassroomId) -> anyhow::Result<Vec<ResourceBooking>> {
        if let Some(hit) = self.classrooms.get(id) {
            debug!(classroom = %id, "classroom bookings from cache");
            return Ok(hit);
        }
        let bookings = self
            .api
            .get_classroom_bookings(id)
            .await
            .with_context(|| format!("loading classroom {id}"))?;
        self.classrooms.set(id.clone(), bookings.clone(), Instant::now());
        Ok(bookings)
    }

    /// Everything slot search needs for one class, professor and classroom
    /// fetched together.
    pub async fn load_context(&self, professor: &ProfessorId, classroom: &ClassroomId) -> anyhow::Result<SearchContext> {
        let (prof, room) = tokio::try_join!(self.professor(professor), self.classroom(classroom))?;
        Ok(SearchContext {
            availability: prof.availability,
            professor_bookings: HashMap::from([(professor.clone(), prof.bookings)]),
            classroom_bookings: HashMap::from([(classroom.clone(), room)]),
        })
    }

    /// Drops cached snapshots after a commit changed what the backend holds.
    pub fn invalidate(&self, professor: &ProfessorId, classroom: &ClassroomId) {
        self.professors.invalidate(professor);
        self.classrooms.invalidate(classroom);
    }

    pub fn clear(&self) {
        self.professors.clear();
        self.classrooms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use types::{
        BookedClass, DeleteResponse, PlacementId, PlacementPayload, SaveResponse, SectionId, SectionSchedule,
    };

    #[derive(Default)]
    struct Counting {
        fetches: AtomicUsize,
        fail_classrooms: bool,
    }

    #[async_trait]
    impl PersistenceApi for Counting {
        async fn get_professor_availability(&self, _: &ProfessorId) -> anyhow::Result<Vec<AvailabilityWindow>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![AvailabilityWindow {
                day_of_week: "lunes".into(),
                start_time: Some("07:00".into()),
                end_time: Some("10:00".into()),
                active: true,
            }])
        }
        async fn get_professor_bookings(&self, _: &ProfessorId) -> anyhow::Result<Vec<ResourceBooking>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
        async fn get_classroom_bookings(&self, _: &ClassroomId) -> anyhow::Result<Vec<ResourceBooking>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_classrooms {
                anyhow::bail!("backend down");
            }
            Ok(vec![ResourceBooking {
                day_of_week: "lunes".into(),
                classes: vec![BookedClass {
                    schedule_id: "5".into(),
                    start_time: "07:00".into(),
                    end_time: "07:45".into(),
                }],
            }])
        }
        async fn create_class_placement(&self, _: &PlacementPayload) -> anyhow::Result<SaveResponse> {
            unimplemented!()
        }
        async fn update_class_placement(&self, _: &PlacementId, _: &PlacementPayload) -> anyhow::Result<SaveResponse> {
            unimplemented!()
        }
        async fn delete_class_placement(&self, _: &PlacementId) -> anyhow::Result<DeleteResponse> {
            unimplemented!()
        }
        async fn get_section_schedule(&self, _: &SectionId) -> anyhow::Result<SectionSchedule> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let api = Arc::new(Counting::default());
        let dir = ResourceDirectory::new(api.clone(), Duration::from_secs(300));
        let (p, r) = (ProfessorId::from("p1"), ClassroomId::from("r1"));

        let ctx = dir.load_context(&p, &r).await.unwrap();
        assert_eq!(ctx.availability.len(), 1);
        assert_eq!(ctx.classroom_bookings[&r][0].classes.len(), 1);
        assert!(ctx.professor_bookings[&p].is_empty());
        assert_eq!(api.fetches.load(Ordering::SeqCst), 3);

        dir.load_context(&p, &r).await.unwrap();
        assert_eq!(api.fetches.load(Ordering::SeqCst), 3);

        dir.invalidate(&p, &r);
        dir.load_context(&p, &r).await.unwrap();
        assert_eq!(api.fetches.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let api = Arc::new(Counting::default());
        let dir = ResourceDirectory::new(api.clone(), Duration::ZERO);
        let r = ClassroomId::from("r1");
        dir.classroom(&r).await.unwrap();
        dir.classroom(&r).await.unwrap();
        assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_failed_fetch_fails_the_context() {
        let api = Arc::new(Counting { fail_classrooms: true, ..Default::default() });
        let dir = ResourceDirectory::new(api, Duration::from_secs(300));
        let err = dir.load_context(&"p1".into(), &"r9".into()).await.unwrap_err();
        assert!(format!("{err:#}").contains("backend down"));
    }
}
