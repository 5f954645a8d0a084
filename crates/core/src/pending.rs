use std::collections::BTreeSet;
use types::PlacementId;

/// Persisted placements removed locally whose delete has not reached the
/// backend yet. Bookings listed here no longer block new placements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingDeletions {
    ids: BTreeSet<PlacementId>,
}

impl PendingDeletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PlacementId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: &PlacementId) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &PlacementId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacementId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
