use thiserror::Error;
use types::{Hhmm, PlacementId};

/// Misuse of the engine by its caller. Bad domain data never ends up here;
/// it is logged and skipped where it is read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no class is waiting for a slot")]
    NoPendingSelection,
    #[error("slot {day}@{start} was not offered for this class")]
    SlotNotOffered { day: usize, start: Hhmm },
    #[error("cell {day}@{at} is already taken by placement {by}")]
    CellOccupied { day: usize, at: Hhmm, by: PlacementId },
    #[error("slot {day}@{start} does not fit the grid")]
    SlotOutsideGrid { day: usize, start: Hhmm },
    #[error("placement {0} is not on the grid")]
    UnknownPlacement(PlacementId),
}
