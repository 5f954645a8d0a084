use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use types::{ClassPlacement, Conflict, PlacementId, PlacementPayload, SaveResponse, Weekday};
use utoipa::ToSchema;

use crate::grid::WeeklyGrid;
use crate::mutation::update_placement;
use crate::pending::PendingDeletions;
use crate::PersistenceApi;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Deleted { id: PlacementId },
    DeleteFailed { id: PlacementId, message: String },
    Updated { id: PlacementId },
    #[serde(rename_all = "camelCase")]
    Created { local_id: PlacementId, id: PlacementId },
    Conflicted { id: PlacementId, conflicts: Vec<Conflict> },
    Failed { id: PlacementId, message: String },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ItemOutcome::Deleted { .. } | ItemOutcome::Updated { .. } | ItemOutcome::Created { .. }
        )
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub outcomes: Vec<ItemOutcome>,
    pub has_conflicts: bool,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

pub fn payload_of(p: &ClassPlacement) -> Option<PlacementPayload> {
    Some(PlacementPayload {
        professor_id: p.professor_id.clone(),
        classroom_id: p.classroom_id.clone(),
        curricular_unit_id: p.curricular_unit_id.clone(),
        day_of_week: Weekday::from_index(p.day_index)?,
        start_time: p.start_time,
        end_time: p.end_time,
        required_blocks: p.required_blocks,
    })
}

fn settle(p: &mut ClassPlacement) {
    p.is_new = false;
    p.is_moved = false;
    p.conflicts = None;
}

enum Verdict {
    Saved(Option<PlacementId>),
    Conflicted(Vec<Conflict>),
    Failed(String),
}

fn judge(res: anyhow::Result<SaveResponse>) -> Verdict {
    match res {
        Ok(r) if r.success => Verdict::Saved(r.id),
        Ok(r) if !r.conflicts.is_empty() => Verdict::Conflicted(r.conflicts),
        Ok(r) => Verdict::Failed(r.message.unwrap_or_else(|| "rejected by backend".into())),
        Err(e) => Verdict::Failed(format!("{e:#}")),
    }
}

/// Pushes pending deletions, then every dirty placement, to the backend.
///
/// Items are independent: a conflict or failure is recorded against that
/// item only. Deletions go first so a freed slot can be reused in the same
/// batch. Deletions that fail stay pending for the next attempt.
pub async fn commit_pending_changes<A>(
    api: &A,
    grid: &WeeklyGrid,
    pending: &mut PendingDeletions,
) -> (WeeklyGrid, CommitReport)
where
    A: PersistenceApi + ?Sized,
{
    let mut report = CommitReport::default();

    let ids: Vec<PlacementId> = pending.iter().cloned().collect();
    for id in ids {
        match api.delete_class_placement(&id).await {
            Ok(r) if r.success => {
                pending.remove(&id);
                report.outcomes.push(ItemOutcome::Deleted { id });
            }
            Ok(r) => {
                let message = r.message.unwrap_or_else(|| "rejected by backend".into());
                warn!(%id, %message, "delete rejected");
                report.outcomes.push(ItemOutcome::DeleteFailed { id, message });
            }
            Err(e) => {
                error!(%id, error = %e, "delete failed");
                report.outcomes.push(ItemOutcome::DeleteFailed { id, message: format!("{e:#}") });
            }
        }
    }

    let dirty: Vec<ClassPlacement> = grid
        .heads()
        .map(|(_, _, c)| &c.class_data)
        .filter(|p| p.is_dirty())
        .cloned()
        .collect();

    let mut next = grid.clone();
    for placement in dirty {
        let id = placement.id.clone();
        let Some(payload) = payload_of(&placement) else {
            error!(%id, day = placement.day_index, "placement sits on an unknown day");
            report.outcomes.push(ItemOutcome::Failed { id, message: "unknown day".into() });
            continue;
        };

        let verdict = if placement.is_new {
            judge(api.create_class_placement(&payload).await)
        } else {
            judge(api.update_class_placement(&id, &payload).await)
        };

        match verdict {
            Verdict::Saved(server_id) if placement.is_new => {
                let Some(server_id) = server_id else {
                    error!(%id, "create confirmed without an id");
                    report.outcomes.push(ItemOutcome::Failed {
                        id,
                        message: "create confirmed without an id".into(),
                    });
                    continue;
                };
                let adopted = server_id.clone();
                next = update_placement(&next, &id, move |p| {
                    p.id = adopted;
                    settle(p);
                });
                report.outcomes.push(ItemOutcome::Created { local_id: id, id: server_id });
            }
            Verdict::Saved(_) => {
                next = update_placement(&next, &id, settle);
                report.outcomes.push(ItemOutcome::Updated { id });
            }
            Verdict::Conflicted(conflicts) => {
                warn!(%id, count = conflicts.len(), "placement rejected with conflicts");
                let attached = conflicts.clone();
                next = update_placement(&next, &id, move |p| p.conflicts = Some(attached));
                report.has_conflicts = true;
                report.outcomes.push(ItemOutcome::Conflicted { id, conflicts });
            }
            Verdict::Failed(message) => {
                error!(%id, %message, "placement save failed");
                report.outcomes.push(ItemOutcome::Failed { id, message });
            }
        }
    }

    // Baseline reset only when the whole batch went through.
    if report.is_clean() {
        let stale: Vec<PlacementId> = next
            .heads()
            .filter(|(_, _, c)| c.class_data.is_dirty() || c.class_data.conflicts.is_some())
            .map(|(_, _, c)| c.class_data.id.clone())
            .collect();
        for id in stale {
            next = update_placement(&next, &id, settle);
        }
    }

    info!(
        items = report.outcomes.len(),
        failed = report.failures().count(),
        has_conflicts = report.has_conflicts,
        pending_deletions = pending.len(),
        "changes committed"
    );
    (next, report)
}
