use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sched_core::reconcile::CommitReport;
use serde::{Deserialize, Serialize};
use sessions::{SessionId, SessionView};
use types::{ClassRequest, GridOwner, PlacementId, Slot};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct OpenSession {
    pub owner: GridOwner,
}

#[derive(Serialize, ToSchema)]
pub struct SlotsOut {
    pub slots: Vec<Slot>,
}

#[derive(Serialize, ToSchema)]
pub struct Chosen {
    pub id: PlacementId,
}

#[derive(Serialize, ToSchema)]
pub struct Done {
    pub changed: bool,
}

#[utoipa::path(
    post,
    path = "/v1/sessions",
    request_body = OpenSession,
    responses(
        (status = 201, description = "Session opened", body = SessionView),
        (status = 502, description = "Backend unavailable")
    )
)]
pub async fn open(
    State(state): State<AppState>,
    Json(input): Json<OpenSession>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let id = match &input.owner {
        GridOwner::Section(section) => state.sessions.open_section(section).await?,
        other => state.sessions.open_empty(other.clone()),
    };
    let view = state.sessions.view(&id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{id}",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Current grid and selection", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn view(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.sessions.view(&SessionId(id)).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{id}",
    params(("id" = String, Path, description = "Session ID")),
    responses((status = 204, description = "Session closed"), (status = 404, description = "Unknown session"))
)]
pub async fn close(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if state.sessions.close(&SessionId(id.clone())) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("session {id} not found")))
    }
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/begin",
    params(("id" = String, Path, description = "Session ID")),
    request_body = ClassRequest,
    responses((status = 200, description = "Slots offered for the class", body = SlotsOut))
)]
pub async fn begin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(class): Json<ClassRequest>,
) -> Result<Json<SlotsOut>, ApiError> {
    let slots = state.sessions.begin(&SessionId(id), class).await?;
    Ok(Json(SlotsOut { slots }))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/placements/{placement}/move",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("placement" = String, Path, description = "Placement on the grid")
    ),
    responses((status = 200, description = "Slots the placement can move to", body = SlotsOut))
)]
pub async fn begin_move(
    State(state): State<AppState>,
    Path((id, placement)): Path<(String, String)>,
) -> Result<Json<SlotsOut>, ApiError> {
    let slots = state.sessions.begin_move(&SessionId(id), &PlacementId(placement)).await?;
    Ok(Json(SlotsOut { slots }))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/choose",
    params(("id" = String, Path, description = "Session ID")),
    request_body = Slot,
    responses(
        (status = 200, description = "Class placed", body = Chosen),
        (status = 400, description = "Slot was not offered")
    )
)]
pub async fn choose(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(slot): Json<Slot>,
) -> Result<Json<Chosen>, ApiError> {
    let placed = state.sessions.choose(&SessionId(id), &slot).await?;
    Ok(Json(Chosen { id: placed }))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/cancel",
    params(("id" = String, Path, description = "Session ID")),
    responses((status = 200, description = "Selection dropped", body = Done))
)]
pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Done>, ApiError> {
    let changed = state.sessions.cancel(&SessionId(id)).await?;
    Ok(Json(Done { changed }))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{id}/placements/{placement}",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("placement" = String, Path, description = "Placement on the grid")
    ),
    responses((status = 204, description = "Placement removed locally"))
)]
pub async fn remove(
    State(state): State<AppState>,
    Path((id, placement)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(&SessionId(id), &PlacementId(placement)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/undo",
    params(("id" = String, Path, description = "Session ID")),
    responses((status = 200, description = "Last edit reverted", body = Done))
)]
pub async fn undo(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Done>, ApiError> {
    let changed = state.sessions.undo(&SessionId(id)).await?;
    Ok(Json(Done { changed }))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/commit",
    params(("id" = String, Path, description = "Session ID")),
    responses((status = 200, description = "Per-item results of the save", body = CommitReport))
)]
pub async fn commit(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CommitReport>, ApiError> {
    Ok(Json(state.sessions.commit(&SessionId(id)).await?))
}
