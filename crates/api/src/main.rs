mod config;
mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod health;
    pub mod sessions;
}

use axum::{
    routing::{delete, get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            routes::health::health,
            routes::sessions::open,
            routes::sessions::view,
            routes::sessions::close,
            routes::sessions::begin,
            routes::sessions::begin_move,
            routes::sessions::choose,
            routes::sessions::cancel,
            routes::sessions::remove,
            routes::sessions::undo,
            routes::sessions::commit,
        ),
        components(schemas(
            types::Hhmm, types::Weekday, types::Turno, types::GridOwner, types::Conflict,
            types::ClassPlacement, types::CellState, types::Slot, types::ClassRequest,
            types::ProfessorId, types::ClassroomId, types::CurricularUnitId, types::SectionId,
            types::PlacementId,
            sched_core::editor::PendingSelection,
            sched_core::reconcile::CommitReport, sched_core::reconcile::ItemOutcome,
            sessions::SessionId, sessions::SessionView, sessions::DayView, sessions::CellView,
            routes::health::Health,
            routes::sessions::OpenSession,
            routes::sessions::SlotsOut,
            routes::sessions::Chosen,
            routes::sessions::Done
        )),
        tags(
            (name = "schedgrid", description = "Weekly schedule editing API")
        )
    )]
struct ApiDoc;

pub fn router(app_state: state::AppState) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/sessions", post(routes::sessions::open))
        .route("/v1/sessions/:id", get(routes::sessions::view).delete(routes::sessions::close))
        .route("/v1/sessions/:id/begin", post(routes::sessions::begin))
        .route("/v1/sessions/:id/choose", post(routes::sessions::choose))
        .route("/v1/sessions/:id/cancel", post(routes::sessions::cancel))
        .route("/v1/sessions/:id/undo", post(routes::sessions::undo))
        .route("/v1/sessions/:id/commit", post(routes::sessions::commit))
        .route("/v1/sessions/:id/placements/:placement", delete(routes::sessions::remove))
        .route("/v1/sessions/:id/placements/:placement/move", post(routes::sessions::begin_move))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let cfg = config::Config::from_env()?;
    let app = router(state::AppState::from_config(&cfg)?);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, cache_ttl = ?cfg.cache_ttl, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
