//! Installation route handlers
//!
//! Thin adapters over the [`Installer`](crate::install::Installer): parse the
//! stage the client is on, run the view or the action, render JSON.

use crate::db::ConnectionFactory;
use crate::error::{ApiResult, AppError};
use crate::install::orchestrator::{InstallStatus, StageView};
use crate::install::types::{PipelineStage, PipelineState};
use crate::models::{AdvanceRequest, AdvanceResponse, StageQuery};
use crate::state::SharedState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

fn parse_stage(stage: u8) -> ApiResult<PipelineState> {
    PipelineStage::try_from(stage)
        .map(PipelineState::at)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// GET /install?stage=N
///
/// Describe a stage without running its action. Defaults to stage 1.
pub async fn view_stage<F: ConnectionFactory + 'static>(
    State(state): State<SharedState<F>>,
    query: Result<Query<StageQuery>, QueryRejection>,
) -> ApiResult<Json<StageView>> {
    let Query(query) = query?;
    let pipeline = match query.stage {
        Some(stage) => parse_stage(stage)?,
        None => PipelineState::fresh(),
    };
    Ok(Json(state.installer.view(pipeline).await))
}

/// POST /install/advance
///
/// Run the stage action. 200 with the next stage on success, 422 with the
/// unchanged stage and the error list on failure.
pub async fn advance_stage<F: ConnectionFactory + 'static>(
    State(state): State<SharedState<F>>,
    payload: Result<Json<AdvanceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AdvanceResponse>)> {
    let Json(request) = payload?;
    let pipeline = parse_stage(request.stage)?;
    let outcome = state.installer.advance(pipeline, request.into_action()).await;

    let status = if outcome.advanced {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(AdvanceResponse::from(outcome))))
}

/// GET /install/status
pub async fn install_status<F: ConnectionFactory + 'static>(
    State(state): State<SharedState<F>>,
) -> Json<InstallStatus> {
    Json(state.installer.status().await)
}
