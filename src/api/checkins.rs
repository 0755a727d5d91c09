use crate::api::middleware::RequireAuth;
use crate::api::resources::AppState;
use crate::error::{AppError, Result};
use crate::models::{CheckIn, CheckinSummary, CreateCheckinRequest};
use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

pub fn checkin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(history).post(create))
        .route("/summary", get(summary))
}

async fn create(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Json(req): Json<CreateCheckinRequest>,
) -> Result<Json<CheckIn>> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let checkin = state.checkins.create(claims.sub, req).await?;
    Ok(Json(checkin))
}

async fn history(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<CheckIn>>> {
    let checkins = state.checkins.history(claims.sub).await?;
    Ok(Json(checkins))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<CheckinSummary>> {
    let summary = state.checkins.summary(claims.sub).await?;
    Ok(Json(summary))
}
