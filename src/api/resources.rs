use crate::api::middleware::{MaybeAuth, RequireAuth};
use crate::error::Result;
use crate::models::{AggregationPhase, AuthAction, ResourceSnapshot};
use crate::services::aggregator::{CycleInput, CycleOutcome, PodcastGateway};
use crate::services::{
    AuthService, CheckinService, ForumService, ResourceAggregator, SpotifyClient,
};
use axum::{
    body::Body,
    extract::{OriginalUri, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Token-store key for callers who have no session yet; stands in for the
/// pre-login browser session.
const ANONYMOUS_SESSION: &str = "anonymous";

pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub aggregator: Arc<ResourceAggregator>,
    pub spotify: Arc<SpotifyClient>,
    pub forum: Arc<ForumService>,
    pub checkins: Arc<CheckinService>,
}

#[derive(Debug, Deserialize)]
struct ResourceQuery {
    /// Authorization code from a completed OAuth redirect.
    code: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResourceStatus {
    phase: AggregationPhase,
    is_loading: bool,
    #[serde(flatten)]
    snapshot: ResourceSnapshot,
}

pub fn resource_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resources", get(get_resources))
        .route("/resources/status", get(resource_status))
        .route("/resources/connect", get(connect_spotify))
}

/// One aggregation cycle. Unauthenticated callers get 401 plus the redirect
/// action; the SPA owns the actual navigation.
async fn get_resources(
    State(state): State<Arc<AppState>>,
    MaybeAuth(claims): MaybeAuth,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ResourceQuery>,
) -> Result<Response> {
    let session = claims
        .as_ref()
        .map(|c| c.sub.to_string())
        .unwrap_or_else(|| ANONYMOUS_SESSION.to_string());

    let outcome: CycleOutcome = state
        .aggregator
        .run_cycle(CycleInput {
            session: &session,
            authenticated: claims.is_some(),
            code: query.code.as_deref(),
            current_url: &uri.to_string(),
        })
        .await;

    let status = match outcome.action {
        AuthAction::RedirectToLogin { .. } => StatusCode::UNAUTHORIZED,
        _ => StatusCode::OK,
    };

    Ok((status, Json(outcome)).into_response())
}

/// Phase and last published snapshot, for the view layer's loading state.
async fn resource_status(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
) -> Result<Json<ResourceStatus>> {
    let phase = *state.aggregator.phase().borrow();
    let snapshot = state.aggregator.latest().await;

    Ok(Json(ResourceStatus {
        phase,
        is_loading: phase.is_loading(),
        snapshot,
    }))
}

/// Kick off the Spotify authorization round trip.
async fn connect_spotify(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
) -> Result<Response> {
    let url = state.spotify.authorize_url();

    Ok(Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(header::LOCATION, url)
        .body(Body::empty())
        .unwrap())
}
