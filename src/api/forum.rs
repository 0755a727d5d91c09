use crate::api::middleware::{MaybeAuth, RequireAuth};
use crate::api::resources::AppState;
use crate::error::{AppError, Result};
use crate::models::{Comment, CreateCommentRequest, CreatePostRequest, ForumPost, UserInfo};
use crate::services::forum::LikeStatus;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{stream::Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use validator::Validate;

pub fn forum_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id/like", post(toggle_like))
        .route("/posts/:id/comments", get(list_comments).post(add_comment))
        .route("/events", get(forum_events))
}

async fn list_posts(
    State(state): State<Arc<AppState>>,
    MaybeAuth(claims): MaybeAuth,
) -> Result<Json<Vec<ForumPost>>> {
    let posts = state.forum.list_posts(claims.map(|c| c.sub)).await?;
    Ok(Json(posts))
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<ForumPost>> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let author: UserInfo = state.auth_service.get_user_by_id(claims.sub).await?.into();
    let post = state.forum.create_post(&author, req).await?;
    Ok(Json(post))
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeStatus>> {
    let status = state.forum.toggle_like(id, claims.sub).await?;
    Ok(Json(status))
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>> {
    let comments = state.forum.list_comments(id).await?;
    Ok(Json(comments))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<Comment>> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let author: UserInfo = state.auth_service.get_user_by_id(claims.sub).await?.into();
    let comment = state.forum.add_comment(id, &author, req).await?;
    Ok(Json(comment))
}

/// Forum change notifications as SSE, the stand-in for the hosted database's
/// realtime channel the SPA used to subscribe to.
async fn forum_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut events = state.forum.subscribe();
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                // Missed events are fine; the client refetches on each one
                // anyway.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("SSE subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default()
            .event("forum")
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().comment("serialization failed")))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
