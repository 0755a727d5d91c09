use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Article,
    Book,
    Podcast,
}

/// Normalized entry produced by a content provider adapter. Never persisted;
/// lives for one aggregation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub subtitle: String,
    pub source_kind: SourceKind,
}

/// Bearer token obtained from the podcast platform. No local expiry; a dead
/// token surfaces as an empty podcast feed on the next fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpotifyToken {
    pub value: String,
    pub acquired_at: DateTime<Utc>,
}

impl SpotifyToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            acquired_at: Utc::now(),
        }
    }
}

/// Phase of the current aggregation cycle.
///
/// Unauthenticated -> LoadingBase -> one of
/// {AwaitingSpotifyAuth, ExchangingToken -> LoadingPodcasts, LoadingPodcasts}
/// -> Ready
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPhase {
    Unauthenticated,
    LoadingBase,
    AwaitingSpotifyAuth,
    ExchangingToken,
    LoadingPodcasts,
    Ready,
}

impl AggregationPhase {
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            AggregationPhase::LoadingBase
                | AggregationPhase::ExchangingToken
                | AggregationPhase::LoadingPodcasts
        )
    }
}

/// Navigation the shell should perform on behalf of the aggregation
/// controller. The controller itself never navigates.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthAction {
    None,
    RedirectToLogin { return_to: String },
    RedirectToProviderAuth { url: String },
}

/// Best-effort snapshot of the three feeds for one aggregation cycle.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResourceSnapshot {
    pub articles: Vec<ContentItem>,
    pub books: Vec<ContentItem>,
    pub podcasts: Vec<ContentItem>,
    pub spotify_connected: bool,
}
