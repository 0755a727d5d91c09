use crate::models::SpotifyToken;
use std::collections::HashMap;
use std::sync::RwLock;

/// Session-scoped storage for the podcast-platform credentials: one token
/// slot and one return-URL slot per session. Injected into the aggregator so
/// the orchestration logic stays free of ambient state.
pub trait TokenStore: Send + Sync {
    fn token(&self, session: &str) -> Option<SpotifyToken>;
    fn store_token(&self, session: &str, token: SpotifyToken);
    fn return_url(&self, session: &str) -> Option<String>;
    fn store_return_url(&self, session: &str, url: String);
}

#[derive(Debug, Default, Clone)]
struct SessionSlots {
    token: Option<SpotifyToken>,
    return_url: Option<String>,
}

/// In-memory store keyed by session id. Writes happen once per token
/// exchange; reads happen on every aggregation cycle.
#[derive(Default)]
pub struct SessionTokenStore {
    sessions: RwLock<HashMap<String, SessionSlots>>,
}

impl SessionTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for SessionTokenStore {
    fn token(&self, session: &str) -> Option<SpotifyToken> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session)
            .and_then(|slots| slots.token.clone())
    }

    fn store_token(&self, session: &str, token: SpotifyToken) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(session.to_string())
            .or_default()
            .token = Some(token);
    }

    fn return_url(&self, session: &str) -> Option<String> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session)
            .and_then(|slots| slots.return_url.clone())
    }

    fn store_return_url(&self, session: &str, url: String) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(session.to_string())
            .or_default()
            .return_url = Some(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_slot_is_per_session() {
        let store = SessionTokenStore::new();
        store.store_token("alice", SpotifyToken::new("tok1"));

        assert_eq!(store.token("alice").map(|t| t.value), Some("tok1".into()));
        assert!(store.token("bob").is_none());
    }

    #[test]
    fn storing_again_replaces_the_token() {
        let store = SessionTokenStore::new();
        store.store_token("alice", SpotifyToken::new("tok1"));
        store.store_token("alice", SpotifyToken::new("tok2"));

        assert_eq!(store.token("alice").map(|t| t.value), Some("tok2".into()));
    }

    #[test]
    fn return_url_does_not_disturb_token_slot() {
        let store = SessionTokenStore::new();
        store.store_token("alice", SpotifyToken::new("tok1"));
        store.store_return_url("alice", "/resources?code=abc".into());

        assert_eq!(store.token("alice").map(|t| t.value), Some("tok1".into()));
        assert_eq!(
            store.return_url("alice").as_deref(),
            Some("/resources?code=abc")
        );
    }
}
