use crate::models::{
    AggregationPhase, AuthAction, ContentItem, ResourceSnapshot, SpotifyToken,
};
use crate::services::token_store::TokenStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// A no-auth content feed. Implementations swallow their own failures and
/// come back with an empty list.
#[async_trait]
pub trait ContentFeed: Send + Sync {
    async fn fetch(&self) -> Vec<ContentItem>;
}

/// The podcast platform: code-for-token exchange, bearer-authed show search,
/// and the user-facing authorization URL.
#[async_trait]
pub trait PodcastGateway: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Option<SpotifyToken>;
    async fn search_shows(&self, token: &SpotifyToken) -> Vec<ContentItem>;
    fn authorize_url(&self) -> String;
}

/// Inputs for one aggregation cycle, as seen at the HTTP edge.
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    pub session: &'a str,
    pub authenticated: bool,
    /// The `code` query parameter from a completed OAuth redirect, if any.
    pub code: Option<&'a str>,
    pub current_url: &'a str,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CycleOutcome {
    pub action: AuthAction,
    pub snapshot: Option<ResourceSnapshot>,
}

/// Orchestrates one best-effort pass over the three content feeds.
///
/// The two no-auth feeds are fetched concurrently; the podcast branch runs
/// after them and only when a token is cached or an authorization code
/// arrived. One provider's outage never blocks the others.
pub struct ResourceAggregator {
    articles: Arc<dyn ContentFeed>,
    books: Arc<dyn ContentFeed>,
    podcasts: Arc<dyn PodcastGateway>,
    tokens: Arc<dyn TokenStore>,
    phase_tx: watch::Sender<AggregationPhase>,
    latest: RwLock<ResourceSnapshot>,
    cycle: AtomicU64,
}

impl ResourceAggregator {
    pub fn new(
        articles: Arc<dyn ContentFeed>,
        books: Arc<dyn ContentFeed>,
        podcasts: Arc<dyn PodcastGateway>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(AggregationPhase::Unauthenticated);
        Self {
            articles,
            books,
            podcasts,
            tokens,
            phase_tx,
            latest: RwLock::new(ResourceSnapshot::default()),
            cycle: AtomicU64::new(0),
        }
    }

    /// Observe phase transitions of the newest cycle.
    pub fn phase(&self) -> watch::Receiver<AggregationPhase> {
        self.phase_tx.subscribe()
    }

    /// The last snapshot published by a completed, non-superseded cycle.
    pub async fn latest(&self) -> ResourceSnapshot {
        self.latest.read().await.clone()
    }

    pub async fn run_cycle(&self, input: CycleInput<'_>) -> CycleOutcome {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;

        if !input.authenticated {
            // Mid-OAuth redirects carry a single-use code; keep the return
            // URL so the login round trip can resume the exchange.
            if input.code.is_some() {
                self.tokens
                    .store_return_url(input.session, input.current_url.to_string());
            }
            self.set_phase(cycle, AggregationPhase::Unauthenticated);
            return CycleOutcome {
                action: AuthAction::RedirectToLogin {
                    return_to: input.current_url.to_string(),
                },
                snapshot: None,
            };
        }

        self.set_phase(cycle, AggregationPhase::LoadingBase);
        let (articles, books) = tokio::join!(self.articles.fetch(), self.books.fetch());

        let cached = self.tokens.token(input.session);
        let mut action = AuthAction::None;

        let podcasts = match (input.code, cached) {
            (Some(code), None) => {
                self.set_phase(cycle, AggregationPhase::ExchangingToken);
                match self.podcasts.exchange_code(code).await {
                    Some(token) => {
                        self.tokens.store_token(input.session, token.clone());
                        self.set_phase(cycle, AggregationPhase::LoadingPodcasts);
                        self.podcasts.search_shows(&token).await
                    }
                    // Exchange failed: podcast feed stays empty this cycle,
                    // no automatic retry.
                    None => Vec::new(),
                }
            }
            (_, Some(token)) => {
                self.set_phase(cycle, AggregationPhase::LoadingPodcasts);
                self.podcasts.search_shows(&token).await
            }
            (None, None) => {
                self.set_phase(cycle, AggregationPhase::AwaitingSpotifyAuth);
                action = AuthAction::RedirectToProviderAuth {
                    url: self.podcasts.authorize_url(),
                };
                Vec::new()
            }
        };

        let snapshot = ResourceSnapshot {
            articles,
            books,
            podcasts,
            spotify_connected: self.tokens.token(input.session).is_some(),
        };

        self.set_phase(cycle, AggregationPhase::Ready);
        self.publish(cycle, &snapshot).await;

        CycleOutcome {
            action,
            snapshot: Some(snapshot),
        }
    }

    /// Phase updates from superseded cycles are dropped so a stale fetch
    /// cannot wind the visible state machine backwards.
    fn set_phase(&self, cycle: u64, phase: AggregationPhase) {
        if self.cycle.load(Ordering::SeqCst) == cycle {
            self.phase_tx.send_replace(phase);
        }
    }

    async fn publish(&self, cycle: u64, snapshot: &ResourceSnapshot) {
        if self.cycle.load(Ordering::SeqCst) == cycle {
            *self.latest.write().await = snapshot.clone();
        } else {
            tracing::debug!("Aggregation cycle {} superseded, snapshot not published", cycle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use crate::services::token_store::SessionTokenStore;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn item(id: &str, kind: SourceKind) -> ContentItem {
        ContentItem {
            id: id.into(),
            title: format!("title-{}", id),
            url: format!("https://example.com/{}", id),
            subtitle: String::new(),
            source_kind: kind,
        }
    }

    /// Feed that returns a fixed list, optionally after a delay.
    struct FixedFeed {
        items: Vec<ContentItem>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedFeed {
        fn new(items: Vec<ContentItem>) -> Self {
            Self {
                items,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(items: Vec<ContentItem>, delay: Duration) -> Self {
            Self {
                items,
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentFeed for FixedFeed {
        async fn fetch(&self) -> Vec<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.items.clone()
        }
    }

    /// Feed that plays back a scripted (delay, items) response per call.
    struct SequenceFeed {
        responses: std::sync::Mutex<std::collections::VecDeque<(Duration, Vec<ContentItem>)>>,
    }

    impl SequenceFeed {
        fn new(responses: Vec<(Duration, Vec<ContentItem>)>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl ContentFeed for SequenceFeed {
        async fn fetch(&self) -> Vec<ContentItem> {
            let (delay, items) = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted fetch");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            items
        }
    }

    struct FakeGateway {
        exchange_result: Option<&'static str>,
        shows: Vec<ContentItem>,
        exchanges: AtomicUsize,
        searches: AtomicUsize,
        searched_with: std::sync::Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn new(exchange_result: Option<&'static str>, shows: Vec<ContentItem>) -> Self {
            Self {
                exchange_result,
                shows,
                exchanges: AtomicUsize::new(0),
                searches: AtomicUsize::new(0),
                searched_with: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PodcastGateway for FakeGateway {
        async fn exchange_code(&self, _code: &str) -> Option<SpotifyToken> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            self.exchange_result.map(SpotifyToken::new)
        }

        async fn search_shows(&self, token: &SpotifyToken) -> Vec<ContentItem> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            self.searched_with.lock().unwrap().push(token.value.clone());
            self.shows.clone()
        }

        fn authorize_url(&self) -> String {
            "https://accounts.example.com/authorize?client_id=x".into()
        }
    }

    fn aggregator(
        articles: Arc<FixedFeed>,
        books: Arc<FixedFeed>,
        gateway: Arc<FakeGateway>,
    ) -> (ResourceAggregator, Arc<SessionTokenStore>) {
        let store = Arc::new(SessionTokenStore::new());
        let agg = ResourceAggregator::new(articles, books, gateway, store.clone());
        (agg, store)
    }

    fn input<'a>(authenticated: bool, code: Option<&'a str>) -> CycleInput<'a> {
        CycleInput {
            session: "sess",
            authenticated,
            code,
            current_url: "http://localhost:3000/resources",
        }
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_affect_the_others() {
        // Guardian "fails" (adapter already degraded it to empty), Open
        // Library returns five books.
        let articles = Arc::new(FixedFeed::new(vec![]));
        let books = Arc::new(FixedFeed::new(
            (0..5)
                .map(|i| item(&format!("b{}", i), SourceKind::Book))
                .collect(),
        ));
        let gateway = Arc::new(FakeGateway::new(None, vec![]));
        let (agg, _) = aggregator(articles, books, gateway);

        let outcome = agg.run_cycle(input(true, None)).await;
        let snapshot = outcome.snapshot.unwrap();

        assert!(snapshot.articles.is_empty());
        assert_eq!(snapshot.books.len(), 5);
    }

    #[tokio::test]
    async fn code_without_cached_token_exchanges_once_then_fetches() {
        let articles = Arc::new(FixedFeed::new(vec![]));
        let books = Arc::new(FixedFeed::new(vec![]));
        let gateway = Arc::new(FakeGateway::new(
            Some("tok1"),
            vec![item("p1", SourceKind::Podcast)],
        ));
        let (agg, store) = aggregator(articles, books, gateway.clone());

        let outcome = agg.run_cycle(input(true, Some("abc123"))).await;
        let snapshot = outcome.snapshot.unwrap();

        assert_eq!(gateway.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.searches.load(Ordering::SeqCst), 1);
        assert_eq!(store.token("sess").map(|t| t.value), Some("tok1".into()));
        assert_eq!(*gateway.searched_with.lock().unwrap(), vec!["tok1"]);
        assert_eq!(snapshot.podcasts.len(), 1);
        assert!(snapshot.spotify_connected);

        // Second mount with the token cached and no code: no new exchange,
        // podcasts fetched directly with the cached token.
        let outcome = agg.run_cycle(input(true, None)).await;

        assert_eq!(gateway.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.searches.load(Ordering::SeqCst), 2);
        assert_eq!(*gateway.searched_with.lock().unwrap(), vec!["tok1", "tok1"]);
        assert!(outcome.snapshot.unwrap().spotify_connected);
    }

    #[tokio::test]
    async fn cached_token_skips_the_exchange() {
        let articles = Arc::new(FixedFeed::new(vec![]));
        let books = Arc::new(FixedFeed::new(vec![]));
        let gateway = Arc::new(FakeGateway::new(
            Some("never-used"),
            vec![item("p1", SourceKind::Podcast)],
        ));
        let (agg, store) = aggregator(articles, books, gateway.clone());
        store.store_token("sess", SpotifyToken::new("cached"));

        let outcome = agg.run_cycle(input(true, None)).await;

        assert_eq!(gateway.exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.searches.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.action, AuthAction::None);
        assert_eq!(outcome.snapshot.unwrap().podcasts.len(), 1);
    }

    #[tokio::test]
    async fn failed_exchange_degrades_only_the_podcast_feed() {
        let articles = Arc::new(FixedFeed::new(vec![item("a1", SourceKind::Article)]));
        let books = Arc::new(FixedFeed::new(vec![item("b1", SourceKind::Book)]));
        let gateway = Arc::new(FakeGateway::new(None, vec![item("p1", SourceKind::Podcast)]));
        let (agg, store) = aggregator(articles, books, gateway.clone());

        let outcome = agg.run_cycle(input(true, Some("bad-code"))).await;
        let snapshot = outcome.snapshot.unwrap();

        assert_eq!(gateway.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.searches.load(Ordering::SeqCst), 0);
        assert!(store.token("sess").is_none());
        assert_eq!(snapshot.articles.len(), 1);
        assert_eq!(snapshot.books.len(), 1);
        assert!(snapshot.podcasts.is_empty());
        assert!(!snapshot.spotify_connected);
    }

    #[tokio::test]
    async fn no_code_and_no_token_yields_the_connect_action() {
        let articles = Arc::new(FixedFeed::new(vec![]));
        let books = Arc::new(FixedFeed::new(vec![]));
        let gateway = Arc::new(FakeGateway::new(None, vec![]));
        let (agg, _) = aggregator(articles, books, gateway.clone());

        let outcome = agg.run_cycle(input(true, None)).await;

        assert_eq!(gateway.searches.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome.action,
            AuthAction::RedirectToProviderAuth { .. }
        ));
        assert!(!outcome.snapshot.unwrap().spotify_connected);
    }

    #[tokio::test]
    async fn unauthenticated_cycle_redirects_without_fetching() {
        let articles = Arc::new(FixedFeed::new(vec![item("a1", SourceKind::Article)]));
        let books = Arc::new(FixedFeed::new(vec![]));
        let gateway = Arc::new(FakeGateway::new(None, vec![]));
        let (agg, store) = aggregator(articles.clone(), books, gateway);

        let outcome = agg.run_cycle(input(false, Some("abc123"))).await;

        assert_eq!(articles.calls.load(Ordering::SeqCst), 0);
        assert!(outcome.snapshot.is_none());
        assert_eq!(
            outcome.action,
            AuthAction::RedirectToLogin {
                return_to: "http://localhost:3000/resources".into()
            }
        );
        // The pending code's URL survives the login round trip.
        assert_eq!(
            store.return_url("sess").as_deref(),
            Some("http://localhost:3000/resources")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn phase_goes_loading_exactly_once_per_cycle() {
        // The sleeps give the collector task a chance to observe the phases
        // reached while fetches are in flight.
        let articles = Arc::new(FixedFeed::slow(vec![], Duration::from_millis(5)));
        let books = Arc::new(FixedFeed::slow(vec![], Duration::from_millis(5)));
        let gateway = Arc::new(FakeGateway::new(None, vec![]));
        let (agg, _) = aggregator(articles, books, gateway);

        let mut rx = agg.phase();
        let phases = Arc::new(std::sync::Mutex::new(vec![*rx.borrow()]));
        let collector = {
            let phases = phases.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    phases.lock().unwrap().push(*rx.borrow_and_update());
                }
            })
        };

        agg.run_cycle(input(true, None)).await;
        tokio::task::yield_now().await;
        collector.abort();

        let phases = phases.lock().unwrap().clone();
        let loading_flips = phases
            .windows(2)
            .filter(|w| !w[0].is_loading() && w[1].is_loading())
            .count();
        assert_eq!(loading_flips, 1);
        assert!(phases.contains(&AggregationPhase::LoadingBase));
        assert_eq!(*phases.last().unwrap(), AggregationPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_cycle_does_not_overwrite_newer_snapshot() {
        // First fetch hangs for five seconds and comes back with a stale
        // article; the second returns immediately with nothing.
        let articles = Arc::new(SequenceFeed::new(vec![
            (Duration::from_secs(5), vec![item("stale", SourceKind::Article)]),
            (Duration::ZERO, vec![]),
        ]));
        let books = Arc::new(FixedFeed::new(vec![]));
        let gateway = Arc::new(FakeGateway::new(None, vec![]));
        let store = Arc::new(SessionTokenStore::new());
        let agg = Arc::new(ResourceAggregator::new(articles, books, gateway, store));

        let stale = {
            let agg = agg.clone();
            tokio::spawn(async move { agg.run_cycle(input(true, None)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A newer cycle starts and finishes while the first is in flight.
        let fresh_snapshot = agg.run_cycle(input(true, None)).await.snapshot.unwrap();
        assert!(fresh_snapshot.articles.is_empty());

        let stale_outcome = stale.await.unwrap();

        // The stale cycle still hands its caller a snapshot, but the shared
        // state keeps the newer one.
        assert_eq!(stale_outcome.snapshot.unwrap().articles.len(), 1);
        assert_eq!(agg.latest().await, fresh_snapshot);
    }
}
