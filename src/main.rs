mod api;
mod config;
mod error;
mod frontend;
mod models;
mod services;

use crate::api::resources::AppState;
use crate::config::Config;
use crate::services::{
    AuthService, CheckinService, ForumService, GuardianClient, OpenLibraryClient,
    ResourceAggregator, SessionTokenStore, SpotifyClient,
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recovery_hub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = PgPoolOptions::new()
        .max_connections(50)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    // Initialize services
    let guardian = Arc::new(GuardianClient::new(
        config.guardian_base_url.clone(),
        config.guardian_api_key.clone(),
        config.search_topic.clone(),
    ));
    let open_library = Arc::new(OpenLibraryClient::new(
        config.open_library_base_url.clone(),
        config.search_topic.clone(),
    ));
    let spotify = Arc::new(SpotifyClient::new(
        config.spotify_accounts_url.clone(),
        config.spotify_api_url.clone(),
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        config.spotify_redirect_uri.clone(),
        config.search_topic.clone(),
    ));
    let token_store = Arc::new(SessionTokenStore::new());

    let auth_service = Arc::new(AuthService::new(db.clone(), &config));
    let aggregator = Arc::new(ResourceAggregator::new(
        guardian,
        open_library,
        spotify.clone(),
        token_store,
    ));
    let forum = Arc::new(ForumService::new(db.clone()));
    let checkins = Arc::new(CheckinService::new(db.clone()));

    let app_state = Arc::new(AppState {
        auth_service: auth_service.clone(),
        aggregator: aggregator.clone(),
        spotify: spotify.clone(),
        forum: forum.clone(),
        checkins: checkins.clone(),
    });

    // CORS - explicit origins from config, "*" for development
    let cors = if config.cors_origins.iter().any(|o| o.as_str() == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Build router
    let app = Router::new()
        // API routes
        .nest(
            "/api/v1",
            Router::new()
                .nest("/auth", api::auth_routes())
                .nest("/checkins", api::checkin_routes())
                .nest("/forum", api::forum_routes())
                .merge(api::resource_routes())
                .with_state(app_state.clone()),
        )
        // Frontend SPA - catch-all route (must be last)
        .fallback(get(frontend::serve_frontend))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(cors);

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
