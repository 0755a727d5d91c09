use crate::models::{ContentItem, SourceKind, SpotifyToken};
use crate::services::aggregator::PodcastGateway;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use serde::Deserialize;

const SEARCH_LIMIT: u32 = 10;
const SEARCH_MARKET: &str = "US";
const AUTH_SCOPES: &str = "user-library-read playlist-read-private";

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    accounts_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    topic: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    shows: ShowPage,
}

#[derive(Debug, Deserialize)]
struct ShowPage {
    items: Vec<Show>,
}

#[derive(Debug, Deserialize)]
struct Show {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: String,
}

impl SpotifyClient {
    pub fn new(
        accounts_url: String,
        api_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        topic: String,
    ) -> Self {
        Self {
            accounts_url,
            api_url,
            client_id,
            client_secret,
            redirect_uri,
            topic,
            client: Client::new(),
        }
    }

    async fn request_token(&self, code: &str) -> anyhow::Result<SpotifyToken> {
        let url = format!("{}/api/token", self.accounts_url);
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("token endpoint returned status: {}", response.status());
        }

        let data: TokenResponse = response.json().await?;
        Ok(SpotifyToken::new(data.access_token))
    }

    async fn search(&self, token: &SpotifyToken) -> anyhow::Result<Vec<Show>> {
        let url = format!("{}/v1/search", self.api_url);

        tracing::debug!("Fetching Spotify podcasts: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token.value)
            .query(&[
                ("q", self.topic.as_str()),
                ("type", "show"),
                ("market", SEARCH_MARKET),
                ("limit", &SEARCH_LIMIT.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "API returned status: {} - {}",
                status,
                &body[..std::cmp::min(200, body.len())]
            );
        }

        let body = response.text().await?;
        parse_search_body(&body)
    }
}

fn parse_search_body(body: &str) -> anyhow::Result<Vec<Show>> {
    let data: SearchEnvelope = serde_json::from_str(body)?;
    Ok(data.shows.items)
}

/// A show is renderable only with an id, a name, and a playable link.
/// Anything else is dropped without comment.
fn normalize(shows: Vec<Show>) -> Vec<ContentItem> {
    shows
        .into_iter()
        .filter(|show| {
            !show.id.is_empty() && !show.name.is_empty() && !show.external_urls.spotify.is_empty()
        })
        .map(|show| ContentItem {
            id: show.id,
            title: show.name,
            url: show.external_urls.spotify,
            subtitle: show.description,
            source_kind: SourceKind::Podcast,
        })
        .collect()
}

#[async_trait]
impl PodcastGateway for SpotifyClient {
    /// Single-attempt exchange of an authorization code for a bearer token.
    /// Any failure degrades to `None`; the caller treats that as "feed
    /// unavailable this cycle".
    async fn exchange_code(&self, code: &str) -> Option<SpotifyToken> {
        match self.request_token(code).await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Spotify token exchange failed: {:#}", e);
                None
            }
        }
    }

    async fn search_shows(&self, token: &SpotifyToken) -> Vec<ContentItem> {
        if token.value.is_empty() {
            tracing::warn!("No Spotify access token provided");
            return Vec::new();
        }

        match self.search(token).await {
            Ok(shows) => {
                tracing::debug!("Spotify returned {} shows", shows.len());
                normalize(shows)
            }
            Err(e) => {
                tracing::warn!("Spotify fetch failed: {:#}", e);
                Vec::new()
            }
        }
    }

    fn authorize_url(&self) -> String {
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();

        let mut url = Url::parse(&self.accounts_url)
            .and_then(|base| base.join("/authorize"))
            .unwrap_or_else(|e| {
                tracing::error!("Invalid Spotify accounts URL {}: {}", self.accounts_url, e);
                Url::parse("https://accounts.spotify.com/authorize").unwrap()
            });
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", AUTH_SCOPES)
            .append_pair("state", &state);
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(id: &str, name: &str, link: &str) -> Show {
        Show {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            external_urls: ExternalUrls {
                spotify: link.into(),
            },
        }
    }

    #[test]
    fn maps_shows_into_content_items() {
        let body = r#"{
            "shows": {
                "total": 1,
                "items": [
                    {
                        "id": "abc123",
                        "name": "Recovery Elevator",
                        "description": "Stories from people getting sober.",
                        "images": [{"url": "https://i.scdn.co/image/x"}],
                        "external_urls": {"spotify": "https://open.spotify.com/show/abc123"}
                    }
                ]
            }
        }"#;

        let items = normalize(parse_search_body(body).unwrap());

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "abc123");
        assert_eq!(items[0].title, "Recovery Elevator");
        assert_eq!(items[0].url, "https://open.spotify.com/show/abc123");
        assert_eq!(items[0].subtitle, "Stories from people getting sober.");
        assert_eq!(items[0].source_kind, SourceKind::Podcast);
    }

    #[test]
    fn shows_missing_required_fields_are_dropped() {
        let shows = vec![
            show("ok", "Keeps", "https://open.spotify.com/show/ok"),
            show("", "No id", "https://open.spotify.com/show/x"),
            show("no-name", "", "https://open.spotify.com/show/y"),
            show("no-link", "No link", ""),
        ];

        let items = normalize(shows);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "ok");
    }

    #[test]
    fn missing_shows_field_is_an_error() {
        assert!(parse_search_body(r#"{"error": {"status": 401}}"#).is_err());
    }

    #[test]
    fn authorize_url_carries_client_and_redirect() {
        let client = SpotifyClient::new(
            "https://accounts.spotify.com".into(),
            "https://api.spotify.com".into(),
            "client-id".into(),
            "shh".into(),
            "http://localhost:3000/resources".into(),
            "addiction recovery".into(),
        );

        let url = Url::parse(&client.authorize_url()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/authorize");
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(
            pairs.get("redirect_uri").map(String::as_str),
            Some("http://localhost:3000/resources")
        );
        assert_eq!(pairs.get("state").map(String::len), Some(16));
    }
}
