use crate::models::{ContentItem, SourceKind};
use crate::services::aggregator::ContentFeed;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Matches the page size the resources view renders.
const RESULT_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    base_url: String,
    topic: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryResponse {
    docs: Vec<OpenLibraryDoc>,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryDoc {
    key: String,
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
}

impl OpenLibraryClient {
    pub fn new(base_url: String, topic: String) -> Self {
        Self {
            base_url,
            topic,
            client: Client::new(),
        }
    }

    async fn search(&self) -> anyhow::Result<Vec<OpenLibraryDoc>> {
        let url = format!("{}/search.json", self.base_url);

        tracing::debug!("Fetching Open Library books: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.topic.as_str()),
                ("limit", &RESULT_LIMIT.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("API returned status: {}", response.status());
        }

        let body = response.text().await?;
        parse_search_body(&body)
    }
}

fn parse_search_body(body: &str) -> anyhow::Result<Vec<OpenLibraryDoc>> {
    let data: OpenLibraryResponse = serde_json::from_str(body)?;
    Ok(data.docs)
}

fn normalize(docs: Vec<OpenLibraryDoc>) -> Vec<ContentItem> {
    docs.into_iter()
        .map(|doc| {
            let subtitle = if doc.author_name.is_empty() {
                "Unknown".to_string()
            } else {
                doc.author_name.join(", ")
            };

            ContentItem {
                url: format!("https://openlibrary.org{}", doc.key),
                id: doc.key,
                title: doc.title,
                subtitle,
                source_kind: SourceKind::Book,
            }
        })
        .collect()
}

#[async_trait]
impl ContentFeed for OpenLibraryClient {
    async fn fetch(&self) -> Vec<ContentItem> {
        match self.search().await {
            Ok(docs) => {
                tracing::debug!("Open Library returned {} books", docs.len());
                normalize(docs)
            }
            Err(e) => {
                tracing::warn!("Open Library fetch failed: {:#}", e);
                Vec::new()
            }
        }
    }
}
