use crate::models::{ContentItem, SourceKind};
use crate::services::aggregator::ContentFeed;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct GuardianClient {
    base_url: String,
    api_key: String,
    topic: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GuardianEnvelope {
    response: GuardianResponse,
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    results: Vec<GuardianArticle>,
}

#[derive(Debug, Deserialize)]
struct GuardianArticle {
    id: String,
    #[serde(rename = "webTitle")]
    web_title: String,
    #[serde(rename = "webUrl")]
    web_url: String,
    #[serde(rename = "sectionName", default)]
    section_name: String,
}

impl GuardianClient {
    pub fn new(base_url: String, api_key: String, topic: String) -> Self {
        Self {
            base_url,
            api_key,
            topic,
            client: Client::new(),
        }
    }

    async fn search(&self) -> anyhow::Result<Vec<GuardianArticle>> {
        let url = format!("{}/search", self.base_url);

        tracing::debug!("Fetching Guardian articles: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", self.topic.as_str()), ("api-key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("API returned status: {}", response.status());
        }

        let body = response.text().await?;
        parse_search_body(&body)
    }
}

fn parse_search_body(body: &str) -> anyhow::Result<Vec<GuardianArticle>> {
    let data: GuardianEnvelope = serde_json::from_str(body)?;
    Ok(data.response.results)
}

fn normalize(articles: Vec<GuardianArticle>) -> Vec<ContentItem> {
    articles
        .into_iter()
        .map(|article| ContentItem {
            id: article.id,
            title: article.web_title,
            url: article.web_url,
            subtitle: article.section_name,
            source_kind: SourceKind::Article,
        })
        .collect()
}

#[async_trait]
impl ContentFeed for GuardianClient {
    async fn fetch(&self) -> Vec<ContentItem> {
        match self.search().await {
            Ok(articles) => {
                tracing::debug!("Guardian returned {} articles", articles.len());
                normalize(articles)
            }
            Err(e) => {
                tracing::warn!("Guardian fetch failed: {:#}", e);
                Vec::new()
            }
        }
    }
}
