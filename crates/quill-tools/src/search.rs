use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use quill_core::canvas::Resource;
use quill_core::config::SearchConfig;
use quill_core::error::{QuillError, Result};
use quill_core::traits::Searcher;

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Web search through the Tavily API; each hit becomes a [`Resource`].
pub struct TavilySearcher {
    api_key: String,
    max_results: u32,
    http: reqwest::Client,
}

impl TavilySearcher {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            max_results: config.max_results,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Deserialize)]
struct TavilyHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyHit> for Resource {
    fn from(hit: TavilyHit) -> Self {
        let title = if hit.title.is_empty() {
            hit.url.clone()
        } else {
            hit.title
        };
        let description: String = hit.content.chars().take(280).collect();
        Resource::new(hit.url, title, description)
    }
}

fn parse_response(body: TavilyResponse) -> Vec<Resource> {
    body.results
        .into_iter()
        .filter(|hit| !hit.url.is_empty())
        .map(Resource::from)
        .collect()
}

impl Searcher for TavilySearcher {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Resource>>> {
        Box::pin(async move {
            debug!(query, max_results = self.max_results, "Searching");

            let resp = self
                .http
                .post(TAVILY_URL)
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": self.max_results,
                }))
                .send()
                .await
                .map_err(|e| QuillError::Search(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(QuillError::Search(format!("HTTP {} for '{}'", status, query)));
            }

            let body: TavilyResponse = resp
                .json()
                .await
                .map_err(|e| QuillError::Search(e.to_string()))?;

            Ok(parse_response(body))
        })
    }
}
