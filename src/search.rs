use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;
use url::Url;

use crate::config::SearchCredentials;
use crate::error::SearchError;

const CUSTOM_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

pub type SearchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>, SearchError>> + 'a>>;

pub trait WebSearch {
    fn search<'a>(&'a self, query: &'a str) -> SearchFuture<'a>;
}

pub fn join_snippets(snippets: &[String]) -> String {
    snippets.join("\n")
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    snippet: Option<String>,
}

pub struct GoogleSearch<'a> {
    client: &'a Client,
    credentials: Option<&'a SearchCredentials>,
    endpoint: String,
}

impl<'a> GoogleSearch<'a> {
    pub fn new(client: &'a Client, credentials: Option<&'a SearchCredentials>) -> Self {
        Self {
            client,
            credentials,
            endpoint: CUSTOM_SEARCH_ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn request_url(&self, credentials: &SearchCredentials, query: &str) -> Result<Url, SearchError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("key", credentials.api_key.as_str()),
                ("cx", credentials.engine_id.as_str()),
                ("q", query),
            ],
        )
        .map_err(|err| SearchError::Request(format!("invalid search endpoint: {err}")))
    }

    async fn fetch(&self, query: &str) -> Result<Vec<String>, SearchError> {
        let credentials = self.credentials.ok_or(SearchError::MissingCredentials)?;
        let url = self.request_url(credentials, query)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| SearchError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Request(format!("HTTP {status}: {body}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|err| SearchError::Request(format!("invalid response body: {err}")))?;
        let snippets = snippets_of(parsed);
        debug!(query, result_count = snippets.len(), "web search completed");
        if snippets.is_empty() {
            return Err(SearchError::NoResults);
        }
        Ok(snippets)
    }
}

impl WebSearch for GoogleSearch<'_> {
    fn search<'b>(&'b self, query: &'b str) -> SearchFuture<'b> {
        Box::pin(self.fetch(query))
    }
}

fn snippets_of(response: SearchResponse) -> Vec<String> {
    response
        .items
        .into_iter()
        .filter_map(|item| item.snippet)
        .map(|snippet| snippet.trim().to_string())
        .filter(|snippet| !snippet.is_empty())
        .collect()
}
