//! HTTP search backend speaking the Azure AI Search REST dialect.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{transport_error, SearchBackend, SearchHit, SearchRequest};
use crate::error::{BackendError, BackendResult};

const DEFAULT_API_VERSION: &str = "2023-11-01";

/// Search client posting to `{endpoint}/indexes/{index}/docs/search`.
pub struct HttpSearchBackend {
    endpoint: String,
    index_name: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl HttpSearchBackend {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            client,
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index_name, self.api_version
        )
    }

    fn request_body(request: &SearchRequest) -> serde_json::Value {
        serde_json::json!({
            "search": request.query_text,
            "searchFields": request.search_fields.join(","),
            "select": request.select_fields.join(","),
            "top": request.top_k,
            "searchMode": request.mode.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    value: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "@search.score", default)]
    score: f64,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

fn parse_search_response(body: &str) -> BackendResult<Vec<SearchHit>> {
    let parsed: SearchResponseBody = serde_json::from_str(body)
        .map_err(|e| BackendError::MalformedResponse(format!("invalid search body: {e}")))?;

    Ok(parsed
        .value
        .into_iter()
        .map(|raw| SearchHit {
            id: raw.id.unwrap_or_default(),
            title: raw.title.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            category: raw.category.unwrap_or_default(),
            score: raw.score,
        })
        .collect())
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    fn name(&self) -> &str {
        "http-search"
    }

    async fn search(&self, request: &SearchRequest) -> BackendResult<Vec<SearchHit>> {
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_search_response(&body)
    }
}
