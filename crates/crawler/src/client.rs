//! OpenAlex catalog client
//!
//! Builds collection and single-entity URLs and validates collection pages
//! on top of the request executor.

use crate::executor::{RequestExecutor, RetryPolicy};
use citeforge_common::errors::{AppError, ErrorCode, Result};
use citeforge_common::metrics::CallProfile;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

/// Pagination metadata of a collection response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionMeta {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// One page of a collection query
#[derive(Debug, Clone)]
pub struct CollectionPage {
    pub meta: CollectionMeta,
    pub results: Vec<Value>,
}

impl CollectionPage {
    /// Validate a collection response body
    fn from_json(mut body: Value) -> Result<Self> {
        let meta = body
            .get_mut("meta")
            .map(Value::take)
            .ok_or_else(|| AppError::malformed("response has no meta"))?;
        let meta: CollectionMeta = serde_json::from_value(meta)
            .map_err(|e| AppError::malformed(format!("unreadable meta: {}", e)))?;

        let results = match body.get_mut("results").map(Value::take) {
            Some(Value::Array(results)) => results,
            _ => return Err(AppError::malformed("response has no results array")),
        };

        Ok(Self { meta, results })
    }

    /// Next cursor, if the server reported a non-empty one
    pub fn next_cursor(&self) -> Option<&str> {
        self.meta.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Client for one catalog host
#[derive(Clone)]
pub struct CatalogClient {
    base_url: Url,
    mailto: Option<String>,
    executor: RequestExecutor,
}

impl CatalogClient {
    /// Create a client; the base URL must be an http(s) URL
    pub fn new(base_url: &str, mailto: Option<String>, executor: RequestExecutor) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AppError::InvalidRequest {
            message: format!("invalid base URL '{}': {}", base_url, e),
        })?;

        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::InvalidRequest {
                message: format!("base URL '{}' is not an http(s) URL", base_url),
            });
        }

        Ok(Self {
            base_url,
            mailto: mailto.filter(|m| !m.is_empty()),
            executor,
        })
    }

    pub fn mailto(&self) -> Option<&str> {
        self.mailto.as_deref()
    }

    pub fn profile(&self) -> &CallProfile {
        self.executor.profile()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    fn entity_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::InvalidRequest {
                message: format!("cannot extend base URL '{}'", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `<base>/<entity_type>?<params>`
    pub fn collection_url(&self, entity_type: &str, params: &[(String, String)]) -> Result<Url> {
        let mut url = self.entity_url(&[entity_type])?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// `<base>/<entity_type>/<id>`, with `mailto` when configured
    pub fn single_url(&self, entity_type: &str, id: &str) -> Result<Url> {
        if id.trim().is_empty() {
            return Err(AppError::InvalidRequest {
                message: "empty entity identifier".to_string(),
            });
        }

        let mut url = self.entity_url(&[entity_type, id.trim()])?;
        if let Some(mailto) = &self.mailto {
            url.query_pairs_mut().append_pair("mailto", mailto);
        }
        Ok(url)
    }

    /// Fetch and validate one collection page
    ///
    /// Any failure is fatal for the retrieval that asked for the page.
    pub async fn fetch_collection(
        &self,
        entity_type: &str,
        params: &[(String, String)],
        rate_interval: Duration,
    ) -> Result<CollectionPage> {
        let url = self.collection_url(entity_type, params)?;
        let policy: RetryPolicy = self.executor.policy().with_rate_interval(rate_interval);

        let body = self
            .executor
            .fetch_with(&url, &policy)
            .await
            .ok_or_else(|| AppError::Upstream {
                message: format!("Failed OpenAlex API call: {}", url),
            })?;

        if let Some(api_error) = body.get("error") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(|m| format!("{} -- {}", display_value(api_error), m))
                .unwrap_or_else(|| display_value(api_error));

            self.profile().track_error(ErrorCode::ClientError);
            error!(entity_type, url = %url, error = %message, "OpenAlex API error");
            return Err(AppError::Upstream {
                message: format!("OpenAlex API error for '{}': {}", entity_type, message),
            });
        }

        CollectionPage::from_json(body).map_err(|err| {
            self.profile().track_error(err.code());
            error!(entity_type, url = %url, error = %err, "Unusable collection response");
            err
        })
    }

    /// Fetch a single work; `None` when the executor gave up
    pub async fn fetch_work(&self, id: &str) -> Result<Option<Value>> {
        let url = self.single_url(crate::query::WORKS, id)?;
        Ok(self.executor.fetch(&url).await)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
