//! Crawl entry points
//!
//! Every top-level operation gets its own `CallProfile`, so counters never
//! leak between retrievals.

use crate::client::CatalogClient;
use crate::executor::{RequestExecutor, RetryPolicy};
use crate::pagination::EntityPages;
use crate::query::{RetrievalQuery, Setting};
use crate::transport::{ReqwestTransport, Sleeper, TokioSleeper, Transport};
use crate::traversal::{CitationTraversal, TraversalLimits};
use citeforge_common::config::AppConfig;
use citeforge_common::errors::Result;
use citeforge_common::metrics::CallProfile;
use std::sync::Arc;

/// Builds catalog clients and starts retrievals and traversals
pub struct Crawler {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl Crawler {
    /// Crawler talking to the configured catalog over HTTP
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.catalog)?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            Arc::new(TokioSleeper),
        ))
    }

    pub fn with_transport(
        config: &AppConfig,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config: config.clone(),
            transport,
            sleeper,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Client with a fresh profile
    fn client(&self) -> Result<CatalogClient> {
        let executor = RequestExecutor::new(
            self.transport.clone(),
            self.sleeper.clone(),
            RetryPolicy::try_from(&self.config.retry)?,
            CallProfile::new(),
        );
        CatalogClient::new(
            &self.config.catalog.base_url,
            self.config.catalog.mailto.clone(),
            executor,
        )
    }

    /// Open a bulk retrieval
    ///
    /// A query without its own cap or rate interval inherits the configured ones.
    pub async fn get_entities(&self, query: &RetrievalQuery) -> Result<EntityPages> {
        let mut query = query.clone();
        query.max_entities = Setting::Set(query.max_entities.resolve(self.config.crawl.max_entities));
        query.rate_interval = Setting::Set(query.rate_interval.resolve(self.config.retry.rate_interval()?));

        EntityPages::open(
            self.client()?,
            &query,
            self.config.crawl.page_size,
            self.config.crawl.offset_ceiling,
        )
        .await
    }

    /// Start a bounded BFS from `seeds`
    pub fn citation_bfs<I, S>(
        &self,
        seeds: I,
        max_depth: Option<usize>,
        max_nodes: Option<usize>,
    ) -> Result<CitationTraversal>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let limits = TraversalLimits {
            max_depth: max_depth.unwrap_or(self.config.crawl.max_depth),
            max_nodes: max_nodes.or(self.config.crawl.max_nodes),
        };
        Ok(CitationTraversal::new(self.client()?, seeds, limits))
    }
}
