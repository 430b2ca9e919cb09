//! Bounded breadth-first traversal of the citation relation
//!
//! Identifiers are marked visited when enqueued, so each one is fetched at
//! most once and cycles terminate. Depth of first discovery is final.

use crate::client::CatalogClient;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::metrics::{self, CallProfile};
use citeforge_common::models::{normalize_work_id, WorkRecord};
use futures::stream::{self, Stream};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info, instrument};

const SOURCE: &str = "bfs";

/// Why a traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_nodes` works were processed
    NodeBudget,
    /// Queue drained
    Exhausted,
}

/// Budgets bounding one traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalLimits {
    /// Works at this depth or deeper are never fetched
    pub max_depth: usize,
    /// Cap on successfully processed works
    pub max_nodes: Option<usize>,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_nodes: Some(10_000),
        }
    }
}

#[derive(Debug, Default)]
struct TraversalState {
    queue: VecDeque<(String, usize)>,
    visited: HashSet<String>,
    processed: usize,
}

impl TraversalState {
    /// Enqueue unless already seen
    fn discover(&mut self, id: &str, depth: usize) -> bool {
        if self.visited.contains(id) {
            return false;
        }
        self.visited.insert(id.to_string());
        self.queue.push_back((id.to_string(), depth));
        true
    }
}

/// Lazy BFS over works reachable from a seed set
pub struct CitationTraversal {
    client: CatalogClient,
    limits: TraversalLimits,
    state: TraversalState,
    stop_reason: Option<StopReason>,
}

impl CitationTraversal {
    /// Seeds may be short ids or catalog URLs; duplicates are enqueued once
    pub fn new<I, S>(client: CatalogClient, seeds: I, limits: TraversalLimits) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = TraversalState::default();
        for seed in seeds {
            match normalize_work_id(seed.as_ref()) {
                Some(id) => {
                    state.discover(&id, 0);
                }
                None => error!(seed = seed.as_ref(), "Ignoring blank seed identifier"),
            }
        }

        info!(
            seeds = state.queue.len(),
            max_depth = limits.max_depth,
            max_nodes = ?limits.max_nodes,
            "Starting citation traversal"
        );

        Self {
            client,
            limits,
            state,
            stop_reason: None,
        }
    }

    fn budget_met(&self) -> bool {
        self.limits
            .max_nodes
            .is_some_and(|max_nodes| self.state.processed >= max_nodes)
    }

    /// Next processed work, `Ok(None)` once a budget is met or the queue drains
    pub async fn next(&mut self) -> Result<Option<WorkRecord>> {
        loop {
            if self.stop_reason.is_some() {
                return Ok(None);
            }
            if self.budget_met() {
                info!(processed = self.state.processed, "Node budget reached");
                self.stop_reason = Some(StopReason::NodeBudget);
                return Ok(None);
            }

            let Some((id, depth)) = self.state.queue.pop_front() else {
                info!(processed = self.state.processed, "Citation traversal exhausted");
                self.stop_reason = Some(StopReason::Exhausted);
                return Ok(None);
            };

            if depth >= self.limits.max_depth {
                debug!(wid = %id, depth, "Depth limit reached, skipping");
                continue;
            }

            if let Some(record) = self.visit(&id, depth).await? {
                return Ok(Some(record));
            }
        }
    }

    /// Fetch one work and enqueue what it cites
    #[instrument(skip(self, id), fields(wid = %id))]
    async fn visit(&mut self, id: &str, depth: usize) -> Result<Option<WorkRecord>> {
        let Some(raw) = self.client.fetch_work(id).await? else {
            error!("Failed to fetch work, skipping");
            metrics::record_work(SOURCE, false);
            return Ok(None);
        };

        let record = match WorkRecord::from_json(raw) {
            Ok(record) => record,
            Err(AppError::MissingField { field }) => {
                error!(field = %field, "Work is missing a required field, skipping");
                metrics::record_work(SOURCE, false);
                return Ok(None);
            }
            Err(err) => {
                error!(error = %err, "Unusable work, skipping");
                metrics::record_work(SOURCE, false);
                return Ok(None);
            }
        };

        self.state.processed += 1;
        // the catalog may answer with a canonical id different from the one asked for
        self.state.visited.insert(record.external_id().to_string());

        let mut enqueued = 0;
        for cited in record.referenced_ids() {
            if self.state.discover(cited, depth + 1) {
                enqueued += 1;
            }
        }
        debug!(
            references = record.referenced_ids().len(),
            enqueued,
            processed = self.state.processed,
            "Processed work"
        );
        metrics::record_work(SOURCE, true);

        Ok(Some(record))
    }

    /// Works successfully processed so far
    pub fn processed(&self) -> usize {
        self.state.processed
    }

    /// `None` while the traversal can still produce works
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn profile(&self) -> &CallProfile {
        self.client.profile()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<WorkRecord>> {
        stream::try_unfold(self, |mut traversal| async move {
            Ok(traversal.next().await?.map(|record| (record, traversal)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{RequestExecutor, RetryPolicy};
    use crate::testing::{synthetic_work, RecordingSleeper, ScriptedTransport};
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::Arc;

    fn traversal(
        transport: Arc<ScriptedTransport>,
        seeds: &[&str],
        max_depth: usize,
        max_nodes: Option<usize>,
    ) -> CitationTraversal {
        let executor = RequestExecutor::new(
            transport,
            RecordingSleeper::new(),
            RetryPolicy::default(),
            CallProfile::new(),
        );
        let client = CatalogClient::new("https://api.openalex.org", None, executor).unwrap();
        CitationTraversal::new(
            client,
            seeds.iter().copied(),
            TraversalLimits {
                max_depth,
                max_nodes,
            },
        )
    }

    async fn ids(traversal: CitationTraversal) -> Vec<String> {
        let records: Vec<WorkRecord> = traversal.into_stream().try_collect().await.unwrap();
        records.iter().map(|r| r.external_id().to_string()).collect()
    }

    fn requested_ids(transport: &ScriptedTransport) -> Vec<String> {
        transport
            .requests()
            .iter()
            .map(|url| url.path_segments().unwrap().last().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_diamond_fetches_shared_work_once() {
        // W1 -> W2, W1 -> W3, W2 -> W4, W3 -> W4
        let transport = ScriptedTransport::works(vec![
            synthetic_work(1, &[2, 3]),
            synthetic_work(2, &[4]),
            synthetic_work(3, &[4]),
            synthetic_work(4, &[]),
        ]);
        let bfs = traversal(transport.clone(), &["W1"], 10, None);

        assert_eq!(ids(bfs).await, vec!["W1", "W2", "W3", "W4"]);
        assert_eq!(requested_ids(&transport), vec!["W1", "W2", "W3", "W4"]);
    }

    #[tokio::test]
    async fn test_zero_depth_yields_nothing() {
        let transport = ScriptedTransport::works(vec![synthetic_work(1, &[2])]);
        let mut bfs = traversal(transport.clone(), &["W1"], 0, None);

        assert!(bfs.next().await.unwrap().is_none());
        assert_eq!(bfs.stop_reason(), Some(StopReason::Exhausted));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let transport = ScriptedTransport::works(vec![
            synthetic_work(1, &[2]),
            synthetic_work(2, &[3]),
            synthetic_work(3, &[]),
        ]);
        let bfs = traversal(transport.clone(), &["W1"], 2, None);

        assert_eq!(ids(bfs).await, vec!["W1", "W2"]);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_node_budget() {
        let transport = ScriptedTransport::works(vec![
            synthetic_work(1, &[2, 3, 4]),
            synthetic_work(2, &[]),
            synthetic_work(3, &[]),
            synthetic_work(4, &[]),
        ]);
        let mut bfs = traversal(transport.clone(), &["W1"], 10, Some(2));

        let mut seen = Vec::new();
        while let Some(record) = bfs.next().await.unwrap() {
            seen.push(record.external_id().to_string());
        }
        assert_eq!(seen, vec!["W1", "W2"]);
        assert_eq!(bfs.processed(), 2);
        assert_eq!(bfs.stop_reason(), Some(StopReason::NodeBudget));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_work_is_skipped() {
        let transport = ScriptedTransport::works(vec![synthetic_work(1, &[404, 2]), synthetic_work(2, &[])]);
        let bfs = traversal(transport.clone(), &["W1"], 10, Some(2));

        // W404 is not counted against the budget
        assert_eq!(ids(bfs).await, vec!["W1", "W2"]);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_references_field_is_skipped() {
        let transport = ScriptedTransport::works(vec![
            json!({"id": "https://openalex.org/W1", "title": "no references"}),
            synthetic_work(2, &[]),
        ]);
        let mut bfs = traversal(transport, &["W1", "W2"], 10, None);

        let record = bfs.next().await.unwrap().unwrap();
        assert_eq!(record.external_id(), "W2");
        assert_eq!(bfs.processed(), 1);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let transport = ScriptedTransport::works(vec![
            synthetic_work(1, &[2]),
            synthetic_work(2, &[3]),
            synthetic_work(3, &[1]),
        ]);
        let bfs = traversal(transport.clone(), &["W1"], 100, None);

        assert_eq!(ids(bfs).await, vec!["W1", "W2", "W3"]);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_seeds_and_url_seeds() {
        let transport = ScriptedTransport::works(vec![synthetic_work(1, &[]), synthetic_work(2, &[])]);
        let bfs = traversal(
            transport.clone(),
            &["W1", "https://openalex.org/W1", "W2"],
            10,
            None,
        );

        assert_eq!(ids(bfs).await, vec!["W1", "W2"]);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_fifo_order_across_levels() {
        let transport = ScriptedTransport::works(vec![
            synthetic_work(1, &[3]),
            synthetic_work(2, &[4]),
            synthetic_work(3, &[]),
            synthetic_work(4, &[]),
        ]);
        let bfs = traversal(transport, &["W1", "W2"], 10, None);

        assert_eq!(ids(bfs).await, vec!["W1", "W2", "W3", "W4"]);
    }
}
