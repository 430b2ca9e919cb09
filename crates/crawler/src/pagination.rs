//! Paginated collection retrieval
//!
//! A preliminary call learns the total count `T` and page size `P`. Result
//! sets up to the offset ceiling are walked with `page`/`per_page`; larger
//! ones with `cursor`, starting at `*`. Either way at most `T` records are
//! produced.

use crate::client::{CatalogClient, CollectionPage};
use crate::query::RetrievalQuery;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::metrics::{self, CallProfile};
use citeforge_common::models::WorkRecord;
use futures::stream::{self, Stream};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SOURCE: &str = "search";

/// First cursor value of a cursor walk
pub const CURSOR_START: &str = "*";

/// How a retrieval walks the collection; fixed when the retrieval opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    Offset,
    Cursor,
}

impl std::fmt::Display for PaginationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offset => write!(f, "offset"),
            Self::Cursor => write!(f, "cursor"),
        }
    }
}

/// State shared by both strategies
struct PageState {
    client: CatalogClient,
    entity_type: String,
    params: Vec<(String, String)>,
    rate_interval: Duration,
    per_page: u64,
    total: usize,
    processed: usize,
    buffer: VecDeque<Value>,
    done: bool,
}

impl PageState {
    fn exhausted(&self) -> bool {
        self.done || self.processed >= self.total
    }

    async fn fetch(&mut self, position: (&str, String)) -> Result<CollectionPage> {
        let mut params = self.params.clone();
        params.push(("per_page".to_string(), self.per_page.to_string()));
        params.push((position.0.to_string(), position.1));

        let result = self
            .client
            .fetch_collection(&self.entity_type, &params, self.rate_interval)
            .await;
        if result.is_err() {
            self.done = true;
        }
        result
    }

    /// Take buffered records until one parses; `None` once the buffer is drained
    fn take_record(&mut self) -> Option<WorkRecord> {
        while !self.exhausted() {
            let raw = self.buffer.pop_front()?;
            self.processed += 1;

            match WorkRecord::from_json(raw) {
                Ok(record) => {
                    metrics::record_work(SOURCE, true);
                    return Some(record);
                }
                Err(err) => {
                    warn!(error = %err, processed = self.processed, "Skipping unusable work");
                    metrics::record_work(SOURCE, false);
                }
            }
        }
        None
    }
}

/// Page-numbered walk over `1..=ceil(T/P)`
pub struct OffsetPages {
    state: PageState,
    next_page: u64,
    last_page: u64,
}

impl OffsetPages {
    fn new(state: PageState) -> Self {
        let last_page = (state.total as u64).div_ceil(state.per_page);
        Self {
            state,
            next_page: 1,
            last_page,
        }
    }

    pub async fn next(&mut self) -> Result<Option<WorkRecord>> {
        loop {
            if let Some(record) = self.state.take_record() {
                return Ok(Some(record));
            }
            if self.state.exhausted() || self.next_page > self.last_page {
                return Ok(None);
            }

            let page = self.next_page;
            self.next_page += 1;
            debug!(page, last_page = self.last_page, "Fetching offset page");

            let fetched = self.state.fetch(("page", page.to_string())).await?;
            if fetched.results.is_empty() {
                self.state.done = true;
                return Ok(None);
            }
            self.state.buffer.extend(fetched.results);
        }
    }
}

/// Cursor walk following `meta.next_cursor`
pub struct CursorPages {
    state: PageState,
    cursor: Option<String>,
}

impl CursorPages {
    fn new(state: PageState) -> Self {
        Self {
            state,
            cursor: Some(CURSOR_START.to_string()),
        }
    }

    pub async fn next(&mut self) -> Result<Option<WorkRecord>> {
        loop {
            if let Some(record) = self.state.take_record() {
                return Ok(Some(record));
            }
            if self.state.exhausted() {
                return Ok(None);
            }
            let Some(cursor) = self.cursor.take() else {
                return Ok(None);
            };

            debug!(cursor = %cursor, "Fetching cursor page");
            let fetched = self.state.fetch(("cursor", cursor)).await?;
            self.cursor = fetched.next_cursor().map(str::to_string);
            if fetched.results.is_empty() {
                self.state.done = true;
                return Ok(None);
            }
            self.state.buffer.extend(fetched.results);
        }
    }
}

/// Lazy, finite sequence of works matching a query
pub enum EntityPages {
    Offset(OffsetPages),
    Cursor(CursorPages),
}

impl EntityPages {
    /// Run the preliminary call and pick the strategy
    ///
    /// Inherited query settings mean no cap and no delay here; `Crawler`
    /// replaces them with configured values first.
    #[instrument(skip(client, query), fields(entity_type = %query.entity_type))]
    pub async fn open(
        client: CatalogClient,
        query: &RetrievalQuery,
        page_size: u32,
        offset_ceiling: usize,
    ) -> Result<Self> {
        let params = query.to_params(client.mailto());
        let max_entities = query.max_entities.resolve(None);
        let rate_interval = query.rate_interval.resolve(Duration::ZERO);

        let mut probe = params.clone();
        probe.push(("per_page".to_string(), page_size.to_string()));
        let first = client
            .fetch_collection(&query.entity_type, &probe, rate_interval)
            .await?;

        let count = first
            .meta
            .count
            .ok_or_else(|| AppError::malformed("meta.count missing"))?;
        let per_page = match first.meta.per_page {
            Some(0) | None => return Err(AppError::malformed("meta.per_page missing or zero")),
            Some(per_page) => per_page,
        };

        let mut total = usize::try_from(count).unwrap_or(usize::MAX);
        if let Some(max_entities) = max_entities {
            if total > max_entities {
                warn!(count, max_entities, "Result set larger than max_entities, truncating");
                total = max_entities;
            }
        }

        let strategy = if total > offset_ceiling {
            PaginationStrategy::Cursor
        } else {
            PaginationStrategy::Offset
        };
        info!(total, per_page, strategy = %strategy, "Opened retrieval");

        let state = PageState {
            client,
            entity_type: query.entity_type.clone(),
            params,
            rate_interval,
            per_page,
            total,
            processed: 0,
            buffer: VecDeque::new(),
            done: false,
        };

        Ok(match strategy {
            PaginationStrategy::Offset => Self::Offset(OffsetPages::new(state)),
            PaginationStrategy::Cursor => Self::Cursor(CursorPages::new(state)),
        })
    }

    /// Next record, `Ok(None)` at the end
    ///
    /// After an error the sequence is over.
    pub async fn next(&mut self) -> Result<Option<WorkRecord>> {
        match self {
            Self::Offset(pages) => pages.next().await,
            Self::Cursor(pages) => pages.next().await,
        }
    }

    pub fn strategy(&self) -> PaginationStrategy {
        match self {
            Self::Offset(_) => PaginationStrategy::Offset,
            Self::Cursor(_) => PaginationStrategy::Cursor,
        }
    }

    fn state(&self) -> &PageState {
        match self {
            Self::Offset(pages) => &pages.state,
            Self::Cursor(pages) => &pages.state,
        }
    }

    /// Number of records the retrieval aims for (`T` after the cap)
    pub fn len(&self) -> usize {
        self.state().total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Page size used after the preliminary call
    pub fn per_page(&self) -> u64 {
        self.state().per_page
    }

    pub fn profile(&self) -> &CallProfile {
        self.state().client.profile()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<WorkRecord>> {
        stream::try_unfold(self, |mut pages| async move {
            Ok(pages.next().await?.map(|record| (record, pages)))
        })
    }
}
