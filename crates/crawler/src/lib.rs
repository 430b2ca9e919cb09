//! CiteForge Crawler
//!
//! Retrieves work records from the OpenAlex catalog:
//! - Raw request executor with retry and backoff
//! - Offset and cursor pagination over collection queries
//! - Bounded breadth-first traversal of citations

pub mod client;
pub mod crawler;
pub mod executor;
pub mod pagination;
pub mod query;
pub mod transport;
pub mod traversal;

#[cfg(test)]
mod testing;

pub use client::{CatalogClient, CollectionMeta, CollectionPage};
pub use crawler::Crawler;
pub use executor::{RequestExecutor, RetryPolicy};
pub use pagination::{EntityPages, PaginationStrategy};
pub use query::{RetrievalQuery, Setting};
pub use transport::{ReqwestTransport, Sleeper, TokioSleeper, Transport, TransportResponse};
pub use traversal::{CitationTraversal, StopReason, TraversalLimits};
