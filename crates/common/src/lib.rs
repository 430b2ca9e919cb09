//! CiteForge Common Library
//!
//! Shared code for all CiteForge crates including:
//! - Work record model and identifier normalization
//! - Error types and handling
//! - Configuration management
//! - Metrics, call profiling and tracing setup

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, ErrorCode, Result};
pub use metrics::{CallProfile, ProfileSummary};
pub use models::WorkRecord;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result counts above this cannot be reached with page/per_page pagination
pub const OFFSET_PAGINATION_CEILING: usize = 10_000;

/// Largest page size the catalog accepts
pub const MAX_PAGE_SIZE: u32 = 200;
