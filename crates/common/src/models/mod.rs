//! Catalog entity models
//!
//! Records as received from the OpenAlex catalog

mod work;

pub use work::{normalize_work_id, WorkRecord, ID_FIELD, REFERENCES_FIELD};
