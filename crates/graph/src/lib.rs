//! CiteForge Graph
//!
//! Turns streams of work records into a directed citation graph with dense
//! node indices, and reads and writes that graph as CSV.

pub mod assembly;
pub mod attributes;
pub mod codec;
pub mod graph;

pub use assembly::{assemble, assemble_stream, GraphBuilder};
pub use attributes::{AttributeKind, AttributeSchema, AttributeValue};
pub use codec::{decode, encode, load, save};
pub use graph::CitationGraph;
