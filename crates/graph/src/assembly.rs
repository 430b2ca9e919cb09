//! Graph assembly from a stream of work records
//!
//! Records get dense indices in arrival order. References are buffered and
//! resolved once the stream ends; references to works that never arrived are
//! dropped, so the graph only holds works that were actually retrieved.

use crate::attributes::AttributeValue;
use crate::graph::CitationGraph;
use citeforge_common::config::{DuplicatePolicy, GraphConfig};
use citeforge_common::errors::{AppError, Result};
use citeforge_common::models::WorkRecord;
use futures::{Stream, TryStreamExt};
use tracing::{debug, info, warn};

/// Incremental graph builder
pub struct GraphBuilder {
    graph: CitationGraph,
    pending: Vec<(usize, Vec<String>)>,
    policy: DuplicatePolicy,
}

impl GraphBuilder {
    pub fn new<I, S>(keep_attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            graph: CitationGraph::new(keep_attributes),
            pending: Vec::new(),
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(config.keep_attributes.iter().cloned()).with_policy(config.duplicate_policy)
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Records added so far
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Add one record as the next node
    pub fn push(&mut self, record: WorkRecord) -> Result<usize> {
        let id = record.external_id();
        if let Some(previous) = self.graph.index_of(id) {
            match self.policy {
                DuplicatePolicy::Reject => return Err(AppError::DuplicateWork { id: id.to_string() }),
                DuplicatePolicy::Overwrite => {
                    warn!(wid = %id, previous, "Duplicate work in stream, remapping identifier");
                }
            }
        }

        let values: Vec<AttributeValue> = self
            .graph
            .attribute_names()
            .iter()
            .map(|name| {
                record
                    .attribute(name)
                    .map(AttributeValue::from_json)
                    .unwrap_or_default()
            })
            .collect();

        let node = self.graph.add_node(id, values)?;
        self.pending.push((node, record.referenced_ids().to_vec()));
        Ok(node)
    }

    /// Consume a fallible record stream, stopping at its first error
    pub async fn extend_stream<S>(&mut self, records: S) -> Result<()>
    where
        S: Stream<Item = Result<WorkRecord>>,
    {
        futures::pin_mut!(records);
        while let Some(record) = records.try_next().await? {
            self.push(record)?;
        }
        Ok(())
    }

    /// Resolve buffered references and return the graph
    pub fn finish(mut self) -> Result<CitationGraph> {
        let mut dropped = 0usize;
        for (citing, references) in std::mem::take(&mut self.pending) {
            for reference in references {
                match self.graph.index_of(&reference) {
                    Some(cited) => {
                        self.graph.add_edge(citing, cited)?;
                    }
                    None => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            debug!(dropped, "Dropped references to works outside the graph");
        }
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Assembled citation graph"
        );
        Ok(self.graph)
    }
}

/// Assemble a graph from records, keeping only `keep_attributes`
pub fn assemble<I, S>(records: I, keep_attributes: &[S]) -> Result<CitationGraph>
where
    I: IntoIterator<Item = WorkRecord>,
    S: AsRef<str>,
{
    let mut builder = GraphBuilder::new(keep_attributes.iter().map(|name| name.as_ref().to_string()));
    for record in records {
        builder.push(record)?;
    }
    builder.finish()
}

/// Assemble a graph from a crawl stream; a stream error aborts the assembly
pub async fn assemble_stream<S>(records: S, mut builder: GraphBuilder) -> Result<CitationGraph>
where
    S: Stream<Item = Result<WorkRecord>>,
{
    builder.extend_stream(records).await?;
    builder.finish()
}
