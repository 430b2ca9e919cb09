//! Flat-file (CSV) codec for citation graphs
//!
//! Layout: header `pub,references,<attributes...>`, then one row per node
//! with its index, the colon-joined indices of the works it cites, and one
//! field per kept attribute.

use crate::attributes::AttributeSchema;
use crate::graph::CitationGraph;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::models::{normalize_work_id, ID_FIELD};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Node index column
pub const PUB_COLUMN: &str = "pub";

/// Successor list column
pub const REFERENCES_COLUMN: &str = "references";

const SUCCESSOR_SEPARATOR: char = ':';

/// Write `graph` as CSV
pub fn encode<W: Write>(graph: &CitationGraph, writer: W) -> Result<()> {
    if let Some(name) = graph
        .attribute_names()
        .iter()
        .find(|name| *name == PUB_COLUMN || *name == REFERENCES_COLUMN)
    {
        return Err(AppError::InvalidGraph {
            message: format!("attribute '{}' clashes with a reserved column", name),
        });
    }

    let mut writer = WriterBuilder::new().from_writer(writer);

    let mut header = vec![PUB_COLUMN, REFERENCES_COLUMN];
    header.extend(graph.attribute_names().iter().map(String::as_str));
    writer.write_record(&header)?;

    for node in 0..graph.node_count() {
        let references = graph
            .get_references(node)
            .iter()
            .map(|cited| cited.to_string())
            .collect::<Vec<_>>()
            .join(&SUCCESSOR_SEPARATOR.to_string());

        let mut row = vec![node.to_string(), references];
        row.extend(graph.node_attributes(node).into_iter().map(|value| value.to_field()));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

struct Row {
    line: usize,
    key: usize,
    references: String,
    fields: Vec<String>,
}

fn parse_index(field: &str, column: &str, line: usize) -> Result<usize> {
    field.trim().parse().map_err(|_| {
        AppError::format(format!(
            "line {}: invalid node index '{}' in column '{}'",
            line, field, column
        ))
    })
}

/// Read a graph written by [`encode`]
///
/// Nodes are numbered by first appearance of their `pub` value. Columns
/// other than `pub` and `references` are decoded with `schema`.
pub fn decode<R: Read>(reader: R, schema: &AttributeSchema) -> Result<CitationGraph> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AppError::format(format!("missing mandatory column '{}'", name)))
    };
    let pub_column = column(PUB_COLUMN)?;
    let references_column = column(REFERENCES_COLUMN)?;

    let attribute_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != pub_column && *i != references_column)
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut rows = Vec::new();
    let mut positions: HashMap<usize, usize> = HashMap::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        let line = record.position().map(|p| p.line() as usize).unwrap_or(rows.len() + 2);
        let field = |i: usize| record.get(i).unwrap_or_default();

        let key = parse_index(field(pub_column), PUB_COLUMN, line)?;
        if positions.insert(key, rows.len()).is_some() {
            return Err(AppError::format(format!("line {}: duplicate node {}", line, key)));
        }

        rows.push(Row {
            line,
            key,
            references: field(references_column).to_string(),
            fields: attribute_columns.iter().map(|(i, _)| field(*i).to_string()).collect(),
        });
    }

    let names: Vec<String> = attribute_columns.into_iter().map(|(_, name)| name).collect();
    let id_position = names.iter().position(|name| name == ID_FIELD);
    let mut graph = CitationGraph::new(names.iter().cloned());

    for row in &rows {
        let values = names
            .iter()
            .zip(&row.fields)
            .map(|(name, field)| schema.decode(name, field))
            .collect::<Result<Vec<_>>>()?;

        let external_id = id_position
            .and_then(|i| normalize_work_id(&row.fields[i]))
            .unwrap_or_else(|| row.key.to_string());
        graph.add_node(external_id, values)?;
    }

    for (citing, row) in rows.iter().enumerate() {
        for part in row.references.split(SUCCESSOR_SEPARATOR) {
            if part.trim().is_empty() {
                continue;
            }
            let key = parse_index(part, REFERENCES_COLUMN, row.line)?;
            let cited = positions.get(&key).copied().ok_or_else(|| {
                AppError::format(format!(
                    "line {}: node {} references unknown node {}",
                    row.line, row.key, key
                ))
            })?;
            graph.add_edge(citing, cited)?;
        }
    }

    Ok(graph)
}

/// Encode `graph` to a file, replacing it
pub fn save(graph: &CitationGraph, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    encode(graph, File::create(path)?)?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Saved citation graph"
    );
    Ok(())
}

pub fn load(path: impl AsRef<Path>, schema: &AttributeSchema) -> Result<CitationGraph> {
    let path = path.as_ref();
    let graph = decode(File::open(path)?, schema)?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Loaded citation graph"
    );
    Ok(graph)
}
