//! Citation graph representation
//!
//! Nodes carry dense indices `0..N`, a bidirectional mapping to external work
//! identifiers, and one value per kept attribute.

use crate::attributes::AttributeValue;
use citeforge_common::errors::{AppError, Result};
use std::collections::HashMap;

/// In-memory directed citation graph
#[derive(Debug, Clone, Default)]
pub struct CitationGraph {
    /// External identifier of each node, by index
    ids: Vec<String>,

    /// External identifier -> index (last node added wins)
    index: HashMap<String, usize>,

    /// Adjacency list: node -> nodes it cites
    outgoing: Vec<Vec<usize>>,

    /// Reverse adjacency: node -> nodes citing it
    incoming: Vec<Vec<usize>>,

    edge_count: usize,

    /// Kept attribute names, in column order
    attribute_names: Vec<String>,

    /// One column per attribute name, each exactly `N` long
    attributes: Vec<Vec<AttributeValue>>,
}

impl CitationGraph {
    /// Create an empty graph; repeated attribute names are kept once
    pub fn new<I, S>(attribute_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in attribute_names {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }

        Self {
            attributes: vec![Vec::new(); names.len()],
            attribute_names: names,
            ..Default::default()
        }
    }

    /// Add a node and return its index
    ///
    /// `values` line up with `attribute_names()`. An identifier already in
    /// the graph is remapped to the new node.
    pub fn add_node(&mut self, external_id: impl Into<String>, values: Vec<AttributeValue>) -> Result<usize> {
        if values.len() != self.attribute_names.len() {
            return Err(AppError::InvalidGraph {
                message: format!(
                    "expected {} attribute values, got {}",
                    self.attribute_names.len(),
                    values.len()
                ),
            });
        }

        let node = self.ids.len();
        let external_id = external_id.into();
        self.index.insert(external_id.clone(), node);
        self.ids.push(external_id);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        for (column, value) in self.attributes.iter_mut().zip(values) {
            column.push(value);
        }
        Ok(node)
    }

    /// Add a citing -> cited edge; `false` when it already exists
    pub fn add_edge(&mut self, citing: usize, cited: usize) -> Result<bool> {
        let n = self.node_count();
        if citing >= n || cited >= n {
            return Err(AppError::InvalidGraph {
                message: format!("edge {} -> {} outside 0..{}", citing, cited, n),
            });
        }

        if self.outgoing[citing].contains(&cited) {
            return Ok(false);
        }
        self.outgoing[citing].push(cited);
        self.incoming[cited].push(citing);
        self.edge_count += 1;
        Ok(true)
    }

    /// Get works cited by this node
    pub fn get_references(&self, node: usize) -> &[usize] {
        self.outgoing.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Get works citing this node
    pub fn get_citations(&self, node: usize) -> &[usize] {
        self.incoming.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Get citation count (incoming edges)
    pub fn citation_count(&self, node: usize) -> usize {
        self.get_citations(node).len()
    }

    /// Get reference count (outgoing edges)
    pub fn reference_count(&self, node: usize) -> usize {
        self.get_references(node).len()
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All edges as `(citing, cited)`, ordered by citing node
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.outgoing
            .iter()
            .enumerate()
            .flat_map(|(citing, cited)| cited.iter().map(move |&c| (citing, c)))
    }

    /// All edges as `(citing id, cited id)`
    pub fn edge_ids(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.edges()
            .map(|(citing, cited)| (self.ids[citing].as_str(), self.ids[cited].as_str()))
    }

    pub fn external_id(&self, node: usize) -> Option<&str> {
        self.ids.get(node).map(String::as_str)
    }

    pub fn index_of(&self, external_id: &str) -> Option<usize> {
        self.index.get(external_id).copied()
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Whole column of one attribute, by node index
    pub fn attribute(&self, name: &str) -> Option<&[AttributeValue]> {
        let position = self.attribute_names.iter().position(|n| n == name)?;
        Some(&self.attributes[position])
    }

    pub fn node_attribute(&self, node: usize, name: &str) -> Option<&AttributeValue> {
        self.attribute(name)?.get(node)
    }

    /// Attribute values of one node, in column order
    pub fn node_attributes(&self, node: usize) -> Vec<&AttributeValue> {
        self.attributes.iter().filter_map(|column| column.get(node)).collect()
    }
}
