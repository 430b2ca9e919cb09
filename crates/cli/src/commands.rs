//! Command implementations

use crate::{BfsArgs, InspectArgs, SearchArgs};
use anyhow::Context;
use citeforge_common::config::AppConfig;
use citeforge_common::metrics::CallProfile;
use citeforge_crawler::{Crawler, RetrievalQuery};
use citeforge_graph::{assemble_stream, codec, AttributeSchema, CitationGraph, GraphBuilder};
use std::time::Duration;
use tracing::info;

/// Query for a `search` invocation; unset options inherit the configuration
fn search_query(args: &SearchArgs) -> anyhow::Result<RetrievalQuery> {
    let mut query = RetrievalQuery::new();
    if args.all {
        query = query.max_entities(None);
    } else if let Some(cap) = args.max_entities {
        query = query.max_entities(Some(cap));
    }
    for (field, value) in &args.filters {
        query = query.filter(field.as_str(), value.as_str());
    }
    if let Some(search) = &args.search {
        query = query.search(search.as_str());
    }
    for key in &args.sort {
        query = query.sort(key.as_str());
    }
    if let Some(secs) = args.rate_interval {
        let interval = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid rate interval {}", secs))?;
        query = query.rate_interval(interval);
    }
    Ok(query)
}

pub async fn search(config: &AppConfig, args: SearchArgs) -> anyhow::Result<()> {
    let query = search_query(&args)?;
    let crawler = Crawler::from_config(config)?;
    let pages = crawler.get_entities(&query).await?;
    info!(
        total = pages.len(),
        strategy = %pages.strategy(),
        per_page = pages.per_page(),
        "Retrieving works"
    );

    let profile = pages.profile().clone();
    let graph = assemble_stream(pages.into_stream(), GraphBuilder::from_config(&config.graph)).await;
    log_profile(&profile);

    let graph = graph.context("bulk retrieval failed")?;
    codec::save(&graph, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(())
}

pub async fn bfs(config: &AppConfig, args: BfsArgs) -> anyhow::Result<()> {
    let crawler = Crawler::from_config(config)?;
    let traversal = crawler.citation_bfs(&args.seeds, args.max_depth, args.max_nodes)?;
    let profile = traversal.profile().clone();

    let graph = assemble_stream(traversal.into_stream(), GraphBuilder::from_config(&config.graph)).await;
    log_profile(&profile);

    let graph = graph.context("citation traversal failed")?;
    codec::save(&graph, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(())
}

pub fn inspect(config: &AppConfig, args: InspectArgs) -> anyhow::Result<()> {
    let schema = AttributeSchema::from_config(&config.graph);
    let graph = codec::load(&args.path, &schema)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    println!("{}", args.path.display());
    println!("  nodes: {}", graph.node_count());
    println!("  edges: {}", graph.edge_count());

    if !graph.attribute_names().is_empty() {
        println!("  attributes:");
        for name in graph.attribute_names() {
            let missing = graph
                .attribute(name)
                .map(|column| column.iter().filter(|v| v.is_missing()).count())
                .unwrap_or(0);
            println!("    {} ({} missing)", name, missing);
        }
    }

    let top = most_cited(&graph, args.top);
    if !top.is_empty() {
        println!("  most cited:");
        for (node, count) in top {
            let title = graph
                .node_attribute(node, "title")
                .map(|v| v.to_field())
                .unwrap_or_default();
            println!(
                "    {} {} ({} citations)",
                graph.external_id(node).unwrap_or("?"),
                title,
                count
            );
        }
    }
    Ok(())
}

/// Nodes with at least one citation, most cited first
fn most_cited(graph: &CitationGraph, limit: usize) -> Vec<(usize, usize)> {
    let mut counts: Vec<(usize, usize)> = (0..graph.node_count())
        .map(|node| (node, graph.citation_count(node)))
        .filter(|(_, count)| *count > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts.truncate(limit);
    counts
}

fn log_profile(profile: &CallProfile) {
    let summary = profile.summary();
    info!(
        api_calls = summary.api_calls,
        total_time_secs = summary.total_time_secs,
        average_time_secs = summary.average_time_secs,
        errors = ?summary.errors,
        "API call profile"
    );
}
