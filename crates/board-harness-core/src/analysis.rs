//! Read-only structural diagnostics over connector adjacency.
//!
//! Three finding categories, each reported with structured data and one
//! advisory line:
//!
//! - **Duplicate connections**: more than one connector between the same
//!   unordered pair of items.
//! - **Orphaned connectors**: an endpoint that is missing or does not resolve
//!   to a fetched item.
//! - **Hot spots**: items with at least [`HOT_SPOT_THRESHOLD`] incident
//!   connectors, busiest first.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::fetch::fetch_all;
use crate::graph::{Memberships, RelationshipGraph};
use crate::source::{BoardSource, Listing};

/// Incident connector count at which an item is reported as a hot spot.
pub const HOT_SPOT_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateConnection {
    /// The endpoint pair, sorted.
    pub items: [String; 2],
    pub connector_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanedConnector {
    pub connector_id: String,
    pub start_item_id: Option<String>,
    pub end_item_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotSpot {
    pub item_id: String,
    pub connection_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionAnalysis {
    pub total_connectors: usize,
    pub duplicate_connections: Vec<DuplicateConnection>,
    pub orphaned_connectors: Vec<OrphanedConnector>,
    pub hot_spots: Vec<HotSpot>,
    pub advisories: Vec<String>,
}

pub fn analyze(graph: &RelationshipGraph) -> ConnectionAnalysis {
    let mut by_pair: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for edge in graph.edges() {
        let pair = if edge.start <= edge.end {
            (edge.start.clone(), edge.end.clone())
        } else {
            (edge.end.clone(), edge.start.clone())
        };
        let ids = by_pair.entry(pair).or_default();
        if !ids.contains(&edge.connector_id) {
            ids.push(edge.connector_id.clone());
        }
    }
    let duplicate_connections: Vec<DuplicateConnection> = by_pair
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((a, b), connector_ids)| DuplicateConnection {
            items: [a, b],
            connector_ids,
        })
        .collect();

    let mut orphaned_connectors = Vec::new();
    for edge in graph.edges() {
        let missing: Vec<&str> = [edge.start.as_str(), edge.end.as_str()]
            .into_iter()
            .filter(|id| !graph.contains(id))
            .collect();
        if missing.is_empty() {
            continue;
        }
        orphaned_connectors.push(OrphanedConnector {
            connector_id: edge.connector_id.clone(),
            start_item_id: Some(edge.start.clone()),
            end_item_id: Some(edge.end.clone()),
            reason: format!("endpoint not found on board: {}", missing.join(", ")),
        });
    }
    for connector in graph.unanchored() {
        let side = match (&connector.start, &connector.end) {
            (None, None) => "start and end item ids missing",
            (None, Some(_)) => "start item id missing",
            _ => "end item id missing",
        };
        orphaned_connectors.push(OrphanedConnector {
            connector_id: connector.connector_id.clone(),
            start_item_id: connector.start.clone(),
            end_item_id: connector.end.clone(),
            reason: side.to_string(),
        });
    }

    let mut hot_spots: Vec<HotSpot> = graph
        .incident_counts()
        .filter(|(id, count)| *count >= HOT_SPOT_THRESHOLD && graph.contains(id))
        .map(|(id, count)| HotSpot {
            item_id: id.to_string(),
            connection_count: count,
        })
        .collect();
    hot_spots.sort_by(|a, b| {
        b.connection_count
            .cmp(&a.connection_count)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    let mut analysis = ConnectionAnalysis {
        total_connectors: graph.connector_count(),
        duplicate_connections,
        orphaned_connectors,
        hot_spots,
        advisories: Vec::new(),
    };
    analysis.advisories = advisories(&analysis);
    analysis
}

/// Fetch every item and connector on the board and analyze them.
///
/// Both listings are required; tags are not consulted.
pub async fn analyze_board<S>(source: &S) -> Result<ConnectionAnalysis>
where
    S: BoardSource + ?Sized,
{
    let mut items = fetch_all(source, &Listing::all_items(), 0)
        .await
        .context("failed to list board items")?
        .items;
    let connectors = fetch_all(source, &Listing::Connectors, 0)
        .await
        .context("failed to list connectors")?
        .items;
    items.extend(connectors);
    let graph = RelationshipGraph::build(&items, &Memberships::new());
    let analysis = analyze(&graph);
    info!(
        connectors = analysis.total_connectors,
        duplicates = analysis.duplicate_connections.len(),
        orphans = analysis.orphaned_connectors.len(),
        hot_spots = analysis.hot_spots.len(),
        "connection analysis complete"
    );
    Ok(analysis)
}

fn advisories(analysis: &ConnectionAnalysis) -> Vec<String> {
    let mut lines = Vec::new();
    if !analysis.duplicate_connections.is_empty() {
        let extra: usize = analysis
            .duplicate_connections
            .iter()
            .map(|d| d.connector_ids.len() - 1)
            .sum();
        lines.push(format!(
            "{} item pair(s) are linked by more than one connector ({} redundant connector(s)); consider merging them.",
            analysis.duplicate_connections.len(),
            extra
        ));
    }
    if !analysis.orphaned_connectors.is_empty() {
        lines.push(format!(
            "{} connector(s) point at items that no longer exist; consider deleting or reattaching them.",
            analysis.orphaned_connectors.len()
        ));
    }
    if let Some(top) = analysis.hot_spots.first() {
        lines.push(format!(
            "{} item(s) have {} or more connections (busiest: {} with {}); consider splitting them up.",
            analysis.hot_spots.len(),
            HOT_SPOT_THRESHOLD,
            top.item_id,
            top.connection_count
        ));
    }
    if lines.is_empty() {
        lines.push(format!(
            "No structural issues found across {} connector(s).",
            analysis.total_connectors
        ));
    }
    lines
}
