//! Relationship graph reconstruction from a flat item collection.
//!
//! The store hands out items one by one; containment, tagging, and connector
//! adjacency are latent in the records. [`RelationshipGraph::build`] recovers
//! them:
//!
//! 1. **Containment**: every item whose `parent.id` resolves within the
//!    collection is added to that parent's child list. Unresolvable parents
//!    are not an error; the child is simply not linked.
//! 2. **Connectors**: every connector with both endpoint ids becomes a
//!    directed [`Edge`]. Edges whose endpoints both resolve feed the
//!    [`ConnectivityMap`]: an undirected neighbor map plus per-item
//!    `to`/`from`/`bidirectional` detail. Edges with a missing endpoint are
//!    kept for orphan analysis but never enter the map.
//! 3. **Tags**: tag membership lists are inverted into item → tag ids.
//!
//! Every list is built with idempotent insertion, so the same logical
//! connection discovered twice (or from either endpoint) appears once.
//!
//! The graph holds ids only, never item payloads, and is rebuilt from scratch
//! for every request.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::warn;

use crate::models::{Item, Tag};
use crate::source::BoardSource;

/// Membership lists keyed by tag or group id.
pub type Memberships = BTreeMap<String, Vec<String>>;

/// A directed connector edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub connector_id: String,
    pub start: String,
    pub end: String,
}

/// A connector missing one or both endpoint ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnanchoredConnector {
    pub connector_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Directed neighbors of one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionDetail {
    pub to: Vec<String>,
    pub from: Vec<String>,
    pub bidirectional: Vec<String>,
}

/// Adjacency over the connected subgraph. Only ids that are an endpoint of
/// some resolvable connector appear as keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectivityMap {
    pub neighbors: BTreeMap<String, Vec<String>>,
    pub details: BTreeMap<String, ConnectionDetail>,
}

/// Connection summary for one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub is_connected_to_any: bool,
    pub total_connections: usize,
    pub incoming_connections: usize,
    pub outgoing_connections: usize,
    pub has_bidirectional: bool,
    pub bidirectional_count: usize,
}

/// Neighbor id sets of one item, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectedItems {
    pub to: Vec<String>,
    pub from: Vec<String>,
    pub bidirectional: Vec<String>,
    pub all: Vec<String>,
}

pub(crate) fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}

#[derive(Debug, Default)]
pub struct RelationshipGraph {
    known: HashSet<String>,
    children: HashMap<String, Vec<String>>,
    edges: Vec<Edge>,
    unanchored: Vec<UnanchoredConnector>,
    incident: HashMap<String, Vec<String>>,
    connectivity: ConnectivityMap,
    item_tags: HashMap<String, Vec<String>>,
}

impl RelationshipGraph {
    /// Build the graph from `items` (connectors included) and the tag
    /// memberships fetched for this request.
    pub fn build(items: &[Item], tag_members: &Memberships) -> Self {
        let mut graph = RelationshipGraph {
            known: items.iter().map(|i| i.id.clone()).collect(),
            ..Default::default()
        };

        for item in items {
            if let Some(parent) = item.parent_id.as_deref() {
                if graph.known.contains(parent) && parent != item.id {
                    push_unique(graph.children.entry(parent.to_string()).or_default(), &item.id);
                }
            }
        }

        let mut seen_connectors: HashSet<&str> = HashSet::new();
        for item in items {
            let Some(connector) = item.as_connector() else {
                continue;
            };
            if !seen_connectors.insert(item.id.as_str()) {
                continue;
            }
            let (Some(start), Some(end)) = (connector.start_id(), connector.end_id()) else {
                graph.unanchored.push(UnanchoredConnector {
                    connector_id: item.id.clone(),
                    start: connector.start_id().map(str::to_string),
                    end: connector.end_id().map(str::to_string),
                });
                continue;
            };
            graph.edges.push(Edge {
                connector_id: item.id.clone(),
                start: start.to_string(),
                end: end.to_string(),
            });
            push_unique(graph.incident.entry(start.to_string()).or_default(), &item.id);
            push_unique(graph.incident.entry(end.to_string()).or_default(), &item.id);
        }

        graph.build_connectivity();

        for (tag_id, members) in tag_members {
            for item_id in members {
                push_unique(graph.item_tags.entry(item_id.clone()).or_default(), tag_id);
            }
        }

        graph
    }

    fn build_connectivity(&mut self) {
        let mut directed: HashSet<(&str, &str)> = HashSet::new();
        let map = &mut self.connectivity;

        for edge in &self.edges {
            if !self.known.contains(&edge.start) || !self.known.contains(&edge.end) {
                continue;
            }
            directed.insert((edge.start.as_str(), edge.end.as_str()));

            push_unique(map.neighbors.entry(edge.start.clone()).or_default(), &edge.end);
            push_unique(map.neighbors.entry(edge.end.clone()).or_default(), &edge.start);
            push_unique(&mut map.details.entry(edge.start.clone()).or_default().to, &edge.end);
            push_unique(&mut map.details.entry(edge.end.clone()).or_default().from, &edge.start);
        }

        for &(a, b) in &directed {
            if a != b && directed.contains(&(b, a)) {
                if let Some(detail) = map.details.get_mut(a) {
                    push_unique(&mut detail.bidirectional, b);
                }
            }
        }
        for detail in map.details.values_mut() {
            detail.bidirectional.sort();
        }
    }

    /// Whether `id` is part of the collection the graph was built from.
    pub fn contains(&self, id: &str) -> bool {
        self.known.contains(id)
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Connectors lacking an endpoint id altogether.
    pub fn unanchored(&self) -> &[UnanchoredConnector] {
        &self.unanchored
    }

    /// Number of connectors seen, anchored or not.
    pub fn connector_count(&self) -> usize {
        self.edges.len() + self.unanchored.len()
    }

    /// Incident connector count for every endpoint id, resolvable or not.
    pub fn incident_counts(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.incident.iter().map(|(id, c)| (id.as_str(), c.len()))
    }

    /// Connector ids attached to `id`, including connectors whose other end
    /// does not resolve.
    pub fn incident_connectors(&self, id: &str) -> &[String] {
        self.incident.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags_of(&self, id: &str) -> &[String] {
        self.item_tags.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn connectivity(&self) -> &ConnectivityMap {
        &self.connectivity
    }

    pub fn neighbors(&self, id: &str) -> &[String] {
        self.connectivity
            .neighbors
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn connected_items(&self, id: &str) -> ConnectedItems {
        let detail = self.connectivity.details.get(id).cloned().unwrap_or_default();
        ConnectedItems {
            to: detail.to,
            from: detail.from,
            bidirectional: detail.bidirectional,
            all: self.neighbors(id).to_vec(),
        }
    }

    pub fn connection_info(&self, id: &str) -> ConnectionInfo {
        let Some(detail) = self.connectivity.details.get(id) else {
            return ConnectionInfo::default();
        };
        let total = self.neighbors(id).len();
        ConnectionInfo {
            is_connected_to_any: total > 0,
            total_connections: total,
            incoming_connections: detail.from.len(),
            outgoing_connections: detail.to.len(),
            has_bidirectional: !detail.bidirectional.is_empty(),
            bidirectional_count: detail.bidirectional.len(),
        }
    }
}

async fn gather_memberships<F, Fut>(
    ids: Vec<String>,
    concurrency: usize,
    kind: &'static str,
    lookup: F,
) -> Memberships
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (String, Result<Vec<String>>)>,
{
    let results: Vec<(String, Result<Vec<String>>)> = stream::iter(ids)
        .map(lookup)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results
        .into_iter()
        .map(|(id, result)| {
            let members = result.unwrap_or_else(|e| {
                warn!(%id, error = %e, "{} membership lookup failed; treating as empty", kind);
                Vec::new()
            });
            let mut unique = Vec::with_capacity(members.len());
            for member in &members {
                push_unique(&mut unique, member);
            }
            (id, unique)
        })
        .collect()
}

/// Fetch the item ids of every tag, up to `concurrency` lookups at a time.
/// A failed lookup is logged and yields an empty list for that tag.
pub async fn fetch_tag_memberships<S>(source: &S, tags: &[Tag], concurrency: usize) -> Memberships
where
    S: BoardSource + ?Sized,
{
    let ids = tags.iter().map(|t| t.id.clone()).collect();
    gather_memberships(ids, concurrency, "tag", |id| async move {
        let result = source.tag_members(&id).await;
        (id, result)
    })
    .await
}

/// List the board's tags and resolve their memberships. Tagging is
/// enrichment: a failed tag listing is logged and yields no tags.
pub async fn fetch_tags<S>(source: &S, concurrency: usize) -> (Vec<Tag>, Memberships)
where
    S: BoardSource + ?Sized,
{
    let tags = match source.tags().await {
        Ok(tags) => tags,
        Err(e) => {
            warn!(error = %e, "tag listing failed; continuing without tags");
            return (Vec::new(), Memberships::new());
        }
    };
    let members = fetch_tag_memberships(source, &tags, concurrency).await;
    (tags, members)
}

/// Fetch the item ids of every group. Failures are isolated per group.
pub async fn fetch_group_memberships<S>(
    source: &S,
    group_ids: Vec<String>,
    concurrency: usize,
) -> Memberships
where
    S: BoardSource + ?Sized,
{
    gather_memberships(group_ids, concurrency, "group", |id| async move {
        let result = source.group_members(&id).await;
        (id, result)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameData, ItemContent, TextData};
    use crate::source::memory::InMemoryBoard;

    fn text(id: &str) -> Item {
        Item::new(id, ItemContent::Text(TextData::default()))
    }

    fn frame(id: &str) -> Item {
        Item::new(id, ItemContent::Frame(FrameData::default()))
    }

    #[test]
    fn test_children_only_for_resolvable_parents() {
        let items = vec![
            frame("f"),
            text("a").with_parent("f"),
            text("b").with_parent("f"),
            text("c").with_parent("missing"),
        ];
        let graph = RelationshipGraph::build(&items, &Memberships::new());
        assert_eq!(graph.children_of("f"), ["a", "b"]);
        assert!(graph.children_of("missing").is_empty());
    }

    #[test]
    fn test_same_connector_twice_is_idempotent() {
        let items = vec![
            text("a"),
            text("b"),
            Item::connector("c1", "a", "b"),
            Item::connector("c1", "a", "b"),
        ];
        let graph = RelationshipGraph::build(&items, &Memberships::new());
        assert_eq!(graph.neighbors("a"), ["b"]);
        assert_eq!(graph.neighbors("b"), ["a"]);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.incident_connectors("a"), ["c1"]);
    }

    #[test]
    fn test_parallel_connectors_share_one_neighbor() {
        let items = vec![
            text("a"),
            text("b"),
            Item::connector("c1", "a", "b"),
            Item::connector("c2", "a", "b"),
        ];
        let graph = RelationshipGraph::build(&items, &Memberships::new());
        assert_eq!(graph.neighbors("a").len(), 1);
        assert_eq!(graph.incident_connectors("a").len(), 2);
    }

    #[test]
    fn test_bidirectional_detection() {
        let items = vec![
            text("a"),
            text("b"),
            text("c"),
            Item::connector("c1", "a", "b"),
            Item::connector("c2", "b", "a"),
            Item::connector("c3", "a", "c"),
        ];
        let graph = RelationshipGraph::build(&items, &Memberships::new());
        let a = graph.connected_items("a");
        assert_eq!(a.to, ["b", "c"]);
        assert_eq!(a.from, ["b"]);
        assert_eq!(a.bidirectional, ["b"]);
        assert_eq!(a.all, ["b", "c"]);

        let info = graph.connection_info("a");
        assert!(info.is_connected_to_any);
        assert_eq!(info.total_connections, 2);
        assert_eq!(info.outgoing_connections, 2);
        assert_eq!(info.incoming_connections, 1);
        assert_eq!(info.bidirectional_count, 1);
        assert!(graph.connection_info("c").incoming_connections == 1);
        assert!(!graph.connection_info("c").has_bidirectional);
    }

    #[test]
    fn test_orphan_excluded_from_neighbor_map() {
        let items = vec![text("a"), Item::connector("c1", "a", "gone")];
        let graph = RelationshipGraph::build(&items, &Memberships::new());
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.connectivity().neighbors.is_empty());
        assert!(graph.neighbors("a").is_empty());
        assert_eq!(graph.incident_connectors("a"), ["c1"]);
        assert_eq!(graph.connection_info("a"), ConnectionInfo::default());
    }

    #[test]
    fn test_tag_inversion() {
        let mut tags = Memberships::new();
        tags.insert("t1".into(), vec!["a".into(), "b".into()]);
        tags.insert("t2".into(), vec!["a".into()]);
        let graph = RelationshipGraph::build(&[text("a"), text("b")], &tags);
        assert_eq!(graph.tags_of("a"), ["t1", "t2"]);
        assert_eq!(graph.tags_of("b"), ["t1"]);
        assert!(graph.tags_of("z").is_empty());
    }

    #[tokio::test]
    async fn test_failed_tag_lookup_is_isolated() {
        let tag = |id: &str| Tag {
            id: id.to_string(),
            title: id.to_uppercase(),
            fill_color: None,
        };
        let board = InMemoryBoard::new("b")
            .with_tag(tag("ok"), &["a", "a", "b"])
            .with_tag(tag("bad"), &["a"])
            .fail_lookups_for("bad");
        let tags = board.tags().await.unwrap();
        let members = fetch_tag_memberships(&board, &tags, 4).await;
        assert_eq!(members["ok"], ["a", "b"]);
        assert!(members["bad"].is_empty());
    }
}
