//! Depth-bounded containment trees.
//!
//! [`project`] roots a tree at one item (by id) or at every item of a type,
//! then expands children through the graph's parent index. Roots sit at
//! depth 0 and children are fully populated down to `max_depth`. Children one
//! level deeper are returned as stubs: the item record with empty tags,
//! connectors, and zeroed connection fields. Nothing below the stubs is
//! returned, but nothing at the stub level is dropped either.

use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::BoardError;
use crate::fetch::fetch_all;
use crate::graph::{fetch_tags, ConnectedItems, ConnectionInfo, Memberships, RelationshipGraph};
use crate::models::{Item, ItemType, Tag};
use crate::source::{BoardSource, Listing};
use crate::summary::summarize;

pub const MIN_DEPTH: usize = 1;
pub const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyRequest {
    pub item_id: Option<String>,
    pub item_type: Option<ItemType>,
    pub max_depth: usize,
    pub include_connectors: bool,
    pub include_tags: bool,
    pub include_content: bool,
}

impl Default for HierarchyRequest {
    fn default() -> Self {
        Self {
            item_id: None,
            item_type: None,
            max_depth: 3,
            include_connectors: true,
            include_tags: true,
            include_content: true,
        }
    }
}

impl HierarchyRequest {
    pub fn for_item(id: impl Into<String>) -> Self {
        Self {
            item_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn for_type(item_type: ItemType) -> Self {
        Self {
            item_type: Some(item_type),
            ..Default::default()
        }
    }

    /// Checked before any fetch.
    pub fn validate(&self) -> Result<()> {
        if self.item_id.is_none() && self.item_type.is_none() {
            return Err(BoardError::Validation(
                "either item_id or item_type must be provided".to_string(),
            )
            .into());
        }
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&self.max_depth) {
            return Err(BoardError::Validation(format!(
                "max_depth must be between {} and {}, got {}",
                MIN_DEPTH, MAX_DEPTH, self.max_depth
            ))
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub item: Item,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub tags: Vec<Tag>,
    pub connectors: Vec<String>,
    pub connected_items: ConnectedItems,
    pub connection_info: ConnectionInfo,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    fn stub(item: Item, depth: usize) -> Self {
        Self {
            item,
            depth,
            summary: None,
            tags: Vec::new(),
            connectors: Vec::new(),
            connected_items: ConnectedItems::default(),
            connection_info: ConnectionInfo::default(),
            children: Vec::new(),
        }
    }

    /// Nodes in this subtree, self included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    pub max_depth: usize,
    pub root_count: usize,
    pub total_nodes: usize,
    pub include_connectors: bool,
    pub include_tags: bool,
    pub include_content: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hierarchy {
    pub roots: Vec<HierarchyNode>,
    pub metadata: HierarchyMetadata,
}

struct Projector<'a> {
    request: &'a HierarchyRequest,
    graph: &'a RelationshipGraph,
    index: HashMap<&'a str, &'a Item>,
    tags: HashMap<&'a str, &'a Tag>,
}

impl Projector<'_> {
    fn node(&self, item: Item, depth: usize) -> HierarchyNode {
        let id = item.id.clone();
        let children = self
            .graph
            .children_of(&id)
            .iter()
            .filter_map(|child_id| self.index.get(child_id.as_str()))
            .map(|child| {
                let child = (*child).clone();
                if depth < self.request.max_depth {
                    self.node(child, depth + 1)
                } else {
                    HierarchyNode::stub(child, depth + 1)
                }
            })
            .collect();

        let mut node = HierarchyNode::stub(item, depth);
        node.children = children;
        if self.request.include_content {
            node.summary = summarize(&node.item);
        }
        if self.request.include_tags {
            node.tags = self
                .graph
                .tags_of(&id)
                .iter()
                .filter_map(|t| self.tags.get(t.as_str()).map(|tag| (*tag).clone()))
                .collect();
        }
        if self.request.include_connectors {
            node.connectors = self.graph.incident_connectors(&id).to_vec();
            node.connected_items = self.graph.connected_items(&id);
            node.connection_info = self.graph.connection_info(&id);
        }
        node
    }
}

/// Build the hierarchy described by `request`.
///
/// The full item listing is required; tags and connectors are fetched only
/// when their toggle is on. A root id missing from the item listing is looked
/// up among connectors even when connectors are off; one that still does not
/// resolve is a not-found
/// failure, and so is a failed detail lookup of that root. Type-selected
/// roots whose detail lookup fails keep their listing record.
pub async fn project<S>(source: &S, request: &HierarchyRequest, concurrency: usize) -> Result<Hierarchy>
where
    S: BoardSource + ?Sized,
{
    request.validate()?;

    let mut items = fetch_all(source, &Listing::all_items(), 0)
        .await
        .context("failed to list board items for hierarchy")?
        .items;
    let wants_connector_roots = request.item_type == Some(ItemType::Connector);
    let connectors_listed = request.include_connectors || wants_connector_roots;
    if connectors_listed {
        let connectors = fetch_all(source, &Listing::Connectors, 0)
            .await
            .context("failed to list connectors for hierarchy")?;
        items.extend(connectors.items);
    }

    let (tags, memberships) = if request.include_tags {
        fetch_tags(source, concurrency).await
    } else {
        (Vec::new(), Memberships::new())
    };
    let graph = RelationshipGraph::build(&items, &memberships);

    let roots: Vec<Item> = match (&request.item_id, &request.item_type) {
        (Some(id), _) => {
            let listed_type = match items.iter().find(|i| &i.id == id) {
                Some(listed) => Some(listed.item_type()),
                None if !connectors_listed => fetch_all(source, &Listing::Connectors, 0)
                    .await
                    .context("failed to list connectors for hierarchy root")?
                    .items
                    .iter()
                    .find(|c| &c.id == id)
                    .map(Item::item_type),
                None => None,
            };
            let listed_type = listed_type.ok_or_else(|| BoardError::not_found("item", id.clone()))?;
            let detail = source
                .item_detail(id, &listed_type)
                .await
                .with_context(|| format!("failed to fetch hierarchy root {}", id))?;
            vec![detail]
        }
        (None, Some(item_type)) => {
            let candidates: Vec<Item> = items
                .iter()
                .filter(|i| &i.item_type() == item_type)
                .cloned()
                .collect();
            debug!(item_type = %item_type, roots = candidates.len(), "hydrating hierarchy roots");
            stream::iter(candidates)
                .map(|item| async move {
                    match source.item_detail(&item.id, &item.item_type()).await {
                        Ok(detail) => detail,
                        Err(e) => {
                            warn!(id = %item.id, error = %e, "root detail lookup failed; using listing record");
                            item
                        }
                    }
                })
                .buffered(concurrency.max(1))
                .collect()
                .await
        }
        (None, None) => Vec::new(),
    };

    let projector = Projector {
        request,
        graph: &graph,
        index: items.iter().map(|i| (i.id.as_str(), i)).collect(),
        tags: tags.iter().map(|t| (t.id.as_str(), t)).collect(),
    };
    let roots: Vec<HierarchyNode> = roots.into_iter().map(|r| projector.node(r, 0)).collect();
    let total_nodes = roots.iter().map(HierarchyNode::node_count).sum();

    info!(
        roots = roots.len(),
        nodes = total_nodes,
        depth = request.max_depth,
        "hierarchy projected"
    );

    Ok(Hierarchy {
        metadata: HierarchyMetadata {
            item_id: request.item_id.clone(),
            item_type: request.item_type.clone(),
            max_depth: request.max_depth,
            root_count: roots.len(),
            total_nodes,
            include_connectors: request.include_connectors,
            include_tags: request.include_tags,
            include_content: request.include_content,
        },
        roots,
    })
}
