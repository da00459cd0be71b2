//! Board snapshot composition.
//!
//! [`compose`] is the top-level read path: board metadata, a filtered and
//! capped item list, and whichever enrichment sections the request turns on.
//! A section that is off makes no store calls at all.
//!
//! The relationship graph is always built from the full, uncapped board
//! listing so that frame children and connectivity are not distorted by the
//! response filters or the item cap. `max_items` bounds the returned item
//! list only. A type filter costs a second, type-scoped listing; the two may
//! observe slightly different board states.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::{analyze, ConnectionAnalysis};
use crate::error::BoardError;
use crate::fetch::{fetch_all, hydrate};
use crate::graph::{fetch_group_memberships, fetch_tags, ConnectivityMap, Memberships, RelationshipGraph};
use crate::history::{HistoryLedger, RecentHistory};
use crate::models::{BoardInfo, Geometry, Item, ItemType, Position};
use crate::source::{BoardSource, Listing};
use crate::summary::summarize;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    /// Keep only direct children of this frame.
    pub frame_id: Option<String>,
    pub item_type: Option<ItemType>,
    /// Case-insensitive match against summary, id, and type.
    pub search: Option<String>,
    /// Cap on returned items, 0 for unlimited.
    pub max_items: usize,
    /// Hydrate text-bearing items with their detail records.
    pub include_content: bool,
    pub include_frames: bool,
    pub include_groups: bool,
    pub include_tags: bool,
    pub include_comments: bool,
    pub include_connectors: bool,
    /// Structural analysis; only runs when connectors are included.
    pub include_analysis: bool,
    pub include_summary: bool,
    pub include_history: bool,
    pub history_limit: usize,
}

impl Default for SnapshotRequest {
    fn default() -> Self {
        Self {
            frame_id: None,
            item_type: None,
            search: None,
            max_items: 0,
            include_content: true,
            include_frames: true,
            include_groups: true,
            include_tags: true,
            include_comments: false,
            include_connectors: false,
            include_analysis: true,
            include_summary: true,
            include_history: false,
            history_limit: 10,
        }
    }
}

impl SnapshotRequest {
    /// Every section off: board metadata and the item list only.
    pub fn minimal() -> Self {
        Self {
            include_content: false,
            include_frames: false,
            include_groups: false,
            include_tags: false,
            include_comments: false,
            include_connectors: false,
            include_analysis: false,
            include_summary: false,
            include_history: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotItem {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    pub child_item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    pub item_ids: Vec<String>,
}

/// Counts over the full board listing. Connection figures are present only
/// when connectors were fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralSummary {
    pub total_items: usize,
    pub items_by_type: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_connectors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolated_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_connections: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned_connector_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotMetadata {
    pub board_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub max_items: usize,
    pub returned_items: usize,
    pub limit_reached: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub board: BoardInfo,
    pub items: Vec<SnapshotItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<FrameSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectors: Option<Vec<Item>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<ConnectivityMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_analysis: Option<ConnectionAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StructuralSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<RecentHistory>,
    pub metadata: SnapshotMetadata,
}

fn matches_search(item: &Item, summary: Option<&str>, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);
    hit(item.id.as_str()) || hit(item.item_type().as_str()) || summary.is_some_and(hit)
}

fn structural_summary(
    items: &[Item],
    graph: &RelationshipGraph,
    analysis: Option<&ConnectionAnalysis>,
    with_connectors: bool,
) -> StructuralSummary {
    let mut items_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *items_by_type.entry(item.item_type().to_string()).or_default() += 1;
    }
    let mut summary = StructuralSummary {
        total_items: items.len(),
        items_by_type,
        total_connectors: None,
        connected_items: None,
        isolated_items: None,
        max_connections: None,
        average_connections: None,
        orphaned_connector_count: None,
    };
    if !with_connectors {
        return summary;
    }

    let fan_out: Vec<usize> = items
        .iter()
        .map(|i| graph.neighbors(&i.id).len())
        .filter(|n| *n > 0)
        .collect();
    let connected = fan_out.len();
    let average = if connected == 0 {
        0.0
    } else {
        let mean = fan_out.iter().sum::<usize>() as f64 / connected as f64;
        (mean * 100.0).round() / 100.0
    };
    summary.total_connectors = Some(graph.connector_count());
    summary.connected_items = Some(connected);
    summary.isolated_items = Some(items.len() - connected);
    summary.max_connections = Some(fan_out.iter().copied().max().unwrap_or(0));
    summary.average_connections = Some(average);
    summary.orphaned_connector_count = Some(match analysis {
        Some(a) => a.orphaned_connectors.len(),
        None => analyze(graph).orphaned_connectors.len(),
    });
    summary
}

/// Compose a snapshot of the board behind `source`.
///
/// Fatal: board metadata, the item listing, and (when filtering by frame)
/// the frame lookup. Everything else degrades to empty enrichment with a
/// warning.
pub async fn compose<S>(
    source: &S,
    request: &SnapshotRequest,
    history: Option<&HistoryLedger>,
    concurrency: usize,
) -> Result<BoardSnapshot>
where
    S: BoardSource + ?Sized,
{
    let board = source
        .board_info()
        .await
        .context("failed to fetch board metadata")?;

    if let Some(frame_id) = &request.frame_id {
        let frame = source
            .item(frame_id)
            .await
            .with_context(|| format!("failed to resolve frame {}", frame_id))?;
        if frame.item_type() != ItemType::Frame {
            return Err(BoardError::Validation(format!(
                "item {} is a {}, not a frame",
                frame_id,
                frame.item_type()
            ))
            .into());
        }
    }

    let full = fetch_all(source, &Listing::all_items(), 0)
        .await
        .context("failed to list board items")?;
    let mut limit_reached = false;

    let mut candidates = match &request.item_type {
        Some(item_type) => {
            let typed = fetch_all(source, &Listing::items_of(item_type.clone()), request.max_items)
                .await
                .with_context(|| format!("failed to list {} items", item_type))?;
            limit_reached |= typed.limit_reached;
            typed.items
        }
        None => full.items.clone(),
    };
    if let Some(frame_id) = &request.frame_id {
        candidates.retain(|i| i.parent_id.as_deref() == Some(frame_id.as_str()));
    }
    if let Some(search) = request.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        candidates.retain(|i| matches_search(i, summarize(i).as_deref(), &needle));
    }
    if request.max_items > 0 && candidates.len() > request.max_items {
        candidates.truncate(request.max_items);
        limit_reached = true;
    }
    if request.include_content {
        candidates = hydrate(source, candidates, concurrency, |i| i.item_type().is_text_bearing()).await;
    }
    debug!(candidates = candidates.len(), "snapshot items selected");

    let connectors = if request.include_connectors {
        let fetched = fetch_all(source, &Listing::Connectors, 0)
            .await
            .context("failed to list connectors")?;
        Some(fetched.items)
    } else {
        None
    };

    let (tags, memberships) = if request.include_tags {
        fetch_tags(source, concurrency).await
    } else {
        (Vec::new(), Memberships::new())
    };

    let mut graph_items = full.items.clone();
    if let Some(connectors) = &connectors {
        graph_items.extend(connectors.iter().cloned());
    }
    let graph = RelationshipGraph::build(&graph_items, &memberships);

    let items: Vec<SnapshotItem> = candidates
        .into_iter()
        .map(|item| SnapshotItem {
            summary: summarize(&item),
            tag_ids: graph.tags_of(&item.id).to_vec(),
            item,
        })
        .collect();

    let frames = request.include_frames.then(|| {
        full.items
            .iter()
            .filter(|i| i.item_type() == ItemType::Frame)
            .map(|f| FrameSummary {
                id: f.id.clone(),
                title: summarize(f),
                position: f.position.clone(),
                geometry: f.geometry.clone(),
                child_item_ids: graph.children_of(&f.id).to_vec(),
            })
            .collect()
    });

    let groups = if request.include_groups {
        let ids = match source.groups().await {
            Ok(groups) => groups.into_iter().map(|g| g.id).collect(),
            Err(e) => {
                warn!(error = %e, "group listing failed; continuing without groups");
                Vec::new()
            }
        };
        let members = fetch_group_memberships(source, ids, concurrency).await;
        Some(
            members
                .into_iter()
                .map(|(id, item_ids)| GroupSummary { id, item_ids })
                .collect(),
        )
    } else {
        None
    };

    let tags = request.include_tags.then(|| {
        tags.into_iter()
            .map(|t| TagSummary {
                item_ids: memberships.get(&t.id).cloned().unwrap_or_default(),
                id: t.id,
                title: t.title,
                fill_color: t.fill_color,
            })
            .collect()
    });

    let comments = if request.include_comments {
        Some(source.comments().await.unwrap_or_else(|e| {
            warn!(error = %e, "comment listing failed; continuing without comments");
            Vec::new()
        }))
    } else {
        None
    };

    let analysis = (request.include_connectors && request.include_analysis).then(|| analyze(&graph));
    let summary = request.include_summary.then(|| {
        structural_summary(&full.items, &graph, analysis.as_ref(), request.include_connectors)
    });
    let connectivity = connectors.is_some().then(|| graph.connectivity().clone());
    let recent = match (request.include_history, history) {
        (true, Some(ledger)) => Some(ledger.recent(request.history_limit)),
        _ => None,
    };

    info!(
        board = %board.id,
        items = items.len(),
        limit_reached,
        "snapshot composed"
    );

    Ok(BoardSnapshot {
        metadata: SnapshotMetadata {
            board_id: board.id.clone(),
            frame_id: request.frame_id.clone(),
            item_type: request.item_type.clone(),
            search: request.search.clone(),
            max_items: request.max_items,
            returned_items: items.len(),
            limit_reached,
            generated_at: Utc::now(),
        },
        board,
        items,
        frames,
        groups,
        tags,
        comments,
        connectors,
        connectivity,
        connection_analysis: analysis,
        summary,
        history: recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Change;
    use crate::models::{CardData, FrameData, ItemContent, ShapeData, StickyNoteData, Tag};
    use crate::source::memory::{CallCounts, InMemoryBoard};
    use serde_json::json;

    fn frame(id: &str) -> Item {
        Item::new(
            id,
            ItemContent::Frame(FrameData {
                title: Some(format!("Frame {}", id)),
                ..Default::default()
            }),
        )
        .with_geometry(800.0, 600.0)
    }

    fn sticky(id: &str, text: &str) -> Item {
        Item::new(
            id,
            ItemContent::StickyNote(StickyNoteData {
                content: Some(text.to_string()),
                ..Default::default()
            }),
        )
    }

    fn board() -> InMemoryBoard {
        InMemoryBoard::new("b1")
            .with_items(vec![
                frame("f1"),
                sticky("s1", "Roadmap").with_parent("f1"),
                sticky("s2", "Retro notes").with_parent("f1"),
                sticky("s3", "Loose idea"),
                Item::new(
                    "k1",
                    ItemContent::Card(CardData {
                        title: Some("Deploy".into()),
                        ..Default::default()
                    }),
                ),
                Item::new("sh1", ItemContent::Shape(ShapeData::default())),
                Item::connector("c1", "s1", "s2"),
                Item::connector("c2", "s2", "s1"),
                Item::connector("c3", "s3", "gone"),
            ])
            .with_tag(
                Tag {
                    id: "t1".into(),
                    title: "todo".into(),
                    fill_color: Some("red".into()),
                },
                &["s1", "k1"],
            )
            .with_tag(
                Tag {
                    id: "t2".into(),
                    title: "broken".into(),
                    fill_color: None,
                },
                &["s3"],
            )
            .with_group("g1", &["s1", "s2"])
            .with_comment(json!({ "id": "cm1", "content": "looks good" }))
    }

    #[tokio::test]
    async fn test_minimal_request_makes_no_enrichment_calls() {
        let board = board();
        let snap = compose(&board, &SnapshotRequest::minimal(), None, 4).await.unwrap();
        assert_eq!(snap.items.len(), 6);
        assert!(snap.frames.is_none());
        assert!(snap.tags.is_none());
        assert!(snap.summary.is_none());
        assert_eq!(
            board.calls(),
            CallCounts {
                board_info: 1,
                list_page: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_frame_filter_keeps_direct_children() {
        let board = board();
        let request = SnapshotRequest {
            frame_id: Some("f1".into()),
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        let ids: Vec<&str> = snap.items.iter().map(|i| i.item.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
        assert_eq!(snap.metadata.frame_id.as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn test_missing_frame_is_fatal() {
        let board = board();
        let request = SnapshotRequest {
            frame_id: Some("nope".into()),
            ..SnapshotRequest::minimal()
        };
        let err = compose(&board, &request, None, 4).await.unwrap_err();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_frame_filter_rejects_non_frame() {
        let board = board();
        let request = SnapshotRequest {
            frame_id: Some("s1".into()),
            ..SnapshotRequest::minimal()
        };
        let err = compose(&board, &request, None, 4).await.unwrap_err();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_over_summary_id_and_type() {
        let board = board();
        let request = SnapshotRequest {
            search: Some("retro".into()),
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        assert_eq!(snap.items.len(), 1);
        assert_eq!(snap.items[0].item.id, "s2");

        let request = SnapshotRequest {
            search: Some("CARD".into()),
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        assert_eq!(snap.items[0].item.id, "k1");
    }

    #[tokio::test]
    async fn test_type_filter_uses_second_listing() {
        let board = board();
        let request = SnapshotRequest {
            item_type: Some(ItemType::StickyNote),
            include_frames: true,
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        assert_eq!(snap.items.len(), 3);
        assert_eq!(board.calls().list_page, 2);
        let frames = snap.frames.unwrap();
        assert_eq!(frames[0].child_item_ids, ["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_cap_sets_limit_reached() {
        let board = board().with_page_size(2);
        let request = SnapshotRequest {
            max_items: 3,
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        assert_eq!(snap.items.len(), 3);
        assert!(snap.metadata.limit_reached);
    }

    #[tokio::test]
    async fn test_cap_does_not_orphan_connectors() {
        let board = InMemoryBoard::new("b1").with_items(vec![
            sticky("a", "first"),
            sticky("b", "second"),
            Item::connector("c1", "a", "b"),
        ]);
        let request = SnapshotRequest {
            max_items: 1,
            include_connectors: true,
            include_analysis: true,
            include_summary: true,
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        assert_eq!(snap.items.len(), 1);
        assert!(snap.metadata.limit_reached);

        let analysis = snap.connection_analysis.unwrap();
        assert!(analysis.orphaned_connectors.is_empty());
        let summary = snap.summary.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.orphaned_connector_count, Some(0));
        assert_eq!(snap.connectivity.unwrap().neighbors["b"], ["a"]);
    }

    #[tokio::test]
    async fn test_failed_enrichment_listings_leave_empty_sections() {
        let board = board()
            .fail_listing("tags")
            .fail_listing("groups")
            .fail_listing("comments");
        let request = SnapshotRequest {
            include_comments: true,
            ..Default::default()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        assert_eq!(snap.items.len(), 6);
        assert_eq!(snap.tags, Some(Vec::new()));
        assert_eq!(snap.groups, Some(Vec::new()));
        assert_eq!(snap.comments, Some(Vec::new()));
        assert!(snap.items.iter().all(|i| i.tag_ids.is_empty()));
        assert_eq!(board.calls().tag_members, 0);
        assert_eq!(board.calls().group_members, 0);
    }

    #[tokio::test]
    async fn test_failed_group_lookup_keeps_group_with_no_members() {
        let board = board().with_group("g2", &["k1"]).fail_lookups_for("g1");
        let request = SnapshotRequest {
            include_groups: true,
            ..SnapshotRequest::minimal()
        };
        let snap = compose(&board, &request, None, 4).await.unwrap();
        let groups = snap.groups.unwrap();
        assert_eq!(
            groups,
            [
                GroupSummary {
                    id: "g1".into(),
                    item_ids: Vec::new(),
                },
                GroupSummary {
                    id: "g2".into(),
                    item_ids: vec!["k1".into()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_full_snapshot_sections() {
        let board = board().fail_lookups_for("t2");
        let ledger = HistoryLedger::new(5);
        ledger.record_item(Change::Created, &sticky("s9", "new one"));
        let request = SnapshotRequest {
            include_comments: true,
            include_connectors: true,
            include_history: true,
            ..Default::default()
        };
        let snap = compose(&board, &request, Some(&ledger), 4).await.unwrap();

        let tags = snap.tags.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].item_ids, ["s1", "k1"]);
        assert!(tags[1].item_ids.is_empty());

        let groups = snap.groups.unwrap();
        assert_eq!(groups[0].item_ids, ["s1", "s2"]);
        assert_eq!(snap.comments.unwrap().len(), 1);
        assert_eq!(snap.connectors.unwrap().len(), 3);

        let connectivity = snap.connectivity.unwrap();
        assert_eq!(connectivity.neighbors["s1"], ["s2"]);
        assert!(!connectivity.neighbors.contains_key("s3"));

        let analysis = snap.connection_analysis.unwrap();
        assert_eq!(analysis.duplicate_connections.len(), 1);
        assert_eq!(analysis.orphaned_connectors.len(), 1);

        let summary = snap.summary.unwrap();
        assert_eq!(summary.total_items, 6);
        assert_eq!(summary.items_by_type["sticky_note"], 3);
        assert_eq!(summary.total_connectors, Some(3));
        assert_eq!(summary.connected_items, Some(2));
        assert_eq!(summary.isolated_items, Some(4));
        assert_eq!(summary.max_connections, Some(1));
        assert_eq!(summary.orphaned_connector_count, Some(1));

        assert_eq!(snap.history.unwrap().created[0].item_id, "s9");
        let s1 = snap.items.iter().find(|i| i.item.id == "s1").unwrap();
        assert_eq!(s1.tag_ids, ["t1"]);
        assert_eq!(s1.summary.as_deref(), Some("Roadmap"));
    }
}
