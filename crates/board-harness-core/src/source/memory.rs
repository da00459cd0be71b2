//! In-memory [`BoardSource`] / [`BoardWriter`] for tests and offline demos.
//!
//! Items live in a `Vec` behind `std::sync::RwLock`. Listings are paginated
//! with a configurable page size and a numeric offset cursor, so pagination
//! behaves like the real store. Individual ids and whole enrichment listings
//! (`tags`, `groups`, `comments`) can be marked as failing to exercise
//! partial-failure paths, and every trait method bumps a counter so
//! tests can assert which calls a request did (or did not) make.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::BoardError;
use crate::models::{BoardInfo, GroupRef, Item, ItemType, Tag};

use super::{BoardSource, BoardWriter, Listing, Page};

#[derive(Default)]
struct Counters {
    board_info: AtomicUsize,
    list_page: AtomicUsize,
    item: AtomicUsize,
    item_detail: AtomicUsize,
    tags: AtomicUsize,
    tag_members: AtomicUsize,
    groups: AtomicUsize,
    group_members: AtomicUsize,
    comments: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Number of calls made to each [`BoardSource`] method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub board_info: usize,
    pub list_page: usize,
    pub item: usize,
    pub item_detail: usize,
    pub tags: usize,
    pub tag_members: usize,
    pub groups: usize,
    pub group_members: usize,
    pub comments: usize,
}

/// In-memory board.
pub struct InMemoryBoard {
    info: BoardInfo,
    items: RwLock<Vec<Item>>,
    tags: RwLock<Vec<(Tag, Vec<String>)>>,
    groups: RwLock<Vec<(String, Vec<String>)>>,
    comments: RwLock<Vec<Value>>,
    failing: RwLock<HashSet<String>>,
    failing_listings: RwLock<HashSet<&'static str>>,
    page_size: usize,
    next_id: AtomicU64,
    counters: Counters,
}

impl InMemoryBoard {
    pub fn new(board_id: &str) -> Self {
        Self {
            info: BoardInfo {
                id: board_id.to_string(),
                name: Some(format!("Board {}", board_id)),
                ..Default::default()
            },
            items: RwLock::new(Vec::new()),
            tags: RwLock::new(Vec::new()),
            groups: RwLock::new(Vec::new()),
            comments: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            failing_listings: RwLock::new(HashSet::new()),
            page_size: 50,
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_items(self, items: impl IntoIterator<Item = Item>) -> Self {
        self.items.write().unwrap().extend(items);
        self
    }

    pub fn with_tag(self, tag: Tag, members: &[&str]) -> Self {
        self.tags
            .write()
            .unwrap()
            .push((tag, members.iter().map(|s| s.to_string()).collect()));
        self
    }

    pub fn with_group(self, group_id: &str, members: &[&str]) -> Self {
        self.groups.write().unwrap().push((
            group_id.to_string(),
            members.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn with_comment(self, comment: Value) -> Self {
        self.comments.write().unwrap().push(comment);
        self
    }

    /// Make membership and detail lookups for `id` fail.
    pub fn fail_lookups_for(self, id: &str) -> Self {
        self.failing.write().unwrap().insert(id.to_string());
        self
    }

    /// Make a whole enrichment listing fail: `"tags"`, `"groups"`, or
    /// `"comments"`.
    pub fn fail_listing(self, listing: &'static str) -> Self {
        self.failing_listings.write().unwrap().insert(listing);
        self
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        let load = |a: &AtomicUsize| a.load(Ordering::Relaxed);
        CallCounts {
            board_info: load(&c.board_info),
            list_page: load(&c.list_page),
            item: load(&c.item),
            item_detail: load(&c.item_detail),
            tags: load(&c.tags),
            tag_members: load(&c.tag_members),
            groups: load(&c.groups),
            group_members: load(&c.group_members),
            comments: load(&c.comments),
        }
    }

    fn check_failing(&self, id: &str, what: &str) -> Result<()> {
        if self.failing.read().unwrap().contains(id) {
            return Err(anyhow!("simulated {} failure for {}", what, id));
        }
        Ok(())
    }

    fn check_listing(&self, listing: &str) -> Result<()> {
        if self.failing_listings.read().unwrap().contains(listing) {
            return Err(anyhow!("simulated {} listing failure", listing));
        }
        Ok(())
    }
}

fn merge_object(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming))
                if key == "data" || key == "style" =>
            {
                existing.extend(incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Report positions in the frame the store records them in.
fn stamp_frame(record: &mut Map<String, Value>) {
    let frame = if record.get("parent").is_some_and(|p| !p.is_null()) {
        "parent_top_left"
    } else {
        "canvas_center"
    };
    if let Some(Value::Object(position)) = record.get_mut("position") {
        position.insert("relativeTo".to_string(), Value::String(frame.to_string()));
    }
}

#[async_trait]
impl BoardSource for InMemoryBoard {
    async fn board_info(&self) -> Result<BoardInfo> {
        bump(&self.counters.board_info);
        Ok(self.info.clone())
    }

    async fn list_page(&self, listing: &Listing, cursor: Option<&str>) -> Result<Page> {
        bump(&self.counters.list_page);
        let offset = match cursor {
            Some(c) => c
                .parse::<usize>()
                .with_context(|| format!("invalid cursor '{}'", c))?,
            None => 0,
        };
        let items = self.items.read().unwrap();
        let matching: Vec<&Item> = items
            .iter()
            .filter(|item| match listing {
                Listing::Connectors => item.is_connector(),
                Listing::Items { item_type: None } => !item.is_connector(),
                Listing::Items {
                    item_type: Some(t),
                } => item.item_type() == *t,
            })
            .collect();
        let end = (offset + self.page_size).min(matching.len());
        let page: Vec<Item> = matching
            .get(offset..end)
            .unwrap_or(&[])
            .iter()
            .map(|i| (*i).clone())
            .collect();
        Ok(Page {
            items: page,
            cursor: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn item(&self, id: &str) -> Result<Item> {
        bump(&self.counters.item);
        self.items
            .read()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| BoardError::not_found("item", id).into())
    }

    async fn item_detail(&self, id: &str, item_type: &ItemType) -> Result<Item> {
        bump(&self.counters.item_detail);
        self.check_failing(id, "detail")?;
        self.items
            .read()
            .unwrap()
            .iter()
            .find(|i| i.id == id && i.item_type() == *item_type)
            .cloned()
            .ok_or_else(|| BoardError::not_found(item_kind(item_type), id).into())
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        bump(&self.counters.tags);
        self.check_listing("tags")?;
        Ok(self
            .tags
            .read()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn tag_members(&self, tag_id: &str) -> Result<Vec<String>> {
        bump(&self.counters.tag_members);
        self.check_failing(tag_id, "tag membership")?;
        self.tags
            .read()
            .unwrap()
            .iter()
            .find(|(t, _)| t.id == tag_id)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| BoardError::not_found("tag", tag_id).into())
    }

    async fn groups(&self) -> Result<Vec<GroupRef>> {
        bump(&self.counters.groups);
        self.check_listing("groups")?;
        Ok(self
            .groups
            .read()
            .unwrap()
            .iter()
            .map(|(id, _)| GroupRef { id: id.clone() })
            .collect())
    }

    async fn group_members(&self, group_id: &str) -> Result<Vec<String>> {
        bump(&self.counters.group_members);
        self.check_failing(group_id, "group membership")?;
        self.groups
            .read()
            .unwrap()
            .iter()
            .find(|(id, _)| id == group_id)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| BoardError::not_found("group", group_id).into())
    }

    async fn comments(&self) -> Result<Vec<Value>> {
        bump(&self.counters.comments);
        self.check_listing("comments")?;
        Ok(self.comments.read().unwrap().clone())
    }
}

fn item_kind(item_type: &ItemType) -> &'static str {
    match item_type {
        ItemType::Frame => "frame",
        ItemType::Connector => "connector",
        _ => "item",
    }
}

#[async_trait]
impl BoardWriter for InMemoryBoard {
    async fn create_item(&self, item_type: &ItemType, body: Map<String, Value>) -> Result<Item> {
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut record = Map::new();
        record.insert("id".to_string(), Value::String(id));
        record.insert(
            "type".to_string(),
            Value::String(item_type.as_str().to_string()),
        );
        merge_object(&mut record, body);
        stamp_frame(&mut record);
        let item: Item = serde_json::from_value(Value::Object(record))
            .context("created item does not match the item schema")?;
        self.items.write().unwrap().push(item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        id: &str,
        item_type: &ItemType,
        body: Map<String, Value>,
    ) -> Result<Item> {
        let mut items = self.items.write().unwrap();
        let slot = items
            .iter_mut()
            .find(|i| i.id == id && i.item_type() == *item_type)
            .ok_or_else(|| BoardError::not_found(item_kind(item_type), id))?;
        let mut record = match serde_json::to_value(&*slot)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merge_object(&mut record, body);
        stamp_frame(&mut record);
        let updated: Item = serde_json::from_value(Value::Object(record))
            .context("updated item does not match the item schema")?;
        *slot = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemContent, TextData};

    fn text(id: &str) -> Item {
        Item::new(id, ItemContent::Text(TextData::default()))
    }

    #[tokio::test]
    async fn test_pagination_follows_cursor() {
        let board = InMemoryBoard::new("b")
            .with_page_size(2)
            .with_items((0..5).map(|i| text(&format!("t{}", i))));
        let first = board.list_page(&Listing::all_items(), None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.cursor.as_deref(), Some("2"));
        let last = board
            .list_page(&Listing::all_items(), Some("4"))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.cursor.is_none());
    }

    #[tokio::test]
    async fn test_connectors_listed_separately() {
        let board = InMemoryBoard::new("b").with_items(vec![
            text("a"),
            text("b"),
            Item::connector("c1", "a", "b"),
        ]);
        let items = board.list_page(&Listing::all_items(), None).await.unwrap();
        assert_eq!(items.items.len(), 2);
        let connectors = board.list_page(&Listing::Connectors, None).await.unwrap();
        assert_eq!(connectors.items.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_listing_errors_but_still_counts() {
        let board = InMemoryBoard::new("b")
            .with_group("g1", &["a"])
            .fail_listing("groups");
        assert!(board.groups().await.is_err());
        assert!(board.tags().await.is_ok());
        assert_eq!(board.calls().groups, 1);
    }

    #[tokio::test]
    async fn test_update_merges_data() {
        let board = InMemoryBoard::new("b");
        let mut body = Map::new();
        body.insert("data".into(), serde_json::json!({ "content": "one" }));
        let created = board.create_item(&ItemType::Text, body).await.unwrap();

        let mut patch = Map::new();
        patch.insert("position".into(), serde_json::json!({ "x": 1.0, "y": 2.0 }));
        let updated = board
            .update_item(&created.id, &ItemType::Text, patch)
            .await
            .unwrap();
        assert_eq!(updated.position.as_ref().map(|p| p.x), Some(1.0));
        assert_eq!(
            updated.position.as_ref().and_then(|p| p.relative_to.as_deref()),
            Some("canvas_center")
        );
        match updated.content {
            ItemContent::Text(d) => assert_eq!(d.content.as_deref(), Some("one")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
