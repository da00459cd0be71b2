//! Collaborator abstraction for the remote board store.
//!
//! The engine only ever *reads* through [`BoardSource`]. Implementations are
//! the REST client in the application crate and [`memory::InMemoryBoard`]
//! for tests. [`BoardWriter`] is the write side used by the application's
//! item tools; nothing in the engine calls it.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`board_info`](BoardSource::board_info) | Board metadata |
//! | [`list_page`](BoardSource::list_page) | One page of a cursor-paginated listing |
//! | [`item`](BoardSource::item) | Generic point lookup by id |
//! | [`item_detail`](BoardSource::item_detail) | Type-specific point lookup (hydration) |
//! | [`tags`](BoardSource::tags) / [`tag_members`](BoardSource::tag_members) | Tag listing and membership |
//! | [`groups`](BoardSource::groups) / [`group_members`](BoardSource::group_members) | Group listing and membership |
//! | [`comments`](BoardSource::comments) | Board comments |
//!
//! Implementations must be `Send + Sync` so one source can serve concurrent
//! lookups within a request.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{BoardInfo, GroupRef, Item, ItemType, Tag};

/// Which paginated listing to drain.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Board items, optionally restricted to one type by the store.
    Items { item_type: Option<ItemType> },
    /// Connectors, which the store lists on a separate endpoint.
    Connectors,
}

impl Listing {
    pub fn all_items() -> Self {
        Listing::Items { item_type: None }
    }

    pub fn items_of(item_type: ItemType) -> Self {
        Listing::Items {
            item_type: Some(item_type),
        }
    }
}

/// One page of a listing. `cursor` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    pub cursor: Option<String>,
}

#[async_trait]
pub trait BoardSource: Send + Sync {
    /// Board metadata.
    async fn board_info(&self) -> Result<BoardInfo>;

    /// Fetch one page of `listing`, starting at `cursor`.
    async fn list_page(&self, listing: &Listing, cursor: Option<&str>) -> Result<Page>;

    /// Point lookup by id, regardless of type. Fails with
    /// [`BoardError::NotFound`](crate::error::BoardError::NotFound) when the
    /// id does not resolve.
    async fn item(&self, id: &str) -> Result<Item>;

    /// Type-specific point lookup returning the item's full payload.
    async fn item_detail(&self, id: &str, item_type: &ItemType) -> Result<Item>;

    async fn tags(&self) -> Result<Vec<Tag>>;

    /// Ids of the items carrying `tag_id`.
    async fn tag_members(&self, tag_id: &str) -> Result<Vec<String>>;

    async fn groups(&self) -> Result<Vec<GroupRef>>;

    /// Ids of the items in `group_id`.
    async fn group_members(&self, group_id: &str) -> Result<Vec<String>>;

    async fn comments(&self) -> Result<Vec<Value>>;
}

/// Write side of the store, used by the application's item tools.
///
/// `body` is the JSON object sent to the store (`data`, `style`, `position`,
/// `geometry`, `parent`), already normalized by the caller.
#[async_trait]
pub trait BoardWriter: Send + Sync {
    async fn create_item(&self, item_type: &ItemType, body: Map<String, Value>) -> Result<Item>;

    async fn update_item(
        &self,
        id: &str,
        item_type: &ItemType,
        body: Map<String, Value>,
    ) -> Result<Item>;
}

/// A board reachable for both reads and writes.
pub trait Board: BoardSource + BoardWriter {}

impl<T: BoardSource + BoardWriter> Board for T {}
