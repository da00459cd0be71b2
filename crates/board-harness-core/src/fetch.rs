//! Cursor-paginated listing drain.
//!
//! [`fetch_all`] follows the store's cursor until it is exhausted or until an
//! optional item cap is reached, truncating the last page to exactly the cap.
//! Each call observes its own snapshot of the board: two drains made for the
//! same request (say, the full board and a type-filtered subset) may disagree.
//!
//! [`hydrate`] swaps listing records for their detail records where the bulk
//! listing is too thin.

use std::collections::HashSet;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::models::Item;
use crate::source::{BoardSource, Listing};

/// Items accumulated by [`fetch_all`].
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub items: Vec<Item>,
    /// True when the cap stopped the drain before the listing was exhausted.
    pub limit_reached: bool,
}

/// Drain `listing` from `source`. `max_items == 0` means unlimited.
///
/// Terminates on cursor exhaustion, on reaching the cap, or when the store
/// hands back any cursor it has already handed out in this drain.
pub async fn fetch_all<S>(source: &S, listing: &Listing, max_items: usize) -> Result<Fetched>
where
    S: BoardSource + ?Sized,
{
    let mut items: Vec<Item> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = source
            .list_page(listing, cursor.as_deref())
            .await
            .with_context(|| format!("failed to list {:?} (page {})", listing, pages + 1))?;
        pages += 1;
        debug!(
            page = pages,
            records = page.items.len(),
            "fetched listing page"
        );
        items.extend(page.items);

        if max_items > 0 && items.len() >= max_items {
            let limit_reached = items.len() > max_items || page.cursor.is_some();
            items.truncate(max_items);
            return Ok(Fetched {
                items,
                limit_reached,
            });
        }

        match page.cursor {
            None => break,
            Some(next) if !seen.insert(next.clone()) => {
                warn!(
                    cursor = %next,
                    pages,
                    "store repeated an earlier cursor; stopping pagination"
                );
                break;
            }
            Some(next) => cursor = Some(next),
        }
    }

    Ok(Fetched {
        items,
        limit_reached: false,
    })
}

/// Replace each selected item with its type-specific detail record, up to
/// `concurrency` lookups at a time. Order is preserved. A failed lookup is
/// logged and the listing record is kept.
pub async fn hydrate<S, F>(source: &S, items: Vec<Item>, concurrency: usize, wanted: F) -> Vec<Item>
where
    S: BoardSource + ?Sized,
    F: Fn(&Item) -> bool + Sync,
{
    let wanted = &wanted;
    stream::iter(items)
        .map(move |item| async move {
            if !wanted(&item) {
                return item;
            }
            match source.item_detail(&item.id, &item.item_type()).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!(id = %item.id, error = %e, "detail lookup failed; keeping listing record");
                    item
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemContent, ShapeData};
    use crate::source::memory::InMemoryBoard;
    use crate::source::Page;
    use async_trait::async_trait;

    fn shapes(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(format!("s{}", i), ItemContent::Shape(ShapeData::default())))
            .collect()
    }

    #[tokio::test]
    async fn test_cap_truncates_first_page() {
        let board = InMemoryBoard::new("b").with_page_size(50).with_items(shapes(150));
        let fetched = fetch_all(&board, &Listing::all_items(), 25).await.unwrap();
        assert_eq!(fetched.items.len(), 25);
        assert!(fetched.limit_reached);
        assert_eq!(board.calls().list_page, 1);
    }

    #[tokio::test]
    async fn test_unlimited_drains_every_page() {
        let board = InMemoryBoard::new("b").with_page_size(50).with_items(shapes(150));
        let fetched = fetch_all(&board, &Listing::all_items(), 0).await.unwrap();
        assert_eq!(fetched.items.len(), 150);
        assert!(!fetched.limit_reached);
        assert_eq!(board.calls().list_page, 3);
    }

    #[tokio::test]
    async fn test_cap_equal_to_total_is_not_reached() {
        let board = InMemoryBoard::new("b").with_page_size(10).with_items(shapes(10));
        let fetched = fetch_all(&board, &Listing::all_items(), 10).await.unwrap();
        assert_eq!(fetched.items.len(), 10);
        assert!(!fetched.limit_reached);
    }

    #[tokio::test]
    async fn test_cap_on_page_boundary_with_more_pages() {
        let board = InMemoryBoard::new("b").with_page_size(10).with_items(shapes(30));
        let fetched = fetch_all(&board, &Listing::all_items(), 20).await.unwrap();
        assert_eq!(fetched.items.len(), 20);
        assert!(fetched.limit_reached);
        assert_eq!(board.calls().list_page, 2);
    }

    #[tokio::test]
    async fn test_hydrate_keeps_listing_record_on_failure() {
        let board = InMemoryBoard::new("b")
            .with_items(shapes(3))
            .fail_lookups_for("s1");
        let listed = fetch_all(&board, &Listing::all_items(), 0).await.unwrap().items;
        let hydrated = hydrate(&board, listed, 2, |i| i.id != "s2").await;
        let ids: Vec<&str> = hydrated.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["s0", "s1", "s2"]);
        assert_eq!(board.calls().item_detail, 2);
    }

    /// One shape per page; the next cursor is chosen by `next`.
    struct ScriptedCursor {
        next: fn(Option<&str>) -> String,
    }

    #[async_trait]
    impl BoardSource for ScriptedCursor {
        async fn board_info(&self) -> Result<crate::models::BoardInfo> {
            unimplemented!()
        }
        async fn list_page(&self, _listing: &Listing, cursor: Option<&str>) -> Result<Page> {
            Ok(Page {
                items: shapes(1),
                cursor: Some((self.next)(cursor)),
            })
        }
        async fn item(&self, _id: &str) -> Result<Item> {
            unimplemented!()
        }
        async fn item_detail(&self, _id: &str, _t: &crate::models::ItemType) -> Result<Item> {
            unimplemented!()
        }
        async fn tags(&self) -> Result<Vec<crate::models::Tag>> {
            unimplemented!()
        }
        async fn tag_members(&self, _tag_id: &str) -> Result<Vec<String>> {
            unimplemented!()
        }
        async fn groups(&self) -> Result<Vec<crate::models::GroupRef>> {
            unimplemented!()
        }
        async fn group_members(&self, _group_id: &str) -> Result<Vec<String>> {
            unimplemented!()
        }
        async fn comments(&self) -> Result<Vec<serde_json::Value>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_repeated_cursor_terminates() {
        let stuck = ScriptedCursor {
            next: |_| "same".to_string(),
        };
        let fetched = fetch_all(&stuck, &Listing::all_items(), 0).await.unwrap();
        assert_eq!(fetched.items.len(), 2);
    }

    #[tokio::test]
    async fn test_alternating_cursors_terminate() {
        // None -> A, A -> B, B -> A (already seen)
        let cycle = ScriptedCursor {
            next: |cursor| match cursor {
                Some("A") => "B".to_string(),
                _ => "A".to_string(),
            },
        };
        let fetched = fetch_all(&cycle, &Listing::all_items(), 0).await.unwrap();
        assert_eq!(fetched.items.len(), 3);
        assert!(!fetched.limit_reached);
    }
}
