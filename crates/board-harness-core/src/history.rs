//! Bounded ledger of recently created and modified items.
//!
//! One instance is constructed at startup and shared by reference with every
//! tool that writes to the board. Each category is a FIFO ring: once it holds
//! `capacity` entries, recording another evicts the oldest. All access goes
//! through a single mutex, so each append is atomic; no ordering is promised
//! between entries recorded by concurrent calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Item, ItemType};
use crate::summary::summarize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub item_id: String,
    pub item_type: ItemType,
    pub summary: Option<String>,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn for_item(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            item_type: item.item_type(),
            summary: summarize(item),
            at: Utc::now(),
        }
    }
}

/// Most recent entries first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentHistory {
    pub created: Vec<HistoryEntry>,
    pub modified: Vec<HistoryEntry>,
}

#[derive(Default)]
struct Rings {
    created: VecDeque<HistoryEntry>,
    modified: VecDeque<HistoryEntry>,
}

pub struct HistoryLedger {
    capacity: usize,
    rings: Mutex<Rings>,
}

impl HistoryLedger {
    /// `capacity` is per category and is raised to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rings: Mutex::new(Rings::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, change: Change, entry: HistoryEntry) {
        let mut rings = self.rings.lock().unwrap_or_else(|e| e.into_inner());
        let ring = match change {
            Change::Created => &mut rings.created,
            Change::Modified => &mut rings.modified,
        };
        while ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(entry);
    }

    pub fn record_item(&self, change: Change, item: &Item) {
        self.record(change, HistoryEntry::for_item(item));
    }

    /// Up to `limit` newest entries per category.
    pub fn recent(&self, limit: usize) -> RecentHistory {
        let rings = self.rings.lock().unwrap_or_else(|e| e.into_inner());
        let newest = |ring: &VecDeque<HistoryEntry>| -> Vec<HistoryEntry> {
            ring.iter().rev().take(limit).cloned().collect()
        };
        RecentHistory {
            created: newest(&rings.created),
            modified: newest(&rings.modified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemContent, TextData};
    use std::sync::Arc;

    fn entry(id: &str) -> HistoryEntry {
        HistoryEntry::for_item(&Item::new(id, ItemContent::Text(TextData::default())))
    }

    #[test]
    fn test_oldest_evicted_past_capacity() {
        let ledger = HistoryLedger::new(3);
        for i in 0..5 {
            ledger.record(Change::Created, entry(&format!("i{}", i)));
        }
        let ids: Vec<String> = ledger.recent(10).created.into_iter().map(|e| e.item_id).collect();
        assert_eq!(ids, ["i4", "i3", "i2"]);
        assert!(ledger.recent(10).modified.is_empty());
    }

    #[test]
    fn test_recent_limit() {
        let ledger = HistoryLedger::new(20);
        for i in 0..5 {
            ledger.record(Change::Modified, entry(&format!("m{}", i)));
        }
        let recent = ledger.recent(2);
        assert_eq!(recent.modified.len(), 2);
        assert_eq!(recent.modified[0].item_id, "m4");
    }

    #[test]
    fn test_entry_carries_summary() {
        let item = Item::new(
            "t",
            ItemContent::Text(TextData {
                content: Some("<p>hello</p>".into()),
                ..Default::default()
            }),
        );
        let e = HistoryEntry::for_item(&item);
        assert_eq!(e.summary.as_deref(), Some("hello"));
        assert_eq!(e.item_type, ItemType::Text);
    }

    #[test]
    fn test_concurrent_appends() {
        let ledger = Arc::new(HistoryLedger::new(20));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        ledger.record(Change::Created, entry(&format!("{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.recent(100).created.len(), 20);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let ledger = HistoryLedger::new(0);
        assert_eq!(ledger.capacity(), 1);
        ledger.record(Change::Created, entry("a"));
        ledger.record(Change::Created, entry("b"));
        assert_eq!(ledger.recent(5).created.len(), 1);
    }
}
