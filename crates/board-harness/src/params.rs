//! Tool parameter decoding.
//!
//! Parameters arrive as a JSON object. Each tool decodes them into a typed
//! struct; decoding failures become [`BoardError::Validation`] so they map to
//! `400 bad_request`. Omitted fields fall back to the engine defaults or to
//! the `[snapshot]` config section.

use anyhow::Result;
use board_harness_core::error::BoardError;
use board_harness_core::hierarchy::HierarchyRequest;
use board_harness_core::models::ItemType;
use board_harness_core::snapshot::SnapshotRequest;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;

pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params)
        .map_err(|e| BoardError::Validation(format!("invalid parameters: {}", e)).into())
}

fn parse_type(item_type: Option<&str>) -> Result<Option<ItemType>> {
    item_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::parse::<ItemType>)
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotParams {
    pub frame_id: Option<String>,
    pub item_type: Option<String>,
    pub search: Option<String>,
    pub max_items: Option<usize>,
    pub include_content: Option<bool>,
    pub include_frames: Option<bool>,
    pub include_groups: Option<bool>,
    pub include_tags: Option<bool>,
    pub include_comments: Option<bool>,
    pub include_connectors: Option<bool>,
    pub include_analysis: Option<bool>,
    pub include_summary: Option<bool>,
    pub include_history: Option<bool>,
    pub history_limit: Option<usize>,
}

impl SnapshotParams {
    pub fn into_request(self, config: &Config) -> Result<SnapshotRequest> {
        let defaults = SnapshotRequest::default();
        Ok(SnapshotRequest {
            frame_id: self.frame_id.filter(|f| !f.trim().is_empty()),
            item_type: parse_type(self.item_type.as_deref())?,
            search: self.search,
            max_items: self.max_items.unwrap_or(config.snapshot.max_items),
            include_content: self.include_content.unwrap_or(defaults.include_content),
            include_frames: self.include_frames.unwrap_or(defaults.include_frames),
            include_groups: self.include_groups.unwrap_or(defaults.include_groups),
            include_tags: self.include_tags.unwrap_or(defaults.include_tags),
            include_comments: self.include_comments.unwrap_or(defaults.include_comments),
            include_connectors: self
                .include_connectors
                .unwrap_or(defaults.include_connectors),
            include_analysis: self.include_analysis.unwrap_or(defaults.include_analysis),
            include_summary: self.include_summary.unwrap_or(defaults.include_summary),
            include_history: self.include_history.unwrap_or(defaults.include_history),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HierarchyParams {
    pub item_id: Option<String>,
    pub item_type: Option<String>,
    pub max_depth: Option<usize>,
    pub include_connectors: Option<bool>,
    pub include_tags: Option<bool>,
    pub include_content: Option<bool>,
}

impl HierarchyParams {
    pub fn into_request(self, config: &Config) -> Result<HierarchyRequest> {
        let defaults = HierarchyRequest::default();
        Ok(HierarchyRequest {
            item_id: self.item_id.filter(|id| !id.trim().is_empty()),
            item_type: parse_type(self.item_type.as_deref())?,
            max_depth: self.max_depth.unwrap_or(config.snapshot.default_depth),
            include_connectors: self
                .include_connectors
                .unwrap_or(defaults.include_connectors),
            include_tags: self.include_tags.unwrap_or(defaults.include_tags),
            include_content: self.include_content.unwrap_or(defaults.include_content),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_defaults_follow_config() {
        let mut config = Config::minimal();
        config.snapshot.max_items = 200;
        let request = parse_params::<SnapshotParams>(json!({}))
            .unwrap()
            .into_request(&config)
            .unwrap();
        assert_eq!(request.max_items, 200);
        assert!(request.include_frames);
        assert!(!request.include_connectors);
    }

    #[test]
    fn test_snapshot_overrides() {
        let request = parse_params::<SnapshotParams>(json!({
            "board_id": "ignored-here",
            "item_type": "sticky_note",
            "max_items": 5,
            "include_connectors": true,
            "include_tags": false
        }))
        .unwrap()
        .into_request(&Config::minimal())
        .unwrap();
        assert_eq!(request.item_type, Some(ItemType::StickyNote));
        assert_eq!(request.max_items, 5);
        assert!(request.include_connectors);
        assert!(!request.include_tags);
    }

    #[test]
    fn test_unknown_type_is_validation_error() {
        let err = parse_params::<SnapshotParams>(json!({ "item_type": "hologram" }))
            .unwrap()
            .into_request(&Config::minimal())
            .unwrap_err();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::Validation(_))
        ));
    }

    #[test]
    fn test_wrong_field_type_is_validation_error() {
        let err = parse_params::<HierarchyParams>(json!({ "max_depth": "deep" })).unwrap_err();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::Validation(_))
        ));
    }

    #[test]
    fn test_hierarchy_depth_defaults_from_config() {
        let mut config = Config::minimal();
        config.snapshot.default_depth = 5;
        let request = parse_params::<HierarchyParams>(json!({ "item_id": "f1" }))
            .unwrap()
            .into_request(&config)
            .unwrap();
        assert_eq!(request.max_depth, 5);
        assert_eq!(request.item_id.as_deref(), Some("f1"));
    }

    #[test]
    fn test_history_limit_default() {
        let params: HistoryParams = parse_params(Value::Null).unwrap();
        assert_eq!(params.limit, 10);
    }
}
