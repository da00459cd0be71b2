//! Core data models shared by every Board Harness component.
//!
//! Items arrive from the remote store as loosely-typed JSON records. They are
//! decoded into [`Item`], whose `content` is a tagged union keyed by the item's
//! `type`. The wire shape is preserved on serialization: an [`Item`] written
//! back out looks exactly like the record it was read from (`id`, `type`,
//! `data`, `style`, `position`, `geometry`, `parent`, and for connectors
//! `startItem`/`endItem`).
//!
//! Parent links are weak: a child carries its parent's id only. Children sets
//! are always re-derived per request by [`crate::graph`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fixed item vocabulary of a board.
///
/// Unknown type names reported by the store are kept verbatim in
/// [`ItemType::Other`] so a listing never fails on an unfamiliar record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    Frame,
    Shape,
    Text,
    StickyNote,
    Image,
    Document,
    Embed,
    Card,
    AppCard,
    Connector,
    Preview,
    Other(String),
}

impl ItemType {
    /// Every known item type, in API order.
    pub const KNOWN: [ItemType; 11] = [
        ItemType::Frame,
        ItemType::Shape,
        ItemType::Text,
        ItemType::StickyNote,
        ItemType::Image,
        ItemType::Document,
        ItemType::Embed,
        ItemType::Card,
        ItemType::AppCard,
        ItemType::Connector,
        ItemType::Preview,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Frame => "frame",
            ItemType::Shape => "shape",
            ItemType::Text => "text",
            ItemType::StickyNote => "sticky_note",
            ItemType::Image => "image",
            ItemType::Document => "document",
            ItemType::Embed => "embed",
            ItemType::Card => "card",
            ItemType::AppCard => "app_card",
            ItemType::Connector => "connector",
            ItemType::Preview => "preview",
            ItemType::Other(name) => name,
        }
    }

    /// Collection segment used by the remote API for type-specific endpoints
    /// (`/boards/{board}/sticky_notes/{id}`).
    pub fn api_collection(&self) -> Option<&'static str> {
        match self {
            ItemType::Frame => Some("frames"),
            ItemType::Shape => Some("shapes"),
            ItemType::Text => Some("texts"),
            ItemType::StickyNote => Some("sticky_notes"),
            ItemType::Image => Some("images"),
            ItemType::Document => Some("documents"),
            ItemType::Embed => Some("embeds"),
            ItemType::Card => Some("cards"),
            ItemType::AppCard => Some("app_cards"),
            ItemType::Connector => Some("connectors"),
            ItemType::Preview | ItemType::Other(_) => None,
        }
    }

    /// Types whose bulk listing record may omit the text payload and which
    /// are therefore hydrated with a detail lookup.
    pub fn is_text_bearing(&self) -> bool {
        matches!(
            self,
            ItemType::Text
                | ItemType::StickyNote
                | ItemType::Shape
                | ItemType::Card
                | ItemType::AppCard
        )
    }
}

impl From<&str> for ItemType {
    fn from(value: &str) -> Self {
        match value {
            "frame" => ItemType::Frame,
            "shape" => ItemType::Shape,
            "text" => ItemType::Text,
            "sticky_note" => ItemType::StickyNote,
            "image" => ItemType::Image,
            "document" => ItemType::Document,
            "embed" => ItemType::Embed,
            "card" => ItemType::Card,
            "app_card" => ItemType::AppCard,
            "connector" => ItemType::Connector,
            "preview" => ItemType::Preview,
            other => ItemType::Other(other.to_string()),
        }
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        ItemType::from(value.as_str())
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for ItemType {
    type Err = anyhow::Error;

    /// Strict parse: only the known vocabulary is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ItemType::from(s) {
            ItemType::Other(name) => Err(crate::error::BoardError::Validation(format!(
                "unknown item type '{}'; expected one of: {}",
                name,
                ItemType::KNOWN
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .into()),
            known => Ok(known),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Per-type payloads
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub frame_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_content: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyNoteData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One end of a connector: the attached item's id plus an optional
/// attachment point relative to that item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_to: Option<String>,
}

/// Connector fields. On the wire these live at the top level of the record
/// rather than under `data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorData {
    pub start_item: Option<Endpoint>,
    pub end_item: Option<Endpoint>,
    pub shape: Option<String>,
    pub captions: Option<Vec<Value>>,
}

impl ConnectorData {
    pub fn start_id(&self) -> Option<&str> {
        self.start_item.as_ref().and_then(|e| e.id.as_deref())
    }

    pub fn end_id(&self) -> Option<&str> {
        self.end_item.as_ref().and_then(|e| e.id.as_deref())
    }
}

/// Type-specific payload of an [`Item`].
///
/// `Other` carries records whose type is outside the known vocabulary, and
/// known-type records whose `data` could not be decoded; the raw payload is
/// kept so it round-trips unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemContent {
    Frame(FrameData),
    Shape(ShapeData),
    Text(TextData),
    StickyNote(StickyNoteData),
    Image(ImageData),
    Document(DocumentData),
    Embed(EmbedData),
    Card(CardData),
    AppCard(AppCardData),
    Connector(ConnectorData),
    Preview(PreviewData),
    Other {
        type_name: String,
        data: Option<Value>,
    },
}

fn decode<T: serde::de::DeserializeOwned + Default>(data: Option<Value>) -> Result<T, Value> {
    match data {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| value),
    }
}

fn encode<T: Serialize>(data: &T) -> Option<Value> {
    match serde_json::to_value(data) {
        Ok(Value::Object(map)) if map.is_empty() => None,
        Ok(value) => Some(value),
        Err(_) => None,
    }
}

impl ItemContent {
    fn from_wire(type_name: &str, data: Option<Value>, connector: ConnectorData) -> Self {
        let item_type = ItemType::from(type_name);
        let decoded = match item_type {
            ItemType::Connector => return ItemContent::Connector(connector),
            ItemType::Frame => decode(data).map(ItemContent::Frame),
            ItemType::Shape => decode(data).map(ItemContent::Shape),
            ItemType::Text => decode(data).map(ItemContent::Text),
            ItemType::StickyNote => decode(data).map(ItemContent::StickyNote),
            ItemType::Image => decode(data).map(ItemContent::Image),
            ItemType::Document => decode(data).map(ItemContent::Document),
            ItemType::Embed => decode(data).map(ItemContent::Embed),
            ItemType::Card => decode(data).map(ItemContent::Card),
            ItemType::AppCard => decode(data).map(ItemContent::AppCard),
            ItemType::Preview => decode(data).map(ItemContent::Preview),
            ItemType::Other(_) => Err(data.unwrap_or(Value::Null)),
        };
        decoded.unwrap_or_else(|raw| ItemContent::Other {
            type_name: type_name.to_string(),
            data: if raw.is_null() { None } else { Some(raw) },
        })
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            ItemContent::Frame(_) => ItemType::Frame,
            ItemContent::Shape(_) => ItemType::Shape,
            ItemContent::Text(_) => ItemType::Text,
            ItemContent::StickyNote(_) => ItemType::StickyNote,
            ItemContent::Image(_) => ItemType::Image,
            ItemContent::Document(_) => ItemType::Document,
            ItemContent::Embed(_) => ItemType::Embed,
            ItemContent::Card(_) => ItemType::Card,
            ItemContent::AppCard(_) => ItemType::AppCard,
            ItemContent::Connector(_) => ItemType::Connector,
            ItemContent::Preview(_) => ItemType::Preview,
            ItemContent::Other { type_name, .. } => ItemType::from(type_name.as_str()),
        }
    }

    /// The `data` member as it appears on the wire.
    pub fn data_value(&self) -> Option<Value> {
        match self {
            ItemContent::Frame(d) => encode(d),
            ItemContent::Shape(d) => encode(d),
            ItemContent::Text(d) => encode(d),
            ItemContent::StickyNote(d) => encode(d),
            ItemContent::Image(d) => encode(d),
            ItemContent::Document(d) => encode(d),
            ItemContent::Embed(d) => encode(d),
            ItemContent::Card(d) => encode(d),
            ItemContent::AppCard(d) => encode(d),
            ItemContent::Preview(d) => encode(d),
            ItemContent::Connector(_) => None,
            ItemContent::Other { data, .. } => data.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Item
// ═══════════════════════════════════════════════════════════════════════

/// A position as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ParentRef {
    id: String,
}

/// Wire representation of an item record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    id: String,
    #[serde(rename = "type", default)]
    item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    style: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<ParentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_item: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_item: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    captions: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified_at: Option<String>,
}

/// A point-in-time snapshot of one board item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawItem", into = "RawItem")]
pub struct Item {
    pub id: String,
    pub content: ItemContent,
    pub style: Map<String, Value>,
    pub position: Option<Position>,
    pub geometry: Option<Geometry>,
    pub parent_id: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, content: ItemContent) -> Self {
        Self {
            id: id.into(),
            content,
            style: Map::new(),
            position: None,
            geometry: None,
            parent_id: None,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_geometry(mut self, width: f64, height: f64) -> Self {
        self.geometry = Some(Geometry {
            width: Some(width),
            height: Some(height),
            rotation: None,
        });
        self
    }

    /// Build a connector item linking `start` to `end`.
    pub fn connector(id: impl Into<String>, start: &str, end: &str) -> Self {
        Self::new(
            id,
            ItemContent::Connector(ConnectorData {
                start_item: Some(Endpoint {
                    id: Some(start.to_string()),
                    ..Default::default()
                }),
                end_item: Some(Endpoint {
                    id: Some(end.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        )
    }

    pub fn item_type(&self) -> ItemType {
        self.content.item_type()
    }

    pub fn is_connector(&self) -> bool {
        matches!(self.content, ItemContent::Connector(_))
    }

    /// Connector endpoints, when this item is a connector.
    pub fn as_connector(&self) -> Option<&ConnectorData> {
        match &self.content {
            ItemContent::Connector(c) => Some(c),
            _ => None,
        }
    }
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        let connector = ConnectorData {
            start_item: raw.start_item,
            end_item: raw.end_item,
            shape: raw.shape,
            captions: raw.captions,
        };
        Self {
            content: ItemContent::from_wire(&raw.item_type, raw.data, connector),
            id: raw.id,
            style: raw.style.unwrap_or_default(),
            position: raw.position,
            geometry: raw.geometry,
            parent_id: raw.parent.map(|p| p.id),
            created_at: raw.created_at,
            modified_at: raw.modified_at,
        }
    }
}

impl From<Item> for RawItem {
    fn from(item: Item) -> Self {
        let data = item.content.data_value();
        let item_type = item.item_type().as_str().to_string();
        let (start_item, end_item, shape, captions) = match item.content {
            ItemContent::Connector(c) => (c.start_item, c.end_item, c.shape, c.captions),
            _ => (None, None, None, None),
        };
        Self {
            id: item.id,
            item_type,
            data,
            style: if item.style.is_empty() {
                None
            } else {
                Some(item.style)
            },
            position: item.position,
            geometry: item.geometry,
            parent: item.parent_id.map(|id| ParentRef { id }),
            start_item,
            end_item,
            shape,
            captions,
            created_at: item.created_at,
            modified_at: item.modified_at,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Board-level records
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
}

/// A group as listed by the store, before membership is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_sticky_note() {
        let item: Item = serde_json::from_value(json!({
            "id": "1",
            "type": "sticky_note",
            "data": { "content": "<p>Hello</p>", "shape": "square" },
            "parent": { "id": "f1" },
            "position": { "x": 10.0, "y": 20.0, "origin": "center", "relativeTo": "parent_top_left" }
        }))
        .unwrap();
        assert_eq!(item.item_type(), ItemType::StickyNote);
        assert_eq!(item.parent_id.as_deref(), Some("f1"));
        match &item.content {
            ItemContent::StickyNote(d) => assert_eq!(d.content.as_deref(), Some("<p>Hello</p>")),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_connector_fields_at_top_level() {
        let item: Item = serde_json::from_value(json!({
            "id": "c1",
            "type": "connector",
            "startItem": { "id": "a" },
            "endItem": { "id": "b", "snapTo": "left" }
        }))
        .unwrap();
        let c = item.as_connector().unwrap();
        assert_eq!(c.start_id(), Some("a"));
        assert_eq!(c.end_id(), Some("b"));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["startItem"]["id"], "a");
        assert_eq!(back["endItem"]["snapTo"], "left");
        assert!(back.get("data").is_none());
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let raw = json!({ "id": "9", "type": "mindmap_node", "data": { "nodeView": { "x": 1 } } });
        let item: Item = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.item_type(), ItemType::Other("mindmap_node".to_string()));
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_malformed_known_payload_falls_back_to_other() {
        let item: Item =
            serde_json::from_value(json!({ "id": "t", "type": "text", "data": { "content": 42 } }))
                .unwrap();
        assert_eq!(item.item_type(), ItemType::Text);
        assert!(matches!(item.content, ItemContent::Other { .. }));
    }

    #[test]
    fn test_extra_data_fields_survive() {
        let raw = json!({ "id": "c", "type": "card", "data": { "title": "T", "custom": true } });
        let item: Item = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_strict_parse_rejects_unknown_type() {
        assert_eq!("card".parse::<ItemType>().unwrap(), ItemType::Card);
        let err = "widget".parse::<ItemType>().unwrap_err();
        assert!(err.to_string().contains("unknown item type 'widget'"));
    }
}
