//! Single-item operations: lookup, create, update, and position translation.
//!
//! Caller positions may be given in any [`RelativeTo`] frame. They are
//! translated to the store's frame with the parent's geometry, looked up via
//! [`BoardSource::item`], before anything is written. Geometry and style
//! payloads are normalized the same way for create and update, and every
//! successful write is recorded in the [`HistoryLedger`].

use anyhow::Result;
use board_harness_core::coords::{
    echo_position, from_store, to_store, Coord, ParentSize, PositionInput, RelativeTo,
    STORE_ORIGIN,
};
use board_harness_core::error::BoardError;
use board_harness_core::history::{Change, HistoryLedger};
use board_harness_core::models::{Item, ItemType, Position};
use board_harness_core::normalize::{normalize_geometry, normalize_style};
use board_harness_core::source::{Board, BoardSource};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct GetItemParams {
    pub item_id: String,
    #[serde(default, alias = "relativeTo")]
    pub relative_to: Option<RelativeTo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemParams {
    #[serde(rename = "type", alias = "item_type")]
    pub item_type: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub position: Option<PositionInput>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub start_item_id: Option<String>,
    #[serde(default)]
    pub end_item_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemParams {
    pub item_id: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub position: Option<PositionInput>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateParams {
    pub x: Coord,
    pub y: Coord,
    #[serde(alias = "relativeTo")]
    pub relative_to: RelativeTo,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_width: Option<f64>,
    #[serde(default)]
    pub parent_height: Option<f64>,
    /// Translate from the store's frame into `relative_to`.
    #[serde(default)]
    pub inverse: bool,
}

#[derive(Debug, Serialize)]
pub struct FetchedItem {
    #[serde(flatten)]
    pub item: Item,
    /// The stored position re-expressed in the requested frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_position: Option<PositionInput>,
}

#[derive(Debug, Serialize)]
pub struct WrittenItem {
    pub item: Item,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslatedPosition {
    pub position: PositionInput,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn object(field: &str, value: Option<&Value>) -> Result<Option<Map<String, Value>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(other) => Err(BoardError::Validation(format!(
            "{} must be an object, got {}",
            field, other
        ))
        .into()),
    }
}

/// The parent's size, read from its geometry. A parent that does not
/// resolve is reported as a missing parent.
async fn parent_size<S>(board: &S, parent_id: &str) -> Result<ParentSize>
where
    S: BoardSource + ?Sized,
{
    let parent = match board.item(parent_id).await {
        Ok(parent) => parent,
        Err(e) => {
            return Err(match BoardError::classify(&e) {
                Some(BoardError::NotFound { .. }) => BoardError::not_found("parent", parent_id).into(),
                _ => e.context(format!("failed to fetch parent {}", parent_id)),
            })
        }
    };
    ParentSize::of(&parent)
}

/// Position body sent to the store. The store derives `relativeTo` from the
/// parent, so it is not sent.
fn store_position(position: &Position) -> Value {
    json!({
        "x": position.x,
        "y": position.y,
        "origin": position.origin.as_deref().unwrap_or(STORE_ORIGIN),
    })
}

fn writable_type(item_type: &ItemType, verb: &str) -> Result<()> {
    if item_type.api_collection().is_none() {
        return Err(BoardError::Validation(format!(
            "items of type '{}' cannot be {}",
            item_type, verb
        ))
        .into());
    }
    Ok(())
}

/// Shared body assembly for the content fields of create and update.
fn content_fields(
    item_type: &ItemType,
    data: Option<&Value>,
    geometry: Option<&Value>,
    style: Option<&Value>,
    body: &mut Map<String, Value>,
    warnings: &mut Vec<String>,
) -> Result<()> {
    if let Some(data) = object("data", data)? {
        if *item_type == ItemType::Connector {
            // connectors keep shape and captions at the top level
            for key in ["shape", "captions"] {
                if let Some(value) = data.get(key) {
                    body.insert(key.to_string(), value.clone());
                }
            }
        } else {
            body.insert("data".to_string(), Value::Object(data));
        }
    }
    if let Some(geometry) = object("geometry", geometry)? {
        body.insert("geometry".to_string(), normalize_geometry(Value::Object(geometry)));
    }
    if let Some(style) = object("style", style)? {
        let (style, dropped) = normalize_style(item_type, Value::Object(style));
        warnings.extend(dropped);
        body.insert("style".to_string(), style);
    }
    Ok(())
}

pub async fn get_item(board: &dyn Board, params: &GetItemParams) -> Result<FetchedItem> {
    let item = board.item(&params.item_id).await?;
    let relative_position = match params.relative_to {
        None => None,
        Some(frame) => {
            let position = item.position.as_ref().ok_or_else(|| {
                BoardError::Validation(format!("item {} has no position", item.id))
            })?;
            let parent = match (frame.is_parent_relative(), item.parent_id.as_deref()) {
                (true, Some(parent_id)) => Some(parent_size(board, parent_id).await?),
                (true, None) => {
                    return Err(BoardError::Validation(format!(
                        "item {} has no parent; '{}' needs one",
                        item.id, frame
                    ))
                    .into())
                }
                (false, _) => None,
            };
            Some(echo_position(position, frame, parent)?)
        }
    };
    Ok(FetchedItem {
        item,
        relative_position,
    })
}

pub async fn create_item(
    board: &dyn Board,
    history: &HistoryLedger,
    params: &CreateItemParams,
) -> Result<WrittenItem> {
    let item_type: ItemType = params.item_type.trim().parse()?;
    writable_type(&item_type, "created")?;

    let mut body = Map::new();
    let mut warnings = Vec::new();

    if item_type == ItemType::Connector {
        if params.position.is_some() || params.geometry.is_some() || params.parent_id.is_some() {
            return Err(BoardError::Validation(
                "connectors are placed by their endpoints; drop position, geometry and parent_id"
                    .to_string(),
            )
            .into());
        }
        let (start, end) = match (
            non_empty(params.start_item_id.as_ref()),
            non_empty(params.end_item_id.as_ref()),
        ) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(BoardError::Validation(
                    "connectors need both start_item_id and end_item_id".to_string(),
                )
                .into())
            }
        };
        if start == end {
            return Err(BoardError::Validation(format!(
                "connector endpoints must differ, got {} for both",
                start
            ))
            .into());
        }
        body.insert("startItem".to_string(), json!({ "id": start }));
        body.insert("endItem".to_string(), json!({ "id": end }));
    } else {
        if params.start_item_id.is_some() || params.end_item_id.is_some() {
            return Err(BoardError::Validation(
                "start_item_id and end_item_id apply only to connectors".to_string(),
            )
            .into());
        }
        let parent_id = non_empty(params.parent_id.as_ref());
        let parent = match parent_id {
            Some(id) => Some(parent_size(board, id).await?),
            None => None,
        };
        let translated = to_store(params.position.as_ref(), parent)?;
        warnings.extend(translated.warnings.iter().cloned());
        body.insert("position".to_string(), store_position(&translated.position));
        if let Some(id) = parent_id {
            body.insert("parent".to_string(), json!({ "id": id }));
        }
    }

    content_fields(
        &item_type,
        params.data.as_ref(),
        params.geometry.as_ref(),
        params.style.as_ref(),
        &mut body,
        &mut warnings,
    )?;

    let created = board.create_item(&item_type, body).await?;
    history.record_item(Change::Created, &created);
    info!(id = %created.id, item_type = %item_type, warnings = warnings.len(), "created item");
    Ok(WrittenItem {
        item: created,
        warnings,
    })
}

pub async fn update_item(
    board: &dyn Board,
    history: &HistoryLedger,
    params: &UpdateItemParams,
) -> Result<WrittenItem> {
    let existing = board.item(&params.item_id).await?;
    let item_type = existing.item_type();
    writable_type(&item_type, "updated")?;

    if item_type == ItemType::Connector
        && (params.position.is_some() || params.geometry.is_some() || params.parent_id.is_some())
    {
        return Err(BoardError::Validation(format!(
            "{} is a connector; only data and style can be updated",
            existing.id
        ))
        .into());
    }

    let mut body = Map::new();
    let mut warnings = Vec::new();

    let new_parent = non_empty(params.parent_id.as_ref());
    if let Some(id) = new_parent {
        body.insert("parent".to_string(), json!({ "id": id }));
    }
    if let Some(position) = &params.position {
        let parent = match new_parent.or(existing.parent_id.as_deref()) {
            Some(id) => Some(parent_size(board, id).await?),
            None => None,
        };
        let translated = to_store(Some(position), parent)?;
        warnings.extend(translated.warnings.iter().cloned());
        body.insert("position".to_string(), store_position(&translated.position));
    }

    content_fields(
        &item_type,
        params.data.as_ref(),
        params.geometry.as_ref(),
        params.style.as_ref(),
        &mut body,
        &mut warnings,
    )?;

    if body.is_empty() {
        return Err(BoardError::Validation(format!(
            "nothing to update for {}: give data, style, geometry, position or parent_id",
            existing.id
        ))
        .into());
    }

    let updated = board.update_item(&existing.id, &item_type, body).await?;
    history.record_item(Change::Modified, &updated);
    info!(id = %updated.id, item_type = %item_type, warnings = warnings.len(), "updated item");
    Ok(WrittenItem {
        item: updated,
        warnings,
    })
}

fn coord_number(coord: &Coord, axis: &str) -> Result<f64> {
    let value = match coord {
        Coord::Number(n) => Some(*n),
        Coord::Text(s) => s.trim().parse::<f64>().ok(),
    };
    value.filter(|v| v.is_finite()).ok_or_else(|| {
        BoardError::Validation(format!(
            "{} must be a store-frame number for an inverse translation, got {}",
            axis, coord
        ))
        .into()
    })
}

/// Forward or inverse translation. The parent size comes from
/// `parent_width`/`parent_height` when given, otherwise from `parent_id`
/// looked up on `board`.
pub async fn translate_position(
    board: Option<&dyn Board>,
    params: &TranslateParams,
) -> Result<TranslatedPosition> {
    let parent = match (params.parent_width, params.parent_height) {
        (Some(width), Some(height)) => {
            if !(width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0) {
                return Err(BoardError::Validation(format!(
                    "parent size must be non-negative, got {}x{}",
                    width, height
                ))
                .into());
            }
            Some(ParentSize::new(width, height))
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(BoardError::Validation(
                "parent_width and parent_height must be given together".to_string(),
            )
            .into())
        }
        (None, None) => match (non_empty(params.parent_id.as_ref()), board) {
            (Some(id), Some(board)) => Some(parent_size(board, id).await?),
            (Some(id), None) => {
                return Err(BoardError::Validation(format!(
                    "parent {} cannot be looked up without a board",
                    id
                ))
                .into())
            }
            (None, _) => None,
        },
    };

    if params.inverse {
        let x = coord_number(&params.x, "x")?;
        let y = coord_number(&params.y, "y")?;
        let (x, y) = from_store(x, y, params.relative_to, parent)?;
        return Ok(TranslatedPosition {
            position: PositionInput {
                x,
                y,
                origin: params.origin.clone(),
                relative_to: Some(params.relative_to),
            },
            warnings: Vec::new(),
        });
    }

    let input = PositionInput {
        x: params.x.clone(),
        y: params.y.clone(),
        origin: params.origin.clone(),
        relative_to: Some(params.relative_to),
    };
    let translated = to_store(Some(&input), parent)?;
    Ok(TranslatedPosition {
        position: PositionInput {
            x: Coord::Number(translated.position.x),
            y: Coord::Number(translated.position.y),
            origin: translated.position.origin.clone(),
            relative_to: Some(translated.requested_frame().store_frame()),
        },
        warnings: translated.warnings,
    })
}
