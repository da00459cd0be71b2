//! Coordinate frame translation.
//!
//! Callers may express a position in one of five reference frames. The store
//! only understands two of them: `canvas_center` for items without a parent,
//! and `parent_top_left` (absolute offset from the parent's top-left corner)
//! for children. [`to_store`] converts any caller frame into the store's
//! frame; [`from_store`] is its inverse and is used when echoing a stored
//! position back in the frame a caller asked for.
//!
//! | Frame | Store `x` given parent width `W` |
//! |-------|----------------------------------|
//! | `canvas_center` | `x` |
//! | `parent_top_left` | `x`, must lie in `0..=W` |
//! | `parent_center` | `x + W/2` |
//! | `parent_bottom_right` | `W - x` |
//! | `parent_percentage` | `(x / 100) * W`, `x` given as `"NN%"` in `0..=100` |
//!
//! Out-of-range handling is asymmetric: a negative `parent_top_left`
//! coordinate is clamped to zero with a warning, while a percentage outside
//! `0..=100` is rejected.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::BoardError;
use crate::models::{Item, Position};

/// The origin the store accepts for every frame.
pub const STORE_ORIGIN: &str = "center";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeTo {
    CanvasCenter,
    ParentTopLeft,
    ParentCenter,
    ParentBottomRight,
    ParentPercentage,
}

impl RelativeTo {
    pub const ALL: [RelativeTo; 5] = [
        RelativeTo::CanvasCenter,
        RelativeTo::ParentTopLeft,
        RelativeTo::ParentCenter,
        RelativeTo::ParentBottomRight,
        RelativeTo::ParentPercentage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelativeTo::CanvasCenter => "canvas_center",
            RelativeTo::ParentTopLeft => "parent_top_left",
            RelativeTo::ParentCenter => "parent_center",
            RelativeTo::ParentBottomRight => "parent_bottom_right",
            RelativeTo::ParentPercentage => "parent_percentage",
        }
    }

    pub fn is_parent_relative(&self) -> bool {
        !matches!(self, RelativeTo::CanvasCenter)
    }

    /// The frame the store records positions in for this caller frame.
    pub fn store_frame(&self) -> RelativeTo {
        if self.is_parent_relative() {
            RelativeTo::ParentTopLeft
        } else {
            RelativeTo::CanvasCenter
        }
    }
}

impl fmt::Display for RelativeTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelativeTo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        RelativeTo::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                BoardError::Validation(format!(
                    "unknown relativeTo '{}'; expected one of: canvas_center, parent_top_left, \
                     parent_center, parent_bottom_right, parent_percentage",
                    s
                ))
                .into()
            })
    }
}

/// A caller-supplied coordinate: a number, a numeric string, or a
/// percentage string such as `"25%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coord {
    Number(f64),
    Text(String),
}

impl From<f64> for Coord {
    fn from(value: f64) -> Self {
        Coord::Number(value)
    }
}

impl From<&str> for Coord {
    fn from(value: &str) -> Self {
        Coord::Text(value.to_string())
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coord::Number(n) => write!(f, "{}", n),
            Coord::Text(s) => f.write_str(s),
        }
    }
}

/// A position as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInput {
    pub x: Coord,
    pub y: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, alias = "relative_to", skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<RelativeTo>,
}

impl PositionInput {
    pub fn new(x: impl Into<Coord>, y: impl Into<Coord>, relative_to: RelativeTo) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            origin: None,
            relative_to: Some(relative_to),
        }
    }
}

/// Width and height of the containing frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentSize {
    pub width: f64,
    pub height: f64,
}

impl ParentSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Read the size from a fetched parent item's geometry.
    pub fn of(parent: &Item) -> Result<Self> {
        let geometry = parent.geometry.as_ref();
        match (
            geometry.and_then(|g| g.width),
            geometry.and_then(|g| g.height),
        ) {
            (Some(width), Some(height)) => Ok(Self { width, height }),
            _ => Err(BoardError::Validation(format!(
                "parent {} has no width/height; parent-relative positions need its geometry",
                parent.id
            ))
            .into()),
        }
    }
}

/// Result of translating a caller position into the store's frame.
///
/// The requested frame is kept for a later inverse translation but is not
/// part of [`Translated::position`], which is what gets sent to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub position: Position,
    pub warnings: Vec<String>,
    requested: RelativeTo,
}

impl Translated {
    pub fn requested_frame(&self) -> RelativeTo {
        self.requested
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    fn extent_name(self) -> &'static str {
        match self {
            Axis::X => "width",
            Axis::Y => "height",
        }
    }

    fn extent(self, parent: ParentSize) -> f64 {
        match self {
            Axis::X => parent.width,
            Axis::Y => parent.height,
        }
    }
}

fn parse_number(coord: &Coord, axis: Axis) -> Result<f64> {
    let value = match coord {
        Coord::Number(n) => *n,
        Coord::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            BoardError::Validation(format!(
                "{} must be a number, got '{}'",
                axis.name(),
                s
            ))
        })?,
    };
    if !value.is_finite() {
        return Err(
            BoardError::Validation(format!("{} must be finite, got {}", axis.name(), value)).into(),
        );
    }
    Ok(value)
}

fn parse_percentage(coord: &Coord, axis: Axis, parent: ParentSize) -> Result<f64> {
    let text = match coord {
        Coord::Text(s) => s.trim(),
        Coord::Number(n) => {
            return Err(BoardError::Validation(format!(
                "{} must be a percentage string such as \"{}%\" when relativeTo is parent_percentage",
                axis.name(),
                n
            ))
            .into())
        }
    };
    let number = text
        .strip_suffix('%')
        .and_then(|n| n.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            BoardError::Validation(format!(
                "{} must be a percentage string such as \"50%\", got '{}'",
                axis.name(),
                text
            ))
        })?;
    if !(0.0..=100.0).contains(&number) {
        return Err(BoardError::OutOfBounds(format!(
            "{}={} is outside 0%..100% of the parent {} ({})",
            axis.name(),
            text,
            axis.extent_name(),
            axis.extent(parent)
        ))
        .into());
    }
    Ok(number)
}

fn forward(
    coord: &Coord,
    axis: Axis,
    frame: RelativeTo,
    parent: Option<ParentSize>,
    warnings: &mut Vec<String>,
) -> Result<f64> {
    let Some(parent) = parent else {
        return parse_number(coord, axis);
    };
    let extent = axis.extent(parent);
    match frame {
        RelativeTo::CanvasCenter => parse_number(coord, axis),
        RelativeTo::ParentTopLeft => {
            let value = parse_number(coord, axis)?;
            if value < 0.0 {
                let msg = format!(
                    "{}={} is negative under parent_top_left; clamped to 0",
                    axis.name(),
                    value
                );
                warn!("{}", msg);
                warnings.push(msg);
                Ok(0.0)
            } else if value > extent {
                Err(BoardError::OutOfBounds(format!(
                    "{}={} exceeds the parent {} {} (valid range 0..={})",
                    axis.name(),
                    value,
                    axis.extent_name(),
                    extent,
                    extent
                ))
                .into())
            } else {
                Ok(value)
            }
        }
        RelativeTo::ParentCenter => Ok(parse_number(coord, axis)? + extent / 2.0),
        RelativeTo::ParentBottomRight => Ok(extent - parse_number(coord, axis)?),
        RelativeTo::ParentPercentage => {
            Ok(parse_percentage(coord, axis, parent)? / 100.0 * extent)
        }
    }
}

/// Translate a caller position into the store's frame.
///
/// `parent` is `Some` exactly when the item has (or will have) a parent; it
/// carries that parent's size. A missing `input` places the item at `(0, 0)`
/// of its default frame: `canvas_center` without a parent, `parent_top_left`
/// with one. A missing `relativeTo` selects the same default frame.
pub fn to_store(input: Option<&PositionInput>, parent: Option<ParentSize>) -> Result<Translated> {
    let default_frame = if parent.is_some() {
        RelativeTo::ParentTopLeft
    } else {
        RelativeTo::CanvasCenter
    };
    let zero = PositionInput::new(0.0, 0.0, default_frame);
    let input = input.unwrap_or(&zero);
    let frame = input.relative_to.unwrap_or(default_frame);

    match (frame.is_parent_relative(), parent.is_some()) {
        (true, false) => {
            return Err(BoardError::Validation(format!(
                "relativeTo '{}' requires the item to have a parent",
                frame
            ))
            .into())
        }
        (false, true) => {
            return Err(BoardError::Validation(
                "relativeTo 'canvas_center' applies only to items without a parent; \
                 use one of the parent_* frames"
                    .to_string(),
            )
            .into())
        }
        _ => {}
    }

    let mut warnings = Vec::new();
    let origin = match (frame, input.origin.as_deref()) {
        (RelativeTo::ParentCenter, Some(origin)) if origin != STORE_ORIGIN => {
            let msg = format!(
                "origin '{}' is not supported with parent_center; using '{}'",
                origin, STORE_ORIGIN
            );
            warn!("{}", msg);
            warnings.push(msg);
            STORE_ORIGIN.to_string()
        }
        (_, Some(origin)) => origin.to_string(),
        (_, None) => STORE_ORIGIN.to_string(),
    };

    let x = forward(&input.x, Axis::X, frame, parent, &mut warnings)?;
    let y = forward(&input.y, Axis::Y, frame, parent, &mut warnings)?;

    Ok(Translated {
        position: Position {
            x,
            y,
            origin: Some(origin),
            relative_to: Some(frame.store_frame().as_str().to_string()),
        },
        warnings,
        requested: frame,
    })
}

fn format_percentage(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    format!("{}%", rounded)
}

/// Express a store-frame coordinate pair in the caller frame `frame`.
///
/// Inverse of [`to_store`]: for every frame and in-range input,
/// `from_store(to_store(p)) == p` within floating-point tolerance.
pub fn from_store(
    x: f64,
    y: f64,
    frame: RelativeTo,
    parent: Option<ParentSize>,
) -> Result<(Coord, Coord)> {
    let parent = match (frame.is_parent_relative(), parent) {
        (false, _) => return Ok((Coord::Number(x), Coord::Number(y))),
        (true, None) => {
            return Err(BoardError::Validation(format!(
                "relativeTo '{}' requires the item to have a parent",
                frame
            ))
            .into())
        }
        (true, Some(p)) => p,
    };
    let (w, h) = (parent.width, parent.height);
    Ok(match frame {
        RelativeTo::CanvasCenter | RelativeTo::ParentTopLeft => {
            (Coord::Number(x), Coord::Number(y))
        }
        RelativeTo::ParentCenter => (Coord::Number(x - w / 2.0), Coord::Number(y - h / 2.0)),
        RelativeTo::ParentBottomRight => (Coord::Number(w - x), Coord::Number(h - y)),
        RelativeTo::ParentPercentage => {
            if w <= 0.0 || h <= 0.0 {
                return Err(BoardError::Validation(format!(
                    "parent_percentage needs a parent with positive size, got {}x{}",
                    w, h
                ))
                .into());
            }
            (
                Coord::Text(format_percentage(x / w * 100.0)),
                Coord::Text(format_percentage(y / h * 100.0)),
            )
        }
    })
}

/// Re-express a stored item position in the caller frame `frame`.
pub fn echo_position(
    position: &Position,
    frame: RelativeTo,
    parent: Option<ParentSize>,
) -> Result<PositionInput> {
    let stored_frame = position.relative_to.as_deref().unwrap_or("canvas_center");
    let stored_in_parent = stored_frame == RelativeTo::ParentTopLeft.as_str();
    if frame.is_parent_relative() != stored_in_parent {
        return Err(BoardError::Validation(format!(
            "position is stored relative to '{}' and cannot be expressed as '{}'",
            stored_frame, frame
        ))
        .into());
    }
    let (x, y) = from_store(position.x, position.y, frame, parent)?;
    Ok(PositionInput {
        x,
        y,
        origin: position.origin.clone(),
        relative_to: Some(frame),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT: ParentSize = ParentSize {
        width: 400.0,
        height: 300.0,
    };

    fn coord_value(c: &Coord) -> f64 {
        match c {
            Coord::Number(n) => *n,
            Coord::Text(s) => s.trim_end_matches('%').parse().unwrap(),
        }
    }

    #[test]
    fn test_round_trip_every_frame() {
        let cases = [
            (PositionInput::new(-120.5, 88.0, RelativeTo::CanvasCenter), None),
            (PositionInput::new(10.0, 299.0, RelativeTo::ParentTopLeft), Some(PARENT)),
            (PositionInput::new(-50.0, 25.25, RelativeTo::ParentCenter), Some(PARENT)),
            (PositionInput::new(-40.0, -10.0, RelativeTo::ParentBottomRight), Some(PARENT)),
            (PositionInput::new("12.5%", "80%", RelativeTo::ParentPercentage), Some(PARENT)),
        ];
        for (input, parent) in cases {
            let frame = input.relative_to.unwrap();
            let stored = to_store(Some(&input), parent).unwrap();
            assert_eq!(stored.requested_frame(), frame);
            let (x, y) = from_store(stored.position.x, stored.position.y, frame, parent).unwrap();
            assert!((coord_value(&x) - coord_value(&input.x)).abs() < 1e-9, "{}", frame);
            assert!((coord_value(&y) - coord_value(&input.y)).abs() < 1e-9, "{}", frame);
        }
    }

    #[test]
    fn test_percentage_bounds_map_to_corners() {
        let zero = to_store(
            Some(&PositionInput::new("0%", "0%", RelativeTo::ParentPercentage)),
            Some(PARENT),
        )
        .unwrap();
        assert_eq!((zero.position.x, zero.position.y), (0.0, 0.0));

        let full = to_store(
            Some(&PositionInput::new("100%", "100%", RelativeTo::ParentPercentage)),
            Some(PARENT),
        )
        .unwrap();
        assert_eq!((full.position.x, full.position.y), (400.0, 300.0));
        assert_eq!(full.position.relative_to.as_deref(), Some("parent_top_left"));
    }

    #[test]
    fn test_percentage_out_of_range_is_rejected() {
        let err = to_store(
            Some(&PositionInput::new("120%", "10%", RelativeTo::ParentPercentage)),
            Some(PARENT),
        )
        .unwrap_err();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::OutOfBounds(_))
        ));
        assert!(err.to_string().contains("x=120%"));
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_percentage_requires_percent_suffix() {
        let err = to_store(
            Some(&PositionInput::new("50", "10%", RelativeTo::ParentPercentage)),
            Some(PARENT),
        )
        .unwrap_err();
        assert!(matches!(
            BoardError::classify(&err),
            Some(BoardError::Validation(_))
        ));
    }

    #[test]
    fn test_negative_top_left_is_clamped_with_warning() {
        let t = to_store(
            Some(&PositionInput::new(-5.0, 20.0, RelativeTo::ParentTopLeft)),
            Some(PARENT),
        )
        .unwrap();
        assert_eq!((t.position.x, t.position.y), (0.0, 20.0));
        assert_eq!(t.warnings.len(), 1);
        assert!(t.warnings[0].contains("clamped"));
    }

    #[test]
    fn test_top_left_beyond_parent_is_rejected() {
        let err = to_store(
            Some(&PositionInput::new(10.0, 301.0, RelativeTo::ParentTopLeft)),
            Some(PARENT),
        )
        .unwrap_err();
        assert!(err.to_string().contains("y=301"));
        assert!(err.to_string().contains("height"));
    }

    #[test]
    fn test_parent_center_and_bottom_right() {
        let c = to_store(
            Some(&PositionInput::new(0.0, 0.0, RelativeTo::ParentCenter)),
            Some(PARENT),
        )
        .unwrap();
        assert_eq!((c.position.x, c.position.y), (200.0, 150.0));

        let br = to_store(
            Some(&PositionInput::new(0.0, 0.0, RelativeTo::ParentBottomRight)),
            Some(PARENT),
        )
        .unwrap();
        assert_eq!((br.position.x, br.position.y), (400.0, 300.0));
    }

    #[test]
    fn test_parent_center_origin_is_corrected() {
        let mut input = PositionInput::new(1.0, 1.0, RelativeTo::ParentCenter);
        input.origin = Some("top_left".to_string());
        let t = to_store(Some(&input), Some(PARENT)).unwrap();
        assert_eq!(t.position.origin.as_deref(), Some("center"));
        assert_eq!(t.warnings.len(), 1);
    }

    #[test]
    fn test_defaults_depend_on_parent() {
        let root = to_store(None, None).unwrap();
        assert_eq!(root.requested_frame(), RelativeTo::CanvasCenter);
        assert_eq!((root.position.x, root.position.y), (0.0, 0.0));

        let child = to_store(None, Some(PARENT)).unwrap();
        assert_eq!(child.requested_frame(), RelativeTo::ParentTopLeft);

        let no_frame = PositionInput {
            x: Coord::from("15"),
            y: Coord::Number(30.0),
            origin: None,
            relative_to: None,
        };
        let t = to_store(Some(&no_frame), Some(PARENT)).unwrap();
        assert_eq!(t.requested_frame(), RelativeTo::ParentTopLeft);
        assert_eq!((t.position.x, t.position.y), (15.0, 30.0));
    }

    #[test]
    fn test_frame_parent_mismatch_is_rejected() {
        assert!(to_store(
            Some(&PositionInput::new(0.0, 0.0, RelativeTo::ParentCenter)),
            None
        )
        .is_err());
        assert!(to_store(
            Some(&PositionInput::new(0.0, 0.0, RelativeTo::CanvasCenter)),
            Some(PARENT)
        )
        .is_err());
    }

    #[test]
    fn test_echo_position_as_percentage() {
        let stored = Position {
            x: 100.0,
            y: 150.0,
            origin: Some("center".to_string()),
            relative_to: Some("parent_top_left".to_string()),
        };
        let echoed = echo_position(&stored, RelativeTo::ParentPercentage, Some(PARENT)).unwrap();
        assert_eq!(echoed.x, Coord::Text("25%".to_string()));
        assert_eq!(echoed.y, Coord::Text("50%".to_string()));

        assert!(echo_position(&stored, RelativeTo::CanvasCenter, None).is_err());
    }

    #[test]
    fn test_deserializes_caller_input() {
        let input: PositionInput = serde_json::from_value(serde_json::json!({
            "x": "50%", "y": "25%", "relativeTo": "parent_percentage"
        }))
        .unwrap();
        assert_eq!(input.relative_to, Some(RelativeTo::ParentPercentage));
        assert_eq!(input.x, Coord::Text("50%".to_string()));
    }
}
