//! Best-effort coercion of loosely-typed geometry and style payloads.
//!
//! Callers frequently send numbers as strings (`"width": "200"`). The store
//! rejects those, so the numeric fields listed in [`NUMERIC_FIELDS`] are
//! coerced to JSON numbers. Nothing here fails: a value that does not parse
//! is left exactly as it was, and absent fields stay absent.

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::models::ItemType;

/// Fields coerced from numeric strings to numbers.
pub const NUMERIC_FIELDS: [&str; 6] = [
    "width",
    "height",
    "rotation",
    "fontSize",
    "borderWidth",
    "borderOpacity",
];

/// Named colours accepted for sticky note fills.
pub const STICKY_NOTE_COLORS: [&str; 16] = [
    "gray",
    "light_yellow",
    "yellow",
    "orange",
    "light_green",
    "green",
    "dark_green",
    "cyan",
    "light_pink",
    "pink",
    "violet",
    "red",
    "light_blue",
    "blue",
    "dark_blue",
    "black",
];

fn coerce(value: &Value) -> Option<Value> {
    let text = value.as_str()?.trim();
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Coerce the numeric fields of `map` in place.
pub fn coerce_numeric_fields(map: &mut Map<String, Value>) {
    for field in NUMERIC_FIELDS {
        if let Some(value) = map.get_mut(field) {
            if let Some(number) = coerce(value) {
                *value = number;
            }
        }
    }
}

/// Normalize a geometry payload. Non-object input is returned unchanged.
pub fn normalize_geometry(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            coerce_numeric_fields(&mut map);
            Value::Object(map)
        }
        other => other,
    }
}

/// Style keys the store accepts for each item type. `None` means the type's
/// vocabulary is not narrowed.
fn style_vocabulary(item_type: &ItemType) -> Option<&'static [&'static str]> {
    match item_type {
        ItemType::StickyNote => Some(&["fillColor", "textAlign", "textAlignVertical"]),
        ItemType::Text => Some(&[
            "color",
            "fillColor",
            "fillOpacity",
            "fontFamily",
            "fontSize",
            "textAlign",
        ]),
        ItemType::Shape => Some(&[
            "borderColor",
            "borderOpacity",
            "borderStyle",
            "borderWidth",
            "color",
            "fillColor",
            "fillOpacity",
            "fontFamily",
            "fontSize",
            "textAlign",
            "textAlignVertical",
        ]),
        ItemType::Card => Some(&["cardTheme"]),
        ItemType::AppCard => Some(&["cardTheme", "fillBackground"]),
        ItemType::Frame => Some(&["fillColor"]),
        ItemType::Connector => Some(&[
            "color",
            "endStrokeCap",
            "fontSize",
            "startStrokeCap",
            "strokeColor",
            "strokeStyle",
            "strokeWidth",
            "textOrientation",
        ]),
        _ => None,
    }
}

/// Normalize a style payload for `item_type`: coerce numeric fields, then
/// drop keys outside the type's vocabulary. Returns the normalized style and
/// one warning per dropped key.
pub fn normalize_style(item_type: &ItemType, value: Value) -> (Value, Vec<String>) {
    let Value::Object(mut map) = value else {
        return (value, Vec::new());
    };
    coerce_numeric_fields(&mut map);

    let mut warnings = Vec::new();
    if let Some(vocabulary) = style_vocabulary(item_type) {
        map.retain(|key, _| {
            let keep = vocabulary.contains(&key.as_str());
            if !keep {
                warnings.push(format!(
                    "style.{} is not supported for {} items; dropped",
                    key, item_type
                ));
            }
            keep
        });
    }

    if *item_type == ItemType::StickyNote {
        let invalid = map
            .get("fillColor")
            .and_then(Value::as_str)
            .filter(|c| !STICKY_NOTE_COLORS.contains(c))
            .map(str::to_string);
        if let Some(color) = invalid {
            map.remove("fillColor");
            warnings.push(format!(
                "style.fillColor '{}' is not a sticky note colour; dropped",
                color
            ));
        }
    }

    for w in &warnings {
        warn!("{}", w);
    }
    (Value::Object(map), warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerces_numeric_strings() {
        let g = normalize_geometry(json!({ "width": "200", "height": "75.5", "rotation": 15 }));
        assert_eq!(g, json!({ "width": 200, "height": 75.5, "rotation": 15 }));
    }

    #[test]
    fn test_unparseable_is_left_alone() {
        let g = normalize_geometry(json!({ "width": "wide", "height": null }));
        assert_eq!(g, json!({ "width": "wide", "height": null }));
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let g = normalize_geometry(json!({ "width": "10" }));
        assert!(g.get("height").is_none());
        assert_eq!(normalize_geometry(json!("oops")), json!("oops"));
    }

    #[test]
    fn test_style_narrowing_drops_foreign_keys() {
        let (style, warnings) = normalize_style(
            &ItemType::StickyNote,
            json!({ "fillColor": "yellow", "fontSize": "14", "strokeWidth": "2" }),
        );
        assert_eq!(style, json!({ "fillColor": "yellow" }));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_sticky_note_hex_fill_is_dropped() {
        let (style, warnings) =
            normalize_style(&ItemType::StickyNote, json!({ "fillColor": "#ff0000" }));
        assert_eq!(style, json!({}));
        assert!(warnings[0].contains("#ff0000"));
    }

    #[test]
    fn test_shape_style_coerces_border() {
        let (style, warnings) = normalize_style(
            &ItemType::Shape,
            json!({ "borderWidth": "3", "borderOpacity": "0.5", "fillColor": "#ffffff" }),
        );
        assert_eq!(
            style,
            json!({ "borderWidth": 3, "borderOpacity": 0.5, "fillColor": "#ffffff" })
        );
        assert!(warnings.is_empty());
    }
}
