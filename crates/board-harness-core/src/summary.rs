//! Short plain-text synopses of items.
//!
//! Used for free-text search, duplicate spotting, hierarchy annotations, and
//! history labels. [`summarize`] is total: malformed or missing payloads
//! yield `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Item, ItemContent};

/// Card descriptions longer than this are truncated.
pub const DESCRIPTION_LIMIT: usize = 50;

const ELLIPSIS: &str = "...";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip HTML tags, decode the common entities, and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn text_summary(content: Option<&str>) -> Option<String> {
    let stripped = strip_html(content?);
    (!stripped.is_empty()).then_some(stripped)
}

/// Truncate to [`DESCRIPTION_LIMIT`] characters, replacing the tail with an
/// ellipsis so the result is exactly the limit long.
fn truncate_description(description: &str) -> String {
    if description.chars().count() <= DESCRIPTION_LIMIT {
        return description.to_string();
    }
    let keep = DESCRIPTION_LIMIT - ELLIPSIS.len();
    let mut out: String = description.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn card_summary(title: Option<&str>, description: Option<&str>) -> Option<String> {
    let title = non_empty(title);
    let description = non_empty(description).map(truncate_description);
    match (title, description) {
        (Some(t), Some(d)) => Some(format!("{}: {}", t, d)),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(d)) => Some(d),
        (None, None) => None,
    }
}

/// Derive a synopsis for `item`, or `None` when its type carries no text.
pub fn summarize(item: &Item) -> Option<String> {
    match &item.content {
        ItemContent::Text(d) => text_summary(d.content.as_deref()),
        ItemContent::StickyNote(d) => text_summary(d.content.as_deref()),
        ItemContent::Shape(d) => text_summary(d.content.as_deref()),
        ItemContent::Card(d) => card_summary(d.title.as_deref(), d.description.as_deref()),
        ItemContent::AppCard(d) => card_summary(d.title.as_deref(), d.description.as_deref()),
        ItemContent::Document(d) => non_empty(d.title.as_deref()).map(str::to_string),
        ItemContent::Image(d) => non_empty(d.title.as_deref()).map(str::to_string),
        ItemContent::Frame(d) => non_empty(d.title.as_deref()).map(str::to_string),
        ItemContent::Embed(_)
        | ItemContent::Connector(_)
        | ItemContent::Preview(_)
        | ItemContent::Other { .. } => None,
    }
}
