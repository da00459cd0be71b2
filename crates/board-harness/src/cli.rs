//! Command runners behind the `board` binary.
//!
//! Each runner drives the same engine path as the matching tool and prints
//! either pretty JSON (`--json`) or a compact text rendering.

use anyhow::Result;
use board_harness_core::analysis::{analyze_board, ConnectionAnalysis};
use board_harness_core::coords::{Coord, RelativeTo};
use board_harness_core::hierarchy::{project, Hierarchy, HierarchyNode, HierarchyRequest};
use board_harness_core::models::ItemType;
use board_harness_core::snapshot::{compose, BoardSnapshot, SnapshotRequest};

use crate::items::{translate_position, TranslateParams};
use crate::traits::{ToolContext, ToolRegistry};

pub struct SnapshotArgs {
    pub board: Option<String>,
    pub frame: Option<String>,
    pub item_type: Option<String>,
    pub search: Option<String>,
    pub max_items: Option<usize>,
    pub connectivity: bool,
    pub json: bool,
}

pub struct HierarchyArgs {
    pub board: Option<String>,
    pub id: Option<String>,
    pub item_type: Option<String>,
    pub depth: Option<usize>,
    pub connectors: bool,
    pub tags: bool,
    pub content: bool,
    pub json: bool,
}

pub struct TranslateArgs {
    pub relative_to: RelativeTo,
    pub x: String,
    pub y: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub inverse: bool,
}

fn parse_type(item_type: Option<&str>) -> Result<Option<ItemType>> {
    item_type.map(str::parse::<ItemType>).transpose()
}

/// A command-line coordinate: a number when it parses as one, otherwise
/// text such as `"25%"`.
fn coord_arg(value: &str) -> Coord {
    match value.trim().parse::<f64>() {
        Ok(n) => Coord::Number(n),
        Err(_) => Coord::Text(value.trim().to_string()),
    }
}

pub async fn run_snapshot(ctx: &ToolContext, args: SnapshotArgs) -> Result<()> {
    let board = ctx.board(args.board.as_deref())?;
    let request = SnapshotRequest {
        frame_id: args.frame,
        item_type: parse_type(args.item_type.as_deref())?,
        search: args.search,
        max_items: args.max_items.unwrap_or(ctx.config().snapshot.max_items),
        include_connectors: args.connectivity,
        ..Default::default()
    };
    let snapshot = compose(board.as_ref(), &request, None, ctx.concurrency()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

fn print_snapshot(snapshot: &BoardSnapshot) {
    let board = &snapshot.board;
    println!(
        "Board {} ({})",
        board.name.as_deref().unwrap_or("untitled"),
        board.id
    );
    let meta = &snapshot.metadata;
    println!(
        "{} item(s){}",
        meta.returned_items,
        if meta.limit_reached {
            format!(" (capped at {})", meta.max_items)
        } else {
            String::new()
        }
    );
    if let Some(summary) = &snapshot.summary {
        for (item_type, count) in &summary.items_by_type {
            println!("  {:<12} {}", item_type, count);
        }
        if let (Some(connectors), Some(isolated)) = (summary.total_connectors, summary.isolated_items)
        {
            println!("{} connector(s), {} isolated item(s)", connectors, isolated);
        }
    }
    if let Some(frames) = &snapshot.frames {
        println!();
        println!("Frames:");
        for frame in frames {
            println!(
                "  {} {} ({} child item(s))",
                frame.id,
                frame.title.as_deref().unwrap_or("-"),
                frame.child_item_ids.len()
            );
        }
    }
    println!();
    for item in &snapshot.items {
        println!(
            "  {:<20} {:<12} {}",
            item.item.id,
            item.item.item_type().as_str(),
            item.summary.as_deref().unwrap_or("")
        );
    }
    if let Some(analysis) = &snapshot.connection_analysis {
        println!();
        for line in &analysis.advisories {
            println!("{}", line);
        }
    }
}

pub async fn run_hierarchy(ctx: &ToolContext, args: HierarchyArgs) -> Result<()> {
    let request = HierarchyRequest {
        item_id: args.id,
        item_type: parse_type(args.item_type.as_deref())?,
        max_depth: args.depth.unwrap_or(ctx.config().snapshot.default_depth),
        include_connectors: args.connectors,
        include_tags: args.tags,
        include_content: args.content,
    };
    request.validate()?;
    let board = ctx.board(args.board.as_deref())?;
    let hierarchy = project(board.as_ref(), &request, ctx.concurrency()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&hierarchy)?);
    } else {
        print_hierarchy(&hierarchy);
    }
    Ok(())
}

fn print_node(node: &HierarchyNode) {
    let indent = "  ".repeat(node.depth);
    let links = node.connection_info.total_connections;
    println!(
        "{}{} [{}]{}{}",
        indent,
        node.item.id,
        node.item.item_type(),
        node.summary
            .as_deref()
            .map(|s| format!(" {}", s))
            .unwrap_or_default(),
        if links > 0 {
            format!(" ({} connection(s))", links)
        } else {
            String::new()
        }
    );
    for child in &node.children {
        print_node(child);
    }
}

fn print_hierarchy(hierarchy: &Hierarchy) {
    for root in &hierarchy.roots {
        print_node(root);
    }
    println!(
        "{} root(s), {} node(s), depth {}",
        hierarchy.metadata.root_count, hierarchy.metadata.total_nodes, hierarchy.metadata.max_depth
    );
}

pub async fn run_analyze(ctx: &ToolContext, board: Option<&str>, json: bool) -> Result<()> {
    let board = ctx.board(board)?;
    let analysis = analyze_board(board.as_ref()).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn print_analysis(analysis: &ConnectionAnalysis) {
    println!("{} connector(s)", analysis.total_connectors);
    for dup in &analysis.duplicate_connections {
        println!(
            "  duplicate  {} <-> {}: {}",
            dup.items[0],
            dup.items[1],
            dup.connector_ids.join(", ")
        );
    }
    for orphan in &analysis.orphaned_connectors {
        println!("  orphaned   {}: {}", orphan.connector_id, orphan.reason);
    }
    for spot in &analysis.hot_spots {
        println!(
            "  hot spot   {}: {} connection(s)",
            spot.item_id, spot.connection_count
        );
    }
    println!();
    for line in &analysis.advisories {
        println!("{}", line);
    }
}

pub async fn run_translate(args: TranslateArgs) -> Result<()> {
    let params = TranslateParams {
        x: coord_arg(&args.x),
        y: coord_arg(&args.y),
        relative_to: args.relative_to,
        origin: None,
        parent_id: None,
        parent_width: args.width,
        parent_height: args.height,
        inverse: args.inverse,
    };
    let translated = translate_position(None, &params).await?;
    let p = &translated.position;
    println!(
        "x={} y={} relativeTo={}",
        p.x,
        p.y,
        p.relative_to.map(|r| r.as_str()).unwrap_or("-")
    );
    for warning in &translated.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

pub fn list_tools(tools: &ToolRegistry) {
    for t in tools.tools() {
        let access = if t.is_read_only() { "read" } else { "write" };
        println!("{:<22} {:<6} {}", t.name(), access, t.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_arg() {
        assert_eq!(coord_arg("12.5"), Coord::Number(12.5));
        assert_eq!(coord_arg(" 40% "), Coord::Text("40%".to_string()));
    }
}
