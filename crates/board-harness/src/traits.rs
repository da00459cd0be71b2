//! Tool trait, execution context, and registry.
//!
//! Every tool the server exposes implements [`Tool`] and is registered in a
//! [`ToolRegistry`]. The same registry backs the REST endpoints
//! (`GET /tools/list`, `POST /tools/{name}`) and the MCP bridge, so both
//! surfaces always agree on names, schemas, and behaviour.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │  board_snapshot  item_hierarchy  get_item    │
//! │  connection_analysis  create_item  ...       │
//! └──────────────┬───────────────────────────────┘
//!                ▼
//!   ToolContext ──► BoardResolver ──► dyn Board
//!        │
//!        └──────► HistoryLedger
//! ```
//!
//! Tools reach the remote board through [`ToolContext::board`], which
//! resolves the optional `board_id` parameter against `[api].board_id`.

use anyhow::Result;
use async_trait::async_trait;
use board_harness_core::analysis::analyze_board;
use board_harness_core::error::BoardError;
use board_harness_core::hierarchy::project;
use board_harness_core::history::HistoryLedger;
use board_harness_core::snapshot::compose;
use board_harness_core::source::Board;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::client::RestBoards;
use crate::config::Config;
use crate::items::{
    create_item, get_item, translate_position, update_item, CreateItemParams, GetItemParams,
    TranslateParams, UpdateItemParams,
};
use crate::params::{parse_params, HierarchyParams, HistoryParams, SnapshotParams};

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// # Lifecycle
///
/// 1. The tool is registered via [`ToolRegistry::register`].
/// 2. [`name`](Tool::name), [`description`](Tool::description), and
///    [`parameters_schema`](Tool::parameters_schema) feed the tool list.
/// 3. [`execute`](Tool::execute) runs once per invocation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, used as the route path
    /// (`POST /tools/{name}`) and the MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether the tool writes to the board. Surfaces as the MCP
    /// `readOnlyHint` annotation.
    fn is_read_only(&self) -> bool {
        true
    }

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. `params` is always a JSON object. The returned
    /// value is wrapped in `{ "result": ... }` by the HTTP server.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Maps an optional board id to a board client.
pub trait BoardResolver: Send + Sync {
    fn board(&self, board_id: Option<&str>) -> Result<Arc<dyn Board>>;
}

/// Resolver that always answers with the same board, whatever id is asked
/// for. Used for tests and demos over an in-memory board.
pub struct SingleBoard {
    board: Arc<dyn Board>,
}

impl SingleBoard {
    pub fn new(board: Arc<dyn Board>) -> Self {
        Self { board }
    }
}

impl BoardResolver for SingleBoard {
    fn board(&self, _board_id: Option<&str>) -> Result<Arc<dyn Board>> {
        Ok(self.board.clone())
    }
}

/// Shared state handed to every tool invocation.
pub struct ToolContext {
    config: Arc<Config>,
    boards: Arc<dyn BoardResolver>,
    history: Arc<HistoryLedger>,
}

impl ToolContext {
    pub fn new(
        config: Arc<Config>,
        boards: Arc<dyn BoardResolver>,
        history: Arc<HistoryLedger>,
    ) -> Self {
        Self {
            config,
            boards,
            history,
        }
    }

    /// Context backed by the REST client, with a fresh history ledger.
    /// Fails when no API token is configured.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let boards = RestBoards::from_config(&config.api)?;
        let history = HistoryLedger::new(config.snapshot.history_capacity);
        Ok(Self::new(config, Arc::new(boards), Arc::new(history)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// Parallel lookups allowed within one call.
    pub fn concurrency(&self) -> usize {
        self.config.api.max_concurrency
    }

    pub fn board(&self, board_id: Option<&str>) -> Result<Arc<dyn Board>> {
        self.boards.board(board_id)
    }

    /// Resolve the board named by the `board_id` parameter, if any.
    pub fn board_for(&self, params: &Value) -> Result<Arc<dyn Board>> {
        let board_id = match params.get("board_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.as_str()),
            Some(other) => {
                return Err(BoardError::Validation(format!(
                    "board_id must be a string, got {}",
                    other
                ))
                .into())
            }
        };
        self.board(board_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

const BOARD_ID_SCHEMA: &str = "Board id; defaults to [api].board_id";

fn position_schema() -> Value {
    json!({
        "type": "object",
        "description": "x/y as numbers, or \"NN%\" strings with relativeTo parent_percentage",
        "properties": {
            "x": { "type": ["number", "string"] },
            "y": { "type": ["number", "string"] },
            "origin": { "type": "string", "default": "center" },
            "relativeTo": {
                "type": "string",
                "enum": ["canvas_center", "parent_top_left", "parent_center", "parent_bottom_right", "parent_percentage"]
            }
        },
        "required": ["x", "y"]
    })
}

pub struct BoardSnapshotTool;

#[async_trait]
impl Tool for BoardSnapshotTool {
    fn name(&self) -> &str {
        "board_snapshot"
    }

    fn description(&self) -> &str {
        "Snapshot a board: items, frames, groups, tags, connectors, analysis and summary"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA },
                "frame_id": { "type": "string", "description": "Only direct children of this frame" },
                "item_type": { "type": "string", "description": "Only items of this type" },
                "search": { "type": "string", "description": "Case-insensitive match on content, id, or type" },
                "max_items": { "type": "integer", "description": "Cap on returned items, 0 for unlimited" },
                "include_content": { "type": "boolean", "default": true },
                "include_frames": { "type": "boolean", "default": true },
                "include_groups": { "type": "boolean", "default": true },
                "include_tags": { "type": "boolean", "default": true },
                "include_comments": { "type": "boolean", "default": false },
                "include_connectors": { "type": "boolean", "default": false },
                "include_analysis": { "type": "boolean", "default": true },
                "include_summary": { "type": "boolean", "default": true },
                "include_history": { "type": "boolean", "default": false },
                "history_limit": { "type": "integer", "default": 10 }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let board = ctx.board_for(&params)?;
        let request = parse_params::<SnapshotParams>(params)?.into_request(ctx.config())?;
        let snapshot = compose(
            board.as_ref(),
            &request,
            Some(ctx.history()),
            ctx.concurrency(),
        )
        .await?;
        info!(
            board = %snapshot.board.id,
            items = snapshot.items.len(),
            limit_reached = snapshot.metadata.limit_reached,
            "board_snapshot"
        );
        Ok(serde_json::to_value(&snapshot)?)
    }
}

pub struct ItemHierarchyTool;

#[async_trait]
impl Tool for ItemHierarchyTool {
    fn name(&self) -> &str {
        "item_hierarchy"
    }

    fn description(&self) -> &str {
        "Containment tree rooted at an item id or at every item of a type"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA },
                "item_id": { "type": "string", "description": "Root item id" },
                "item_type": { "type": "string", "description": "Root every item of this type" },
                "max_depth": { "type": "integer", "minimum": 1, "maximum": 10 },
                "include_connectors": { "type": "boolean", "default": true },
                "include_tags": { "type": "boolean", "default": true },
                "include_content": { "type": "boolean", "default": true }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let request = parse_params::<HierarchyParams>(params.clone())?.into_request(ctx.config())?;
        request.validate()?;
        let board = ctx.board_for(&params)?;
        let hierarchy = project(board.as_ref(), &request, ctx.concurrency()).await?;
        info!(
            roots = hierarchy.metadata.root_count,
            nodes = hierarchy.metadata.total_nodes,
            "item_hierarchy"
        );
        Ok(serde_json::to_value(&hierarchy)?)
    }
}

pub struct ConnectionAnalysisTool;

#[async_trait]
impl Tool for ConnectionAnalysisTool {
    fn name(&self) -> &str {
        "connection_analysis"
    }

    fn description(&self) -> &str {
        "Find duplicate connectors, orphaned connectors, and over-connected items"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let board = ctx.board_for(&params)?;
        let analysis = analyze_board(board.as_ref()).await?;
        Ok(serde_json::to_value(&analysis)?)
    }
}

pub struct GetItemTool;

#[async_trait]
impl Tool for GetItemTool {
    fn name(&self) -> &str {
        "get_item"
    }

    fn description(&self) -> &str {
        "Fetch one item, optionally echoing its position in a parent-relative frame"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA },
                "item_id": { "type": "string" },
                "relative_to": {
                    "type": "string",
                    "enum": ["canvas_center", "parent_top_left", "parent_center", "parent_bottom_right", "parent_percentage"]
                }
            },
            "required": ["item_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let board = ctx.board_for(&params)?;
        let params: GetItemParams = parse_params(params)?;
        let fetched = get_item(board.as_ref(), &params).await?;
        Ok(serde_json::to_value(&fetched)?)
    }
}

pub struct CreateItemTool;

#[async_trait]
impl Tool for CreateItemTool {
    fn name(&self) -> &str {
        "create_item"
    }

    fn description(&self) -> &str {
        "Create an item or connector; positions may be given in any reference frame"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA },
                "type": { "type": "string", "description": "Item type, e.g. sticky_note, shape, text, frame, connector" },
                "data": { "type": "object" },
                "style": { "type": "object" },
                "geometry": { "type": "object" },
                "position": position_schema(),
                "parent_id": { "type": "string", "description": "Frame to place the item in" },
                "start_item_id": { "type": "string", "description": "Connector start (connectors only)" },
                "end_item_id": { "type": "string", "description": "Connector end (connectors only)" }
            },
            "required": ["type"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let board = ctx.board_for(&params)?;
        let params: CreateItemParams = parse_params(params)?;
        let written = create_item(board.as_ref(), ctx.history(), &params).await?;
        Ok(serde_json::to_value(&written)?)
    }
}

pub struct UpdateItemTool;

#[async_trait]
impl Tool for UpdateItemTool {
    fn name(&self) -> &str {
        "update_item"
    }

    fn description(&self) -> &str {
        "Update an item's content, style, geometry, position, or parent"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA },
                "item_id": { "type": "string" },
                "data": { "type": "object" },
                "style": { "type": "object" },
                "geometry": { "type": "object" },
                "position": position_schema(),
                "parent_id": { "type": "string", "description": "Move the item into this frame" }
            },
            "required": ["item_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let board = ctx.board_for(&params)?;
        let params: UpdateItemParams = parse_params(params)?;
        let written = update_item(board.as_ref(), ctx.history(), &params).await?;
        Ok(serde_json::to_value(&written)?)
    }
}

pub struct TranslatePositionTool;

#[async_trait]
impl Tool for TranslatePositionTool {
    fn name(&self) -> &str {
        "translate_position"
    }

    fn description(&self) -> &str {
        "Convert a position between a reference frame and the store's frame"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_id": { "type": "string", "description": BOARD_ID_SCHEMA },
                "x": { "type": ["number", "string"] },
                "y": { "type": ["number", "string"] },
                "relative_to": {
                    "type": "string",
                    "enum": ["canvas_center", "parent_top_left", "parent_center", "parent_bottom_right", "parent_percentage"]
                },
                "origin": { "type": "string" },
                "parent_id": { "type": "string", "description": "Read the parent size from this item" },
                "parent_width": { "type": "number" },
                "parent_height": { "type": "number" },
                "inverse": { "type": "boolean", "default": false, "description": "Store frame to relative_to instead" }
            },
            "required": ["x", "y", "relative_to"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let raw = params.clone();
        let params: TranslateParams = parse_params(params)?;
        let board = match params.parent_id {
            Some(_) => Some(ctx.board_for(&raw)?),
            None => None,
        };
        let translated = translate_position(board.as_deref(), &params).await?;
        Ok(serde_json::to_value(&translated)?)
    }
}

pub struct RecentHistoryTool;

#[async_trait]
impl Tool for RecentHistoryTool {
    fn name(&self) -> &str {
        "recent_history"
    }

    fn description(&self) -> &str {
        "Items recently created or modified through this server, newest first"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": 10 }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: HistoryParams = parse_params(params)?;
        let recent = ctx.history().recent(params.limit);
        Ok(serde_json::to_value(&recent)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-loaded with every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BoardSnapshotTool));
        registry.register(Box::new(ItemHierarchyTool));
        registry.register(Box::new(ConnectionAnalysisTool));
        registry.register(Box::new(GetItemTool));
        registry.register(Box::new(CreateItemTool));
        registry.register(Box::new(UpdateItemTool));
        registry.register(Box::new(TranslatePositionTool));
        registry.register(Box::new(RecentHistoryTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_have_unique_names_and_object_schemas() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 8);
        let mut names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        for tool in registry.tools() {
            assert_eq!(tool.parameters_schema()["type"], "object", "{}", tool.name());
        }
    }

    #[test]
    fn test_only_writers_are_not_read_only() {
        let registry = ToolRegistry::with_builtins();
        let writers: Vec<&str> = registry
            .tools()
            .iter()
            .filter(|t| !t.is_read_only())
            .map(|t| t.name())
            .collect();
        assert_eq!(writers, ["create_item", "update_item"]);
    }

    #[test]
    fn test_find_unknown_tool() {
        let registry = ToolRegistry::with_builtins();
        assert!(registry.find("get_item").is_some());
        assert!(registry.find("delete_board").is_none());
        assert!(ToolRegistry::default().is_empty());
    }
}
