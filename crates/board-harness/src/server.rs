//! HTTP server: REST tool endpoints plus MCP streamable HTTP.
//!
//! Every tool in the [`ToolRegistry`] is reachable two ways: through the
//! JSON endpoints below, and through MCP JSON-RPC at `/mcp`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `*`    | `/mcp` | MCP streamable HTTP transport |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "item_hierarchy: item not found: 42" } }
//! ```
//!
//! | Code | Status | Raised for |
//! |------|--------|------------|
//! | `bad_request` | 400 | invalid parameters, out-of-bounds coordinates |
//! | `not_found` | 404 | unknown tool, or a board/item/frame/parent that does not resolve |
//! | `upstream_error` | 502 | the board API answered with a failure status |
//! | `tool_error` | 500 | anything else |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use board_harness_core::error::BoardError;
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::mcp::McpBridge;
use crate::traits::{ToolContext, ToolRegistry};

/// Shared state passed to the REST handlers.
#[derive(Clone)]
struct AppState {
    ctx: Arc<ToolContext>,
    tools: Arc<ToolRegistry>,
}

/// Build the application router.
pub fn router(ctx: Arc<ToolContext>, tools: Arc<ToolRegistry>) -> Router {
    let mcp = McpBridge::new(ctx.clone(), tools.clone());
    let mcp_config = StreamableHttpServerConfig {
        stateful_mode: true,
        ..StreamableHttpServerConfig::default()
    };
    let mcp_service = StreamableHttpService::new(
        move || Ok(mcp.clone()),
        Arc::new(LocalSessionManager::default()),
        mcp_config,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .with_state(AppState { ctx, tools })
        .nest_service("/mcp", mcp_service)
        .layer(cors)
}

/// Serve on an already-bound listener until the process stops.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ToolContext>,
    tools: Arc<ToolRegistry>,
) -> anyhow::Result<()> {
    let app = router(ctx, tools);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Bind `[server].bind` and serve the built-in tools against the REST
/// board client.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let ctx = Arc::new(ToolContext::from_config(Arc::new(config.clone()))?);
    let tools = Arc::new(ToolRegistry::with_builtins());

    for t in tools.tools() {
        info!(tool = t.name(), "POST /tools/{}", t.name());
    }

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("board server listening on http://{} (MCP at /mcp)", bind_addr);
    serve(listener, ctx, tools).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

/// Map a tool failure to a status by its [`BoardError`] class.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {:#}", tool_name, err);
    match BoardError::classify(&err) {
        Some(BoardError::Validation(_)) | Some(BoardError::OutOfBounds(_)) => {
            app_error(StatusCode::BAD_REQUEST, "bad_request", message)
        }
        Some(BoardError::NotFound { .. }) => app_error(StatusCode::NOT_FOUND, "not_found", message),
        Some(BoardError::Upstream { .. }) => {
            app_error(StatusCode::BAD_GATEWAY, "upstream_error", message)
        }
        None => app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    read_only: bool,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            read_only: t.is_read_only(),
            parameters: t.parameters_schema(),
        })
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        app_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    let params = match params {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        serde_json::Value::Object(map) => serde_json::Value::Object(map),
        _ => {
            return Err(app_error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "tool parameters must be a JSON object",
            ))
        }
    };

    let result = tool.execute(params, &state.ctx).await.map_err(|e| {
        warn!(tool = %name, error = %e, "tool call failed");
        classify_tool_error(&name, e)
    })?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let cases: Vec<(anyhow::Error, StatusCode, &str)> = vec![
            (
                BoardError::Validation("x".into()).into(),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                BoardError::OutOfBounds("x".into()).into(),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                BoardError::not_found("frame", "f9").into(),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                BoardError::Upstream {
                    status: 429,
                    message: "slow down".into(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
                "upstream_error",
            ),
            (
                anyhow::anyhow!("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "tool_error",
            ),
        ];
        for (err, status, code) in cases {
            let e = classify_tool_error("t", err);
            assert_eq!(e.status, status);
            assert_eq!(e.code, code);
            assert!(e.message.starts_with("t: "));
        }
    }

    #[test]
    fn test_context_is_kept_in_message() {
        let err = anyhow::Error::from(BoardError::not_found("item", "42"))
            .context("failed to resolve hierarchy root");
        let e = classify_tool_error("item_hierarchy", err);
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert!(e.message.contains("item not found: 42"));
    }
}
