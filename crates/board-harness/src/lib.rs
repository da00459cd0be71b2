//! # Board Harness
//!
//! An MCP tool server over a remote canvas board. The aggregation engine
//! lives in [`board_harness_core`]; this crate supplies everything around
//! it: configuration, the REST client for the board API, the tool surface,
//! and the transports that expose it.
//!
//! # Architecture
//!
//! ```text
//!  board CLI ──┐
//!  /tools/*  ──┼──► ToolRegistry ──► engine (board_harness_core)
//!  MCP       ──┘         │                  │
//!                        ▼                  ▼
//!                   HistoryLedger     RestBoard ──► board REST API
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`client`] | REST implementation of the board source and writer |
//! | [`traits`] | `Tool` trait, `ToolContext`, built-in tools, `ToolRegistry` |
//! | [`params`] | Tool parameter decoding |
//! | [`items`] | Item lookup, create, update, and position translation |
//! | [`mcp`] | MCP protocol bridge (stdio and streamable HTTP) |
//! | [`server`] | HTTP server: REST tool endpoints and `/mcp` |
//! | [`cli`] | Runners behind the `board` binary |

pub mod cli;
pub mod client;
pub mod config;
pub mod items;
pub mod logging;
pub mod mcp;
pub mod params;
pub mod server;
pub mod traits;
