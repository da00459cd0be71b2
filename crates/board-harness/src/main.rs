//! # Board Harness CLI (`board`)
//!
//! ## Usage
//!
//! ```bash
//! board --config ./config/board.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `board serve mcp` | Serve the tools over MCP stdio |
//! | `board serve http` | REST tool endpoints plus MCP streamable HTTP on `[server].bind` |
//! | `board snapshot` | Print a board snapshot |
//! | `board hierarchy` | Print a containment tree |
//! | `board analyze` | Report duplicate, orphaned, and over-connected connectors |
//! | `board translate` | Convert a position between reference frames offline |
//! | `board tools` | List the registered tools |
//!
//! ## Examples
//!
//! ```bash
//! # Sticky notes mentioning "launch", as JSON
//! board snapshot --type sticky_note --search launch --json
//!
//! # Everything inside a frame, three levels deep
//! board hierarchy --id 3458764517517818867 --depth 3
//!
//! # Where does "25%" of a 400-wide frame land?
//! board translate --relative-to parent_percentage --x 25% --y 50% --width 400 --height 300
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use board_harness::cli::{self, HierarchyArgs, SnapshotArgs, TranslateArgs};
use board_harness::config::{self, Config};
use board_harness::logging::init_logging;
use board_harness::mcp::McpBridge;
use board_harness::server;
use board_harness::traits::{ToolContext, ToolRegistry};
use clap::{Parser, Subcommand};

/// Board Harness: structured, connected snapshots of a canvas board for AI
/// tools.
#[derive(Parser)]
#[command(
    name = "board",
    about = "Board Harness: aggregate a canvas board into structured snapshots and serve them over MCP",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/board.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tool server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Snapshot a board: items, frames, tags, and a structural summary.
    Snapshot {
        /// Board id; defaults to `[api].board_id`.
        #[arg(long)]
        board: Option<String>,

        /// Only direct children of this frame.
        #[arg(long)]
        frame: Option<String>,

        /// Only items of this type (e.g. `sticky_note`).
        #[arg(long = "type")]
        item_type: Option<String>,

        /// Case-insensitive match on content, id, or type.
        #[arg(long)]
        search: Option<String>,

        /// Listing cap, 0 for unlimited; defaults to `[snapshot].max_items`.
        #[arg(long)]
        max_items: Option<usize>,

        /// Include connectors, connectivity, and connection analysis.
        #[arg(long)]
        connectivity: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the containment tree under an item or under every item of a type.
    Hierarchy {
        #[arg(long)]
        board: Option<String>,

        /// Root item id.
        #[arg(long, conflicts_with = "item_type", required_unless_present = "item_type")]
        id: Option<String>,

        /// Root every item of this type.
        #[arg(long = "type")]
        item_type: Option<String>,

        /// Levels below the roots (1-10); defaults to `[snapshot].default_depth`.
        #[arg(long)]
        depth: Option<usize>,

        #[arg(long)]
        no_connectors: bool,

        #[arg(long)]
        no_tags: bool,

        #[arg(long)]
        no_content: bool,

        #[arg(long)]
        json: bool,
    },

    /// Structural analysis of the board's connectors.
    Analyze {
        #[arg(long)]
        board: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Convert a position between a reference frame and the store's frame.
    Translate {
        /// canvas_center, parent_top_left, parent_center, parent_bottom_right
        /// or parent_percentage.
        #[arg(long)]
        relative_to: String,

        #[arg(long, allow_hyphen_values = true)]
        x: String,

        #[arg(long, allow_hyphen_values = true)]
        y: String,

        /// Parent width, for parent-relative frames.
        #[arg(long, requires = "height")]
        width: Option<f64>,

        /// Parent height, for parent-relative frames.
        #[arg(long, requires = "width")]
        height: Option<f64>,

        /// Translate a store-frame position into `--relative-to`.
        #[arg(long)]
        inverse: bool,
    },

    /// List the registered tools.
    Tools,
}

#[derive(Subcommand)]
enum ServeService {
    /// MCP over stdio, for clients that spawn the server.
    Mcp,
    /// REST endpoints plus MCP streamable HTTP at `/mcp`.
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that need no board run without a config file.
    match &cli.command {
        Commands::Tools => {
            cli::list_tools(&ToolRegistry::with_builtins());
            return Ok(());
        }
        Commands::Translate {
            relative_to,
            x,
            y,
            width,
            height,
            inverse,
        } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            init_logging(&cfg.logging);
            cli::run_translate(TranslateArgs {
                relative_to: relative_to.parse()?,
                x: x.clone(),
                y: y.clone(),
                width: *width,
                height: *height,
                inverse: *inverse,
            })
            .await?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    init_logging(&cfg.logging);
    if let Commands::Serve {
        service: ServeService::Http,
    } = &cli.command
    {
        return server::run_server(&cfg).await;
    }
    let ctx = ToolContext::from_config(Arc::new(cfg))?;

    match cli.command {
        Commands::Serve { .. } => {
            let tools = Arc::new(ToolRegistry::with_builtins());
            McpBridge::new(Arc::new(ctx), tools).serve_stdio().await?;
        }
        Commands::Snapshot {
            board,
            frame,
            item_type,
            search,
            max_items,
            connectivity,
            json,
        } => {
            cli::run_snapshot(
                &ctx,
                SnapshotArgs {
                    board,
                    frame,
                    item_type,
                    search,
                    max_items,
                    connectivity,
                    json,
                },
            )
            .await?;
        }
        Commands::Hierarchy {
            board,
            id,
            item_type,
            depth,
            no_connectors,
            no_tags,
            no_content,
            json,
        } => {
            cli::run_hierarchy(
                &ctx,
                HierarchyArgs {
                    board,
                    id,
                    item_type,
                    depth,
                    connectors: !no_connectors,
                    tags: !no_tags,
                    content: !no_content,
                    json,
                },
            )
            .await?;
        }
        Commands::Analyze { board, json } => {
            cli::run_analyze(&ctx, board.as_deref(), json).await?;
        }
        Commands::Tools | Commands::Translate { .. } => {}
    }

    Ok(())
}
