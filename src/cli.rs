#[allow(unused_imports)]
use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "telegram-mcp")]
#[command(about = "Telegram media tools over MCP, backed by a local media cache", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the MCP server on stdin/stdout.
    Serve {
        /// Cache directory (default: ~/.telegram-mcp/media, or TELEGRAM_MCP_MEDIA_DIR)
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },

    /// List cached media with aggregate stats.
    List {
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },

    /// Print storage statistics for the cache.
    Stats {
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },

    /// Clear one entry (--chat-id + --message-id), one chat (--chat-id), or everything.
    Clear {
        #[arg(long)]
        media_dir: Option<PathBuf>,
        #[arg(long)]
        chat_id: Option<i64>,
        #[arg(long)]
        message_id: Option<i64>,
    },

    /// Download one message's attachment into the cache (requires TELEGRAM_BOT_TOKEN).
    Download {
        #[arg(long)]
        media_dir: Option<PathBuf>,
        #[arg(long)]
        chat_id: i64,
        #[arg(long)]
        message_id: i64,
        /// Write to this path instead of the cache.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
