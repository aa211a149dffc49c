// Module declarations
mod cli;
mod config;
mod media_store;
mod mcp;
mod resource;
mod telegram;
mod tool_args;
mod tool_defs;
mod tool_exec;
mod types;
mod util;

// Re-export module items at the crate root so cross-module references stay
// short; the modules are small enough to share one namespace.
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use media_store::*;
#[allow(unused_imports)]
pub(crate) use mcp::*;
#[allow(unused_imports)]
pub(crate) use resource::*;
#[allow(unused_imports)]
pub(crate) use telegram::*;
#[allow(unused_imports)]
pub(crate) use tool_args::*;
#[allow(unused_imports)]
pub(crate) use tool_defs::*;
#[allow(unused_imports)]
pub(crate) use tool_exec::*;
#[allow(unused_imports)]
pub(crate) use types::*;
#[allow(unused_imports)]
pub(crate) use util::*;

use std::io;

use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { media_dir } => {
            let mut store = MediaStore::open(&resolve_media_dir(media_dir))?;
            // The server stays useful without a bot token: the cache tools
            // and resources keep working, platform tools fail per call.
            let bot = match BotApi::from_env() {
                Ok(api) => Some(api),
                Err(e) => {
                    eprintln!("[telegram] {e}; download/send tools will be unavailable");
                    None
                }
            };
            run_mcp_server(&mut store, bot.as_ref().map(|b| b as &dyn MediaFetcher))
        }

        Command::List { media_dir } => {
            let mut store = MediaStore::open(&resolve_media_dir(media_dir))?;
            let result =
                execute_tool("list_downloaded_media", serde_json::json!({}), &mut store, None)
                    .map_err(io::Error::other)?;
            println!("{}", result.output);
            Ok(())
        }

        Command::Stats { media_dir } => {
            let mut store = MediaStore::open(&resolve_media_dir(media_dir))?;
            let stats = store.storage_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }

        Command::Clear {
            media_dir,
            chat_id,
            message_id,
        } => {
            let mut store = MediaStore::open(&resolve_media_dir(media_dir))?;
            let args = serde_json::json!({ "chat_id": chat_id, "message_id": message_id });
            let result = execute_tool("clear_downloaded_media", args, &mut store, None)
                .map_err(io::Error::other)?;
            println!("{}", result.output);
            Ok(())
        }

        Command::Download {
            media_dir,
            chat_id,
            message_id,
            out,
        } => {
            let mut store = MediaStore::open(&resolve_media_dir(media_dir))?;
            let bot = BotApi::from_env().map_err(io::Error::other)?;
            let args = serde_json::json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "file_path": out.map(|p| p.to_string_lossy().into_owned()),
            });
            let result = execute_tool("download_media", args, &mut store, Some(&bot))
                .map_err(io::Error::other)?;
            println!("{}", result.output);
            Ok(())
        }
    }
}
