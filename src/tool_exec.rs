//! Tool dispatch for the media tool family. Each tool takes validated JSON
//! arguments and returns either a JSON payload or a short error string; the
//! MCP layer decides how to frame both.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{
    file_basename, guess_mime_type, media_resource_uri, DownloadedMedia, MediaFetcher,
    MediaListItem, MediaListing, MediaStore, ToolClearMediaArgs, ToolDownloadMediaArgs,
    ToolExecution, ToolMediaInfoArgs, ToolSendFileArgs, ToolSendVoiceArgs,
};

pub(crate) fn execute_tool(
    name: &str,
    args: serde_json::Value,
    store: &mut MediaStore,
    fetcher: Option<&dyn MediaFetcher>,
) -> Result<ToolExecution, String> {
    match name {
        "download_media" => tool_download_media(parse_args(args)?, store, require_fetcher(fetcher)?),
        "get_media_info" => tool_get_media_info(parse_args(args)?, require_fetcher(fetcher)?),
        "list_downloaded_media" => tool_list_media(store),
        "clear_downloaded_media" => tool_clear_media(parse_args(args)?, store),
        "send_file" => tool_send_file(parse_args(args)?, require_fetcher(fetcher)?),
        "send_voice" => tool_send_voice(parse_args(args)?, require_fetcher(fetcher)?),
        other => Err(format!("unknown tool '{other}'")),
    }
}

fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}

fn require_fetcher<'a>(
    fetcher: Option<&'a dyn MediaFetcher>,
) -> Result<&'a dyn MediaFetcher, String> {
    fetcher.ok_or_else(|| {
        "telegram client is not configured (set TELEGRAM_BOT_TOKEN)".to_string()
    })
}

fn tool_download_media(
    args: ToolDownloadMediaArgs,
    store: &mut MediaStore,
    fetcher: &dyn MediaFetcher,
) -> Result<ToolExecution, String> {
    let Some(fetched) = fetcher.fetch_media(args.chat_id, args.message_id)? else {
        return Ok(ToolExecution::text("No media found in the specified message."));
    };

    // Legacy passthrough: an explicit file_path bypasses the store entirely.
    if let Some(file_path) = &args.file_path {
        let copied = fs::copy(&fetched.path, file_path);
        let _ = fs::remove_file(&fetched.path);
        let size =
            copied.map_err(|e| format!("download failed: could not write {file_path}: {e}"))?;
        return Ok(ToolExecution::json(serde_json::json!({
            "ok": true,
            "path": file_path,
            "size": size,
            "mime_type": fetched.mime_type,
            "resource_uri": media_resource_uri(args.chat_id, args.message_id),
        })));
    }

    let saved = store.save_media(
        args.chat_id,
        args.message_id,
        &fetched.path,
        fetched.mime_type.as_deref(),
    );
    // The temp file must not outlive the call, whether or not the save worked.
    let _ = fs::remove_file(&fetched.path);
    let dest = saved.map_err(|e| format!("failed to store media: {e}"))?;

    let record = store
        .get_media(args.chat_id, args.message_id)
        .ok_or_else(|| "stored record missing after save".to_string())?;
    let payload = DownloadedMedia {
        ok: true,
        mime_type: record.mime_type.clone(),
        file: file_basename(&record.path),
        size: record.size,
        path: dest.to_string_lossy().into_owned(),
        resource_uri: media_resource_uri(args.chat_id, args.message_id),
    };
    Ok(ToolExecution::json(
        serde_json::to_value(payload).map_err(|e| e.to_string())?,
    ))
}

fn tool_get_media_info(
    args: ToolMediaInfoArgs,
    fetcher: &dyn MediaFetcher,
) -> Result<ToolExecution, String> {
    let Some(attachment) = fetcher.describe_media(args.chat_id, args.message_id)? else {
        return Ok(ToolExecution::json(serde_json::json!({ "media": null })));
    };
    let mut info = serde_json::json!({
        "type": attachment.kind(),
        "mime_type": attachment.mime_hint(),
        "size": attachment.file_size(),
    });
    if let Some(name) = attachment.file_name() {
        info["file_name"] = serde_json::json!(name);
    }
    if let Some(title) = attachment.title() {
        info["title"] = serde_json::json!(title);
    }
    if let Some(emoji) = attachment.emoji() {
        info["emoji"] = serde_json::json!(emoji);
    }
    Ok(ToolExecution::json(info))
}

fn tool_list_media(store: &mut MediaStore) -> Result<ToolExecution, String> {
    let entries = store
        .list_media()
        .map_err(|e| format!("listing failed: {e}"))?;
    let stats = store
        .storage_stats()
        .map_err(|e| format!("stats failed: {e}"))?;

    let items = entries
        .into_iter()
        .map(|e| MediaListItem {
            chat_id: e.chat_id,
            message_id: e.message_id,
            file: file_basename(&e.path),
            mime_type: e.mime_type,
            size: e.size,
            path: e.path,
            timestamp: e.timestamp,
        })
        .collect();

    let listing = MediaListing { items, stats };
    Ok(ToolExecution::json(
        serde_json::to_value(listing).map_err(|e| e.to_string())?,
    ))
}

fn tool_clear_media(
    args: ToolClearMediaArgs,
    store: &mut MediaStore,
) -> Result<ToolExecution, String> {
    match (args.chat_id, args.message_id) {
        (Some(chat_id), Some(message_id)) => {
            let removed = store
                .delete_media(chat_id, message_id)
                .map_err(|e| format!("delete failed: {e}"))?;
            let message = if removed {
                "Cleared media file"
            } else {
                "No media file found"
            };
            Ok(ToolExecution::json(serde_json::json!({
                "ok": removed,
                "message": message,
                "chat_id": chat_id,
                "message_id": message_id,
            })))
        }
        (Some(chat_id), None) => {
            let entries = store
                .list_media()
                .map_err(|e| format!("listing failed: {e}"))?;
            let mut cleared = 0usize;
            for entry in entries {
                if entry.chat_id != chat_id {
                    continue;
                }
                if store
                    .delete_media(entry.chat_id, entry.message_id)
                    .map_err(|e| format!("delete failed: {e}"))?
                {
                    cleared += 1;
                }
            }
            Ok(ToolExecution::json(serde_json::json!({
                "ok": true,
                "message": "Cleared chat media",
                "chat_id": chat_id,
                "count": cleared,
            })))
        }
        (None, None) => {
            let count = store
                .clear_all()
                .map_err(|e| format!("clear failed: {e}"))?;
            Ok(ToolExecution::json(serde_json::json!({
                "ok": true,
                "message": "Cleared all media",
                "count": count,
            })))
        }
        (None, Some(_)) => Err("message_id requires chat_id".to_string()),
    }
}

fn tool_send_file(
    args: ToolSendFileArgs,
    fetcher: &dyn MediaFetcher,
) -> Result<ToolExecution, String> {
    let path = Path::new(&args.file_path);
    if !path.is_file() {
        return Err(format!("File not found: {}", args.file_path));
    }
    fs::File::open(path).map_err(|e| format!("File is not readable: {}: {e}", args.file_path))?;

    fetcher.send_file(args.chat_id, path, args.caption.as_deref(), false)?;
    Ok(ToolExecution::json(serde_json::json!({
        "ok": true,
        "message": "File sent",
        "id": args.chat_id,
    })))
}

fn tool_send_voice(
    args: ToolSendVoiceArgs,
    fetcher: &dyn MediaFetcher,
) -> Result<ToolExecution, String> {
    let path = Path::new(&args.file_path);
    if !path.is_file() {
        return Err(format!("File not found: {}", args.file_path));
    }
    let lower = args.file_path.to_ascii_lowercase();
    let is_voice = guess_mime_type(path) == Some("audio/ogg")
        || lower.ends_with(".ogg")
        || lower.ends_with(".opus");
    if !is_voice {
        return Err("Voice file must be .ogg or .opus format.".to_string());
    }

    fetcher.send_file(args.chat_id, path, None, true)?;
    Ok(ToolExecution::json(serde_json::json!({
        "ok": true,
        "message": "Voice message sent",
        "id": args.chat_id,
    })))
}
