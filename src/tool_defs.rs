use serde_json;

pub(crate) fn tool_definitions_json() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": "download_media",
            "description": "Download a message's attachment into the local media cache; returns mime_type, size, path and a tgfile:// resource URI. Pass file_path to write the bytes to an explicit location instead.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chat_id": { "type": "integer" },
                    "message_id": { "type": "integer" },
                    "file_path": { "type": "string" }
                },
                "required": ["chat_id", "message_id"]
            }
        }),
        serde_json::json!({
            "name": "get_media_info",
            "description": "Describe the attachment on a message (kind, filename, mime type, size) without downloading it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chat_id": { "type": "integer" },
                    "message_id": { "type": "integer" }
                },
                "required": ["chat_id", "message_id"]
            }
        }),
        serde_json::json!({
            "name": "list_downloaded_media",
            "description": "List everything in the local media cache with aggregate storage stats.",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
        serde_json::json!({
            "name": "clear_downloaded_media",
            "description": "Clear the media cache: one entry (chat_id + message_id), one chat (chat_id only), or everything (no arguments). Returns the affected count.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chat_id": { "type": "integer" },
                    "message_id": { "type": "integer" }
                }
            }
        }),
        serde_json::json!({
            "name": "send_file",
            "description": "Send a local file to a chat, with an optional caption.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chat_id": { "type": "integer" },
                    "file_path": { "type": "string" },
                    "caption": { "type": "string" }
                },
                "required": ["chat_id", "file_path"]
            }
        }),
        serde_json::json!({
            "name": "send_voice",
            "description": "Send a local .ogg/.opus file to a chat as a voice note.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chat_id": { "type": "integer" },
                    "file_path": { "type": "string" }
                },
                "required": ["chat_id", "file_path"]
            }
        }),
    ]
}
