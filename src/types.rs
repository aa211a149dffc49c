use serde::Serialize;

use crate::media_store::StorageStats;

/// Result of one tool invocation: the primary text shown to the agent plus
/// the structured payload it was rendered from.
#[derive(Debug)]
pub(crate) struct ToolExecution {
    pub(crate) output: String,
    pub(crate) details: serde_json::Value,
    pub(crate) is_error: bool,
}

impl ToolExecution {
    pub(crate) fn json(details: serde_json::Value) -> Self {
        let output = serde_json::to_string_pretty(&details).unwrap_or_default();
        ToolExecution {
            output,
            details,
            is_error: false,
        }
    }

    pub(crate) fn text(message: impl Into<String>) -> Self {
        ToolExecution {
            output: message.into(),
            details: serde_json::Value::Null,
            is_error: false,
        }
    }
}

/// Payload returned by a download that went through the persistent store.
#[derive(Debug, Serialize)]
pub(crate) struct DownloadedMedia {
    pub(crate) ok: bool,
    pub(crate) mime_type: String,
    pub(crate) file: String,
    pub(crate) size: u64,
    pub(crate) path: String,
    pub(crate) resource_uri: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MediaListItem {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i64,
    pub(crate) file: String,
    pub(crate) mime_type: String,
    pub(crate) size: u64,
    pub(crate) path: String,
    pub(crate) timestamp: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MediaListing {
    pub(crate) items: Vec<MediaListItem>,
    pub(crate) stats: StorageStats,
}
