use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ToolDownloadMediaArgs {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i64,
    /// Legacy passthrough: write the bytes here instead of the store.
    #[serde(default)]
    pub(crate) file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolMediaInfoArgs {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i64,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct ToolClearMediaArgs {
    #[serde(default)]
    pub(crate) chat_id: Option<i64>,
    #[serde(default)]
    pub(crate) message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolSendFileArgs {
    pub(crate) chat_id: i64,
    pub(crate) file_path: String,
    #[serde(default)]
    pub(crate) caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolSendVoiceArgs {
    pub(crate) chat_id: i64,
    pub(crate) file_path: String,
}
