//! Thin Telegram Bot API boundary. The rest of the crate only ever asks it
//! to locate a message's attachment, pull the bytes down to a temp file, or
//! push a local file up. Session management and the MTProto transport are
//! not this crate's business; everything here is plain HTTPS.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::multipart;
use serde::Deserialize;

use crate::{env_optional, ext_for_mime, http_timeout_ms};

/// Cap on a single file download; the Bot API itself stops at 20 MB.
const DOWNLOAD_CAP_BYTES: u64 = 20_000_000;
const UPDATE_SCAN_LIMIT: usize = 100;

// ── Bot API wire types ───────────────────────────────────────────────────
// Subset of the update/message JSON, optionals defaulted so unknown or
// missing fields never fail deserialization.

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramUpdateResponse {
    pub(crate) ok: bool,
    #[serde(default)]
    pub(crate) result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramUpdate {
    #[allow(dead_code)]
    pub(crate) update_id: i64,
    #[serde(default)]
    pub(crate) message: Option<TelegramMessage>,
    #[serde(default)]
    pub(crate) edited_message: Option<TelegramMessage>,
    #[serde(default)]
    pub(crate) channel_post: Option<TelegramMessage>,
}

impl TelegramUpdate {
    pub(crate) fn into_message(self) -> Option<TelegramMessage> {
        self.message.or(self.edited_message).or(self.channel_post)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramChat {
    pub(crate) id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramPhotoSize {
    pub(crate) file_id: String,
    #[serde(default)]
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramDocument {
    pub(crate) file_id: String,
    #[serde(default)]
    pub(crate) file_name: Option<String>,
    #[serde(default)]
    pub(crate) mime_type: Option<String>,
    #[serde(default)]
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramVoice {
    pub(crate) file_id: String,
    #[serde(default)]
    pub(crate) mime_type: Option<String>,
    #[serde(default)]
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramAudio {
    pub(crate) file_id: String,
    #[serde(default)]
    pub(crate) mime_type: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramVideo {
    pub(crate) file_id: String,
    #[serde(default)]
    pub(crate) mime_type: Option<String>,
    #[serde(default)]
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramSticker {
    pub(crate) file_id: String,
    #[serde(default)]
    pub(crate) emoji: Option<String>,
    #[serde(default)]
    pub(crate) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramMessage {
    pub(crate) chat: TelegramChat,
    #[serde(default)]
    pub(crate) message_id: Option<i64>,
    #[serde(default)]
    pub(crate) photo: Option<Vec<TelegramPhotoSize>>,
    #[serde(default)]
    pub(crate) document: Option<TelegramDocument>,
    #[serde(default)]
    pub(crate) voice: Option<TelegramVoice>,
    #[serde(default)]
    pub(crate) audio: Option<TelegramAudio>,
    #[serde(default)]
    pub(crate) video: Option<TelegramVideo>,
    #[serde(default)]
    pub(crate) sticker: Option<TelegramSticker>,
}

// ── Attachment dispatch ──────────────────────────────────────────────────

/// One downloadable attachment. Telegram reports each media kind in its own
/// message field; collapsing them into a closed enum keeps the rest of the
/// crate free of field probing. Kinds that carry no file (contacts,
/// locations, polls) simply yield no attachment.
#[derive(Debug, Clone)]
pub(crate) enum Attachment {
    Photo {
        file_id: String,
        file_size: Option<i64>,
    },
    Document {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
        file_size: Option<i64>,
    },
    Voice {
        file_id: String,
        mime_type: Option<String>,
        file_size: Option<i64>,
    },
    Audio {
        file_id: String,
        mime_type: Option<String>,
        title: Option<String>,
        file_size: Option<i64>,
    },
    Video {
        file_id: String,
        mime_type: Option<String>,
        file_size: Option<i64>,
    },
    Sticker {
        file_id: String,
        emoji: Option<String>,
        file_size: Option<i64>,
    },
}

impl Attachment {
    pub(crate) fn from_message(msg: &TelegramMessage) -> Option<Attachment> {
        if let Some(photos) = &msg.photo {
            // Telegram sends several sizes of the same photo; take the largest.
            if let Some(best) = photos.iter().max_by_key(|p| p.file_size.unwrap_or(0)) {
                return Some(Attachment::Photo {
                    file_id: best.file_id.clone(),
                    file_size: best.file_size,
                });
            }
        }
        if let Some(doc) = &msg.document {
            return Some(Attachment::Document {
                file_id: doc.file_id.clone(),
                file_name: doc.file_name.clone(),
                mime_type: doc.mime_type.clone(),
                file_size: doc.file_size,
            });
        }
        if let Some(voice) = &msg.voice {
            return Some(Attachment::Voice {
                file_id: voice.file_id.clone(),
                mime_type: voice.mime_type.clone(),
                file_size: voice.file_size,
            });
        }
        if let Some(audio) = &msg.audio {
            return Some(Attachment::Audio {
                file_id: audio.file_id.clone(),
                mime_type: audio.mime_type.clone(),
                title: audio.title.clone(),
                file_size: audio.file_size,
            });
        }
        if let Some(video) = &msg.video {
            return Some(Attachment::Video {
                file_id: video.file_id.clone(),
                mime_type: video.mime_type.clone(),
                file_size: video.file_size,
            });
        }
        if let Some(sticker) = &msg.sticker {
            return Some(Attachment::Sticker {
                file_id: sticker.file_id.clone(),
                emoji: sticker.emoji.clone(),
                file_size: sticker.file_size,
            });
        }
        None
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Attachment::Photo { .. } => "photo",
            Attachment::Document { .. } => "document",
            Attachment::Voice { .. } => "voice",
            Attachment::Audio { .. } => "audio",
            Attachment::Video { .. } => "video",
            Attachment::Sticker { .. } => "sticker",
        }
    }

    pub(crate) fn file_id(&self) -> &str {
        match self {
            Attachment::Photo { file_id, .. }
            | Attachment::Document { file_id, .. }
            | Attachment::Voice { file_id, .. }
            | Attachment::Audio { file_id, .. }
            | Attachment::Video { file_id, .. }
            | Attachment::Sticker { file_id, .. } => file_id,
        }
    }

    pub(crate) fn file_size(&self) -> Option<i64> {
        match self {
            Attachment::Photo { file_size, .. }
            | Attachment::Document { file_size, .. }
            | Attachment::Voice { file_size, .. }
            | Attachment::Audio { file_size, .. }
            | Attachment::Video { file_size, .. }
            | Attachment::Sticker { file_size, .. } => *file_size,
        }
    }

    pub(crate) fn file_name(&self) -> Option<&str> {
        match self {
            Attachment::Document { file_name, .. } => file_name.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn title(&self) -> Option<&str> {
        match self {
            Attachment::Audio { title, .. } => title.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn emoji(&self) -> Option<&str> {
        match self {
            Attachment::Sticker { emoji, .. } => emoji.as_deref(),
            _ => None,
        }
    }

    /// MIME type as reported by Telegram, with per-kind defaults where the
    /// platform leaves it implicit (photos are always JPEG, stickers WEBP).
    pub(crate) fn mime_hint(&self) -> Option<String> {
        match self {
            Attachment::Photo { .. } => Some("image/jpeg".to_string()),
            Attachment::Document { mime_type, .. } => mime_type.clone(),
            Attachment::Voice { mime_type, .. } => {
                Some(mime_type.clone().unwrap_or_else(|| "audio/ogg".to_string()))
            }
            Attachment::Audio { mime_type, .. } => Some(
                mime_type
                    .clone()
                    .unwrap_or_else(|| "audio/mpeg".to_string()),
            ),
            Attachment::Video { mime_type, .. } => {
                Some(mime_type.clone().unwrap_or_else(|| "video/mp4".to_string()))
            }
            Attachment::Sticker { .. } => Some("image/webp".to_string()),
        }
    }

    /// Suffix for the temp file the bytes land in. A document's own filename
    /// wins; otherwise the MIME hint is mapped through the fixed table.
    pub(crate) fn suggested_suffix(&self) -> String {
        if let Some(name) = self.file_name() {
            if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
                return format!(".{ext}");
            }
        }
        match self.mime_hint() {
            Some(mime) => ext_for_mime(&mime).to_string(),
            None => ".bin".to_string(),
        }
    }
}

// ── Fetcher seam ─────────────────────────────────────────────────────────

/// A downloaded attachment sitting in a temp file. The caller owns cleanup;
/// the temp file must not outlive the operation that requested it.
#[derive(Debug)]
pub(crate) struct FetchedMedia {
    pub(crate) path: PathBuf,
    pub(crate) mime_type: Option<String>,
    pub(crate) file_name: Option<String>,
}

/// The seam between the tool layer and the chat platform. Tools only ever
/// need these three operations; tests swap in a stub.
pub(crate) trait MediaFetcher {
    /// Locate the attachment on a message without downloading it.
    fn describe_media(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<Attachment>, String>;

    /// Download the attachment bytes for a message into a temp file.
    fn fetch_media(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<FetchedMedia>, String>;

    /// Upload a local file to a chat, optionally as a voice note.
    fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        as_voice: bool,
    ) -> Result<(), String>;
}

// ── Bot API client ───────────────────────────────────────────────────────

pub(crate) struct BotApi {
    agent: ureq::Agent,
    upload_client: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

impl BotApi {
    pub(crate) fn from_env() -> Result<Self, String> {
        let token = env_optional("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| "TELEGRAM_BOT_TOKEN is not set".to_string())?;
        let api_base = env_optional("TELEGRAM_API_BASE")
            .unwrap_or_else(|| "https://api.telegram.org".to_string());
        let timeout = Duration::from_millis(http_timeout_ms());
        let agent = ureq::AgentBuilder::new()
            .timeout_read(timeout)
            .timeout_connect(timeout)
            .build();
        let upload_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("http client build error: {e}"))?;
        Ok(BotApi {
            agent,
            upload_client,
            api_base,
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token)
    }

    /// Scan the recent update backlog for one message. The Bot API keeps
    /// updates for roughly a day, so this is inherently best-effort; a
    /// message that has aged out simply is not found.
    fn find_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<TelegramMessage>, String> {
        let payload = serde_json::json!({ "limit": UPDATE_SCAN_LIMIT, "timeout": 0 });
        let resp = self
            .agent
            .post(&self.method_url("getUpdates"))
            .set("content-type", "application/json")
            .send_json(payload)
            .map_err(|e| format!("getUpdates: {e}"))?;
        let data: TelegramUpdateResponse = resp
            .into_json()
            .map_err(|e| format!("getUpdates decode: {e}"))?;
        if !data.ok {
            return Err("getUpdates returned ok=false".to_string());
        }

        for update in data.result {
            let Some(msg) = update.into_message() else {
                continue;
            };
            if msg.chat.id == chat_id && msg.message_id == Some(message_id) {
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }

    fn download_file(&self, file_id: &str) -> Result<(Vec<u8>, String), String> {
        let resp = self
            .agent
            .post(&self.method_url("getFile"))
            .set("content-type", "application/json")
            .send_json(serde_json::json!({ "file_id": file_id }))
            .map_err(|e| format!("getFile: {e}"))?;
        let data: serde_json::Value = resp
            .into_json()
            .map_err(|e| format!("getFile decode: {e}"))?;
        let file_path = data["result"]["file_path"]
            .as_str()
            .ok_or_else(|| "getFile response missing file_path".to_string())?;

        let dl = self
            .agent
            .get(&self.file_url(file_path))
            .call()
            .map_err(|e| format!("file download: {e}"))?;
        let content_type = dl
            .header("content-type")
            .unwrap_or("application/octet-stream")
            .to_string();
        let mut bytes = Vec::new();
        dl.into_reader()
            .take(DOWNLOAD_CAP_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| format!("file download read: {e}"))?;
        if bytes.is_empty() {
            return Err("file download returned no data".to_string());
        }
        Ok((bytes, content_type))
    }
}

impl MediaFetcher for BotApi {
    fn describe_media(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<Attachment>, String> {
        Ok(self
            .find_message(chat_id, message_id)?
            .as_ref()
            .and_then(Attachment::from_message))
    }

    fn fetch_media(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<FetchedMedia>, String> {
        let Some(attachment) = self.describe_media(chat_id, message_id)? else {
            return Ok(None);
        };

        let (bytes, content_type) = self.download_file(attachment.file_id())?;
        // Telegram's own metadata beats the transport header, which is often
        // a bare octet-stream.
        let mime_type = attachment.mime_hint().or_else(|| {
            (content_type != "application/octet-stream").then_some(content_type)
        });

        let temp_path = std::env::temp_dir().join(format!(
            "tgmedia_{}_{chat_id}_{message_id}{}",
            std::process::id(),
            attachment.suggested_suffix()
        ));
        std::fs::write(&temp_path, &bytes)
            .map_err(|e| format!("write temp file {}: {e}", temp_path.display()))?;

        Ok(Some(FetchedMedia {
            path: temp_path,
            mime_type,
            file_name: attachment.file_name().map(str::to_string),
        }))
    }

    fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        as_voice: bool,
    ) -> Result<(), String> {
        let bytes =
            std::fs::read(path).map_err(|e| format!("read {}: {e}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let (method, field) = if as_voice {
            ("sendVoice", "voice")
        } else {
            ("sendDocument", "document")
        };

        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field, multipart::Part::bytes(bytes).file_name(filename));
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .upload_client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .map_err(|e| format!("{method} request error: {e}"))?;
        let result: serde_json::Value = response
            .json()
            .map_err(|e| format!("{method} decode error: {e}"))?;
        if result.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let desc = result
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            return Err(format!("{method} error: {desc}"));
        }
        Ok(())
    }
}
