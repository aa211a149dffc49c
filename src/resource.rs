//! Synthetic `tgfile://{chat_id}/{message_id}` addresses for cached media.
//!
//! The address is the external handle for one stored attachment. Resolution
//! never re-downloads; a key that is unknown or whose file has gone missing
//! reports a not-found condition naming the address, and the caller is
//! expected to download first.

use std::fs;
use std::path::Path;

use base64::Engine;
use serde::Serialize;

use crate::MediaStore;

pub(crate) const MEDIA_RESOURCE_SCHEME: &str = "tgfile://";

pub(crate) fn media_resource_uri(chat_id: i64, message_id: i64) -> String {
    format!("{MEDIA_RESOURCE_SCHEME}{chat_id}/{message_id}")
}

/// Parse an address back into its `(chat_id, message_id)` key. Both parts
/// must be integers; chat ids are negative for groups and channels.
pub(crate) fn parse_media_resource_uri(uri: &str) -> Option<(i64, i64)> {
    let rest = uri.strip_prefix(MEDIA_RESOURCE_SCHEME)?;
    let (chat, msg) = rest.split_once('/')?;
    Some((chat.parse().ok()?, msg.parse().ok()?))
}

/// Resolved resource payload. The surrounding transport is text-oriented,
/// so the bytes travel base64-encoded next to their MIME type.
#[derive(Debug, Serialize)]
pub(crate) struct ResourceContent {
    pub(crate) uri: String,
    pub(crate) blob: String,
    #[serde(rename = "mimeType")]
    pub(crate) mime_type: String,
}

pub(crate) fn read_media_resource(
    store: &MediaStore,
    uri: &str,
) -> Result<ResourceContent, String> {
    let (chat_id, message_id) = parse_media_resource_uri(uri)
        .ok_or_else(|| format!("invalid media resource address: {uri}"))?;

    let Some(record) = store.get_media(chat_id, message_id) else {
        return Err(format!("Media not found: {uri}. Download it first."));
    };
    if !Path::new(&record.path).exists() {
        eprintln!("[mcp] media file missing for {uri}: {}", record.path);
        return Err(format!("Media not found: {uri}. Download it first."));
    }

    let bytes =
        fs::read(&record.path).map_err(|e| format!("failed to read media for {uri}: {e}"))?;
    eprintln!(
        "[mcp] serving media resource {uri}: {} bytes, {}",
        bytes.len(),
        record.mime_type
    );
    Ok(ResourceContent {
        uri: media_resource_uri(chat_id, message_id),
        blob: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type: record.mime_type.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "telegram_mcp_resource_{}_{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn uri_round_trips() {
        assert_eq!(media_resource_uri(100, 5), "tgfile://100/5");
        assert_eq!(parse_media_resource_uri("tgfile://100/5"), Some((100, 5)));
        // Group chat ids are negative.
        assert_eq!(
            parse_media_resource_uri("tgfile://-1001234/88"),
            Some((-1001234, 88))
        );
    }

    #[test]
    fn malformed_uris_are_rejected() {
        assert_eq!(parse_media_resource_uri("tgfile://100"), None);
        assert_eq!(parse_media_resource_uri("tgfile://abc/5"), None);
        assert_eq!(parse_media_resource_uri("file://100/5"), None);
        assert_eq!(parse_media_resource_uri("tgfile://100/5/extra"), None);
    }

    #[test]
    fn resolve_before_download_names_the_address() {
        let dir = temp_dir("not_found");
        let store = MediaStore::open(&dir.join("media")).unwrap();

        let err = read_media_resource(&store, "tgfile://100/5").unwrap_err();
        assert!(err.contains("tgfile://100/5"));
        assert!(err.contains("Download it first"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_returns_base64_and_mime() {
        let dir = temp_dir("resolve");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = dir.join("pic.jpg");
        fs::write(&source, b"jpeg-bytes").unwrap();
        store.save_media(100, 5, &source, None).unwrap();

        let content = read_media_resource(&store, "tgfile://100/5").unwrap();
        assert_eq!(content.uri, "tgfile://100/5");
        assert_eq!(content.mime_type, "image/jpeg");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&content.blob)
            .unwrap();
        assert_eq!(decoded, b"jpeg-bytes");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_with_missing_file_reports_not_found() {
        let dir = temp_dir("missing_file");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = dir.join("pic.png");
        fs::write(&source, b"png").unwrap();
        let dest = store.save_media(7, 7, &source, None).unwrap();
        fs::remove_file(&dest).unwrap();

        let err = read_media_resource(&store, "tgfile://7/7").unwrap_err();
        assert!(err.contains("tgfile://7/7"));

        let _ = fs::remove_dir_all(&dir);
    }
}
