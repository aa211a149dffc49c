//! Persistent storage and tracking of downloaded Telegram media files.
//!
//! One directory holds everything: the attachment files, named
//! `chat{chat_id}_msg{message_id}{ext}`, and an `index.json` mapping
//! `"{chat_id}|{message_id}"` keys to per-file metadata. The index is the
//! authority on what is cached; a file without an index entry is invisible,
//! and an entry whose file has been deleted out-of-band is pruned on the
//! next listing pass.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{ext_for_mime, guess_mime_type};

const INDEX_FILE: &str = "index.json";

/// Metadata for one stored attachment, exactly as persisted in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MediaRecord {
    pub(crate) path: String,
    pub(crate) mime_type: String,
    pub(crate) timestamp: String,
    pub(crate) size: u64,
    pub(crate) extension: String,
}

/// A record joined back with the key it is stored under, as returned by
/// listing operations.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct MediaEntry {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i64,
    pub(crate) path: String,
    pub(crate) mime_type: String,
    pub(crate) timestamp: String,
    pub(crate) size: u64,
    pub(crate) extension: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StorageStats {
    pub(crate) total_files: usize,
    pub(crate) total_size_bytes: u64,
    pub(crate) total_size_mb: f64,
    pub(crate) storage_path: String,
}

pub(crate) struct MediaStore {
    base_dir: PathBuf,
    index_file: PathBuf,
    index: HashMap<String, MediaRecord>,
}

impl MediaStore {
    /// Open a store rooted at `base_dir`, creating the directory tree if
    /// needed. A missing index starts empty; an unreadable or unparseable
    /// one is logged and reset rather than failing the open.
    pub(crate) fn open(base_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(base_dir)?;
        let index_file = base_dir.join(INDEX_FILE);
        let index = load_index(&index_file);
        Ok(MediaStore {
            base_dir: base_dir.to_path_buf(),
            index_file,
            index,
        })
    }

    pub(crate) fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn key(chat_id: i64, message_id: i64) -> String {
        format!("{chat_id}|{message_id}")
    }

    /// Destination path is a pure function of the key and extension, which
    /// is what lets a re-save find and replace the prior file without
    /// scanning the directory.
    fn file_path(&self, chat_id: i64, message_id: i64, extension: &str) -> PathBuf {
        self.base_dir
            .join(format!("chat{chat_id}_msg{message_id}{extension}"))
    }

    /// Write the whole index through a tmp file and rename so a crashed
    /// write never leaves a half-written index behind.
    fn persist(&self) -> io::Result<()> {
        let json =
            serde_json::to_string_pretty(&self.index).map_err(io::Error::other)?;
        let tmp = self.index_file.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.index_file)?;
        Ok(())
    }

    /// Copy `source` into the store under `(chat_id, message_id)` and record
    /// its metadata. Returns the destination path.
    ///
    /// MIME type falls back to extension-based guessing and then to
    /// `application/octet-stream`; the stored extension comes from the
    /// source suffix or, failing that, from the resolved MIME type.
    pub(crate) fn save_media(
        &mut self,
        chat_id: i64,
        message_id: i64,
        source: &Path,
        mime_type: Option<&str>,
    ) -> io::Result<PathBuf> {
        if !source.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source file not found: {}", source.display()),
            ));
        }

        let mime_type = match mime_type {
            Some(m) => m.to_string(),
            None => guess_mime_type(source)
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        let extension = match source.extension().and_then(OsStr::to_str) {
            Some(ext) => format!(".{ext}"),
            None => ext_for_mime(&mime_type).to_string(),
        };

        let dest = self.file_path(chat_id, message_id, &extension);
        let key = Self::key(chat_id, message_id);

        // A re-save can resolve to a different extension than before. Drop
        // the old file so each key maps to exactly one file on disk.
        if let Some(prior) = self.index.get(&key) {
            if Path::new(&prior.path) != dest.as_path() {
                if let Err(e) = fs::remove_file(&prior.path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        eprintln!(
                            "[media-store] failed to remove replaced file {}: {e}",
                            prior.path
                        );
                    }
                }
            }
        }

        if let Err(e) = fs::copy(source, &dest) {
            // A failed copy may leave a partial file behind; a failed save
            // must leave no trace.
            let _ = fs::remove_file(&dest);
            return Err(e);
        }
        // Size from the copy, not the source. The source may change under us.
        let size = match fs::metadata(&dest) {
            Ok(meta) => meta.len(),
            Err(e) => {
                let _ = fs::remove_file(&dest);
                return Err(e);
            }
        };

        let record = MediaRecord {
            path: dest.to_string_lossy().into_owned(),
            mime_type,
            timestamp: Utc::now().to_rfc3339(),
            size,
            extension,
        };
        let prior = self.index.insert(key.clone(), record);

        if let Err(e) = self.persist() {
            // The on-disk index no longer matches memory. Roll back and
            // remove the copy so a failed save leaves nothing behind.
            match prior {
                Some(p) => {
                    self.index.insert(key, p);
                }
                None => {
                    self.index.remove(&key);
                }
            }
            let _ = fs::remove_file(&dest);
            return Err(e);
        }

        eprintln!(
            "[media-store] saved {} -> {}",
            source.display(),
            dest.display()
        );
        Ok(dest)
    }

    /// Pure index lookup. Does not check whether the file still exists.
    pub(crate) fn get_media(&self, chat_id: i64, message_id: i64) -> Option<&MediaRecord> {
        self.index.get(&Self::key(chat_id, message_id))
    }

    /// Path for stored media, only if the file is still present on disk.
    pub(crate) fn media_path(&self, chat_id: i64, message_id: i64) -> Option<PathBuf> {
        let record = self.get_media(chat_id, message_id)?;
        let path = Path::new(&record.path);
        if path.exists() {
            Some(path.to_path_buf())
        } else {
            None
        }
    }

    /// All current records, newest first. Entries whose backing file has
    /// disappeared are dropped from the index, with a single rewrite for
    /// the whole batch.
    pub(crate) fn list_media(&mut self) -> io::Result<Vec<MediaEntry>> {
        let mut valid = Vec::new();
        let mut stale = Vec::new();

        for (key, record) in &self.index {
            // A key that does not parse is as dead as a missing file.
            let Some((chat_id, message_id)) = parse_key(key) else {
                stale.push(key.clone());
                continue;
            };
            if !Path::new(&record.path).exists() {
                stale.push(key.clone());
                continue;
            }
            valid.push(MediaEntry {
                chat_id,
                message_id,
                path: record.path.clone(),
                mime_type: record.mime_type.clone(),
                timestamp: record.timestamp.clone(),
                size: record.size,
                extension: record.extension.clone(),
            });
        }

        if !stale.is_empty() {
            for key in &stale {
                self.index.remove(key);
            }
            self.persist()?;
            eprintln!("[media-store] pruned {} stale entries", stale.len());
        }

        valid.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(valid)
    }

    /// Remove one record and its file. Returns false when the key is
    /// unknown. A file that cannot be removed is logged and the index entry
    /// is dropped anyway; the index is the authority on what exists.
    pub(crate) fn delete_media(&mut self, chat_id: i64, message_id: i64) -> io::Result<bool> {
        let key = Self::key(chat_id, message_id);
        let Some(record) = self.index.remove(&key) else {
            return Ok(false);
        };

        if Path::new(&record.path).exists() {
            if let Err(e) = fs::remove_file(&record.path) {
                eprintln!("[media-store] failed to delete {}: {e}", record.path);
            }
        }

        self.persist()?;
        eprintln!("[media-store] deleted {}", record.path);
        Ok(true)
    }

    /// Remove every stored file and empty the index. Returns the number of
    /// files actually deleted, which can be lower than the entry count when
    /// some files were already missing.
    pub(crate) fn clear_all(&mut self) -> io::Result<usize> {
        let mut deleted = 0usize;
        for record in self.index.values() {
            if !Path::new(&record.path).exists() {
                continue;
            }
            match fs::remove_file(&record.path) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    eprintln!("[media-store] failed to delete {}: {e}", record.path)
                }
            }
        }

        self.index.clear();
        self.persist()?;
        eprintln!("[media-store] cleared all media: {deleted} files deleted");
        Ok(deleted)
    }

    /// Aggregate figures over the current listing. Runs the same stale
    /// reconciliation as `list_media`.
    pub(crate) fn storage_stats(&mut self) -> io::Result<StorageStats> {
        let entries = self.list_media()?;
        let total_size: u64 = entries.iter().map(|e| e.size).sum();
        Ok(StorageStats {
            total_files: entries.len(),
            total_size_bytes: total_size,
            total_size_mb: (total_size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            storage_path: self.base_dir.to_string_lossy().into_owned(),
        })
    }
}

fn parse_key(key: &str) -> Option<(i64, i64)> {
    let (chat, msg) = key.split_once('|')?;
    Some((chat.parse().ok()?, msg.parse().ok()?))
}

fn load_index(index_file: &Path) -> HashMap<String, MediaRecord> {
    if !index_file.exists() {
        return HashMap::new();
    }
    let data = match fs::read_to_string(index_file) {
        Ok(data) => data,
        Err(e) => {
            eprintln!(
                "[media-store] failed to read {}: {e}; starting with empty index",
                index_file.display()
            );
            return HashMap::new();
        }
    };
    match serde_json::from_str(&data) {
        Ok(index) => index,
        Err(e) => {
            eprintln!(
                "[media-store] failed to parse {}: {e}; starting with empty index",
                index_file.display()
            );
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "telegram_mcp_store_{}_{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn save_then_get_round_trips() {
        let dir = temp_store_dir("round_trip");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "photo.png", b"png-bytes");

        let dest = store
            .save_media(7, 42, &source, Some("image/png"))
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"png-bytes");

        let record = store.get_media(7, 42).unwrap();
        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.size, 9);
        assert_eq!(record.extension, ".png");
        assert_eq!(record.path, dest.to_string_lossy());
        assert_eq!(store.media_path(7, 42), Some(dest));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_infers_mime_from_extension() {
        let dir = temp_store_dir("infer_mime");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "pic.jpg", b"abc");

        let dest = store.save_media(100, 5, &source, None).unwrap();
        assert!(dest.ends_with("chat100_msg5.jpg"));

        let record = store.get_media(100, 5).unwrap();
        assert_eq!(record.mime_type, "image/jpeg");
        assert_eq!(record.extension, ".jpg");
        assert_eq!(record.size, 3);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_extensionless_source_maps_mime_to_suffix() {
        let dir = temp_store_dir("mime_suffix");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "blob", b"data");

        let dest = store
            .save_media(1, 2, &source, Some("image/webp"))
            .unwrap();
        assert!(dest.ends_with("chat1_msg2.webp"));

        // Unknown MIME and no suffix falls back to the generic binary pair.
        let dest = store.save_media(1, 3, &source, None).unwrap();
        assert!(dest.ends_with("chat1_msg3.bin"));
        let record = store.get_media(1, 3).unwrap();
        assert_eq!(record.mime_type, "application/octet-stream");
        assert_eq!(record.extension, ".bin");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_missing_source_is_not_found() {
        let dir = temp_store_dir("missing_source");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();

        let err = store
            .save_media(1, 1, &dir.join("nope.jpg"), None)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(store.get_media(1, 1).is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn overwrite_keeps_one_entry_and_one_file() {
        let dir = temp_store_dir("overwrite");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let first = write_source(&dir, "v1.jpg", b"first");
        let second = write_source(&dir, "v2.png", b"second!");

        let old_dest = store.save_media(9, 9, &first, None).unwrap();
        let new_dest = store.save_media(9, 9, &second, None).unwrap();
        assert_ne!(old_dest, new_dest);

        // The replaced file is gone; exactly one entry and one file remain.
        assert!(!old_dest.exists());
        assert_eq!(fs::read(&new_dest).unwrap(), b"second!");
        let entries = store.list_media().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mime_type, "image/png");
        assert_eq!(entries[0].size, 7);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_prunes_stale_entries() {
        let dir = temp_store_dir("stale");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "a.jpg", b"aaa");
        store.save_media(1, 1, &source, None).unwrap();
        let kept = store.save_media(1, 2, &source, None).unwrap();

        // Delete one backing file out-of-band.
        let gone = store.media_path(1, 1).unwrap();
        fs::remove_file(&gone).unwrap();

        // Before any listing the index still has the record, but the path
        // no longer resolves.
        assert!(store.get_media(1, 1).is_some());
        assert!(store.media_path(1, 1).is_none());

        let entries = store.list_media().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, kept.to_string_lossy());
        assert!(store.get_media(1, 1).is_none());

        // The pruning was persisted, not just in-memory.
        let raw = fs::read_to_string(store.base_dir().join(INDEX_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(parsed.get("1|1").is_none());
        assert!(parsed.get("1|2").is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = temp_store_dir("delete");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "a.pdf", b"%PDF");

        assert!(!store.delete_media(5, 5).unwrap());

        let dest = store.save_media(5, 5, &source, None).unwrap();
        assert!(store.delete_media(5, 5).unwrap());
        assert!(!dest.exists());
        assert!(!store.delete_media(5, 5).unwrap());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn clear_all_counts_only_existing_files() {
        let dir = temp_store_dir("clear_all");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "a.jpg", b"xy");
        store.save_media(1, 1, &source, None).unwrap();
        store.save_media(1, 2, &source, None).unwrap();
        store.save_media(2, 1, &source, None).unwrap();

        // One of the three backing files is already missing.
        fs::remove_file(store.media_path(1, 2).unwrap()).unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(store.list_media().unwrap().is_empty());
        assert!(store.get_media(1, 1).is_none());

        // Clearing an empty store is a no-op that reports zero.
        assert_eq!(store.clear_all().unwrap(), 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn stats_match_listing() {
        let dir = temp_store_dir("stats");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let a = write_source(&dir, "a.jpg", b"12345");
        let b = write_source(&dir, "b.png", b"123");
        store.save_media(1, 1, &a, None).unwrap();
        store.save_media(1, 2, &b, None).unwrap();

        let entries = store.list_media().unwrap();
        let stats = store.storage_stats().unwrap();
        assert_eq!(stats.total_files, entries.len());
        assert_eq!(
            stats.total_size_bytes,
            entries.iter().map(|e| e.size).sum::<u64>()
        );
        assert_eq!(stats.total_size_mb, 0.0);
        assert_eq!(stats.storage_path, store.base_dir().to_string_lossy());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_index_resets_to_empty() {
        let dir = temp_store_dir("corrupt");
        let media_dir = dir.join("media");
        fs::create_dir_all(&media_dir).unwrap();
        fs::write(media_dir.join(INDEX_FILE), b"{not json").unwrap();

        let mut store = MediaStore::open(&media_dir).unwrap();
        assert!(store.list_media().unwrap().is_empty());

        // The store stays usable after the reset.
        let source = write_source(&dir, "a.gif", b"GIF89a");
        store.save_media(3, 3, &source, None).unwrap();
        assert_eq!(store.list_media().unwrap().len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopen_loads_persisted_index() {
        let dir = temp_store_dir("reopen");
        let media_dir = dir.join("media");
        let source = write_source(&dir, "a.mp3", b"ID3 tag");
        {
            let mut store = MediaStore::open(&media_dir).unwrap();
            store.save_media(4, 4, &source, None).unwrap();
        }

        let store = MediaStore::open(&media_dir).unwrap();
        let record = store.get_media(4, 4).unwrap();
        assert_eq!(record.mime_type, "audio/mpeg");
        assert_eq!(record.size, 7);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn index_json_shape_is_stable() {
        let dir = temp_store_dir("shape");
        let mut store = MediaStore::open(&dir.join("media")).unwrap();
        let source = write_source(&dir, "a.jpg", b"abc");
        store.save_media(100, 5, &source, None).unwrap();

        let raw = fs::read_to_string(store.base_dir().join(INDEX_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = parsed.get("100|5").expect("keyed by chat|message");
        for field in ["path", "mime_type", "timestamp", "size", "extension"] {
            assert!(entry.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(entry["mime_type"], "image/jpeg");
        assert_eq!(entry["size"], 3);

        let _ = fs::remove_dir_all(&dir);
    }
}
