//! Environment-driven configuration. CLI flags win; env vars fill the gaps.

use std::path::PathBuf;

use crate::{env_optional, env_u64};

/// Cache location relative to the home directory.
pub(crate) const DEFAULT_MEDIA_DIR: &str = ".telegram-mcp/media";

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 120_000;

pub(crate) fn resolve_media_dir(cli: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli {
        return path;
    }
    if let Some(value) = env_optional("TELEGRAM_MCP_MEDIA_DIR") {
        return PathBuf::from(value);
    }
    match env_optional("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_MEDIA_DIR),
        None => PathBuf::from(DEFAULT_MEDIA_DIR),
    }
}

pub(crate) fn http_timeout_ms() -> u64 {
    env_u64("TELEGRAM_MCP_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_beats_everything() {
        let dir = resolve_media_dir(Some(PathBuf::from("/tmp/override")));
        assert_eq!(dir, PathBuf::from("/tmp/override"));
    }
}
