//! Miscellaneous utilities: URL file names and atomic file writes.

use std::io;
use std::path::{Path, PathBuf};

// ── URL file names ────────────────────────────────────────────────────────────

/// Return the last path segment of `url` ("http://x/a/fw1.ota" → "fw1.ota").
///
/// Returns `None` when the URL does not parse, has no path, or ends in a
/// segment that cannot name a file inside the storage directory (empty,
/// `.` or `..`).
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.last()?;
    match last {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

// ── Atomic writes ─────────────────────────────────────────────────────────────

/// Hidden sibling path used while `path` is being written.
pub fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

/// Write `data` to `path` via a hidden temp file and a rename, so readers
/// only ever see the old file or the complete new one.
pub async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = partial_path(path);
    if let Err(e) = tokio::fs::write(&tmp, data).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_last_segment() {
        assert_eq!(filename_from_url("http://x/fw1.ota").as_deref(), Some("fw1.ota"));
        assert_eq!(
            filename_from_url("https://github.com/a/b/raw/master/images/IKEA/10005777.ota?raw=1")
                .as_deref(),
            Some("10005777.ota")
        );
    }

    #[test]
    fn unusable_urls_have_no_filename() {
        assert_eq!(filename_from_url("http://x/dir/"), None);
        assert_eq!(filename_from_url("not a url"), None);
        assert_eq!(filename_from_url("mailto:someone@example.com"), None);
    }

    #[test]
    fn partial_path_is_hidden_sibling() {
        let p = partial_path(Path::new("/tmp/ota/fw1.ota"));
        assert_eq!(p, PathBuf::from("/tmp/ota/.fw1.ota.part"));
    }

    #[tokio::test]
    async fn write_atomic_replaces_and_cleans_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fw.ota");
        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!partial_path(&path).exists());
    }
}
