//! Atomic document writes.
//!
//! Content goes to a temporary file in the target directory, is fsynced and
//! then renamed over the target, so readers see either the old document or
//! the new one and never a torn write.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Atomically write `content` to `path`, creating parent directories.
///
/// Line endings are normalized to LF.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<()> {
    let normalized = normalize_line_endings(content);

    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create parent directory: {dir}"))?;

    let mut temp_file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in: {dir}"))?;
    temp_file
        .write_all(normalized.as_bytes())
        .context("Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;

    temp_file
        .persist(path.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .with_context(|| format!("Failed to atomically write file: {path}"))?;

    Ok(())
}

/// Read a document, normalizing CRLF to LF. A missing file reads as `None`.
pub fn read_document(path: &Utf8Path) -> Result<Option<String>> {
    match fs::read_to_string(path.as_std_path()) {
        Ok(content) => Ok(Some(normalize_line_endings(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read file: {path}")),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn path_in(dir: &TempDir, rel: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_write_creates_parents_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "F/Foo Inc/Foo Inc - Call Brief.md");

        write_file_atomic(&path, "first").unwrap();
        write_file_atomic(&path, "second\r\nline").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "second\nline");
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "doc.md");
        write_file_atomic(&path, "x").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_read_document_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_document(&path_in(&dir, "absent.md")).unwrap().is_none());
    }

    #[test]
    fn test_read_document_normalizes_crlf() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "crlf.md");
        fs::write(&path, b"one\r\ntwo").unwrap();
        assert_eq!(read_document(&path).unwrap().as_deref(), Some("one\ntwo"));
    }
}
