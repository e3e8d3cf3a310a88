//! Whole-document JSON persistence shared by all components.
//!
//! Every document is rewritten wholesale on each mutation: serialised
//! pretty-printed to a sibling `*.tmp` file, then renamed over the target,
//! so a reader never observes a partially written document.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::{MuninnError, Result};

/// Read a document's raw text.
///
/// Returns `Ok(None)` when the file does not exist.
pub(crate) fn read_text(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MuninnError::io(path, e)),
    }
}

/// Serialise `value` and atomically replace `path` with it (tmp + rename).
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MuninnError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, format!("{json}\n")).map_err(|e| MuninnError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        // Leave no stray tmp file behind; the target is untouched.
        let _ = std::fs::remove_file(&tmp_path);
        MuninnError::io(path, e)
    })?;

    Ok(())
}

/// Create a directory (and parents) if missing. Failures are logged only.
pub(crate) fn ensure_dir(dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(path = %dir.display(), error = %e, "failed to create state directory");
    }
}

/// Move an unreadable document aside so it is not silently overwritten.
///
/// The file is renamed to `<name>.corrupt-<epoch_ms>`. Returns the new path
/// on success.
pub(crate) fn quarantine(path: &Path, now_ms: u64) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let target = path.with_file_name(format!("{file_name}.corrupt-{now_ms}"));
    match std::fs::rename(path, &target) {
        Ok(()) => Some(target),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to quarantine corrupt document");
            None
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();

        let text = read_text(&path).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["a"], 1);
        // pretty-printed
        assert!(text.contains('\n'));
    }

    #[test]
    fn write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &serde_json::json!([])).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("doc.json");
        write_json_atomic(&path, &serde_json::json!({})).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_text(&dir.path().join("missing.json")).unwrap().is_none());
    }

    #[test]
    fn quarantine_renames_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{{{").unwrap();

        let moved = quarantine(&path, 123).unwrap();
        assert!(!path.exists());
        assert!(moved.ends_with("doc.json.corrupt-123"));
        assert_eq!(std::fs::read_to_string(moved).unwrap(), "{{{");
    }
}
