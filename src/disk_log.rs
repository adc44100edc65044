// src/disk_log.rs
//
// The disk log is not a separate object — it is the channel's directory.
// These are the filesystem operations the engine performs on it: one file
// per message, named by its alpha ID, holding the raw serialized payload.
//
// Files are created `0o600` and directories `0o700` instead of the
// source's `0447` (flagged in spec.md §9 as almost certainly unintentional).

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use tracing::debug;

use crate::error::PChannelError;

/// Create `path` as a fresh, empty, `0o700` directory.
pub(crate) fn create_dir(path: &Path) -> Result<(), PChannelError> {
    fs::create_dir(path).map_err(|e| PChannelError::io(path, e))?;
    set_dir_mode(path)?;
    debug!(path = %path.display(), "created channel directory");
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) -> Result<(), PChannelError> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .map_err(|e| PChannelError::io(path, e))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) -> Result<(), PChannelError> {
    Ok(())
}

/// Write `bytes` to `dir/id`, creating (or truncating) the file.
pub(crate) fn write(dir: &Path, id: &str, bytes: &[u8]) -> Result<(), PChannelError> {
    let path = dir.join(id);
    fs::write(&path, bytes).map_err(|e| PChannelError::io(&path, e))?;
    set_file_mode(&path)?;
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> Result<(), PChannelError> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| PChannelError::io(path, e))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> Result<(), PChannelError> {
    Ok(())
}

/// Read the full contents of `dir/id`.
pub(crate) fn read(dir: &Path, id: &str) -> Result<Vec<u8>, PChannelError> {
    let path = dir.join(id);
    fs::read(&path).map_err(|e| PChannelError::io(&path, e))
}

/// Delete `dir/id`. Fails if the file is missing.
pub(crate) fn remove(dir: &Path, id: &str) -> Result<(), PChannelError> {
    let path = dir.join(id);
    fs::remove_file(&path).map_err(|e| PChannelError::io(&path, e))
}

/// List directory entries as (file name, modified time), for recovery's
/// (mtime, name) sort. Non-file entries are skipped.
pub(crate) fn list(dir: &Path) -> Result<Vec<(String, std::time::SystemTime)>, PChannelError> {
    let mut out = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| PChannelError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PChannelError::io(dir, e))?;
        let metadata = entry.metadata().map_err(|e| PChannelError::io(dir, e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| PChannelError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        out.push((name, modified));
    }
    Ok(out)
}

/// Delete the channel directory and everything inside it.
pub(crate) fn remove_all(dir: &Path) -> Result<(), PChannelError> {
    fs::remove_dir_all(dir).map_err(|e| PChannelError::io(dir, e))
}

#[allow(dead_code)]
pub(crate) fn path_of(dir: &Path, id: &str) -> PathBuf {
    dir.join(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "aaaaa", b"hello").unwrap();
        assert_eq!(read(dir.path(), "aaaaa").unwrap(), b"hello");
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "aaaaa", b"hello").unwrap();
        remove(dir.path(), "aaaaa").unwrap();
        assert!(read(dir.path(), "aaaaa").is_err());
    }

    #[test]
    fn remove_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove(dir.path(), "aaaaa").is_err());
    }

    #[test]
    fn list_returns_only_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "aaaaa", b"1").unwrap();
        write(dir.path(), "aaaab", b"2").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut names: Vec<String> = list(dir.path())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["aaaaa".to_string(), "aaaab".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn write_sets_restrictive_file_mode() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "aaaaa", b"hello").unwrap();
        let mode = fs::metadata(dir.path().join("aaaaa"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }
}
