// src/config.rs
//
// Channel configuration and validation.

use std::path::{Path, PathBuf};

use crate::error::PChannelError;

/// Default alpha ID width when `id_len` is not set explicitly.
pub const DEFAULT_ID_LEN: usize = 5;

/// Configuration for a `PChannel`/`Engine`.
///
/// `channel_id: None` means "mint a new channel" — a fresh UUID v4 is
/// generated and a directory of that name is created under `disk_path`.
/// `channel_id: Some(id)` means "resume" — `disk_path/id` must already
/// exist and is scanned by recovery.
#[derive(Debug, Clone)]
pub struct PChannelConfig {
    pub channel_id: Option<String>,
    pub max_msg_count: u64,
    pub max_cache_count: u64,
    pub disk_path: PathBuf,
    pub id_len: usize,
}

impl PChannelConfig {
    /// Build a config for a brand-new channel with a minted UUID.
    pub fn new(disk_path: impl Into<PathBuf>, max_msg_count: u64, max_cache_count: u64) -> Self {
        Self {
            channel_id: None,
            max_msg_count,
            max_cache_count,
            disk_path: disk_path.into(),
            id_len: DEFAULT_ID_LEN,
        }
    }

    /// Build a config that resumes an existing channel directory.
    pub fn resume(
        disk_path: impl Into<PathBuf>,
        channel_id: impl Into<String>,
        max_msg_count: u64,
        max_cache_count: u64,
    ) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            max_msg_count,
            max_cache_count,
            disk_path: disk_path.into(),
            id_len: DEFAULT_ID_LEN,
        }
    }

    pub fn with_id_len(mut self, id_len: usize) -> Self {
        self.id_len = id_len;
        self
    }
}

pub(crate) fn validate_config(c: &PChannelConfig) -> Result<(), PChannelError> {
    if c.max_cache_count == 0 {
        return Err(PChannelError::Config(
            "max_cache_count must be >= 1".to_string(),
        ));
    }
    if c.max_msg_count <= c.max_cache_count {
        return Err(PChannelError::Config(
            "max_msg_count must be strictly greater than max_cache_count".to_string(),
        ));
    }
    if c.id_len == 0 {
        return Err(PChannelError::Config("id_len must be >= 1".to_string()));
    }
    dir_exists(&c.disk_path)?;
    Ok(())
}

pub(crate) fn dir_exists(path: &Path) -> Result<(), PChannelError> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        PChannelError::Config(format!("path {} does not exist", path.display()))
    })?;
    if !metadata.is_dir() {
        return Err(PChannelError::Config(format!(
            "path {} is not a directory",
            path.display()
        )));
    }
    Ok(())
}
