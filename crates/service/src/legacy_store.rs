//! Access to the legacy `generatednames.json` flat file.
//!
//! The file is a JSON array of [`GeneratedName`]s. It is the migration
//! source and, when relational storage is unavailable, the write target.
//! Writes replace the whole file via a temporary file and a rename.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use namelog_core::generated_name::{parse_legacy_array, GeneratedName};
use namelog_core::types::Timestamp;

use crate::config::StorageConfig;
use crate::error::ServiceResult;

#[derive(Debug, Clone)]
pub struct LegacyNameStore {
    path: PathBuf,
}

impl LegacyNameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.legacy_file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file content, or `None` if the file does not exist.
    pub async fn read_raw(&self) -> ServiceResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The undecoded array elements. A missing or blank file has none.
    pub async fn read_entries(&self) -> ServiceResult<Vec<serde_json::Value>> {
        match self.read_raw().await? {
            Some(raw) => Ok(parse_legacy_array(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Number of records in the file.
    pub async fn count(&self) -> ServiceResult<usize> {
        Ok(self.read_entries().await?.len())
    }

    /// Decode every record. Fails on the first malformed element so a later
    /// rewrite can never silently drop it.
    pub async fn read_all(&self) -> ServiceResult<Vec<GeneratedName>> {
        let names = self
            .read_entries()
            .await?
            .into_iter()
            .map(GeneratedName::from_legacy_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Replace the file content with `names`.
    pub async fn write_all(&self, names: &[GeneratedName]) -> ServiceResult<()> {
        if let Some(dir) = self.dir() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(names)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Write `raw` verbatim to a timestamped copy next to the file and return
    /// the copy's path.
    pub async fn backup(&self, raw: &str) -> ServiceResult<PathBuf> {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("generatednames");
        let backup_path = match self.dir() {
            Some(dir) => dir.join(backup_file_name(stem, Utc::now())),
            None => PathBuf::from(backup_file_name(stem, Utc::now())),
        };

        tokio::fs::write(&backup_path, raw).await?;
        tracing::info!(path = %backup_path.display(), "Created legacy file backup");
        Ok(backup_path)
    }

    fn dir(&self) -> Option<&Path> {
        self.path.parent().filter(|dir| !dir.as_os_str().is_empty())
    }
}

/// `<stem>_backup_YYYYMMDD_HHMMSS.json`
pub fn backup_file_name(stem: &str, at: Timestamp) -> String {
    format!("{stem}_backup_{}.json", at.format("%Y%m%d_%H%M%S"))
}
