//! Backup files
//!
//! The local engine copies its database file; every engine can also dump a
//! JSON snapshot with one array per table and restore from it.

use chrono::Local;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::store::Snapshot;

/// File name prefix of local database copies
pub const LOCAL_BACKUP_PREFIX: &str = "cavacrm_backup_";

/// File name prefix of JSON snapshots
pub const REMOTE_BACKUP_PREFIX: &str = "supabase_backup_";

/// Timestamp embedded in every backup file name
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Write `snapshot` as `<prefix><timestamp>.json` inside `dir`
pub fn write_snapshot(dir: &Path, prefix: &str, snapshot: &Snapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| Error::FileWriteError {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!(
        "{}{}.json",
        prefix,
        Local::now().format(TIMESTAMP_FORMAT)
    ));
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(&path, json).map_err(|source| Error::FileWriteError {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), rows = snapshot.total_rows(), "Wrote JSON snapshot");
    Ok(path)
}

/// Read a JSON snapshot written by [`write_snapshot`]
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.is_file() {
        return Err(Error::not_found("Backup file", path.display()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| Error::FileReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

pub fn is_json_snapshot(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Backup files in `dir`, newest first
pub fn list_backups(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut backups: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.starts_with(LOCAL_BACKUP_PREFIX) || name.starts_with(REMOTE_BACKUP_PREFIX)
        })
        .map(|e| e.into_path())
        .collect();

    // Timestamps sort lexically within a prefix
    backups.sort_by(|a, b| {
        let stamp = |p: &PathBuf| {
            p.file_name()
                .map(|n| {
                    n.to_string_lossy()
                        .trim_start_matches(LOCAL_BACKUP_PREFIX)
                        .trim_start_matches(REMOTE_BACKUP_PREFIX)
                        .to_string()
                })
                .unwrap_or_default()
        };
        stamp(b).cmp(&stamp(a))
    });
    backups
}
