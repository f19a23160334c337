// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for single-node deployments.
//!
//! A snapshot is the complete table set serialized as JSON. Writes go to a
//! temporary file that is fsynced and renamed over the target, so a crash
//! leaves either the old or the new snapshot on disk, never a torn one.

use crate::tables::Tables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {supported}")]
    TooNew { found: u32, supported: u32 },
}

/// The store's tables at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version
    #[serde(rename = "v")]
    pub version: u32,
    pub tables: Tables,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

const MAX_BAK_FILES: u32 = 3;

impl Snapshot {
    pub fn new(tables: Tables) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, tables, created_at: Utc::now() }
    }

    /// Atomically write the snapshot to `path`, keeping the previous one as
    /// a rotated `.bak`.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_vec(self)?;
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        if path.exists() {
            fs::copy(path, rotate_bak_path(path))?;
        }
        fs::rename(&tmp_path, path)?;
        tracing::debug!(
            path = %path.display(),
            jobs = self.tables.jobs.len(),
            batches = self.tables.batches.len(),
            locks = self.tables.resource_locks.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load a snapshot, or `None` if no file exists at `path`.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
        let found = raw
            .get("v")
            .and_then(serde_json::Value::as_u64)
            .map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX));
        if found > CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::TooNew { found, supported: CURRENT_SNAPSHOT_VERSION });
        }
        let mut snapshot: Snapshot = serde_json::from_value(raw)?;
        snapshot.tables.rebuild_indexes();
        Ok(Some(snapshot))
    }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
