use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::types::FileContent;

use super::index::{Invalidated, ProjectIndex};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    files: &'a BTreeMap<PathBuf, FileContent>,
    references: &'a BTreeMap<String, BTreeSet<PathBuf>>,
    pending: &'a Invalidated,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    files: BTreeMap<PathBuf, FileContent>,
    references: BTreeMap<String, BTreeSet<PathBuf>>,
    #[serde(default)]
    pending: Invalidated,
}

pub fn save(index: &ProjectIndex, path: &Path) -> Result<()> {
    let snapshot = SnapshotRef {
        version: FORMAT_VERSION,
        files: index.files(),
        references: index.references(),
        pending: index.pending(),
    };
    let json = serde_json::to_vec(&snapshot)?;
    std::fs::write(path, json).map_err(|e| Error::io(path, e))?;
    debug!("saved {} files to {}", index.files().len(), path.display());
    Ok(())
}

/// Restore a saved index. `Ok(None)` when there is no snapshot or it was
/// written by another format version.
///
/// Files are re-added one by one, so a snapshot holding conflicting
/// documentation fails the same way a fresh scan would.
pub fn load(path: &Path, query: QueryConfig) -> Result<Option<ProjectIndex>> {
    let json = match std::fs::read(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };
    let snapshot: Snapshot = serde_json::from_slice(&json)?;
    if snapshot.version != FORMAT_VERSION {
        debug!(
            "ignoring {}: format version {}",
            path.display(),
            snapshot.version
        );
        return Ok(None);
    }

    let mut index = ProjectIndex::new(query);
    for (file, content) in snapshot.files {
        index.add(file, content)?;
    }
    index.restore_references(snapshot.references);
    index.restore_pending(snapshot.pending);
    Ok(Some(index))
}
