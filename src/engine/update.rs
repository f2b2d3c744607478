use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Config, ScanConfig};
use crate::error::Result;
use crate::parser::frontend::FrontEnd;
use crate::parser::scan_file;

use super::index::{Invalidated, ProjectIndex};

/// Front-end arguments per file: the defaults, unless the file has its own.
#[derive(Debug, Clone, Copy)]
pub struct ScanArgs<'a> {
    root: &'a Path,
    config: &'a Config,
}

impl<'a> ScanArgs<'a> {
    pub fn new(root: &'a Path, config: &'a Config) -> Self {
        Self { root, config }
    }

    pub fn for_path(&self, path: &Path) -> &'a [String] {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        self.config.args_for(relative)
    }
}

/// Bring `index` in line with `watched`.
///
/// Indexed files that left the watch-list or changed on disk are removed
/// first; then every watched file without an entry is scanned (in parallel)
/// and added (one at a time). Returns the documents that referenced a
/// removed file.
///
/// When a scan or an `add` fails, the documents invalidated so far stay in
/// the index and are returned by the next call that succeeds.
pub fn check_for_updates(
    index: &mut ProjectIndex,
    watched: &[PathBuf],
    front_end: &dyn FrontEnd,
    args: &ScanArgs<'_>,
    options: &ScanConfig,
) -> Result<Invalidated> {
    let watch_set: BTreeSet<&Path> = watched.iter().map(PathBuf::as_path).collect();
    let mut removed = 0usize;

    for path in index.indexed_paths() {
        let recorded = index.file(&path).map(|content| content.mtime);
        let current = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        if watch_set.contains(path.as_path()) && current.is_some() && current == recorded {
            continue;
        }
        debug!("{} is stale", path.display());
        let stale = index.remove(&path);
        index.defer_invalidated(stale);
        removed += 1;
    }

    let missing: Vec<&PathBuf> = watched
        .iter()
        .filter(|path| index.file(path).is_none())
        .collect();

    let scanned: Vec<_> = missing
        .par_iter()
        .map(|path| {
            let content = scan_file(front_end, path, args.for_path(path), options);
            ((*path).clone(), content)
        })
        .collect();

    let rescanned = scanned.len();
    for (path, content) in scanned {
        index.add(path, content?)?;
    }

    let invalidated = index.take_pending();
    if removed > 0 || rescanned > 0 {
        info!(
            "{rescanned} files scanned, {removed} removed, {} documents invalidated",
            invalidated.len()
        );
    }
    Ok(invalidated)
}
