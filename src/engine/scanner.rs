use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// The watch-list: every file under `root` the include globs select and the
/// ignore globs do not, sorted.
pub fn scan(root: &Path, config: &Config) -> Vec<PathBuf> {
    let ignore_set = build_glob_set(&config.ignore);
    let ignore_files_set = build_glob_set(&config.ignore_files);
    let include_set = build_glob_set(&config.include);
    let mut files = Vec::new();
    walk_dir(
        root,
        root,
        &ignore_set,
        &ignore_files_set,
        &include_set,
        &mut files,
    );
    files.sort();
    files
}

pub(crate) fn build_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    patterns
        .iter()
        .filter_map(|p| GlobBuilder::new(p).case_insensitive(true).build().ok())
        .for_each(|glob| {
            builder.add(glob);
        });
    builder.build().unwrap_or_default()
}

pub(crate) fn matches_glob(path: &Path, root: &Path, set: &GlobSet) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| set.is_match(name))
        || path.strip_prefix(root).is_ok_and(|rel| set.is_match(rel))
}

fn walk_dir(
    dir: &Path,
    root: &Path,
    ignore: &GlobSet,
    ignore_files: &GlobSet,
    include: &GlobSet,
    files: &mut Vec<PathBuf>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if matches_glob(&path, root, ignore) {
            continue;
        }

        if path.is_dir() {
            walk_dir(&path, root, ignore, ignore_files, include, files);
        } else if !matches_glob(&path, root, ignore_files) && matches_glob(&path, root, include) {
            files.push(path);
        }
    }
}
