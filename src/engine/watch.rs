use globset::GlobSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::Result;

use super::index::Invalidated;
use super::scanner::{build_glob_set, matches_glob};
use super::session::Session;

/// Whether a changed path can affect the index.
struct Relevance {
    include: GlobSet,
    ignore: GlobSet,
}

impl Relevance {
    fn new(session: &Session) -> Self {
        let config = session.config();
        Self {
            include: build_glob_set(&config.include),
            ignore: build_glob_set(&config.ignore),
        }
    }

    fn matches(&self, path: &Path, root: &Path) -> bool {
        let ignored = path
            .strip_prefix(root)
            .map(|relative| {
                relative
                    .ancestors()
                    .filter(|a| !a.as_os_str().is_empty())
                    .any(|a| matches_glob(&root.join(a), root, &self.ignore))
            })
            .unwrap_or(false);
        !ignored && matches_glob(path, root, &self.include)
    }

    fn event(&self, event: &Event, root: &Path) -> bool {
        !matches!(event.kind, EventKind::Access(_))
            && event.paths.iter().any(|p| self.matches(p, root))
    }
}

/// Refresh `session` whenever a source file under its root changes, calling
/// `on_update` after each refresh. Events arriving within `debounce` of each
/// other are handled by a single refresh. Runs until the watcher goes away.
///
/// A refresh that fails (e.g. a duplicate comment) is logged and the loop
/// keeps going, so the user can fix the file and save again.
pub fn watch(
    session: &mut Session,
    debounce: Duration,
    mut on_update: impl FnMut(&Session, &Invalidated),
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )?;
    let root = session.root().to_path_buf();
    watcher.watch(&root, RecursiveMode::Recursive)?;
    let relevance = Relevance::new(session);
    debug!("watching {}", root.display());

    while let Ok(first) = rx.recv() {
        let mut relevant = false;
        let mut pending = Some(first);
        while let Some(res) = pending.take() {
            match res {
                Ok(event) => relevant |= relevance.event(&event, &root),
                Err(e) => warn!("watch error: {e}"),
            }
            pending = rx.recv_timeout(debounce).ok();
        }
        if !relevant {
            continue;
        }

        match session.refresh() {
            Ok(invalidated) => on_update(session, &invalidated),
            Err(e) => error!("{e}"),
        }
    }
    Ok(())
}
