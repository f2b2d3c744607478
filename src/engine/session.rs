use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::parser::frontend::FrontEnd;
use crate::types::Directive;

use super::cache;
use super::index::{Invalidated, ProjectIndex, QueryResult};
use super::scanner;
use super::update::{check_for_updates, ScanArgs};

/// One documentation build: the project's index plus everything needed to
/// keep it current.
pub struct Session {
    root: PathBuf,
    config: Config,
    front_end: Box<dyn FrontEnd>,
    index: ProjectIndex,
}

impl Session {
    /// Start a session, picking up the cached index if there is a usable one.
    pub fn open(root: &Path, config: Config, front_end: Box<dyn FrontEnd>) -> Self {
        let root = root.to_path_buf();
        let cached = cache_path(&root, &config).and_then(|path| {
            cache::load(&path, config.query.clone()).unwrap_or_else(|e| {
                warn!("discarding index cache: {e}");
                None
            })
        });
        if let Some(index) = &cached {
            info!("restored {} files from cache", index.files().len());
        }
        let index = cached.unwrap_or_else(|| ProjectIndex::new(config.query.clone()));
        Self {
            root,
            config,
            front_end,
            index,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    /// Walk the project and bring the index up to date.
    pub fn refresh(&mut self) -> Result<Invalidated> {
        let watched = scanner::scan(&self.root, &self.config);
        self.refresh_paths(&watched)
    }

    /// Bring the index up to date with an explicit watch-list.
    pub fn refresh_paths(&mut self, watched: &[PathBuf]) -> Result<Invalidated> {
        let args = ScanArgs::new(&self.root, &self.config);
        check_for_updates(
            &mut self.index,
            watched,
            self.front_end.as_ref(),
            &args,
            &self.config.scan,
        )
    }

    pub fn query(
        &self,
        directive: &Directive,
        signature: &str,
        namespace: &str,
        module: &str,
    ) -> QueryResult {
        self.index.query(directive, signature, namespace, module)
    }

    /// Query on behalf of `document`, remembering the dependency on a hit.
    pub fn lookup_for_document(
        &mut self,
        document: &str,
        directive: &Directive,
        signature: &str,
        namespace: &str,
        module: &str,
    ) -> QueryResult {
        self.index
            .lookup_for_document(document, directive, signature, namespace, module)
    }

    pub fn purge_document(&mut self, document: &str) {
        self.index.purge_document(document);
    }

    /// End the session, saving the index when caching is enabled.
    pub fn close(self) -> Result<()> {
        if let Some(path) = cache_path(&self.root, &self.config) {
            cache::save(&self.index, &path)?;
        }
        Ok(())
    }
}

fn cache_path(root: &Path, config: &Config) -> Option<PathBuf> {
    (!config.cache.as_os_str().is_empty()).then(|| root.join(&config.cache))
}
