use std::path::PathBuf;

use thiserror::Error;

use crate::types::Location;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{location}: documentation comments may not be interleaved with block comments")]
    InterleavedComment { location: Location },

    #[error(
        "duplicate /// for {directive} `{signature}`{}:\n  {existing}\n  vs\n  {incoming}",
        in_namespace(.namespace)
    )]
    DuplicateDocumentation {
        directive: String,
        signature: String,
        namespace: String,
        existing: Location,
        incoming: Location,
    },

    #[error("{} is already indexed; remove it before adding it again", .path.display())]
    AlreadyIndexed { path: PathBuf },

    #[error("unreadable index cache: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn in_namespace(namespace: &str) -> String {
    if namespace.is_empty() {
        String::new()
    } else {
        format!(" in {namespace}")
    }
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
