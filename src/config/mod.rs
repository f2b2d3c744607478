use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;

pub const CONFIG_FILE: &str = ".doccombrc.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format when `--format` is not given.
    pub format: OutputFormat,
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    pub ignore_files: Vec<String>,
    /// Front-end arguments for every file.
    pub default_args: Vec<String>,
    /// Per-file argument overrides, keyed by path relative to the root.
    pub file_args: BTreeMap<PathBuf, Vec<String>>,
    /// Index snapshot, relative to the root. Empty disables caching.
    pub cache: PathBuf,
    pub scan: ScanConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Give explicit directives the namespace of the declaration that
    /// follows them, when there is one. Otherwise they are always global.
    pub explicit_directive_namespace: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_suggestions: usize,
    /// Minimum similarity (0.0 to 1.0) for a close match.
    pub suggestion_cutoff: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            include: [
                "**/*.h", "**/*.hh", "**/*.hpp", "**/*.hxx", "**/*.c", "**/*.cc", "**/*.cpp",
                "**/*.cxx",
            ]
            .map(String::from)
            .to_vec(),
            ignore: [".git", "build", "target", "node_modules"]
                .map(String::from)
                .to_vec(),
            ignore_files: Vec::new(),
            default_args: Vec::new(),
            file_args: BTreeMap::new(),
            cache: PathBuf::from(".doccomb-cache.json"),
            scan: ScanConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            explicit_directive_namespace: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            suggestion_cutoff: 0.6,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let path = config_path.map(Path::to_path_buf).or_else(|| {
            let default = project_root.join(CONFIG_FILE);
            default.exists().then_some(default)
        });

        match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content).map_err(|e| anyhow::anyhow!("Config parse error: {e}"))
            }
            None => Ok(Config::default()),
        }
    }

    /// Front-end arguments for `relative`: its override if it has one,
    /// otherwise the defaults.
    pub fn args_for(&self, relative: &Path) -> &[String] {
        self.file_args
            .get(relative)
            .unwrap_or(&self.default_args)
    }

    pub const fn default_toml() -> &'static str {
        r#"# doccomb configuration

# Which files to scan for /// comments (glob patterns, case-insensitive).
include = ["**/*.h", "**/*.hh", "**/*.hpp", "**/*.hxx", "**/*.c", "**/*.cc", "**/*.cpp", "**/*.cxx"]

# Directories to ignore when scanning
ignore = [".git", "build", "target", "node_modules"]

# Individual files to skip entirely (supports glob patterns)
# ignore_files = ["third_party/**"]

# Front-end arguments for every file, e.g. macros to treat as known
# default_args = ["-DEXPORT_API"]

# Output format when --format is not given: "text" or "json"
format = "text"

# Where to keep the index between runs. Set to "" to disable.
cache = ".doccomb-cache.json"

# Per-file overrides of default_args
[file_args]
# "src/legacy.hxx" = ["-DLEGACY_API"]

[scan]
# Explicit `///.. directive:: argument` comments take the namespace of the
# declaration that follows them.
explicit_directive_namespace = true

[query]
max_suggestions = 3
suggestion_cutoff = 0.6
"#
    }
}
