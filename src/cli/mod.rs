pub mod output;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "doccomb",
    version,
    about = "Index /// documentation comments in C and C++ sources"
)]
pub struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan one file and print what its comments document
    Scan {
        /// Source file to scan
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Front-end arguments, e.g. -- -DEXPORT_API (default: from config)
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Index a project and report what was found
    Index {
        /// Project root directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Look up the comment documenting a declaration
    Query {
        /// Directive, e.g. function, struct, class, macro, cpp:member
        directive: String,

        /// Declaration signature as written after the directive
        #[arg(required = true, num_args = 1..)]
        argument: Vec<String>,

        /// Enclosing namespace, `::`-separated
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Module name
        #[arg(short, long, default_value = "")]
        module: String,

        /// Record the lookup as a dependency of this document
        #[arg(short, long)]
        document: Option<String>,

        #[command(flatten)]
        project: ProjectArgs,
    },
    /// List everything documented directly inside a namespace
    Members {
        /// Namespace, `::`-separated (default: global scope)
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Module name
        #[arg(short, long, default_value = "")]
        module: String,

        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Keep the index current while files change
    Watch {
        /// Project root directory to watch
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create a default .doccombrc.toml
    Init,
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Project root directory
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Join a directive argument given as several words, dropping line
/// continuation backslashes.
pub fn join_argument(words: &[String]) -> String {
    words
        .iter()
        .map(String::as_str)
        .filter(|word| *word != "\\")
        .collect::<Vec<_>>()
        .join(" ")
}
