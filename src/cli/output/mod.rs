pub mod json;
pub mod text;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::engine::{Invalidated, ProjectIndex, QueryResult};
use crate::types::{Comment, Directive, FileContent};

/// A query and its answer, as shown to the user.
pub struct QueryReport<'a> {
    /// The directive as the caller wrote it, e.g. `class` or `cpp:function`.
    pub requested: &'a str,
    /// The bucket it was looked up in.
    pub directive: &'a Directive,
    pub argument: &'a str,
    pub namespace: &'a str,
    pub module: &'a str,
    pub result: &'a QueryResult,
}

pub type Members = BTreeMap<(Directive, String), Arc<Comment>>;

pub fn render_scan(
    path: &Path,
    content: &FileContent,
    root: &Path,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => text::render_scan(path, content, root),
        OutputFormat::Json => json::render_scan(path, content, root)?,
    }
    Ok(())
}

pub fn render_index(
    index: &ProjectIndex,
    invalidated: &Invalidated,
    root: &Path,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => text::render_index(index, invalidated, root),
        OutputFormat::Json => json::render_index(index, invalidated, root)?,
    }
    Ok(())
}

pub fn render_query(report: &QueryReport<'_>, root: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => text::render_query(report, root),
        OutputFormat::Json => json::render_query(report, root)?,
    }
    Ok(())
}

pub fn render_members(
    namespace: &str,
    module: &str,
    members: Option<&Members>,
    root: &Path,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => text::render_members(namespace, members, root),
        OutputFormat::Json => json::render_members(namespace, module, members, root)?,
    }
    Ok(())
}

fn relative_path(file: &Path, project_root: &Path) -> String {
    file.strip_prefix(project_root)
        .unwrap_or(file)
        .display()
        .to_string()
}

fn relative_location(comment: &Comment, project_root: &Path) -> String {
    format!(
        "{}:{}",
        relative_path(&comment.file, project_root),
        comment.next_line
    )
}

fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}::{name}")
    }
}
