use serde::Serialize;
use std::path::Path;

use super::{relative_path, Members, QueryReport};
use crate::engine::{Invalidated, ProjectIndex};
use crate::types::{Comment, FileContent};

#[derive(Serialize)]
struct JsonComment<'a> {
    file: String,
    line: u32,
    text: Vec<&'a str>,
}

impl<'a> JsonComment<'a> {
    fn new(comment: &'a Comment, project_root: &Path) -> Self {
        Self {
            file: relative_path(&comment.file, project_root),
            line: comment.next_line,
            text: comment.stripped_text(),
        }
    }
}

#[derive(Serialize)]
struct JsonDirectiveComment<'a> {
    directive: String,
    namespace: &'a str,
    module: &'a str,
    signature: &'a str,
    comment: JsonComment<'a>,
}

#[derive(Serialize)]
struct JsonScan<'a> {
    file: String,
    module: &'a str,
    directive_comments: Vec<JsonDirectiveComment<'a>>,
    floating_comments: Vec<JsonComment<'a>>,
    diagnostics: &'a [String],
}

#[derive(Serialize)]
struct JsonIndexedFile<'a> {
    file: String,
    module: &'a str,
    directive_comments: usize,
    floating_comments: usize,
    diagnostics: &'a [String],
}

#[derive(Serialize)]
struct JsonIndex<'a> {
    files: Vec<JsonIndexedFile<'a>>,
    invalidated: &'a Invalidated,
    summary: JsonIndexSummary,
}

#[derive(Serialize)]
struct JsonIndexSummary {
    files: usize,
    directive_comments: usize,
    floating_comments: usize,
    diagnostics: usize,
}

#[derive(Serialize)]
struct JsonCloseMatch<'a> {
    signature: &'a str,
    similarity: f64,
    file: String,
    line: u32,
}

#[derive(Serialize)]
struct JsonQuery<'a> {
    found: bool,
    directive: &'a str,
    argument: &'a str,
    namespace: &'a str,
    module: &'a str,
    comment: Option<JsonComment<'a>>,
    close_matches: Vec<JsonCloseMatch<'a>>,
}

#[derive(Serialize)]
struct JsonMember<'a> {
    directive: String,
    signature: &'a str,
    comment: JsonComment<'a>,
}

#[derive(Serialize)]
struct JsonMembers<'a> {
    namespace: &'a str,
    module: &'a str,
    members: Vec<JsonMember<'a>>,
}

fn build_scan<'a>(path: &Path, content: &'a FileContent, project_root: &Path) -> JsonScan<'a> {
    JsonScan {
        file: relative_path(path, project_root),
        module: &content.module,
        directive_comments: content
            .directive_comments
            .iter()
            .map(|dc| JsonDirectiveComment {
                directive: dc.context.directive.to_string(),
                namespace: &dc.context.namespace,
                module: &dc.context.module,
                signature: &dc.signature,
                comment: JsonComment::new(&dc.comment, project_root),
            })
            .collect(),
        floating_comments: content
            .floating_comments
            .iter()
            .map(|c| JsonComment::new(c, project_root))
            .collect(),
        diagnostics: &content.diagnostics,
    }
}

fn build_index<'a>(
    index: &'a ProjectIndex,
    invalidated: &'a Invalidated,
    project_root: &Path,
) -> JsonIndex<'a> {
    let files: Vec<_> = index
        .files()
        .iter()
        .map(|(file, content)| JsonIndexedFile {
            file: relative_path(file, project_root),
            module: &content.module,
            directive_comments: content.directive_comments.len(),
            floating_comments: content.floating_comments.len(),
            diagnostics: &content.diagnostics,
        })
        .collect();
    let summary = JsonIndexSummary {
        files: files.len(),
        directive_comments: files.iter().map(|f| f.directive_comments).sum(),
        floating_comments: files.iter().map(|f| f.floating_comments).sum(),
        diagnostics: files.iter().map(|f| f.diagnostics.len()).sum(),
    };
    JsonIndex {
        files,
        invalidated,
        summary,
    }
}

fn build_query<'a>(report: &QueryReport<'a>, project_root: &Path) -> JsonQuery<'a> {
    JsonQuery {
        found: report.result.comment.is_some(),
        directive: report.requested,
        argument: report.argument,
        namespace: report.namespace,
        module: report.module,
        comment: report
            .result
            .comment
            .as_deref()
            .map(|c| JsonComment::new(c, project_root)),
        close_matches: report
            .result
            .close_matches
            .iter()
            .map(|m| JsonCloseMatch {
                signature: &m.signature,
                similarity: m.similarity,
                file: relative_path(&m.comment.file, project_root),
                line: m.comment.next_line,
            })
            .collect(),
    }
}

fn build_members<'a>(
    namespace: &'a str,
    module: &'a str,
    members: Option<&'a Members>,
    project_root: &Path,
) -> JsonMembers<'a> {
    JsonMembers {
        namespace,
        module,
        members: members
            .into_iter()
            .flatten()
            .map(|((directive, signature), comment)| JsonMember {
                directive: directive.to_string(),
                signature,
                comment: JsonComment::new(comment, project_root),
            })
            .collect(),
    }
}

fn print<T: Serialize>(output: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

pub fn render_scan(
    path: &Path,
    content: &FileContent,
    project_root: &Path,
) -> serde_json::Result<()> {
    print(&build_scan(path, content, project_root))
}

pub fn render_index(
    index: &ProjectIndex,
    invalidated: &Invalidated,
    project_root: &Path,
) -> serde_json::Result<()> {
    print(&build_index(index, invalidated, project_root))
}

pub fn render_query(report: &QueryReport<'_>, project_root: &Path) -> serde_json::Result<()> {
    print(&build_query(report, project_root))
}

pub fn render_members(
    namespace: &str,
    module: &str,
    members: Option<&Members>,
    project_root: &Path,
) -> serde_json::Result<()> {
    print(&build_members(namespace, module, members, project_root))
}
