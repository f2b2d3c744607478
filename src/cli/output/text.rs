use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{qualified, relative_location, relative_path, Members, QueryReport};
use crate::engine::{Invalidated, ProjectIndex};
use crate::types::{Comment, FileContent};

fn rule() {
    println!("  {}", "\u{2501}".repeat(50).dimmed());
}

/// Markup for one documented declaration: the directive line, a blank line,
/// then the comment body indented by two spaces. `directive` is printed as
/// given, so `class` stays `class` even though it shares the struct bucket.
pub fn directive_block(directive: &str, argument: &str, comment: &Comment) -> String {
    let mut lines = vec![format!(".. {directive}:: {argument}"), String::new()];
    lines.extend(comment.stripped_text().into_iter().map(|line| {
        if line.trim().is_empty() {
            String::new()
        } else {
            format!("  {line}")
        }
    }));
    lines.join("\n")
}

pub fn render_scan(path: &Path, content: &FileContent, root: &Path) {
    println!();
    println!("  {}", relative_path(path, root).bold());
    if !content.module.is_empty() {
        println!("  module {}", content.module.cyan());
    }
    rule();

    for dc in &content.directive_comments {
        println!(
            "  L{:<4} {} {}",
            dc.comment.next_line,
            dc.context.directive.to_string().cyan(),
            qualified(&dc.context.namespace, &dc.signature).bold()
        );
        for line in dc.comment.stripped_text() {
            println!("          {}", line.dimmed());
        }
    }
    for comment in &content.floating_comments {
        println!("  L{:<4} {}", comment.next_line, "floating".yellow());
        for line in comment.stripped_text() {
            println!("          {}", line.dimmed());
        }
    }
    for diagnostic in &content.diagnostics {
        println!("  {} {diagnostic}", "\u{26a0}".yellow());
    }

    rule();
    println!(
        "  {} documented, {} floating",
        content.directive_comments.len().bold(),
        content.floating_comments.len().bold()
    );
    println!();
}

pub fn render_index(index: &ProjectIndex, invalidated: &Invalidated, root: &Path) {
    let mut by_directive: BTreeMap<String, usize> = BTreeMap::new();
    let mut floating = 0;
    let mut diagnostics = 0;
    for content in index.files().values() {
        for dc in &content.directive_comments {
            *by_directive
                .entry(dc.context.directive.to_string())
                .or_default() += 1;
        }
        floating += content.floating_comments.len();
        diagnostics += content.diagnostics.len();
    }

    println!();
    rule();
    if index.files().is_empty() {
        println!("  {}", "no source files found".yellow());
        rule();
        println!();
        return;
    }
    println!(
        "  {} documented declarations across {} files",
        index.len().bold(),
        index.files().len().bold()
    );
    rule();

    for (directive, count) in &by_directive {
        println!("    {:<12} {count}", directive.cyan());
    }
    if floating > 0 {
        println!("    {:<12} {floating}", "floating".yellow());
    }

    let noisy: Vec<_> = index
        .files()
        .iter()
        .filter(|(_, content)| !content.diagnostics.is_empty())
        .collect();
    if diagnostics > 0 {
        println!();
        println!(
            "  {} {}",
            "\u{26a0}".yellow(),
            format!("{diagnostics} front-end diagnostics").yellow().bold()
        );
        for (file, content) in noisy {
            println!("    {}", relative_path(file, root).dimmed());
            for diagnostic in &content.diagnostics {
                println!("      {diagnostic}");
            }
        }
    }

    if !invalidated.is_empty() {
        println!();
        println!("  {}", "invalidated documents".bold());
        for document in invalidated {
            println!("    {document}");
        }
    }
    println!();
}

pub fn render_query(report: &QueryReport<'_>, root: &Path) {
    if let Some(comment) = &report.result.comment {
        println!(
            "{}",
            directive_block(report.requested, report.argument, comment)
        );
        return;
    }

    println!(
        "{} no documentation for {} {}",
        "\u{2717}".red(),
        report.requested.red().bold(),
        qualified(report.namespace, report.argument).bold()
    );
    if !report.module.is_empty() {
        println!("  in module {}", report.module);
    }
    if !report.result.close_matches.is_empty() {
        println!("  close matches:");
        for close in &report.result.close_matches {
            println!(
                "    {}  {}",
                close.signature,
                relative_location(&close.comment, root).dimmed()
            );
        }
    }
}

pub fn render_members(namespace: &str, members: Option<&Members>, root: &Path) {
    let scope = if namespace.is_empty() {
        "global scope".to_string()
    } else {
        namespace.to_string()
    };
    let Some(members) = members else {
        println!("  {}", format!("nothing documented in {scope}").yellow());
        return;
    };

    println!();
    println!("  {} {}", scope.bold(), format!("({})", members.len()).dimmed());
    rule();
    for ((directive, signature), comment) in members {
        println!(
            "    {:<12} {}  {}",
            directive.to_string().cyan(),
            signature,
            relative_location(comment, root).dimmed()
        );
    }
    println!();
}
