use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::frontend::{Token, TokenKind};
use super::tokens::Tokens;
use crate::error::{Error, Result};
use crate::types::{Comment, Directive, Location};

static EXPLICIT_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^///\.\.\s+(\S+?)::\s*(.*?)\s*$").expect("explicit directive regex")
});

pub fn is_documentation(token: &Token) -> bool {
    token.kind == TokenKind::Comment && token.spelling.starts_with(Comment::PREFIX)
}

/// Read the next run of `///` lines.
///
/// Tokens before the first documentation comment are consumed and ignored.
/// The run ends at the first non-comment token or at a comment starting
/// more than one line after the previous one; that token is pushed back.
/// Plain `//` comments inside a run are skipped; a block comment inside a
/// run is an error.
pub fn read_comment(tokens: &mut Tokens<'_>, file: &Path) -> Result<Option<Comment>> {
    let Some(first) = tokens.find(|t| is_documentation(t)) else {
        return Ok(None);
    };

    let mut comment = Comment {
        file: file.to_path_buf(),
        next_line: first.extent.end.line + 1,
        text: vec![first.spelling.clone()],
        cursor_kind: None,
    };

    while let Some(t) = tokens.next() {
        if t.kind != TokenKind::Comment || t.extent.start.line > comment.next_line {
            tokens.unget(t);
            break;
        }
        if is_documentation(t) {
            comment.text.push(t.spelling.clone());
        } else if t.spelling.starts_with("/*") {
            return Err(Error::InterleavedComment {
                location: Location {
                    file: file.to_path_buf(),
                    line: t.extent.start.line,
                },
            });
        }
        comment.next_line = t.extent.end.line + 1;
    }

    Ok(Some(comment))
}

/// A `///.. directive:: argument` first line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitDirective {
    pub directive: Directive,
    pub argument: String,
}

/// Remove and return the explicit directive on the comment's first line.
pub fn take_explicit_directive(comment: &mut Comment) -> Option<ExplicitDirective> {
    let first = comment.text.first()?;
    if !first.starts_with("///..") {
        return None;
    }
    let Some(captures) = EXPLICIT_DIRECTIVE.captures(first) else {
        warn!(
            "{}: ignoring malformed explicit directive `{first}`",
            comment.location()
        );
        return None;
    };
    let directive = Directive::parse(&captures[1]);
    let argument = captures
        .get(2)
        .map_or(String::new(), |m| m.as_str().to_string());
    comment.text.remove(0);
    Some(ExplicitDirective {
        directive,
        argument,
    })
}
