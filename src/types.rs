use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::parser::frontend::CursorKind;

/// Documentation category a signature is indexed under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Directive {
    Function,
    Struct,
    Macro,
    TypeAlias,
    Variable,
    Member,
    Custom(String),
}

impl Directive {
    /// Parse a directive name as written in a comment or a query.
    ///
    /// `class` is stored and looked up as `struct`. A `c:` or `cpp:` domain
    /// prefix is dropped when the rest names a known directive.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        let bare = name
            .strip_prefix("cpp:")
            .or_else(|| name.strip_prefix("c:"))
            .unwrap_or(name);
        match bare {
            "function" => Directive::Function,
            "struct" | "class" => Directive::Struct,
            "macro" => Directive::Macro,
            "type-alias" | "type" => Directive::TypeAlias,
            "variable" | "var" => Directive::Variable,
            "member" => Directive::Member,
            _ => Directive::Custom(name.to_string()),
        }
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Directive::Function => "function",
            Directive::Struct => "struct",
            Directive::Macro => "macro",
            Directive::TypeAlias => "type-alias",
            Directive::Variable => "variable",
            Directive::Member => "member",
            Directive::Custom(name) => name.as_str(),
        })
    }
}

impl Serialize for Directive {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Directive {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Directive::parse(&name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One run of `///` lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub file: PathBuf,
    /// The line just after the comment's last line.
    pub next_line: u32,
    /// Raw lines, marker included.
    pub text: Vec<String>,
    /// Kind of the declaration the comment was attached to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_kind: Option<CursorKind>,
}

impl Comment {
    pub const PREFIX: &'static str = "///";

    /// Lines without the marker and the single character following it.
    pub fn stripped_text(&self) -> Vec<&str> {
        self.text
            .iter()
            .map(|line| {
                let mut rest = line.strip_prefix(Self::PREFIX).unwrap_or(line).chars();
                rest.next();
                rest.as_str()
            })
            .collect()
    }

    pub fn location(&self) -> Location {
        Location {
            file: self.file.clone(),
            line: self.next_line,
        }
    }
}

/// Where a declaration lives: two declarations with equal contexts and equal
/// signatures are the same documentation slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclarationContext {
    pub directive: Directive,
    /// `::`-joined, empty for global scope.
    pub namespace: String,
    #[serde(default)]
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveComment {
    pub context: DeclarationContext,
    pub signature: String,
    pub comment: Arc<Comment>,
}

/// Everything one scan of one file produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub module: String,
    pub directive_comments: Vec<DirectiveComment>,
    pub floating_comments: Vec<Comment>,
    pub diagnostics: Vec<String>,
    pub mtime: SystemTime,
}
