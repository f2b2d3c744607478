//! The seam between the comment engine and a compiler front end.
//!
//! A front end turns one source file into a [`TranslationUnit`]: the file's
//! full token stream (comments included) where every token points at the
//! AST cursor it belongs to. The engine never looks at source text directly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub trait FrontEnd: Send + Sync {
    fn parse(&self, path: &Path, args: &[String]) -> Result<TranslationUnit>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Comment,
    Identifier,
    Keyword,
    Literal,
    Punctuation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    /// 1-based line.
    pub line: u32,
    /// 1-based column, in bytes.
    pub column: u32,
    /// Byte offset from the start of the file.
    pub offset: usize,
}

/// Half-open source range: `end` is the position just past the last byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorId(pub usize);

impl CursorId {
    pub const ROOT: CursorId = CursorId(0);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub spelling: String,
    pub kind: TokenKind,
    pub extent: Extent,
    pub cursor: CursorId,
}

impl Token {
    /// True when `next` starts exactly where this token ends.
    pub fn is_contiguous_with(&self, next: &Token) -> bool {
        self.extent.end.offset == next.extent.start.offset
    }
}

/// Front-end declaration kinds, named after their libclang counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CursorKind {
    TranslationUnit,
    InvalidFile,
    UnexposedDecl,
    PreprocessingDirective,
    MacroDefinition,
    MacroInstantiation,
    Namespace,
    NamespaceAlias,
    NamespaceRef,
    TemplateRef,
    StructDecl,
    ClassDecl,
    UnionDecl,
    ClassTemplate,
    ClassTemplatePartialSpecialization,
    EnumDecl,
    EnumConstantDecl,
    FieldDecl,
    FunctionDecl,
    FunctionTemplate,
    CxxMethod,
    Constructor,
    Destructor,
    ConversionFunction,
    VarDecl,
    TypedefDecl,
    TypeAliasDecl,
    TypeAliasTemplateDecl,
    ConceptDecl,
    UsingDeclaration,
    UsingDirective,
    FriendDecl,
    CxxAccessSpecDecl,
    StaticAssert,
    ModuleImportDecl,
}

impl CursorKind {
    pub fn is_declaration(self) -> bool {
        !matches!(
            self,
            CursorKind::TranslationUnit
                | CursorKind::InvalidFile
                | CursorKind::PreprocessingDirective
                | CursorKind::MacroDefinition
                | CursorKind::MacroInstantiation
                | CursorKind::NamespaceRef
                | CursorKind::TemplateRef
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CursorKind::TranslationUnit => "TRANSLATION_UNIT",
            CursorKind::InvalidFile => "INVALID_FILE",
            CursorKind::UnexposedDecl => "UNEXPOSED_DECL",
            CursorKind::PreprocessingDirective => "PREPROCESSING_DIRECTIVE",
            CursorKind::MacroDefinition => "MACRO_DEFINITION",
            CursorKind::MacroInstantiation => "MACRO_INSTANTIATION",
            CursorKind::Namespace => "NAMESPACE",
            CursorKind::NamespaceAlias => "NAMESPACE_ALIAS",
            CursorKind::NamespaceRef => "NAMESPACE_REF",
            CursorKind::TemplateRef => "TEMPLATE_REF",
            CursorKind::StructDecl => "STRUCT_DECL",
            CursorKind::ClassDecl => "CLASS_DECL",
            CursorKind::UnionDecl => "UNION_DECL",
            CursorKind::ClassTemplate => "CLASS_TEMPLATE",
            CursorKind::ClassTemplatePartialSpecialization => {
                "CLASS_TEMPLATE_PARTIAL_SPECIALIZATION"
            }
            CursorKind::EnumDecl => "ENUM_DECL",
            CursorKind::EnumConstantDecl => "ENUM_CONSTANT_DECL",
            CursorKind::FieldDecl => "FIELD_DECL",
            CursorKind::FunctionDecl => "FUNCTION_DECL",
            CursorKind::FunctionTemplate => "FUNCTION_TEMPLATE",
            CursorKind::CxxMethod => "CXX_METHOD",
            CursorKind::Constructor => "CONSTRUCTOR",
            CursorKind::Destructor => "DESTRUCTOR",
            CursorKind::ConversionFunction => "CONVERSION_FUNCTION",
            CursorKind::VarDecl => "VAR_DECL",
            CursorKind::TypedefDecl => "TYPEDEF_DECL",
            CursorKind::TypeAliasDecl => "TYPE_ALIAS_DECL",
            CursorKind::TypeAliasTemplateDecl => "TYPE_ALIAS_TEMPLATE_DECL",
            CursorKind::ConceptDecl => "CONCEPT_DECL",
            CursorKind::UsingDeclaration => "USING_DECLARATION",
            CursorKind::UsingDirective => "USING_DIRECTIVE",
            CursorKind::FriendDecl => "FRIEND_DECL",
            CursorKind::CxxAccessSpecDecl => "CXX_ACCESS_SPEC_DECL",
            CursorKind::StaticAssert => "STATIC_ASSERT",
            CursorKind::ModuleImportDecl => "MODULE_IMPORT_DECL",
        }
    }
}

impl std::fmt::Display for CursorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub kind: CursorKind,
    pub spelling: String,
    pub extent: Extent,
    pub semantic_parent: Option<CursorId>,
}

#[derive(Debug, Clone)]
pub struct TranslationUnit {
    path: PathBuf,
    tokens: Vec<Token>,
    cursors: Vec<Cursor>,
    diagnostics: Vec<String>,
    module: Option<String>,
}

impl TranslationUnit {
    /// `cursors[0]` must be the translation-unit root and `tokens` must be
    /// sorted by start offset.
    pub fn new(
        path: PathBuf,
        tokens: Vec<Token>,
        cursors: Vec<Cursor>,
        diagnostics: Vec<String>,
        module: Option<String>,
    ) -> Self {
        debug_assert!(cursors
            .first()
            .is_some_and(|c| c.kind == CursorKind::TranslationUnit));
        Self {
            path,
            tokens,
            cursors,
            diagnostics,
            module,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn cursor(&self, id: CursorId) -> &Cursor {
        &self.cursors[id.0]
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn push_diagnostic(&mut self, diagnostic: String) {
        self.diagnostics.push(diagnostic);
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// The cursor's own tokens: every token whose start lies inside its extent.
    pub fn cursor_tokens(&self, id: CursorId) -> &[Token] {
        let extent = self.cursor(id).extent;
        let start = self
            .tokens
            .partition_point(|t| t.extent.start.offset < extent.start.offset);
        let end = self
            .tokens
            .partition_point(|t| t.extent.start.offset < extent.end.offset)
            .max(start);
        &self.tokens[start..end]
    }

    /// Semantic parents from the innermost outwards, stopping before the root.
    pub fn semantic_parents(&self, id: CursorId) -> impl Iterator<Item = &Cursor> + '_ {
        let mut next = self.cursor(id).semantic_parent;
        std::iter::from_fn(move || {
            let parent = next.filter(|p| *p != CursorId::ROOT)?;
            next = self.cursor(parent).semantic_parent;
            Some(self.cursor(parent))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, offset: usize) -> SourceLocation {
        SourceLocation {
            line,
            column: 1,
            offset,
        }
    }

    fn extent(start: usize, end: usize) -> Extent {
        Extent {
            start: loc(1, start),
            end: loc(1, end),
        }
    }

    fn token(spelling: &str, start: usize, cursor: usize) -> Token {
        Token {
            spelling: spelling.to_string(),
            kind: TokenKind::Identifier,
            extent: extent(start, start + spelling.len()),
            cursor: CursorId(cursor),
        }
    }

    fn cursor(kind: CursorKind, spelling: &str, start: usize, end: usize, parent: usize) -> Cursor {
        Cursor {
            kind,
            spelling: spelling.to_string(),
            extent: extent(start, end),
            semantic_parent: Some(CursorId(parent)),
        }
    }

    fn sample() -> TranslationUnit {
        // namespace a { struct B { int c; }; }
        let root = Cursor {
            kind: CursorKind::TranslationUnit,
            spelling: "t.hxx".to_string(),
            extent: extent(0, 40),
            semantic_parent: None,
        };
        TranslationUnit::new(
            PathBuf::from("t.hxx"),
            vec![
                token("namespace", 0, 1),
                token("a", 10, 1),
                token("struct", 14, 2),
                token("B", 21, 2),
                token("int", 25, 3),
                token("c", 29, 3),
            ],
            vec![
                root,
                cursor(CursorKind::Namespace, "a", 0, 40, 0),
                cursor(CursorKind::StructDecl, "B", 14, 36, 1),
                cursor(CursorKind::FieldDecl, "c", 25, 30, 2),
            ],
            Vec::new(),
            None,
        )
    }

    #[test]
    fn test_cursor_tokens_are_limited_to_extent() {
        let tu = sample();
        let spellings: Vec<_> = tu
            .cursor_tokens(CursorId(3))
            .iter()
            .map(|t| t.spelling.as_str())
            .collect();
        assert_eq!(spellings, vec!["int", "c"]);
    }

    #[test]
    fn test_semantic_parents_stop_at_root() {
        let tu = sample();
        let names: Vec<_> = tu
            .semantic_parents(CursorId(3))
            .map(|c| c.spelling.as_str())
            .collect();
        assert_eq!(names, vec!["B", "a"]);
        assert_eq!(tu.semantic_parents(CursorId(1)).count(), 0);
    }

    #[test]
    fn test_contiguity() {
        let a = token("f", 0, 0);
        let b = token("(", 1, 0);
        let c = token("x", 3, 0);
        assert!(a.is_contiguous_with(&b));
        assert!(!b.is_contiguous_with(&c));
    }

    #[test]
    fn test_is_declaration() {
        assert!(CursorKind::FunctionDecl.is_declaration());
        assert!(CursorKind::Namespace.is_declaration());
        assert!(!CursorKind::MacroDefinition.is_declaration());
        assert!(!CursorKind::NamespaceRef.is_declaration());
        assert_eq!(CursorKind::CxxMethod.to_string(), "CXX_METHOD");
    }
}
