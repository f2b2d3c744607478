//! Finding the declaration a comment documents, and naming it.

use tracing::error;

use super::comment::is_documentation;
use super::frontend::{CursorId, CursorKind, Token, TokenKind, TranslationUnit};
use super::tokens::Tokens;
use crate::types::Directive;

/// Keywords the directive syntax leaves out of a signature.
const ELIDED_KEYWORDS: &[&str] = &["class", "struct", "export", "union", "using", "typedef"];

/// What kind of documentation a declaration gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclCategory {
    Macro,
    Member,
    TypeAlias,
    Struct,
    Function,
    Variable,
    Unsupported,
}

impl DeclCategory {
    pub fn of(kind: CursorKind) -> Self {
        match kind {
            CursorKind::MacroDefinition => DeclCategory::Macro,
            CursorKind::FieldDecl => DeclCategory::Member,
            CursorKind::TypedefDecl
            | CursorKind::TypeAliasDecl
            | CursorKind::TypeAliasTemplateDecl => DeclCategory::TypeAlias,
            CursorKind::StructDecl
            | CursorKind::ClassDecl
            | CursorKind::UnionDecl
            | CursorKind::ClassTemplate
            | CursorKind::ClassTemplatePartialSpecialization => DeclCategory::Struct,
            CursorKind::FunctionDecl
            | CursorKind::FunctionTemplate
            | CursorKind::CxxMethod
            | CursorKind::Constructor
            | CursorKind::Destructor
            | CursorKind::ConversionFunction => DeclCategory::Function,
            CursorKind::VarDecl => DeclCategory::Variable,
            CursorKind::TranslationUnit
            | CursorKind::InvalidFile
            | CursorKind::UnexposedDecl
            | CursorKind::PreprocessingDirective
            | CursorKind::MacroInstantiation
            | CursorKind::Namespace
            | CursorKind::NamespaceAlias
            | CursorKind::NamespaceRef
            | CursorKind::TemplateRef
            | CursorKind::EnumDecl
            | CursorKind::EnumConstantDecl
            | CursorKind::ConceptDecl
            | CursorKind::UsingDeclaration
            | CursorKind::UsingDirective
            | CursorKind::FriendDecl
            | CursorKind::CxxAccessSpecDecl
            | CursorKind::StaticAssert
            | CursorKind::ModuleImportDecl => DeclCategory::Unsupported,
        }
    }

    pub fn directive(self) -> Option<Directive> {
        match self {
            DeclCategory::Macro => Some(Directive::Macro),
            DeclCategory::Member => Some(Directive::Member),
            DeclCategory::TypeAlias => Some(Directive::TypeAlias),
            DeclCategory::Struct => Some(Directive::Struct),
            DeclCategory::Function => Some(Directive::Function),
            DeclCategory::Variable => Some(Directive::Variable),
            DeclCategory::Unsupported => None,
        }
    }
}

pub fn is_documentable(kind: CursorKind) -> bool {
    kind == CursorKind::MacroDefinition
        || (kind.is_declaration()
            && !matches!(
                kind,
                CursorKind::Namespace
                    | CursorKind::InvalidFile
                    | CursorKind::NamespaceRef
                    | CursorKind::TemplateRef
                    | CursorKind::PreprocessingDirective
                    | CursorKind::MacroInstantiation
                    | CursorKind::UnexposedDecl
            ))
}

/// A classified declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub category: DeclCategory,
    pub signature: String,
    pub namespace: String,
    pub cursor_kind: CursorKind,
}

/// Join spellings with one space between tokens that were not touching in
/// the source and none between tokens that were.
pub fn join_tokens<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> String {
    let mut joined = String::new();
    let mut previous: Option<&Token> = None;
    for token in tokens {
        if previous.is_some_and(|p| !p.is_contiguous_with(token)) {
            joined.push(' ');
        }
        joined.push_str(&token.spelling);
        previous = Some(token);
    }
    joined
}

/// The tokens making up a declaration's signature: everything up to the
/// first `{` or `;` outside parentheses, minus comments and elided keywords.
pub fn signature_tokens(tokens: &[Token]) -> Vec<&Token> {
    let mut kept = Vec::new();
    let mut parens = 0usize;
    let mut template_angles = 0usize;
    let mut previous: Option<&str> = None;

    for token in tokens {
        if token.kind == TokenKind::Comment {
            continue;
        }
        let spelling = token.spelling.as_str();
        match spelling {
            "{" | ";" if parens == 0 => break,
            "(" | "[" => parens += 1,
            ")" | "]" => parens = parens.saturating_sub(1),
            "<" if template_angles > 0 || previous == Some("template") => template_angles += 1,
            ">" if template_angles > 0 => template_angles -= 1,
            ">>" if template_angles > 0 => template_angles = template_angles.saturating_sub(2),
            _ => {}
        }
        previous = Some(spelling);
        if parens == 0 && template_angles == 0 && ELIDED_KEYWORDS.contains(&spelling) {
            continue;
        }
        kept.push(token);
    }
    kept
}

/// `NAME` or `NAME(params)` for a macro definition's tokens.
fn macro_signature_tokens(tokens: &[Token]) -> Vec<&Token> {
    let Some((name, rest)) = tokens.split_first() else {
        return Vec::new();
    };
    let mut kept = vec![name];
    if rest
        .first()
        .is_some_and(|open| open.spelling == "(" && name.is_contiguous_with(open))
    {
        for token in rest {
            kept.push(token);
            if token.spelling == ")" {
                break;
            }
        }
    }
    kept
}

/// `::`-joined enclosing scopes. Anonymous scopes contribute nothing.
pub fn namespace_path(tu: &TranslationUnit, id: CursorId) -> String {
    let mut scopes: Vec<&str> = tu
        .semantic_parents(id)
        .map(|c| c.spelling.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    scopes.reverse();
    scopes.join("::")
}

/// Find the first documentable declaration at or after the cursor position,
/// render its signature and advance `tokens` to the line after it.
///
/// Returns `None` at end of input or when another documentation comment is
/// reached first; that comment is left in the stream.
pub fn classify<'a>(tokens: &mut Tokens<'a>, tu: &'a TranslationUnit) -> Option<Declaration> {
    let min_offset = tokens.peek()?.extent.start.offset;

    let (id, first) = loop {
        let t = tokens.next()?;
        if is_documentation(t) {
            tokens.unget(t);
            return None;
        }
        let cursor = tu.cursor(t.cursor);
        if cursor.extent.start.offset < min_offset {
            // Tokens attributed to an enclosing declaration, e.g. a return
            // type naming the surrounding class.
            continue;
        }
        if is_documentable(cursor.kind) {
            break (t.cursor, t);
        }
    };

    let cursor = tu.cursor(id);
    let category = DeclCategory::of(cursor.kind);
    if category == DeclCategory::Unsupported {
        error!(
            "{}:{}: no directive for {} declarations",
            tu.path().display(),
            first.extent.start.line,
            cursor.kind
        );
    }

    let own_tokens = tu.cursor_tokens(id);
    let kept = if cursor.kind == CursorKind::MacroDefinition {
        macro_signature_tokens(own_tokens)
    } else {
        signature_tokens(own_tokens)
    };
    let signature = if kept.is_empty() {
        cursor.spelling.clone()
    } else {
        join_tokens(kept.iter().copied())
    };

    let last_line = kept.last().copied().unwrap_or(first).extent.end.line;
    while let Some(t) = tokens.next() {
        if t.extent.end.line > last_line {
            tokens.unget(t);
            break;
        }
    }

    Some(Declaration {
        category,
        signature,
        namespace: namespace_path(tu, id),
        cursor_kind: cursor.kind,
    })
}
