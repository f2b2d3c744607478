//! C-family lexer used by the built-in front end.
//!
//! Comments are real tokens here: the comment engine needs to see them in
//! source order, interleaved with the code they document.

use logos::Logos;
use std::ops::Range;

use super::frontend::{SourceLocation, TokenKind};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"([ \t\r\n\x0B\x0C]|\\\r?\n)+")]
pub(crate) enum RawKind {
    #[regex(r"//[^\r\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[regex(r"\.?[0-9]([0-9A-Za-z_.']|[eEpP][+-])*")]
    Number,

    #[regex(r#"(u8|u|U|L)?"([^"\\\n]|\\.)*""#)]
    String,

    #[regex(r#"(u8|u|U|L)?R""#, raw_string)]
    RawString,

    #[regex(r"(u8|u|U|L)?'([^'\\\n]|\\.)*'")]
    Char,

    #[token("::")]
    #[token("->")]
    #[token("->*")]
    #[token(".*")]
    #[token("...")]
    #[token("++")]
    #[token("--")]
    #[token("<<")]
    #[token(">>")]
    #[token("<=")]
    #[token(">=")]
    #[token("<=>")]
    #[token("==")]
    #[token("!=")]
    #[token("&&")]
    #[token("||")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token("##")]
    #[regex(r"[{}()\[\];:,.?~!+\-*/%^&|=<>#@\\]")]
    Punct,
}

fn block_comment(lex: &mut logos::Lexer<RawKind>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

/// `R"delim( ... )delim"`: the body runs to the first `)delim"`, quotes and
/// newlines included.
fn raw_string(lex: &mut logos::Lexer<RawKind>) -> bool {
    let rest = lex.remainder();
    let Some(open) = rest.find('(') else {
        return false;
    };
    let delimiter = &rest[..open];
    if delimiter.len() > 16
        || delimiter.contains(|c: char| c.is_whitespace() || matches!(c, '\\' | ')' | '"'))
    {
        return false;
    }
    let closing = format!("){delimiter}\"");
    match rest[open + 1..].find(&closing) {
        Some(end) => {
            lex.bump(open + 1 + end + closing.len());
            true
        }
        None => {
            lex.bump(rest.len());
            false
        }
    }
}

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "asm", "auto", "bool", "break", "case", "catch", "char", "char8_t",
    "char16_t", "char32_t", "class", "co_await", "co_return", "co_yield", "concept", "const",
    "consteval", "constexpr", "constinit", "const_cast", "continue", "decltype", "default",
    "delete", "do", "double", "dynamic_cast", "else", "enum", "explicit", "export", "extern",
    "false", "float", "for", "friend", "goto", "if", "import", "inline", "int", "long", "module",
    "mutable", "namespace", "new", "noexcept", "nullptr", "operator", "private", "protected",
    "public", "register", "reinterpret_cast", "requires", "return", "short", "signed", "sizeof",
    "static", "static_assert", "static_cast", "struct", "switch", "template", "this",
    "thread_local", "throw", "true", "try", "typedef", "typeid", "typename", "union", "unsigned",
    "using", "virtual", "void", "volatile", "wchar_t", "while",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawToken {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub offset: usize,
    pub message: String,
}

pub(crate) fn lex(source: &str) -> (Vec<RawToken>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = RawKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let kind = match result {
            Ok(RawKind::LineComment | RawKind::BlockComment) => TokenKind::Comment,
            Ok(RawKind::Identifier) if is_keyword(lexer.slice()) => TokenKind::Keyword,
            Ok(RawKind::Identifier) => TokenKind::Identifier,
            Ok(RawKind::Number | RawKind::String | RawKind::RawString | RawKind::Char) => {
                TokenKind::Literal
            }
            Ok(RawKind::Punct) => TokenKind::Punctuation,
            Err(()) => {
                let message = if lexer.slice().starts_with("/*") {
                    "unterminated /* comment".to_string()
                } else if lexer.slice().contains("R\"") {
                    "malformed raw string literal".to_string()
                } else {
                    format!("unexpected character {:?}", lexer.slice())
                };
                errors.push(LexError {
                    offset: span.start,
                    message,
                });
                continue;
            }
        };
        tokens.push(RawToken { kind, span });
    }

    (tokens, errors)
}

/// Byte offsets of line starts, for offset -> line/column conversion.
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    pub fn location(&self, offset: usize) -> SourceLocation {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        SourceLocation {
            line: (line + 1) as u32,
            column: (offset - self.line_starts[line] + 1) as u32,
            offset,
        }
    }
}
