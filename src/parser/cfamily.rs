//! Built-in front end for C and C++ headers.
//!
//! This is not a compiler. It recovers just enough structure for the comment
//! engine: which declaration every token belongs to, what kind that
//! declaration is, and which scope encloses it. Bodies, initializers and
//! template arguments are skipped as balanced groups.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::frontend::{
    Cursor, CursorId, CursorKind, Extent, FrontEnd, SourceLocation, Token, TokenKind,
    TranslationUnit,
};
use super::lexer::{lex, LineIndex, RawToken};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct CFamilyFrontEnd;

impl FrontEnd for CFamilyFrontEnd {
    fn parse(&self, path: &Path, args: &[String]) -> Result<TranslationUnit> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let (source, invalid) = decode(path, &bytes);
        let mut tu = parse_source(path, &source, args);
        if let Some(diagnostic) = invalid {
            tu.push_diagnostic(diagnostic);
        }
        Ok(tu)
    }
}

/// Decode `bytes` as UTF-8, replacing invalid sequences with U+FFFD. The
/// second value is a diagnostic pointing at the first invalid byte.
fn decode<'a>(path: &Path, bytes: &'a [u8]) -> (Cow<'a, str>, Option<String>) {
    let Err(e) = std::str::from_utf8(bytes) else {
        return (String::from_utf8_lossy(bytes), None);
    };
    let valid = &bytes[..e.valid_up_to()];
    let line = valid.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = valid.iter().rev().take_while(|&&b| b != b'\n').count() + 1;
    let diagnostic = format!(
        "{}:{line}:{column}: warning: invalid UTF-8, decoded with replacement characters",
        path.display()
    );
    (String::from_utf8_lossy(bytes), Some(diagnostic))
}

/// Parse in-memory source as if it were the file at `path`.
///
/// `args` understands `-DNAME`, `-DNAME(x)=...` and `-D NAME`: those names are
/// treated as macros when they start a statement.
pub fn parse_source(path: &Path, source: &str, args: &[String]) -> TranslationUnit {
    let (raw, lex_errors) = lex(source);
    let mut builder = Builder::new(path, source, raw);
    for error in lex_errors {
        let loc = builder.lines.location(error.offset);
        builder.diagnostics.push(format!(
            "{}:{}:{}: error: {}",
            path.display(),
            loc.line,
            loc.column,
            error.message
        ));
    }
    builder.define_from_args(args);

    let file_scope = Scope {
        owner: CursorId::ROOT,
        parent: CursorId::ROOT,
        record: None,
        path: Vec::new(),
    };
    builder.block(0, &file_scope, false);
    builder.finish()
}

/// Names that take a parenthesized argument but never name a function.
const PAREN_SPECIFIERS: &[&str] = &[
    "__attribute__",
    "__declspec",
    "alignas",
    "_Alignas",
    "decltype",
    "noexcept",
    "throw",
    "requires",
    "__asm__",
    "asm",
];

#[derive(Debug, Clone)]
struct Scope {
    /// Owner of stray tokens (comments, braces) directly inside the scope.
    owner: CursorId,
    /// Semantic parent for declarations inside the scope.
    parent: CursorId,
    /// Set when the scope is a class body; used to spot constructors.
    record: Option<String>,
    path: Vec<String>,
}

struct Draft {
    kind: CursorKind,
    spelling: String,
    first: usize,
    last: usize,
    parent: Option<CursorId>,
}

/// What a scan over a plain declaration found.
#[derive(Debug, Default)]
struct Shape {
    /// Index of the last token belonging to the declaration.
    end: usize,
    name: Option<usize>,
    operator: Option<String>,
    function: bool,
    destructor: bool,
    conversion: bool,
    is_static: bool,
}

struct Builder<'s> {
    path: &'s Path,
    source: &'s str,
    lines: LineIndex,
    raw: Vec<RawToken>,
    owners: Vec<Option<CursorId>>,
    drafts: Vec<Draft>,
    diagnostics: Vec<String>,
    /// Known macro names, mapped to whether they take arguments.
    macros: HashMap<String, bool>,
    scopes: HashMap<String, CursorId>,
    module: Option<String>,
}

impl<'s> Builder<'s> {
    fn new(path: &'s Path, source: &'s str, raw: Vec<RawToken>) -> Self {
        let owners = vec![None; raw.len()];
        let root = Draft {
            kind: CursorKind::TranslationUnit,
            spelling: path.display().to_string(),
            first: 0,
            last: raw.len().saturating_sub(1),
            parent: None,
        };
        Self {
            path,
            source,
            lines: LineIndex::new(source),
            raw,
            owners,
            drafts: vec![root],
            diagnostics: Vec::new(),
            macros: HashMap::new(),
            scopes: HashMap::new(),
            module: None,
        }
    }

    fn define_from_args(&mut self, args: &[String]) {
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            let definition = match arg.strip_prefix("-D") {
                Some("") => match args.next() {
                    Some(next) => next.as_str(),
                    None => break,
                },
                Some(rest) => rest,
                None => continue,
            };
            let head = definition.split('=').next().unwrap_or_default();
            let (name, function_like) = match head.split_once('(') {
                Some((name, _)) => (name, true),
                None => (head, false),
            };
            if !name.is_empty() {
                self.macros.insert(name.to_string(), function_like);
            }
        }
    }

    // ── token helpers ────────────────────────────────────────────────────

    fn len(&self) -> usize {
        self.raw.len()
    }

    fn text(&self, i: usize) -> &'s str {
        self.raw
            .get(i)
            .map_or("", |t| &self.source[t.span.clone()])
    }

    fn kind(&self, i: usize) -> Option<TokenKind> {
        self.raw.get(i).map(|t| t.kind)
    }

    fn is(&self, i: usize, spelling: &str) -> bool {
        i < self.len() && self.text(i) == spelling
    }

    fn is_identifier(&self, i: usize) -> bool {
        self.kind(i) == Some(TokenKind::Identifier)
    }

    fn is_comment(&self, i: usize) -> bool {
        self.kind(i) == Some(TokenKind::Comment)
    }

    fn start_line(&self, i: usize) -> u32 {
        self.lines.location(self.raw[i].span.start).line
    }

    fn end_line(&self, i: usize) -> u32 {
        self.lines.location(self.raw[i].span.end).line
    }

    /// Previous non-comment token index, if any.
    fn previous(&self, i: usize) -> Option<usize> {
        (0..i).rev().find(|&k| !self.is_comment(k))
    }

    fn diagnostic(&mut self, i: usize, message: &str) {
        let offset = self
            .raw
            .get(i)
            .map_or(self.source.len(), |t| t.span.start);
        let loc = self.lines.location(offset);
        self.diagnostics.push(format!(
            "{}:{}:{}: error: {message}",
            self.path.display(),
            loc.line,
            loc.column
        ));
    }

    // ── cursor helpers ───────────────────────────────────────────────────

    fn cursor(
        &mut self,
        kind: CursorKind,
        spelling: impl Into<String>,
        first: usize,
        last: usize,
        parent: CursorId,
    ) -> CursorId {
        self.drafts.push(Draft {
            kind,
            spelling: spelling.into(),
            first,
            last: last.max(first),
            parent: Some(parent),
        });
        CursorId(self.drafts.len() - 1)
    }

    /// Give every still-unowned token in `first..=last` to `id`.
    fn claim(&mut self, first: usize, last: usize, id: CursorId) {
        let end = (last + 1).min(self.len());
        for owner in self.owners[first.min(end)..end].iter_mut() {
            owner.get_or_insert(id);
        }
    }

    fn register_scope(&mut self, path: &[String], name: &str, id: CursorId) {
        let key = qualify(path, name);
        self.scopes.entry(key).or_insert(id);
    }

    /// Resolve `qualifier` the way name lookup would from inside `path`.
    fn resolve(&self, path: &[String], qualifier: &[String]) -> Option<CursorId> {
        if qualifier.is_empty() {
            return None;
        }
        let tail = qualifier.join("::");
        (0..=path.len())
            .rev()
            .find_map(|k| self.scopes.get(&qualify(&path[..k], &tail)).copied())
    }

    // ── balanced groups ──────────────────────────────────────────────────

    /// Index of the token closing the group opened at `open`.
    fn matching(&mut self, open: usize) -> usize {
        let (opening, closing) = match self.text(open) {
            "(" => ("(", ")"),
            "[" => ("[", "]"),
            _ => ("{", "}"),
        };
        let mut depth = 0usize;
        for k in open..self.len() {
            let text = self.text(k);
            if text == opening {
                depth += 1;
            } else if text == closing {
                depth -= 1;
                if depth == 0 {
                    return k;
                }
            }
        }
        self.diagnostic(open, &format!("unbalanced '{opening}'"));
        self.len() - 1
    }

    /// Index of the `>` closing a template argument list opened at `open`.
    fn matching_angle(&self, open: usize) -> usize {
        let mut depth = 0i32;
        let mut parens = 0i32;
        for k in open..self.len() {
            match self.text(k) {
                "(" | "[" | "{" => parens += 1,
                ")" | "]" | "}" => parens -= 1,
                "<" if parens == 0 => depth += 1,
                ">" if parens == 0 => depth -= 1,
                ">>" if parens == 0 => depth -= 2,
                ";" if parens == 0 => return k.saturating_sub(1),
                _ => {}
            }
            if depth <= 0 && k > open {
                return k;
            }
        }
        self.len() - 1
    }

    /// Index of the `;` ending a statement, skipping balanced groups. Stops
    /// before a `}` that closes the enclosing scope.
    fn statement_end(&mut self, mut j: usize) -> usize {
        while j < self.len() {
            match self.text(j) {
                ";" => return j,
                "(" | "[" | "{" => j = self.matching(j) + 1,
                "}" => {
                    self.diagnostic(j, "expected ';'");
                    return j.saturating_sub(1);
                }
                _ => j += 1,
            }
        }
        self.diagnostic(j, "expected ';'");
        self.len() - 1
    }

    // ── scopes ───────────────────────────────────────────────────────────

    /// Parse declarations until the closing brace (when `braced`) or the end
    /// of input. Returns the index after the last consumed token.
    fn block(&mut self, mut i: usize, scope: &Scope, braced: bool) -> usize {
        while i < self.len() {
            if self.is_comment(i) {
                self.claim(i, i, scope.owner);
                i += 1;
                continue;
            }
            match self.text(i) {
                "#" if self.at_line_start(i) => i = self.preprocessor(i),
                "}" if braced => {
                    self.claim(i, i, scope.owner);
                    return i + 1;
                }
                "}" => {
                    self.diagnostic(i, "extraneous closing brace ('}')");
                    i += 1;
                }
                ";" => {
                    self.claim(i, i, scope.owner);
                    i += 1;
                }
                _ => i = self.declaration(i, i, scope, false),
            }
        }
        if braced {
            self.diagnostic(i, "expected '}'");
        }
        i
    }

    fn at_line_start(&self, i: usize) -> bool {
        self.previous(i)
            .map_or(true, |p| self.end_line(p) < self.start_line(i))
    }

    /// True when the tokens at `a` and `a + 1` are on one logical line.
    fn same_logical_line(&self, a: usize) -> bool {
        let gap = &self.source[self.raw[a].span.end..self.raw[a + 1].span.start];
        let mut segments = gap.split('\n').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() && !segment.trim_end_matches('\r').ends_with('\\') {
                return false;
            }
        }
        true
    }

    fn preprocessor(&mut self, hash: usize) -> usize {
        let mut last = hash;
        while last + 1 < self.len() && self.same_logical_line(last) {
            last += 1;
        }
        let code_last = (hash..=last)
            .rev()
            .find(|&k| !self.is_comment(k))
            .unwrap_or(hash);

        let name = hash + 1;
        let directive = self.cursor(
            CursorKind::PreprocessingDirective,
            self.text(name),
            hash,
            code_last,
            CursorId::ROOT,
        );

        match self.text(name) {
            "define" if name < code_last => {
                let macro_name = name + 1;
                let spelling = self.text(macro_name);
                let function_like = self.is(macro_name + 1, "(")
                    && self.raw[macro_name].span.end == self.raw[macro_name + 1].span.start;
                self.macros.insert(spelling.to_string(), function_like);
                let id = self.cursor(
                    CursorKind::MacroDefinition,
                    spelling,
                    macro_name,
                    code_last,
                    CursorId::ROOT,
                );
                self.claim(hash, name, directive);
                self.claim(macro_name, code_last, id);
            }
            "undef" => {
                self.macros.remove(self.text(name + 1));
                self.claim(hash, code_last, directive);
            }
            _ => self.claim(hash, code_last, directive),
        }
        last + 1
    }

    // ── declarations ─────────────────────────────────────────────────────

    /// Parse one declaration whose first token is `start`; `i` is where
    /// dispatch looks, past any prefix already consumed (`template<...>`,
    /// `export`, macro expansions).
    fn declaration(&mut self, start: usize, i: usize, scope: &Scope, templated: bool) -> usize {
        if i >= self.len() {
            return i;
        }
        if self.is(i, "}") && i > start {
            // A prefix (macro, `template<>`) with nothing after it.
            let id = self.cursor(CursorKind::UnexposedDecl, "", start, i - 1, scope.parent);
            self.claim(start, i - 1, id);
            return i;
        }
        let text = self.text(i);

        if self.is_identifier(i) && self.macros.contains_key(text) {
            return self.macro_expansion(start, i, scope, templated);
        }

        match text {
            "namespace" => self.namespace(start, i, scope),
            "inline" if self.is(i + 1, "namespace") => self.namespace(start, i + 1, scope),
            "extern" if self.kind(i + 1) == Some(TokenKind::Literal) && self.is(i + 2, "{") => {
                self.transparent(start, i + 2, scope)
            }
            "export" if self.is(i + 1, "{") => self.transparent(start, i + 1, scope),
            "export" => self.declaration(start, i + 1, scope, templated),
            "module" | "import" if start == i || self.text(start) == "export" => {
                self.module_declaration(start, i, scope)
            }
            "template" if self.is(i + 1, "<") => {
                let mut j = i;
                while self.is(j, "template") && self.is(j + 1, "<") {
                    j = self.matching_angle(j + 1) + 1;
                }
                self.declaration(start, j, scope, true)
            }
            "public" | "private" | "protected" if self.is(i + 1, ":") => {
                let id = self.cursor(
                    CursorKind::CxxAccessSpecDecl,
                    "",
                    start,
                    i + 1,
                    scope.parent,
                );
                self.claim(start, i + 1, id);
                i + 2
            }
            "struct" | "class" | "union" => self.record(start, i, scope, templated, true),
            "enum" => self.enumeration(start, i, scope, true),
            "using" => self.using(start, i, scope, templated),
            "typedef" => self.typedef(start, i, scope),
            "friend" => self.simple(start, i, scope, CursorKind::FriendDecl),
            "concept" => self.simple(start, i, scope, CursorKind::ConceptDecl),
            "static_assert" => self.simple(start, i, scope, CursorKind::StaticAssert),
            _ => self.plain(start, i, scope, templated),
        }
    }

    fn macro_expansion(&mut self, start: usize, i: usize, scope: &Scope, templated: bool) -> usize {
        let function_like = self.macros.get(self.text(i)).copied().unwrap_or(false);
        let end = if function_like && self.is(i + 1, "(") {
            self.matching(i + 1)
        } else {
            i
        };
        let id = self.cursor(
            CursorKind::MacroInstantiation,
            self.text(i),
            i,
            end,
            CursorId::ROOT,
        );
        self.claim(i, end, id);

        let next = end + 1;
        if self.is(next, ";") {
            self.claim(next, next, id);
            return next + 1;
        }
        if next >= self.len()
            || self.is(next, "}")
            || self.start_line(next) > self.end_line(end)
        {
            return next;
        }
        self.declaration(start, next, scope, templated)
    }

    fn transparent(&mut self, start: usize, brace: usize, scope: &Scope) -> usize {
        let id = self.cursor(CursorKind::UnexposedDecl, "", start, brace, scope.parent);
        self.claim(start, brace, id);
        let inner = Scope {
            owner: id,
            ..scope.clone()
        };
        let after = self.block(brace + 1, &inner, true);
        self.drafts[id.0].last = after.saturating_sub(1).max(start);
        after
    }

    fn namespace(&mut self, start: usize, keyword: usize, scope: &Scope) -> usize {
        let mut j = keyword + 1;
        let mut names = Vec::new();
        loop {
            if self.is(j, "inline") {
                j += 1;
            }
            if !self.is_identifier(j) {
                break;
            }
            names.push(self.text(j).to_string());
            j += 1;
            if !self.is(j, "::") {
                break;
            }
            j += 1;
        }
        while self.is(j, "[") {
            j = self.matching(j) + 1;
        }

        if self.is(j, "=") {
            let end = self.statement_end(j);
            let spelling = names.first().cloned().unwrap_or_default();
            let id = self.cursor(CursorKind::NamespaceAlias, spelling, start, end, scope.parent);
            self.claim(start, end, id);
            return end + 1;
        }
        if !self.is(j, "{") {
            self.diagnostic(j, "expected '{' after namespace name");
            return self.plain(start, j, scope, false);
        }

        if names.is_empty() {
            names.push(String::new());
        }
        let mut parent = scope.parent;
        let mut path = scope.path.clone();
        let mut created = Vec::new();
        for name in &names {
            let id = self.cursor(CursorKind::Namespace, name.as_str(), start, j, parent);
            if !name.is_empty() {
                self.register_scope(&path, name, id);
                path.push(name.clone());
            }
            created.push(id);
            parent = id;
        }
        self.claim(start, j, parent);

        let inner = Scope {
            owner: parent,
            parent,
            record: None,
            path,
        };
        let after = self.block(j + 1, &inner, true);
        let last = after.saturating_sub(1).max(start);
        for id in created {
            self.drafts[id.0].last = last;
        }
        after
    }

    fn module_declaration(&mut self, start: usize, keyword: usize, scope: &Scope) -> usize {
        let end = self.statement_end(keyword + 1);
        let name: String = (keyword + 1..end).map(|k| self.text(k)).collect();
        let kind = if name.is_empty() || name.starts_with(':') {
            CursorKind::UnexposedDecl
        } else {
            CursorKind::ModuleImportDecl
        };
        if kind == CursorKind::ModuleImportDecl && self.text(keyword) == "module" {
            self.module.get_or_insert_with(|| name.clone());
        }
        let id = self.cursor(kind, name, start, end, scope.parent);
        self.claim(start, end, id);
        end + 1
    }

    /// Skip attributes and specifiers that can sit between a class-key and
    /// the class name.
    fn skip_attributes(&mut self, mut j: usize) -> usize {
        loop {
            if self.is(j, "[") && self.is(j + 1, "[") {
                j = self.matching(j) + 1;
            } else if PAREN_SPECIFIERS.contains(&self.text(j)) && self.is(j + 1, "(") {
                j = self.matching(j + 1) + 1;
            } else if self.is_identifier(j)
                && self.macros.get(self.text(j)) == Some(&false)
                && self.is_identifier(j + 1)
            {
                j += 1;
            } else {
                return j;
            }
        }
    }

    fn record(
        &mut self,
        start: usize,
        key: usize,
        scope: &Scope,
        templated: bool,
        declarators: bool,
    ) -> usize {
        let mut j = self.skip_attributes(key + 1);
        let mut qualifier = Vec::new();
        let mut name = String::new();
        let mut specialized = false;
        while self.is_identifier(j) {
            name = self.text(j).to_string();
            j += 1;
            if self.is(j, "<") {
                j = self.matching_angle(j) + 1;
                specialized = true;
            }
            if !self.is(j, "::") {
                break;
            }
            qualifier.push(std::mem::take(&mut name));
            j += 1;
        }
        if self.is(j, "final") {
            j += 1;
        }

        let kind = match (templated, specialized, self.text(key)) {
            (true, true, _) => CursorKind::ClassTemplatePartialSpecialization,
            (true, false, _) => CursorKind::ClassTemplate,
            (false, _, "class") => CursorKind::ClassDecl,
            (false, _, "union") => CursorKind::UnionDecl,
            (false, _, _) => CursorKind::StructDecl,
        };
        let parent = self
            .resolve(&scope.path, &qualifier)
            .unwrap_or(scope.parent);

        let brace = match self.text(j) {
            "{" => j,
            ":" => {
                let mut k = j + 1;
                while k < self.len() && !self.is(k, "{") && !self.is(k, ";") {
                    k = match self.text(k) {
                        "<" => self.matching_angle(k) + 1,
                        "(" => self.matching(k) + 1,
                        _ => k + 1,
                    };
                }
                if !self.is(k, "{") {
                    self.diagnostic(k, "expected class body after base list");
                    let end = k.min(self.len() - 1);
                    let id = self.cursor(kind, name, start, end, parent);
                    self.claim(start, end, id);
                    return end + 1;
                }
                k
            }
            ";" if declarators => {
                let id = self.cursor(kind, name, start, j, parent);
                self.claim(start, j, id);
                return j + 1;
            }
            _ if declarators => return self.plain(start, key, scope, templated),
            _ => return j,
        };

        let id = self.cursor(kind, name.as_str(), start, brace, parent);
        self.claim(start, brace, id);
        let mut path = if qualifier.is_empty() {
            scope.path.clone()
        } else {
            [scope.path.clone(), qualifier].concat()
        };
        if !name.is_empty() {
            self.register_scope(&path, &name, id);
            path.push(name.clone());
        }
        let inner = Scope {
            owner: id,
            parent: id,
            record: Some(name),
            path,
        };
        let after = self.block(brace + 1, &inner, true);
        let last = if declarators {
            self.trailing_declarators(after)
        } else {
            after.saturating_sub(1)
        };
        self.claim(after.min(last), last, id);
        self.drafts[id.0].last = last.max(start);
        last + 1
    }

    /// `} x, *y;` after a class or enum body. Returns the index of the `;`
    /// (or of the closing brace when nothing follows).
    fn trailing_declarators(&mut self, after: usize) -> usize {
        if self.is(after, ";") {
            return after;
        }
        let starts_declarator = self.is_identifier(after)
            || matches!(self.text(after), "*" | "&" | "&&" | "[");
        if starts_declarator {
            self.statement_end(after)
        } else {
            after.saturating_sub(1)
        }
    }

    fn enumeration(&mut self, start: usize, key: usize, scope: &Scope, declarators: bool) -> usize {
        let mut j = key + 1;
        if self.is(j, "class") || self.is(j, "struct") {
            j += 1;
        }
        j = self.skip_attributes(j);
        let mut name = String::new();
        if self.is_identifier(j) {
            name = self.text(j).to_string();
            j += 1;
        }
        if self.is(j, ":") {
            while j < self.len() && !self.is(j, "{") && !self.is(j, ";") {
                j += 1;
            }
        }

        match self.text(j) {
            "{" => {}
            ";" if declarators => {
                let id = self.cursor(CursorKind::EnumDecl, name, start, j, scope.parent);
                self.claim(start, j, id);
                return j + 1;
            }
            _ if declarators => return self.plain(start, key, scope, false),
            _ => return j,
        }

        let id = self.cursor(CursorKind::EnumDecl, name, start, j, scope.parent);
        self.claim(start, j, id);
        let mut k = j + 1;
        while k < self.len() && !self.is(k, "}") {
            if self.is(k, "#") && self.at_line_start(k) {
                k = self.preprocessor(k);
            } else if self.is_identifier(k) {
                let mut end = k;
                while end + 1 < self.len() && !matches!(self.text(end + 1), "," | "}") {
                    end = match self.text(end + 1) {
                        "(" | "[" | "{" => self.matching(end + 1),
                        _ => end + 1,
                    };
                }
                let last = (k..=end).rev().find(|&m| !self.is_comment(m)).unwrap_or(k);
                let constant =
                    self.cursor(CursorKind::EnumConstantDecl, self.text(k), k, last, id);
                self.claim(k, last, constant);
                k = end + 1;
            } else {
                self.claim(k, k, id);
                k += 1;
            }
        }
        if k >= self.len() {
            self.diagnostic(k, "expected '}'");
        }
        let after = k + 1;
        let last = if declarators {
            self.trailing_declarators(after)
        } else {
            k.min(self.len().saturating_sub(1))
        };
        self.claim(k.min(last), last, id);
        self.drafts[id.0].last = last.max(start);
        last + 1
    }

    fn using(&mut self, start: usize, keyword: usize, scope: &Scope, templated: bool) -> usize {
        let end = self.statement_end(keyword + 1);
        let after_name = self.skip_attributes(keyword + 2);
        let (kind, spelling) = if self.is(keyword + 1, "namespace") {
            (CursorKind::UsingDirective, self.text(end.saturating_sub(1)))
        } else if self.is_identifier(keyword + 1) && self.is(after_name, "=") {
            let kind = if templated {
                CursorKind::TypeAliasTemplateDecl
            } else {
                CursorKind::TypeAliasDecl
            };
            (kind, self.text(keyword + 1))
        } else {
            (CursorKind::UsingDeclaration, self.text(end.saturating_sub(1)))
        };
        let id = self.cursor(kind, spelling, start, end, scope.parent);
        self.claim(start, end, id);
        end + 1
    }

    fn typedef(&mut self, start: usize, keyword: usize, scope: &Scope) -> usize {
        let mut j = keyword + 1;
        if matches!(self.text(j), "struct" | "class" | "union") {
            j = self.record(j, j, scope, false, false);
        } else if self.is(j, "enum") {
            j = self.enumeration(j, j, scope, false);
        }
        let end = self.statement_end(j);
        let name = self
            .declarator_name(j, end)
            .map(|k| self.text(k))
            .unwrap_or_default();
        let id = self.cursor(CursorKind::TypedefDecl, name, start, end, scope.parent);
        self.claim(start, end, id);
        end + 1
    }

    /// Declarations whose kind is decided by their leading keyword alone.
    fn simple(&mut self, start: usize, keyword: usize, scope: &Scope, kind: CursorKind) -> usize {
        let shape = self.shape(keyword + 1);
        let spelling = shape.name.map(|k| self.text(k)).unwrap_or_default();
        let id = self.cursor(kind, spelling, start, shape.end, scope.parent);
        self.claim(start, shape.end, id);
        shape.end + 1
    }

    /// Functions, methods, variables and fields.
    fn plain(&mut self, start: usize, i: usize, scope: &Scope, templated: bool) -> usize {
        let shape = self.shape(i);
        let Some(name_index) = shape.name else {
            let id = self.cursor(CursorKind::UnexposedDecl, "", start, shape.end, scope.parent);
            self.claim(start, shape.end, id);
            return shape.end + 1;
        };

        let qualifier = self.qualifier_before(name_index);
        let resolved = self.resolve(&scope.path, &qualifier);
        let parent = resolved.unwrap_or(scope.parent);
        let record = match resolved {
            Some(id) if is_record(self.drafts[id.0].kind) => Some(self.drafts[id.0].spelling.clone()),
            Some(_) => None,
            None => scope.record.clone(),
        };

        let mut spelling = self.text(name_index).to_string();
        let kind = if shape.function {
            if let Some(operator) = &shape.operator {
                spelling = operator.clone();
            }
            match &record {
                _ if shape.destructor => {
                    spelling = format!("~{spelling}");
                    CursorKind::Destructor
                }
                Some(_) if shape.conversion => CursorKind::ConversionFunction,
                Some(name) if *name == spelling => CursorKind::Constructor,
                _ if templated => CursorKind::FunctionTemplate,
                Some(_) => CursorKind::CxxMethod,
                None => CursorKind::FunctionDecl,
            }
        } else if record.is_some() && resolved.is_none() && !shape.is_static {
            CursorKind::FieldDecl
        } else {
            CursorKind::VarDecl
        };

        let id = self.cursor(kind, spelling, start, shape.end, parent);
        self.claim(start, shape.end, id);
        shape.end + 1
    }

    fn qualifier_before(&self, name: usize) -> Vec<String> {
        let mut parts = Vec::new();
        let mut k = name;
        if k > 0 && self.is(k - 1, "~") {
            k -= 1;
        }
        while k >= 2 && self.is(k - 1, "::") {
            let mut p = k - 2;
            if self.is(p, ">") {
                let mut depth = 0i32;
                loop {
                    match self.text(p) {
                        ">" => depth += 1,
                        ">>" => depth += 2,
                        "<" => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 || p == 0 {
                        break;
                    }
                    p -= 1;
                }
                if p == 0 {
                    break;
                }
                p -= 1;
            }
            if !self.is_identifier(p) {
                break;
            }
            parts.push(self.text(p).to_string());
            k = p;
        }
        parts.reverse();
        parts
    }

    /// Last identifier at nesting depth zero before any initializer, falling
    /// back to the first identifier inside parentheses (`void (*fp)(int)`).
    fn declarator_name(&self, first: usize, end: usize) -> Option<usize> {
        let mut depth = 0i32;
        let mut found = None;
        let mut nested = None;
        for k in first..end {
            match self.text(k) {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth -= 1,
                "=" | "," if depth == 0 => break,
                _ if self.is_identifier(k) && depth == 0 => found = Some(k),
                _ if self.is_identifier(k) => {
                    nested.get_or_insert(k);
                }
                _ => {}
            }
        }
        found.or(nested)
    }

    /// Scan a plain declaration starting at `i`: find where it ends, whether
    /// it declares a function, and which token names it.
    fn shape(&mut self, i: usize) -> Shape {
        let mut shape = Shape::default();
        let mut j = i;
        let mut angles = 0i32;
        let mut initialized = false;
        let mut member_inits = false;
        let mut operator_at: Option<usize> = None;
        let mut last_identifier: Option<usize> = None;

        while j < self.len() {
            if self.is_comment(j) {
                j += 1;
                continue;
            }
            let text = self.text(j);
            let previous = self.previous(j);
            let after_operator = previous.is_some_and(|p| self.is(p, "operator"));

            if angles > 0 && !initialized {
                match text {
                    "<" => angles += 1,
                    ">" => angles -= 1,
                    ">>" => angles -= 2,
                    "(" | "[" | "{" => {
                        j = self.matching(j) + 1;
                        continue;
                    }
                    ";" => angles = 0,
                    _ => {}
                }
                if angles > 0 || text != ";" {
                    angles = angles.max(0);
                    j += 1;
                    continue;
                }
            }

            match text {
                ";" => {
                    shape.end = j;
                    shape.name = shape.name.or(last_identifier);
                    return shape;
                }
                "}" => {
                    self.diagnostic(j, "expected ';' after declaration");
                    shape.end = j.saturating_sub(1).max(i);
                    shape.name = shape.name.or(last_identifier);
                    return shape;
                }
                "{" if shape.function && !initialized => {
                    let initializer = member_inits
                        && previous.is_some_and(|p| {
                            self.is_identifier(p) || matches!(self.text(p), ">" | "...")
                        });
                    let close = self.matching(j);
                    if !initializer {
                        shape.end = close;
                        return shape;
                    }
                    j = close + 1;
                }
                "{" => {
                    if shape.name.is_none() && !initialized {
                        shape.name = last_identifier;
                    }
                    j = self.matching(j) + 1;
                }
                "=" if !after_operator => {
                    if !shape.function && shape.name.is_none() {
                        shape.name = last_identifier;
                    }
                    initialized = true;
                    j += 1;
                }
                ":" if shape.function && !initialized => {
                    member_inits = true;
                    j += 1;
                }
                "<" if !initialized && !after_operator && !shape.function => {
                    angles = 1;
                    j += 1;
                }
                "operator" if !initialized && !shape.function => {
                    operator_at = Some(j);
                    j += 1;
                }
                "(" if initialized || shape.function => j = self.matching(j) + 1,
                "(" => {
                    let close = self.matching(j);
                    if let Some(op) = operator_at {
                        if j == op + 1 && self.is(close, ")") && close == j + 1 {
                            j = close + 1;
                            continue;
                        }
                    }
                    if let Some(op) = operator_at {
                        shape.function = true;
                        shape.name = Some(op);
                        shape.operator = Some(self.join(op, j));
                        shape.conversion = self
                            .kind(op + 1)
                            .is_some_and(|k| k != TokenKind::Punctuation)
                            && !matches!(self.text(op + 1), "new" | "delete");
                    } else if let Some(p) = previous.filter(|&p| self.names_function(p)) {
                        shape.function = true;
                        shape.name = Some(p);
                        shape.destructor = p > 0 && self.is(p - 1, "~");
                    } else if matches!(self.text(j + 1), "*" | "&" | "&&" | "^") {
                        // `void (*callback)(int)` style declarator.
                        if let Some(inner) = self.declarator_name(j + 1, close) {
                            last_identifier = Some(inner);
                        }
                    }
                    j = close + 1;
                }
                "[" => j = self.matching(j) + 1,
                "static" => {
                    shape.is_static = true;
                    j += 1;
                }
                "," if !shape.function && !initialized && shape.name.is_none() => {
                    shape.name = last_identifier;
                    j += 1;
                }
                _ => {
                    if self.is_identifier(j) && !initialized && !shape.function {
                        last_identifier = Some(j);
                    }
                    j += 1;
                }
            }
        }

        self.diagnostic(j, "expected ';' at end of input");
        shape.end = self.len().saturating_sub(1);
        shape.name = shape.name.or(last_identifier);
        shape
    }

    fn names_function(&self, p: usize) -> bool {
        if !self.is_identifier(p) {
            return false;
        }
        let text = self.text(p);
        !PAREN_SPECIFIERS.contains(&text) && !self.macros.contains_key(text)
    }

    /// Spellings of `first..last` joined the way they appear in the source.
    fn join(&self, first: usize, last: usize) -> String {
        let mut joined = String::new();
        for k in first..last {
            if k > first && self.raw[k - 1].span.end != self.raw[k].span.start {
                joined.push(' ');
            }
            joined.push_str(self.text(k));
        }
        joined
    }

    fn finish(self) -> TranslationUnit {
        let Builder {
            path,
            source,
            lines,
            raw,
            owners,
            drafts,
            diagnostics,
            module,
            ..
        } = self;

        let location = |offset: usize| -> SourceLocation { lines.location(offset) };
        let extent_of = |first: usize, last: usize| -> Extent {
            match (raw.get(first), raw.get(last)) {
                (Some(a), Some(b)) => Extent {
                    start: location(a.span.start),
                    end: location(b.span.end),
                },
                _ => Extent {
                    start: location(0),
                    end: location(source.len()),
                },
            }
        };

        let cursors = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| Cursor {
                kind: draft.kind,
                spelling: draft.spelling,
                extent: if index == 0 {
                    Extent {
                        start: location(0),
                        end: location(source.len()),
                    }
                } else {
                    extent_of(draft.first, draft.last)
                },
                semantic_parent: draft.parent,
            })
            .collect();

        let tokens = raw
            .iter()
            .zip(owners)
            .map(|(t, owner)| Token {
                spelling: source[t.span.clone()].to_string(),
                kind: t.kind,
                extent: Extent {
                    start: location(t.span.start),
                    end: location(t.span.end),
                },
                cursor: owner.unwrap_or(CursorId::ROOT),
            })
            .collect();

        TranslationUnit::new(
            PathBuf::from(path),
            tokens,
            cursors,
            diagnostics,
            module,
        )
    }
}

fn qualify(path: &[String], name: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(name))
        .collect::<Vec<_>>()
        .join("::")
}

fn is_record(kind: CursorKind) -> bool {
    matches!(
        kind,
        CursorKind::StructDecl
            | CursorKind::ClassDecl
            | CursorKind::UnionDecl
            | CursorKind::ClassTemplate
            | CursorKind::ClassTemplatePartialSpecialization
    )
}
