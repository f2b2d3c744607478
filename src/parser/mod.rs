pub mod cfamily;
pub mod comment;
pub mod declaration;
pub mod frontend;
pub(crate) mod lexer;
pub mod tokens;

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, error, warn};

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::types::{DeclarationContext, DirectiveComment, FileContent};
use comment::{read_comment, take_explicit_directive};
use declaration::classify;
use frontend::{FrontEnd, TranslationUnit};
use tokens::Tokens;

/// Parse `path` with `front_end` and scan it.
pub fn scan_file(
    front_end: &dyn FrontEnd,
    path: &Path,
    args: &[String],
    options: &ScanConfig,
) -> Result<FileContent> {
    let mtime = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(path, e))?;
    let tu = front_end.parse(path, args)?;
    scan_translation_unit(&tu, mtime, options)
}

/// Pair every `///` comment in `tu` with the declaration it documents.
///
/// Comments followed by a blank line are floating. Comments whose first line
/// is `///.. directive:: argument` are stored under that directive whatever
/// follows them. Anything else that cannot be classified is logged and
/// dropped.
pub fn scan_translation_unit(
    tu: &TranslationUnit,
    mtime: SystemTime,
    options: &ScanConfig,
) -> Result<FileContent> {
    let path = tu.path();
    for diagnostic in tu.diagnostics() {
        warn!("{diagnostic}");
    }

    let module = tu.module().unwrap_or_default().to_string();
    let mut directive_comments = Vec::new();
    let mut floating_comments = Vec::new();
    let mut tokens = Tokens::new(tu.tokens());

    while let Some(mut comment) = read_comment(&mut tokens, path)? {
        let floating = tokens
            .peek()
            .map_or(true, |t| t.extent.start.line > comment.next_line);

        let declaration = if floating {
            None
        } else {
            classify(&mut tokens, tu)
        };

        let explicit = take_explicit_directive(&mut comment);
        comment.cursor_kind = declaration.as_ref().map(|d| d.cursor_kind);

        let (directive, signature, namespace) = match (explicit, declaration) {
            (Some(explicit), declaration) => {
                let namespace = declaration
                    .filter(|_| options.explicit_directive_namespace)
                    .map(|d| d.namespace)
                    .unwrap_or_default();
                (explicit.directive, explicit.argument, namespace)
            }
            (None, Some(declaration)) => match declaration.category.directive() {
                Some(directive) => (directive, declaration.signature, declaration.namespace),
                None => {
                    error!(
                        "could not infer directive from {}",
                        comment.location()
                    );
                    continue;
                }
            },
            (None, None) if floating => {
                floating_comments.push(comment);
                continue;
            }
            (None, None) => {
                error!(
                    "could not infer directive from {}",
                    comment.location()
                );
                continue;
            }
        };

        directive_comments.push(DirectiveComment {
            context: DeclarationContext {
                directive,
                namespace,
                module: module.clone(),
            },
            signature,
            comment: Arc::new(comment),
        });
    }

    debug!(
        "scanned {}: {} directive comments, {} floating",
        path.display(),
        directive_comments.len(),
        floating_comments.len()
    );

    Ok(FileContent {
        module,
        directive_comments,
        floating_comments,
        diagnostics: tu.diagnostics().to_vec(),
        mtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::cfamily::{parse_source, CFamilyFrontEnd};
    use crate::parser::frontend::CursorKind;
    use crate::types::Directive;
    use std::path::PathBuf;

    fn scan_with(source: &str, options: &ScanConfig) -> FileContent {
        let tu = parse_source(Path::new("s.hxx"), source, &[]);
        scan_translation_unit(&tu, SystemTime::UNIX_EPOCH, options).unwrap()
    }

    fn scan(source: &str) -> FileContent {
        scan_with(source, &ScanConfig::default())
    }

    fn summary(content: &FileContent) -> Vec<(String, String, String, Vec<&str>)> {
        content
            .directive_comments
            .iter()
            .map(|dc| {
                (
                    dc.context.directive.to_string(),
                    dc.signature.clone(),
                    dc.context.namespace.clone(),
                    dc.comment.stripped_text(),
                )
            })
            .collect()
    }

    #[test]
    fn test_no_comments_no_output() {
        let content = scan("int main() { return 0; }\nstruct S { int x; };\n// plain\n");
        assert!(content.directive_comments.is_empty());
        assert!(content.floating_comments.is_empty());
        assert!(content.diagnostics.is_empty());
    }

    #[test]
    fn test_function_scenario() {
        let content = scan("/// doc\nint main() {}");
        assert_eq!(
            summary(&content),
            vec![(
                "function".to_string(),
                "int main()".to_string(),
                String::new(),
                vec!["doc"]
            )]
        );
        assert_eq!(
            content.directive_comments[0].comment.cursor_kind,
            Some(CursorKind::FunctionDecl)
        );
    }

    #[test]
    fn test_blank_line_makes_floating() {
        let content = scan("/// a\n\n/// b\nint x;");
        assert_eq!(content.floating_comments.len(), 1);
        assert_eq!(content.floating_comments[0].stripped_text(), vec!["a"]);
        assert_eq!(
            summary(&content),
            vec![(
                "variable".to_string(),
                "int x".to_string(),
                String::new(),
                vec!["b"]
            )]
        );
    }

    #[test]
    fn test_floating_at_end_of_file() {
        let content = scan("int x;\n/// trailing\n");
        assert_eq!(content.floating_comments.len(), 1);
        assert!(content.directive_comments.is_empty());
    }

    #[test]
    fn test_explicit_directive_scenario() {
        let content = scan("///.. macro:: FOO(x)\n/// body\nint unrelated(int);\n");
        assert_eq!(
            summary(&content),
            vec![(
                "macro".to_string(),
                "FOO(x)".to_string(),
                String::new(),
                vec!["body"]
            )]
        );
    }

    #[test]
    fn test_explicit_directive_on_floating_comment() {
        let content = scan("namespace ns {\n///.. c:macro:: EXPECT_(condition...)\n\nint x;\n}\n");
        assert_eq!(summary(&content)[0].1, "EXPECT_(condition...)");
        assert_eq!(summary(&content)[0].2, "");
        assert!(content.floating_comments.is_empty());
    }

    #[test]
    fn test_explicit_directive_namespace_is_configurable() {
        let source = "namespace ns {\n///.. function:: void f(int)\nvoid f(int);\n}\n";
        assert_eq!(scan(source).directive_comments[0].context.namespace, "ns");

        let options = ScanConfig {
            explicit_directive_namespace: false,
        };
        assert_eq!(
            scan_with(source, &options).directive_comments[0]
                .context
                .namespace,
            ""
        );
    }

    #[test]
    fn test_unclassifiable_comment_is_dropped() {
        let content = scan("/// about the enum\nenum Color { R, G };\n");
        assert!(content.directive_comments.is_empty());
        assert!(content.floating_comments.is_empty());
    }

    #[test]
    fn test_comment_before_preprocessor_noise_does_not_steal() {
        let content = scan("/// orphan\n#include <x>\n/// real\nint y;\n");
        assert_eq!(summary(&content).len(), 1);
        assert_eq!(summary(&content)[0].1, "int y");
        assert_eq!(summary(&content)[0].3, vec!["real"]);
    }

    #[test]
    fn test_header_like_file() {
        let content = scan(
            r#"#pragma once
// clang-format off
/// Floating introduction.

/// The answer.
/// clang-format stays out of the text.
int main();

namespace baz {
/// A character.
using cHAR = char;

/// Quux docs.
struct Quux {
  /// The foo.
  int foo;

  /// A method.
  int foobar() const;
};
}

///.. c:macro:: EXPECT_(condition...)
#define EXPECT_(...) check(__VA_ARGS__)

/// An object-like macro.
#define LIMIT 16
"#,
        );
        assert_eq!(content.floating_comments.len(), 1);
        let found: Vec<_> = summary(&content)
            .into_iter()
            .map(|(d, s, n, _)| (d, s, n))
            .collect();
        let expected = [
            ("function", "int main()", ""),
            ("type-alias", "cHAR = char", "baz"),
            ("struct", "Quux", "baz"),
            ("member", "int foo", "baz::Quux"),
            ("function", "int foobar() const", "baz::Quux"),
            ("macro", "EXPECT_(condition...)", ""),
            ("macro", "LIMIT", ""),
        ];
        assert_eq!(
            found,
            expected
                .iter()
                .map(|(d, s, n)| (d.to_string(), s.to_string(), n.to_string()))
                .collect::<Vec<_>>()
        );
        assert_eq!(
            content.directive_comments[0].context.directive,
            Directive::Function
        );
    }

    #[test]
    fn test_signature_round_trip() {
        let first = scan("/// d\nconst   char *\n  name( int  id ) noexcept;\n");
        let signature = &first.directive_comments[0].signature;
        let second = scan(&format!("/// d\n{signature};\n"));
        assert_eq!(&second.directive_comments[0].signature, signature);
    }

    #[test]
    fn test_interleaved_block_comment_fails_scan() {
        let tu = parse_source(Path::new("s.hxx"), "/// a\n/* b */\nint x;\n", &[]);
        let result = scan_translation_unit(&tu, SystemTime::UNIX_EPOCH, &ScanConfig::default());
        assert!(matches!(result, Err(Error::InterleavedComment { .. })));
    }

    #[test]
    fn test_raw_string_does_not_swallow_next_comment() {
        let content = scan("/// d\nconst char* s = R\"(a\"b)\";\n/// e\nint y;\n");
        assert!(content.diagnostics.is_empty(), "{:?}", content.diagnostics);
        let found = summary(&content);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].1, "int y");
        assert_eq!(found[1].3, vec!["e"]);
    }

    #[test]
    fn test_diagnostics_do_not_abort() {
        let content = scan("namespace a {\n/// doc\nint x;\n");
        assert_eq!(content.diagnostics.len(), 1);
        assert_eq!(summary(&content)[0].1, "int x");
        assert_eq!(summary(&content)[0].2, "a");
    }

    #[test]
    fn test_module_name_is_recorded() {
        let content = scan("export module shapes;\n/// doc\nexport int area();\n");
        assert_eq!(content.module, "shapes");
        assert_eq!(content.directive_comments[0].context.module, "shapes");
        assert_eq!(content.directive_comments[0].signature, "int area()");
    }

    #[test]
    fn test_scan_file_reads_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.hxx");
        std::fs::write(&path, "/// doc\nint f();\n").unwrap();
        let content =
            scan_file(&CFamilyFrontEnd, &path, &[], &ScanConfig::default()).unwrap();
        let expected = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(content.mtime, expected);
        assert_eq!(content.directive_comments[0].comment.file, path);
    }

    #[test]
    fn test_scan_file_missing() {
        let err = scan_file(
            &CFamilyFrontEnd,
            &PathBuf::from("/nonexistent/f.hxx"),
            &[],
            &ScanConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
