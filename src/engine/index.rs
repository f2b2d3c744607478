use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::types::{Comment, DeclarationContext, Directive, FileContent};

/// Documents that must be regenerated.
pub type Invalidated = BTreeSet<String>;

/// Result of a lookup: the comment on a hit, ranked close matches on a miss.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub comment: Option<Arc<Comment>>,
    pub close_matches: Vec<CloseMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseMatch {
    pub signature: String,
    pub similarity: f64,
    pub comment: Arc<Comment>,
}

/// Everything known about the project's `///` comments.
///
/// `files` and `directive_comments` always agree: every directive comment of
/// every indexed file sits in exactly one slot, and every slot is owned by
/// one indexed file.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    files: BTreeMap<PathBuf, FileContent>,
    directive_comments: HashMap<DeclarationContext, BTreeMap<String, Arc<Comment>>>,
    members: HashMap<(String, String), BTreeMap<(Directive, String), Arc<Comment>>>,
    references: BTreeMap<String, BTreeSet<PathBuf>>,
    /// Invalidations from removals whose update has not yet completed.
    pending: Invalidated,
    query: QueryConfig,
}

impl ProjectIndex {
    pub fn new(query: QueryConfig) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn files(&self) -> &BTreeMap<PathBuf, FileContent> {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&FileContent> {
        self.files.get(path)
    }

    pub fn references(&self) -> &BTreeMap<String, BTreeSet<PathBuf>> {
        &self.references
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.directive_comments.is_empty()
            && self.members.is_empty()
    }

    /// Index one file's comments.
    ///
    /// Either every comment is inserted or none is: a slot already taken by
    /// another comment (from any file, this one included) is an error naming
    /// both locations.
    pub fn add(&mut self, path: PathBuf, content: FileContent) -> Result<()> {
        if self.files.contains_key(&path) {
            return Err(Error::AlreadyIndexed { path });
        }

        let mut incoming: HashMap<(&DeclarationContext, &str), &Arc<Comment>> = HashMap::new();
        for dc in &content.directive_comments {
            let existing = self
                .directive_comments
                .get(&dc.context)
                .and_then(|bucket| bucket.get(&dc.signature))
                .or_else(|| incoming.get(&(&dc.context, dc.signature.as_str())).copied());
            if let Some(existing) = existing {
                return Err(Error::DuplicateDocumentation {
                    directive: dc.context.directive.to_string(),
                    signature: dc.signature.clone(),
                    namespace: dc.context.namespace.clone(),
                    existing: existing.location(),
                    incoming: dc.comment.location(),
                });
            }
            incoming.insert((&dc.context, dc.signature.as_str()), &dc.comment);
        }

        for dc in &content.directive_comments {
            self.directive_comments
                .entry(dc.context.clone())
                .or_default()
                .insert(dc.signature.clone(), Arc::clone(&dc.comment));
            self.members
                .entry((dc.context.namespace.clone(), dc.context.module.clone()))
                .or_default()
                .insert(
                    (dc.context.directive.clone(), dc.signature.clone()),
                    Arc::clone(&dc.comment),
                );
        }

        debug!(
            "indexed {} ({} directive comments)",
            path.display(),
            content.directive_comments.len()
        );
        self.files.insert(path, content);
        Ok(())
    }

    /// Drop a file from the index. Returns the documents that referenced it.
    pub fn remove(&mut self, path: &Path) -> Invalidated {
        let Some(content) = self.files.remove(path) else {
            return Invalidated::new();
        };
        self.purge(&content);
        self.documents_referencing(path)
    }

    /// Hold on to `documents` until [`ProjectIndex::take_pending`] hands them
    /// out, so a failed update does not lose them.
    pub fn defer_invalidated(&mut self, documents: Invalidated) {
        self.pending.extend(documents);
    }

    /// Invalidations deferred by updates that have not completed yet.
    pub fn pending(&self) -> &Invalidated {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Invalidated {
        std::mem::take(&mut self.pending)
    }

    /// Delete every slot `content` contributed. Empty buckets are dropped.
    /// `content` must already be out of `files`.
    fn purge(&mut self, content: &FileContent) {
        for dc in &content.directive_comments {
            if let Some(bucket) = self.directive_comments.get_mut(&dc.context) {
                if bucket
                    .get(&dc.signature)
                    .is_some_and(|stored| Arc::ptr_eq(stored, &dc.comment))
                {
                    bucket.remove(&dc.signature);
                }
                if bucket.is_empty() {
                    self.directive_comments.remove(&dc.context);
                }
            }

            let key = (dc.context.namespace.clone(), dc.context.module.clone());
            if let Some(members) = self.members.get_mut(&key) {
                let member = (dc.context.directive.clone(), dc.signature.clone());
                if members
                    .get(&member)
                    .is_some_and(|stored| Arc::ptr_eq(stored, &dc.comment))
                {
                    members.remove(&member);
                }
                if members.is_empty() {
                    self.members.remove(&key);
                }
            }
        }
    }

    fn documents_referencing(&self, path: &Path) -> Invalidated {
        self.references
            .iter()
            .filter(|(_, paths)| paths.contains(path))
            .map(|(document, _)| document.clone())
            .collect()
    }

    /// Look up the comment for `signature`. On a miss, suggest the most
    /// similar signatures of the same bucket.
    pub fn query(
        &self,
        directive: &Directive,
        signature: &str,
        namespace: &str,
        module: &str,
    ) -> QueryResult {
        let context = DeclarationContext {
            directive: directive.clone(),
            namespace: namespace.to_string(),
            module: module.to_string(),
        };
        let Some(bucket) = self.directive_comments.get(&context) else {
            return QueryResult::default();
        };
        if let Some(comment) = bucket.get(signature) {
            return QueryResult {
                comment: Some(Arc::clone(comment)),
                close_matches: Vec::new(),
            };
        }

        let mut close_matches: Vec<CloseMatch> = bucket
            .iter()
            .map(|(candidate, comment)| CloseMatch {
                signature: candidate.clone(),
                similarity: strsim::normalized_levenshtein(signature, candidate),
                comment: Arc::clone(comment),
            })
            .filter(|m| m.similarity >= self.query.suggestion_cutoff)
            .collect();
        close_matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        close_matches.truncate(self.query.max_suggestions);

        QueryResult {
            comment: None,
            close_matches,
        }
    }

    /// Like [`ProjectIndex::query`], and on a hit remember that `document`
    /// depends on the comment's file.
    pub fn lookup_for_document(
        &mut self,
        document: &str,
        directive: &Directive,
        signature: &str,
        namespace: &str,
        module: &str,
    ) -> QueryResult {
        let result = self.query(directive, signature, namespace, module);
        if let Some(comment) = &result.comment {
            self.record_reference(document, comment.file.clone());
        }
        result
    }

    /// Everything documented directly inside `namespace`.
    pub fn members(
        &self,
        namespace: &str,
        module: &str,
    ) -> Option<&BTreeMap<(Directive, String), Arc<Comment>>> {
        self.members
            .get(&(namespace.to_string(), module.to_string()))
    }

    pub fn record_reference(&mut self, document: &str, path: PathBuf) {
        debug!("{} referenced by {document}", path.display());
        self.references
            .entry(document.to_string())
            .or_default()
            .insert(path);
    }

    /// Forget what `document` referenced; it is being regenerated.
    pub fn purge_document(&mut self, document: &str) {
        self.references.remove(document);
    }

    /// Fold in the references another index recorded for `documents`.
    pub fn merge_references(&mut self, documents: &[String], other: &ProjectIndex) {
        for document in documents {
            let Some(paths) = other.references.get(document) else {
                continue;
            };
            self.references
                .entry(document.clone())
                .or_default()
                .extend(paths.iter().cloned());
        }
    }

    pub(crate) fn restore_references(&mut self, references: BTreeMap<String, BTreeSet<PathBuf>>) {
        self.references = references;
    }

    pub(crate) fn restore_pending(&mut self, pending: Invalidated) {
        self.pending = pending;
    }

    /// Indexed paths, for callers that need to mutate while iterating.
    pub(crate) fn indexed_paths(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Distinct slot count, for summaries.
    pub fn len(&self) -> usize {
        self.directive_comments.values().map(BTreeMap::len).sum()
    }

    #[cfg(test)]
    fn slot_keys(&self) -> std::collections::HashSet<(DeclarationContext, String)> {
        self.directive_comments
            .iter()
            .flat_map(|(context, bucket)| {
                bucket
                    .keys()
                    .map(move |signature| (context.clone(), signature.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DirectiveComment;
    use std::time::SystemTime;

    fn comment(file: &str, line: u32, text: &str) -> Arc<Comment> {
        Arc::new(Comment {
            file: PathBuf::from(file),
            next_line: line,
            text: vec![format!("/// {text}")],
            cursor_kind: None,
        })
    }

    fn entry(directive: Directive, namespace: &str, signature: &str, file: &str, line: u32) -> DirectiveComment {
        DirectiveComment {
            context: DeclarationContext {
                directive,
                namespace: namespace.to_string(),
                module: String::new(),
            },
            signature: signature.to_string(),
            comment: comment(file, line, signature),
        }
    }

    fn content(entries: Vec<DirectiveComment>) -> FileContent {
        FileContent {
            module: String::new(),
            directive_comments: entries,
            floating_comments: Vec::new(),
            diagnostics: Vec::new(),
            mtime: SystemTime::UNIX_EPOCH,
        }
    }

    fn quux_index() -> ProjectIndex {
        let mut index = ProjectIndex::new(QueryConfig::default());
        index
            .add(
                PathBuf::from("a.hxx"),
                content(vec![
                    entry(Directive::Struct, "baz", "Quux", "a.hxx", 4),
                    entry(Directive::Member, "baz::Quux", "int foo", "a.hxx", 6),
                    entry(Directive::Member, "baz::Quux", "int bar", "a.hxx", 8),
                    entry(Directive::Function, "baz::Quux", "int foobar() const", "a.hxx", 10),
                    entry(Directive::TypeAlias, "baz", "cHAR = char", "a.hxx", 12),
                ]),
            )
            .unwrap();
        index
    }

    #[test]
    fn test_query_hit() {
        let index = quux_index();
        let result = index.query(&Directive::Function, "int foobar() const", "baz::Quux", "");
        assert_eq!(result.comment.unwrap().next_line, 10);
        assert!(result.close_matches.is_empty());
    }

    #[test]
    fn test_query_class_finds_struct() {
        let index = quux_index();
        let result = index.query(&Directive::parse("class"), "Quux", "baz", "");
        assert!(result.comment.is_some());
        let result = index.query(&Directive::parse("cpp:class"), "Quux", "baz", "");
        assert!(result.comment.is_some());
    }

    #[test]
    fn test_query_miss_suggests_close_matches() {
        let index = quux_index();
        let result = index.query(&Directive::TypeAlias, "CHAR=char", "baz", "");
        assert!(result.comment.is_none());
        assert_eq!(result.close_matches.len(), 1);
        assert_eq!(result.close_matches[0].signature, "cHAR = char");
        assert_eq!(result.close_matches[0].comment.location().to_string(), "a.hxx:12");
    }

    #[test]
    fn test_close_matches_are_ranked_and_capped() {
        let mut index = ProjectIndex::new(QueryConfig {
            max_suggestions: 2,
            suggestion_cutoff: 0.0,
        });
        index
            .add(
                PathBuf::from("m.hxx"),
                content(vec![
                    entry(Directive::Variable, "", "int a1", "m.hxx", 1),
                    entry(Directive::Variable, "", "int ab", "m.hxx", 2),
                    entry(Directive::Variable, "", "long zzz", "m.hxx", 3),
                ]),
            )
            .unwrap();
        let result = index.query(&Directive::Variable, "int a", "", "");
        let names: Vec<_> = result
            .close_matches
            .iter()
            .map(|m| m.signature.as_str())
            .collect();
        assert_eq!(names, vec!["int a1", "int ab"]);
    }

    #[test]
    fn test_query_unknown_bucket_is_empty_miss() {
        let index = quux_index();
        let result = index.query(&Directive::Macro, "FOO", "", "");
        assert!(result.comment.is_none());
        assert!(result.close_matches.is_empty());
    }

    #[test]
    fn test_members() {
        let index = quux_index();
        let members = index.members("baz::Quux", "").unwrap();
        let keys: Vec<_> = members
            .keys()
            .map(|(d, s)| (d.to_string(), s.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("function".to_string(), "int foobar() const"),
                ("member".to_string(), "int bar"),
                ("member".to_string(), "int foo"),
            ]
        );
        assert!(index.members("nowhere", "").is_none());
    }

    // ── Duplicate detection ──────────────────────────────────────────────

    #[test]
    fn test_duplicate_across_files_is_an_error() {
        let mut index = quux_index();
        let err = index
            .add(
                PathBuf::from("b.hxx"),
                content(vec![entry(Directive::Struct, "baz", "Quux", "b.hxx", 2)]),
            )
            .unwrap_err();
        match err {
            Error::DuplicateDocumentation {
                existing, incoming, ..
            } => {
                assert_eq!(existing.to_string(), "a.hxx:4");
                assert_eq!(incoming.to_string(), "b.hxx:2");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(index.file(Path::new("b.hxx")).is_none());
    }

    #[test]
    fn test_duplicate_within_file_is_an_error_and_adds_nothing() {
        let mut index = ProjectIndex::new(QueryConfig::default());
        let err = index
            .add(
                PathBuf::from("d.hxx"),
                content(vec![
                    entry(Directive::Function, "", "void f()", "d.hxx", 2),
                    entry(Directive::Variable, "", "int x", "d.hxx", 4),
                    entry(Directive::Function, "", "void f()", "d.hxx", 6),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDocumentation { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_same_signature_in_other_context_is_fine() {
        let mut index = quux_index();
        index
            .add(
                PathBuf::from("c.hxx"),
                content(vec![entry(Directive::Struct, "other", "Quux", "c.hxx", 2)]),
            )
            .unwrap();
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn test_add_twice_is_already_indexed() {
        let mut index = quux_index();
        let err = index
            .add(PathBuf::from("a.hxx"), content(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyIndexed { .. }));
    }

    // ── Add/remove lock-step ─────────────────────────────────────────────

    #[test]
    fn test_add_then_remove_leaves_nothing() {
        let mut index = quux_index();
        index.remove(Path::new("a.hxx"));
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_remove_keeps_other_files() {
        let mut index = quux_index();
        let other = entry(Directive::Function, "baz", "void g()", "b.hxx", 3);
        index
            .add(PathBuf::from("b.hxx"), content(vec![other]))
            .unwrap();
        let before = index.slot_keys();
        index.remove(Path::new("a.hxx"));
        let after = index.slot_keys();
        assert_eq!(after.len(), 1);
        assert!(before.is_superset(&after));
        assert!(index.query(&Directive::Function, "void g()", "baz", "").comment.is_some());
        assert!(index.members("baz::Quux", "").is_none());
        assert_eq!(index.members("baz", "").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_then_add_again() {
        let mut index = quux_index();
        index.remove(Path::new("a.hxx"));
        assert!(index.file(Path::new("a.hxx")).is_none());
        index
            .add(
                PathBuf::from("a.hxx"),
                content(vec![entry(Directive::Struct, "baz", "Quux", "a.hxx", 4)]),
            )
            .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_unknown_path_is_empty() {
        let mut index = quux_index();
        assert!(index.remove(Path::new("missing.hxx")).is_empty());
        assert_eq!(index.len(), 5);
    }

    // ── Reference tracking ───────────────────────────────────────────────

    #[test]
    fn test_remove_reports_referencing_documents() {
        let mut index = quux_index();
        let hit = index.lookup_for_document("api", &Directive::Struct, "Quux", "baz", "");
        assert!(hit.comment.is_some());
        index.lookup_for_document("missing", &Directive::Struct, "Nope", "baz", "");
        index.record_reference("other", PathBuf::from("z.hxx"));

        let invalidated = index.remove(Path::new("a.hxx"));
        assert_eq!(invalidated, BTreeSet::from(["api".to_string()]));
    }

    #[test]
    fn test_deferred_invalidations_are_taken_once() {
        let mut index = quux_index();
        index.record_reference("api", PathBuf::from("a.hxx"));
        let invalidated = index.remove(Path::new("a.hxx"));
        index.defer_invalidated(invalidated);
        index.defer_invalidated(BTreeSet::from(["guide".to_string()]));
        assert_eq!(index.pending().len(), 2);

        let taken = index.take_pending();
        assert_eq!(taken, BTreeSet::from(["api".to_string(), "guide".to_string()]));
        assert!(index.take_pending().is_empty());
    }

    #[test]
    fn test_purge_document() {
        let mut index = quux_index();
        index.record_reference("api", PathBuf::from("a.hxx"));
        index.purge_document("api");
        assert!(index.remove(Path::new("a.hxx")).is_empty());
    }

    #[test]
    fn test_merge_references() {
        let mut main = quux_index();
        main.record_reference("api", PathBuf::from("a.hxx"));

        let mut worker = ProjectIndex::default();
        worker.record_reference("api", PathBuf::from("b.hxx"));
        worker.record_reference("guide", PathBuf::from("a.hxx"));
        worker.record_reference("unrelated", PathBuf::from("a.hxx"));

        main.merge_references(&["api".to_string(), "guide".to_string()], &worker);
        assert_eq!(main.references()["api"].len(), 2);
        assert!(main.references()["guide"].contains(Path::new("a.hxx")));
        assert!(!main.references().contains_key("unrelated"));
    }
}
