//! Operation-level diff between two specification documents.
//!
//! The diff walks the `paths → method → operation` tree twice: once driven
//! by the incoming document (additions and edits) and once driven by the
//! cached document (removals, plus anything the first pass could not see
//! because the key sets differ). Each side reports its own `operationId`;
//! operations without one cannot be tracked and contribute nothing.
//!
//! Cost is one deep comparison per `(path, method)` pair on each side,
//! which is fine for documents of up to a few thousand operations.

use std::collections::HashSet;

use crate::models::{Operation, SpecDocument};

/// Insertion-ordered set of changed `operationId`s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedOperations {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl ChangedOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id`, returning `false` when it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.ids.push(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.ids
    }
}

/// Compute the operationIds that were added, changed or removed between
/// `cached` and `incoming`.
pub fn diff(incoming: &SpecDocument, cached: &SpecDocument) -> ChangedOperations {
    let mut changed = ChangedOperations::new();

    for op in incoming.operations() {
        if differs_from(&op, cached) {
            if let Some(id) = op.operation_id() {
                changed.insert(id);
            }
        }
    }

    for op in cached.operations() {
        if differs_from(&op, incoming) {
            if let Some(id) = op.operation_id() {
                changed.insert(id);
            }
        }
    }

    changed
}

/// Whether `op` is missing from `other` or its counterpart differs.
fn differs_from(op: &Operation<'_>, other: &SpecDocument) -> bool {
    if !other.has_path(op.path) {
        return true;
    }
    match other.operation(op.path, op.method) {
        Some(counterpart) => counterpart != op.fields,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(paths: serde_json::Value) -> SpecDocument {
        SpecDocument::new(json!({
            "swagger": "2.0",
            "info": {"title": "Test API", "version": "1.0"},
            "paths": paths
        }))
    }

    fn ids(changed: ChangedOperations) -> Vec<String> {
        changed.into_vec()
    }

    #[test]
    fn test_self_diff_is_empty() {
        let s = spec(json!({
            "/test": {
                "get": {"operationId": "getTest", "description": "Get"},
                "post": {"operationId": "createTest", "tags": ["a", "b"]}
            }
        }));
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn test_empty_cache_marks_everything_changed() {
        let s = spec(json!({
            "/a": {"get": {"operationId": "getA"}, "put": {"operationId": "putA"}},
            "/b": {"delete": {"operationId": "deleteB"}, "head": {"summary": "no id"}}
        }));
        assert_eq!(
            ids(diff(&s, &SpecDocument::empty())),
            vec!["getA", "putA", "deleteB"]
        );
    }

    #[test]
    fn test_changed_description_only() {
        let incoming = spec(json!({
            "/test": {"get": {"operationId": "getTest", "description": "Test description"}},
            "/other": {"get": {"operationId": "getOther", "description": "Same"}}
        }));
        let cached = spec(json!({
            "/test": {"get": {"operationId": "getTest", "description": "Cached description"}},
            "/other": {"get": {"operationId": "getOther", "description": "Same"}}
        }));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["getTest"]);
    }

    #[test]
    fn test_added_method() {
        let incoming = spec(json!({
            "/test": {
                "get": {"operationId": "getTest", "description": "Get method"},
                "post": {"operationId": "createTest", "description": "Create method"}
            }
        }));
        let cached = spec(json!({
            "/test": {"get": {"operationId": "getTest", "description": "Get method"}}
        }));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["createTest"]);
    }

    #[test]
    fn test_added_path() {
        let incoming = spec(json!({
            "/test": {"get": {"operationId": "getTest"}},
            "/new": {"get": {"operationId": "getNew"}}
        }));
        let cached = spec(json!({"/test": {"get": {"operationId": "getTest"}}}));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["getNew"]);
    }

    #[test]
    fn test_removed_method_and_path() {
        let incoming = spec(json!({"/test": {"get": {"operationId": "getTest"}}}));
        let cached = spec(json!({
            "/test": {"get": {"operationId": "getTest"}, "delete": {"operationId": "deleteTest"}},
            "/gone": {"get": {"operationId": "getGone"}}
        }));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["getGone", "deleteTest"]);
    }

    #[test]
    fn test_empty_paths_on_both_sides() {
        let incoming = spec(json!({}));
        assert!(diff(&incoming, &SpecDocument::empty()).is_empty());
    }

    #[test]
    fn test_operation_without_id_is_untracked() {
        let incoming = spec(json!({"/test": {"get": {"description": "new text"}}}));
        let cached = spec(json!({"/test": {"get": {"description": "old text"}}}));
        assert!(diff(&incoming, &cached).is_empty());
    }

    #[test]
    fn test_renamed_operation_reports_both_ids() {
        let incoming = spec(json!({"/test": {"get": {"operationId": "fetchTest"}}}));
        let cached = spec(json!({"/test": {"get": {"operationId": "getTest"}}}));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["fetchTest", "getTest"]);
    }

    #[test]
    fn test_edit_reported_once() {
        let incoming = spec(json!({"/test": {"get": {"operationId": "getTest", "x": 1}}}));
        let cached = spec(json!({"/test": {"get": {"operationId": "getTest", "x": 2}}}));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["getTest"]);
    }

    #[test]
    fn test_method_case_is_significant() {
        let incoming = spec(json!({"/test": {"GET": {"operationId": "getTest"}}}));
        let cached = spec(json!({"/test": {"get": {"operationId": "getTest"}}}));
        assert_eq!(ids(diff(&incoming, &cached)), vec!["getTest"]);
    }

    #[test]
    fn test_top_level_changes_are_ignored() {
        let incoming = SpecDocument::new(json!({
            "info": {"title": "Renamed"},
            "paths": {"/test": {"get": {"operationId": "getTest"}}}
        }));
        let cached = SpecDocument::new(json!({
            "info": {"title": "Original"},
            "paths": {"/test": {"get": {"operationId": "getTest"}}}
        }));
        assert!(diff(&incoming, &cached).is_empty());
    }

    #[test]
    fn test_changed_set_dedupes() {
        let mut changed = ChangedOperations::new();
        assert!(changed.insert("a"));
        assert!(!changed.insert("a"));
        assert!(changed.insert("b"));
        assert_eq!(changed.len(), 2);
        assert!(changed.contains("b"));
        assert_eq!(changed.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
