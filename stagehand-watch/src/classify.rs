//! Snapshot diffing.
//!
//! Pure comparison of two [`AppSnapshot`]s into typed [`ChangeEvent`]s. No
//! I/O. Ordering is deterministic for a given pair of snapshots: deletions
//! first (previous snapshot's handle order), then creations and updates in
//! the current snapshot's handle order.

use stagehand_core::{AppSnapshot, ChangeEvent, ChangeKind};

/// Compare `previous` against `current`.
///
/// - Only in `current` → `Created`; only in `previous` → `Deleted`.
/// - Present in both with identical config and source digests → no event.
/// - Different source digests → `UpdatedSourceFile`, regardless of whether
///   the config also changed (source changes dominate).
/// - Same sources, different config → `Updated`.
/// - `previous = None` (first tick) → every extension is `Created`.
///
/// An extension absent from `current` emits only `Deleted`, even if its
/// sources changed earlier in the same debounce window: the classifier only
/// ever sees the post-settle snapshot, so deleted wins.
pub fn diff(previous: Option<&AppSnapshot>, current: &AppSnapshot) -> Vec<ChangeEvent> {
    let Some(previous) = previous else {
        return current
            .extensions
            .values()
            .map(|ext| ChangeEvent::new(ChangeKind::Created, ext.clone()))
            .collect();
    };

    let mut events = Vec::new();

    for (handle, ext) in &previous.extensions {
        if !current.extensions.contains_key(handle) {
            events.push(ChangeEvent::new(ChangeKind::Deleted, ext.clone()));
        }
    }

    for (handle, ext) in &current.extensions {
        match previous.extensions.get(handle) {
            None => events.push(ChangeEvent::new(ChangeKind::Created, ext.clone())),
            Some(prev) if prev.content_eq(ext) => {}
            Some(prev) if prev.source_hashes != ext.source_hashes => {
                events.push(ChangeEvent::new(ChangeKind::UpdatedSourceFile, ext.clone()));
            }
            Some(_) => events.push(ChangeEvent::new(ChangeKind::Updated, ext.clone())),
        }
    }

    events
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use stagehand_core::{
        AppSnapshot, Digest, ExtensionHandle, ExtensionKind, ExtensionSnapshot,
    };

    fn ext(handle: &str, config: &str, sources: &[(&str, &str)]) -> ExtensionSnapshot {
        let mut source_hashes = BTreeMap::new();
        for (path, content) in sources {
            source_hashes.insert(PathBuf::from(path), Digest::of_str(content));
        }
        ExtensionSnapshot {
            handle: ExtensionHandle::from(handle),
            kind: ExtensionKind::UiExtension,
            config_hash: Digest::of_str(config),
            source_hashes,
        }
    }

    fn app(extensions: Vec<ExtensionSnapshot>) -> AppSnapshot {
        AppSnapshot::new("demo", "/tmp/demo", extensions).expect("unique handles")
    }

    #[test]
    fn equal_snapshots_diff_empty() {
        let a = app(vec![ext("a", "cfg", &[("src/i.js", "x")])]);
        let b = a.clone();
        assert!(diff(Some(&a), &b).is_empty());
    }

    #[test]
    fn first_tick_emits_all_created() {
        let current = app(vec![
            ext("a", "cfg", &[]),
            ext("b", "cfg", &[]),
            ext("c", "cfg", &[]),
        ]);
        let events = diff(None, &current);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.kind == ChangeKind::Created));
    }

    #[test]
    fn created_and_deleted_by_handle() {
        let previous = app(vec![ext("old", "cfg", &[])]);
        let current = app(vec![ext("new", "cfg", &[])]);
        let events = diff(Some(&previous), &current);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeKind::Deleted);
        assert_eq!(events[0].extension.handle.0, "old");
        assert_eq!(events[1].kind, ChangeKind::Created);
        assert_eq!(events[1].extension.handle.0, "new");
    }

    #[test]
    fn config_only_change_is_updated() {
        let previous = app(vec![ext("a", "cfg-v1", &[("src/i.js", "x")])]);
        let current = app(vec![ext("a", "cfg-v2", &[("src/i.js", "x")])]);
        let events = diff(Some(&previous), &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Updated);
    }

    #[test]
    fn source_change_dominates_simultaneous_config_change() {
        let previous = app(vec![ext("a", "cfg-v1", &[("src/i.js", "x")])]);
        let current = app(vec![ext("a", "cfg-v2", &[("src/i.js", "y")])]);
        let events = diff(Some(&previous), &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::UpdatedSourceFile);
    }

    #[test]
    fn source_file_added_is_updated_source_file() {
        let previous = app(vec![ext("a", "cfg", &[("src/i.js", "x")])]);
        let current = app(vec![ext("a", "cfg", &[("src/i.js", "x"), ("src/j.js", "y")])]);
        let events = diff(Some(&previous), &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::UpdatedSourceFile);
    }

    #[test]
    fn deleted_wins_over_mid_window_source_change() {
        // The extension's sources changed during the burst, but it is absent
        // from the post-settle snapshot: only Deleted is emitted.
        let previous = app(vec![ext("a", "cfg", &[("src/i.js", "x")]), ext("b", "cfg", &[])]);
        let current = app(vec![ext("b", "cfg", &[])]);
        let events = diff(Some(&previous), &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Deleted);
        assert_eq!(events[0].extension.handle.0, "a");
    }

    #[test]
    fn ordering_is_deterministic() {
        let previous = app(vec![ext("gone", "cfg", &[]), ext("kept", "v1", &[])]);
        let current = app(vec![
            ext("added-a", "cfg", &[]),
            ext("added-z", "cfg", &[]),
            ext("kept", "v2", &[]),
        ]);
        let first = diff(Some(&previous), &current);
        let second = diff(Some(&previous), &current);
        let kinds = |events: &[ChangeEvent]| {
            events
                .iter()
                .map(|e| (e.kind, e.extension.handle.0.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(kinds(&first), kinds(&second));
        assert_eq!(
            kinds(&first),
            vec![
                (ChangeKind::Deleted, "gone".to_string()),
                (ChangeKind::Created, "added-a".to_string()),
                (ChangeKind::Created, "added-z".to_string()),
                (ChangeKind::Updated, "kept".to_string()),
            ]
        );
    }
}
