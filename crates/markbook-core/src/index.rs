use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Deserialize;

use crate::error::Result;
use crate::models::{AssignmentEntry, AssignmentIndex, SubjectEntry};
use crate::normalize::normalize_label;
use crate::store::{AssignmentStore, INDEX_FILE, document_rel_path};

/// A document the scan observed but could not index, with the reason it was
/// left out. Skips are data, not errors: one bad file must never abort a
/// scan.
#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub path: String,
    pub reason: String,
}

/// Outcome of one full builder pass.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub index: AssignmentIndex,
    pub skipped: Vec<SkippedDocument>,
    /// True when the new snapshot is equivalent to the previous one and the
    /// persisted artifact does not need rewriting.
    pub unchanged: bool,
    /// True when the scan stopped early because the cancel flag was raised.
    pub cancelled: bool,
}

/// Lenient view of a stored assignment document. The scan only needs the
/// fields the index tracks; everything is defaulted so sparse documents
/// still index (`id` falls back to the normalized name downstream).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    #[serde(default)]
    id: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    questions: Vec<serde_json::Value>,
}

/// Scans the document store end to end and produces a fresh snapshot.
#[derive(Debug, Clone)]
pub struct IndexBuilder<'a> {
    store: &'a AssignmentStore,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(store: &'a AssignmentStore) -> Self {
        Self {
            store,
            cancel: None,
        }
    }

    /// Raise the flag to stop the scan at the next document boundary.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Walk every subject directory and produce a new snapshot, reconciling
    /// against `previous` to decide whether the artifact needs rewriting.
    ///
    /// This never fails: an unreadable store yields an empty snapshot (the
    /// application starts and shows nothing rather than crashing), and each
    /// unreadable or malformed document is recorded as skipped.
    #[must_use]
    pub fn build(&self, previous: Option<&AssignmentIndex>) -> BuildReport {
        let mut index = AssignmentIndex::empty(Utc::now().to_rfc3339());
        let mut skipped = Vec::new();
        let mut seen_keys = HashSet::<(String, String)>::new();
        let mut cancelled = false;

        let subjects = match self.store.list_subjects() {
            Ok(subjects) => subjects,
            Err(err) => {
                skipped.push(SkippedDocument {
                    path: "/".to_string(),
                    reason: format!("store unavailable: {err}"),
                });
                Vec::new()
            }
        };

        'subjects: for subject in subjects {
            let normalized_subject = normalize_label(&subject);
            index.subjects.push(SubjectEntry::from_label(&subject));

            let files = match self.store.list_documents(&subject) {
                Ok(files) => files,
                Err(err) => {
                    skipped.push(SkippedDocument {
                        path: format!("/{subject}"),
                        reason: format!("unreadable subject directory: {err}"),
                    });
                    continue;
                }
            };

            for file_name in files {
                if self.is_cancelled() {
                    cancelled = true;
                    break 'subjects;
                }
                match self.scan_document(&subject, &normalized_subject, &file_name, &mut seen_keys)
                {
                    Ok(entry) => index.assignments.push(entry),
                    Err(skip) => skipped.push(skip),
                }
            }
        }

        let unchanged = previous.is_some_and(|prev| snapshots_equivalent(prev, &index));
        BuildReport {
            index,
            skipped,
            unchanged,
            cancelled,
        }
    }

    fn scan_document(
        &self,
        subject: &str,
        normalized_subject: &str,
        file_name: &str,
        seen_keys: &mut HashSet<(String, String)>,
    ) -> std::result::Result<AssignmentEntry, SkippedDocument> {
        let name = file_name
            .strip_suffix(".json")
            .unwrap_or(file_name)
            .to_string();
        let rel_path = document_rel_path(subject, &name);

        let raw = self
            .store
            .read_document(subject, file_name)
            .map_err(|err| SkippedDocument {
                path: rel_path.clone(),
                reason: format!("unreadable: {err}"),
            })?;
        let stored: StoredDocument =
            serde_json::from_str(&raw).map_err(|err| SkippedDocument {
                path: rel_path.clone(),
                reason: format!("malformed: {err}"),
            })?;

        let normalized_name = normalize_label(&name);
        let key = (normalized_subject.to_string(), normalized_name.clone());
        if !seen_keys.insert(key) {
            return Err(SkippedDocument {
                path: rel_path,
                reason: "duplicate key".to_string(),
            });
        }

        let id = if stored.id.is_empty() {
            normalized_name.clone()
        } else {
            stored.id
        };
        Ok(AssignmentEntry {
            id,
            name,
            normalized_name,
            subject: subject.to_string(),
            normalized_subject: normalized_subject.to_string(),
            path: rel_path,
            updated_at: stored
                .updated_at
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            question_count: stored.questions.len(),
        })
    }
}

/// Coarse equivalence between two snapshots: equal counts and an identical
/// id set. Field-level drift without an id change is deliberately invisible
/// here; the incremental upsert path is responsible for it. Tightening this
/// check changes how often the artifact is rewritten.
#[must_use]
pub fn snapshots_equivalent(previous: &AssignmentIndex, next: &AssignmentIndex) -> bool {
    if previous.assignments.len() != next.assignments.len()
        || previous.subjects.len() != next.subjects.len()
    {
        return false;
    }
    let previous_ids: HashSet<&str> = previous.assignments.iter().map(|a| a.id.as_str()).collect();
    let next_ids: HashSet<&str> = next.assignments.iter().map(|a| a.id.as_str()).collect();
    previous_ids == next_ids
}

/// Load the persisted snapshot artifact, if one exists.
pub fn load_snapshot(store: &AssignmentStore) -> Result<Option<AssignmentIndex>> {
    let Some(raw) = store.read_root_file(INDEX_FILE)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Persist the snapshot artifact atomically, pretty-printed so operators can
/// read it in place.
pub fn persist_snapshot(store: &AssignmentStore, index: &AssignmentIndex) -> Result<()> {
    let serialized = serde_json::to_string_pretty(index)?;
    store.write_root_file(INDEX_FILE, &serialized)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn seeded_store() -> (tempfile::TempDir, AssignmentStore) {
        let temp = tempdir().expect("tempdir");
        let store = AssignmentStore::new(temp.path());
        store.initialize().expect("init");

        store
            .write_document(
                "Mathematics",
                "Basic Math Test.json",
                r#"{"id":"1","name":"Basic Math Test","subject":"Mathematics","questions":[{"id":"1","text":"a","answer":"b","marks":5},{"id":"2","text":"c","answer":"d","marks":10},{"id":"3","text":"e","answer":"f","marks":8}],"updatedAt":"2024-01-01T00:00:00Z"}"#,
            )
            .expect("seed math");
        store
            .write_document(
                "Science",
                "Intro Quiz.json",
                r#"{"id":"2","name":"Intro Quiz","subject":"Science","questions":[{"id":"1","text":"a","answer":"b","marks":2},{"id":"2","text":"c","answer":"d","marks":3}],"updatedAt":"2024-01-02T00:00:00Z"}"#,
            )
            .expect("seed science");
        (temp, store)
    }

    #[test]
    fn full_scan_indexes_both_subjects() {
        let (_temp, store) = seeded_store();
        let report = IndexBuilder::new(&store).build(None);

        assert!(!report.cancelled);
        assert!(report.skipped.is_empty());
        assert_eq!(report.index.subjects.len(), 2);
        assert_eq!(report.index.assignments.len(), 2);

        let math = report
            .index
            .find_by_key("mathematics", "basic-math-test")
            .expect("math entry");
        assert_eq!(math.id, "1");
        assert_eq!(math.question_count, 3);
        assert_eq!(math.path, "/Mathematics/Basic Math Test.json");
    }

    #[test]
    fn every_assignment_has_a_subject_entry() {
        let (_temp, store) = seeded_store();
        let report = IndexBuilder::new(&store).build(None);
        for entry in &report.index.assignments {
            assert!(
                report.index.has_subject(&entry.normalized_subject),
                "missing subject for {}",
                entry.path
            );
        }
    }

    #[test]
    fn malformed_document_is_skipped_not_fatal() {
        let (_temp, store) = seeded_store();
        store
            .write_document("Science", "Intro Quiz.json", "{ not json")
            .expect("corrupt");

        let report = IndexBuilder::new(&store).build(None);
        assert_eq!(report.index.assignments.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.starts_with("malformed"));
        assert_eq!(report.skipped[0].path, "/Science/Intro Quiz.json");
        // The valid document survived.
        assert!(report.index.find_by_key("mathematics", "basic-math-test").is_some());
    }

    #[test]
    fn document_without_id_falls_back_to_normalized_name() {
        let temp = tempdir().expect("tempdir");
        let store = AssignmentStore::new(temp.path());
        store.initialize().expect("init");
        store
            .write_document("History", "Ancient Rome.json", r#"{"name":"Ancient Rome"}"#)
            .expect("seed");

        let report = IndexBuilder::new(&store).build(None);
        let entry = report
            .index
            .find_by_key("history", "ancient-rome")
            .expect("entry");
        assert_eq!(entry.id, "ancient-rome");
        assert_eq!(entry.question_count, 0);
    }

    #[test]
    fn colliding_keys_keep_first_file_only() {
        let temp = tempdir().expect("tempdir");
        let store = AssignmentStore::new(temp.path());
        store.initialize().expect("init");
        store
            .write_document("Science", "Intro Quiz.json", r#"{"id":"a"}"#)
            .expect("seed a");
        store
            .write_document("Science", "Intro  Quiz.json", r#"{"id":"b"}"#)
            .expect("seed b");

        let report = IndexBuilder::new(&store).build(None);
        assert_eq!(report.index.assignments.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, "duplicate key");
    }

    #[test]
    fn unreadable_store_yields_empty_snapshot() {
        let temp = tempdir().expect("tempdir");
        let store = AssignmentStore::new(temp.path());
        // Block the assignments tree with a plain file.
        fs::write(temp.path().join("assignments"), "not a directory").expect("block");

        let report = IndexBuilder::new(&store).build(None);
        assert!(report.index.assignments.is_empty());
        assert!(report.index.subjects.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.starts_with("store unavailable"));
    }

    #[test]
    fn rescan_of_same_tree_is_equivalent() {
        let (_temp, store) = seeded_store();
        let first = IndexBuilder::new(&store).build(None);
        assert!(!first.unchanged);

        let second = IndexBuilder::new(&store).build(Some(&first.index));
        assert!(second.unchanged);
    }

    #[test]
    fn id_change_breaks_equivalence_but_metadata_drift_does_not() {
        let (_temp, store) = seeded_store();
        let first = IndexBuilder::new(&store).build(None);

        // Metadata-only drift: same id, different question count.
        store
            .write_document(
                "Science",
                "Intro Quiz.json",
                r#"{"id":"2","questions":[],"updatedAt":"2024-03-01T00:00:00Z"}"#,
            )
            .expect("rewrite");
        let drifted = IndexBuilder::new(&store).build(Some(&first.index));
        assert!(drifted.unchanged);

        // Id change is visible.
        store
            .write_document("Science", "Intro Quiz.json", r#"{"id":"99"}"#)
            .expect("rewrite id");
        let changed = IndexBuilder::new(&store).build(Some(&first.index));
        assert!(!changed.unchanged);
    }

    #[test]
    fn raised_cancel_flag_stops_between_documents() {
        let (_temp, store) = seeded_store();
        let flag = Arc::new(AtomicBool::new(true));
        let report = IndexBuilder::new(&store)
            .with_cancel_flag(flag)
            .build(None);
        assert!(report.cancelled);
        assert!(report.index.assignments.is_empty());
    }

    #[test]
    fn snapshot_round_trips_through_artifact() {
        let (_temp, store) = seeded_store();
        let report = IndexBuilder::new(&store).build(None);
        persist_snapshot(&store, &report.index).expect("persist");

        let loaded = load_snapshot(&store).expect("load").expect("some");
        assert_eq!(loaded.assignments.len(), 2);
        assert_eq!(loaded.subjects.len(), 2);
        assert_eq!(loaded.last_updated, report.index.last_updated);

        // Wire format check against the persisted artifact.
        let raw = store
            .read_root_file(INDEX_FILE)
            .expect("read")
            .expect("some");
        assert!(raw.contains("\"lastUpdated\""));
        assert!(raw.contains("\"normalizedSubject\""));
        assert!(raw.contains("\"questionCount\""));
    }
}
