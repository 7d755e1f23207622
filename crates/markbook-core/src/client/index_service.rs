use std::sync::Arc;
use std::sync::MutexGuard;

use chrono::Utc;

use crate::error::Result;
use crate::index::{BuildReport, IndexBuilder, load_snapshot, persist_snapshot};
use crate::models::{
    Assignment, AssignmentEntry, AssignmentIndex, IndexWriteOutcome, SubjectEntry,
};
use crate::normalize::normalize_label;
use crate::store::document_rel_path;

use super::Markbook;

impl Markbook {
    /// The current snapshot, lazily populated: cached value first, then the
    /// persisted artifact, then a full scan of the store.
    pub fn assignment_index(&self) -> Result<Arc<AssignmentIndex>> {
        if let Some(index) = self.cache().get()? {
            return Ok(index);
        }
        let gate = self.cache().lock_mutations()?;
        self.current_index(&gate)
    }

    /// Exact-key lookup. A missing entry is a normal `None`, never an error.
    pub fn find_assignment(&self, subject: &str, name: &str) -> Result<Option<AssignmentEntry>> {
        let normalized_subject = normalize_label(subject);
        let normalized_name = normalize_label(name);
        let index = self.assignment_index()?;
        Ok(index
            .find_by_key(&normalized_subject, &normalized_name)
            .cloned())
    }

    pub fn find_assignment_by_id(&self, id: &str) -> Result<Option<AssignmentEntry>> {
        let index = self.assignment_index()?;
        Ok(index.find_by_id(id).cloned())
    }

    /// Rebuild the index from a full store scan. With `force` false an
    /// already-cached snapshot is returned untouched; with `force` true the
    /// cache is always replaced and the artifact rewritten unless the scan
    /// proved equivalent to the previous snapshot.
    pub fn rebuild_index(&self, force: bool) -> Result<Arc<AssignmentIndex>> {
        if !force && let Some(index) = self.cache().get()? {
            return Ok(index);
        }
        let started = std::time::Instant::now();
        let gate = self.cache().lock_mutations()?;
        if !force && let Some(index) = self.cache().get()? {
            return Ok(index);
        }
        let index = self.rebuild_locked(&gate)?;
        self.log_request_status(
            "index.rebuild",
            "ok",
            started,
            None,
            Some(serde_json::json!({
                "assignments": index.assignments.len(),
                "subjects": index.subjects.len(),
            })),
        );
        Ok(index)
    }

    /// Add or refresh the index entry for a just-written document. The
    /// caller passes the subject and file name the document actually lives
    /// at; the entry is matched by id or by key, replaced only when a
    /// tracked field differs, and a no-op leaves `lastUpdated` and the
    /// artifact untouched.
    pub fn upsert_index_entry(
        &self,
        assignment: &Assignment,
        subject: &str,
        file_name: &str,
    ) -> Result<IndexWriteOutcome> {
        let gate = self.cache().lock_mutations()?;
        let current = self.current_index(&gate)?;

        let name = file_name.strip_suffix(".json").unwrap_or(file_name);
        let normalized_subject = normalize_label(subject);
        let normalized_name = normalize_label(name);
        let entry = AssignmentEntry {
            id: assignment.id.clone(),
            name: name.to_string(),
            normalized_name: normalized_name.clone(),
            subject: subject.to_string(),
            normalized_subject: normalized_subject.clone(),
            path: document_rel_path(subject, name),
            updated_at: assignment
                .updated_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            question_count: assignment.questions.len(),
        };

        let mut working = (*current).clone();
        let mut changed = false;

        if !working.has_subject(&normalized_subject) {
            working.subjects.push(SubjectEntry::from_label(subject));
            changed = true;
        }

        let existing = working.assignments.iter().position(|a| {
            a.id == entry.id
                || (a.normalized_subject == normalized_subject
                    && a.normalized_name == normalized_name)
        });
        match existing {
            Some(position) => {
                if working.assignments[position].differs_from(&entry) {
                    working.assignments[position] = entry;
                    changed = true;
                }
            }
            None => {
                working.assignments.push(entry);
                changed = true;
            }
        }

        if !changed {
            return Ok(IndexWriteOutcome::unchanged());
        }
        self.swap_and_persist(working)
    }

    /// Remove the entry for a deleted document. Absence is a silent no-op:
    /// nothing is bumped and nothing is written.
    pub fn remove_index_entry(&self, subject: &str, name: &str) -> Result<IndexWriteOutcome> {
        let gate = self.cache().lock_mutations()?;
        let current = self.current_index(&gate)?;

        let normalized_subject = normalize_label(subject);
        let normalized_name = normalize_label(name);
        if current
            .find_by_key(&normalized_subject, &normalized_name)
            .is_none()
        {
            return Ok(IndexWriteOutcome::unchanged());
        }

        let mut working = (*current).clone();
        working.assignments.retain(|a| {
            !(a.normalized_subject == normalized_subject && a.normalized_name == normalized_name)
        });
        self.swap_and_persist(working)
    }

    /// Resolve the index while the mutation gate is already held. Never
    /// re-locks the gate: callers own it for the whole mutation.
    pub(super) fn current_index(
        &self,
        gate: &MutexGuard<'_, ()>,
    ) -> Result<Arc<AssignmentIndex>> {
        if let Some(index) = self.cache().get()? {
            return Ok(index);
        }
        // The persisted artifact is the recovery source of truth; when it is
        // missing or unreadable the store itself is rescanned instead.
        match load_snapshot(&self.store) {
            Ok(Some(persisted)) => {
                let index = Arc::new(persisted);
                self.cache().set(index.clone())?;
                Ok(index)
            }
            Ok(None) => self.rebuild_locked(gate),
            Err(err) => {
                self.log_persist_warning("index.load", &err);
                self.rebuild_locked(gate)
            }
        }
    }

    fn rebuild_locked(&self, _gate: &MutexGuard<'_, ()>) -> Result<Arc<AssignmentIndex>> {
        // Previous snapshot for the equivalence check: the cached value when
        // warm, the on-disk artifact on a cold start.
        let previous = match self.cache().get()? {
            Some(index) => Some(index),
            None => load_snapshot(&self.store).ok().flatten().map(Arc::new),
        };

        // The scan and any artifact write happen outside the snapshot lock;
        // readers keep serving the previous snapshot until the swap below.
        let report: BuildReport = IndexBuilder::new(&self.store).build(previous.as_deref());
        self.log_skipped_documents(&report);

        let index = Arc::new(report.index);
        self.cache().set(index.clone())?;
        if !report.unchanged
            && let Err(err) = persist_snapshot(&self.store, &index)
        {
            // In-memory index stays authoritative; the artifact catches up
            // on the next successful persist.
            self.log_persist_warning("index.rebuild", &err);
        }
        Ok(index)
    }

    fn swap_and_persist(&self, mut working: AssignmentIndex) -> Result<IndexWriteOutcome> {
        working.last_updated = Utc::now().to_rfc3339();
        let index = Arc::new(working);
        self.cache().set(index.clone())?;

        match persist_snapshot(&self.store, &index) {
            Ok(()) => Ok(IndexWriteOutcome {
                changed: true,
                persisted: true,
                warning: None,
            }),
            Err(err) => {
                self.log_persist_warning("index.persist", &err);
                Ok(IndexWriteOutcome {
                    changed: true,
                    persisted: false,
                    warning: Some(format!("index snapshot not persisted: {err}")),
                })
            }
        }
    }
}
