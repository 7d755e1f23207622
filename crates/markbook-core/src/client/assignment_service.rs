use std::time::Instant;

use chrono::Utc;

use crate::error::{MarkbookError, Result};
use crate::models::{
    Assignment, CreateAssignmentRequest, IndexWriteOutcome, UpdateAssignmentRequest,
};

use super::Markbook;

/// A mutation that changed the index but could not persist it is logged as
/// a warning; everything else is ok.
fn log_status(outcome: &IndexWriteOutcome) -> &'static str {
    if outcome.changed && !outcome.persisted {
        "warning"
    } else {
        "ok"
    }
}

impl Markbook {
    /// Every assignment the index knows about, documents included. A file
    /// that fails to read or parse yields a minimal assignment synthesized
    /// from its index entry; one broken document never empties the listing.
    pub fn list_assignments(&self) -> Result<Vec<Assignment>> {
        let index = self.assignment_index()?;
        let mut assignments = Vec::with_capacity(index.assignments.len());
        for entry in &index.assignments {
            let loaded = self
                .store
                .read_relative(&entry.path)
                .ok()
                .and_then(|raw| serde_json::from_str::<Assignment>(&raw).ok());
            assignments.push(loaded.unwrap_or_else(|| Assignment {
                id: entry.id.clone(),
                name: entry.name.clone(),
                subject: entry.subject.clone(),
                questions: Vec::new(),
                created_at: Some(entry.updated_at.clone()),
                updated_at: Some(entry.updated_at.clone()),
            }));
        }
        Ok(assignments)
    }

    pub fn get_assignment(&self, subject: &str, name: &str) -> Result<Assignment> {
        let entry = self
            .find_assignment(subject, name)?
            .ok_or_else(|| MarkbookError::NotFound(format!("assignment: {subject}/{name}")))?;
        let raw = self.store.read_relative(&entry.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn create_assignment(
        &self,
        request: CreateAssignmentRequest,
    ) -> Result<(Assignment, IndexWriteOutcome)> {
        let started = Instant::now();
        if request.name.trim().is_empty() || request.subject.trim().is_empty() {
            return Err(MarkbookError::Validation(
                "assignment name and subject are required".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let assignment = Assignment {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.clone(),
            subject: request.subject.clone(),
            questions: request.questions,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };

        let file_name = format!("{}.json", assignment.name);
        let target = format!("{}/{}", assignment.subject, assignment.name);
        let result = (|| -> Result<(Assignment, IndexWriteOutcome)> {
            let serialized = serde_json::to_string_pretty(&assignment)?;
            self.store
                .write_document(&assignment.subject, &file_name, &serialized)?;
            let outcome = self.upsert_index_entry(&assignment, &assignment.subject, &file_name)?;
            Ok((assignment.clone(), outcome))
        })();

        match &result {
            Ok((created, outcome)) => self.log_request_status(
                "assignment.create",
                log_status(outcome),
                started,
                Some(target),
                Some(serde_json::json!({"id": created.id})),
            ),
            Err(err) => self.log_request_error("assignment.create", started, Some(target), err),
        }
        result
    }

    /// Update in place: the document keeps the path its index entry points
    /// at, even when the update renames the assignment in its body.
    pub fn update_assignment(
        &self,
        subject: &str,
        name: &str,
        updates: UpdateAssignmentRequest,
    ) -> Result<(Assignment, IndexWriteOutcome)> {
        let started = Instant::now();
        let target = format!("{subject}/{name}");
        let result = (|| -> Result<(Assignment, IndexWriteOutcome)> {
            let entry = self.find_assignment(subject, name)?.ok_or_else(|| {
                MarkbookError::NotFound(format!("assignment: {subject}/{name}"))
            })?;

            let raw = self.store.read_relative(&entry.path)?;
            let mut assignment: Assignment = serde_json::from_str(&raw)?;
            if let Some(new_name) = updates.name {
                assignment.name = new_name;
            }
            if let Some(new_subject) = updates.subject {
                assignment.subject = new_subject;
            }
            if let Some(questions) = updates.questions {
                assignment.questions = questions;
            }
            assignment.updated_at = Some(Utc::now().to_rfc3339());

            let file_name = entry
                .path
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            let serialized = serde_json::to_string_pretty(&assignment)?;
            self.store
                .write_document(&entry.subject, &file_name, &serialized)?;
            let outcome = self.upsert_index_entry(&assignment, &entry.subject, &file_name)?;
            Ok((assignment, outcome))
        })();

        match &result {
            Ok((_, outcome)) => self.log_request_status(
                "assignment.update",
                log_status(outcome),
                started,
                Some(target),
                None,
            ),
            Err(err) => self.log_request_error("assignment.update", started, Some(target), err),
        }
        result
    }

    pub fn delete_assignment(&self, subject: &str, name: &str) -> Result<IndexWriteOutcome> {
        let started = Instant::now();
        let target = format!("{subject}/{name}");
        let result = (|| -> Result<IndexWriteOutcome> {
            let entry = self.find_assignment(subject, name)?.ok_or_else(|| {
                MarkbookError::NotFound(format!("assignment: {subject}/{name}"))
            })?;

            let file_name = entry.path.rsplit('/').next().unwrap_or_default();
            self.store.delete_document(&entry.subject, file_name)?;
            self.remove_index_entry(subject, name)
        })();

        match &result {
            Ok(outcome) => self.log_request_status(
                "assignment.delete",
                log_status(outcome),
                started,
                Some(target),
                None,
            ),
            Err(err) => self.log_request_error("assignment.delete", started, Some(target), err),
        }
        result
    }
}
