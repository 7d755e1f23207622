use serde::{Deserialize, Serialize};

use crate::normalize::normalize_label;

/// One question inside an assignment document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub answer: String,
    pub marks: u32,
}

/// An assignment document as stored on disk, one JSON file per assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignmentRequest {
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAssignmentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<Question>>,
}

/// One indexed assignment: where the document lives plus the metadata the
/// operator listing needs without opening the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEntry {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub subject: String,
    pub normalized_subject: String,
    pub path: String,
    pub updated_at: String,
    pub question_count: usize,
}

impl AssignmentEntry {
    /// The lookup key this entry occupies. At most one entry per key may
    /// exist in a snapshot.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.normalized_subject, &self.normalized_name)
    }

    /// True when any field the incremental path tracks differs. An entry
    /// that compares equal here must not be rewritten: replacing it would
    /// bump `lastUpdated` and force a snapshot write for nothing.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.id != other.id
            || self.updated_at != other.updated_at
            || self.question_count != other.question_count
            || self.path != other.path
    }
}

/// One subject directory observed in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectEntry {
    pub id: String,
    pub name: String,
    pub path: String,
}

impl SubjectEntry {
    #[must_use]
    pub fn from_label(subject: &str) -> Self {
        Self {
            id: normalize_label(subject),
            name: subject.to_string(),
            path: format!("/{subject}"),
        }
    }
}

/// The persisted snapshot of the whole index. Field names are wire-stable:
/// existing `assignments-index.json` files must load unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentIndex {
    pub assignments: Vec<AssignmentEntry>,
    pub subjects: Vec<SubjectEntry>,
    pub last_updated: String,
}

impl AssignmentIndex {
    #[must_use]
    pub fn empty(now: String) -> Self {
        Self {
            assignments: Vec::new(),
            subjects: Vec::new(),
            last_updated: now,
        }
    }

    #[must_use]
    pub fn find_by_key(
        &self,
        normalized_subject: &str,
        normalized_name: &str,
    ) -> Option<&AssignmentEntry> {
        self.assignments
            .iter()
            .find(|a| a.key() == (normalized_subject, normalized_name))
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&AssignmentEntry> {
        self.assignments.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn has_subject(&self, normalized_subject: &str) -> bool {
        self.subjects.iter().any(|s| s.id == normalized_subject)
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            assignments: self.assignments.len(),
            subjects: self.subjects.len(),
            last_updated: self.last_updated.clone(),
        }
    }
}

/// Summary counts returned by the administrative rebuild trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub assignments: usize,
    pub subjects: usize,
    pub last_updated: String,
}

/// Result of an index mutation. A failed snapshot write is a warning, not a
/// rollback: the in-memory index stays ahead of disk until the next
/// successful persist.
#[derive(Debug, Clone, Serialize)]
pub struct IndexWriteOutcome {
    pub changed: bool,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl IndexWriteOutcome {
    #[must_use]
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            persisted: false,
            warning: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub id: String,
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkingResult {
    pub question_id: String,
    pub score: u32,
    pub max_marks: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedSubmission {
    pub submission_id: String,
    pub results: Vec<MarkingResult>,
    pub total_score: u32,
    pub max_score: u32,
    pub feedback: String,
    pub marked_at: String,
}

/// One whitelisted API token. Snake-case field names match the
/// `whitelist.json` files already in the field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: String,
    pub description: String,
    pub allowed_roles: Vec<String>,
    pub created_at: String,
}

impl TokenInfo {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.allowed_roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhitelistDocument {
    #[serde(default)]
    pub tokens: Vec<TokenInfo>,
}

/// One line of the operational request log (JSONL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub request_id: String,
    pub operation: String,
    pub status: String,
    pub latency_ms: u128,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_entry_serializes_with_wire_field_names() {
        let entry = AssignmentEntry {
            id: "1".to_string(),
            name: "Basic Math Test".to_string(),
            normalized_name: "basic-math-test".to_string(),
            subject: "Mathematics".to_string(),
            normalized_subject: "mathematics".to_string(),
            path: "/Mathematics/Basic Math Test.json".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            question_count: 3,
        };
        let value = serde_json::to_value(&entry).expect("serialize entry");
        assert!(value.get("normalizedName").is_some());
        assert!(value.get("normalizedSubject").is_some());
        assert!(value.get("questionCount").is_some());
        assert!(value.get("updatedAt").is_some());
    }

    #[test]
    fn index_serializes_last_updated_camel_case() {
        let index = AssignmentIndex::empty("2024-01-01T00:00:00Z".to_string());
        let value = serde_json::to_value(&index).expect("serialize index");
        assert!(value.get("lastUpdated").is_some());
        assert!(value.get("assignments").is_some());
        assert!(value.get("subjects").is_some());
    }

    #[test]
    fn assignment_parses_without_optional_timestamps() {
        let raw = r#"{"id":"1","name":"Quiz","subject":"Science","questions":[]}"#;
        let assignment: Assignment = serde_json::from_str(raw).expect("parse assignment");
        assert!(assignment.created_at.is_none());
        assert!(assignment.updated_at.is_none());
    }

    #[test]
    fn differs_from_tracks_only_indexed_fields() {
        let a = AssignmentEntry {
            id: "1".to_string(),
            name: "Quiz".to_string(),
            normalized_name: "quiz".to_string(),
            subject: "Science".to_string(),
            normalized_subject: "science".to_string(),
            path: "/Science/Quiz.json".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            question_count: 2,
        };
        let same = a.clone();
        assert!(!a.differs_from(&same));

        let mut bumped = a.clone();
        bumped.question_count = 3;
        assert!(a.differs_from(&bumped));
    }
}
