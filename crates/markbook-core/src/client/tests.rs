use tempfile::tempdir;

use crate::error::MarkbookError;
use crate::models::{CreateAssignmentRequest, Question, UpdateAssignmentRequest};
use crate::store::INDEX_FILE;

use super::Markbook;

fn question(id: &str, marks: u32) -> Question {
    Question {
        id: id.to_string(),
        text: format!("question {id}"),
        answer: format!("answer {id}"),
        marks,
    }
}

fn app() -> (tempfile::TempDir, Markbook) {
    let temp = tempdir().expect("tempdir");
    let app = Markbook::new(temp.path()).expect("app");
    // Warm the cache the way server startup does.
    app.initialize().expect("init");
    (temp, app)
}

fn seeded_app() -> (tempfile::TempDir, Markbook) {
    let (temp, app) = app();
    app.store
        .write_document(
            "Mathematics",
            "Basic Math Test.json",
            r#"{"id":"1","name":"Basic Math Test","subject":"Mathematics","questions":[{"id":"1","text":"a","answer":"b","marks":5},{"id":"2","text":"c","answer":"d","marks":10},{"id":"3","text":"e","answer":"f","marks":8}],"updatedAt":"2024-01-01T00:00:00Z"}"#,
        )
        .expect("seed math");
    app.store
        .write_document(
            "Science",
            "Intro Quiz.json",
            r#"{"id":"2","name":"Intro Quiz","subject":"Science","questions":[{"id":"1","text":"a","answer":"b","marks":2},{"id":"2","text":"c","answer":"d","marks":3}],"updatedAt":"2024-01-02T00:00:00Z"}"#,
        )
        .expect("seed science");
    (temp, app)
}

#[test]
fn forced_rebuild_indexes_seeded_tree() {
    let (_temp, app) = seeded_app();
    let index = app.rebuild_index(true).expect("rebuild");
    assert_eq!(index.subjects.len(), 2);
    assert_eq!(index.assignments.len(), 2);
}

#[test]
fn lookup_is_case_and_whitespace_insensitive() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");

    let entry = app
        .find_assignment("MATHEMATICS", "basic  math   test")
        .expect("lookup")
        .expect("entry");
    assert_eq!(entry.name, "Basic Math Test");
    assert_eq!(entry.question_count, 3);
    assert_eq!(entry.path, "/Mathematics/Basic Math Test.json");
}

#[test]
fn lookup_by_id_finds_the_same_entry() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");

    let by_id = app
        .find_assignment_by_id("2")
        .expect("lookup")
        .expect("entry");
    assert_eq!(by_id.name, "Intro Quiz");
    assert!(app.find_assignment_by_id("ghost").expect("lookup").is_none());
}

#[test]
fn missing_entry_is_none_not_an_error() {
    let (_temp, app) = seeded_app();
    assert!(
        app.find_assignment("Mathematics", "No Such Test")
            .expect("lookup")
            .is_none()
    );
}

#[test]
fn unforced_rebuild_returns_cached_snapshot() {
    let (_temp, app) = seeded_app();
    let first = app.rebuild_index(true).expect("rebuild");

    app.store
        .write_document("History", "New Doc.json", r#"{"id":"9"}"#)
        .expect("write behind the cache");
    let second = app.rebuild_index(false).expect("cached");
    assert_eq!(second.assignments.len(), first.assignments.len());

    let third = app.rebuild_index(true).expect("forced");
    assert_eq!(third.assignments.len(), first.assignments.len() + 1);
}

#[test]
fn cold_start_prefers_persisted_snapshot_over_rescan() {
    let temp = tempdir().expect("tempdir");
    {
        let app = Markbook::new(temp.path()).expect("app");
        app.store
            .write_document("Science", "Intro Quiz.json", r#"{"id":"2"}"#)
            .expect("seed");
        app.rebuild_index(true).expect("rebuild");
    }

    // New process: the document is gone from disk but the artifact remains
    // authoritative until the next rebuild.
    let app = Markbook::new(temp.path()).expect("app");
    app.store
        .delete_document("Science", "Intro Quiz.json")
        .expect("delete behind the index");
    let index = app.assignment_index().expect("index");
    assert_eq!(index.assignments.len(), 1);
}

#[test]
fn corrupt_snapshot_artifact_falls_back_to_rescan() {
    let temp = tempdir().expect("tempdir");
    {
        let app = Markbook::new(temp.path()).expect("app");
        app.store
            .write_document("Science", "Intro Quiz.json", r#"{"id":"2"}"#)
            .expect("seed");
        app.rebuild_index(true).expect("rebuild");
    }

    std::fs::write(temp.path().join("assignments-index.json"), "{ broken")
        .expect("corrupt artifact");
    let app = Markbook::new(temp.path()).expect("app");
    let index = app.assignment_index().expect("index");
    assert_eq!(index.assignments.len(), 1);
    assert!(index.find_by_key("science", "intro-quiz").is_some());
}

#[test]
fn create_then_lookup_round_trips() {
    let (_temp, app) = app();
    let (created, outcome) = app
        .create_assignment(CreateAssignmentRequest {
            name: "Algebra Basics".to_string(),
            subject: "Mathematics".to_string(),
            questions: vec![question("1", 5), question("2", 10)],
        })
        .expect("create");
    assert!(outcome.changed);
    assert!(outcome.persisted);

    let entry = app
        .find_assignment("mathematics", "ALGEBRA  BASICS")
        .expect("lookup")
        .expect("entry");
    assert_eq!(entry.id, created.id);
    assert_eq!(entry.question_count, 2);
    assert_eq!(entry.path, "/Mathematics/Algebra Basics.json");

    let loaded = app
        .get_assignment("Mathematics", "Algebra Basics")
        .expect("get");
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.questions.len(), 2);
}

#[test]
fn upsert_for_new_subject_adds_exactly_one_subject_entry() {
    let (_temp, app) = seeded_app();
    let before = app.rebuild_index(true).expect("rebuild").subjects.len();

    app.create_assignment(CreateAssignmentRequest {
        name: "Ancient Rome".to_string(),
        subject: "History".to_string(),
        questions: vec![question("1", 4)],
    })
    .expect("create");

    let index = app.assignment_index().expect("index");
    assert_eq!(index.subjects.len(), before + 1);
    assert!(index.has_subject("history"));
}

#[test]
fn identical_double_upsert_does_not_bump_last_updated() {
    let (_temp, app) = app();
    let (created, _) = app
        .create_assignment(CreateAssignmentRequest {
            name: "Quiz".to_string(),
            subject: "Science".to_string(),
            questions: vec![question("1", 2)],
        })
        .expect("create");

    let stamp_after_create = app.assignment_index().expect("index").last_updated.clone();
    let outcome = app
        .upsert_index_entry(&created, "Science", "Quiz.json")
        .expect("upsert");
    assert!(!outcome.changed);
    assert_eq!(
        app.assignment_index().expect("index").last_updated,
        stamp_after_create
    );
}

#[test]
fn remove_then_lookup_is_none_and_second_remove_is_noop() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");

    let outcome = app.delete_assignment("Science", "Intro Quiz").expect("delete");
    assert!(outcome.changed);
    assert!(
        app.find_assignment("Science", "Intro Quiz")
            .expect("lookup")
            .is_none()
    );

    let stamp = app.assignment_index().expect("index").last_updated.clone();
    let second = app
        .remove_index_entry("Science", "Intro Quiz")
        .expect("second remove");
    assert!(!second.changed);
    assert_eq!(app.assignment_index().expect("index").last_updated, stamp);
}

#[test]
fn delete_unknown_assignment_is_not_found() {
    let (_temp, app) = seeded_app();
    let err = app
        .delete_assignment("Science", "Ghost Quiz")
        .expect_err("must fail");
    assert!(matches!(err, MarkbookError::NotFound(_)));
}

#[test]
fn update_changes_document_and_index_in_step() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");

    let (updated, outcome) = app
        .update_assignment(
            "Science",
            "Intro Quiz",
            UpdateAssignmentRequest {
                questions: Some(vec![question("1", 2)]),
                ..UpdateAssignmentRequest::default()
            },
        )
        .expect("update");
    assert!(outcome.changed);
    assert_eq!(updated.questions.len(), 1);

    let entry = app
        .find_assignment("Science", "Intro Quiz")
        .expect("lookup")
        .expect("entry");
    assert_eq!(entry.question_count, 1);
    // The document stays at the path the index already knew.
    assert_eq!(entry.path, "/Science/Intro Quiz.json");
}

#[test]
fn corrupt_document_between_rebuilds_is_skipped() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("first rebuild");

    app.store
        .write_document("Science", "Intro Quiz.json", "%% not json %%")
        .expect("corrupt");
    let index = app.rebuild_index(true).expect("second rebuild");
    assert_eq!(index.assignments.len(), 1);
    assert!(index.find_by_key("mathematics", "basic-math-test").is_some());
    assert!(index.find_by_key("science", "intro-quiz").is_none());
}

#[test]
fn listing_tolerates_unreadable_document() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");
    app.store
        .write_document("Science", "Intro Quiz.json", "%% not json %%")
        .expect("corrupt after indexing");

    let assignments = app.list_assignments().expect("list");
    assert_eq!(assignments.len(), 2);
    let fallback = assignments
        .iter()
        .find(|a| a.name == "Intro Quiz")
        .expect("fallback entry");
    assert!(fallback.questions.is_empty());
}

#[test]
fn mutations_persist_the_snapshot_artifact() {
    let (_temp, app) = app();
    app.create_assignment(CreateAssignmentRequest {
        name: "Quiz".to_string(),
        subject: "Science".to_string(),
        questions: vec![question("1", 2)],
    })
    .expect("create");

    let raw = app
        .store
        .read_root_file(INDEX_FILE)
        .expect("read")
        .expect("artifact exists");
    assert!(raw.contains("\"normalizedName\": \"quiz\""));
}

#[test]
fn mutation_log_lines_reach_the_request_log() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");
    app.delete_assignment("Science", "Intro Quiz").expect("delete");

    let logs = app.list_request_logs(10).expect("logs");
    assert!(logs.iter().any(|l| l.operation == "assignment.delete"));
    assert!(logs.iter().any(|l| l.operation == "index.rebuild"));
}

#[test]
fn concurrent_lookups_during_forced_rebuild_serve_a_snapshot() {
    let (_temp, app) = seeded_app();
    app.rebuild_index(true).expect("rebuild");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let app = app.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..25 {
                let entry = app
                    .find_assignment("Mathematics", "Basic Math Test")
                    .expect("lookup");
                assert!(entry.is_some());
            }
        }));
    }
    for _ in 0..4 {
        app.rebuild_index(true).expect("rebuild under load");
    }
    for handle in handles {
        handle.join().expect("join");
    }
}
