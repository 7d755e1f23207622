use std::time::Instant;

use chrono::Utc;

use crate::error::{MarkbookError, Result};
use crate::index::BuildReport;
use crate::jsonl::parse_jsonl_tolerant;
use crate::models::RequestLogEntry;
use crate::store::REQUEST_LOG_FILE;

use super::Markbook;

impl Markbook {
    /// Best effort by design: a full log disk must never fail the request
    /// being logged.
    pub(super) fn try_log_request(&self, entry: &RequestLogEntry) {
        if let Ok(serialized) = serde_json::to_string(entry) {
            let mut line = serialized;
            line.push('\n');
            let _ = self.store.append_root_file(REQUEST_LOG_FILE, &line);
        }
    }

    pub(super) fn log_request_status(
        &self,
        operation: &str,
        status: &str,
        started: Instant,
        target: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        self.try_log_request(&RequestLogEntry {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            status: status.to_string(),
            latency_ms: started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            target,
            error_code: None,
            error_message: None,
            details,
        });
    }

    pub(super) fn log_request_error(
        &self,
        operation: &str,
        started: Instant,
        target: Option<String>,
        err: &MarkbookError,
    ) {
        self.try_log_request(&RequestLogEntry {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            status: "error".to_string(),
            latency_ms: started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            target,
            error_code: Some(err.code().to_string()),
            error_message: Some(err.to_string()),
            details: None,
        });
    }

    pub(super) fn log_persist_warning(&self, operation: &str, err: &MarkbookError) {
        self.try_log_request(&RequestLogEntry {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            status: "warning".to_string(),
            latency_ms: 0,
            created_at: Utc::now().to_rfc3339(),
            target: None,
            error_code: Some(err.code().to_string()),
            error_message: Some(err.to_string()),
            details: None,
        });
    }

    /// One warning line per skipped document so an operator can see what a
    /// scan left out and why.
    pub(super) fn log_skipped_documents(&self, report: &BuildReport) {
        for skip in &report.skipped {
            self.try_log_request(&RequestLogEntry {
                request_id: uuid::Uuid::new_v4().to_string(),
                operation: "index.scan".to_string(),
                status: "warning".to_string(),
                latency_ms: 0,
                created_at: Utc::now().to_rfc3339(),
                target: Some(skip.path.clone()),
                error_code: None,
                error_message: Some(skip.reason.clone()),
                details: None,
            });
        }
    }

    /// Most recent request log entries, newest first.
    pub fn list_request_logs(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        let Some(raw) = self.store.read_root_file(REQUEST_LOG_FILE)? else {
            return Ok(Vec::new());
        };
        let mut entries = parse_jsonl_tolerant::<RequestLogEntry>(&raw).items;
        entries.reverse();
        entries.truncate(limit.max(1));
        Ok(entries)
    }
}
