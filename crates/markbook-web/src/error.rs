use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use markbook_core::MarkbookError;

#[expect(
    clippy::needless_pass_by_value,
    reason = "handlers naturally own error values from `Result` and pass them through"
)]
pub fn error_response(err: MarkbookError, operation: &str, target: Option<String>) -> Response {
    let status = status_for_error(&err);
    let payload = err.to_payload(operation.to_string(), target);
    (status, Json(payload)).into_response()
}

fn status_for_error(err: &MarkbookError) -> StatusCode {
    match err {
        MarkbookError::Validation(_) => StatusCode::BAD_REQUEST,
        MarkbookError::PermissionDenied(_) => StatusCode::UNAUTHORIZED,
        MarkbookError::SecurityViolation(_) => StatusCode::FORBIDDEN,
        MarkbookError::NotFound(_) => StatusCode::NOT_FOUND,
        MarkbookError::Conflict(_) => StatusCode::CONFLICT,
        MarkbookError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND
        }
        MarkbookError::Io(_)
        | MarkbookError::Json(_)
        | MarkbookError::Http(_)
        | MarkbookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
