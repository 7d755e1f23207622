use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use markbook_core::models::{
    CreateAssignmentRequest, IndexWriteOutcome, UpdateAssignmentRequest,
};
use markbook_core::{MarkbookError, normalize_label};

use crate::WebState;
use crate::auth::basic_credentials;
use crate::dto::{
    AddWhitelistRequest, CreateTokenRequest, HealthResponse, LoginResponse, MarkRequest,
    MessageResponse, RebuildResponse, TokensResponse,
};
use crate::error::error_response;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "markbook api".to_string(),
        status: "healthy".to_string(),
    })
}

/// Exchange operator credentials for the whitelisted operator token.
/// Credentials come from the environment; with none configured the
/// endpoint is disabled outright.
pub async fn login(State(state): State<WebState>, headers: header::HeaderMap) -> Response {
    let operation = "operator.login";
    let (Ok(expected_email), Ok(expected_password)) = (
        std::env::var("MARKBOOK_OPERATOR_EMAIL"),
        std::env::var("MARKBOOK_OPERATOR_PASSWORD"),
    ) else {
        return error_response(
            MarkbookError::PermissionDenied("login is not configured".to_string()),
            operation,
            None,
        );
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(basic_credentials);
    let Some((email, password)) = presented else {
        return error_response(
            MarkbookError::PermissionDenied("basic credentials required".to_string()),
            operation,
            None,
        );
    };
    if email != expected_email || password != expected_password {
        return error_response(
            MarkbookError::PermissionDenied("invalid credentials".to_string()),
            operation,
            None,
        );
    }

    match state.app.tokens.first_with_role("operator") {
        Ok(Some(info)) => (
            StatusCode::OK,
            Json(LoginResponse {
                message: "Login successful".to_string(),
                token: info.token,
            }),
        )
            .into_response(),
        Ok(None) => error_response(
            MarkbookError::NotFound("no operator token in whitelist".to_string()),
            operation,
            None,
        ),
        Err(err) => error_response(err, operation, None),
    }
}

pub async fn list_assignments(State(state): State<WebState>) -> Response {
    match state.app.list_assignments() {
        Ok(assignments) => (StatusCode::OK, Json(assignments)).into_response(),
        Err(err) => error_response(err, "assignment.list", None),
    }
}

pub async fn get_assignment(
    State(state): State<WebState>,
    Path((subject, name)): Path<(String, String)>,
) -> Response {
    match state.app.get_assignment(&subject, &name) {
        Ok(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        Err(MarkbookError::NotFound(_)) => {
            assignment_not_found("assignment.get", &subject, &name)
        }
        Err(err) => error_response(err, "assignment.get", Some(format!("{subject}/{name}"))),
    }
}

pub async fn create_assignment(
    State(state): State<WebState>,
    Json(request): Json<CreateAssignmentRequest>,
) -> Response {
    match state.app.create_assignment(request) {
        Ok((assignment, outcome)) => {
            assignment_response(StatusCode::CREATED, &assignment, &outcome)
        }
        Err(err) => error_response(err, "assignment.create", None),
    }
}

pub async fn update_assignment(
    State(state): State<WebState>,
    Path((subject, name)): Path<(String, String)>,
    Json(updates): Json<UpdateAssignmentRequest>,
) -> Response {
    match state.app.update_assignment(&subject, &name, updates) {
        Ok((assignment, outcome)) => assignment_response(StatusCode::OK, &assignment, &outcome),
        Err(MarkbookError::NotFound(_)) => {
            assignment_not_found("assignment.update", &subject, &name)
        }
        Err(err) => error_response(err, "assignment.update", Some(format!("{subject}/{name}"))),
    }
}

pub async fn delete_assignment(
    State(state): State<WebState>,
    Path((subject, name)): Path<(String, String)>,
) -> Response {
    match state.app.delete_assignment(&subject, &name) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(MarkbookError::NotFound(_)) => {
            assignment_not_found("assignment.delete", &subject, &name)
        }
        Err(err) => error_response(err, "assignment.delete", Some(format!("{subject}/{name}"))),
    }
}

pub async fn mark_submission(
    State(state): State<WebState>,
    Json(request): Json<MarkRequest>,
) -> Response {
    if request.questions.is_empty() {
        return error_response(
            MarkbookError::Validation("questions are required".to_string()),
            "marker.mark",
            None,
        );
    }
    // The marking collaborator uses a blocking HTTP client; keep it off the
    // async worker threads.
    let app = state.app.clone();
    let task = tokio::task::spawn_blocking(move || {
        app.mark_submission(&request.questions, &request.submission)
    });
    match task.await {
        Ok(marked) => (StatusCode::OK, Json(marked)).into_response(),
        Err(err) => error_response(
            MarkbookError::Internal(format!("marking task failed: {err}")),
            "marker.mark",
            None,
        ),
    }
}

pub async fn rebuild_index(State(state): State<WebState>) -> Response {
    match state.app.rebuild_index(true) {
        Ok(index) => (
            StatusCode::OK,
            Json(RebuildResponse {
                message: "Assignment index rebuilt successfully".to_string(),
                stats: index.stats(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err, "index.rebuild", None),
    }
}

pub async fn list_tokens(State(state): State<WebState>) -> Response {
    match state.app.tokens.issued_tokens() {
        Ok(tokens) => (StatusCode::OK, Json(TokensResponse { tokens })).into_response(),
        Err(err) => error_response(err, "token.list", None),
    }
}

pub async fn create_token(
    State(state): State<WebState>,
    Json(request): Json<CreateTokenRequest>,
) -> Response {
    match state
        .app
        .tokens
        .issue(&request.description, request.allowed_roles)
    {
        Ok(info) => (StatusCode::CREATED, Json(info)).into_response(),
        Err(err) => error_response(err, "token.create", None),
    }
}

pub async fn list_whitelist(State(state): State<WebState>) -> Response {
    match state.app.tokens.whitelisted_tokens() {
        Ok(tokens) => (StatusCode::OK, Json(TokensResponse { tokens })).into_response(),
        Err(err) => error_response(err, "whitelist.list", None),
    }
}

pub async fn add_to_whitelist(
    State(state): State<WebState>,
    Json(request): Json<AddWhitelistRequest>,
) -> Response {
    match state.app.tokens.promote(&request.token) {
        Ok(info) => (StatusCode::CREATED, Json(info)).into_response(),
        Err(err) => error_response(err, "whitelist.add", None),
    }
}

pub async fn remove_from_whitelist(
    State(state): State<WebState>,
    Path(token): Path<String>,
) -> Response {
    match state.app.tokens.revoke(&token) {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Token removed from whitelist".to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err, "whitelist.remove", None),
    }
}

/// Assignment payload, with a `warning` field attached only when the
/// document was written but the index snapshot could not be persisted.
fn assignment_response(
    status: StatusCode,
    assignment: &markbook_core::models::Assignment,
    outcome: &IndexWriteOutcome,
) -> Response {
    let mut body = match serde_json::to_value(assignment) {
        Ok(value) => value,
        Err(err) => {
            return error_response(MarkbookError::from(err), "assignment.serialize", None);
        }
    };
    if let (Some(warning), Some(object)) = (&outcome.warning, body.as_object_mut()) {
        object.insert("warning".to_string(), json!(warning));
    }
    (status, Json(body)).into_response()
}

/// 404 with the normalized key values so an operator can see why a lookup
/// missed (mirrors what the index actually compares).
fn assignment_not_found(operation: &str, subject: &str, name: &str) -> Response {
    let err = MarkbookError::NotFound(format!("assignment: {subject}/{name}"));
    let mut payload = err.to_payload(operation.to_string(), Some(format!("{subject}/{name}")));
    payload.details = Some(json!({
        "subject": subject,
        "name": name,
        "normalizedSubject": normalize_label(subject),
        "normalizedName": normalize_label(name),
    }));
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}
