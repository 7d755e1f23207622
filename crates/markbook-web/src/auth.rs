use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};

use markbook_core::MarkbookError;

use crate::WebState;
use crate::error::error_response;

/// Reject any request that does not carry a whitelisted bearer token.
pub async fn require_token_middleware(
    State(state): State<WebState>,
    request: Request,
    next: Next,
) -> Response {
    let operation = "auth.token";
    let Some(token) = bearer_token(&request) else {
        return error_response(
            MarkbookError::PermissionDenied("no API token provided".to_string()),
            operation,
            None,
        );
    };

    match state.app.tokens.verify(&token) {
        Ok(Some(_info)) => next.run(request).await,
        Ok(None) => error_response(
            MarkbookError::PermissionDenied("invalid API token".to_string()),
            operation,
            None,
        ),
        Err(err) => error_response(err, operation, None),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    let raw = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    raw.strip_prefix("Bearer ").map(str::trim).map(String::from)
}

/// Decode the `Basic` credentials of a login request.
pub fn basic_credentials(auth_header: &str) -> Option<(String, String)> {
    let encoded = auth_header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (email, password) = text.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}
