use serde::{Deserialize, Serialize};

use markbook_core::models::{IndexStats, Question, Submission, TokenInfo};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub submission: Submission,
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub message: String,
    pub stats: IndexStats,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub description: String,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddWhitelistRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub tokens: Vec<TokenInfo>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
