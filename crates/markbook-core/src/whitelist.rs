use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{MarkbookError, Result};
use crate::models::{TokenInfo, WhitelistDocument};
use crate::store::{AssignmentStore, WHITELIST_FILE};

/// API tokens in two stages: issued (known, in memory) and whitelisted
/// (authorized, persisted to `whitelist.json`). Only whitelisted tokens
/// pass verification; issuing a token grants nothing until it is promoted.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    store: AssignmentStore,
    issued: Arc<RwLock<Vec<TokenInfo>>>,
    whitelist: Arc<RwLock<Vec<TokenInfo>>>,
}

impl TokenRegistry {
    /// Load the persisted whitelist, bootstrapping a fresh one with a single
    /// generated operator token when no file exists yet.
    pub fn load_or_create(store: &AssignmentStore) -> Result<Self> {
        let whitelist = match store.read_root_file(WHITELIST_FILE)? {
            Some(raw) => serde_json::from_str::<WhitelistDocument>(&raw)?.tokens,
            None => {
                let bootstrap = vec![TokenInfo {
                    token: generate_token(),
                    description: "Operator frontend token".to_string(),
                    allowed_roles: vec!["operator".to_string()],
                    created_at: Utc::now().to_rfc3339(),
                }];
                persist(store, &bootstrap)?;
                bootstrap
            }
        };

        Ok(Self {
            store: store.clone(),
            issued: Arc::new(RwLock::new(Vec::new())),
            whitelist: Arc::new(RwLock::new(whitelist)),
        })
    }

    /// Look a bearer token up in the whitelist. Absence is a normal `None`.
    pub fn verify(&self, token: &str) -> Result<Option<TokenInfo>> {
        let whitelist = self
            .whitelist
            .read()
            .map_err(|_| MarkbookError::lock_poisoned("whitelist"))?;
        Ok(whitelist.iter().find(|t| t.token == token).cloned())
    }

    pub fn whitelisted_tokens(&self) -> Result<Vec<TokenInfo>> {
        Ok(self
            .whitelist
            .read()
            .map_err(|_| MarkbookError::lock_poisoned("whitelist"))?
            .clone())
    }

    pub fn issued_tokens(&self) -> Result<Vec<TokenInfo>> {
        Ok(self
            .issued
            .read()
            .map_err(|_| MarkbookError::lock_poisoned("issued tokens"))?
            .clone())
    }

    /// Mint a new token. It is known but not yet authorized.
    pub fn issue(&self, description: &str, allowed_roles: Vec<String>) -> Result<TokenInfo> {
        if description.trim().is_empty() || allowed_roles.is_empty() {
            return Err(MarkbookError::Validation(
                "token description and roles are required".to_string(),
            ));
        }
        let info = TokenInfo {
            token: generate_token(),
            description: description.to_string(),
            allowed_roles,
            created_at: Utc::now().to_rfc3339(),
        };
        self.issued
            .write()
            .map_err(|_| MarkbookError::lock_poisoned("issued tokens"))?
            .push(info.clone());
        Ok(info)
    }

    /// Promote an issued token into the persisted whitelist.
    pub fn promote(&self, token: &str) -> Result<TokenInfo> {
        let info = {
            let issued = self
                .issued
                .read()
                .map_err(|_| MarkbookError::lock_poisoned("issued tokens"))?;
            issued
                .iter()
                .find(|t| t.token == token)
                .cloned()
                .ok_or_else(|| MarkbookError::NotFound("token was never issued".to_string()))?
        };

        let snapshot = {
            let mut whitelist = self
                .whitelist
                .write()
                .map_err(|_| MarkbookError::lock_poisoned("whitelist"))?;
            if whitelist.iter().any(|t| t.token == token) {
                return Err(MarkbookError::Conflict(
                    "token already whitelisted".to_string(),
                ));
            }
            whitelist.push(info.clone());
            whitelist.clone()
        };
        persist(&self.store, &snapshot)?;
        Ok(info)
    }

    /// Remove a token from the whitelist. Unknown tokens are NotFound.
    pub fn revoke(&self, token: &str) -> Result<()> {
        let snapshot = {
            let mut whitelist = self
                .whitelist
                .write()
                .map_err(|_| MarkbookError::lock_poisoned("whitelist"))?;
            let before = whitelist.len();
            whitelist.retain(|t| t.token != token);
            if whitelist.len() == before {
                return Err(MarkbookError::NotFound(
                    "token not found in whitelist".to_string(),
                ));
            }
            whitelist.clone()
        };
        persist(&self.store, &snapshot)
    }

    /// First whitelisted token carrying the given role, used by login to
    /// hand the operator frontend its credential.
    pub fn first_with_role(&self, role: &str) -> Result<Option<TokenInfo>> {
        let whitelist = self
            .whitelist
            .read()
            .map_err(|_| MarkbookError::lock_poisoned("whitelist"))?;
        Ok(whitelist.iter().find(|t| t.has_role(role)).cloned())
    }
}

fn persist(store: &AssignmentStore, tokens: &[TokenInfo]) -> Result<()> {
    let document = WhitelistDocument {
        tokens: tokens.to_vec(),
    };
    let serialized = serde_json::to_string_pretty(&document)?;
    store.write_root_file(WHITELIST_FILE, &serialized)
}

fn generate_token() -> String {
    format!("mk-{}", Uuid::new_v4().simple())
}
