use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::IndexCache;
use crate::error::Result;
use crate::marker::{Marker, MarkerConfig};
use crate::models::{MarkedSubmission, Question, Submission};
use crate::store::AssignmentStore;
use crate::whitelist::TokenRegistry;

mod assignment_service;
mod index_service;
mod request_log;

/// Application facade: owns the document store, the index cache, the token
/// registry, and the optional marking collaborator. Cheap to clone; every
/// axum handler and CLI command goes through one of these.
#[derive(Clone)]
pub struct Markbook {
    pub store: AssignmentStore,
    pub tokens: TokenRegistry,
    marker: Option<Marker>,
    cache: Arc<IndexCache>,
}

impl std::fmt::Debug for Markbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Markbook").finish_non_exhaustive()
    }
}

impl Markbook {
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = AssignmentStore::new(root_dir);
        store.initialize()?;
        let tokens = TokenRegistry::load_or_create(&store)?;
        let marker = MarkerConfig::from_env().map(Marker::new).transpose()?;

        Ok(Self {
            store,
            tokens,
            marker,
            cache: Arc::new(IndexCache::new()),
        })
    }

    pub(crate) fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Cold-start initialization: make sure an index exists before the first
    /// request arrives (loads the persisted snapshot, or scans the store).
    pub fn initialize(&self) -> Result<()> {
        let _ = self.assignment_index()?;
        Ok(())
    }

    /// Delegate a submission to the marking collaborator. Never fails: an
    /// unreachable or unconfigured marker yields zero scores with
    /// explanatory feedback per answer.
    #[must_use]
    pub fn mark_submission(
        &self,
        questions: &[Question],
        submission: &Submission,
    ) -> MarkedSubmission {
        crate::marker::mark_submission(self.marker.as_ref(), questions, submission)
    }
}

#[cfg(test)]
mod tests;
