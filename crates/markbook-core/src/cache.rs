use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::error::{MarkbookError, Result};
use crate::models::AssignmentIndex;

/// Process-wide holder of the current snapshot.
///
/// Readers clone the `Arc` under a short read lock and keep serving that
/// snapshot for as long as they need it. Mutations (upsert, remove, rebuild)
/// serialize on the gate, do their file I/O against a local working copy,
/// and only the final reference swap takes the write lock. A rebuild can
/// therefore run while requests continue against the previous snapshot.
#[derive(Debug, Default)]
pub(crate) struct IndexCache {
    snapshot: RwLock<Option<Arc<AssignmentIndex>>>,
    mutation_gate: Mutex<()>,
}

impl IndexCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self) -> Result<Option<Arc<AssignmentIndex>>> {
        Ok(self
            .snapshot
            .read()
            .map_err(|_| MarkbookError::lock_poisoned("index snapshot"))?
            .clone())
    }

    pub(crate) fn set(&self, index: Arc<AssignmentIndex>) -> Result<()> {
        *self
            .snapshot
            .write()
            .map_err(|_| MarkbookError::lock_poisoned("index snapshot"))? = Some(index);
        Ok(())
    }

    /// Serialize mutations. The guard must be held across the whole
    /// copy-mutate-persist-swap sequence, never across plain lookups.
    pub(crate) fn lock_mutations(&self) -> Result<MutexGuard<'_, ()>> {
        self.mutation_gate
            .lock()
            .map_err(|_| MarkbookError::lock_poisoned("index mutation gate"))
    }
}
