use std::sync::Mutex;

use super::{BookSnapshot, StorageBackend};
use crate::errors::{LedgerError, Result};

/// Keeps the last persisted snapshot in memory. Used by tests and embedders that
/// manage durability themselves.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    saved: Mutex<Option<BookSnapshot>>,
    fail_next: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `persist` call fail, simulating a crashed write.
    pub fn fail_next_persist(&self) {
        if let Ok(mut flag) = self.fail_next.lock() {
            *flag = true;
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self) -> Result<Option<BookSnapshot>> {
        let saved = self
            .saved
            .lock()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".into()))?;
        Ok(saved.clone())
    }

    fn persist(&self, snapshot: &BookSnapshot) -> Result<()> {
        let mut fail = self
            .fail_next
            .lock()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".into()))?;
        if *fail {
            *fail = false;
            return Err(LedgerError::Storage("simulated write failure".into()));
        }
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".into()))?;
        let stored = saved.as_ref().map_or(0, |current| current.generation);
        if stored != snapshot.generation.saturating_sub(1) {
            return Err(LedgerError::concurrency(format!(
                "snapshot generation {} does not follow stored generation {}",
                snapshot.generation, stored
            )));
        }
        *saved = Some(snapshot.clone());
        Ok(())
    }
}
