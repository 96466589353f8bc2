use std::sync::{Arc, Mutex, RwLock};

use super::{Book, MemoryStorage, StorageBackend};
use crate::errors::{LedgerError, Result};

/// Shared handle over a [`Book`] and the backend that persists it.
///
/// Readers grab an immutable `Arc<Book>` snapshot and never wait on writers. Writers are
/// serialized by a single lock, work on a private clone, and publish it only after the
/// invariants hold and the backend accepted the new snapshot.
pub struct LedgerStore {
    state: RwLock<Arc<Book>>,
    writer: Mutex<()>,
    backend: Box<dyn StorageBackend>,
    epsilon: f64,
}

impl LedgerStore {
    pub fn open(backend: Box<dyn StorageBackend>, epsilon: f64) -> Result<Self> {
        let book = match backend.load()? {
            Some(snapshot) => {
                let book = Book::from_snapshot(snapshot)?;
                book.verify(epsilon)?;
                book
            }
            None => Book::new(),
        };
        tracing::debug!(
            journals = book.journal_count(),
            entries = book.entry_count(),
            markers = book.marker_count(),
            "book opened"
        );
        Ok(Self {
            state: RwLock::new(Arc::new(book)),
            writer: Mutex::new(()),
            backend,
            epsilon,
        })
    }

    pub fn in_memory(epsilon: f64) -> Self {
        Self {
            state: RwLock::new(Arc::new(Book::new())),
            writer: Mutex::new(()),
            backend: Box::new(MemoryStorage::new()),
            epsilon,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// A consistent, read-only view of the book as of the last commit.
    pub fn snapshot(&self) -> Result<Arc<Book>> {
        let guard = self
            .state
            .read()
            .map_err(|_| LedgerError::concurrency("book state lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }

    /// Runs `work` against a staged copy of the book and commits it atomically.
    ///
    /// If `work` fails, the invariants do not hold afterwards, or the backend cannot
    /// persist, nothing is published and the error is returned. A backend that holds a
    /// newer generation than this store last saw answers with a concurrency error.
    pub fn transact<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Book) -> Result<T>,
    {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| LedgerError::concurrency("book writer lock poisoned"))?;
        let mut staged = (*self.snapshot()?).clone();
        let value = work(&mut staged)?;
        staged.verify(self.epsilon)?;
        staged.advance_generation();
        self.backend.persist(&staged.to_snapshot())?;
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::concurrency("book state lock poisoned"))?;
        *state = Arc::new(staged);
        Ok(value)
    }
}
