pub mod book;
pub mod json_backend;
pub mod memory;
pub mod store;

use crate::errors::Result;

pub use book::{Book, BookSnapshot, BOOK_SCHEMA_VERSION};
pub use json_backend::JsonStorage;
pub use memory::MemoryStorage;
pub use store::LedgerStore;

/// Durable home for a book's snapshot.
pub trait StorageBackend: Send + Sync {
    /// Returns the last persisted snapshot, or `None` for a book never saved.
    fn load(&self) -> Result<Option<BookSnapshot>>;

    /// Replaces the persisted snapshot. Must be all-or-nothing.
    fn persist(&self, snapshot: &BookSnapshot) -> Result<()>;
}
