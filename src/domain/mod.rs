pub mod account;
pub mod assessment;
pub mod common;
pub mod journal;
pub mod ledger;
pub mod marker;
pub mod property;
pub mod receipt;
pub mod statement;

pub use account::{AccountKey, GlAccount};
pub use assessment::{Assessment, Frequency, Proration};
pub use common::{amounts_match, round_cents, DateWindow, Identifiable};
pub use journal::{EntryKind, Journal, JournalAllocation, JournalMarker, JournalSource, PostingKey};
pub use ledger::LedgerEntry;
pub use marker::{LedgerMarker, MarkerState};
pub use property::{Business, Rentable, RentalAgreement};
pub use receipt::{Receipt, ReceiptAllocation};
pub use statement::{LedgerLine, Statement, StatementEntry};
