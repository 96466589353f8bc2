#![doc(test(attr(deny(warnings))))]

//! Rentroll Core is the ledger checkpoint-and-statement engine of a rental-property
//! accounting system. It expands recurring assessments, posts balanced journals from
//! assessments and receipts, checkpoints account balances into markers and answers
//! balance and statement queries from the nearest marker plus the activity since.

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

pub use errors::{LedgerError, Result};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup debug log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::debug!("Rentroll Core tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
