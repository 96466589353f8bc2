#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rentroll_core::{
    config::Config,
    core::{BusinessContext, StaticMasterData},
    domain::{Business, GlAccount, Rentable, RentalAgreement},
    storage::{JsonStorage, LedgerStore},
};
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub const RULE_RENT: &str = "d 11000 _, c 41000 _";
pub const RULE_RECEIPT: &str = "d 10100 _, c 11000 _";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// A directory that outlives the calling test.
pub fn temp_base() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// One business with a unit, a tenant agreement on it and a small chart of accounts.
pub struct Fixture {
    pub business: Business,
    pub rentable: Rentable,
    pub agreement: RentalAgreement,
    pub master: StaticMasterData,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let business = Business::new("REX", "Rexford Properties");
        let rentable = Rentable::new(business.id, "Unit 101");
        let agreement = RentalAgreement::new(business.id, date(2015, 1, 1), date(2016, 1, 1))
            .with_rentable(rentable.id);
        let master = StaticMasterData::new()
            .with_business(business.clone())
            .with_rentable(rentable.clone())
            .with_rental_agreement(agreement.clone())
            .with_account(GlAccount::new(business.id, "10100", "Cash").with_alias("DFLT.CASH"))
            .with_account(GlAccount::new(business.id, "11000", "Rent Receivable"))
            .with_account(GlAccount::new(business.id, "41000", "Gross Scheduled Rent"))
            .with_account(GlAccount::new(business.id, "41100", "Late Fees"));
        Self {
            business,
            rentable,
            agreement,
            master,
            config,
        }
    }

    pub fn context(&self) -> BusinessContext {
        BusinessContext::load(Arc::new(self.master.clone()), self.business.id, &self.config)
            .expect("load business context")
    }

    pub fn memory_store(&self) -> LedgerStore {
        LedgerStore::in_memory(self.config.epsilon)
    }

    /// A store persisted as JSON under a fresh temp directory; returns the directory too.
    pub fn json_store(&self) -> (LedgerStore, PathBuf) {
        let base = temp_base();
        (self.reopen_json(&base), base)
    }

    pub fn reopen_json(&self, base: &Path) -> LedgerStore {
        let storage = JsonStorage::new(Some(base.to_path_buf()), "main", Some(3))
            .expect("create json storage backend");
        LedgerStore::open(Box::new(storage), self.config.epsilon).expect("open store")
    }
}
