//! Read-only lookups a batch run or query needs about one business.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Business, GlAccount, Identifiable, Rentable, RentalAgreement};
use crate::errors::{LedgerError, Result};
use crate::ledger::{AccountRef, AccountResolver, PostingLeg, PostingRule};

/// Master data owned outside the ledger engine.
pub trait MasterData: Send + Sync {
    fn business(&self, id: Uuid) -> Result<Business>;
    fn rentable(&self, id: Uuid) -> Result<Rentable>;
    fn rental_agreement(&self, id: Uuid) -> Result<RentalAgreement>;
    fn accounts(&self, business_id: Uuid) -> Result<Vec<GlAccount>>;
}

/// Master data held in memory, loadable from a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticMasterData {
    pub businesses: Vec<Business>,
    pub rentables: Vec<Rentable>,
    pub rental_agreements: Vec<RentalAgreement>,
    pub accounts: Vec<GlAccount>,
}

impl StaticMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|err| {
            LedgerError::not_found(format!("master data {}: {}", path.display(), err))
        })?;
        serde_json::from_str(&data).map_err(|err| {
            LedgerError::validation(format!("master data {}: {}", path.display(), err))
        })
    }

    pub fn with_business(mut self, business: Business) -> Self {
        self.businesses.push(business);
        self
    }

    pub fn with_rentable(mut self, rentable: Rentable) -> Self {
        self.rentables.push(rentable);
        self
    }

    pub fn with_rental_agreement(mut self, agreement: RentalAgreement) -> Self {
        self.rental_agreements.push(agreement);
        self
    }

    pub fn with_account(mut self, account: GlAccount) -> Self {
        self.accounts.push(account);
        self
    }
}

impl MasterData for StaticMasterData {
    fn business(&self, id: Uuid) -> Result<Business> {
        find_by_id(&self.businesses, id, "business")
    }

    fn rentable(&self, id: Uuid) -> Result<Rentable> {
        find_by_id(&self.rentables, id, "rentable")
    }

    fn rental_agreement(&self, id: Uuid) -> Result<RentalAgreement> {
        find_by_id(&self.rental_agreements, id, "rental agreement")
    }

    fn accounts(&self, business_id: Uuid) -> Result<Vec<GlAccount>> {
        Ok(self
            .accounts
            .iter()
            .filter(|acct| acct.business_id == business_id)
            .cloned()
            .collect())
    }
}

fn find_by_id<T: Identifiable + Clone>(items: &[T], id: Uuid, what: &str) -> Result<T> {
    items
        .iter()
        .find(|item| item.id() == id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found(format!("{} {}", what, id)))
}

/// Everything the engine needs to know about one business for the duration of a run.
///
/// Built fresh from [`MasterData`] per run and never mutated; to pick up master-data
/// changes, load a new one.
#[derive(Clone)]
pub struct BusinessContext {
    business: Business,
    accounts: HashMap<String, GlAccount>,
    aliases: HashMap<String, String>,
    master: Arc<dyn MasterData>,
    config: Config,
}

impl BusinessContext {
    pub fn load(master: Arc<dyn MasterData>, business_id: Uuid, config: &Config) -> Result<Self> {
        let business = master.business(business_id)?;
        let mut accounts = HashMap::new();
        let mut aliases = HashMap::new();
        for account in master.accounts(business_id)? {
            if let Some(alias) = &account.alias {
                aliases.insert(alias.clone(), account.gl_number.clone());
            }
            accounts.insert(account.gl_number.clone(), account);
        }
        tracing::debug!(
            business = %business.designation,
            accounts = accounts.len(),
            "business context loaded"
        );
        Ok(Self {
            business,
            accounts,
            aliases,
            master,
            config: config.clone(),
        })
    }

    pub fn business(&self) -> &Business {
        &self.business
    }

    pub fn business_id(&self) -> Uuid {
        self.business.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.config.epsilon
    }

    pub fn account(&self, gl_number: &str) -> Option<&GlAccount> {
        self.accounts.get(gl_number)
    }

    pub fn rentable(&self, id: Uuid) -> Result<Rentable> {
        let rentable = self.master.rentable(id)?;
        if rentable.business_id != self.business.id {
            return Err(LedgerError::not_found(format!(
                "rentable {} in business {}",
                id, self.business.designation
            )));
        }
        Ok(rentable)
    }

    pub fn rental_agreement(&self, id: Uuid) -> Result<RentalAgreement> {
        let agreement = self.master.rental_agreement(id)?;
        if agreement.business_id != self.business.id {
            return Err(LedgerError::not_found(format!(
                "rental agreement {} in business {}",
                id, self.business.designation
            )));
        }
        Ok(agreement)
    }

    /// Parses `rule` and splits `amount` across the accounts it names.
    pub fn resolve_rule(&self, rule: &str, amount: f64) -> Result<Vec<PostingLeg>> {
        PostingRule::parse(rule)?.resolve(amount, self, self.config.epsilon)
    }
}

impl AccountResolver for BusinessContext {
    fn resolve_account(&self, account: &AccountRef) -> Result<String> {
        let number = match account {
            AccountRef::Number(number) => number,
            AccountRef::Alias(alias) => self.aliases.get(alias).ok_or_else(|| {
                LedgerError::not_found(format!(
                    "account alias `{}` in business {}",
                    alias, self.business.designation
                ))
            })?,
        };
        if !self.accounts.contains_key(number) {
            return Err(LedgerError::not_found(format!(
                "GL account {} in business {}",
                number, self.business.designation
            )));
        }
        Ok(number.clone())
    }
}
