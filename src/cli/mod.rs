//! `rentroll_cli`: a batch driver over one named book.

pub mod output;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::{Config, ConfigManager};
use crate::core::services::{
    ActivityFile, BalanceService, BatchReport, BatchService, ImportService, MarkerService,
};
use crate::core::utils::PathResolver;
use crate::core::{BusinessContext, StaticMasterData};
use crate::domain::{AccountKey, DateWindow};
use crate::errors::LedgerError;
use crate::storage::{JsonStorage, LedgerStore};
use crate::utils::build_info;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Usage(String),
}

#[derive(Parser, Debug)]
#[command(name = "rentroll_cli")]
#[command(about = "Post, checkpoint and query rental-property ledgers")]
pub struct Cli {
    /// Data directory; defaults to $RENTROLL_HOME or ~/.rentroll_core.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Name of the book to operate on.
    #[arg(long, global = true, default_value = "main")]
    pub book: String,
    /// Master-data JSON (businesses, rentables, rental agreements, accounts).
    #[arg(long, global = true)]
    pub master: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    pub plain: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load assessments and receipts from a JSON activity file.
    Import { file: PathBuf },
    /// Post journals for the window.
    Journals {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Write ledger rows for the window's journals and close markers at its end.
    Ledgers {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Journals, ledger rows and checkpoint in one unit.
    Run {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Create the origin marker of an account key.
    Origin {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        balance: f64,
    },
    /// Close an account key's timeline through a boundary date.
    Close {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Lock closed periods ending on or before a date. Without a key, every key and the
    /// journal periods of the business are locked.
    Lock {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: Option<AccountKey>,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Reopen the most recent closed period of an account key.
    Reopen {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
    },
    /// Balance of an account key from all activity before a date.
    Balance {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Statement of an account key over [from, to).
    Statement {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Ledger rows of an account key over [from, to) with the running balance.
    Ledger {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// List the marker chain of an account key.
    Markers {
        #[arg(long)]
        business: Uuid,
        #[arg(long)]
        key: AccountKey,
    },
    /// Show build information.
    Version,
}

pub fn run_cli() -> Result<(), CliError> {
    run_with(Cli::parse())
}

pub fn run_with(cli: Cli) -> Result<(), CliError> {
    output::set_plain(cli.plain);
    if let Command::Version = cli.command {
        output::info(build_info::current());
        return Ok(());
    }

    let base = PathResolver::resolve_base(cli.data_dir.clone());
    let config = ConfigManager::with_base_dir(base.clone())?.load()?;
    let storage = JsonStorage::new(Some(base), &cli.book, Some(config.backup_retention))?;
    let store = LedgerStore::open(Box::new(storage), config.epsilon)?;
    let session = Session {
        cli: &cli,
        config: &config,
        store: &store,
    };
    session.dispatch()
}

struct Session<'a> {
    cli: &'a Cli,
    config: &'a Config,
    store: &'a LedgerStore,
}

impl Session<'_> {
    fn dispatch(&self) -> Result<(), CliError> {
        match &self.cli.command {
            Command::Import { file } => self.import(file),
            Command::Journals { business, from, to } => {
                let ctx = self.context(*business)?;
                let report = BatchService::new(self.store, &ctx).generate_journal_records(*from, *to)?;
                print_report("Journals", &report);
                Ok(())
            }
            Command::Ledgers { business, from, to } => {
                let ctx = self.context(*business)?;
                let report = BatchService::new(self.store, &ctx).generate_ledger_records(*from, *to)?;
                print_report("Ledger records", &report);
                Ok(())
            }
            Command::Run { business, from, to } => {
                let ctx = self.context(*business)?;
                let report = BatchService::new(self.store, &ctx).run_period(*from, *to)?;
                print_report("Period run", &report);
                Ok(())
            }
            Command::Origin {
                business,
                key,
                date,
                balance,
            } => {
                let origin = self.store.transact(|book| {
                    MarkerService::create_origin(book, *business, key, *date, *balance)
                })?;
                output::success(format!(
                    "origin for {} on {} with balance {:.2}",
                    key, origin.dt_stop, origin.balance
                ));
                Ok(())
            }
            Command::Close {
                business,
                key,
                date,
            } => {
                let closed = self
                    .store
                    .transact(|book| MarkerService::close_period(book, *business, key, *date))?;
                match closed {
                    Some(marker) => output::success(format!(
                        "{} closed [{}, {}) at {:.2}",
                        key, marker.dt_start, marker.dt_stop, marker.balance
                    )),
                    None => output::warning(format!("{} is already closed through {}", key, date)),
                }
                Ok(())
            }
            Command::Lock {
                business,
                key,
                date,
            } => {
                let locked = self.store.transact(|book| match key {
                    Some(key) => MarkerService::lock_through(book, *business, key, *date),
                    None => {
                        let mut locked = 0;
                        for key in book.account_keys(*business) {
                            locked += MarkerService::lock_through(book, *business, &key, *date)?;
                        }
                        locked += MarkerService::lock_journal_through(book, *business, *date)?;
                        Ok(locked)
                    }
                })?;
                output::success(format!("{} period(s) locked through {}", locked, date));
                Ok(())
            }
            Command::Reopen { business, key } => {
                let marker = self
                    .store
                    .transact(|book| MarkerService::reopen(book, *business, key))?;
                output::success(format!(
                    "{} reopened [{}, {})",
                    key, marker.dt_start, marker.dt_stop
                ));
                Ok(())
            }
            Command::Balance {
                business,
                key,
                date,
            } => {
                let book = self.store.snapshot()?;
                let balance = BalanceService::balance(
                    &book,
                    *business,
                    key,
                    *date,
                    self.config.staleness_warn_days,
                )?;
                output::info(format!("{} before {}: {:.2}", key, date, balance));
                Ok(())
            }
            Command::Statement {
                business,
                key,
                from,
                to,
            } => self.statement(*business, key, *from, *to),
            Command::Ledger {
                business,
                key,
                from,
                to,
            } => {
                let book = self.store.snapshot()?;
                let lines = BalanceService::ledger_lines(
                    &book,
                    *business,
                    key,
                    *from,
                    *to,
                    self.config.staleness_warn_days,
                )?;
                output::section(format!("Ledger {} {}", key, DateWindow::new(*from, *to)?));
                for line in &lines {
                    output::info(format!(
                        "{} {:<10} {} {} {}",
                        line.entry.date,
                        line.entry.kind,
                        output::amount(line.entry.amount),
                        output::amount(line.balance),
                        line.entry.journal_id
                    ));
                }
                output::info(format!("{} row(s)", lines.len()));
                Ok(())
            }
            Command::Markers { business, key } => {
                let book = self.store.snapshot()?;
                output::section(format!("Markers for {}", key));
                for marker in book.markers(*business, key) {
                    output::info(format!(
                        "{:<7} [{}, {}) {}",
                        marker.state,
                        marker.dt_start,
                        marker.dt_stop,
                        output::amount(marker.balance)
                    ));
                }
                Ok(())
            }
            Command::Version => Ok(()),
        }
    }

    fn context(&self, business: Uuid) -> Result<BusinessContext, CliError> {
        let path = self.cli.master.as_ref().ok_or_else(|| {
            CliError::Usage("--master <FILE> is required for batch commands".into())
        })?;
        let master = StaticMasterData::from_path(path)?;
        Ok(BusinessContext::load(Arc::new(master), business, self.config)?)
    }

    fn import(&self, file: &Path) -> Result<(), CliError> {
        let data = fs::read_to_string(file).map_err(LedgerError::from)?;
        let activity: ActivityFile = serde_json::from_str(&data)
            .map_err(|err| CliError::Usage(format!("{}: {}", file.display(), err)))?;
        let epsilon = self.config.epsilon;
        let report = self
            .store
            .transact(|book| ImportService::apply(book, activity, epsilon))?;
        for outcome in report.outcomes().filter(|o| !o.is_success()) {
            output::outcome(outcome);
        }
        output::success(format!(
            "imported {} assessment(s) and {} receipt(s)",
            report.imported_assessments(),
            report.imported_receipts()
        ));
        Ok(())
    }

    fn statement(
        &self,
        business: Uuid,
        key: &AccountKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(), CliError> {
        let book = self.store.snapshot()?;
        let stmt = BalanceService::statement(
            &book,
            business,
            key,
            from,
            to,
            self.config.staleness_warn_days,
        )?;
        output::section(format!("Statement {} {}", key, DateWindow::new(from, to)?));
        output::info(format!(
            "marker   {:<7} ending {} {}",
            stmt.lm_start.state,
            stmt.lm_start.dt_stop,
            output::amount(stmt.lm_start.balance)
        ));
        if !stmt.gap.is_empty() {
            output::warning(format!(
                "{} row(s) since the marker add {:.2}",
                stmt.gap.len(),
                stmt.gap_total()
            ));
        }
        output::info(format!("opening                     {}", output::amount(stmt.opening)));
        let mut running = stmt.opening;
        for entry in &stmt.entries {
            running += entry.amount;
            output::info(format!(
                "{} {:<10} {} {}",
                entry.date,
                entry.kind,
                output::amount(entry.amount),
                output::amount(running)
            ));
        }
        output::info(format!("closing                     {}", output::amount(stmt.closing)));
        Ok(())
    }
}

fn print_report(title: &str, report: &BatchReport) {
    output::section(format!("{} {}", title, report.window));
    for outcome in &report.outcomes {
        output::outcome(outcome);
    }
    output::info(format!(
        "{} succeeded, {} skipped, {} failed",
        report.succeeded(),
        report.skipped(),
        report.failed()
    ));
}
