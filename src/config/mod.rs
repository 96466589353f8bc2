use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::core::utils::{ensure_dir, PathResolver};
use crate::errors::{LedgerError, Result};

const TMP_SUFFIX: &str = "tmp";

/// Engine tunables, stored as JSON under the application data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Tolerance for allocation and double-entry balance checks.
    pub epsilon: f64,
    /// Gaps spanning more days than this are logged at `warn`.
    pub staleness_warn_days: i64,
    /// Create a zero origin at the window start for keys that have none.
    pub auto_origin: bool,
    /// Close the business journal period when ledger records are generated.
    pub close_journal_periods: bool,
    pub backup_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epsilon: 0.005,
            staleness_warn_days: 31,
            auto_origin: true,
            close_journal_periods: true,
            backup_retention: 5,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 || self.epsilon >= 1.0 {
            return Err(LedgerError::Config(format!(
                "epsilon must be in (0, 1), got {}",
                self.epsilon
            )));
        }
        if self.staleness_warn_days < 0 {
            return Err(LedgerError::Config(format!(
                "staleness_warn_days must not be negative, got {}",
                self.staleness_warn_days
            )));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(PathResolver::resolve_base(None))
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
        })
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&data).map_err(|err| {
            LedgerError::Config(format!("{}: {}", self.path.display(), err))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
