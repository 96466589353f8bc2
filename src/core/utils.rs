use dirs::home_dir;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::errors::Result;

const DEFAULT_DIR_NAME: &str = ".rentroll_core";
const BOOKS_DIR: &str = "books";
const BACKUP_DIR: &str = "backups";
const CONFIG_FILE: &str = "config.json";

/// Returns the application data directory, defaulting to `~/.rentroll_core`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os("RENTROLL_HOME") {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Resolves directory layout relative to a base directory.
pub struct PathResolver;

impl PathResolver {
    pub fn resolve_base(base: Option<PathBuf>) -> PathBuf {
        base.unwrap_or_else(app_data_dir)
    }

    pub fn books_dir_in(base: &Path) -> PathBuf {
        base.join(BOOKS_DIR)
    }

    pub fn backup_dir_in(base: &Path) -> PathBuf {
        base.join(BACKUP_DIR)
    }

    pub fn config_file_in(base: &Path) -> PathBuf {
        base.join(CONFIG_FILE)
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
