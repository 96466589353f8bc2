use chrono::{DateTime, NaiveDateTime, Utc};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::core::utils::{ensure_dir, PathResolver};
use crate::errors::{LedgerError, Result};

use super::{BookSnapshot, StorageBackend};

const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Stores one named book as a pretty-printed JSON snapshot.
///
/// Each write goes to a temp file that is renamed over the live file, so a crash leaves
/// either the previous snapshot or the new one. The previous file is copied into a
/// timestamped backup first and old backups are pruned to the retention count.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    name: String,
    book_path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonStorage {
    pub fn new(root: Option<PathBuf>, name: &str, retention: Option<usize>) -> Result<Self> {
        let app_root = PathResolver::resolve_base(root);
        ensure_dir(&app_root)?;
        let books_dir = PathResolver::books_dir_in(&app_root);
        ensure_dir(&books_dir)?;
        let name = canonical_name(name);
        let backups_dir = PathResolver::backup_dir_in(&app_root).join(&name);
        Ok(Self {
            book_path: books_dir.join(format!("{}.json", name)),
            backups_dir,
            name,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn book_path(&self) -> &Path {
        &self.book_path
    }

    /// Backup file names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(file_name.to_string());
            }
        }
        entries.sort_by(|a, b| {
            parse_backup_timestamp(b)
                .cmp(&parse_backup_timestamp(a))
                .then_with(|| b.cmp(a))
        });
        Ok(entries)
    }

    /// Copies the live snapshot into the backup directory.
    pub fn backup(&self) -> Result<Option<String>> {
        if !self.book_path.exists() {
            return Ok(None);
        }
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let file_stem = format!("{}_{}", self.name, timestamp);
        let backup_name = unique_name(&self.backups_dir, &file_stem);
        fs::copy(&self.book_path, self.backups_dir.join(&backup_name))?;
        self.prune_backups()?;
        Ok(Some(backup_name))
    }

    fn prune_backups(&self) -> Result<()> {
        let backups = self.list_backups()?;
        for entry in backups.iter().skip(self.retention) {
            let path = self.backups_dir.join(entry);
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to prune backup");
            }
        }
        Ok(())
    }

    /// Generation of the snapshot currently on disk, 0 when there is none.
    fn stored_generation(&self) -> Result<u64> {
        if !self.book_path.exists() {
            return Ok(0);
        }
        let data = fs::read_to_string(&self.book_path)?;
        let stored: StoredGeneration = serde_json::from_str(&data)?;
        Ok(stored.generation)
    }
}

/// The part of a stored book `persist` looks at before overwriting it.
#[derive(Deserialize)]
struct StoredGeneration {
    #[serde(default)]
    generation: u64,
}

impl StorageBackend for JsonStorage {
    fn load(&self) -> Result<Option<BookSnapshot>> {
        if !self.book_path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.book_path)?;
        let snapshot: BookSnapshot = serde_json::from_str(&data)?;
        Ok(Some(snapshot))
    }

    fn persist(&self, snapshot: &BookSnapshot) -> Result<()> {
        let stored = self.stored_generation()?;
        let base = snapshot.generation.saturating_sub(1);
        if stored != base {
            return Err(LedgerError::concurrency(format!(
                "book {} was changed by another writer (generation {} on disk, expected {})",
                self.name, stored, base
            )));
        }
        self.backup()?;
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = tmp_path(&self.book_path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.book_path).map_err(|err| {
            LedgerError::Storage(format!(
                "failed to replace {}: {}",
                self.book_path.display(),
                err
            ))
        })?;
        tracing::debug!(book = %self.name, path = %self.book_path.display(), "book persisted");
        Ok(())
    }
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "book".into()
    } else {
        sanitized
    }
}

fn unique_name(dir: &Path, stem: &str) -> String {
    let mut candidate = format!("{}.{}", stem, BACKUP_EXTENSION);
    let mut counter = 1;
    while dir.join(&candidate).exists() {
        candidate = format!("{}_{}.{}", stem, counter, BACKUP_EXTENSION);
        counter += 1;
    }
    candidate
}

/// Finds the `YYYYmmdd_HHMMSS` pair following the book name.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;
    let parts: Vec<&str> = stem.split('_').collect();
    parts.windows(2).find_map(|pair| {
        if !is_digits(pair[0], 8) || !is_digits(pair[1], 6) {
            return None;
        }
        let raw = format!("{}{}", pair[0], pair[1]);
        NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    })
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
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
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
