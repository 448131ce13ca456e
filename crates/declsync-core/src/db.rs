//! The persisted function database.
//!
//! One JSON file maps module names to [`ModuleRecord`]s. The file is
//! loaded once at process start and mutated in memory only; saving is the
//! sole durable side effect and happens at most once, gated by the caller.
//!
//! Loading is forgiving: a missing, unreadable, or malformed file is
//! substituted with an empty database and a warning, so drift against the
//! real filesystem surfaces as "everything missing" instead of a crash.
//!
//! Change detection uses a SHA-256 fingerprint of the canonical
//! serialization, computed at load time and compared when deciding
//! whether a save is worth offering.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::signature::Signature;

/// Default database file name, resolved against the library root.
pub const DB_FILE_NAME: &str = "fun_db.json";

/// Reserved code-association key collecting all inline signatures.
/// Exempt from structural code-location checks.
pub const INLINES_KEY: &str = "inlines";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while persisting the database.
///
/// Load failures are deliberately NOT errors; see [`Database::load`].
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to serialize the database.
    #[error("failed to serialize database: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to move the previous database aside.
    #[error("failed to back up database to {backup}: {source}")]
    Backup {
        backup: PathBuf,
        source: io::Error,
    },

    /// Failed to write the database file.
    #[error("failed to write database {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// ============================================================================
// Records
// ============================================================================

/// Persisted state for one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Short names in header declaration order.
    #[serde(default)]
    pub functions: Vec<String>,

    /// Short name to signature.
    #[serde(default)]
    pub signatures: BTreeMap<String, Signature>,

    /// Implementation-file stem to the sorted short names claimed to be
    /// defined there. The key [`INLINES_KEY`] is reserved.
    #[serde(default)]
    pub code: BTreeMap<String, Vec<String>>,

    /// Test name to the sorted short names claimed to be exercised there.
    #[serde(default)]
    pub tests: BTreeMap<String, Vec<String>>,
}

impl ModuleRecord {
    /// Short names claimed by any code association, including inlines.
    pub fn claimed_by_code(&self) -> impl Iterator<Item = &String> {
        self.code.values().flatten()
    }

    /// Remove a function from every association value.
    pub fn purge_from_associations(&mut self, short: &str) {
        for names in self.code.values_mut().chain(self.tests.values_mut()) {
            names.retain(|n| n != short);
        }
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Content fingerprint of the whole database, for "did anything actually
/// change" detection. Hash of the canonical serialization; sorted map
/// keys make it deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex digest (for log messages).
    pub fn hash(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Database
// ============================================================================

/// The whole persisted database: module name to record, plus the
/// load-time fingerprint used to detect mutation.
#[derive(Debug)]
pub struct Database {
    modules: BTreeMap<String, ModuleRecord>,
    baseline: Option<Fingerprint>,
}

impl Default for Database {
    fn default() -> Self {
        let mut db = Database {
            modules: BTreeMap::new(),
            baseline: None,
        };
        db.baseline = db.fingerprint().ok();
        db
    }
}

impl Database {
    /// Load the database from disk.
    ///
    /// Never fails: a missing, unreadable, or malformed file logs a
    /// warning and yields an empty database. Signatures get their owning
    /// module re-attached from the surrounding record key; the module
    /// name is intentionally not persisted per signature.
    pub fn load(path: &Path) -> Self {
        let mut modules: BTreeMap<String, ModuleRecord> = match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(modules) => modules,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        %err,
                        "database badly formatted; loading empty database"
                    );
                    BTreeMap::new()
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    %err,
                    "database unreadable; loading empty database"
                );
                BTreeMap::new()
            }
        };

        for (module, record) in &mut modules {
            for sig in record.signatures.values_mut() {
                sig.owning_module = module.clone();
            }
        }

        let mut db = Database {
            modules,
            baseline: None,
        };
        db.baseline = db.fingerprint().ok();
        tracing::debug!(path = %path.display(), modules = db.modules.len(), "database loaded");
        db
    }

    /// Save the database, pretty-printed with sorted keys.
    ///
    /// With a backup suffix, the existing file is first renamed to
    /// `<path>.<suffix>`. The write itself goes through a temporary file
    /// and a rename, so readers never observe a partial database.
    pub fn save(&self, path: &Path, backup: Option<&str>) -> DbResult<()> {
        if let Some(suffix) = backup {
            if path.exists() {
                let backup_path = PathBuf::from(format!("{}.{}", path.display(), suffix));
                fs::rename(path, &backup_path).map_err(|source| DbError::Backup {
                    backup: backup_path.clone(),
                    source,
                })?;
                tracing::debug!(backup = %backup_path.display(), "previous database moved aside");
            }
        }

        let mut text = serde_json::to_string_pretty(&self.modules)?;
        text.push('\n');
        atomic_write(path, text.as_bytes()).map_err(|source| DbError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "database saved");
        Ok(())
    }

    /// Fingerprint of the current in-memory state.
    pub fn fingerprint(&self) -> DbResult<Fingerprint> {
        let bytes = serde_json::to_vec(&self.modules)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Fingerprint(hex::encode(hasher.finalize())))
    }

    /// Whether the in-memory state differs from what was loaded.
    pub fn dirty(&self) -> bool {
        match (&self.baseline, self.fingerprint()) {
            (Some(baseline), Ok(current)) => *baseline != current,
            _ => true,
        }
    }

    /// Module names currently in the database.
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Look up a module's record.
    pub fn get(&self, module: &str) -> Option<&ModuleRecord> {
        self.modules.get(module)
    }

    /// Look up a module's record mutably.
    pub fn get_mut(&mut self, module: &str) -> Option<&mut ModuleRecord> {
        self.modules.get_mut(module)
    }

    /// Fetch a module's record, creating an empty one on first use.
    pub fn ensure_module(&mut self, module: &str) -> &mut ModuleRecord {
        self.modules.entry(module.to_string()).or_default()
    }
}

/// Write content through a temporary file and a rename, so readers see
/// either the old or the new database, never a partial write.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let temp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
    ));
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
