//! Workflow operations: check, update, code_pop, code_gen.
//!
//! Every operation threads a [`Session`], the explicit context value
//! holding the library root, the database, the confirmation gate, and
//! the optional function filter. There is no global state; two sessions
//! never observe each other.
//!
//! Operations process one module to completion before the next; within a
//! module the order is fixed: functions, then code associations, then
//! test associations. Module-level atomicity is not guaranteed: an
//! early termination can leave a partially merged in-memory record. The
//! database itself is only written by the caller's gated save step.

use std::path::{Path, PathBuf};

use declsync_core::confirm::Gate;
use declsync_core::db::Database;
use declsync_core::error::{SyncError, SyncResult};
use declsync_core::locate::header_path;
use declsync_core::signature::{scan_header, HeaderScan, Signature};

mod check;
mod code;
mod update;

pub use check::{check_module, ModuleReport};
pub use code::{code_gen_module, code_pop_module};
pub use update::update_module;

// ============================================================================
// Session
// ============================================================================

/// Context threaded through every workflow operation.
pub struct Session {
    /// Library root: headers at the top, one directory per module.
    pub root: PathBuf,
    /// The in-memory database; mutated by update/code_pop/code_gen.
    pub db: Database,
    /// Confirmation gate for every mutation.
    pub gate: Gate,
    /// Optional short-name filter. `None` processes the full universe.
    pub filter: Option<Vec<String>>,
}

impl Session {
    /// Create a session. An empty filter list means "no filter".
    pub fn new(root: impl Into<PathBuf>, db: Database, gate: Gate, filter: Vec<String>) -> Self {
        Session {
            root: root.into(),
            db,
            gate,
            filter: if filter.is_empty() { None } else { Some(filter) },
        }
    }

    /// Whether a short name passes the function filter.
    pub fn allows(&self, short: &str) -> bool {
        allows(&self.filter, short)
    }

    /// Whether a filter narrows this run.
    pub fn filtered(&self) -> bool {
        self.filter.is_some()
    }

    /// Read and scan a module's header.
    pub fn scan_module(&self, module: &str) -> SyncResult<HeaderScan> {
        let path = header_path(&self.root, module);
        let text = std::fs::read_to_string(&path).map_err(|source| SyncError::HeaderRead {
            path: path.clone(),
            source,
        })?;
        scan_header(&text, module).map_err(|source| SyncError::parse(path, source))
    }
}

pub(crate) fn allows(filter: &Option<Vec<String>>, short: &str) -> bool {
    match filter {
        Some(names) => names.iter().any(|n| n == short),
        None => true,
    }
}

/// Inline check for a signature, attributing a bad persisted prefix to
/// the module's header.
pub(crate) fn sig_is_inline(sig: &Signature, header: &Path) -> SyncResult<bool> {
    sig.is_inline()
        .map_err(|source| SyncError::parse(header, source))
}

/// Functions default-associated with a file stem: those whose short name
/// equals the stem or its hidden-suffixed counterpart.
pub(crate) fn names_matching_stem<'a>(
    names: impl Iterator<Item = &'a String>,
    stem: &str,
) -> Vec<String> {
    let hidden = format!("{stem}_");
    let mut matched: Vec<String> = names
        .filter(|short| short.as_str() == stem || short.as_str() == hidden)
        .cloned()
        .collect();
    matched.sort();
    matched
}

// ============================================================================
// Tests
// ============================================================================
