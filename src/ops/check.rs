//! The read-only `check` operation.
//!
//! Emits the full set of drift reports for one module: function order,
//! signatures, code associations (every claimed non-inline association is
//! verified through the structural finder; the reserved `inlines` bucket
//! is compared against the currently-inline set instead), and test
//! associations.
//!
//! A function filter changes which categories are emitted: aggregate
//! set-comparisons (the full order list, the stem and test-name
//! universes) are only meaningful over the full universe, so filtered
//! runs emit per-function reports only.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use serde::Serialize;

use declsync_core::db::{ModuleRecord, INLINES_KEY};
use declsync_core::diff::{compare_mapped, compare_ordered, Drift};
use declsync_core::error::SyncResult;
use declsync_core::finder::find_definition;
use declsync_core::locate::{header_path, implementation_path, implementation_stems, test_names};
use declsync_core::signature::{HeaderScan, Signature};

use super::{allows, sig_is_inline, Session};

/// Drift found in one module, by section.
#[derive(Debug, Default, Serialize)]
pub struct ModuleReport {
    /// Module the report covers.
    pub module: String,
    /// Function order drift (unfiltered runs only).
    pub functions: Vec<Drift>,
    /// Signature drift.
    pub signatures: Vec<Drift>,
    /// Code association drift; subjects are `stem:function`.
    pub code: Vec<Drift>,
    /// Test association drift; subjects are `test:function`.
    pub tests: Vec<Drift>,
}

impl ModuleReport {
    /// Whether the module shows no drift at all.
    pub fn is_clean(&self) -> bool {
        self.functions.is_empty()
            && self.signatures.is_empty()
            && self.code.is_empty()
            && self.tests.is_empty()
    }
}

impl fmt::Display for ModuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "  consistent");
        }
        for (title, entries) in [
            ("functions", &self.functions),
            ("signatures", &self.signatures),
            ("code", &self.code),
            ("tests", &self.tests),
        ] {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "  {title}:")?;
            for drift in entries {
                writeln!(f, "    {drift}")?;
            }
        }
        Ok(())
    }
}

/// Run `check` for one module. Never mutates the session.
pub fn check_module(session: &Session, module: &str) -> SyncResult<ModuleReport> {
    let scan = session.scan_module(module)?;
    let empty = ModuleRecord::default();
    let record = session.db.get(module).unwrap_or(&empty);

    let mut report = ModuleReport {
        module: module.to_string(),
        ..ModuleReport::default()
    };

    check_functions(session, record, &scan, &mut report);
    check_code(session, module, record, &scan, &mut report)?;
    check_tests(session, module, record, &scan, &mut report);

    Ok(report)
}

fn check_functions(
    session: &Session,
    record: &ModuleRecord,
    scan: &HeaderScan,
    report: &mut ModuleReport,
) {
    match &session.filter {
        None => {
            report.functions = compare_ordered(&record.functions, &scan.order);
            report.signatures = compare_mapped(&record.signatures, &scan.signatures);
        }
        Some(filter) => {
            let stored = restrict(&record.signatures, filter);
            let found = restrict(&scan.signatures, filter);
            report.signatures = compare_mapped(&stored, &found);
        }
    }
}

fn restrict<'a>(
    map: &'a BTreeMap<String, Signature>,
    filter: &[String],
) -> BTreeMap<String, &'a Signature> {
    map.iter()
        .filter(|(name, _)| filter.iter().any(|f| f == *name))
        .map(|(name, sig)| (name.clone(), sig))
        .collect()
}

fn check_code(
    session: &Session,
    module: &str,
    record: &ModuleRecord,
    scan: &HeaderScan,
    report: &mut ModuleReport,
) -> SyncResult<()> {
    let header = header_path(&session.root, module);
    let stems = implementation_stems(&session.root, module);

    if !session.filtered() {
        let stored: Vec<String> = record
            .code
            .keys()
            .filter(|stem| stem.as_str() != INLINES_KEY)
            .cloned()
            .collect();
        report.code.extend(compare_ordered(&stored, &stems));
    }

    // Verify every claimed association structurally.
    for (stem, names) in &record.code {
        if stem == INLINES_KEY {
            continue;
        }
        let path = implementation_path(&session.root, module, stem);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "implementation file unreadable");
                String::new()
            }
        };
        for name in names {
            if !allows(&session.filter, name) {
                continue;
            }
            match scan.signatures.get(name) {
                None => report
                    .code
                    .push(Drift::NotFound(format!("{stem}:{name}"))),
                Some(sig) => {
                    if !find_definition(sig, &content)? {
                        report.code.push(Drift::NotFound(format!("{stem}:{name}")));
                    }
                }
            }
        }
    }

    // The inlines bucket is exempt from structural checks; instead it
    // must equal the currently-inline set.
    let mut current_inlines = Vec::new();
    for (name, sig) in &scan.signatures {
        if allows(&session.filter, name) && sig_is_inline(sig, &header)? {
            current_inlines.push(name.clone());
        }
    }
    let stored_inlines: Vec<String> = record
        .code
        .get(INLINES_KEY)
        .map(|names| {
            let mut names: Vec<String> = names
                .iter()
                .filter(|n| allows(&session.filter, n))
                .cloned()
                .collect();
            names.sort();
            names
        })
        .unwrap_or_default();
    for drift in compare_ordered(&stored_inlines, &current_inlines) {
        report.code.push(match drift {
            Drift::NotFound(name) => Drift::NotFound(format!("{INLINES_KEY}:{name}")),
            Drift::Missing(name) => Drift::Missing(format!("{INLINES_KEY}:{name}")),
            other => other,
        });
    }

    Ok(())
}

fn check_tests(
    session: &Session,
    module: &str,
    record: &ModuleRecord,
    scan: &HeaderScan,
    report: &mut ModuleReport,
) {
    if !session.filtered() {
        let stored: Vec<String> = record.tests.keys().cloned().collect();
        let found = test_names(&session.root, module);
        report.tests.extend(compare_ordered(&stored, &found));
    }

    // Claimed functions must exist among the declarations.
    for (test, names) in &record.tests {
        for name in names {
            if !allows(&session.filter, name) {
                continue;
            }
            if !scan.signatures.contains_key(name) {
                report.tests.push(Drift::NotFound(format!("{test}:{name}")));
            }
        }
    }
}
