//! The interactive `update` operation.
//!
//! Merges freshly discovered facts (a new header scan, new directory
//! listings) into the module's record, one phase at a time: functions,
//! then code associations, then test associations. Every mutation passes
//! the confirmation gate; declining any query preserves the prior state
//! for that item. The sticky memory resets between phases.

use std::fs;
use std::path::Path;

use declsync_core::confirm::{Gate, Importance};
use declsync_core::db::{ModuleRecord, INLINES_KEY};
use declsync_core::error::SyncResult;
use declsync_core::finder::find_definition;
use declsync_core::locate::{header_path, implementation_path, implementation_stems, test_names};
use declsync_core::signature::HeaderScan;

use super::{allows, names_matching_stem, sig_is_inline, Session};

/// Run `update` for one module, merging discovered state into its
/// record. Mutates the in-memory database only.
pub fn update_module(session: &mut Session, module: &str) -> SyncResult<()> {
    let scan = session.scan_module(module)?;
    let header = header_path(&session.root, module);
    let stems = implementation_stems(&session.root, module);
    let tests = test_names(&session.root, module);
    let root = session.root.clone();
    let filter = session.filter.clone();

    let Session {
        ref mut db,
        ref mut gate,
        ..
    } = *session;
    let record = db.ensure_module(module);

    gate.reset();
    merge_functions(record, &scan, &filter, gate, module)?;

    gate.reset();
    merge_code(record, &scan, &stems, &filter, gate, module, &root, &header)?;

    gate.reset();
    merge_tests(record, &scan, &tests, &filter, gate, module)?;

    gate.reset();
    Ok(())
}

// ============================================================================
// Phase 1: Functions
// ============================================================================

fn merge_functions(
    record: &mut ModuleRecord,
    scan: &HeaderScan,
    filter: &Option<Vec<String>>,
    gate: &mut Gate,
    module: &str,
) -> SyncResult<()> {
    // Additions and signature updates, in declaration order.
    for short in &scan.order {
        if !allows(filter, short) {
            continue;
        }
        let found = &scan.signatures[short];
        let prompt = match record.signatures.get(short) {
            None => format!("add function '{short}' to {module}?"),
            Some(stored) if stored != found => {
                format!("update signature of '{short}' in {module}?")
            }
            Some(_) => continue,
        };
        if gate.confirm(Importance::Routine, true, &prompt)? {
            record.signatures.insert(short.clone(), found.clone());
        }
    }

    // Removals are only offered over the full universe; a filtered run
    // cannot tell "gone" from "not considered".
    if filter.is_none() {
        let stale: Vec<String> = record
            .signatures
            .keys()
            .filter(|name| !scan.signatures.contains_key(*name))
            .cloned()
            .collect();
        for short in stale {
            let prompt = format!("remove function '{short}' from {module}?");
            if gate.confirm(Importance::Critical, true, &prompt)? {
                record.signatures.remove(&short);
                record.purge_from_associations(&short);
            }
        }
    }

    // Rewrite the order: declaration order first, then retained names in
    // their prior relative order.
    let mut order: Vec<String> = scan
        .order
        .iter()
        .filter(|name| record.signatures.contains_key(*name))
        .cloned()
        .collect();
    for name in &record.functions {
        if record.signatures.contains_key(name) && !order.contains(name) {
            order.push(name.clone());
        }
    }
    for name in record.signatures.keys() {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }
    record.functions = order;
    Ok(())
}

// ============================================================================
// Phase 2: Code Associations
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn merge_code(
    record: &mut ModuleRecord,
    scan: &HeaderScan,
    stems: &[String],
    filter: &Option<Vec<String>>,
    gate: &mut Gate,
    module: &str,
    root: &Path,
    header: &Path,
) -> SyncResult<()> {
    for stem in stems {
        let path = implementation_path(root, module, stem);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "implementation file unreadable; skipped");
                continue;
            }
        };

        let stored = record.code.get(stem).cloned();
        let mut proposed: Vec<String> = match &stored {
            // Prefer the stored association: keep what is still declared,
            // not inline, and structurally locatable in the file.
            Some(names) => {
                let mut kept = Vec::new();
                for name in names {
                    let Some(sig) = scan.signatures.get(name) else {
                        continue;
                    };
                    if sig_is_inline(sig, header)? {
                        continue;
                    }
                    if find_definition(sig, &content)? {
                        kept.push(name.clone());
                    }
                }
                kept
            }
            // No prior association: a file stem naming a function (or its
            // hidden counterpart) claims it by default.
            None => {
                let mut defaults = Vec::new();
                for name in names_matching_stem(scan.signatures.keys(), stem) {
                    if !sig_is_inline(&scan.signatures[&name], header)? {
                        defaults.push(name);
                    }
                }
                defaults
            }
        };
        proposed.sort();

        if proposed.is_empty() {
            if gate.asking(Importance::Routine) {
                let manual =
                    gate.input_list(&format!("functions for {module}/{stem}.c (blank for none): "))?;
                for name in manual {
                    if scan.signatures.contains_key(&name) {
                        proposed.push(name);
                    } else {
                        tracing::warn!(
                            module,
                            stem = %stem,
                            name = %name,
                            "unknown function in manual list; dropped"
                        );
                    }
                }
                proposed.sort();
                proposed.dedup();
            }
            if proposed.is_empty() {
                tracing::warn!(module, stem = %stem, "no functions associated with implementation file");
            }
        }

        let unchanged = stored.as_ref() == Some(&proposed);
        let nothing_to_record = stored.is_none() && proposed.is_empty();
        if !unchanged && !nothing_to_record {
            let prompt = format!(
                "set functions for {module}/{stem}.c to [{}]?",
                proposed.join(", ")
            );
            if gate.confirm(Importance::Routine, true, &prompt)? {
                record.code.insert(stem.clone(), proposed);
            }
        }
    }

    // The inlines bucket is always recomputed, never negotiated.
    let mut inlines = Vec::new();
    for (name, sig) in &scan.signatures {
        if sig_is_inline(sig, header)? {
            inlines.push(name.clone());
        }
    }
    if inlines.is_empty() {
        record.code.remove(INLINES_KEY);
    } else {
        record.code.insert(INLINES_KEY.to_string(), inlines);
    }

    // Stale stems: stored but no longer on disk.
    if filter.is_none() {
        let stale: Vec<String> = record
            .code
            .keys()
            .filter(|stem| stem.as_str() != INLINES_KEY && !stems.contains(*stem))
            .cloned()
            .collect();
        for stem in stale {
            let prompt = format!("remove stale code association '{stem}' from {module}?");
            if gate.confirm(Importance::Critical, true, &prompt)? {
                record.code.remove(&stem);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Phase 3: Test Associations
// ============================================================================

fn merge_tests(
    record: &mut ModuleRecord,
    scan: &HeaderScan,
    tests: &[String],
    filter: &Option<Vec<String>>,
    gate: &mut Gate,
    module: &str,
) -> SyncResult<()> {
    for test in tests {
        let stored = record.tests.get(test).cloned();
        let mut proposed: Vec<String> = match &stored {
            Some(names) => names
                .iter()
                .filter(|name| scan.signatures.contains_key(*name))
                .cloned()
                .collect(),
            // A test defaults to the function of the same name plus its
            // hidden counterpart, when declared.
            None => names_matching_stem(scan.signatures.keys(), test),
        };
        proposed.sort();

        if proposed.is_empty() {
            if gate.asking(Importance::Routine) {
                let manual = gate
                    .input_list(&format!("functions for {module}/test/t-{test}.c (blank for none): "))?;
                for name in manual {
                    if scan.signatures.contains_key(&name) {
                        proposed.push(name);
                    } else {
                        tracing::warn!(
                            module,
                            test = %test,
                            name = %name,
                            "unknown function in manual list; dropped"
                        );
                    }
                }
                proposed.sort();
                proposed.dedup();
            }
            if proposed.is_empty() {
                tracing::warn!(module, test = %test, "no functions associated with test file");
            }
        }

        let unchanged = stored.as_ref() == Some(&proposed);
        let nothing_to_record = stored.is_none() && proposed.is_empty();
        if !unchanged && !nothing_to_record {
            let prompt = format!(
                "set functions for {module}/test/t-{test}.c to [{}]?",
                proposed.join(", ")
            );
            if gate.confirm(Importance::Routine, true, &prompt)? {
                record.tests.insert(test.clone(), proposed);
            }
        }
    }

    if filter.is_none() {
        let stale: Vec<String> = record
            .tests
            .keys()
            .filter(|test| !tests.contains(*test))
            .cloned()
            .collect();
        for test in stale {
            let prompt = format!("remove stale test association '{test}' from {module}?");
            if gate.confirm(Importance::Critical, true, &prompt)? {
                record.tests.remove(&test);
            }
        }
    }
    Ok(())
}
