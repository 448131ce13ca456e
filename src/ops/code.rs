//! The `code_pop` and `code_gen` bookkeeping operations.
//!
//! `code_pop` drives unclaimed signatures into code-association buckets:
//! inline signatures into the reserved `inlines` bucket, everything else
//! into a bucket keyed by its collapsed name (the expected file stem).
//!
//! `code_gen` makes the filesystem catch up with the associations: it
//! creates missing implementation files (banner plus header include) and
//! appends stub definitions for associated functions whose definitions
//! cannot currently be located, in deterministic lexicographic order.
//! Both run off the record alone; neither needs the header re-parsed.

use std::collections::BTreeSet;
use std::fs;

use declsync_core::confirm::Importance;
use declsync_core::db::INLINES_KEY;
use declsync_core::error::SyncResult;
use declsync_core::finder::find_definition;
use declsync_core::locate::{header_path, implementation_path};
use declsync_core::signature::Signature;

use super::{allows, sig_is_inline, Session};

/// Run `code_pop` for one module: propose a bucket for every signature
/// not yet claimed by any code association.
pub fn code_pop_module(session: &mut Session, module: &str) -> SyncResult<()> {
    let header = header_path(&session.root, module);
    let filter = session.filter.clone();

    let Session {
        ref mut db,
        ref mut gate,
        ..
    } = *session;
    let record = db.ensure_module(module);

    let claimed: BTreeSet<String> = record.claimed_by_code().cloned().collect();

    gate.reset();
    for short in record.functions.clone() {
        if !allows(&filter, &short) || claimed.contains(&short) {
            continue;
        }
        let Some(sig) = record.signatures.get(&short) else {
            tracing::warn!(module, short = %short, "ordered function has no signature; skipped");
            continue;
        };
        let bucket = if sig_is_inline(sig, &header)? {
            INLINES_KEY.to_string()
        } else {
            sig.shorter_name()
        };
        let prompt = format!("add '{short}' to code bucket '{bucket}' in {module}?");
        if gate.confirm(Importance::Routine, true, &prompt)? {
            let names = record.code.entry(bucket).or_default();
            names.push(short);
            names.sort();
            names.dedup();
        }
    }
    gate.reset();
    Ok(())
}

/// Run `code_gen` for one module: ensure every association's file exists
/// and carries a definition for each associated function.
pub fn code_gen_module(session: &mut Session, module: &str) -> SyncResult<()> {
    let header = header_path(&session.root, module);
    let root = session.root.clone();
    let filter = session.filter.clone();

    let Session {
        ref mut db,
        ref mut gate,
        ..
    } = *session;
    let record = db.ensure_module(module);

    gate.reset();
    for (stem, names) in &record.code {
        if stem == INLINES_KEY {
            continue;
        }
        if !names.iter().any(|name| allows(&filter, name)) {
            continue;
        }

        let path = implementation_path(&root, module, stem);
        if !path.exists() {
            let prompt = format!("create {module}/{stem}.c?");
            if !gate.confirm(Importance::Destructive, true, &prompt)? {
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, file_banner(module))?;
            tracing::debug!(path = %path.display(), "implementation file created");
        }
        let mut content = fs::read_to_string(&path)?;

        // Stub exactly the associated functions whose definitions are
        // absent, lexicographically.
        let mut missing: Vec<&Signature> = Vec::new();
        for name in names {
            let Some(sig) = record.signatures.get(name) else {
                tracing::warn!(
                    module,
                    stem = %stem,
                    name = %name,
                    "associated function has no signature; skipped"
                );
                continue;
            };
            if sig_is_inline(sig, &header)? {
                tracing::warn!(module, stem = %stem, name = %name, "inline signature in a file bucket; skipped");
                continue;
            }
            if !find_definition(sig, &content)? {
                missing.push(sig);
            }
        }
        missing.sort_by_key(|sig| sig.short_name());

        if missing.is_empty() {
            continue;
        }
        let prompt = format!(
            "append {} stub definition(s) to {module}/{stem}.c?",
            missing.len()
        );
        if !gate.confirm(Importance::Destructive, true, &prompt)? {
            continue;
        }
        for sig in missing {
            content.push('\n');
            content.push_str(&stub_definition(sig));
        }
        fs::write(&path, content)?;
    }
    gate.reset();
    Ok(())
}

/// Fixed banner block opening every generated implementation file,
/// followed by the module header include.
fn file_banner(module: &str) -> String {
    let date = chrono::Local::now().format("%Y-%m-%d");
    format!(
        "/*\n    \
         This file is part of the library.\n\n    \
         Licensed under the terms distributed with the library sources.\n    \
         Generated by declsync on {date}.\n\
         */\n\n\
         #include \"{module}.h\"\n"
    )
}

/// A stub definition for one signature: the declaration without the
/// linkage marker, with an empty body.
fn stub_definition(sig: &Signature) -> String {
    let params = if sig.params.is_empty() {
        "void".to_string()
    } else {
        sig.params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{} {}({})\n{{\n    /* not yet implemented */\n}}\n",
        sig.return_type, sig.name, params
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(text: &str) -> Signature {
        Signature::parse(text, "foo").expect("valid declaration")
    }

    #[test]
    fn stub_definition_is_locatable_afterwards() {
        let s = sig("MYLIB_DLL const char * foo_name(slong * n, int k)");
        let stub = stub_definition(&s);
        assert!(find_definition(&s, &stub).unwrap());
    }

    #[test]
    fn stub_for_empty_parameter_list_uses_void() {
        let s = sig("MYLIB_DLL int foo_count()");
        let stub = stub_definition(&s);
        assert!(stub.contains("foo_count(void)"));
        assert!(find_definition(&s, &stub).unwrap());
    }

    #[test]
    fn banner_includes_the_module_header() {
        let banner = file_banner("foo");
        assert!(banner.starts_with("/*"));
        assert!(banner.contains("#include \"foo.h\""));
    }
}
