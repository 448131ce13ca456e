//! Code and test file location by naming convention.
//!
//! A module `foo` under library root `R` owns:
//! - implementation files `R/foo/<stem>.c`
//! - test files `R/foo/test/t-<name>.c`
//!
//! Both listings are best-effort: a missing directory is reported through
//! a warning and yields an empty list, so a half-populated library still
//! checks cleanly instead of failing the run.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extension of implementation and test files.
pub const SOURCE_EXT: &str = "c";

/// Prefix of test file names inside a module's test directory.
pub const TEST_PREFIX: &str = "t-";

/// Path of a module's implementation file for the given stem.
pub fn implementation_path(root: &Path, module: &str, stem: &str) -> PathBuf {
    root.join(module).join(format!("{stem}.{SOURCE_EXT}"))
}

/// Path of a module's header.
pub fn header_path(root: &Path, module: &str) -> PathBuf {
    root.join(format!("{module}.h"))
}

/// Sorted implementation-file stems present in the module's source
/// directory.
pub fn implementation_stems(root: &Path, module: &str) -> Vec<String> {
    list_stems(&root.join(module), None)
}

/// Sorted test names present in the module's test subdirectory, with the
/// `t-` prefix and the extension stripped.
pub fn test_names(root: &Path, module: &str) -> Vec<String> {
    list_stems(&root.join(module).join("test"), Some(TEST_PREFIX))
}

fn list_stems(dir: &Path, strip_prefix: Option<&str>) -> Vec<String> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "directory not found; nothing listed");
        return Vec::new();
    }

    let mut stems: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXT) {
                return None;
            }
            let stem = path.file_stem()?.to_str()?;
            match strip_prefix {
                Some(prefix) => {
                    let Some(stripped) = stem.strip_prefix(prefix) else {
                        tracing::debug!(
                            file = %path.display(),
                            "skipping file outside the naming convention"
                        );
                        return None;
                    };
                    Some(stripped.to_string())
                }
                None => Some(stem.to_string()),
            }
        })
        .collect();
    stems.sort();
    stems
}

// ============================================================================
// Tests
// ============================================================================
