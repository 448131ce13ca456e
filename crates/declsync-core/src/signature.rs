//! Structural signature parsing for C-style header declarations.
//!
//! This parser is deliberately partial: it recognizes only declarations
//! matching the library's narrow surface convention and nothing else.
//! No macros, no conditional compilation, no comments inside signatures,
//! no function pointers. The supported shape is
//!
//! ```text
//! PREFIX RETURN_TYPE NAME '(' [TYPE NAME {',' TYPE NAME}] ')'
//! ```
//!
//! where `PREFIX` is either an export marker (`<LIB>_DLL`) or an inline
//! marker (`<LIB>_INLINE`). Parsing is all-or-nothing over the matched
//! span; a declaration that does not fully match the grammar is a
//! [`ParseError::MalformedDeclaration`], never a partial result.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declaration pattern: marker prefix, return type, name, argument list.
///
/// The return type class excludes delimiters so a match can never leak
/// across statement boundaries; the lazy quantifier plus the `(` anchor
/// makes the name capture the identifier directly before the parameter
/// list.
static DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<prefix>[A-Z0-9_]+_(?:DLL|INLINE))\s+(?P<ret>[^(){};]+?)\s+(?P<name>\w+)\s*\((?P<args>[^)]*)\)",
    )
    .expect("declaration pattern is valid")
});

// ============================================================================
// Error Types
// ============================================================================

/// Errors produced while parsing header declarations.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text does not fully match the declaration grammar.
    #[error("malformed declaration: {text}")]
    MalformedDeclaration { text: String },

    /// A prefix marker that is neither an export nor an inline marker.
    ///
    /// Unreachable for freshly parsed text (the scan pattern only admits
    /// valid markers); reachable when a signature is reconstructed from a
    /// hand-edited database record.
    #[error("invalid prefix marker: {prefix}")]
    InvalidPrefix { prefix: String },

    /// Two distinct declarations collapse to the same short name within
    /// one parse pass. Surfaced as an error rather than last-write-wins:
    /// a silently dropped function would corrupt every later comparison.
    #[error("duplicate short name '{short}': '{first}' and '{second}' collapse together")]
    DuplicateShortName {
        short: String,
        first: String,
        second: String,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

// ============================================================================
// Types
// ============================================================================

/// Visibility derived from the declaration's prefix marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Exported from the library (`<LIB>_DLL` marker).
    Exported,
    /// Defined inline in the header (`<LIB>_INLINE` marker).
    Inline,
}

/// One `(type, name)` parameter pair. Order within the parameter list is
/// part of a signature's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Normalized type text (single spaces, pointer stars standalone).
    pub ty: String,
    /// Declared parameter name, verbatim.
    pub name: String,
}

impl Param {
    /// Create a parameter pair, normalizing the type text.
    pub fn new(ty: impl AsRef<str>, name: impl Into<String>) -> Self {
        Param {
            ty: normalize_type(ty.as_ref()),
            name: name.into(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

/// One declared function.
///
/// Equality covers prefix, return type, name, and the ordered parameter
/// list. The owning module is contextual: it is excluded from equality and
/// from the persisted form, and re-attached from the surrounding record
/// key when the database is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Raw marker token (`<LIB>_DLL` or `<LIB>_INLINE`).
    pub prefix: String,
    /// Normalized return type.
    pub return_type: String,
    /// Raw declared identifier.
    pub name: String,
    /// Ordered parameter list.
    pub params: Vec<Param>,
    /// The module this signature was parsed under. Not part of equality,
    /// never persisted.
    #[serde(skip)]
    pub owning_module: String,
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix
            && self.return_type == other.return_type
            && self.name == other.name
            && self.params == other.params
    }
}

impl Eq for Signature {}

impl Signature {
    /// Parse one declaration string, all-or-nothing.
    ///
    /// The string (modulo surrounding whitespace) must fully match the
    /// declaration grammar; anything else is a `MalformedDeclaration`.
    pub fn parse(text: &str, module: impl Into<String>) -> ParseResult<Self> {
        let trimmed = text.trim();
        let caps = DECL_RE
            .captures(trimmed)
            .ok_or_else(|| ParseError::MalformedDeclaration {
                text: trimmed.to_string(),
            })?;
        let full = caps.get(0).expect("group 0 always present");
        if full.start() != 0 || full.end() != trimmed.len() {
            return Err(ParseError::MalformedDeclaration {
                text: trimmed.to_string(),
            });
        }
        Self::from_captures(&caps, module.into())
    }

    fn from_captures(caps: &regex::Captures<'_>, module: String) -> ParseResult<Self> {
        let decl = caps.get(0).expect("group 0 always present").as_str();
        Ok(Signature {
            prefix: caps["prefix"].to_string(),
            return_type: normalize_type(&caps["ret"]),
            name: caps["name"].to_string(),
            params: parse_params(&caps["args"], decl)?,
            owning_module: module,
        })
    }

    /// Whether the raw name marks the function as hidden (leading `_`).
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('_')
    }

    /// Visibility derived from the prefix marker.
    pub fn visibility(&self) -> ParseResult<Visibility> {
        if self.prefix.ends_with("_INLINE") {
            Ok(Visibility::Inline)
        } else if self.prefix.ends_with("_DLL") {
            Ok(Visibility::Exported)
        } else {
            Err(ParseError::InvalidPrefix {
                prefix: self.prefix.clone(),
            })
        }
    }

    /// Whether this signature is defined inline in the header.
    pub fn is_inline(&self) -> ParseResult<bool> {
        Ok(self.visibility()? == Visibility::Inline)
    }

    /// Disambiguated display name, unique within one parse pass.
    ///
    /// Leading underscores are stripped; a hidden function gets a trailing
    /// `_` so it stays distinguishable from a public counterpart; then the
    /// module-name prefix and any further leading underscores are stripped.
    /// For module `foo`: `foo_bar` becomes `bar`, `_foo_bar` becomes
    /// `bar_`.
    pub fn short_name(&self) -> String {
        let mut base = self.name.trim_start_matches('_').to_string();
        if self.is_hidden() {
            base.push('_');
        }
        let rest = base.strip_prefix(&self.owning_module).unwrap_or(&base);
        rest.trim_start_matches('_').to_string()
    }

    /// Collapsed display name: `short_name` minus the trailing
    /// disambiguation underscore. NOT guaranteed unique within a module;
    /// a hidden and a public function with the same base name share it.
    pub fn shorter_name(&self) -> String {
        let short = self.short_name();
        match short.strip_suffix('_') {
            Some(stripped) => stripped.to_string(),
            None => short,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}({})",
            self.prefix,
            self.return_type,
            self.name,
            self.params
                .iter()
                .map(Param::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

// ============================================================================
// Type Normalization
// ============================================================================

/// Collapse whitespace to single spaces and make pointer stars standalone
/// tokens, so `int *x` and `int* x` declare the same type.
pub fn normalize_type(raw: &str) -> String {
    raw.replace('*', " * ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_params(args: &str, decl: &str) -> ParseResult<Vec<Param>> {
    let trimmed = args.trim();
    // `(void)` is the C spelling of the empty parameter list.
    if trimmed.is_empty() || trimmed == "void" {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|piece| parse_param(piece, decl))
        .collect()
}

fn parse_param(piece: &str, decl: &str) -> ParseResult<Param> {
    let piece = piece.trim();
    let malformed = || ParseError::MalformedDeclaration {
        text: decl.to_string(),
    };

    // The name is the trailing identifier run; everything before it is
    // the type.
    let name_start = piece
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)
        .ok_or_else(malformed)?;
    let name = &piece[name_start..];
    let ty = normalize_type(&piece[..name_start]);
    if ty.is_empty() {
        return Err(malformed());
    }
    Ok(Param {
        ty,
        name: name.to_string(),
    })
}

// ============================================================================
// Header Scanning
// ============================================================================

/// Every declaration found in one header, in source order.
#[derive(Debug, Clone, Default)]
pub struct HeaderScan {
    /// Short names in declaration order.
    pub order: Vec<String>,
    /// Short name to signature.
    pub signatures: BTreeMap<String, Signature>,
}

/// Extract all declarations from header text via exhaustive
/// non-overlapping scanning.
///
/// Returns the declarations in source order. An exact re-declaration is
/// skipped; two distinct declarations collapsing to one short name abort
/// the scan with [`ParseError::DuplicateShortName`].
pub fn scan_header(text: &str, module: &str) -> ParseResult<HeaderScan> {
    let mut scan = HeaderScan::default();
    for caps in DECL_RE.captures_iter(text) {
        let sig = Signature::from_captures(&caps, module.to_string())?;
        let short = sig.short_name();
        match scan.signatures.get(&short) {
            Some(existing) if existing.name == sig.name && *existing == sig => {
                tracing::debug!(module, short = %short, "skipping exact re-declaration");
            }
            Some(existing) => {
                return Err(ParseError::DuplicateShortName {
                    short,
                    first: existing.name.clone(),
                    second: sig.name,
                });
            }
            None => {
                scan.order.push(short.clone());
                scan.signatures.insert(short, sig);
            }
        }
    }
    tracing::debug!(module, functions = scan.order.len(), "scanned header");
    Ok(scan)
}

// ============================================================================
// Tests
// ============================================================================
