//! Structural definition finding.
//!
//! Compiles a [`Signature`] into a pattern that matches its definition
//! inside arbitrary source text: the declaration without the linkage
//! marker, immediately followed by an opening `{`. The match is
//! whitespace-tolerant and token-exact: a renamed parameter, an extra
//! qualifier, or reordered parameters all count as "not found". This is a
//! best-effort structural check against the header as the source of
//! truth, not semantic equivalence.

use regex::Regex;

use crate::signature::Signature;

/// Build the definition-matching pattern for a signature.
///
/// Tokens are joined by `\s+` where two word tokens meet and `\s*` around
/// punctuation; the whole pattern is anchored at a line start so a
/// preceding qualifier (`static void foo` vs `void foo`) can never
/// produce a false positive. An empty parameter list also matches the C
/// `(void)` spelling.
pub fn definition_pattern(sig: &Signature) -> Result<Regex, regex::Error> {
    let mut tokens: Vec<&str> = sig.return_type.split(' ').collect();
    tokens.push(&sig.name);

    let mut pattern = String::from(r"(?m)^[ \t]*");
    let mut prev_word = false;
    for (i, token) in tokens.iter().enumerate() {
        let word = starts_word(token);
        if i > 0 {
            pattern.push_str(if prev_word && word { r"\s+" } else { r"\s*" });
        }
        pattern.push_str(&regex::escape(token));
        prev_word = ends_word(token);
    }

    pattern.push_str(r"\s*\(");
    if sig.params.is_empty() {
        pattern.push_str(r"\s*(?:void\s*)?");
    } else {
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                pattern.push_str(r"\s*,");
            }
            pattern.push_str(r"\s*");
            let mut prev_word = false;
            for (j, token) in param.ty.split(' ').chain([param.name.as_str()]).enumerate() {
                let word = starts_word(token);
                if j > 0 {
                    pattern.push_str(if prev_word && word { r"\s+" } else { r"\s*" });
                }
                pattern.push_str(&regex::escape(token));
                prev_word = ends_word(token);
            }
        }
        pattern.push_str(r"\s*");
    }
    pattern.push_str(r"\)\s*\{");

    Regex::new(&pattern)
}

/// Whether a definition for this exact structural signature is present in
/// the source text.
pub fn find_definition(sig: &Signature, source: &str) -> Result<bool, regex::Error> {
    Ok(definition_pattern(sig)?.is_match(source))
}

fn starts_word(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ends_word(token: &str) -> bool {
    token
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Tests
// ============================================================================
