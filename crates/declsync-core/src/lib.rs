//! Core infrastructure for declsync.
//!
//! This crate provides the language-agnostic machinery for keeping a
//! C-style library's headers, implementation files, and test files
//! consistent:
//! - Signature parsing (structural, deliberately partial; no C front end)
//! - Code/test file location by naming convention
//! - Structural definition finding via synthesized patterns
//! - Drift classification between stored and discovered state
//! - The persisted function database with change fingerprinting
//! - The leveled, sticky confirmation gate
//! - Error types and stable exit codes

pub mod confirm;
pub mod db;
pub mod diff;
pub mod error;
pub mod finder;
pub mod locate;
pub mod signature;
