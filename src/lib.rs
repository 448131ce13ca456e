//! declsync: keeps a C library's header declarations, implementation
//! files, and test files consistent.
//!
//! A library is organized as one header + one source directory + one
//! test directory per logical module. declsync parses the declarations
//! out of each header, locates their definitions structurally, diffs the
//! discovered state against a persisted database, and reconciles drift
//! interactively.

// Core infrastructure - re-exported from declsync-core
pub use declsync_core::confirm;
pub use declsync_core::db;
pub use declsync_core::diff;
pub use declsync_core::error;
pub use declsync_core::finder;
pub use declsync_core::locate;
pub use declsync_core::signature;

// Front door
pub mod cli;

// Workflow operations
pub mod ops;
