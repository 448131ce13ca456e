//! Unified error type and stable exit codes.
//!
//! Subsystem errors ([`ParseError`](crate::signature::ParseError),
//! [`DbError`](crate::db::DbError)) are bridged into a single
//! [`SyncError`] via `From` impls, and every `SyncError` maps to a
//! stable [`OutputErrorCode`] used as the process exit code:
//!
//! - `2`: invalid arguments (bad input from the caller)
//! - `3`: header parse failure (malformed declaration, duplicate short
//!   name)
//! - `4`: workflow failure (I/O, database write, interaction)
//! - `6`: declared-but-unimplemented command, distinct from "unknown
//!   command" (which the argument parser rejects with code 2 before any
//!   module is touched)
//! - `10`: internal errors (bugs, unexpected state)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::db::DbError;
use crate::signature::ParseError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from the caller.
    InvalidArguments = 2,
    /// A header failed to parse.
    ParseFailure = 3,
    /// A workflow step failed (I/O, database write, interaction).
    WorkflowFailure = 4,
    /// A declared-but-unimplemented command was invoked.
    NotImplemented = 6,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the CLI surface.
///
/// All subsystem errors are converted to this before being rendered to
/// the operator and mapped to an exit code.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A header failed to parse.
    #[error("failed to parse {header}: {source}")]
    Parse {
        header: PathBuf,
        source: ParseError,
    },

    /// A header could not be read at all.
    #[error("failed to read header {path}: {source}")]
    HeaderRead { path: PathBuf, source: io::Error },

    /// Database persistence failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// I/O failure during a workflow step.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A synthesized definition pattern failed to compile.
    #[error("definition pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// A command that is declared but intentionally unimplemented.
    #[error("command '{command}' is not implemented")]
    NotImplemented { command: String },

    /// Invalid arguments from the caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

/// Result type for workflow operations.
pub type SyncResult<T> = Result<T, SyncError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&SyncError> for OutputErrorCode {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::Parse { .. } => OutputErrorCode::ParseFailure,
            SyncError::HeaderRead { .. } => OutputErrorCode::ParseFailure,
            SyncError::Db(_) => OutputErrorCode::WorkflowFailure,
            SyncError::Io(_) => OutputErrorCode::WorkflowFailure,
            SyncError::Pattern(_) => OutputErrorCode::InternalError,
            SyncError::NotImplemented { .. } => OutputErrorCode::NotImplemented,
            SyncError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            SyncError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<SyncError> for OutputErrorCode {
    fn from(err: SyncError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl SyncError {
    /// A parse failure attributed to a header file.
    pub fn parse(header: impl Into<PathBuf>, source: ParseError) -> Self {
        SyncError::Parse {
            header: header.into(),
            source,
        }
    }

    /// An invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        SyncError::InvalidArguments {
            message: message.into(),
        }
    }

    /// A not-implemented command error.
    pub fn not_implemented(command: impl Into<String>) -> Self {
        SyncError::NotImplemented {
            command: command.into(),
        }
    }

    /// An internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::InternalError {
            message: message.into(),
        }
    }

    /// Get the exit code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
