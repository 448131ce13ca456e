//! Command-line surface and dispatch.
//!
//! The command set mirrors the original maintenance tool: `check`
//! (default), `update`, `code_pop`, `code_gen`, and the two declared but
//! intentionally unimplemented commands `tests_pop` and `tests_gen`.
//! With a header argument one module is processed; without it, every
//! module already in the database.
//!
//! The database is loaded once, mutated in memory, and saved at most
//! once at the very end, gated by a final confirmation and the "did
//! anything actually change" fingerprint check.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use declsync_core::confirm::{Decider, Gate, Importance, Reply, ASK_EVERYTHING};
use declsync_core::db::{Database, DB_FILE_NAME};
use declsync_core::error::{SyncError, SyncResult};

use crate::ops::{
    check_module, code_gen_module, code_pop_module, update_module, Session,
};

// ============================================================================
// Argument Surface
// ============================================================================

/// Keeps a C library's header declarations, implementations, and tests
/// consistent.
#[derive(Debug, Parser)]
#[command(name = "declsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database file (default: fun_db.json next to the target header,
    /// or in the current directory when no header is given)
    #[arg(long, short = 'd', global = true)]
    pub database: Option<PathBuf>,

    /// Extension for the database backup
    #[arg(long, short = 'b', global = true, default_value = "bak")]
    pub backup: String,

    /// Don't keep any database backup
    #[arg(long, global = true)]
    pub no_backup: bool,

    /// Confirmation level: 0 accepts everything silently, 3 asks for
    /// every decision
    #[arg(long, short = 'a', global = true, default_value_t = ASK_EVERYTHING)]
    pub ask_level: u8,

    /// Print check reports as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Target selection shared by every command.
#[derive(Debug, Default, Args)]
pub struct Target {
    /// The header file to process (default: every module in the
    /// database)
    pub header: Option<PathBuf>,

    /// Only consider these functions (comma-separated short names)
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub functions: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Report drift between the database, headers, code, and tests
    Check(Target),
    /// Reconcile the database with what the header and directories show
    Update(Target),
    /// Propose code-association buckets for unclaimed functions
    #[command(name = "code_pop")]
    CodePop(Target),
    /// Create missing implementation files and stub definitions
    #[command(name = "code_gen")]
    CodeGen(Target),
    /// Populate test associations (not implemented)
    #[command(name = "tests_pop")]
    TestsPop(Target),
    /// Generate test files (not implemented)
    #[command(name = "tests_gen")]
    TestsGen(Target),
}

impl Command {
    fn target(&self) -> &Target {
        match self {
            Command::Check(t)
            | Command::Update(t)
            | Command::CodePop(t)
            | Command::CodeGen(t)
            | Command::TestsPop(t)
            | Command::TestsGen(t) => t,
        }
    }
}

// ============================================================================
// Terminal Decider
// ============================================================================

/// Decision provider backed by the controlling terminal: prompts on
/// stderr, reads answers from stdin. End of input takes the default.
#[derive(Debug, Default)]
pub struct TerminalDecider;

impl Decider for TerminalDecider {
    fn decide(&self, prompt: &str, default: bool) -> io::Result<Reply> {
        let fallback = if default { Reply::Yes } else { Reply::No };
        loop {
            eprint!("{prompt} [y/n/all/none] ");
            io::stderr().flush()?;
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(fallback);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(fallback),
                "y" | "yes" => return Ok(Reply::Yes),
                "n" | "no" => return Ok(Reply::No),
                "a" | "all" => return Ok(Reply::YesAll),
                "none" => return Ok(Reply::NoAll),
                other => eprintln!("unrecognized answer '{other}'"),
            }
        }
    }

    fn input(&self, prompt: &str) -> io::Result<String> {
        eprint!("{prompt}");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run the parsed command line to completion.
pub fn run(cli: Cli) -> SyncResult<()> {
    let command = cli.command.unwrap_or(Command::Check(Target::default()));

    // Refuse the declared-but-unimplemented commands before any module
    // is touched.
    match &command {
        Command::TestsPop(_) => return Err(SyncError::not_implemented("tests_pop")),
        Command::TestsGen(_) => return Err(SyncError::not_implemented("tests_gen")),
        _ => {}
    }

    let target = command.target();
    let (db_path, root, modules_from_header) = resolve_paths(cli.database, target.header.as_deref())?;
    let db = Database::load(&db_path);

    let modules = match modules_from_header {
        Some(module) => vec![module],
        None => {
            let names = db.module_names();
            if names.is_empty() {
                tracing::warn!(database = %db_path.display(), "database is empty; nothing to do");
            }
            names
        }
    };

    let backup = if cli.no_backup {
        None
    } else {
        Some(cli.backup.clone())
    };
    let gate = Gate::new(cli.ask_level, Box::new(TerminalDecider));
    let mut session = Session::new(root, db, gate, target.functions.clone());

    for module in &modules {
        match &command {
            Command::Check(_) => {
                let report = check_module(&session, module)?;
                if cli.json {
                    let rendered = serde_json::to_string_pretty(&report).map_err(|err| {
                        SyncError::internal(format!("failed to render report: {err}"))
                    })?;
                    println!("{rendered}");
                } else {
                    println!("Checking {module} ...");
                    print!("{report}");
                    println!();
                }
            }
            Command::Update(_) => update_module(&mut session, module)?,
            Command::CodePop(_) => code_pop_module(&mut session, module)?,
            Command::CodeGen(_) => code_gen_module(&mut session, module)?,
            Command::TestsPop(_) | Command::TestsGen(_) => unreachable!("rejected above"),
        }
    }

    offer_save(&mut session, &db_path, backup.as_deref())
}

/// Save the database if anything actually changed, gated by a final
/// confirmation.
fn offer_save(session: &mut Session, db_path: &Path, backup: Option<&str>) -> SyncResult<()> {
    if !session.db.dirty() {
        tracing::debug!("database unchanged; not saving");
        return Ok(());
    }
    session.gate.reset();
    let prompt = format!("save database to {}?", db_path.display());
    if session.gate.confirm(Importance::Critical, false, &prompt)? {
        session.db.save(db_path, backup)?;
        println!("database saved to {}", db_path.display());
    } else {
        println!("changes discarded");
    }
    Ok(())
}

/// Resolve the database path, library root, and (with a header given)
/// the single module to process.
fn resolve_paths(
    database: Option<PathBuf>,
    header: Option<&Path>,
) -> SyncResult<(PathBuf, PathBuf, Option<String>)> {
    match header {
        Some(header) => {
            let root = header
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            let module = module_name_of(header)?;
            let db_path = database.unwrap_or_else(|| root.join(DB_FILE_NAME));
            Ok((db_path, root, Some(module)))
        }
        None => {
            let db_path = database.unwrap_or_else(|| PathBuf::from(DB_FILE_NAME));
            let root = db_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            Ok((db_path, root, None))
        }
    }
}

/// Module name of a header: the file name up to the first dot.
fn module_name_of(header: &Path) -> SyncResult<String> {
    let name = header
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SyncError::invalid_args(format!("bad header path: {}", header.display())))?;
    let module = name.split('.').next().unwrap_or(name);
    if module.is_empty() {
        return Err(SyncError::invalid_args(format!(
            "cannot derive a module name from {}",
            header.display()
        )));
    }
    Ok(module.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod module_names {
        use super::*;

        #[test]
        fn strips_everything_after_the_first_dot() {
            assert_eq!(module_name_of(Path::new("lib/foo.h")).unwrap(), "foo");
            assert_eq!(module_name_of(Path::new("foo.in.h")).unwrap(), "foo");
            assert_eq!(module_name_of(Path::new("foo")).unwrap(), "foo");
        }

        #[test]
        fn dotfile_header_is_invalid() {
            assert!(module_name_of(Path::new(".h")).is_err());
        }
    }

    mod path_resolution {
        use super::*;

        #[test]
        fn header_sets_root_and_default_database() {
            let (db, root, module) =
                resolve_paths(None, Some(Path::new("lib/foo.h"))).unwrap();
            assert_eq!(db, PathBuf::from("lib/fun_db.json"));
            assert_eq!(root, PathBuf::from("lib"));
            assert_eq!(module.as_deref(), Some("foo"));
        }

        #[test]
        fn bare_header_name_uses_the_current_directory() {
            let (db, root, _) = resolve_paths(None, Some(Path::new("foo.h"))).unwrap();
            assert_eq!(root, PathBuf::from("."));
            assert_eq!(db, PathBuf::from("./fun_db.json"));
        }

        #[test]
        fn database_override_wins() {
            let (db, _, _) = resolve_paths(
                Some(PathBuf::from("/tmp/db.json")),
                Some(Path::new("lib/foo.h")),
            )
            .unwrap();
            assert_eq!(db, PathBuf::from("/tmp/db.json"));
        }

        #[test]
        fn no_header_roots_at_the_database_parent() {
            let (db, root, module) =
                resolve_paths(Some(PathBuf::from("lib/fun_db.json")), None).unwrap();
            assert_eq!(db, PathBuf::from("lib/fun_db.json"));
            assert_eq!(root, PathBuf::from("lib"));
            assert!(module.is_none());
        }
    }

    mod argument_surface {
        use super::*;

        #[test]
        fn command_names_use_underscores() {
            let cli = Cli::try_parse_from(["declsync", "code_pop", "foo.h"]).unwrap();
            assert!(matches!(cli.command, Some(Command::CodePop(_))));
        }

        #[test]
        fn missing_command_defaults_to_check() {
            let cli = Cli::try_parse_from(["declsync"]).unwrap();
            assert!(cli.command.is_none());
        }

        #[test]
        fn unknown_command_is_rejected() {
            assert!(Cli::try_parse_from(["declsync", "frobnicate"]).is_err());
        }

        #[test]
        fn functions_filter_splits_on_commas() {
            let cli =
                Cli::try_parse_from(["declsync", "check", "foo.h", "-f", "add,sub"]).unwrap();
            let Some(Command::Check(target)) = cli.command else {
                panic!("expected check");
            };
            assert_eq!(target.functions, vec!["add", "sub"]);
        }

        #[test]
        fn ask_level_defaults_to_everything() {
            let cli = Cli::try_parse_from(["declsync", "check"]).unwrap();
            assert_eq!(cli.ask_level, ASK_EVERYTHING);
        }
    }
}
