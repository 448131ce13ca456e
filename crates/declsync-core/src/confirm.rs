//! Leveled, sticky confirmation gate.
//!
//! Every mutation in the reconciliation workflow passes through a
//! [`Gate`]: a query carries an [`Importance`] level, the gate carries a
//! configured ask level. Queries below the ask level are put to the
//! operator through an injectable [`Decider`]; the rest auto-accept.
//!
//! A query may be *stickable*: an operator answering "yes to all" or "no
//! to all" arms a memory that silently answers every later stickable
//! query in the same batch. Each workflow phase resets the memory on
//! entry, so a sweeping answer never leaks across phases.
//!
//! The `Decider` trait keeps the gate testable: production wires a
//! terminal implementation, tests wire [`ScriptedDecider`].

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

// ============================================================================
// Replies
// ============================================================================

/// One answer from the decision provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Accept this query.
    Yes,
    /// Decline this query.
    No,
    /// Accept this query and every later stickable query in the batch.
    YesAll,
    /// Decline this query and every later stickable query in the batch.
    NoAll,
}

impl Reply {
    /// Whether the reply accepts the query.
    pub fn accepted(self) -> bool {
        matches!(self, Reply::Yes | Reply::YesAll)
    }

    /// Whether the reply arms the sticky memory.
    pub fn sticky(self) -> bool {
        matches!(self, Reply::YesAll | Reply::NoAll)
    }
}

// ============================================================================
// Importance
// ============================================================================

/// How consequential a query is, as the minimum ask level at which it is
/// put to the operator. A gate with ask level below the query's
/// importance auto-accepts it, so the most consequential queries carry
/// the lowest threshold and survive even a terse ask level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Importance {
    /// The final database save and removals: asked at any ask level > 0.
    Critical = 1,
    /// File creation and stub writes.
    Destructive = 2,
    /// Additions and association updates.
    Routine = 3,
}

impl Importance {
    /// Numeric level of this importance.
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Highest ask level: every query is put to the operator.
pub const ASK_EVERYTHING: u8 = Importance::Routine as u8;

// ============================================================================
// Decider
// ============================================================================

/// Injectable decision provider.
///
/// Object-safe so the workflow can hold a `Box<dyn Decider>`: a terminal
/// implementation in production, a scripted one in tests.
pub trait Decider: Send + Sync {
    /// Answer a yes/no query. `default` is what an empty answer means.
    fn decide(&self, prompt: &str, default: bool) -> io::Result<Reply>;

    /// Ask for one line of free-form input.
    fn input(&self, prompt: &str) -> io::Result<String>;
}

/// Canned decision provider for tests and scripted runs.
///
/// Replies and inputs are consumed front to back; running out of replies
/// is an error so a test never silently auto-answers.
#[derive(Debug, Default)]
pub struct ScriptedDecider {
    replies: Mutex<VecDeque<Reply>>,
    inputs: Mutex<VecDeque<String>>,
}

impl ScriptedDecider {
    /// Create a provider answering with the given replies in order.
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        ScriptedDecider {
            replies: Mutex::new(replies.into_iter().collect()),
            inputs: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a free-form input line.
    pub fn push_input(&self, line: impl Into<String>) {
        self.inputs
            .lock()
            .expect("decider lock poisoned")
            .push_back(line.into());
    }

    /// Number of unconsumed replies.
    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("decider lock poisoned").len()
    }
}

impl Decider for ScriptedDecider {
    fn decide(&self, prompt: &str, _default: bool) -> io::Result<Reply> {
        self.replies
            .lock()
            .expect("decider lock poisoned")
            .pop_front()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no scripted reply left for: {prompt}"),
                )
            })
    }

    fn input(&self, prompt: &str) -> io::Result<String> {
        self.inputs
            .lock()
            .expect("decider lock poisoned")
            .pop_front()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no scripted input left for: {prompt}"),
                )
            })
    }
}

// ============================================================================
// Gate
// ============================================================================

/// The confirmation gate: ask level, sticky memory, decision provider.
pub struct Gate {
    ask_level: u8,
    sticky: Option<bool>,
    decider: Box<dyn Decider>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("ask_level", &self.ask_level)
            .field("sticky", &self.sticky)
            .finish_non_exhaustive()
    }
}

impl Gate {
    /// Create a gate. Ask level 0 auto-accepts everything;
    /// [`ASK_EVERYTHING`] prompts for every query.
    pub fn new(ask_level: u8, decider: Box<dyn Decider>) -> Self {
        Gate {
            ask_level,
            sticky: None,
            decider,
        }
    }

    /// Reset the sticky memory. Called on entry to each workflow phase.
    pub fn reset(&mut self) {
        self.sticky = None;
    }

    /// Whether queries of this importance reach the operator at all.
    pub fn asking(&self, importance: Importance) -> bool {
        self.ask_level >= importance.level()
    }

    /// Put a query through the gate.
    ///
    /// Auto-accepts below the ask level; otherwise consults the sticky
    /// memory (stickable queries only), then the decision provider. A
    /// `YesAll`/`NoAll` reply to a stickable query arms the memory.
    pub fn confirm(
        &mut self,
        importance: Importance,
        stickable: bool,
        prompt: &str,
    ) -> io::Result<bool> {
        if !self.asking(importance) {
            tracing::debug!(prompt, "auto-accepted below ask level");
            return Ok(true);
        }
        if stickable {
            if let Some(answer) = self.sticky {
                return Ok(answer);
            }
        }
        let reply = self.decider.decide(prompt, true)?;
        if stickable && reply.sticky() {
            self.sticky = Some(reply.accepted());
        }
        Ok(reply.accepted())
    }

    /// Ask for a whitespace- or comma-separated list of names.
    pub fn input_list(&self, prompt: &str) -> io::Result<Vec<String>> {
        let line = self.decider.input(prompt)?;
        Ok(line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(ask_level: u8, replies: &[Reply]) -> Gate {
        Gate::new(
            ask_level,
            Box::new(ScriptedDecider::with_replies(replies.iter().copied())),
        )
    }

    mod leveling {
        use super::*;

        #[test]
        fn level_zero_auto_accepts_everything() {
            let mut g = gate(0, &[]);
            assert!(g.confirm(Importance::Routine, true, "add?").unwrap());
            assert!(g.confirm(Importance::Critical, false, "save?").unwrap());
        }

        #[test]
        fn terse_ask_level_keeps_only_critical_queries() {
            // Ask level 1: critical queries prompt, routine ones pass.
            let mut g = gate(1, &[Reply::No]);
            assert!(g.confirm(Importance::Routine, false, "add?").unwrap());
            assert!(!g.confirm(Importance::Critical, false, "save?").unwrap());
        }

        #[test]
        fn asking_reflects_the_threshold() {
            let g = gate(2, &[]);
            assert!(g.asking(Importance::Critical));
            assert!(g.asking(Importance::Destructive));
            assert!(!g.asking(Importance::Routine));
        }
    }

    mod stickiness {
        use super::*;

        #[test]
        fn yes_all_answers_later_stickable_queries() {
            let mut g = gate(ASK_EVERYTHING, &[Reply::YesAll]);
            assert!(g.confirm(Importance::Routine, true, "first?").unwrap());
            // No replies left; the sticky memory must answer.
            assert!(g.confirm(Importance::Routine, true, "second?").unwrap());
            assert!(g.confirm(Importance::Routine, true, "third?").unwrap());
        }

        #[test]
        fn no_all_suppresses_later_stickable_queries() {
            let mut g = gate(ASK_EVERYTHING, &[Reply::NoAll]);
            assert!(!g.confirm(Importance::Routine, true, "first?").unwrap());
            assert!(!g.confirm(Importance::Routine, true, "second?").unwrap());
        }

        #[test]
        fn plain_yes_does_not_stick() {
            let mut g = gate(ASK_EVERYTHING, &[Reply::Yes, Reply::No]);
            assert!(g.confirm(Importance::Routine, true, "first?").unwrap());
            assert!(!g.confirm(Importance::Routine, true, "second?").unwrap());
        }

        #[test]
        fn non_stickable_queries_bypass_the_memory() {
            let mut g = gate(ASK_EVERYTHING, &[Reply::NoAll, Reply::Yes]);
            assert!(!g.confirm(Importance::Routine, true, "first?").unwrap());
            // A fresh, non-stickable query still reaches the decider.
            assert!(g.confirm(Importance::Critical, false, "save?").unwrap());
        }

        #[test]
        fn reset_clears_the_memory_between_phases() {
            let mut g = gate(ASK_EVERYTHING, &[Reply::NoAll, Reply::Yes]);
            assert!(!g.confirm(Importance::Routine, true, "first?").unwrap());
            g.reset();
            assert!(g.confirm(Importance::Routine, true, "next phase?").unwrap());
        }

        #[test]
        fn sticky_reply_on_non_stickable_query_does_not_arm() {
            let mut g = gate(ASK_EVERYTHING, &[Reply::YesAll, Reply::No]);
            assert!(g.confirm(Importance::Routine, false, "one-off?").unwrap());
            // Memory was not armed; the next stickable query prompts.
            assert!(!g.confirm(Importance::Routine, true, "second?").unwrap());
        }
    }

    mod scripted {
        use super::*;

        #[test]
        fn exhausted_script_is_an_error() {
            let mut g = gate(ASK_EVERYTHING, &[]);
            assert!(g.confirm(Importance::Routine, false, "anything?").is_err());
        }

        #[test]
        fn input_list_splits_on_whitespace_and_commas() {
            let decider = ScriptedDecider::default();
            decider.push_input("add, sub  mul");
            let g = Gate::new(ASK_EVERYTHING, Box::new(decider));
            assert_eq!(g.input_list("functions: ").unwrap(), vec!["add", "sub", "mul"]);
        }
    }
}
