//! Slang Runtime: interpreter loop, cooperative scheduler and primitives
//!
//! Key design principles:
//! - One thread, one task queue: every suspension point resumes on a later
//!   turn, never inside the turn that suspended
//! - Primitives declare their calling convention (sync or async) up front
//! - Blocks capture their free words when first pushed and run against
//!   those captures alone, never against the caller's scope
//!
//! # Embedding
//!
//! ```ignore
//! let interp = Interpreter::new();
//! let stack = interp.eval("[ 6 7 * ] go await")?;
//! assert_eq!(stack.top(), Some(&Value::Number(42.0)));
//! ```
//!
//! [`Interpreter::eval`] runs the program, drains the scheduler (including
//! any processes the program spawned) and hands back the final stack.

pub mod arithmetic;
pub mod builtins;
pub mod channel;
pub mod closures;
pub mod config;
pub mod dataflow;
pub mod interpreter;
pub mod io;
pub mod process;
pub mod quotations;
pub mod report;
pub mod scheduler;
pub mod stack_ops;
pub mod vocab;

pub use config::RuntimeConfig;
pub use interpreter::{Completion, resume_later, run, run_then};
pub use quotations::run_block;
pub use scheduler::{SchedulerStats, after, later, run_until_idle};

use slang_core::{Continuation, Env, Outcome, SlangError, SlangResult, Stack, Value, read};
use std::cell::RefCell;
use std::rc::Rc;

/// A root environment with every built-in word, plus the configuration
/// evaluations run under
pub struct Interpreter {
    env: Env,
    config: RuntimeConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let env = Env::new();
        builtins::install(&env);
        Interpreter { env, config }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Bind a host value (typically a [`slang_core::Primitive`]) in the
    /// root environment
    pub fn define(&self, name: &str, value: Value) {
        self.env.define(name, value);
    }

    /// Read and run `source` on an empty stack
    pub fn eval(&self, source: &str) -> SlangResult<Stack> {
        self.eval_with(source, Stack::new())
    }

    /// Read and run `source` on top of an existing stack
    pub fn eval_with(&self, source: &str, stack: Stack) -> SlangResult<Stack> {
        let code = read(source)?;
        self.eval_code(code, stack)
    }

    /// Run a program and drain the scheduler.
    ///
    /// Fails with `Stalled` when the queue empties while the program itself
    /// is still suspended (an `await` nothing will satisfy, a `receive` no one
    /// will post to). With a turn limit configured, fails with `TurnLimit` and
    /// discards whatever work was still queued.
    ///
    /// A failed evaluation is abandoned as a whole: continuations it left
    /// parked on dataflow variables, processes or mailboxes are dropped
    /// instead of resuming during a later evaluation. A message that would
    /// have woken such a receiver stays queued.
    pub fn eval_code(&self, code: Vec<Value>, stack: Stack) -> SlangResult<Stack> {
        config::install(self.config.clone());
        let epoch = scheduler::begin_epoch();
        let code: Rc<[Value]> = code.into();

        let slot: Rc<RefCell<Option<Outcome>>> = Rc::new(RefCell::new(None));
        let sink = slot.clone();
        run_then(
            &self.env,
            &code,
            0,
            stack,
            Continuation::new(move |outcome| *sink.borrow_mut() = Some(outcome)),
        );

        let turns = match scheduler::run_until_idle(self.config.max_turns) {
            Ok(turns) => turns,
            Err(e) => {
                scheduler::abandon_epoch(epoch);
                scheduler::discard_pending();
                return Err(e);
            }
        };
        tracing::debug!(turns, epoch, "evaluation drained");

        let outcome = slot.borrow_mut().take();
        outcome.unwrap_or_else(|| {
            scheduler::abandon_epoch(epoch);
            Err(SlangError::Stalled)
        })
    }
}
