//! Runtime Error Handling
//!
//! Two channels carry failures out of the kernel:
//!
//! - [`SlangError`]: recoverable failures returned as `Result` from primitives
//!   and delivered through continuations. A primitive that returns an error
//!   has left its stack untouched.
//! - The diagnostic sink: a thread-local list of out-of-band reports for
//!   conditions that do not abort the program (an unresolved word, a `send`
//!   nobody answers). Hosts drain it after an evaluation.
//!
//! # Usage
//!
//! ```ignore
//! if env.lookup(name).is_none() {
//!     report_diagnostic(format!("unresolved word `{}`", name));
//! }
//!
//! for message in take_diagnostics() {
//!     eprintln!("warning: {}", message);
//! }
//! ```

use crate::value::Kind;
use std::cell::RefCell;
use thiserror::Error;

pub type SlangResult<T> = Result<T, SlangError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlangError {
    #[error("{op}: expected {expected}, got {actual}")]
    TypeMismatch {
        op: String,
        expected: Kind,
        actual: Kind,
    },

    #[error("{op}: stack underflow (needs {needed}, has {depth})")]
    StackUnderflow {
        op: String,
        needed: usize,
        depth: usize,
    },

    #[error("unresolved word `{0}`")]
    UnresolvedWord(String),

    #[error("{op}: not running inside a process")]
    NoOwningProcess { op: String },

    #[error("receive: process {pid} already has a pending receiver")]
    ReceiverPending { pid: u64 },

    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{op}: {message}")]
    InvalidArgument { op: String, message: String },

    #[error("evaluation suspended with no runnable work left")]
    Stalled,

    #[error("scheduler turn limit of {0} exceeded")]
    TurnLimit(u64),
}

impl SlangError {
    pub fn type_mismatch(op: &str, expected: Kind, actual: Kind) -> Self {
        SlangError::TypeMismatch {
            op: op.to_string(),
            expected,
            actual,
        }
    }

    pub fn invalid(op: &str, message: impl Into<String>) -> Self {
        SlangError::InvalidArgument {
            op: op.to_string(),
            message: message.into(),
        }
    }
}

thread_local! {
    /// Out-of-band diagnostics reported since the last drain
    static DIAGNOSTICS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Record a diagnostic without interrupting evaluation
pub fn report_diagnostic(msg: impl Into<String>) {
    let msg = msg.into();
    tracing::warn!("{}", msg);
    DIAGNOSTICS.with(|d| d.borrow_mut().push(msg));
}

/// Take (and clear) all pending diagnostics
pub fn take_diagnostics() -> Vec<String> {
    DIAGNOSTICS.with(|d| std::mem::take(&mut *d.borrow_mut()))
}

/// Check if there are pending diagnostics
pub fn has_diagnostics() -> bool {
    DIAGNOSTICS.with(|d| !d.borrow().is_empty())
}

/// Clear any pending diagnostics
pub fn clear_diagnostics() {
    DIAGNOSTICS.with(|d| d.borrow_mut().clear());
}
