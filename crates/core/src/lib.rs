//! Slang Core: the data model of a small concatenative language
//!
//! This crate holds everything the interpreter manipulates but none of the
//! scheduling: values, stacks, environments, the process/mailbox/dataflow
//! cells, and the reader that turns source text into instruction sequences.
//!
//! Key design principles:
//! - Value: What the language talks about (numbers, words, blocks, processes...)
//! - Stack: An owned vector of values, threaded by value through primitives
//! - Env: A chain of binding frames shared by handle
//!
//! # Modules
//!
//! - `error`: `SlangError` and the thread-local diagnostic sink
//! - `value`: Value enum, blocks, primitives, continuations, vocabularies
//! - `process`: Process, Mailbox and DataflowVar cells
//! - `stack`: Stack operations and typed accessors
//! - `env`: Binding frames, scopes and the scope guard
//! - `reader`: Source text to program representation

pub mod env;
pub mod error;
pub mod process;
pub mod reader;
pub mod stack;
pub mod value;

// Re-export key types and functions
pub use env::{Env, Scope};
pub use error::{
    SlangError, SlangResult, clear_diagnostics, has_diagnostics, report_diagnostic,
    take_diagnostics,
};
pub use process::{DataflowVar, Mailbox, Process, ProcessRef, ProcessState, Waker};
pub use reader::{Reader, read};
pub use stack::Stack;
pub use value::{
    Behavior, Bindings, Block, Continuation, Kind, Name, Object, Outcome, Primitive, Value, Vocab,
};
