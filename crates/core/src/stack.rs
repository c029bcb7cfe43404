//! Stack Implementation
//!
//! A growable vector of [`Value`]s, top at the end, plus a back-reference to
//! the process that owns it (`None` for the host's stack). `receive` uses the
//! owner to find the mailbox to drain.
//!
//! Primitives take the stack by value and return it, so a primitive's effect
//! is exactly the difference between what it was given and what it hands
//! back. Typed accessors peek without popping: a primitive checks all of its
//! operands first and only then mutates, so a type failure leaves nothing
//! half-applied.

use crate::error::{SlangError, SlangResult};
use crate::process::{DataflowVar, ProcessRef};
use crate::value::{Block, Kind, Name, Value, Vocab};
use std::fmt;
use std::rc::Rc;

#[derive(Default)]
pub struct Stack {
    items: Vec<Value>,
    owner: Option<ProcessRef>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(items: Vec<Value>) -> Self {
        Stack { items, owner: None }
    }

    /// An empty stack tagged with its owning process
    pub fn owned_by(owner: ProcessRef) -> Self {
        Stack {
            items: Vec::new(),
            owner: Some(owner),
        }
    }

    pub fn owner(&self) -> Option<&ProcessRef> {
        self.owner.as_ref()
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Push, returning the stack (for continuation call sites)
    pub fn with(mut self, value: Value) -> Self {
        self.items.push(value);
        self
    }

    pub fn pop(&mut self, op: &str) -> SlangResult<Value> {
        self.require(op, 1)?;
        self.items
            .pop()
            .ok_or_else(|| self.underflow(op, 1))
    }

    /// The value `depth` entries below the top (0 = top)
    pub fn peek(&self, op: &str, depth: usize) -> SlangResult<&Value> {
        self.require(op, depth + 1)?;
        Ok(&self.items[self.items.len() - 1 - depth])
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.items
    }

    pub fn into_values(self) -> Vec<Value> {
        self.items
    }

    pub fn top(&self) -> Option<&Value> {
        self.items.last()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove the top `n` values (after they have been checked)
    pub fn drop_n(&mut self, op: &str, n: usize) -> SlangResult<()> {
        self.require(op, n)?;
        let keep = self.items.len() - n;
        self.items.truncate(keep);
        Ok(())
    }

    /// Fail with `StackUnderflow` unless at least `needed` values are present
    pub fn require(&self, op: &str, needed: usize) -> SlangResult<()> {
        if self.items.len() < needed {
            return Err(self.underflow(op, needed));
        }
        Ok(())
    }

    fn underflow(&self, op: &str, needed: usize) -> SlangError {
        SlangError::StackUnderflow {
            op: op.to_string(),
            needed,
            depth: self.items.len(),
        }
    }

    // Typed peeks: each fails with TypeMismatch naming the expected kind.

    pub fn peek_number(&self, op: &str, depth: usize) -> SlangResult<f64> {
        match self.peek(op, depth)? {
            Value::Number(n) => Ok(*n),
            other => Err(SlangError::type_mismatch(op, Kind::Number, other.kind())),
        }
    }

    pub fn peek_block(&self, op: &str, depth: usize) -> SlangResult<Rc<Block>> {
        match self.peek(op, depth)? {
            Value::Block(b) => Ok(b.clone()),
            other => Err(SlangError::type_mismatch(op, Kind::Block, other.kind())),
        }
    }

    pub fn peek_symbol(&self, op: &str, depth: usize) -> SlangResult<Name> {
        match self.peek(op, depth)? {
            Value::Symbol(name) => Ok(name.clone()),
            other => Err(SlangError::type_mismatch(op, Kind::Symbol, other.kind())),
        }
    }

    pub fn peek_vocab(&self, op: &str, depth: usize) -> SlangResult<Rc<Vocab>> {
        match self.peek(op, depth)? {
            Value::Vocab(v) => Ok(v.clone()),
            other => Err(SlangError::type_mismatch(op, Kind::Vocabulary, other.kind())),
        }
    }

    pub fn peek_process(&self, op: &str, depth: usize) -> SlangResult<ProcessRef> {
        match self.peek(op, depth)? {
            Value::Process(p) => Ok(p.clone()),
            other => Err(SlangError::type_mismatch(op, Kind::Process, other.kind())),
        }
    }

    pub fn peek_dataflow(&self, op: &str, depth: usize) -> SlangResult<Rc<DataflowVar>> {
        match self.peek(op, depth)? {
            Value::Dataflow(var) => Ok(var.clone()),
            other => Err(SlangError::type_mismatch(op, Kind::Dataflow, other.kind())),
        }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("items", &self.items)
            .field("owner", &self.owner.as_ref().map(|p| p.id()))
            .finish()
    }
}

/// Renders bottom to top, e.g. `1 2 "three"`
impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}
