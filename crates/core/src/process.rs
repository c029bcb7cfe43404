//! Process, mailbox and dataflow cells
//!
//! These are the only values shared between processes. All of their state
//! changes happen synchronously inside one scheduler turn, so plain `Cell`
//! and `RefCell` are enough: there is never a second thread to race with.
//!
//! Scheduling (waking receivers, delivering results on a later turn) is the
//! runtime's job. The types here only hold state and hand back the callbacks
//! that became runnable.

use crate::env::Env;
use crate::error::SlangError;
use crate::value::{Name, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One-shot callback fed the value a waiter was blocked on
pub type Waker = Box<dyn FnOnce(Value)>;

// Unique process ID generation
static NEXT_PROCESS_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, first turn not yet taken
    Waiting,
    Running,
    /// Result available; notify list drained
    Done,
}

pub type ProcessRef = Rc<Process>;

/// Process: an isolated unit of execution with its own environment,
/// stack and mailbox
pub struct Process {
    id: u64,
    env: Env,
    mailbox: Rc<Mailbox>,
    state: Cell<ProcessState>,
    result: RefCell<Option<Value>>,
    failure: RefCell<Option<SlangError>>,
    notify: RefCell<Vec<Waker>>,
}

impl Process {
    pub fn new(env: Env) -> ProcessRef {
        let id = NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed);
        Rc::new(Process {
            id,
            env,
            mailbox: Rc::new(Mailbox::new(id)),
            state: Cell::new(ProcessState::Waiting),
            result: RefCell::new(None),
            failure: RefCell::new(None),
            notify: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn mailbox(&self) -> &Rc<Mailbox> {
        &self.mailbox
    }

    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    pub fn is_done(&self) -> bool {
        self.state.get() == ProcessState::Done
    }

    pub fn mark_running(&self) {
        if self.state.get() == ProcessState::Waiting {
            self.state.set(ProcessState::Running);
        }
    }

    /// The result, once the process is done
    pub fn result(&self) -> Option<Value> {
        self.result.borrow().clone()
    }

    /// The error that ended the process early, if any
    pub fn failure(&self) -> Option<SlangError> {
        self.failure.borrow().clone()
    }

    /// Queue a callback for the result. Callers check [`Process::result`]
    /// first; a done process never reads this list again.
    pub fn add_notify(&self, waker: Waker) {
        self.notify.borrow_mut().push(waker);
    }

    pub fn pending_notifications(&self) -> usize {
        self.notify.borrow().len()
    }

    /// Transition to done and hand back every queued callback.
    ///
    /// Only the first call has any effect; later calls return nothing, so
    /// each callback fires at most once.
    pub fn complete(&self, result: Value, failure: Option<SlangError>) -> Vec<Waker> {
        if self.is_done() {
            return Vec::new();
        }
        self.state.set(ProcessState::Done);
        *self.result.borrow_mut() = Some(result);
        *self.failure.borrow_mut() = failure;
        std::mem::take(&mut *self.notify.borrow_mut())
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("mailbox", &self.mailbox.len())
            .finish()
    }
}

/// Mailbox: FIFO message queue with at most one pending receiver
///
/// Arrival and registration are symmetric: posting to a mailbox with a
/// waiting receiver hands the receiver back to be woken; receiving from an
/// empty mailbox registers a waiter.
pub struct Mailbox {
    owner: u64,
    queue: RefCell<VecDeque<Value>>,
    receiver: RefCell<Option<Waker>>,
}

impl Mailbox {
    pub fn new(owner: u64) -> Self {
        Mailbox {
            owner,
            queue: RefCell::new(VecDeque::new()),
            receiver: RefCell::new(None),
        }
    }

    /// ID of the process that drains this mailbox
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Append a message, returning the receiver that was waiting for it
    pub fn post(&self, message: Value) -> Option<Waker> {
        self.queue.borrow_mut().push_back(message);
        self.receiver.borrow_mut().take()
    }

    pub fn take(&self) -> Option<Value> {
        self.queue.borrow_mut().pop_front()
    }

    /// Put a message taken by a receiver that will not consume it back at
    /// the head of the queue
    pub fn requeue(&self, message: Value) {
        self.queue.borrow_mut().push_front(message);
    }

    /// Register the single waiting receiver; a receiver already pending is
    /// left in place and the new one handed back
    pub fn wait(&self, waker: Waker) -> Result<(), Waker> {
        let mut slot = self.receiver.borrow_mut();
        if slot.is_some() {
            return Err(waker);
        }
        *slot = Some(waker);
        Ok(())
    }

    pub fn has_receiver(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("owner", &self.owner)
            .field("queued", &self.len())
            .field("receiver", &self.has_receiver())
            .finish()
    }
}

/// Dataflow variable: unbound until the first `bind`, bound forever after
pub struct DataflowVar {
    name: Name,
    value: RefCell<Option<Value>>,
    resume: RefCell<Vec<Waker>>,
}

impl DataflowVar {
    pub fn new(name: Name) -> Self {
        DataflowVar {
            name,
            value: RefCell::new(None),
            resume: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<Value> {
        self.value.borrow().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Queue a callback for the binding. Callers check [`DataflowVar::value`]
    /// first.
    pub fn add_waiter(&self, waker: Waker) {
        self.resume.borrow_mut().push(waker);
    }

    pub fn waiters(&self) -> usize {
        self.resume.borrow().len()
    }

    /// First writer wins. Returns the queued callbacks in FIFO order when
    /// this call bound the variable, `None` when it was already bound.
    pub fn bind(&self, value: Value) -> Option<Vec<Waker>> {
        if self.is_bound() {
            return None;
        }
        *self.value.borrow_mut() = Some(value);
        Some(std::mem::take(&mut *self.resume.borrow_mut()))
    }
}

impl fmt::Debug for DataflowVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataflowVar")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .field("waiters", &self.waiters())
            .finish()
    }
}
