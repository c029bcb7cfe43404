//! Environments: chains of binding frames
//!
//! An [`Env`] is a handle on the innermost frame of a chain. Lookup walks from
//! the innermost frame outward and returns the first match; `define` writes
//! into the innermost frame only. `enter` pushes an empty frame whose parent
//! is the previous innermost frame and `leave` pops back to it.
//!
//! Handles are cheap to clone and all clones see the same current frame, which
//! is what lets a continuation leave a scope that was entered turns earlier.
//! [`Scope`] packages that pairing: whichever way the block finishes, the
//! guard leaves exactly once.

use crate::error::report_diagnostic;
use crate::value::{Bindings, Name, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type FrameRef = Rc<RefCell<Frame>>;

#[derive(Default)]
struct Frame {
    bindings: Bindings,
    parent: Option<FrameRef>,
}

impl Frame {
    fn child_of(parent: FrameRef) -> FrameRef {
        Rc::new(RefCell::new(Frame {
            bindings: Bindings::new(),
            parent: Some(parent),
        }))
    }
}

#[derive(Clone)]
pub struct Env {
    current: Rc<RefCell<FrameRef>>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// A root environment with a single empty frame
    pub fn new() -> Self {
        Env {
            current: Rc::new(RefCell::new(Rc::new(RefCell::new(Frame::default())))),
        }
    }

    /// A new environment whose single frame is linked to `parent`'s current
    /// frame. Bindings later added to that frame stay visible.
    pub fn with_parent(parent: &Env) -> Self {
        Env {
            current: Rc::new(RefCell::new(Frame::child_of(parent.frame()))),
        }
    }

    /// A root environment seeded with a copy of `bindings` and no link to any
    /// other chain. Spawned processes start from one of these.
    pub fn seeded(bindings: &Bindings) -> Self {
        let env = Env::new();
        env.import(bindings);
        env
    }

    fn frame(&self) -> FrameRef {
        self.current.borrow().clone()
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self.frame());
        while let Some(current) = frame {
            let borrowed = current.borrow();
            if let Some(value) = borrowed.bindings.get(name) {
                return Some(value.clone());
            }
            frame = borrowed.parent.clone();
        }
        None
    }

    /// Bind `name` in the innermost frame, shadowing any outer binding
    pub fn define(&self, name: impl Into<Name>, value: Value) {
        self.frame().borrow_mut().bindings.insert(name.into(), value);
    }

    pub fn enter(&self) {
        let child = Frame::child_of(self.frame());
        *self.current.borrow_mut() = child;
    }

    /// Pop the innermost frame. Leaving the root frame is reported and
    /// ignored.
    pub fn leave(&self) {
        let parent = self.frame().borrow().parent.clone();
        match parent {
            Some(parent) => *self.current.borrow_mut() = parent,
            None => report_diagnostic("leave: no scope to leave at the root frame"),
        }
    }

    /// Enter a scope and return the guard that leaves it
    pub fn enter_scope(&self) -> Scope {
        let saved = self.frame();
        self.enter();
        Scope {
            env: self.clone(),
            saved: Some(saved),
        }
    }

    /// Bulk-copy bindings into the innermost frame; later imports win on
    /// collisions
    pub fn import(&self, bindings: &Bindings) {
        let frame = self.frame();
        let mut frame = frame.borrow_mut();
        for (name, value) in bindings {
            frame.bindings.insert(name.clone(), value.clone());
        }
    }

    /// Copy of the innermost frame's bindings
    pub fn innermost(&self) -> Bindings {
        self.frame().borrow().bindings.clone()
    }

    /// Number of frames in the chain
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = Some(self.frame());
        while let Some(current) = frame {
            depth += 1;
            frame = current.borrow().parent.clone();
        }
        depth
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("depth", &self.depth())
            .field("innermost", &self.frame().borrow().bindings.len())
            .finish()
    }
}

/// Guard for one `enter`: restores the frame that was current when the scope
/// was entered, exactly once, on [`Scope::leave`] or on drop
pub struct Scope {
    env: Env,
    saved: Option<FrameRef>,
}

impl Scope {
    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn leave(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.env.current.borrow_mut() = saved;
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.restore();
    }
}
