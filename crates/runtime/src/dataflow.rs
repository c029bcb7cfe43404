//! Dataflow variables
//!
//! A dfvar starts unbound. `await` on an unbound variable suspends; the first
//! `bind` stores the value and resumes every waiter, each on its own later
//! turn and in the order they started waiting. Binding an already bound
//! variable is a no-op (logged at debug level): the first writer wins.

use crate::interpreter::resume_later;
use crate::scheduler::{self, later};
use slang_core::{Continuation, DataflowVar, Env, SlangResult, Stack, Value};
use std::rc::Rc;

/// `dfvar` ( :name -- dfvar ): a fresh unbound variable
pub fn dfvar(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let name = stack.peek_symbol("dfvar", 0)?;
    stack.drop_n("dfvar", 1)?;
    Ok(stack.with(Value::Dataflow(Rc::new(DataflowVar::new(name)))))
}

/// `bind` ( value dfvar -- ): bind once; later binds are ignored
pub fn bind(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let var = stack.peek_dataflow("bind", 0)?;
    stack.require("bind", 2)?;
    stack.drop_n("bind", 1)?;
    let value = stack.pop("bind")?;

    match var.bind(value.clone()) {
        Some(waiters) => {
            tracing::trace!(var = var.name(), waiters = waiters.len(), "bound");
            for waker in waiters {
                let value = value.clone();
                later(move || waker(value));
            }
        }
        None => tracing::debug!(var = var.name(), "already bound; ignoring bind"),
    }
    Ok(stack)
}

/// `bound?` ( dfvar -- bool )
pub fn is_bound(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let var = stack.peek_dataflow("bound?", 0)?;
    stack.drop_n("bound?", 1)?;
    Ok(stack.with(Value::Bool(var.is_bound())))
}

/// Resume `k` with the variable's value, suspending until it is bound
pub fn wait(var: &Rc<DataflowVar>, stack: Stack, k: Continuation) {
    if let Some(value) = var.value() {
        return resume_later(k, Ok(stack.with(value)));
    }
    let parked_in = scheduler::epoch();
    var.add_waiter(Box::new(move |value| {
        if scheduler::is_abandoned(parked_in) {
            tracing::debug!(epoch = parked_in, "dropping await from an abandoned evaluation");
            return;
        }
        k.resume(Ok(stack.with(value)));
    }));
}
