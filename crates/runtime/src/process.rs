//! Processes: spawning, joining and suspension
//!
//! `go` spawns a block as a process. The process gets:
//! - a detached environment seeded with a copy of the block's captures
//!   (nothing defined later in the parent is visible to it)
//! - a stack owned by the process, starting as `( parent self )`, where
//!   `parent` is the spawning process or `nil` from the host
//! - its own mailbox
//!
//! The body starts on a later turn. When it finishes, the top of its final
//! stack (or `nil` for an empty stack) becomes the result, every waiting
//! `await` is resumed with it, and later `await`s get it immediately. A body
//! that fails is logged and completes with `nil` so joiners never hang.
//!
//! `yield` and `after` are the plain suspension points: the former resumes
//! on the next turn, the latter once a delay has elapsed.

use crate::closures;
use crate::dataflow;
use crate::interpreter::{resume_later, run_then};
use crate::quotations::pop_block;
use crate::scheduler::{self, later};
use slang_core::{
    Continuation, Env, Kind, Outcome, Process, ProcessRef, SlangError, SlangResult, Stack, Value,
};
use std::time::Duration;
use tracing::{debug, error};

/// `go` ( blk -- proc ): spawn a block as a process
pub fn go(env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let block = pop_block(&mut stack, "go")?;
    let captured = closures::instantiate(&block, env);

    let process = Process::new(Env::seeded(&captured));
    let parent = stack
        .owner()
        .map(|p| Value::Process(p.clone()))
        .unwrap_or(Value::Nil);
    let child_stack = Stack::owned_by(process.clone())
        .with(parent)
        .with(Value::Process(process.clone()));

    scheduler::process_spawned();
    debug!(pid = process.id(), captured = captured.len(), "spawned process");

    let code = block.code().clone();
    let child = process.clone();
    later(move || {
        child.mark_running();
        let env = child.env().clone();
        let finished = child.clone();
        run_then(
            &env,
            &code,
            0,
            child_stack,
            Continuation::new(move |outcome| finish(&finished, outcome)),
        );
    });

    Ok(stack.with(Value::Process(process)))
}

fn finish(process: &ProcessRef, outcome: Outcome) {
    let (result, failure) = match outcome {
        Ok(stack) => (stack.into_values().pop().unwrap_or(Value::Nil), None),
        Err(e) => {
            error!(pid = process.id(), error = %e, "process failed");
            (Value::Nil, Some(e))
        }
    };

    scheduler::process_completed();
    let waiters = process.complete(result.clone(), failure);
    debug!(pid = process.id(), waiters = waiters.len(), "process done");
    for waker in waiters {
        waker(result.clone());
    }
}

/// `await` ( proc|dfvar -- value ): suspend until the result is available
pub fn await_value(_env: &Env, mut stack: Stack, k: Continuation) {
    let target = match stack.peek("await", 0) {
        Ok(target) => target.clone(),
        Err(e) => return resume_later(k, Err(e)),
    };
    if !matches!(target, Value::Process(_) | Value::Dataflow(_)) {
        let e = SlangError::type_mismatch("await", Kind::Process, target.kind());
        return resume_later(k, Err(e));
    }
    if let Err(e) = stack.drop_n("await", 1) {
        return resume_later(k, Err(e));
    }

    match target {
        Value::Dataflow(var) => dataflow::wait(&var, stack, k),
        Value::Process(process) => join(&process, stack, k),
        _ => {}
    }
}

fn join(process: &ProcessRef, stack: Stack, k: Continuation) {
    if let Some(result) = process.result() {
        return resume_later(k, Ok(stack.with(result)));
    }
    let parked_in = scheduler::epoch();
    process.add_notify(Box::new(move |result| {
        if scheduler::is_abandoned(parked_in) {
            debug!(epoch = parked_in, "dropping join from an abandoned evaluation");
            return;
        }
        resume_later(k, Ok(stack.with(result)));
    }));
}

/// `yield` ( -- ): resume on the next turn
pub fn yield_turn(_env: &Env, stack: Stack, k: Continuation) {
    resume_later(k, Ok(stack));
}

/// `after` ( ms -- ): resume once `ms` milliseconds have elapsed
pub fn after(_env: &Env, mut stack: Stack, k: Continuation) {
    let ms = match stack.peek_number("after", 0) {
        Ok(ms) if ms.is_finite() && ms >= 0.0 => ms,
        Ok(ms) => {
            let e = SlangError::invalid("after", format!("delay must be >= 0 ms, got {}", ms));
            return resume_later(k, Err(e));
        }
        Err(e) => return resume_later(k, Err(e)),
    };
    let Ok(delay) = Duration::try_from_secs_f64(ms / 1000.0) else {
        let e = SlangError::invalid("after", format!("delay of {} ms is out of range", ms));
        return resume_later(k, Err(e));
    };
    if let Err(e) = stack.drop_n("after", 1) {
        return resume_later(k, Err(e));
    }

    match scheduler::deadline(delay) {
        Ok(due) => scheduler::at(due, move || k.resume(Ok(stack))),
        Err(e) => resume_later(k, Err(e)),
    }
}

/// `self` ( -- proc|nil ): the process owning this stack
pub fn current(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    let me = stack
        .owner()
        .map(|p| Value::Process(p.clone()))
        .unwrap_or(Value::Nil);
    Ok(stack.with(me))
}

/// `done?` ( proc -- bool )
pub fn is_done(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let process = stack.peek_process("done?", 0)?;
    stack.drop_n("done?", 1)?;
    Ok(stack.with(Value::Bool(process.is_done())))
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use crate::scheduler;
    use slang_core::{SlangError, Value};
    use std::time::{Duration, Instant};

    #[test]
    fn test_go_and_await() {
        let stack = Interpreter::new().eval("[ 6 7 * ] go await").unwrap();
        assert_eq!(stack.into_values(), vec![Value::Number(42.0)]);
    }

    #[test]
    fn test_initial_stack_is_parent_and_self() {
        let interp = Interpreter::new();
        let stack = interp.eval("[ drop ] go await").unwrap();
        assert_eq!(stack.into_values(), vec![Value::Nil]);

        let stack = interp.eval("[ [ drop ] go await ] go await").unwrap();
        assert!(matches!(stack.top(), Some(Value::Process(_))));
    }

    #[test]
    fn test_await_is_idempotent() {
        let stack = Interpreter::new()
            .eval("[ :r ] go :p def  p await  p await  p yield await")
            .unwrap();
        assert_eq!(stack.into_values(), vec![Value::symbol("r"); 3]);
    }

    #[test]
    fn test_empty_result_is_nil() {
        let stack = Interpreter::new().eval("[ clear ] go await").unwrap();
        assert_eq!(stack.into_values(), vec![Value::Nil]);
    }

    #[test]
    fn test_failed_process_completes_with_nil() {
        let interp = Interpreter::new();
        let stack = interp.eval("[ :x 1 + ] go :p def  p await  p done?").unwrap();
        assert_eq!(stack.into_values(), vec![Value::Nil, Value::Bool(true)]);
    }

    #[test]
    fn test_self_outside_process_is_nil() {
        let stack = Interpreter::new().eval("self").unwrap();
        assert_eq!(stack.into_values(), vec![Value::Nil]);
    }

    #[test]
    fn test_after_waits() {
        let start = Instant::now();
        let stack = Interpreter::new().eval("15 after :woke").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(stack.into_values(), vec![Value::symbol("woke")]);

        let err = Interpreter::new().eval("-1 after").unwrap_err();
        assert!(matches!(err, SlangError::InvalidArgument { .. }));
    }

    #[test]
    fn test_after_rejects_out_of_range_delays() {
        for source in ["1e30 after", "1e300 after :unreached"] {
            let err = Interpreter::new().eval(source).unwrap_err();
            assert!(
                matches!(err, SlangError::InvalidArgument { ref op, .. } if op == "after"),
                "`{}` gave {:?}",
                source,
                err
            );
        }
        // fits a Duration but not the monotonic clock
        let err = Interpreter::new().eval("1e22 after").unwrap_err();
        assert!(matches!(err, SlangError::InvalidArgument { .. }));
    }

    #[test]
    fn test_spawn_counters() {
        scheduler::reset_stats();
        Interpreter::new()
            .eval("[ 1 ] go [ 2 ] go await swap await")
            .unwrap();
        let stats = scheduler::stats();
        assert_eq!(stats.processes_spawned, 2);
        assert_eq!(stats.processes_completed, 2);
        assert_eq!(stats.active_processes, 0);
        assert_eq!(stats.max_dispatch_depth, 1);
    }
}
