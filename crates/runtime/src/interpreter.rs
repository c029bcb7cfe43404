//! The interpreter loop
//!
//! `run` walks an instruction sequence from a starting index:
//!
//! - a word is looked up in the environment; a primitive found there is
//!   invoked, any other value is pushed
//! - a block literal is instantiated (its free words captured) and pushed
//! - every other literal is pushed as is
//!
//! A synchronous primitive returns the new stack and the loop carries on in
//! the same turn. An asynchronous primitive is handed a continuation that
//! re-enters the loop just past the call, and the current invocation returns
//! [`Completion::Suspended`] at once. Nothing after the call runs until some
//! later turn resumes that continuation, so the suspended run is never
//! re-entered while it is still on the native stack.
//!
//! When a continuation `k` is supplied, the final stack (or the failure that
//! ended the run) is delivered to `k` on a later turn and `run` itself always
//! reports `Suspended`.

use crate::closures;
use crate::config;
use crate::scheduler::later;
use slang_core::{
    Behavior, Continuation, Env, Outcome, SlangError, SlangResult, Stack, Value,
    report_diagnostic,
};
use std::rc::Rc;

/// How a call to [`run`] ended
#[derive(Debug)]
pub enum Completion {
    /// Ran to the end in this turn without a continuation to hand off to
    Returned(Stack),
    /// Control passed to an asynchronous primitive or to the continuation
    Suspended,
}

pub fn run(
    env: &Env,
    code: &Rc<[Value]>,
    start: usize,
    mut stack: Stack,
    k: Option<Continuation>,
) -> SlangResult<Completion> {
    let mut pc = start;

    while let Some(instr) = code.get(pc) {
        pc += 1;

        let value = match instr {
            Value::Word(name) => match resolve(env, name) {
                Ok(value) => value,
                Err(e) => return fail(e, k),
            },
            Value::Block(block) => {
                closures::instantiate(block, env);
                stack.push(instr.clone());
                continue;
            }
            literal => {
                stack.push(literal.clone());
                continue;
            }
        };

        let prim = match value {
            Value::Primitive(prim) => prim,
            other => {
                stack.push(other);
                continue;
            }
        };

        match prim.behavior() {
            Behavior::Sync(f) => match f(env, stack) {
                Ok(next) => stack = next,
                Err(e) => return fail(e, k),
            },
            Behavior::Async(f) => {
                let resume = resume_at(env.clone(), code.clone(), pc, k);
                f(env, stack, resume);
                return Ok(Completion::Suspended);
            }
        }
    }

    match k {
        Some(k) => {
            later(move || k.resume(Ok(stack)));
            Ok(Completion::Suspended)
        }
        None => Ok(Completion::Returned(stack)),
    }
}

/// Run from `start` and deliver the outcome to `k`
pub fn run_then(env: &Env, code: &Rc<[Value]>, start: usize, stack: Stack, k: Continuation) {
    // With a continuation every outcome, failures included, travels through `k`.
    if let Err(e) = run(env, code, start, stack, Some(k)) {
        report_diagnostic(format!("run: {}", e));
    }
}

/// Resume `k` with `outcome` on a later turn.
///
/// Asynchronous primitives use this for every path that does not already
/// wait on an external event, so their continuations never run inside the
/// turn that invoked them.
pub fn resume_later(k: Continuation, outcome: Outcome) {
    later(move || k.resume(outcome));
}

fn resolve(env: &Env, name: &str) -> SlangResult<Value> {
    if let Some(value) = env.lookup(name) {
        return Ok(value);
    }
    if config::strict_words() {
        return Err(SlangError::UnresolvedWord(name.to_string()));
    }
    report_diagnostic(format!("unresolved word `{}`", name));
    Ok(Value::Nil)
}

fn fail(e: SlangError, k: Option<Continuation>) -> SlangResult<Completion> {
    match k {
        Some(k) => {
            resume_later(k, Err(e));
            Ok(Completion::Suspended)
        }
        None => Err(e),
    }
}

/// Continuation that picks the loop back up at `pc`.
///
/// Without an outer continuation the rest of the run is detached: its final
/// stack is dropped and a failure can only be reported.
fn resume_at(env: Env, code: Rc<[Value]>, pc: usize, k: Option<Continuation>) -> Continuation {
    Continuation::new(move |outcome| match (outcome, k) {
        (Ok(stack), k) => match run(&env, &code, pc, stack, k) {
            Ok(Completion::Returned(stack)) => {
                tracing::debug!(depth = stack.depth(), "detached run finished");
            }
            Ok(Completion::Suspended) => {}
            Err(e) => report_diagnostic(format!("detached run failed: {}", e)),
        },
        (Err(e), Some(k)) => k.resume(Err(e)),
        (Err(e), None) => report_diagnostic(format!("detached run failed: {}", e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::run_until_idle;
    use slang_core::{Primitive, read, take_diagnostics};
    use std::cell::RefCell;

    fn code(source: &str) -> Rc<[Value]> {
        read(source).unwrap().into()
    }

    fn env_with_add() -> Env {
        let env = Env::new();
        env.define(
            "+",
            Primitive::sync("+", |_, mut stack| {
                let b = stack.peek_number("+", 0)?;
                let a = stack.peek_number("+", 1)?;
                stack.drop_n("+", 2)?;
                Ok(stack.with(Value::Number(a + b)))
            }),
        );
        env.define(
            "pause",
            Primitive::asynchronous("pause", |_, stack, k| resume_later(k, Ok(stack))),
        );
        env
    }

    fn returned(completion: SlangResult<Completion>) -> Vec<Value> {
        match completion {
            Ok(Completion::Returned(stack)) => stack.into_values(),
            other => panic!("expected Returned, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_run_returns_stack() {
        let env = env_with_add();
        let values = returned(run(&env, &code("1 2 + :k"), 0, Stack::new(), None));
        assert_eq!(values, vec![Value::Number(3.0), Value::symbol("k")]);
    }

    #[test]
    fn test_non_primitive_bindings_are_pushed() {
        let env = env_with_add();
        env.define("answer", Value::Number(42.0));
        let values = returned(run(&env, &code("answer answer +"), 0, Stack::new(), None));
        assert_eq!(values, vec![Value::Number(84.0)]);
    }

    #[test]
    fn test_unresolved_word_pushes_nil_and_reports() {
        take_diagnostics();
        let env = Env::new();
        let values = returned(run(&env, &code("frobnicate"), 0, Stack::new(), None));
        assert_eq!(values, vec![Value::Nil]);
        assert!(take_diagnostics()[0].contains("frobnicate"));
    }

    #[test]
    fn test_block_literals_are_instantiated_when_pushed() {
        let env = env_with_add();
        env.define("x", Value::Number(1.0));
        let values = returned(run(&env, &code("[ x + ]"), 0, Stack::new(), None));
        let Value::Block(block) = &values[0] else {
            panic!("expected block");
        };
        let captured = block.captured().unwrap();
        assert_eq!(captured.get("x"), Some(&Value::Number(1.0)));
        assert!(captured.contains_key("+"));
    }

    #[test]
    fn test_async_primitive_suspends_and_resumes() {
        let env = env_with_add();
        let result = Rc::new(RefCell::new(None));
        let sink = result.clone();
        let k = Continuation::new(move |outcome| *sink.borrow_mut() = Some(outcome));

        let completion = run(&env, &code("1 pause 2 +"), 0, Stack::new(), Some(k)).unwrap();
        assert!(matches!(completion, Completion::Suspended));
        assert!(result.borrow().is_none());

        run_until_idle(None).unwrap();
        let stack = result.borrow_mut().take().unwrap().unwrap();
        assert_eq!(stack.into_values(), vec![Value::Number(3.0)]);
    }

    #[test]
    fn test_failure_is_delivered_to_continuation() {
        let env = env_with_add();
        let result = Rc::new(RefCell::new(None));
        let sink = result.clone();
        let k = Continuation::new(move |outcome| *sink.borrow_mut() = Some(outcome));

        run_then(&env, &code("pause :a 1 +"), 0, Stack::new(), k);
        run_until_idle(None).unwrap();
        let err = result.borrow_mut().take().unwrap().unwrap_err();
        assert!(matches!(err, SlangError::TypeMismatch { .. }));
    }

    #[test]
    fn test_strict_words_fail_fast() {
        config::install(config::RuntimeConfig::new().with_strict_words(true));
        let env = Env::new();
        let err = run(&env, &code("1 missing"), 0, Stack::new(), None).unwrap_err();
        config::install(config::RuntimeConfig::default());
        assert_eq!(err, SlangError::UnresolvedWord("missing".to_string()));
    }
}
