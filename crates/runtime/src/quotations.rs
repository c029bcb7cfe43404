//! Block evaluation and definitions
//!
//! Every way of running a block (`do`, a word made by `defun`, the branches
//! of `if`/`branch`, `times`) goes through [`run_block`]:
//!
//! 1. the block is instantiated if it has not been yet
//! 2. on a later turn an activation environment is built from the block's
//!    captured bindings alone, with an empty scope on top for locals
//! 3. the body runs; whichever way it ends, the local scope is left before
//!    the caller's continuation sees the outcome
//!
//! The activation has no link to the caller's environment. A word the
//! snapshot lacks resolves only if the body defines it first, so neither
//! the caller's locals nor globals defined after the block was created are
//! visible. Definitions made inside the body vanish with the activation.
//!
//! A word made by `defun` also binds its own name in each activation, which
//! is how recursion reaches it: the nested literals of its body are first
//! pushed inside that activation and capture the name from there.
//!
//! Starting each body on a later turn keeps the native stack flat no matter
//! how deep the language-level recursion goes.

use crate::closures;
use crate::interpreter::{resume_later, run_then};
use crate::scheduler::later;
use slang_core::{
    Bindings, Block, Continuation, Env, Name, Primitive, SlangError, SlangResult, Stack, Value,
};
use std::cell::OnceCell;
use std::rc::{Rc, Weak};

/// Run `block` in a fresh activation and resume `k` with the outcome
pub fn run_block(env: &Env, block: &Rc<Block>, stack: Stack, k: Continuation) {
    activate(env, block, None, stack, k);
}

/// The environment a block body runs in: its snapshot, then `own` (a
/// defun'd word's name and the word itself)
pub(crate) fn activation(captured: &Bindings, own: Option<(Name, Value)>) -> Env {
    let env = Env::seeded(captured);
    if let Some((name, word)) = own {
        env.define(name, word);
    }
    env
}

fn activate(
    env: &Env,
    block: &Rc<Block>,
    own: Option<(Name, Value)>,
    stack: Stack,
    k: Continuation,
) {
    let captured = closures::instantiate(block, env);
    let code = block.code().clone();

    later(move || {
        let env = activation(&captured, own);
        let locals = env.enter_scope();
        run_then(
            &env,
            &code,
            0,
            stack,
            Continuation::new(move |outcome| {
                locals.leave();
                k.resume(outcome);
            }),
        );
    });
}

/// Pop a block operand after checking it
pub(crate) fn pop_block(stack: &mut Stack, op: &str) -> SlangResult<Rc<Block>> {
    let block = stack.peek_block(op, 0)?;
    stack.drop_n(op, 1)?;
    Ok(block)
}

/// `do` ( ... blk -- ... ): run a block
pub fn do_block(env: &Env, mut stack: Stack, k: Continuation) {
    match pop_block(&mut stack, "do") {
        Ok(block) => run_block(env, &block, stack, k),
        Err(e) => resume_later(k, Err(e)),
    }
}

/// `def` ( value :name -- ): bind a value in the current scope
pub fn def(env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let name = stack.peek_symbol("def", 0)?;
    stack.require("def", 2)?;
    stack.drop_n("def", 1)?;
    let value = stack.pop("def")?;
    env.define(name, value);
    Ok(stack)
}

/// `defun` ( blk :name -- ): bind a word that runs the block when invoked
pub fn defun(env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let name = stack.peek_symbol("defun", 0)?;
    let block = stack.peek_block("defun", 1)?;
    stack.drop_n("defun", 2)?;

    closures::instantiate(&block, env);

    // The word refers to itself weakly; the definition keeps it alive.
    let this: Rc<OnceCell<Weak<Primitive>>> = Rc::new(OnceCell::new());
    let handle = this.clone();
    let own_name = name.clone();
    let word = Primitive::asynchronous(&name, move |env, stack, k| {
        let own = handle
            .get()
            .and_then(Weak::upgrade)
            .map(|word| (own_name.clone(), Value::Primitive(word)));
        activate(env, &block, own, stack, k)
    });
    if let Value::Primitive(prim) = &word {
        let _ = this.set(Rc::downgrade(prim));
    }
    env.define(name, word);
    Ok(stack)
}

/// `if` ( cond blk -- ... ): run the block when `cond` is truthy
pub fn if_block(env: &Env, mut stack: Stack, k: Continuation) {
    let operands = stack
        .peek_block("if", 0)
        .and_then(|block| Ok((stack.peek("if", 1)?.is_truthy(), block)));
    let (cond, block) = match operands {
        Ok(operands) => operands,
        Err(e) => return resume_later(k, Err(e)),
    };
    if let Err(e) = stack.drop_n("if", 2) {
        return resume_later(k, Err(e));
    }

    if cond {
        run_block(env, &block, stack, k);
    } else {
        resume_later(k, Ok(stack));
    }
}

/// `branch` ( cond then else -- ... ): run one of two blocks
pub fn branch(env: &Env, mut stack: Stack, k: Continuation) {
    let operands = (|| -> SlangResult<_> {
        let otherwise = stack.peek_block("branch", 0)?;
        let then = stack.peek_block("branch", 1)?;
        let cond = stack.peek("branch", 2)?.is_truthy();
        Ok((cond, then, otherwise))
    })();
    let (cond, then, otherwise) = match operands {
        Ok(operands) => operands,
        Err(e) => return resume_later(k, Err(e)),
    };
    if let Err(e) = stack.drop_n("branch", 3) {
        return resume_later(k, Err(e));
    }

    let chosen = if cond { then } else { otherwise };
    run_block(env, &chosen, stack, k);
}

/// `times` ( blk n -- ... ): run a block `n` times
pub fn times(env: &Env, mut stack: Stack, k: Continuation) {
    let operands = (|| -> SlangResult<_> {
        let n = stack.peek_number("times", 0)?;
        let block = stack.peek_block("times", 1)?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(SlangError::invalid(
                "times",
                format!("count must be a non-negative integer, got {}", n),
            ));
        }
        Ok((n as u64, block))
    })();
    let (n, block) = match operands {
        Ok(operands) => operands,
        Err(e) => return resume_later(k, Err(e)),
    };
    if let Err(e) = stack.drop_n("times", 2) {
        return resume_later(k, Err(e));
    }

    repeat(env.clone(), block, n, stack, k);
}

fn repeat(env: Env, block: Rc<Block>, remaining: u64, stack: Stack, k: Continuation) {
    if remaining == 0 {
        return resume_later(k, Ok(stack));
    }
    let next_env = env.clone();
    let next_block = block.clone();
    run_block(
        &env,
        &block,
        stack,
        Continuation::new(move |outcome| match outcome {
            Ok(stack) => repeat(next_env, next_block, remaining - 1, stack, k),
            Err(e) => k.resume(Err(e)),
        }),
    );
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use slang_core::{SlangError, Value};

    fn eval(source: &str) -> Vec<Value> {
        Interpreter::new().eval(source).unwrap().into_values()
    }

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().map(|n| Value::Number(*n)).collect()
    }

    #[test]
    fn test_do_runs_block() {
        assert_eq!(eval("3 [ dup * ] do"), numbers(&[9.0]));
    }

    #[test]
    fn test_def_inside_block_is_local() {
        let interp = Interpreter::new();
        let stack = interp.eval("[ 5 :tmp def tmp ] do").unwrap();
        assert_eq!(stack.into_values(), numbers(&[5.0]));
        assert_eq!(interp.env().lookup("tmp"), None);
    }

    #[test]
    fn test_defun_and_recursion() {
        let source = "
            [ dup 1 <= [ drop 1 ] [ dup 1 - fact * ] branch ] :fact defun
            5 fact
        ";
        assert_eq!(eval(source), numbers(&[120.0]));
    }

    #[test]
    fn test_if_and_branch() {
        assert_eq!(eval("1 true [ 1 + ] if"), numbers(&[2.0]));
        assert_eq!(eval("1 0 [ 1 + ] if"), numbers(&[1.0]));
        assert_eq!(eval("nil [ :yes ] [ :no ] branch"), vec![Value::symbol("no")]);
    }

    #[test]
    fn test_times_accumulates() {
        assert_eq!(eval("0 [ 2 + ] 5 times"), numbers(&[10.0]));
        assert_eq!(eval("7 [ drop ] 0 times"), numbers(&[7.0]));
    }

    #[test]
    fn test_deep_recursion_does_not_grow_native_stack() {
        let source = "
            [ dup 0 > [ 1 - countdown ] if ] :countdown defun
            2000 countdown
        ";
        assert_eq!(eval(source), numbers(&[0.0]));
    }

    #[test]
    fn test_failure_inside_block_leaves_scope() {
        let interp = Interpreter::new();
        let err = interp.eval("[ 1 :local def :oops 1 + ] do").unwrap_err();
        assert!(matches!(err, SlangError::TypeMismatch { .. }));
        assert_eq!(interp.env().lookup("local"), None);
        assert_eq!(interp.env().depth(), 1);
    }

    #[test]
    fn test_do_rejects_non_block() {
        let err = Interpreter::new().eval("3 do").unwrap_err();
        assert_eq!(err.to_string(), "do: expected block, got number");
    }
}
