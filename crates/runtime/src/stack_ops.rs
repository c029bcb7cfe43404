//! Stack shuffling words
//!
//! Stack effects use the usual notation, top of stack on the right.

use slang_core::{Env, SlangResult, Stack, Value};

/// `dup` ( a -- a a )
pub fn dup(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let top = stack.peek("dup", 0)?.clone();
    stack.push(top);
    Ok(stack)
}

/// `drop` ( a -- )
pub fn drop_top(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.drop_n("drop", 1)?;
    Ok(stack)
}

/// `swap` ( a b -- b a )
pub fn swap(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("swap", 2)?;
    let b = stack.pop("swap")?;
    let a = stack.pop("swap")?;
    Ok(stack.with(b).with(a))
}

/// `over` ( a b -- a b a )
pub fn over(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let a = stack.peek("over", 1)?.clone();
    stack.push(a);
    Ok(stack)
}

/// `rot` ( a b c -- b c a )
pub fn rot(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("rot", 3)?;
    let c = stack.pop("rot")?;
    let b = stack.pop("rot")?;
    let a = stack.pop("rot")?;
    Ok(stack.with(b).with(c).with(a))
}

/// `nip` ( a b -- b )
pub fn nip(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("nip", 2)?;
    let b = stack.pop("nip")?;
    stack.drop_n("nip", 1)?;
    Ok(stack.with(b))
}

/// `depth` ( -- n )
pub fn depth(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    let n = stack.depth() as f64;
    Ok(stack.with(Value::Number(n)))
}

/// `clear` ( ... -- )
pub fn clear(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.clear();
    Ok(stack)
}
