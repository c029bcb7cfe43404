//! Closure capture for block literals
//!
//! A block becomes a closure the first time the interpreter pushes it: every
//! word in its instruction sequence that resolves in the current
//! environment is recorded, name to value, in the block's capture map.
//! Words inside nested literals are resolved in the same scan, so their
//! values are fixed when the outer block is created.
//!
//! A nested literal gets its own capture map when it is itself first pushed.
//! That happens while the enclosing block runs, inside an activation seeded
//! from the enclosing snapshot, so the nested map sees the values the outer
//! scan fixed plus whatever the running body has defined by then (its
//! locals, the name of the word being run).
//!
//! The capture map is written once per literal: a literal reached again
//! (a loop body, a block inside a function called twice) keeps its first
//! snapshot.

use slang_core::{Bindings, Block, Env, Value};
use std::rc::Rc;

/// Resolve the free words of an instruction sequence, nested literals
/// included, against `env`
pub fn capture_bindings(code: &[Value], env: &Env) -> Bindings {
    let mut captured = Bindings::new();
    scan(code, env, &mut captured);
    captured
}

fn scan(code: &[Value], env: &Env, captured: &mut Bindings) {
    for instr in code {
        match instr {
            Value::Word(name) => {
                if !captured.contains_key(name)
                    && let Some(value) = env.lookup(name)
                {
                    captured.insert(name.clone(), value);
                }
            }
            Value::Block(inner) => scan(inner.code(), env, captured),
            _ => {}
        }
    }
}

/// Instantiate `block` against `env`, returning its capture map. Idempotent.
pub fn instantiate(block: &Rc<Block>, env: &Env) -> Rc<Bindings> {
    if let Some(captured) = block.captured() {
        return captured.clone();
    }

    let captured = block
        .capture_with(|| capture_bindings(block.code(), env))
        .clone();
    tracing::trace!(captured = captured.len(), "instantiated block");
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::read;

    fn literal(source: &str) -> Rc<Block> {
        match read(source).unwrap().remove(0) {
            Value::Block(block) => block,
            other => panic!("expected block, got {}", other),
        }
    }

    #[test]
    fn test_captures_only_resolvable_words() {
        let env = Env::new();
        env.define("x", Value::Number(1.0));
        let block = literal("[ x y x 3 :x ]");

        let captured = instantiate(&block, &env);
        assert_eq!(captured.len(), 1);
        assert_eq!(captured.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_snapshot_survives_rebinding() {
        let env = Env::new();
        env.define("w", Value::Number(1.0));
        let block = literal("[ w ]");
        instantiate(&block, &env);

        env.define("w", Value::Number(2.0));
        let again = instantiate(&block, &env);
        assert_eq!(again.get("w"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_nested_words_resolve_with_the_outer_block() {
        let env = Env::new();
        env.define("outer", Value::Number(1.0));
        env.define("inner", Value::Number(2.0));
        let block = literal("[ outer [ inner [ deepest ] ] ]");

        let captured = instantiate(&block, &env);
        assert_eq!(captured.get("outer"), Some(&Value::Number(1.0)));
        assert_eq!(captured.get("inner"), Some(&Value::Number(2.0)));
        assert!(!captured.contains_key("deepest"));

        let Value::Block(nested) = &block.code()[1] else {
            panic!("expected nested block");
        };
        assert!(!nested.is_instantiated());
    }
}
