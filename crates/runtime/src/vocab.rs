//! Vocabularies and objects
//!
//! `vocab` runs a block and keeps what it defined. The body runs like any
//! other block: an activation holding only the block's captures, with a
//! scope on top that receives the definitions. Only that scope is
//! harvested, so the captures the body needed do not leak into the
//! vocabulary.
//!
//! Objects pair a property map with a vocabulary. `send` looks a message up
//! in the properties first, then the vocabulary, and runs what it finds with
//! the object pushed as the receiver.

use crate::closures;
use crate::interpreter::{resume_later, run_then};
use crate::quotations::{activation, pop_block, run_block};
use crate::scheduler::later;
use slang_core::{
    Behavior, Continuation, Env, Kind, Object, SlangError, SlangResult, Stack, Value, Vocab,
    report_diagnostic,
};
use std::rc::Rc;

/// `vocab` ( blk -- vocab ): run a block and package its definitions
pub fn vocab(env: &Env, mut stack: Stack, k: Continuation) {
    let block = match pop_block(&mut stack, "vocab") {
        Ok(block) => block,
        Err(e) => return resume_later(k, Err(e)),
    };
    let captured = closures::instantiate(&block, env);
    let code = block.code().clone();

    later(move || {
        let env = activation(&captured, None);
        let inner = env.enter_scope();
        let harvest = env.clone();

        run_then(
            &env,
            &code,
            0,
            stack,
            Continuation::new(move |outcome| {
                let defined = harvest.innermost();
                inner.leave();
                let outcome = outcome.map(|stack| {
                    tracing::debug!(names = defined.len(), "harvested vocabulary");
                    stack.with(Value::Vocab(Rc::new(Vocab::new(defined))))
                });
                k.resume(outcome);
            }),
        );
    });
}

/// `use` ( vocab -- ): import every binding into the current scope
pub fn use_vocab(env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let vocab = stack.peek_vocab("use", 0)?;
    stack.drop_n("use", 1)?;
    env.import(vocab.bindings());
    Ok(stack)
}

/// `new` ( vocab -- obj ): an object with no properties
pub fn new_object(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let vocab = stack.peek_vocab("new", 0)?;
    stack.drop_n("new", 1)?;
    Ok(stack.with(Value::Object(Rc::new(Object::new(vocab)))))
}

/// `get` ( target :key -- value ): read an object property (falling back to
/// its vocabulary) or a vocabulary binding; `nil` when absent
pub fn get(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let key = stack.peek_symbol("get", 0)?;
    let found = match stack.peek("get", 1)? {
        Value::Object(obj) => obj.lookup(&key),
        Value::Vocab(vocab) => vocab.get(&key).cloned(),
        other => return Err(SlangError::type_mismatch("get", Kind::Object, other.kind())),
    };
    stack.drop_n("get", 2)?;
    Ok(stack.with(found.unwrap_or(Value::Nil)))
}

/// `put` ( value obj :key -- ): set an object property
pub fn put(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let key = stack.peek_symbol("put", 0)?;
    let obj = match stack.peek("put", 1)? {
        Value::Object(obj) => obj.clone(),
        other => return Err(SlangError::type_mismatch("put", Kind::Object, other.kind())),
    };
    stack.require("put", 3)?;
    stack.drop_n("put", 2)?;
    let value = stack.pop("put")?;
    obj.put(key, value);
    Ok(stack)
}

/// `send` ( ... obj :msg -- ... ): run the method bound to `msg` with the
/// object on top of the stack.
///
/// An unknown message is reported as a diagnostic and the stack is handed
/// back untouched.
pub fn send(env: &Env, mut stack: Stack, k: Continuation) {
    let operands = (|| -> SlangResult<_> {
        let message = stack.peek_symbol("send", 0)?;
        match stack.peek("send", 1)? {
            Value::Object(obj) => Ok((obj.clone(), message)),
            other => Err(SlangError::type_mismatch("send", Kind::Object, other.kind())),
        }
    })();
    let (obj, message) = match operands {
        Ok(operands) => operands,
        Err(e) => return resume_later(k, Err(e)),
    };

    let Some(method) = obj.lookup(&message) else {
        report_diagnostic(format!("send: object does not understand `{}`", message));
        return resume_later(k, Ok(stack));
    };

    if let Err(e) = stack.drop_n("send", 2) {
        return resume_later(k, Err(e));
    }
    let receiver = Value::Object(obj);

    match method {
        Value::Block(block) => run_block(env, &block, stack.with(receiver), k),
        Value::Primitive(prim) => match prim.behavior() {
            Behavior::Sync(f) => resume_later(k, f(env, stack.with(receiver))),
            Behavior::Async(f) => f(env, stack.with(receiver), k),
        },
        value => resume_later(k, Ok(stack.with(value))),
    }
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use slang_core::{Value, take_diagnostics};

    #[test]
    fn test_vocab_harvests_only_definitions() {
        let interp = Interpreter::new();
        let stack = interp
            .eval("10 :base def [ base 1 + :next def [ 2 * ] :twice defun ] vocab")
            .unwrap();
        let Some(Value::Vocab(vocab)) = stack.top() else {
            panic!("expected vocabulary, got {}", stack);
        };
        let names: Vec<String> = vocab.names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["next", "twice"]);
        assert_eq!(vocab.get("next"), Some(&Value::Number(11.0)));
    }

    #[test]
    fn test_use_imports_bindings() {
        let interp = Interpreter::new();
        let stack = interp
            .eval("[ [ dup * ] :square defun ] vocab :math def  math use  7 square")
            .unwrap();
        assert_eq!(stack.into_values(), vec![Value::Number(49.0)]);
    }

    #[test]
    fn test_objects_properties_and_send() {
        let source = "
            [ [ :count get 1 + ] :next defun ] vocab new :counter def
            41 counter :count put
            counter :next send
            counter :count get
        ";
        let stack = Interpreter::new().eval(source).unwrap();
        assert_eq!(
            stack.into_values(),
            vec![Value::Number(42.0), Value::Number(41.0)]
        );
    }

    #[test]
    fn test_send_unknown_message_keeps_stack() {
        take_diagnostics();
        let interp = Interpreter::new();
        let stack = interp.eval("[ ] vocab new :nothing send").unwrap();
        assert_eq!(stack.depth(), 2);
        assert!(matches!(stack.values()[0], Value::Object(_)));
        assert_eq!(stack.values()[1], Value::symbol("nothing"));
        assert!(take_diagnostics().iter().any(|d| d.contains("nothing")));
    }

    #[test]
    fn test_property_shadows_method() {
        let source = "
            [ :from-vocab :greeting def ] vocab new :o def
            o :greeting get
            :own o :greeting put
            o :greeting get
        ";
        let stack = Interpreter::new().eval(source).unwrap();
        assert_eq!(
            stack.into_values(),
            vec![Value::symbol("from-vocab"), Value::symbol("own")]
        );
    }
}
