//! Primitive registry
//!
//! [`install`] binds every built-in word into an environment. The table is
//! the single place where a word's spelling meets its implementation and
//! calling convention.

use crate::{arithmetic, channel, dataflow, io, process, quotations, stack_ops, vocab};
use slang_core::{Continuation, Env, Primitive, SlangResult, Stack};

type SyncWord = fn(&Env, Stack) -> SlangResult<Stack>;
type AsyncWord = fn(&Env, Stack, Continuation);

const SYNC_WORDS: &[(&str, SyncWord)] = &[
    // Stack
    ("dup", stack_ops::dup),
    ("drop", stack_ops::drop_top),
    ("swap", stack_ops::swap),
    ("over", stack_ops::over),
    ("rot", stack_ops::rot),
    ("nip", stack_ops::nip),
    ("depth", stack_ops::depth),
    ("clear", stack_ops::clear),
    // Arithmetic
    ("+", arithmetic::add),
    ("-", arithmetic::subtract),
    ("*", arithmetic::multiply),
    ("/", arithmetic::divide),
    ("mod", arithmetic::modulo),
    ("neg", arithmetic::negate),
    ("abs", arithmetic::abs),
    ("sqrt", arithmetic::sqrt),
    ("min", arithmetic::min),
    ("max", arithmetic::max),
    ("=", arithmetic::equal),
    ("!=", arithmetic::not_equal),
    ("<", arithmetic::less),
    (">", arithmetic::greater),
    ("<=", arithmetic::less_equal),
    (">=", arithmetic::greater_equal),
    ("not", arithmetic::not),
    ("and", arithmetic::and),
    ("or", arithmetic::or),
    // Definitions and modules
    ("def", quotations::def),
    ("defun", quotations::defun),
    ("use", vocab::use_vocab),
    ("new", vocab::new_object),
    ("get", vocab::get),
    ("put", vocab::put),
    // Processes and messaging
    ("go", process::go),
    ("self", process::current),
    ("done?", process::is_done),
    ("post", channel::post),
    ("mailbox", channel::own_mailbox),
    // Dataflow
    ("dfvar", dataflow::dfvar),
    ("bind", dataflow::bind),
    ("bound?", dataflow::is_bound),
    // Output
    ("print", io::print),
    ("show", io::show),
];

const ASYNC_WORDS: &[(&str, AsyncWord)] = &[
    ("do", quotations::do_block),
    ("if", quotations::if_block),
    ("branch", quotations::branch),
    ("times", quotations::times),
    ("vocab", vocab::vocab),
    ("send", vocab::send),
    ("await", process::await_value),
    ("receive", channel::receive),
    ("yield", process::yield_turn),
    ("after", process::after),
];

/// Names of every built-in word, sorted
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SYNC_WORDS
        .iter()
        .map(|(name, _)| *name)
        .chain(ASYNC_WORDS.iter().map(|(name, _)| *name))
        .collect();
    names.sort_unstable();
    names
}

/// Bind every built-in word in `env`'s current frame
pub fn install(env: &Env) {
    for &(name, f) in SYNC_WORDS {
        env.define(name, Primitive::sync(name, f));
    }
    for &(name, f) in ASYNC_WORDS {
        env.define(name, Primitive::asynchronous(name, f));
    }
    tracing::trace!(words = SYNC_WORDS.len() + ASYNC_WORDS.len(), "installed builtins");
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::Value;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names = names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_install_binds_every_word() {
        let env = Env::new();
        install(&env);
        for name in names() {
            assert!(
                matches!(env.lookup(name), Some(Value::Primitive(_))),
                "{} not bound",
                name
            );
        }
    }

    #[test]
    fn test_calling_conventions() {
        let env = Env::new();
        install(&env);
        let is_async = |name: &str| match env.lookup(name) {
            Some(Value::Primitive(p)) => p.is_async(),
            _ => panic!("{} missing", name),
        };
        assert!(is_async("do"));
        assert!(is_async("receive"));
        assert!(!is_async("go"));
        assert!(!is_async("bind"));
    }
}
