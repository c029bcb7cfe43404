//! Output words
//!
//! `print` writes a line to standard output: strings as their raw text,
//! everything else in reader notation. `show` renders a value to a string
//! without printing it.
//!
//! Hosts and tests can redirect printed lines into a thread-local buffer
//! with [`capture_output`] and collect them with [`take_output`].

use slang_core::{Env, SlangResult, Stack, Value};
use std::cell::RefCell;
use std::io::Write;

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Start buffering printed lines on this thread instead of writing them
pub fn capture_output() {
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
}

/// Stop buffering and return what was printed since [`capture_output`]
pub fn take_output() -> Vec<String> {
    CAPTURED.with(|c| c.borrow_mut().take().unwrap_or_default())
}

fn emit(line: String) {
    let buffered = CAPTURED.with(|c| match c.borrow_mut().as_mut() {
        Some(lines) => {
            lines.push(line.clone());
            true
        }
        None => false,
    });
    if buffered {
        return;
    }

    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        tracing::warn!(error = %e, "print: could not write to stdout");
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// `print` ( value -- )
pub fn print(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let value = stack.pop("print")?;
    emit(render(&value));
    Ok(stack)
}

/// `show` ( value -- str )
pub fn show(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let value = stack.pop("show")?;
    Ok(stack.with(Value::string(&value.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_renders_strings_raw() {
        let env = Env::new();
        capture_output();
        let stack = Stack::from_values(vec![Value::string("hi \"there\""), Value::symbol("k")]);
        let stack = print(&env, stack).unwrap();
        print(&env, stack).unwrap();
        assert_eq!(take_output(), vec![":k", "hi \"there\""]);
    }

    #[test]
    fn test_show_uses_reader_notation() {
        let env = Env::new();
        let stack = show(&env, Stack::from_values(vec![Value::string("a\nb")])).unwrap();
        assert_eq!(stack.into_values(), vec![Value::string("\"a\\nb\"")]);
    }
}
