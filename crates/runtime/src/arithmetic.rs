//! Arithmetic, comparison and logic words
//!
//! Numbers are IEEE 754 doubles. Division and `mod` by zero are reported as
//! `InvalidArgument` rather than producing infinities. Equality compares any
//! two values (scalars by content, heap values by identity); ordering
//! comparisons want numbers. Logic words use truthiness: `false`, `nil` and
//! `0` are false.

use slang_core::{Env, SlangError, SlangResult, Stack, Value};

/// ( a b -- f(a, b) ) over two numbers
fn binary(
    op: &str,
    mut stack: Stack,
    f: impl FnOnce(f64, f64) -> SlangResult<Value>,
) -> SlangResult<Stack> {
    let b = stack.peek_number(op, 0)?;
    let a = stack.peek_number(op, 1)?;
    let result = f(a, b)?;
    stack.drop_n(op, 2)?;
    Ok(stack.with(result))
}

/// ( a -- f(a) ) over one number
fn unary(op: &str, mut stack: Stack, f: impl FnOnce(f64) -> SlangResult<Value>) -> SlangResult<Stack> {
    let a = stack.peek_number(op, 0)?;
    let result = f(a)?;
    stack.drop_n(op, 1)?;
    Ok(stack.with(result))
}

pub fn add(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("+", stack, |a, b| Ok(Value::Number(a + b)))
}

pub fn subtract(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("-", stack, |a, b| Ok(Value::Number(a - b)))
}

pub fn multiply(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("*", stack, |a, b| Ok(Value::Number(a * b)))
}

pub fn divide(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("/", stack, |a, b| {
        if b == 0.0 {
            return Err(SlangError::invalid("/", "division by zero"));
        }
        Ok(Value::Number(a / b))
    })
}

/// `mod`: remainder with the sign of the divisor
pub fn modulo(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("mod", stack, |a, b| {
        if b == 0.0 {
            return Err(SlangError::invalid("mod", "division by zero"));
        }
        Ok(Value::Number(a - b * (a / b).floor()))
    })
}

pub fn negate(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    unary("neg", stack, |a| Ok(Value::Number(-a)))
}

pub fn abs(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    unary("abs", stack, |a| Ok(Value::Number(a.abs())))
}

pub fn sqrt(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    unary("sqrt", stack, |a| {
        if a < 0.0 {
            return Err(SlangError::invalid("sqrt", format!("negative operand {}", a)));
        }
        Ok(Value::Number(a.sqrt()))
    })
}

pub fn min(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("min", stack, |a, b| Ok(Value::Number(a.min(b))))
}

pub fn max(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("max", stack, |a, b| Ok(Value::Number(a.max(b))))
}

// Comparisons

pub fn equal(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("=", 2)?;
    let b = stack.pop("=")?;
    let a = stack.pop("=")?;
    Ok(stack.with(Value::Bool(a == b)))
}

pub fn not_equal(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("!=", 2)?;
    let b = stack.pop("!=")?;
    let a = stack.pop("!=")?;
    Ok(stack.with(Value::Bool(a != b)))
}

pub fn less(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("<", stack, |a, b| Ok(Value::Bool(a < b)))
}

pub fn greater(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary(">", stack, |a, b| Ok(Value::Bool(a > b)))
}

pub fn less_equal(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary("<=", stack, |a, b| Ok(Value::Bool(a <= b)))
}

pub fn greater_equal(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    binary(">=", stack, |a, b| Ok(Value::Bool(a >= b)))
}

// Logic

pub fn not(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let a = stack.pop("not")?;
    Ok(stack.with(Value::Bool(!a.is_truthy())))
}

pub fn and(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("and", 2)?;
    let b = stack.pop("and")?;
    let a = stack.pop("and")?;
    Ok(stack.with(Value::Bool(a.is_truthy() && b.is_truthy())))
}

pub fn or(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    stack.require("or", 2)?;
    let b = stack.pop("or")?;
    let a = stack.pop("or")?;
    Ok(stack.with(Value::Bool(a.is_truthy() || b.is_truthy())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::Kind;

    fn apply(
        f: fn(&Env, Stack) -> SlangResult<Stack>,
        values: Vec<Value>,
    ) -> SlangResult<Vec<Value>> {
        f(&Env::new(), Stack::from_values(values)).map(Stack::into_values)
    }

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn test_operand_order() {
        assert_eq!(apply(subtract, vec![n(10.0), n(3.0)]).unwrap(), vec![n(7.0)]);
        assert_eq!(apply(divide, vec![n(9.0), n(2.0)]).unwrap(), vec![n(4.5)]);
        assert_eq!(apply(less, vec![n(1.0), n(2.0)]).unwrap(), vec![Value::Bool(true)]);
    }

    #[test]
    fn test_modulo_sign_follows_divisor() {
        assert_eq!(apply(modulo, vec![n(7.0), n(3.0)]).unwrap(), vec![n(1.0)]);
        assert_eq!(apply(modulo, vec![n(-7.0), n(3.0)]).unwrap(), vec![n(2.0)]);
    }

    #[test]
    fn test_division_by_zero_leaves_stack() {
        let err = apply(divide, vec![n(1.0), n(0.0)]).unwrap_err();
        assert!(matches!(err, SlangError::InvalidArgument { .. }));
    }

    #[test]
    fn test_type_mismatch_names_operator() {
        let err = apply(add, vec![n(1.0), Value::string("x")]).unwrap_err();
        assert_eq!(err, SlangError::type_mismatch("+", Kind::Number, Kind::String));
    }

    #[test]
    fn test_equality_and_logic() {
        assert_eq!(
            apply(equal, vec![Value::symbol("a"), Value::symbol("a")]).unwrap(),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            apply(and, vec![n(1.0), Value::Nil]).unwrap(),
            vec![Value::Bool(false)]
        );
        assert_eq!(apply(not, vec![n(0.0)]).unwrap(), vec![Value::Bool(true)]);
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(apply(sqrt, vec![n(25.0)]).unwrap(), vec![n(5.0)]);
        assert!(apply(sqrt, vec![n(-1.0)]).is_err());
    }
}
