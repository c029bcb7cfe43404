//! Vocabularies as first-class modules

use slang_core::Value;
use slang_runtime::Interpreter;

#[test]
fn test_later_use_wins_on_collision() {
    let source = "
        [ :english :lang def [ :hello ] :greet defun ] vocab :en def
        [ :french :lang def [ :bonjour ] :greet defun ] vocab :fr def
        en use fr use
        lang greet
    ";
    let stack = Interpreter::new().eval(source).unwrap();
    assert_eq!(
        stack.into_values(),
        vec![Value::symbol("french"), Value::symbol("bonjour")]
    );
}

#[test]
fn test_use_inside_block_is_scoped() {
    let interp = Interpreter::new();
    interp
        .eval("[ 3 :pi-ish def ] vocab :consts def  [ consts use pi-ish ] do :got def")
        .unwrap();
    assert_eq!(interp.env().lookup("got"), Some(Value::Number(3.0)));
    assert_eq!(interp.env().lookup("pi-ish"), None);
}

#[test]
fn test_vocab_functions_keep_their_captures() {
    let source = "
        2 :factor def
        [ [ factor * ] :scale defun ] vocab :m def
        100 :factor def
        m use 21 scale
    ";
    let stack = Interpreter::new().eval(source).unwrap();
    assert_eq!(stack.into_values(), vec![Value::Number(42.0)]);
}

#[test]
fn test_vocab_get() {
    let stack = Interpreter::new()
        .eval("[ 7 :seven def ] vocab dup :seven get swap :eight get")
        .unwrap();
    assert_eq!(stack.into_values(), vec![Value::Number(7.0), Value::Nil]);
}

#[test]
fn test_vocab_can_be_sent_to_a_process() {
    let source = "
        [ [ 1 + ] :inc defun ] vocab :lib def
        [ drop drop receive use 41 inc ] go :p def
        lib p post
        p await
    ";
    let stack = Interpreter::new().eval(source).unwrap();
    assert_eq!(stack.into_values(), vec![Value::Number(42.0)]);
}
