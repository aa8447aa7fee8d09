// return, break, continue, throw, errors, quit and halt

use rebound::interpreter::config::Config;
use rebound::interpreter::engine::Interpreter;
use rebound::interpreter::errors::{Category, Failure};
use std::sync::atomic::Ordering;

fn eval(source: &str) -> String {
    let mut interp = Interpreter::new();
    match interp.eval_molded(source) {
        Ok(text) => text,
        Err(failure) => panic!("{:?} failed: {}", source, failure),
    }
}

fn fail(source: &str) -> Failure {
    let mut interp = Interpreter::new();
    match interp.eval_str(source) {
        Ok(value) => panic!("{:?} gave {}", source, interp.mold(&value)),
        Err(failure) => failure,
    }
}

#[test]
fn test_catch_throw() {
    assert_eq!(eval("catch [throw 10]"), "10");
    assert_eq!(eval("catch [1 + 1]"), "2");
    assert_eq!(eval("catch [loop 5 [throw 'out] 'never]"), "out");
}

#[test]
fn test_named_throws_pass_unnamed_catches() {
    assert_eq!(eval("catch/name [catch [throw/name 1 'outer] 2] 'outer"), "1");
    assert_eq!(eval("catch [catch/name [throw 3] 'other]"), "3");
}

#[test]
fn test_uncaught_throw_fails_the_evaluation() {
    let failure = fail("throw 1");
    assert_eq!(failure.id(), Some("no-catch"));
}

#[test]
fn test_break_only_leaves_the_enclosing_loop() {
    assert_eq!(eval("loop 3 [break] 'after"), "after");
    assert_eq!(eval("n: 0 loop 3 [loop 10 [break] n: n + 1] n"), "3");
    assert_eq!(eval("loop 3 [break/with 7]"), "7");
    assert_eq!(eval("loop 3 [break]"), "none");
}

#[test]
fn test_continue() {
    let source = "total: 0 repeat i 5 [if even? i [continue] total: total + i] total";
    assert_eq!(eval(source), "9");
}

#[test]
fn test_break_outside_a_loop() {
    assert_eq!(fail("break").id(), Some("no-loop"));
    assert_eq!(fail("return 1").id(), Some("no-function"));
}

#[test]
fn test_return_crosses_loops_and_blocks() {
    assert_eq!(eval("f: func [] [loop 10 [do [return 42]] 0] f"), "42");
    assert_eq!(eval("f: func [b] [for-each x b [if x > 2 [return x]] none] f [1 2 3 4]"), "3");
}

#[test]
fn test_return_targets_its_own_function() {
    let source = "inner: func [] [return 1] outer: func [] [inner 2] outer";
    assert_eq!(eval(source), "2");
}

#[test]
fn test_trap_materializes_errors() {
    assert_eq!(eval("error? trap [1 / 0]"), "true");
    assert_eq!(eval("e: trap [1 / 0] e/id"), "zero-divide");
    assert_eq!(eval("e: trap [1 / 0] e/type"), "math");
    assert_eq!(eval("trap [1 + 1]"), "none");
    assert_eq!(eval("attempt [undefined-word]"), "none");
}

#[test]
fn test_fail_raises_user_errors() {
    let failure = fail("fail \"boom\"");
    assert_eq!(failure.category(), Some(Category::User));
    assert_eq!(failure.report().map(|r| r.message.as_str()), Some("boom"));
    assert_eq!(eval("e: trap [fail \"boom\"] e/message"), "\"boom\"");
}

#[test]
fn test_errors_are_values() {
    assert_eq!(eval("e: make error! \"custom\" error? e"), "true");
    assert_eq!(eval("e: trap [do make error! \"custom\"] e/message"), "\"custom\"");
}

#[test]
fn test_stack_overflow_is_not_trappable() {
    let mut interp = Interpreter::with_config(Config::default().with_stack_limit(64));
    let failure = interp.eval_str("f: func [] [f] trap [f]").unwrap_err();
    assert_eq!(failure.category(), Some(Category::Stack));
    assert_eq!(interp.stack.depth(), 0);

    // the interpreter stays usable afterwards
    assert_eq!(interp.eval_molded("1 + 1").unwrap(), "2");
}

#[test]
fn test_quit_status() {
    assert_eq!(fail("quit"), Failure::Quit(0));
    assert_eq!(fail("loop 2 [quit/with 3]"), Failure::Quit(3));
    assert_eq!(fail("catch [quit/with 4]"), Failure::Quit(4));
    assert_eq!(fail("quit/with -2147483648"), Failure::Quit(i32::MIN));
    assert_eq!(fail("quit/with 4294967296").id(), Some("out-of-range"));
}

#[test]
fn test_halt_and_cancellation() {
    assert_eq!(fail("halt"), Failure::Halted);
    assert_eq!(fail("trap [halt]"), Failure::Halted);

    let mut interp = Interpreter::new();
    interp.cancel_handle().store(true, Ordering::SeqCst);
    assert_eq!(interp.eval_str("forever []"), Err(Failure::Halted));
    assert_eq!(interp.eval_molded("'resumed").unwrap(), "resumed");
}

#[test]
fn test_frames_are_released_after_unwinding() {
    let mut interp = Interpreter::new();
    interp.eval_str("f: func [] [catch [loop 3 [throw 1]]] f f").unwrap();
    let _ = interp.eval_str("g: func [] [1 / 0] g");
    assert_eq!(interp.stack.depth(), 0);
}

#[test]
fn test_unbounded_recursion_at_default_limit_is_a_stack_error() {
    let mut interp = Interpreter::new();
    let failure = interp.eval_str("f: func [n] [1 + f n + 1] f 1").unwrap_err();
    assert_eq!(failure.category(), Some(Category::Stack));
    assert_eq!(interp.stack.depth(), 0);

    let failure = interp.eval_str("g: func [] [do [reduce [g]]] g").unwrap_err();
    assert_eq!(failure.category(), Some(Category::Stack));
}
