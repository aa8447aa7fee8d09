// Evaluation through the public interpreter API

use rebound::interpreter::config::Config;
use rebound::interpreter::engine::Interpreter;
use rebound::interpreter::errors::Category;

fn eval(source: &str) -> String {
    let mut interp = Interpreter::new();
    match interp.eval_molded(source) {
        Ok(text) => text,
        Err(failure) => panic!("{:?} failed: {}", source, failure),
    }
}

fn failure_category(source: &str) -> Option<Category> {
    let mut interp = Interpreter::new();
    interp.eval_str(source).err().and_then(|f| f.category())
}

#[test]
fn test_infix_is_strictly_left_to_right() {
    assert_eq!(eval("1 + 2 * 3"), "9");
    assert_eq!(eval("2 * 3 + 1"), "7");
    assert_eq!(eval("1 + (2 * 3)"), "7");
    assert_eq!(eval("10 - 2 - 3"), "5");
}

#[test]
fn test_prefix_arguments_take_whole_infix_chains() {
    assert_eq!(eval("negate 1 + 2"), "-3");
    assert_eq!(eval("add 1 2 * 10"), "21");
}

#[test]
fn test_unbound_word_is_a_script_error() {
    let mut interp = Interpreter::new();
    let failure = interp.eval_str("print nowhere-defined").unwrap_err();
    assert_eq!(failure.category(), Some(Category::Script));
    assert!(matches!(failure.id(), Some("not-bound") | Some("no-value")));
}

#[test]
fn test_set_word_without_value_is_an_error() {
    assert_eq!(failure_category("x:"), Some(Category::Script));
}

#[test]
fn test_functions_and_refinements() {
    assert_eq!(eval("sq: func [n] [n * n] sq 7"), "49");
    assert_eq!(
        eval("greet: func [name /loud] [either loud [join name \"!\"] [name]] greet/loud \"hi\""),
        "\"hi!\""
    );
    assert_eq!(eval("f: func [a /with b] [either with [a + b] [a]] f/with 1 2"), "3");
    assert_eq!(eval("f: func [a /with b] [either with [a + b] [a]] f 1"), "1");
}

#[test]
fn test_definitional_return() {
    assert_eq!(eval("f: func [x] [if x > 0 [return 'positive] 'other] f 5"), "positive");
    assert_eq!(eval("f: func [x] [if x > 0 [return 'positive] 'other] f -5"), "other");
}

#[test]
fn test_closures_keep_their_arguments() {
    let source = "make-adder: func [n] [func [x] [x + n]] add5: make-adder 5 add10: make-adder 10 add5 1 + add10 1";
    assert_eq!(eval(source), "17");
}

#[test]
fn test_recursion() {
    assert_eq!(eval("fact: func [n] [either n <= 1 [1] [n * fact n - 1]] fact 10"), "3628800");
}

#[test]
fn test_paths() {
    assert_eq!(eval("b: [10 20 30] b/2"), "20");
    assert_eq!(eval("o: context [inner: context [v: 3]] o/inner/v"), "3");
    assert_eq!(eval("b: [1 2 3] b/2: 9 b"), "[1 9 3]");
}

#[test]
fn test_series_positions() {
    assert_eq!(eval("b: next [1 2 3] first b"), "2");
    assert_eq!(eval("b: [1 2 3] append b 4 length-of b"), "4");
    assert_eq!(eval("copy/part \"abcdef\" 3"), "\"abc\"");
    assert_eq!(eval("find [a b c] 'b"), "[b c]");
}

#[test]
fn test_math_errors() {
    assert_eq!(failure_category("1 / 0"), Some(Category::Math));
    assert_eq!(failure_category("9223372036854775807 + 1"), Some(Category::Math));
    assert_eq!(eval("7 / 2"), "3.5");
    assert_eq!(eval("6 / 2"), "3");
}

#[test]
fn test_type_checked_arguments() {
    let mut interp = Interpreter::new();
    let failure = interp.eval_str("f: func [n [integer!]] [n] f \"x\"").unwrap_err();
    assert_eq!(failure.id(), Some("expect-arg"));
}

#[test]
fn test_print_output() {
    let mut interp = Interpreter::new();
    interp.eval_str("repeat i 3 [print i]").unwrap();
    assert_eq!(interp.take_output(), "1\n2\n3\n");
    assert_eq!(interp.output(), "");
}

#[test]
fn test_user_values_persist_between_evaluations() {
    let mut interp = Interpreter::with_config(Config::default());
    interp.eval_str("counter: 1").unwrap();
    interp.eval_str("counter: counter + 1").unwrap();
    assert_eq!(interp.user_value("counter").map(|v| interp.mold(&v)), Some("2".to_string()));
}
