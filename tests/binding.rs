// Words resolve through the context they are bound to

use rebound::interpreter::engine::Interpreter;

fn eval(source: &str) -> String {
    let mut interp = Interpreter::new();
    match interp.eval_molded(source) {
        Ok(text) => text,
        Err(failure) => panic!("{:?} failed: {}", source, failure),
    }
}

#[test]
fn test_same_word_in_two_contexts() {
    let source = r#"
        a: context [x: 1 get-x: func [] [x]]
        b: context [x: 2 get-x: func [] [x]]
        x: 3
        reduce [a/get-x b/get-x x]
    "#;
    assert_eq!(eval(source), "[1 2 3]");
}

#[test]
fn test_bind_moves_words_to_a_context() {
    let source = r#"
        x: 'global
        code: [x]
        o: context [x: 'inner]
        reduce [do code do bind code o]
    "#;
    assert_eq!(eval(source), "[global inner]");
}

#[test]
fn test_arguments_shadow_globals() {
    assert_eq!(eval("n: 100 f: func [n] [n + 1] reduce [f 1 n]"), "[2 100]");
}

#[test]
fn test_locals_do_not_leak() {
    assert_eq!(eval("tmp: 'outer f: func [/local tmp] [tmp: 'inner tmp] reduce [f tmp]"), "[inner outer]");
    assert_eq!(eval("total: 0 f: function [] [total: 5] f total"), "0");
}

#[test]
fn test_recursive_calls_get_fresh_contexts() {
    assert_eq!(eval("f: func [n] [either n = 0 [copy []] [append f n - 1 n]] f 3"), "[1 2 3]");
    let source = "g: func [n] [either n = 0 [0] [(g n - 1) + n]] g 4";
    assert_eq!(eval(source), "10");
}

#[test]
fn test_object_methods_see_their_own_fields() {
    let source = r#"
        counter: context [
            count: 0
            bump: func [] [count: count + 1]
        ]
        counter/bump counter/bump
        counter/count
    "#;
    assert_eq!(eval(source), "2");
}

#[test]
fn test_derived_objects_rebind_methods() {
    let source = r#"
        base: context [v: 1 show: func [] [v]]
        derived: make base [v: 2]
        reduce [base/show derived/show]
    "#;
    assert_eq!(eval(source), "[1 2]");
}

#[test]
fn test_deep_copy_of_cyclic_block_keeps_the_cycle() {
    let source = r#"
        b: copy [1]
        append/only b b
        c: copy/deep b
        inner: second c
        reduce [same? inner second inner  same? inner b  length-of inner]
    "#;
    assert_eq!(eval(source), "[true false 2]");
}
