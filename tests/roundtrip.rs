// Molded literals scan back to equal values

use rebound::interpreter::engine::Interpreter;

const LITERALS: &[&str] = &[
    "42",
    "-7",
    "1.5",
    "#\"a\"",
    "10x20",
    "2024-01-15",
    "word",
    "w:",
    ":w",
    "'w",
    "/ref",
    "#abc",
    "\"a^/b\"",
    "%a.txt",
    "#{DEADBEEF}",
    "[1 [2 3] (4)]",
    "a/b/c",
];

#[test]
fn test_mold_reproduces_canonical_literals() {
    let mut interp = Interpreter::new();
    for literal in LITERALS {
        let molded = interp.eval_str(&format!("mold first [{}]", literal)).unwrap();
        assert_eq!(interp.form(&molded), *literal);
    }
}

#[test]
fn test_reloaded_values_are_equal() {
    let mut interp = Interpreter::new();
    for literal in LITERALS {
        let source = format!("x: first [{}] equal? x load mold x", literal);
        assert_eq!(interp.eval_molded(&source).unwrap(), "true", "reload of {}", literal);
    }
}

#[test]
fn test_form_drops_source_syntax() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.eval_molded("form \"a b\"").unwrap(), "\"a b\"");
    assert_eq!(interp.eval_molded("form [1 [2] \"x\"]").unwrap(), "\"1 [2] x\"");
    assert_eq!(interp.eval_molded("form 'w").unwrap(), "\"w\"");
}

#[test]
fn test_cyclic_blocks_mold_finitely() {
    let mut interp = Interpreter::new();
    let molded = interp.eval_molded("b: copy [1] append/only b b mold b").unwrap();
    assert!(molded.contains("[...]"), "{}", molded);
}

#[test]
fn test_deeply_nested_blocks_mold_and_compare() {
    let mut interp = Interpreter::new();
    let source = "
        a: copy [] b: copy []
        loop 100000 [a: reduce [a] b: reduce [b]]
        reduce [equal? a b  length-of mold a]
    ";
    assert_eq!(interp.eval_molded(source).unwrap(), "[true 200002]");
}
