// Collection driven through the interpreter

use rebound::interpreter::config::Config;
use rebound::interpreter::engine::Interpreter;
use rebound::memory::value::{SeriesRef, Value};

#[test]
fn test_retained_series_are_exactly_the_survivors() {
    let mut interp = Interpreter::new();
    let baseline = interp.recycle().live;

    let n = 100;
    let roots: Vec<_> = (0..n)
        .map(|i| {
            let id = interp.heap.alloc_array(&[Value::Integer(i)]);
            interp.retain(Value::Block(SeriesRef::head(id)))
        })
        .collect();
    for _ in 0..n {
        interp.heap.alloc_text("garbage");
    }

    let report = interp.recycle();
    assert_eq!(report.live, baseline + n as usize);
    assert_eq!(interp.heap.live_count(), baseline + n as usize);

    for root in roots {
        interp.release(root);
    }
    assert_eq!(interp.recycle().live, baseline);
}

#[test]
fn test_content_survives_forced_collections() {
    let mut interp = Interpreter::new();
    interp.eval_str("keep: [1 [2 3] \"text\" #{FF}] o: context [v: [4 5]]").unwrap();
    for _ in 0..3 {
        interp.eval_str("loop 50 [copy [a b c]] recycle").unwrap();
    }
    assert_eq!(interp.eval_molded("keep").unwrap(), "[1 [2 3] \"text\" #{FF}]");
    assert_eq!(interp.eval_molded("o/v").unwrap(), "[4 5]");
}

#[test]
fn test_collection_keeps_backing_addresses() {
    let mut interp = Interpreter::new();
    let id = interp.heap.alloc_text("pinned in place");
    let root = interp.retain(Value::Text(SeriesRef::head(id)));
    let before = interp.heap.data_address(id);
    interp.heap.alloc_binary(&[0; 64]);
    interp.recycle();
    assert_eq!(interp.heap.data_address(id), before);
    assert_eq!(interp.heap.text_string(id, 0), "pinned in place");
    interp.release(root);
}

#[test]
fn test_collections_during_evaluation_keep_intermediates() {
    // a tiny ballast makes nearly every step collect
    let mut interp = Interpreter::with_config(Config::default().with_gc_ballast(64));
    let source = r#"
        build: func [n /local out] [
            out: copy []
            repeat i n [append/only out reduce [i join "item-" i]]
            out
        ]
        result: build 40
        length-of result
    "#;
    assert_eq!(interp.eval_molded(source).unwrap(), "40");
    assert_eq!(interp.eval_molded("result/40").unwrap(), "[40 \"item-40\"]");
    assert!(interp.heap.stats().collections > 0);
}

#[test]
fn test_guarded_values_survive() {
    let mut interp = Interpreter::new();
    let id = interp.heap.alloc_array(&[Value::Integer(1)]);
    let live = interp.guarded(Value::Block(SeriesRef::head(id)), |interp| {
        interp.recycle();
        interp.heap.is_live(id)
    });
    assert!(live);
    interp.recycle();
    assert!(!interp.heap.is_live(id));
}

#[test]
fn test_stats_native_reports_the_heap() {
    let mut interp = Interpreter::new();
    interp.eval_str("recycle").unwrap();
    let collections = interp.eval_molded("s: stats s/collections").unwrap();
    assert_eq!(collections, interp.heap.stats().collections.to_string());
}
