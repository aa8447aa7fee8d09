use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rebound::interpreter::engine::Interpreter;

pub fn criterion_benchmark(c: &mut Criterion) {
    let fib = "
    fib: func [n] [
        either n < 2 [n] [(fib n - 1) + (fib n - 2)]
    ]
    fib 18
    ";
    c.bench_function("fib 18", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            assert!(interp.eval_str(black_box(fib)).is_ok())
        })
    });

    let churn = "
    keep: copy []
    repeat i 2000 [
        append keep reduce [i copy \"garbage\"]
        if (length-of keep) > 200 [keep: copy []]
    ]
    ";
    c.bench_function("allocation churn", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            assert!(interp.eval_str(black_box(churn)).is_ok())
        })
    });

    let source = "f: func [a /b c] [print [a c]] ".repeat(200);
    c.bench_function("load", |b| {
        let mut interp = Interpreter::new();
        b.iter(|| assert!(interp.load(black_box(&source)).is_ok()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
