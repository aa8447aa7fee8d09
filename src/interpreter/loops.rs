//! Loop natives (`loop`, `repeat`, `while`, `until`, `forever`, `for-each`).
//!
//! Each driver runs its body through [`Interpreter::run_loop_body`], which
//! catches the `Break` and `Continue` signals addressed to the innermost loop
//! and hands every other signal (`return`, `throw`, errors) straight back to
//! the caller. The value of the last body run is kept on the data stack so a
//! collection during the next iteration cannot reclaim it.

use super::context::ContextKind;
use super::engine::Interpreter;
use super::errors::ErrorId;
use super::natives::{Call, NativeTable};
use super::unwind::{Eval, Unwind};
use crate::memory::series::SeriesId;
use crate::memory::value::{SeriesRef, Value, WordCell};

pub const NATIVES: NativeTable = &[
    ("loop", "count [integer!] body [block!]", native_loop),
    ("repeat", "'word [word!] count [integer! decimal!] body [block!]", native_repeat),
    ("while", "condition [block!] body [block!]", native_while),
    ("until", "body [block!]", native_until),
    ("forever", "body [block!]", native_forever),
    ("for-each", "'word [word! block!] data [series!] body [block!]", native_for_each),
];

/// How one run of a loop body ended
pub(crate) enum LoopBodyResult {
    /// Ran to the end or hit `continue`; the loop goes on
    Continue(Value),
    /// `break` was hit; the loop ends with this value
    Break(Value),
}

impl Interpreter {
    pub(crate) fn run_loop_body(&mut self, body: SeriesRef) -> Eval<LoopBodyResult> {
        match self.do_block(body) {
            Ok(value) => Ok(LoopBodyResult::Continue(value)),
            Err(Unwind::Continue) => Ok(LoopBodyResult::Continue(Value::None)),
            Err(Unwind::Break { value }) => Ok(LoopBodyResult::Break(value)),
            Err(other) => Err(other),
        }
    }

    /// Context holding the loop variables, and a copy of `body` bound to it
    fn loop_scope(&mut self, words: &[WordCell], body: SeriesRef) -> (SeriesId, SeriesRef) {
        let keys: Vec<_> = words.iter().map(|w| w.sym).collect();
        let context = self.make_context(ContextKind::Object, &keys);
        self.hold(Value::Object(context));
        let copy = self.copy_array_deep(body.series, body.index());
        self.bind_deep(copy, &[context]);
        self.hold(Value::Block(SeriesRef::head(copy)));
        (context, SeriesRef::head(copy))
    }
}

fn native_loop(interp: &mut Interpreter, call: &Call) -> Eval {
    let count = call.int(interp, 0)?;
    let body = call.block(interp, 1)?;
    let last = interp.hold(Value::None);
    for _ in 0..count.max(0) {
        match interp.run_loop_body(body)? {
            LoopBodyResult::Continue(value) => interp.set_held(last, value),
            LoopBodyResult::Break(value) => return Ok(value),
        }
    }
    Ok(interp.held(last))
}

fn native_repeat(interp: &mut Interpreter, call: &Call) -> Eval {
    let Value::Word(word) = call.arg(0) else {
        return Err(interp.error(ErrorId::InvalidArg, &[call.arg(0)]));
    };
    let count = match call.arg(1) {
        Value::Integer(n) => n,
        Value::Decimal(d) => d.floor() as i64,
        other => return Err(interp.error(ErrorId::InvalidArg, &[other])),
    };
    let body = call.block(interp, 2)?;
    let (context, body) = interp.loop_scope(&[word], body);
    let last = interp.hold(Value::None);
    for i in 1..=count.max(0) {
        interp
            .heap
            .context_set(context, 0, Value::Integer(i))
            .map_err(|e| interp.heap_error(e))?;
        match interp.run_loop_body(body)? {
            LoopBodyResult::Continue(value) => interp.set_held(last, value),
            LoopBodyResult::Break(value) => return Ok(value),
        }
    }
    Ok(interp.held(last))
}

fn native_while(interp: &mut Interpreter, call: &Call) -> Eval {
    let condition = call.block(interp, 0)?;
    let body = call.block(interp, 1)?;
    let last = interp.hold(Value::None);
    while interp.do_block(condition)?.is_truthy() {
        match interp.run_loop_body(body)? {
            LoopBodyResult::Continue(value) => interp.set_held(last, value),
            LoopBodyResult::Break(value) => return Ok(value),
        }
    }
    Ok(interp.held(last))
}

fn native_until(interp: &mut Interpreter, call: &Call) -> Eval {
    let body = call.block(interp, 0)?;
    loop {
        match interp.run_loop_body(body)? {
            LoopBodyResult::Continue(value) if value.is_truthy() && !value.is_unset() => return Ok(value),
            LoopBodyResult::Continue(_) => {}
            LoopBodyResult::Break(value) => return Ok(value),
        }
    }
}

fn native_forever(interp: &mut Interpreter, call: &Call) -> Eval {
    let body = call.block(interp, 0)?;
    loop {
        if let LoopBodyResult::Break(value) = interp.run_loop_body(body)? {
            return Ok(value);
        }
    }
}

/// `for-each x series body` or `for-each [k v] series body`: each pass takes
/// as many elements as there are words, padding with `none` at the tail
fn native_for_each(interp: &mut Interpreter, call: &Call) -> Eval {
    let words: Vec<WordCell> = match call.arg(0) {
        Value::Word(word) => vec![word],
        Value::Block(r) => {
            let values = interp.heap.array(r.series)[r.index()..].to_vec();
            let mut words = Vec::with_capacity(values.len());
            for value in values {
                match value.as_word() {
                    Some(word) => words.push(word),
                    None => return Err(interp.error(ErrorId::InvalidArg, &[value])),
                }
            }
            words
        }
        other => return Err(interp.error(ErrorId::InvalidArg, &[other])),
    };
    if words.is_empty() {
        return Err(interp.error(ErrorId::InvalidArg, &[call.arg(0)]));
    }
    let data = call.arg(1);
    let Some(series) = data.series_ref() else {
        return Err(interp.error(ErrorId::InvalidArg, &[data]));
    };
    let body = call.block(interp, 2)?;
    let (context, body) = interp.loop_scope(&words, body);
    let last = interp.hold(Value::None);

    let mut index = series.index();
    // length is re-read every pass; the body may modify the series
    while index < interp.heap.len(series.series) {
        for slot in 0..words.len() {
            let element = interp.element_at(data, index + slot).unwrap_or(Value::None);
            interp
                .heap
                .context_set(context, slot, element)
                .map_err(|e| interp.heap_error(e))?;
        }
        index += words.len();
        match interp.run_loop_body(body)? {
            LoopBodyResult::Continue(value) => interp.set_held(last, value),
            LoopBodyResult::Break(value) => return Ok(value),
        }
    }
    Ok(interp.held(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.eval_molded(source) {
            Ok(text) => text,
            Err(failure) => format!("failed: {}", failure),
        }
    }

    #[test]
    fn test_loop_returns_last_body_value() {
        assert_eq!(eval("n: 0 loop 3 [n: n + 1]"), "3");
        assert_eq!(eval("loop 0 [1]"), "none");
    }

    #[test]
    fn test_break_with_value() {
        assert_eq!(eval("repeat i 10 [if i = 4 [break/with i * 10]]"), "40");
        assert_eq!(eval("forever [break]"), "none");
    }

    #[test]
    fn test_continue_skips_rest_of_body() {
        assert_eq!(
            eval("sum: 0 repeat i 5 [if even? i [continue] sum: sum + i] sum"),
            "9"
        );
    }

    #[test]
    fn test_for_each_pairs() {
        assert_eq!(
            eval("out: copy [] for-each [k v] [a 1 b 2] [append out v] out"),
            "[1 2]"
        );
        assert_eq!(eval("n: 0 for-each c \"abc\" [n: n + 1] n"), "3");
    }

    #[test]
    fn test_loop_variable_does_not_leak() {
        assert_eq!(eval("i: 99 repeat i 3 [i] i"), "99");
    }
}
