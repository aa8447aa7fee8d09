//! Series natives
//!
//! A series value is a position in a shared series: `next`, `skip` and
//! friends make new positions without copying, while `append`, `insert` and
//! `poke` change the one series every position refers to. All mutation goes
//! through the heap, which refuses it for protected series.

use crate::interpreter::context::ContextData;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ErrorId;
use crate::interpreter::natives::{Call, NativeTable};
use crate::interpreter::unwind::Eval;
use crate::memory::series::SeriesId;
use crate::memory::value::{Kind, SeriesRef, Value};

pub const NATIVES: NativeTable = &[
    ("copy", "value [series! any-object!] /part length [integer!] /deep", native_copy),
    ("length-of", "series [series! any-object!]", native_length_of),
    ("first", "series [series! pair! date!]", native_first),
    ("second", "series [series! pair! date!]", native_second),
    ("last", "series [series!]", native_last),
    ("pick", "series [series! pair! date! any-object!] index [any-value!]", native_pick),
    ("poke", "series [series! any-object!] index [any-value!] value [any-value!]", native_poke),
    ("append", "series [series!] value [any-value!] /only", native_append),
    ("insert", "series [series!] value [any-value!] /only", native_insert),
    ("remove", "series [series!] /part length [integer!]", native_remove),
    ("clear", "series [series!]", native_clear),
    ("head", "series [series!]", native_head),
    ("tail", "series [series!]", native_tail),
    ("next", "series [series!]", native_next),
    ("back", "series [series!]", native_back),
    ("skip", "series [series!] offset [integer!]", native_skip),
    ("index-of", "series [series!]", native_index_of),
    ("head?", "series [series!]", native_is_head),
    ("tail?", "series [series!]", native_is_tail),
    ("empty?", "series [series!]", native_is_tail),
    ("find", "series [series!] value [any-value!]", native_find),
    ("select", "series [series!] value [any-value!]", native_select),
    ("join", "value [any-value!] rest [any-value!]", native_join),
    ("rejoin", "block [block!]", native_rejoin),
];

impl Interpreter {
    /// Element `index` (absolute, 0-based) of any series value
    pub(crate) fn element_at(&self, series: Value, index: usize) -> Option<Value> {
        let r = series.series_ref()?;
        match series.kind() {
            kind if kind.is_array() => self.heap.array(r.series).get(index).copied(),
            kind if kind.is_string() => self.heap.chars(r.series).get(index).map(|&c| Value::Char(c)),
            Kind::Binary => self.heap.bytes(r.series).get(index).map(|&b| Value::Integer(b as i64)),
            _ => None,
        }
    }

    /// Elements from the current position to the tail
    pub(crate) fn remaining(&self, series: Value) -> usize {
        match series.series_ref() {
            Some(r) => self.heap.len(r.series).saturating_sub(r.index()),
            None => 0,
        }
    }

    /// Same series at another absolute index, clamped to head and tail
    fn at_index(&self, series: Value, index: i64) -> Value {
        let Some(r) = series.series_ref() else {
            return series;
        };
        let len = self.heap.len(r.series) as i64;
        series.with_series_ref(SeriesRef::at(r.series, index.clamp(0, len) as usize))
    }

    /// Copy of a series from its position, `limit` elements at most
    pub(crate) fn copy_series(&mut self, series: Value, limit: Option<usize>, deep: bool) -> Eval {
        let Some(r) = series.series_ref() else {
            return Err(self.error(ErrorId::InvalidArg, &[series]));
        };
        let len = self.heap.len(r.series);
        let start = r.index().min(len);
        let end = limit.map_or(len, |n| start.saturating_add(n).min(len));
        let id = match series.kind() {
            kind if kind.is_array() => {
                let part = self.heap.array(r.series)[start..end].to_vec();
                let staged = self.heap.alloc_array(&part);
                if deep {
                    self.copy_array_deep(staged, 0)
                } else {
                    staged
                }
            }
            kind if kind.is_string() => {
                let part = self.heap.chars(r.series)[start..end].to_vec();
                self.heap.alloc_chars(&part)
            }
            _ => {
                let part = self.heap.bytes(r.series)[start..end].to_vec();
                self.heap.alloc_binary(&part)
            }
        };
        Ok(series.with_series_ref(SeriesRef::head(id)))
    }

    /// Insert `value` into `series` at absolute index `at`; returns how
    /// many elements went in. Blocks splice their contents unless `only`.
    pub(crate) fn insert_into(&mut self, series: Value, at: usize, value: Value, only: bool) -> Eval<usize> {
        let Some(r) = series.series_ref() else {
            return Err(self.error(ErrorId::InvalidArg, &[series]));
        };
        let result = match series.kind() {
            kind if kind.is_array() => {
                let items = match value {
                    Value::Block(block) if !only => self.heap.array(block.series)[block.index()..].to_vec(),
                    other => vec![other],
                };
                let count = items.len();
                self.heap.insert(r.series, at, &items).map(|()| count)
            }
            kind if kind.is_string() => {
                let chars: Vec<char> = match value {
                    Value::Char(c) => vec![c],
                    Value::Block(block) => {
                        let items = self.heap.array(block.series)[block.index()..].to_vec();
                        items.iter().flat_map(|v| self.form(v).chars().collect::<Vec<_>>()).collect()
                    }
                    other => self.form(&other).chars().collect(),
                };
                let count = chars.len();
                self.heap.insert(r.series, at, &chars).map(|()| count)
            }
            _ => {
                let bytes: Vec<u8> = match value {
                    Value::Binary(b) => self.heap.bytes(b.series)[b.index()..].to_vec(),
                    Value::Integer(n) => match u8::try_from(n) {
                        Ok(byte) => vec![byte],
                        Err(_) => return Err(self.error(ErrorId::OutOfRange, &[value])),
                    },
                    Value::Text(_) | Value::Char(_) => self.form(&value).into_bytes(),
                    other => return Err(self.error(ErrorId::InvalidArg, &[other])),
                };
                let count = bytes.len();
                self.heap.insert(r.series, at, &bytes).map(|()| count)
            }
        };
        result.map_err(|e| self.heap_error(e))
    }

    /// Absolute index of the first match of `value` at or after the position
    fn find_in(&self, series: Value, value: Value) -> Option<usize> {
        let r = series.series_ref()?;
        let start = r.index();
        match series.kind() {
            kind if kind.is_array() => {
                let values = self.heap.array(r.series);
                values
                    .get(start..)?
                    .iter()
                    .position(|v| self.values_equal(v, &value, false))
                    .map(|i| start + i)
            }
            kind if kind.is_string() => {
                let haystack: Vec<char> = self.heap.chars(r.series).get(start..)?.iter().map(|c| c.to_ascii_lowercase()).collect();
                let needle: Vec<char> = match value {
                    Value::Char(c) => vec![c.to_ascii_lowercase()],
                    other => self.form(&other).chars().map(|c| c.to_ascii_lowercase()).collect(),
                };
                find_slice(&haystack, &needle).map(|i| start + i)
            }
            _ => {
                let haystack = self.heap.bytes(r.series).get(start..)?;
                let needle: Vec<u8> = match value {
                    Value::Integer(n) => vec![u8::try_from(n).ok()?],
                    Value::Binary(b) => self.heap.bytes(b.series)[b.index()..].to_vec(),
                    other => self.form(&other).into_bytes(),
                };
                find_slice(haystack, &needle).map(|i| start + i)
            }
        }
    }
}

fn find_slice<T: PartialEq>(haystack: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn native_copy(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(0);
    let limit = if call.refined(1) {
        Some(call.int(interp, 2)?.max(0) as usize)
    } else {
        None
    };
    let deep = call.refined(3);
    match value {
        Value::Object(id) | Value::Error(id) => {
            let source = interp.heap.context(id);
            let pairs: Vec<_> = source.keys.iter().map(|&k| (k, interp.symbols.canon(k))).collect();
            let mut copy = ContextData::with_keys(source.kind, &pairs);
            copy.vars = source.vars.clone();
            let id = interp.heap.alloc_context(copy);
            Ok(if matches!(value, Value::Object(_)) { Value::Object(id) } else { Value::Error(id) })
        }
        series => interp.copy_series(series, limit, deep),
    }
}

fn native_length_of(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(0);
    let length = match value.context() {
        Some(id) => interp.heap.context(id).len(),
        None => interp.remaining(value),
    };
    Ok(Value::Integer(length as i64))
}

fn native_first(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.pick_value(call.arg(0), Value::Integer(1))
}

fn native_second(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.pick_value(call.arg(0), Value::Integer(2))
}

fn native_last(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    match interp.remaining(series) {
        0 => Ok(Value::None),
        n => interp.pick_value(series, Value::Integer(n as i64)),
    }
}

fn native_pick(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.pick_value(call.arg(0), call.arg(1))
}

fn native_poke(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(2);
    interp.poke_value(call.arg(0), call.arg(1), value)?;
    Ok(value)
}

/// Returns the series at its original position
fn native_append(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    let tail = series.series_ref().map_or(0, |r| interp.heap.len(r.series));
    interp.insert_into(series, tail, call.arg(1), call.refined(2))?;
    Ok(series)
}

/// Returns the series just past the inserted elements
fn native_insert(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    let at = series.series_ref().map_or(0, |r| r.index().min(interp.heap.len(r.series)));
    let count = interp.insert_into(series, at, call.arg(1), call.refined(2))?;
    Ok(interp.at_index(series, (at + count) as i64))
}

fn native_remove(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    let count = if call.refined(1) {
        call.int(interp, 2)?.max(0) as usize
    } else {
        1
    };
    let Some(r) = series.series_ref() else {
        return Ok(series);
    };
    let at = r.index().min(interp.heap.len(r.series));
    let result = match series.kind() {
        kind if kind.is_array() => interp.heap.remove::<Value>(r.series, at, count),
        kind if kind.is_string() => interp.heap.remove::<char>(r.series, at, count),
        _ => interp.heap.remove::<u8>(r.series, at, count),
    };
    result.map_err(|e| interp.heap_error(e))?;
    Ok(series)
}

fn native_clear(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    if let Some(r) = series.series_ref() {
        let at = r.index().min(interp.heap.len(r.series));
        interp.heap.truncate(r.series, at).map_err(|e| interp.heap_error(e))?;
    }
    Ok(series)
}

fn native_head(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(interp.at_index(call.arg(0), 0))
}

fn native_tail(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(interp.at_index(call.arg(0), i64::MAX))
}

fn native_next(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    let index = series.series_ref().map_or(0, |r| r.index() as i64);
    Ok(interp.at_index(series, index + 1))
}

fn native_back(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    let index = series.series_ref().map_or(0, |r| r.index() as i64);
    Ok(interp.at_index(series, index - 1))
}

fn native_skip(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    let offset = call.int(interp, 1)?;
    let index = series.series_ref().map_or(0, |r| r.index() as i64);
    Ok(interp.at_index(series, index.saturating_add(offset)))
}

fn native_index_of(_: &mut Interpreter, call: &Call) -> Eval {
    let index = call.arg(0).series_ref().map_or(0, |r| r.index());
    Ok(Value::Integer(index as i64 + 1))
}

fn native_is_head(_: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(call.arg(0).series_ref().is_some_and(|r| r.index() == 0)))
}

fn native_is_tail(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.remaining(call.arg(0)) == 0))
}

fn native_find(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    match interp.find_in(series, call.arg(1)) {
        Some(index) => Ok(interp.at_index(series, index as i64)),
        None => Ok(Value::None),
    }
}

fn native_select(interp: &mut Interpreter, call: &Call) -> Eval {
    let series = call.arg(0);
    if !series.kind().is_array() {
        return Err(interp.error(ErrorId::InvalidArg, &[series]));
    }
    Ok(interp
        .find_in(series, call.arg(1))
        .and_then(|index| interp.element_at(series, index + 1))
        .unwrap_or(Value::None))
}

/// `join "a" [1 2]` gives `"a12"`; a block rest is reduced first
fn native_join(interp: &mut Interpreter, call: &Call) -> Eval {
    let rest = match call.arg(1) {
        Value::Block(r) => Value::Block(SeriesRef::head(interp.reduce_block(r)?)),
        other => other,
    };
    interp.hold(rest);
    let base = match call.arg(0) {
        value if value.kind().is_series() => interp.copy_series(value, None, false)?,
        other => {
            let text = interp.form(&other);
            Value::Text(SeriesRef::head(interp.heap.alloc_text(&text)))
        }
    };
    interp.hold(base);
    let tail = base.series_ref().map_or(0, |r| interp.heap.len(r.series));
    interp.insert_into(base, tail, rest, false)?;
    Ok(base)
}

/// Reduce a block and join the results onto the first one
fn native_rejoin(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    let reduced: SeriesId = interp.reduce_block(block)?;
    interp.hold(Value::Block(SeriesRef::head(reduced)));
    let values = interp.heap.array(reduced).to_vec();
    let Some((&first, rest)) = values.split_first() else {
        return Ok(Value::Block(SeriesRef::head(reduced)));
    };
    let base = match first {
        value if value.kind().is_series() => interp.copy_series(value, None, false)?,
        other => {
            let text = interp.form(&other);
            Value::Text(SeriesRef::head(interp.heap.alloc_text(&text)))
        }
    };
    interp.hold(base);
    for &value in rest {
        let tail = base.series_ref().map_or(0, |r| interp.heap.len(r.series));
        interp.insert_into(base, tail, value, base.kind().is_array())?;
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::engine::Interpreter;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.eval_molded(source) {
            Ok(text) => text,
            Err(failure) => format!("failed: {}", failure.report().map(|r| r.id.clone()).unwrap_or_default()),
        }
    }

    #[test]
    fn test_positions_share_one_series() {
        assert_eq!(eval("b: [1 2 3] n: next b append b 4 n"), "[2 3 4]");
        assert_eq!(eval("index-of skip [a b c] 2"), "3");
        assert_eq!(eval("tail? tail [1]"), "true");
        assert_eq!(eval("head next [1 2]"), "[1 2]");
    }

    #[test]
    fn test_append_and_insert() {
        assert_eq!(eval("append [1] [2 3]"), "[1 2 3]");
        assert_eq!(eval("append/only [1] [2 3]"), "[1 [2 3]]");
        assert_eq!(eval("append \"ab\" 12"), "\"ab12\"");
        assert_eq!(eval("head insert [3] [1 2]"), "[1 2 3]");
        assert_eq!(eval("insert [3] 1"), "[3]");
    }

    #[test]
    fn test_copy() {
        assert_eq!(eval("a: [1 [2]] b: copy/deep a append second b 3 a"), "[1 [2]]");
        assert_eq!(eval("copy/part \"hello\" 2"), "\"he\"");
        assert_eq!(eval("a: \"x\" b: copy a append b \"y\" a"), "\"x\"");
    }

    #[test]
    fn test_find_and_select() {
        assert_eq!(eval("find [a b c] 'b"), "[b c]");
        assert_eq!(eval("find \"Hello\" \"LL\""), "\"llo\"");
        assert_eq!(eval("select [a 1 b 2] 'b"), "2");
        assert_eq!(eval("find [1 2] 3"), "none");
    }

    #[test]
    fn test_join_and_rejoin() {
        assert_eq!(eval("join \"a\" [1 + 1 \"b\"]"), "\"a2b\"");
        assert_eq!(eval("rejoin [\"x\" 1 2]"), "\"x12\"");
        assert_eq!(eval("rejoin [[a] [b]]"), "[a [b]]");
    }

    #[test]
    fn test_protected_series_refuse_change() {
        assert_eq!(eval("b: [1] protect b append b 2"), "failed: protected");
        assert_eq!(eval("b: [1] protect b unprotect b append b 2"), "[1 2]");
    }
}
