//! Datatypes, contexts, words and output: `make`, `to`, `type-of`,
//! type predicates, `same?`, `set`, `get`, `bind`, `in`, `context`,
//! `value?`, `protect`, `print`, `probe`, `mold`, `form`, `load`

use crate::interpreter::context::{ContextData, ContextKind};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ErrorId;
use crate::interpreter::natives::{Call, NativeTable};
use crate::interpreter::unwind::Eval;
use crate::memory::series::{ActionBody, SeriesData, SeriesId};
use crate::memory::value::{ActionCell, Binding, SeriesRef, Value, WordCell};
use rustc_hash::FxHashSet;

pub const NATIVES: NativeTable = &[
    ("make", "type [any-value!] spec [any-value!]", native_make),
    ("to", "type [datatype!] value [any-value!]", native_to),
    ("type-of", "value [any-type!]", native_type_of),
    ("same?", "value1 [any-type!] value2 [any-type!]", native_same),
    ("set", "word [any-word! block!] value [any-type!]", native_set),
    ("get", "word [any-word!]", native_get),
    ("unset", "word [any-word!]", native_unset),
    ("value?", "value [any-value!]", native_is_value),
    ("bind", "words [block! any-word!] context [any-object! any-word!]", native_bind),
    ("in", "object [any-object!] word [any-word!]", native_in),
    ("context", "spec [block!]", native_context),
    ("words-of", "object [any-object!]", native_words_of),
    ("protect", "value [series! any-object!] /deep", native_protect),
    ("unprotect", "value [series! any-object!] /deep", native_unprotect),
    ("print", "value [any-value!]", native_print),
    ("probe", "value [any-type!]", native_probe),
    ("mold", "value [any-type!]", native_mold),
    ("form", "value [any-type!]", native_form),
    ("to-text", "value [any-type!]", native_to_text),
    ("load", "source [string! file! binary!]", native_load),
];

impl Interpreter {
    /// `make object!` / `context`: collect the spec's top-level set-words
    /// (plus the parent's keys), bind a copy of the spec to the new object
    /// and evaluate it
    pub(crate) fn make_object(&mut self, parent: Option<SeriesId>, spec: SeriesRef) -> Eval {
        let mut context = match parent {
            Some(parent) => {
                let source = self.heap.context(parent);
                let pairs: Vec<_> = source.keys.iter().map(|&k| (k, self.symbols.canon(k))).collect();
                let mut inherited = ContextData::with_keys(ContextKind::Object, &pairs);
                inherited.vars = source.vars.clone();
                inherited
            }
            None => ContextData::new(ContextKind::Object),
        };
        for sym in self.collect_set_words_shallow(spec) {
            context.push(sym, self.symbols.canon(sym), Value::Unset);
        }
        let object = self.heap.alloc_context(context);
        self.hold(Value::Object(object));
        if parent.is_some() {
            self.rebind_methods(object)?;
        }

        let body = self.copy_array_deep(spec.series, spec.index());
        self.bind_deep(body, &[object]);
        self.do_block(SeriesRef::head(body))?;
        Ok(Value::Object(object))
    }

    /// Give every user action inherited into `object` its own body bound to
    /// `object`, so methods see the derived fields
    fn rebind_methods(&mut self, object: SeriesId) -> Eval<()> {
        let vars = self.heap.context(object).vars.clone();
        for (index, var) in vars.into_iter().enumerate() {
            let Value::Action(cell) = var else {
                continue;
            };
            let mut action = self.heap.action(cell.action).clone();
            let ActionBody::User { body } = action.body else {
                continue;
            };
            let copy = self.copy_array_deep(body, 0);
            self.hold(Value::Block(SeriesRef::head(copy)));
            self.bind_deep(copy, &[object]);
            action.body = ActionBody::User { body: copy };
            let rebound = self.heap.alloc_action(action);
            let cell = Value::Action(ActionCell { action: rebound, binding: cell.binding });
            self.heap
                .context_set(object, index, cell)
                .map_err(|e| self.heap_error(e))?;
        }
        Ok(())
    }

    /// Context a word is bound to, or the context of an object value
    fn context_of(&mut self, value: Value) -> Eval<SeriesId> {
        if let Some(id) = value.context() {
            return Ok(id);
        }
        match value.as_word().map(|w| w.binding) {
            Some(Binding::Bound { context, .. }) => Ok(context),
            _ => Err(self.error(ErrorId::NotBound, &[value])),
        }
    }

    /// Set or clear the protected flag of a series or context, optionally
    /// reaching every array nested inside it
    fn set_protection(&mut self, value: Value, protected: bool, deep: bool) {
        let root = match value.context() {
            Some(id) => id,
            None => match value.series_ref() {
                Some(r) => r.series,
                None => return,
            },
        };
        let mut visited = FxHashSet::default();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            self.heap.set_protected(id, protected);
            if !deep {
                continue;
            }
            let nested: Vec<Value> = match &self.heap.series(id).data {
                SeriesData::Array(values) => values.clone(),
                SeriesData::Context(context) => context.vars.clone(),
                _ => Vec::new(),
            };
            for item in nested {
                if let Some(r) = item.array_ref() {
                    pending.push(r.series);
                } else if let Some(id) = item.context() {
                    pending.push(id);
                }
            }
        }
    }
}

fn native_make(interp: &mut Interpreter, call: &Call) -> Eval {
    match (call.arg(0), call.arg(1)) {
        (Value::Datatype(kind), spec) => interp.make_value(kind, spec),
        (Value::Object(parent), Value::Block(spec)) => interp.make_object(Some(parent), spec),
        (target, _) => Err(interp.error(ErrorId::BadMake, &[target, call.arg(1)])),
    }
}

fn native_to(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0) {
        Value::Datatype(kind) => interp.to_value(kind, call.arg(1)),
        other => Err(interp.error(ErrorId::InvalidArg, &[other])),
    }
}

fn native_type_of(_: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Datatype(call.arg(0).kind()))
}

/// Shared by every `integer?`-style predicate; the kind comes from the
/// registration
pub(crate) fn native_type_predicate(_: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(Some(call.arg(0).kind()) == call.kind))
}

/// Identity: the same series at the same position, the same context, or
/// equal immediates
fn native_same(_: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(call.arg(0) == call.arg(1)))
}

fn native_set(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(1);
    match call.arg(0) {
        Value::Block(words) => {
            let targets = interp.heap.array(words.series)[words.index()..].to_vec();
            for (i, target) in targets.into_iter().enumerate() {
                let Some(word) = target.as_word() else {
                    return Err(interp.error(ErrorId::InvalidArg, &[target]));
                };
                let item = match value {
                    Value::Block(r) => interp.element_at(value, r.index() + i).unwrap_or(Value::None),
                    other => other,
                };
                interp.set_var(word, item)?;
            }
        }
        target => match target.as_word() {
            Some(word) => interp.set_var(word, value)?,
            None => return Err(interp.error(ErrorId::InvalidArg, &[target])),
        },
    }
    Ok(value)
}

fn native_get(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0).as_word() {
        Some(word) => interp.get_var(word),
        None => Err(interp.error(ErrorId::InvalidArg, &[call.arg(0)])),
    }
}

fn native_unset(interp: &mut Interpreter, call: &Call) -> Eval {
    if let Some(word) = call.arg(0).as_word() {
        interp.set_var(word, Value::Unset)?;
    }
    Ok(Value::Unset)
}

fn native_is_value(interp: &mut Interpreter, call: &Call) -> Eval {
    let defined = match call.arg(0).as_word() {
        Some(word) => matches!(word.binding, Binding::Bound { .. }) && !interp.get_var(word)?.is_unset(),
        None => true,
    };
    Ok(Value::Logic(defined))
}

fn native_bind(interp: &mut Interpreter, call: &Call) -> Eval {
    let context = interp.context_of(call.arg(1))?;
    match call.arg(0) {
        Value::Block(r) => {
            interp.bind_deep(r.series, &[context]);
            Ok(Value::Block(r))
        }
        word => {
            let Some(cell) = word.as_word() else {
                return Err(interp.error(ErrorId::InvalidArg, &[word]));
            };
            let canon = interp.symbols.canon(cell.sym);
            match interp.heap.context(context).find(canon) {
                Some(index) => Ok(word.with_word(WordCell {
                    sym: cell.sym,
                    binding: Binding::Bound {
                        context,
                        index: index as u32,
                    },
                })),
                None => Err(interp.error(ErrorId::NotBound, &[word])),
            }
        }
    }
}

fn native_in(interp: &mut Interpreter, call: &Call) -> Eval {
    let context = interp.context_of(call.arg(0))?;
    let Some(word) = call.arg(1).as_word() else {
        return Err(interp.error(ErrorId::InvalidArg, &[call.arg(1)]));
    };
    let canon = interp.symbols.canon(word.sym);
    Ok(match interp.heap.context(context).find(canon) {
        Some(index) => Value::Word(WordCell {
            sym: word.sym,
            binding: Binding::Bound {
                context,
                index: index as u32,
            },
        }),
        None => Value::None,
    })
}

fn native_context(interp: &mut Interpreter, call: &Call) -> Eval {
    let spec = call.block(interp, 0)?;
    interp.make_object(None, spec)
}

fn native_words_of(interp: &mut Interpreter, call: &Call) -> Eval {
    let context = interp.context_of(call.arg(0))?;
    let words = interp.context_words(context);
    Ok(Value::Block(SeriesRef::head(interp.heap.alloc_array(&words))))
}

fn native_protect(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.set_protection(call.arg(0), true, call.refined(1));
    Ok(call.arg(0))
}

fn native_unprotect(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.set_protection(call.arg(0), false, call.refined(1));
    Ok(call.arg(0))
}

/// Blocks are reduced first and their values joined by spaces
fn native_print(interp: &mut Interpreter, call: &Call) -> Eval {
    let text = match call.arg(0) {
        Value::Block(r) => {
            let reduced = interp.reduce_block(r)?;
            interp.form(&Value::Block(SeriesRef::head(reduced)))
        }
        other => interp.form(&other),
    };
    interp.print_line(&text);
    Ok(Value::Unset)
}

fn native_probe(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(0);
    let text = interp.mold(&value);
    interp.print_line(&text);
    Ok(value)
}

fn native_mold(interp: &mut Interpreter, call: &Call) -> Eval {
    let text = interp.mold(&call.arg(0));
    Ok(Value::Text(SeriesRef::head(interp.heap.alloc_text(&text))))
}

fn native_form(interp: &mut Interpreter, call: &Call) -> Eval {
    let text = interp.form(&call.arg(0));
    Ok(Value::Text(SeriesRef::head(interp.heap.alloc_text(&text))))
}

/// Binaries decode as UTF-8; anything else forms
fn native_to_text(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(0);
    let text = match value {
        Value::Binary(r) => {
            let bytes = interp.heap.bytes(r.series).get(r.index()..).unwrap_or_default();
            match std::str::from_utf8(bytes).map(str::to_owned) {
                Ok(text) => text,
                Err(err) => return Err(interp.error_text(ErrorId::InvalidArg, &[&err.to_string()])),
            }
        }
        other => interp.form(&other),
    };
    Ok(Value::Text(SeriesRef::head(interp.heap.alloc_text(&text))))
}

/// A source holding exactly one value loads as that value, otherwise as a
/// block
fn native_load(interp: &mut Interpreter, call: &Call) -> Eval {
    let source = match call.arg(0) {
        Value::Binary(r) => {
            String::from_utf8_lossy(interp.heap.bytes(r.series).get(r.index()..).unwrap_or_default()).into_owned()
        }
        Value::File(r) => {
            let path = interp.heap.text_string(r.series, r.index());
            let bytes = std::fs::read(&path)
                .map_err(|err| interp.error_text(ErrorId::DeviceFailure, &[&path, &err.to_string()]))?;
            // a registered extension selects a codec; anything else is source
            let decoded = interp.codecs.for_path(&path).and_then(|name| {
                let decoded = interp.codecs.decode(name, &bytes)?;
                Some((name.to_string(), decoded))
            });
            match decoded {
                Some((_, Ok(decoded))) => return Ok(interp.from_decoded(&decoded)),
                Some((name, Err(err))) => {
                    return Err(interp.error_text(ErrorId::CodecFailure, &[&name, &err.to_string()]))
                }
                None => String::from_utf8_lossy(&bytes).into_owned(),
            }
        }
        other => interp.form(&other),
    };
    let block = interp.load_text(&source)?;
    match interp.heap.array(block) {
        [single] => Ok(*single),
        _ => Ok(Value::Block(SeriesRef::head(block))),
    }
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
    fn test_objects() {
        assert_eq!(eval("o: make object! [a: 1 b: a + 1] o/b"), "2");
        assert_eq!(eval("o: context [a: 1] p: make o [b: 2] p/a + p/b"), "3");
        assert_eq!(eval("o: context [n: 1 bump: func [] [n: n + 1]] o/bump o/bump o/n"), "3");
        assert_eq!(eval("o: context [a: 1] o/a: 5 o/a"), "5");
    }

    #[test]
    fn test_set_get_in() {
        assert_eq!(eval("x: none set 'x 10 x"), "10");
        assert_eq!(eval("a: b: none set [a b] [1 2] b"), "2");
        assert_eq!(eval("x: 3 get 'x"), "3");
        assert_eq!(eval("o: context [v: 7] get in o 'v"), "7");
        assert_eq!(eval("o: context [v: 7] in o 'missing"), "none");
    }

    #[test]
    fn test_type_predicates() {
        assert_eq!(eval("integer? 1"), "true");
        assert_eq!(eval("block? 1"), "false");
        assert_eq!(eval("type-of \"a\""), "string!");
        assert_eq!(eval("same? b: [1] b"), "true");
        assert_eq!(eval("same? [1] [1]"), "false");
    }

    #[test]
    fn test_print_captures_output() {
        let mut interp = Interpreter::new();
        interp.eval_str("print [1 + 1 \"apples\"] probe 'x").unwrap();
        assert_eq!(interp.take_output(), "2 apples\nx\n");
    }

    #[test]
    fn test_load_single_value_and_block() {
        assert_eq!(eval("load \"42\""), "42");
        assert_eq!(eval("load \"a b\""), "[a b]");
    }

    #[test]
    fn test_load_files() {
        let dir = std::env::temp_dir();
        let script = dir.join(format!("rebound-load-{}.reb", std::process::id()));
        let notes = dir.join(format!("rebound-load-{}.txt", std::process::id()));
        std::fs::write(&script, "1 + 2").unwrap();
        std::fs::write(&notes, "1 + 2").unwrap();
        let script_path = script.to_string_lossy().into_owned();
        let notes_path = notes.to_string_lossy().into_owned();

        assert_eq!(eval(&format!("do load to file! {:?}", script_path)), "3");
        assert_eq!(eval(&format!("load to file! {:?}", notes_path)), "\"1 + 2\"");
        assert_eq!(eval("load %no-such-file.reb"), "failed: device-failure");

        let _ = std::fs::remove_file(script);
        let _ = std::fs::remove_file(notes);
    }

    #[test]
    fn test_to_text_decodes_binaries() {
        assert_eq!(eval("to-text #{68C3A9}"), "\"h\u{e9}\"");
        assert_eq!(eval("to-text next #{6869}"), "\"i\"");
        assert_eq!(eval("to-text #{FF}"), "failed: invalid-arg");
        assert_eq!(eval("to-text 12"), "\"12\"");
    }

    #[test]
    fn test_make_rejects_oversized_series() {
        assert_eq!(eval("make string! 9223372036854775807"), "failed: out-of-range");
        assert_eq!(eval("make block! 9223372036854775807"), "failed: out-of-range");
        assert_eq!(eval("make binary! 9223372036854775807"), "failed: out-of-range");
        assert_eq!(eval("length-of make string! 100"), "0");
    }
}
