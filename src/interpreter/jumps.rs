//! Non-local jumps: `return`, `break`, `continue`, `throw` / `catch`,
//! `trap` / `attempt`, `fail`, `quit` and `halt`.
//!
//! Raising natives return `Err(Unwind::..)`; catching natives run a block and
//! pattern-match the signal they own, passing every other signal outward.

use super::engine::Interpreter;
use super::errors::{Category, ErrorId};
use super::natives::{Call, NativeTable};
use super::symbols::sym;
use super::unwind::{Eval, Unwind};
use crate::memory::value::{SeriesRef, Value};

pub const NATIVES: NativeTable = &[
    ("break", "/with value [any-type!]", native_break),
    ("continue", "", native_continue),
    ("throw", "value [any-type!] /name word [word!]", native_throw),
    ("catch", "block [block!] /name word [word! block!]", native_catch),
    ("trap", "block [block!]", native_trap),
    ("attempt", "block [block!]", native_attempt),
    ("fail", "reason [string! block! error!]", native_fail),
    ("quit", "/with status [integer!]", native_quit),
    ("halt", "", native_halt),
];

/// Definitional return; only callable through a frame-bound copy
pub(crate) fn native_return(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.binding {
        Some(target) => Err(Unwind::Return {
            target,
            value: call.arg(0),
        }),
        None => Err(interp.error(ErrorId::NoFunction, &[])),
    }
}

fn native_break(_: &mut Interpreter, call: &Call) -> Eval {
    let value = if call.refined(0) { call.arg(1) } else { Value::None };
    Err(Unwind::Break { value })
}

fn native_continue(_: &mut Interpreter, _: &Call) -> Eval {
    Err(Unwind::Continue)
}

fn native_throw(_: &mut Interpreter, call: &Call) -> Eval {
    let name = call.refined(1).then(|| call.arg(2));
    Err(Unwind::Throw {
        name,
        value: call.arg(0),
    })
}

fn native_catch(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    let wanted = call.refined(1).then(|| call.arg(2));
    match interp.do_block(block) {
        Err(Unwind::Throw { name, value }) if interp.catch_matches(wanted, name) => Ok(value),
        other => other,
    }
}

fn native_trap(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    match interp.do_block(block) {
        Ok(_) => Ok(Value::None),
        Err(Unwind::Error(error)) if interp.error_category(error).interceptable() => Ok(Value::Error(error)),
        Err(other) => Err(other),
    }
}

fn native_attempt(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    match interp.do_block(block) {
        Err(Unwind::Error(error)) if interp.error_category(error).interceptable() => Ok(Value::None),
        other => other,
    }
}

fn native_fail(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0) {
        Value::Error(error) => Err(Unwind::Error(error)),
        Value::Block(block) => {
            let reduced = interp.reduce_block(block)?;
            let text = interp.form(&Value::Block(SeriesRef::head(reduced)));
            let message = interp.heap.alloc_text(&text);
            Err(Unwind::Error(interp.user_error(Value::Text(SeriesRef::head(message)))))
        }
        reason => Err(Unwind::Error(interp.user_error(reason))),
    }
}

fn native_quit(interp: &mut Interpreter, call: &Call) -> Eval {
    let status = match call.arg(1) {
        Value::Integer(n) if call.refined(0) => {
            i32::try_from(n).map_err(|_| interp.error(ErrorId::OutOfRange, &[Value::Integer(n)]))?
        }
        _ => 0,
    };
    Err(Unwind::Quit { status })
}

fn native_halt(interp: &mut Interpreter, _: &Call) -> Eval {
    Err(interp.halt_signal())
}

impl Interpreter {
    /// Whether a `catch` asking for `wanted` takes a throw named `name`.
    /// Unnamed catches take unnamed throws only; names match by word
    /// (case-insensitively) or by equality for other values.
    fn catch_matches(&self, wanted: Option<Value>, name: Option<Value>) -> bool {
        match (wanted, name) {
            (None, None) => true,
            (Some(Value::Block(names)), Some(name)) => self.heap.array(names.series)[names.index()..]
                .iter()
                .any(|candidate| self.names_match(candidate, &name)),
            (Some(wanted), Some(name)) => self.names_match(&wanted, &name),
            _ => false,
        }
    }

    fn names_match(&self, a: &Value, b: &Value) -> bool {
        match (a.symbol(), b.symbol()) {
            (Some(x), Some(y)) => self.symbols.same(x, y),
            _ => self.values_equal(a, b, true),
        }
    }

    /// `make error!` from a spec block such as
    /// `[type: 'math id: 'zero-divide]` or `[message: "went wrong"]`
    pub(crate) fn error_from_spec(&mut self, spec: SeriesRef) -> Eval {
        let object = self.make_object(None, spec)?;
        let Some(fields) = object.context() else {
            return Err(self.error(ErrorId::InvalidArg, &[Value::Block(spec)]));
        };
        let field = |interp: &mut Interpreter, name: &str| {
            let key = interp.symbols.intern(name);
            interp.context_get(fields, key).filter(|v| !v.is_unset())
        };
        let category = field(self, "type")
            .and_then(|v| v.symbol())
            .and_then(|s| Category::from_name(self.symbols.name(s)))
            .unwrap_or(Category::User);
        let id_word = field(self, "id").and_then(|v| v.symbol());
        let catalog = id_word.and_then(|s| ErrorId::from_name(self.symbols.name(s)));
        let message = match (field(self, "message"), catalog) {
            (Some(message), _) => message,
            (None, Some(id)) => Value::Text(SeriesRef::head(self.heap.alloc_text(id.template()))),
            (None, None) => Value::None,
        };
        let args = [
            field(self, "arg1").unwrap_or(Value::None),
            field(self, "arg2").unwrap_or(Value::None),
            field(self, "arg3").unwrap_or(Value::None),
        ];
        let type_sym = self.symbols.intern(category.name());
        let id_sym = id_word.unwrap_or(sym::MESSAGE);
        Ok(Value::Error(self.make_error_context(type_sym, id_sym, message, &args)))
    }
}
