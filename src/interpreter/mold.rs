//! Rendering values to text
//!
//! `mold` produces source form: for every value with literal syntax, scanning
//! and evaluating the molded text gives back an equal value. `form` produces
//! display form (strings without quotes, blocks without brackets).
//!
//! The per-kind renderers below are installed in the type table; the
//! top-level [`Interpreter::mold`] / [`Interpreter::form`] only dispatch.

use super::constants::{STACK_GROW_SIZE, STACK_RED_ZONE};
use super::engine::Interpreter;
use crate::memory::series::{ActionBody, SeriesId};
use crate::memory::value::{SeriesRef, Value};
use rustc_hash::FxHashSet;
use std::fmt::Write;

/// Rendering state threaded through nested values
#[derive(Debug, Default)]
pub struct Molder {
    pub out: String,
    /// Display form instead of source form
    pub form: bool,
    /// Arrays and contexts being rendered, for cycle detection
    active: FxHashSet<SeriesId>,
}

impl Molder {
    pub fn new(form: bool) -> Self {
        Molder {
            out: String::new(),
            form,
            active: FxHashSet::default(),
        }
    }

    fn enter(&mut self, id: SeriesId) -> bool {
        self.active.insert(id)
    }

    fn leave(&mut self, id: SeriesId) {
        self.active.remove(&id);
    }
}

impl Interpreter {
    pub fn mold(&self, value: &Value) -> String {
        let mut molder = Molder::new(false);
        self.mold_into(value, &mut molder);
        molder.out
    }

    pub fn form(&self, value: &Value) -> String {
        let mut molder = Molder::new(true);
        self.mold_into(value, &mut molder);
        molder.out
    }

    /// Dispatch through the type table
    pub fn mold_into(&self, value: &Value, molder: &mut Molder) {
        let render = self.types.entry(value.kind()).mold;
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || render(self, value, molder));
    }

    fn mold_elements(&self, values: &[Value], molder: &mut Molder, separator: &str) {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                molder.out.push_str(separator);
            }
            self.mold_into(value, molder);
        }
    }
}

pub fn mold_none(_: &Interpreter, _: &Value, m: &mut Molder) {
    m.out.push_str("none");
}

pub fn mold_unset(_: &Interpreter, _: &Value, m: &mut Molder) {
    if !m.form {
        m.out.push_str("#[unset]");
    }
}

pub fn mold_logic(_: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Logic(b) = value {
        m.out.push_str(if *b { "true" } else { "false" });
    }
}

pub fn mold_integer(_: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Integer(n) = value {
        let _ = write!(m.out, "{}", n);
    }
}

pub fn mold_decimal(_: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Decimal(d) = value {
        m.out.push_str(&format_decimal(*d));
    }
}

/// Shortest text that scans back to the same decimal
pub fn format_decimal(d: f64) -> String {
    if !d.is_finite() {
        return if d.is_nan() {
            "1.#NaN".into()
        } else if d > 0.0 {
            "1.#INF".into()
        } else {
            "-1.#INF".into()
        };
    }
    let magnitude = d.abs();
    if magnitude != 0.0 && !(1e-5..1e15).contains(&magnitude) {
        format!("{:e}", d)
    } else if d.fract() == 0.0 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

pub fn mold_char(_: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Char(c) = value {
        if m.form {
            m.out.push(*c);
        } else {
            m.out.push_str("#\"");
            escape_char(*c, '"', &mut m.out);
            m.out.push('"');
        }
    }
}

fn escape_char(c: char, quote: char, out: &mut String) {
    match c {
        '\n' => out.push_str("^/"),
        '\t' => out.push_str("^-"),
        '^' => out.push_str("^^"),
        '\0' => out.push_str("^@"),
        c if c == quote => {
            out.push('^');
            out.push(c);
        }
        c if c.is_control() => {
            let _ = write!(out, "^({:X})", c as u32);
        }
        c => out.push(c),
    }
}

pub fn mold_pair(_: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Pair(x, y) = value {
        let _ = write!(m.out, "{}x{}", x, y);
    }
}

pub fn mold_date(_: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Date(d) = value {
        let _ = write!(m.out, "{:04}-{:02}-{:02}", d.year, d.month, d.day);
    }
}

pub fn mold_word(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Some(sym) = value.symbol() else {
        return;
    };
    let name = interp.symbols.name(sym);
    match value {
        Value::SetWord(_) => {
            m.out.push_str(name);
            m.out.push(':');
        }
        Value::GetWord(_) => {
            m.out.push(':');
            m.out.push_str(name);
        }
        Value::LitWord(_) if !m.form => {
            m.out.push('\'');
            m.out.push_str(name);
        }
        Value::Refinement(_) => {
            m.out.push('/');
            m.out.push_str(name);
        }
        Value::Issue(_) => {
            m.out.push('#');
            m.out.push_str(name);
        }
        _ => m.out.push_str(name),
    }
}

pub fn mold_array(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Some(r) = value.series_ref() else {
        return;
    };
    let values = interp.heap.array(r.series);
    let values = &values[r.index().min(values.len())..];
    let (open, close, separator) = match value {
        Value::Block(_) => ("[", "]", " "),
        Value::Group(_) => ("(", ")", " "),
        Value::GetPath(_) => (":", "", "/"),
        Value::SetPath(_) => ("", ":", "/"),
        _ => ("", "", "/"),
    };
    let top_form = m.form && matches!(value, Value::Block(_));
    if !m.enter(r.series) {
        m.out.push_str(if top_form { "..." } else { "[...]" });
        return;
    }
    if top_form {
        // display form drops the outer brackets but keeps nested ones
        let form = std::mem::replace(&mut m.form, false);
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                m.out.push(' ');
            }
            m.form = form && !v.kind().is_array();
            interp.mold_into(v, m);
        }
        m.form = form;
    } else {
        let form = std::mem::replace(&mut m.form, false);
        m.out.push_str(open);
        interp.mold_elements(values, m, separator);
        m.out.push_str(close);
        m.form = form;
    }
    m.leave(r.series);
}

pub fn mold_string(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Some(r) = value.series_ref() else {
        return;
    };
    let chars = interp.heap.chars(r.series);
    let chars = &chars[r.index().min(chars.len())..];
    if m.form {
        m.out.extend(chars.iter());
        return;
    }
    let is_file = matches!(value, Value::File(_));
    let plain_file = is_file
        && !chars.is_empty()
        && chars
            .iter()
            .all(|c| !c.is_whitespace() && !matches!(c, '[' | ']' | '(' | ')' | '"' | '{' | '}' | ';' | '^'));
    if is_file {
        m.out.push('%');
        if plain_file {
            m.out.extend(chars.iter());
            return;
        }
    }
    m.out.push('"');
    for &c in chars {
        escape_char(c, '"', &mut m.out);
    }
    m.out.push('"');
}

pub fn mold_binary(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Some(r) = value.series_ref() else {
        return;
    };
    let bytes = interp.heap.bytes(r.series);
    m.out.push_str("#{");
    for byte in &bytes[r.index().min(bytes.len())..] {
        let _ = write!(m.out, "{:02X}", byte);
    }
    m.out.push('}');
}

pub fn mold_object(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Some(id) = value.context() else {
        return;
    };
    if !m.enter(id) {
        m.out.push_str("make object! [...]");
        return;
    }
    let context = interp.heap.context(id);
    let form = std::mem::replace(&mut m.form, false);
    if !form {
        m.out.push_str("make object! [");
    }
    for (i, (key, var)) in context.keys.iter().zip(&context.vars).enumerate() {
        if i > 0 {
            m.out.push_str(if form { "\n" } else { " " });
        }
        m.out.push_str(interp.symbols.name(*key));
        m.out.push_str(": ");
        interp.mold_into(var, m);
    }
    if !form {
        m.out.push(']');
    }
    m.form = form;
    m.leave(id);
}

pub fn mold_error(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Some(id) = value.context() else {
        return;
    };
    if m.form {
        m.out.push_str(&interp.report(id).to_string());
        return;
    }
    let report = interp.report(id);
    let _ = write!(
        m.out,
        "make error! [type: '{} id: '{} message: ",
        report.category.name(),
        report.id
    );
    mold_string_literal(&report.message, &mut m.out);
    m.out.push(']');
}

fn mold_string_literal(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        escape_char(c, '"', out);
    }
    out.push('"');
}

pub fn mold_action(interp: &Interpreter, value: &Value, m: &mut Molder) {
    let Value::Action(cell) = value else {
        return;
    };
    let action = interp.heap.action(cell.action);
    match (action.body, action.spec) {
        (ActionBody::User { body }, Some(spec)) => {
            m.out.push_str("func ");
            mold_array(interp, &Value::Block(SeriesRef::head(spec)), m);
            m.out.push(' ');
            mold_array(interp, &Value::Block(SeriesRef::head(body)), m);
        }
        _ => {
            let what = match action.body {
                ActionBody::Routine(_) => "routine!",
                _ => "native!",
            };
            let _ = match action.name {
                Some(name) => write!(m.out, "#[{} {}]", what, interp.symbols.name(name)),
                None => write!(m.out, "#[{}]", what),
            };
        }
    }
}

pub fn mold_datatype(interp: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Datatype(kind) = value {
        m.out.push_str(interp.types.entry(*kind).name);
    }
}

pub fn mold_port(interp: &Interpreter, value: &Value, m: &mut Molder) {
    if let Value::Port(id) = value {
        let port = interp.heap.port(*id);
        let _ = write!(
            m.out,
            "#[port! {}:{}]",
            interp.symbols.name(port.scheme),
            port.target
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_format() {
        assert_eq!(format_decimal(1.0), "1.0");
        assert_eq!(format_decimal(-2.5), "-2.5");
        assert_eq!(format_decimal(0.1), "0.1");
        assert_eq!(format_decimal(1e20), "1e20");
        assert_eq!(format_decimal(1.5e-7), "1.5e-7");
        assert_eq!(format_decimal(0.0), "0.0");
    }

    #[test]
    fn test_char_escapes() {
        let mut out = String::new();
        for c in ['a', '\n', '"', '^', '\u{7}'] {
            escape_char(c, '"', &mut out);
        }
        assert_eq!(out, "a^/^\"^^^(7)");
    }
}
