//! Per-type dispatch
//!
//! This module provides the [`TypeTable`]: one [`TypeEntry`] per [`Kind`],
//! holding the behaviors the rest of the interpreter reaches through it:
//! - `compare`: equality and ordering (`=`, `==`, `<`, `equal?`, ...)
//! - `make` / `to`: construction and conversion
//! - `mold`: rendering (see [`super::mold`])
//! - `pick` / `poke`: path access and path assignment
//!
//! The evaluator never matches on a datatype for any of these. Adding a
//! datatype means adding an entry; extensions override entries through
//! [`TypeTable::set`].
//!
//! [`TypeSet`] is the bitset used in parameter specs.

use super::constants::{STACK_GROW_SIZE, STACK_RED_ZONE};
use super::engine::Interpreter;
use super::errors::ErrorId;
use super::mold::{self, Molder};
use super::unwind::Eval;
use crate::memory::value::{Date, Kind, SeriesRef, Value, WordCell};
use std::cmp::Ordering;

/// Set of kinds accepted by a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeSet(u32);

impl TypeSet {
    pub const EMPTY: TypeSet = TypeSet(0);
    /// Every kind, `unset!` included
    pub const ALL: TypeSet = TypeSet((1 << Kind::COUNT) - 1);
    /// Every kind but `unset!`
    pub const ANY_VALUE: TypeSet = TypeSet(((1 << Kind::COUNT) - 1) & !(1 << Kind::Unset as u32));

    pub fn of(kinds: &[Kind]) -> Self {
        kinds.iter().fold(TypeSet::EMPTY, |set, &k| set.with(k))
    }

    pub fn with(self, kind: Kind) -> Self {
        TypeSet(self.0 | 1 << kind.index())
    }

    pub fn union(self, other: TypeSet) -> Self {
        TypeSet(self.0 | other.0)
    }

    pub fn contains(self, kind: Kind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn kinds(self) -> impl Iterator<Item = Kind> {
        Kind::ALL.into_iter().filter(move |&k| self.contains(k))
    }

    fn matching(pred: fn(Kind) -> bool) -> Self {
        TypeSet::of(&Kind::ALL.into_iter().filter(|&k| pred(k)).collect::<Vec<_>>())
    }

    /// Pseudo-type names usable in specs besides the datatype names
    pub fn named(name: &str) -> Option<Self> {
        let set = match name {
            "any-type!" => TypeSet::ALL,
            "any-value!" => TypeSet::ANY_VALUE,
            "number!" => TypeSet::matching(Kind::is_number),
            "series!" => TypeSet::matching(Kind::is_series),
            "any-string!" => TypeSet::matching(Kind::is_string),
            "any-word!" => TypeSet::matching(Kind::is_word),
            "any-block!" => TypeSet::matching(Kind::is_array),
            "any-object!" => TypeSet::matching(Kind::is_context),
            "any-path!" => TypeSet::of(&[Kind::Path, Kind::SetPath, Kind::GetPath]),
            _ => return None,
        };
        Some(set)
    }
}

pub type CompareFn = fn(&Interpreter, &Value, &Value, bool) -> Option<Ordering>;
pub type MakeFn = fn(&mut Interpreter, Kind, Value) -> Eval;
pub type MoldFn = fn(&Interpreter, &Value, &mut Molder);
pub type PickFn = fn(&mut Interpreter, Value, Value) -> Eval;
pub type PokeFn = fn(&mut Interpreter, Value, Value, Value) -> Eval<()>;

/// Behaviors of one datatype
#[derive(Clone, Copy)]
pub struct TypeEntry {
    pub name: &'static str,
    pub compare: CompareFn,
    pub make: MakeFn,
    pub to: MakeFn,
    pub mold: MoldFn,
    pub pick: Option<PickFn>,
    pub poke: Option<PokeFn>,
}

/// Dispatch table indexed by [`Kind`]
pub struct TypeTable {
    entries: Vec<TypeEntry>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable {
            entries: Kind::ALL.iter().map(|&k| builtin_entry(k)).collect(),
        }
    }

    #[inline]
    pub fn entry(&self, kind: Kind) -> &TypeEntry {
        &self.entries[kind.index()]
    }

    /// Replace the behaviors of a datatype
    pub fn set(&mut self, kind: Kind, entry: TypeEntry) {
        self.entries[kind.index()] = entry;
    }

    pub fn kind_by_name(&self, name: &str) -> Option<Kind> {
        if name == "text!" {
            return Some(Kind::Text);
        }
        Kind::ALL.into_iter().find(|&k| self.entry(k).name == name)
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_entry(kind: Kind) -> TypeEntry {
    let base = TypeEntry {
        name: "",
        compare: compare_identity,
        make: make_scalar,
        to: make_scalar,
        mold: mold::mold_none,
        pick: None,
        poke: None,
    };
    match kind {
        Kind::None => TypeEntry { name: "none!", ..base },
        Kind::Unset => TypeEntry { name: "unset!", mold: mold::mold_unset, ..base },
        Kind::Logic => TypeEntry { name: "logic!", mold: mold::mold_logic, ..base },
        Kind::Integer => TypeEntry {
            name: "integer!",
            compare: compare_number,
            mold: mold::mold_integer,
            ..base
        },
        Kind::Decimal => TypeEntry {
            name: "decimal!",
            compare: compare_number,
            mold: mold::mold_decimal,
            ..base
        },
        Kind::Char => TypeEntry {
            name: "char!",
            compare: compare_char,
            mold: mold::mold_char,
            ..base
        },
        Kind::Pair => TypeEntry {
            name: "pair!",
            compare: compare_pair,
            mold: mold::mold_pair,
            pick: Some(pick_pair),
            ..base
        },
        Kind::Date => TypeEntry {
            name: "date!",
            compare: compare_date,
            mold: mold::mold_date,
            pick: Some(pick_date),
            ..base
        },
        Kind::Word | Kind::SetWord | Kind::GetWord | Kind::LitWord | Kind::Refinement | Kind::Issue => {
            TypeEntry {
                name: match kind {
                    Kind::Word => "word!",
                    Kind::SetWord => "set-word!",
                    Kind::GetWord => "get-word!",
                    Kind::LitWord => "lit-word!",
                    Kind::Refinement => "refinement!",
                    _ => "issue!",
                },
                compare: compare_word,
                make: make_word,
                to: make_word,
                mold: mold::mold_word,
                ..base
            }
        }
        Kind::Block | Kind::Group | Kind::Path | Kind::SetPath | Kind::GetPath => TypeEntry {
            name: match kind {
                Kind::Block => "block!",
                Kind::Group => "group!",
                Kind::Path => "path!",
                Kind::SetPath => "set-path!",
                _ => "get-path!",
            },
            compare: compare_array,
            make: make_array,
            to: to_array,
            mold: mold::mold_array,
            pick: Some(pick_array),
            poke: Some(poke_array),
        },
        Kind::Text | Kind::File => TypeEntry {
            name: if kind == Kind::Text { "string!" } else { "file!" },
            compare: compare_string,
            make: make_string,
            to: make_string,
            mold: mold::mold_string,
            pick: Some(pick_string),
            poke: Some(poke_string),
        },
        Kind::Binary => TypeEntry {
            name: "binary!",
            compare: compare_binary,
            make: make_binary,
            to: make_binary,
            mold: mold::mold_binary,
            pick: Some(pick_binary),
            poke: Some(poke_binary),
        },
        Kind::Object => TypeEntry {
            name: "object!",
            make: make_object,
            to: make_object,
            mold: mold::mold_object,
            pick: Some(pick_context),
            poke: Some(poke_context),
            ..base
        },
        Kind::Error => TypeEntry {
            name: "error!",
            make: make_error,
            to: make_error,
            mold: mold::mold_error,
            pick: Some(pick_context),
            ..base
        },
        Kind::Action => TypeEntry {
            name: "action!",
            make: make_action,
            to: make_action,
            mold: mold::mold_action,
            ..base
        },
        Kind::Datatype => TypeEntry {
            name: "datatype!",
            mold: mold::mold_datatype,
            ..base
        },
        Kind::Port => TypeEntry {
            name: "port!",
            make: make_port,
            to: make_port,
            mold: mold::mold_port,
            ..base
        },
    }
}

// ---- dispatch ----

impl Interpreter {
    pub fn kind_name(&self, kind: Kind) -> &'static str {
        self.types.entry(kind).name
    }

    /// Ordering of two values, `None` when they are not comparable
    pub fn compare_values(&self, a: &Value, b: &Value, strict: bool) -> Option<Ordering> {
        let (ka, kb) = (a.kind(), b.kind());
        let comparable = ka == kb
            || (!strict && ka.is_number() && kb.is_number())
            || (!strict && ka.is_word() && kb.is_word())
            || (!strict && ka.is_string() && kb.is_string());
        if !comparable {
            return None;
        }
        (self.types.entry(ka).compare)(self, a, b, strict)
    }

    pub fn values_equal(&self, a: &Value, b: &Value, strict: bool) -> bool {
        self.compare_values(a, b, strict) == Some(Ordering::Equal)
    }

    pub fn make_value(&mut self, kind: Kind, spec: Value) -> Eval {
        let make = self.types.entry(kind).make;
        make(self, kind, spec)
    }

    pub fn to_value(&mut self, kind: Kind, spec: Value) -> Eval {
        if spec.kind() == kind && !kind.is_series() {
            return Ok(spec);
        }
        let to = self.types.entry(kind).to;
        to(self, kind, spec)
    }

    pub fn pick_value(&mut self, container: Value, picker: Value) -> Eval {
        match self.types.entry(container.kind()).pick {
            Some(pick) => pick(self, container, picker),
            None => Err(self.error(ErrorId::InvalidPath, &[container, picker])),
        }
    }

    pub fn poke_value(&mut self, container: Value, picker: Value, value: Value) -> Eval<()> {
        match self.types.entry(container.kind()).poke {
            Some(poke) => poke(self, container, picker, value),
            None => Err(self.error(ErrorId::InvalidPath, &[container, picker])),
        }
    }

    fn bad_make(&mut self, kind: Kind, spec: Value) -> crate::interpreter::unwind::Unwind {
        self.error(ErrorId::BadMake, &[Value::Datatype(kind), spec])
    }
}

// ---- compare ----

fn compare_identity(_: &Interpreter, a: &Value, b: &Value, _: bool) -> Option<Ordering> {
    if a == b {
        Some(Ordering::Equal)
    } else {
        None
    }
}

fn compare_number(_: &Interpreter, a: &Value, b: &Value, strict: bool) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        _ if strict && a.kind() != b.kind() => None,
        _ => a.as_decimal()?.partial_cmp(&b.as_decimal()?),
    }
}

fn compare_char(_: &Interpreter, a: &Value, b: &Value, strict: bool) -> Option<Ordering> {
    let (Value::Char(x), Value::Char(y)) = (a, b) else {
        return None;
    };
    if strict {
        Some(x.cmp(y))
    } else {
        Some(fold(*x).cmp(&fold(*y)))
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn compare_pair(_: &Interpreter, a: &Value, b: &Value, _: bool) -> Option<Ordering> {
    match (a, b) {
        (Value::Pair(ax, ay), Value::Pair(bx, by)) => Some(ay.cmp(by).then(ax.cmp(bx))),
        _ => None,
    }
}

fn compare_date(_: &Interpreter, a: &Value, b: &Value, _: bool) -> Option<Ordering> {
    match (a, b) {
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_word(interp: &Interpreter, a: &Value, b: &Value, strict: bool) -> Option<Ordering> {
    let (sa, sb) = (a.symbol()?, b.symbol()?);
    if strict {
        if a.kind() != b.kind() {
            return None;
        }
        return Some(interp.symbols.name(sa).cmp(interp.symbols.name(sb)));
    }
    let (ca, cb) = (interp.symbols.canon(sa), interp.symbols.canon(sb));
    Some(interp.symbols.name(ca).cmp(interp.symbols.name(cb)))
}

/// Pairs already being compared further up count as equal, so cyclic
/// blocks of the same shape compare equal instead of looping
fn compare_array(interp: &Interpreter, a: &Value, b: &Value, strict: bool) -> Option<Ordering> {
    let (ra, rb) = (a.series_ref()?, b.series_ref()?);
    if ra == rb || interp.comparing.borrow().contains(&(ra, rb)) {
        return Some(Ordering::Equal);
    }
    let xs = &interp.heap.array(ra.series)[ra.index().min(interp.heap.len(ra.series))..];
    let ys = &interp.heap.array(rb.series)[rb.index().min(interp.heap.len(rb.series))..];
    interp.comparing.borrow_mut().insert((ra, rb));
    let ordering = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        for (x, y) in xs.iter().zip(ys) {
            match interp.compare_values(x, y, strict) {
                Some(Ordering::Equal) => {}
                other => return other,
            }
        }
        Some(xs.len().cmp(&ys.len()))
    });
    interp.comparing.borrow_mut().remove(&(ra, rb));
    ordering
}

fn compare_string(interp: &Interpreter, a: &Value, b: &Value, strict: bool) -> Option<Ordering> {
    let (ra, rb) = (a.series_ref()?, b.series_ref()?);
    let xs = &interp.heap.chars(ra.series)[ra.index().min(interp.heap.len(ra.series))..];
    let ys = &interp.heap.chars(rb.series)[rb.index().min(interp.heap.len(rb.series))..];
    if strict {
        Some(xs.cmp(ys))
    } else {
        Some(xs.iter().map(|&c| fold(c)).cmp(ys.iter().map(|&c| fold(c))))
    }
}

fn compare_binary(interp: &Interpreter, a: &Value, b: &Value, _: bool) -> Option<Ordering> {
    let (ra, rb) = (a.series_ref()?, b.series_ref()?);
    let xs = &interp.heap.bytes(ra.series)[ra.index().min(interp.heap.len(ra.series))..];
    let ys = &interp.heap.bytes(rb.series)[rb.index().min(interp.heap.len(rb.series))..];
    Some(xs.cmp(ys))
}

// ---- make / to ----

fn make_scalar(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    let made = match (kind, spec) {
        (Kind::None, _) => Some(Value::None),
        (Kind::Unset, _) => Some(Value::Unset),
        (Kind::Logic, Value::Integer(n)) => Some(Value::Logic(n != 0)),
        (Kind::Logic, other) => Some(Value::Logic(other.is_truthy())),
        (Kind::Integer, Value::Integer(n)) => Some(Value::Integer(n)),
        (Kind::Integer, Value::Decimal(d)) => {
            let t = d.trunc();
            if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(interp.error(ErrorId::Overflow, &[]));
            }
            Some(Value::Integer(t as i64))
        }
        (Kind::Integer, Value::Char(c)) => Some(Value::Integer(c as i64)),
        (Kind::Integer, Value::Logic(b)) => Some(Value::Integer(b as i64)),
        (Kind::Integer, Value::Text(_)) => interp.form(&spec).trim().parse().ok().map(Value::Integer),
        (Kind::Decimal, Value::Integer(n)) => Some(Value::Decimal(n as f64)),
        (Kind::Decimal, Value::Decimal(d)) => Some(Value::Decimal(d)),
        (Kind::Decimal, Value::Text(_)) => interp.form(&spec).trim().parse().ok().map(Value::Decimal),
        (Kind::Char, Value::Char(c)) => Some(Value::Char(c)),
        (Kind::Char, Value::Integer(n)) => u32::try_from(n).ok().and_then(char::from_u32).map(Value::Char),
        (Kind::Char, Value::Text(_)) => {
            let text = interp.form(&spec);
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Char(c)),
                _ => None,
            }
        }
        (Kind::Pair, Value::Pair(x, y)) => Some(Value::Pair(x, y)),
        (Kind::Pair, Value::Integer(n)) => i32::try_from(n).ok().map(|n| Value::Pair(n, n)),
        (Kind::Pair, Value::Block(r)) => match interp.heap.array(r.series).get(r.index()..) {
            Some([Value::Integer(x), Value::Integer(y)]) => {
                match (i32::try_from(*x), i32::try_from(*y)) {
                    (Ok(x), Ok(y)) => Some(Value::Pair(x, y)),
                    _ => None,
                }
            }
            _ => None,
        },
        (Kind::Date, Value::Date(d)) => Some(Value::Date(d)),
        (Kind::Date, Value::Block(r)) => match interp.heap.array(r.series).get(r.index()..) {
            Some([Value::Integer(y), Value::Integer(m), Value::Integer(d)]) => {
                match (i16::try_from(*y), u8::try_from(*m), u8::try_from(*d)) {
                    (Ok(y), Ok(m), Ok(d)) => Date::new(y, m, d).map(Value::Date),
                    _ => None,
                }
            }
            _ => None,
        },
        (Kind::Datatype, Value::Datatype(k)) => Some(Value::Datatype(k)),
        (Kind::Datatype, Value::Word(w)) => {
            let name = interp.symbols.name(w.sym).to_string();
            interp.types.kind_by_name(&name).map(Value::Datatype)
        }
        _ => None,
    };
    made.ok_or_else(|| interp.bad_make(kind, spec))
}

fn make_word(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    let word = match spec {
        _ if spec.as_word().is_some() => spec.as_word(),
        Value::Refinement(sym) | Value::Issue(sym) => Some(WordCell::unbound(sym)),
        Value::Text(_) => {
            let text = interp.form(&spec);
            if text.is_empty() || text.chars().any(|c| c.is_whitespace() || "[](){}\";/".contains(c)) {
                None
            } else {
                Some(WordCell::unbound(interp.symbols.intern(&text)))
            }
        }
        Value::Datatype(k) => {
            let name = interp.kind_name(k);
            Some(WordCell::unbound(interp.symbols.intern(name)))
        }
        _ => None,
    };
    let Some(word) = word else {
        return Err(interp.bad_make(kind, spec));
    };
    Ok(match kind {
        Kind::Word => Value::Word(word),
        Kind::SetWord => Value::SetWord(word),
        Kind::GetWord => Value::GetWord(word),
        Kind::LitWord => Value::LitWord(word),
        Kind::Refinement => Value::Refinement(word.sym),
        _ => Value::Issue(word.sym),
    })
}

fn wrap_array(kind: Kind, r: SeriesRef) -> Value {
    match kind {
        Kind::Group => Value::Group(r),
        Kind::Path => Value::Path(r),
        Kind::SetPath => Value::SetPath(r),
        Kind::GetPath => Value::GetPath(r),
        _ => Value::Block(r),
    }
}

fn make_array(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    match spec {
        Value::Integer(n) if n >= 0 => {
            let id = interp
                .heap
                .allocate(crate::memory::pool::Width::Cell, n as usize)
                .map_err(|err| interp.heap_error(err))?;
            Ok(wrap_array(kind, SeriesRef::head(id)))
        }
        _ => to_array(interp, kind, spec),
    }
}

fn to_array(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    if let Some(r) = spec.array_ref() {
        let id = interp.copy_array_shallow(r.series, r.index());
        return Ok(wrap_array(kind, SeriesRef::head(id)));
    }
    let id = match spec {
        Value::Text(_) => {
            let text = interp.form(&spec);
            interp.load_text(&text)?
        }
        Value::Object(id) => {
            let context = interp.heap.context(id);
            let values: Vec<Value> = context
                .keys
                .iter()
                .zip(&context.vars)
                .flat_map(|(&k, &v)| [Value::SetWord(WordCell::unbound(k)), v])
                .collect();
            interp.heap.alloc_array(&values)
        }
        other => interp.heap.alloc_array(&[other]),
    };
    Ok(wrap_array(kind, SeriesRef::head(id)))
}

fn make_string(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    let id = match spec {
        Value::Integer(n) if n >= 0 && !matches!(kind, Kind::File) => interp
            .heap
            .allocate(crate::memory::pool::Width::Char, n as usize)
            .map_err(|err| interp.heap_error(err))?,
        Value::Binary(r) => {
            let bytes = &interp.heap.bytes(r.series)[r.index()..];
            let text = String::from_utf8_lossy(bytes).into_owned();
            interp.heap.alloc_text(&text)
        }
        other => {
            let text = interp.form(&other);
            interp.heap.alloc_text(&text)
        }
    };
    let r = SeriesRef::head(id);
    Ok(if kind == Kind::File { Value::File(r) } else { Value::Text(r) })
}

fn make_binary(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    let bytes: Vec<u8> = match spec {
        Value::Integer(n) if n >= 0 => {
            let id = interp
                .heap
                .allocate(crate::memory::pool::Width::Byte, n as usize)
                .map_err(|err| interp.heap_error(err))?;
            return Ok(Value::Binary(SeriesRef::head(id)));
        }
        Value::Binary(r) => interp.heap.bytes(r.series)[r.index()..].to_vec(),
        Value::Text(_) | Value::File(_) => interp.form(&spec).into_bytes(),
        Value::Block(r) => {
            let mut bytes = Vec::new();
            for value in &interp.heap.array(r.series)[r.index()..] {
                match value {
                    Value::Integer(n) if (0..=255).contains(n) => bytes.push(*n as u8),
                    _ => return Err(interp.bad_make(kind, spec)),
                }
            }
            bytes
        }
        _ => return Err(interp.bad_make(kind, spec)),
    };
    Ok(Value::Binary(SeriesRef::head(interp.heap.alloc_binary(&bytes))))
}

fn make_object(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    match spec {
        Value::Block(r) => interp.make_object(None, r),
        Value::Object(_) => Ok(spec),
        _ => Err(interp.bad_make(kind, spec)),
    }
}

fn make_error(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    match spec {
        Value::Error(_) => Ok(spec),
        Value::Text(_) => Ok(Value::Error(interp.user_error(spec))),
        Value::Block(r) => interp.error_from_spec(r),
        _ => Err(interp.bad_make(kind, spec)),
    }
}

fn make_action(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    if let Value::Block(r) = spec {
        if let Some([Value::Block(spec_block), Value::Block(body)]) =
            interp.heap.array(r.series).get(r.index()..).map(|s| s.to_vec()).as_deref()
        {
            return interp.make_function(*spec_block, *body);
        }
    }
    Err(interp.bad_make(kind, spec))
}

fn make_port(interp: &mut Interpreter, kind: Kind, spec: Value) -> Eval {
    match spec {
        Value::Port(_) => Ok(spec),
        Value::Word(_) | Value::LitWord(_) | Value::Text(_) | Value::File(_) => interp.make_port(spec),
        _ => Err(interp.bad_make(kind, spec)),
    }
}

// ---- pick / poke ----

/// 1-based position relative to the series index
fn position(r: SeriesRef, n: i64) -> Option<usize> {
    if n < 1 {
        return None;
    }
    r.index().checked_add(n as usize - 1)
}

fn pick_array(interp: &mut Interpreter, container: Value, picker: Value) -> Eval {
    let Some(r) = container.series_ref() else {
        return Ok(Value::None);
    };
    let values = interp.heap.array(r.series);
    match picker {
        Value::Integer(n) => Ok(position(r, n)
            .and_then(|i| values.get(i))
            .copied()
            .unwrap_or(Value::None)),
        _ => {
            let values = values[r.index().min(values.len())..].to_vec();
            let found = values.iter().position(|v| interp.values_equal(v, &picker, false));
            Ok(found
                .and_then(|i| values.get(i + 1))
                .copied()
                .unwrap_or(Value::None))
        }
    }
}

fn poke_array(interp: &mut Interpreter, container: Value, picker: Value, value: Value) -> Eval<()> {
    let Some(r) = container.series_ref() else {
        return Err(interp.error(ErrorId::InvalidPath, &[container, picker]));
    };
    let at = match picker {
        Value::Integer(n) => position(r, n),
        _ => {
            let values = interp.heap.array(r.series)[r.index().min(interp.heap.len(r.series))..].to_vec();
            values
                .iter()
                .position(|v| interp.values_equal(v, &picker, false))
                .map(|i| r.index() + i + 1)
        }
    };
    match at.filter(|&i| i < interp.heap.len(r.series)) {
        Some(i) => interp.heap.set(r.series, i, value).map_err(|e| interp.heap_error(e)),
        None => Err(interp.error(ErrorId::OutOfRange, &[picker])),
    }
}

fn pick_string(interp: &mut Interpreter, container: Value, picker: Value) -> Eval {
    let (Some(r), Value::Integer(n)) = (container.series_ref(), picker) else {
        return Err(interp.error(ErrorId::InvalidPath, &[container, picker]));
    };
    Ok(position(r, n)
        .and_then(|i| interp.heap.chars(r.series).get(i))
        .map(|&c| Value::Char(c))
        .unwrap_or(Value::None))
}

fn poke_string(interp: &mut Interpreter, container: Value, picker: Value, value: Value) -> Eval<()> {
    let (Some(r), Value::Integer(n), Value::Char(c)) = (container.series_ref(), picker, value) else {
        return Err(interp.error(ErrorId::InvalidArg, &[value]));
    };
    let at = position(r, n).filter(|&i| i < interp.heap.len(r.series));
    match at {
        Some(i) => interp.heap.set(r.series, i, c).map_err(|e| interp.heap_error(e)),
        None => Err(interp.error(ErrorId::OutOfRange, &[picker])),
    }
}

fn pick_binary(interp: &mut Interpreter, container: Value, picker: Value) -> Eval {
    let (Some(r), Value::Integer(n)) = (container.series_ref(), picker) else {
        return Err(interp.error(ErrorId::InvalidPath, &[container, picker]));
    };
    Ok(position(r, n)
        .and_then(|i| interp.heap.bytes(r.series).get(i))
        .map(|&b| Value::Integer(b as i64))
        .unwrap_or(Value::None))
}

fn poke_binary(interp: &mut Interpreter, container: Value, picker: Value, value: Value) -> Eval<()> {
    let byte = match value {
        Value::Integer(n) => u8::try_from(n).ok(),
        _ => None,
    };
    let (Some(r), Value::Integer(n), Some(byte)) = (container.series_ref(), picker, byte) else {
        return Err(interp.error(ErrorId::InvalidArg, &[value]));
    };
    let at = position(r, n).filter(|&i| i < interp.heap.len(r.series));
    match at {
        Some(i) => interp.heap.set(r.series, i, byte).map_err(|e| interp.heap_error(e)),
        None => Err(interp.error(ErrorId::OutOfRange, &[picker])),
    }
}

fn pick_pair(interp: &mut Interpreter, container: Value, picker: Value) -> Eval {
    let Value::Pair(x, y) = container else {
        return Ok(Value::None);
    };
    let axis = match picker {
        Value::Integer(n) => n,
        Value::Word(w) => match interp.symbols.name(interp.symbols.canon(w.sym)) {
            "x" => 1,
            "y" => 2,
            _ => 0,
        },
        _ => 0,
    };
    match axis {
        1 => Ok(Value::Integer(x as i64)),
        2 => Ok(Value::Integer(y as i64)),
        _ => Err(interp.error(ErrorId::InvalidPath, &[container, picker])),
    }
}

fn pick_date(interp: &mut Interpreter, container: Value, picker: Value) -> Eval {
    let Value::Date(d) = container else {
        return Ok(Value::None);
    };
    let field = match picker {
        Value::Integer(n) => n,
        Value::Word(w) => match interp.symbols.name(interp.symbols.canon(w.sym)) {
            "year" => 1,
            "month" => 2,
            "day" => 3,
            _ => 0,
        },
        _ => 0,
    };
    match field {
        1 => Ok(Value::Integer(d.year as i64)),
        2 => Ok(Value::Integer(d.month as i64)),
        3 => Ok(Value::Integer(d.day as i64)),
        _ => Err(interp.error(ErrorId::InvalidPath, &[container, picker])),
    }
}

fn context_slot(interp: &Interpreter, container: &Value, picker: &Value) -> Option<(crate::memory::series::SeriesId, usize)> {
    let id = container.context()?;
    let sym = picker.symbol()?;
    let index = interp.heap.context(id).find(interp.symbols.canon(sym))?;
    Some((id, index))
}

fn pick_context(interp: &mut Interpreter, container: Value, picker: Value) -> Eval {
    match context_slot(interp, &container, &picker) {
        Some((id, index)) => Ok(interp.heap.context(id).vars[index]),
        None => Err(interp.error(ErrorId::InvalidPath, &[container, picker])),
    }
}

fn poke_context(interp: &mut Interpreter, container: Value, picker: Value, value: Value) -> Eval<()> {
    match context_slot(interp, &container, &picker) {
        Some((id, index)) => interp
            .heap
            .context_set(id, index, value)
            .map_err(|e| interp.heap_error(e)),
        None => Err(interp.error(ErrorId::InvalidPath, &[container, picker])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typeset_membership() {
        let set = TypeSet::of(&[Kind::Integer, Kind::Decimal]);
        assert!(set.contains(Kind::Integer));
        assert!(!set.contains(Kind::Text));
        assert!(TypeSet::ALL.contains(Kind::Unset));
        assert!(!TypeSet::ANY_VALUE.contains(Kind::Unset));
        assert_eq!(TypeSet::named("number!"), Some(set));
    }

    #[test]
    fn test_table_names_are_unique() {
        let table = TypeTable::new();
        for kind in Kind::ALL {
            assert_eq!(table.kind_by_name(table.entry(kind).name), Some(kind));
        }
        assert_eq!(table.kind_by_name("text!"), Some(Kind::Text));
    }
}
