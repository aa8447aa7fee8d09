//! Series nodes
//!
//! A series is one slot of the heap arena: a header (flags, owning pool class,
//! granted capacity) and a typed payload. Arrays, strings and binaries keep
//! their elements in a pooled buffer; contexts keep their variables in one.
//! Actions and ports are node-only and carry no pooled storage.

use super::pool::{Element, PoolClass};
use super::value::Value;
use crate::interpreter::context::ContextData;
use crate::interpreter::natives::NativeFn;
use crate::interpreter::symbols::SymId;
use crate::interpreter::type_system::TypeSet;
use crate::memory::value::Kind;
use std::fmt;
use std::rc::Rc;

/// Generation-checked handle to a heap slot
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Debug for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Header flag bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesFlags {
    pub marked: bool,
    pub protected: bool,
    /// Never swept (lib and user contexts, native actions)
    pub fixed: bool,
}

/// How a parameter takes its argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Evaluated expression
    Normal,
    /// Next element taken literally; `soft` evaluates groups and get-words
    Quoted { soft: bool },
    /// `/name` flag; the following normal params are its arguments
    Refinement,
    Local,
    /// Definitional `return` slot
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub sym: SymId,
    pub class: ParamClass,
    pub types: TypeSet,
    /// Index of the refinement this parameter belongs to
    pub refinement: Option<usize>,
}

impl Param {
    pub fn takes_arg(&self) -> bool {
        matches!(self.class, ParamClass::Normal | ParamClass::Quoted { .. })
    }
}

#[derive(Clone, Copy)]
pub enum ActionBody {
    Native { f: NativeFn, kind: Option<Kind> },
    /// Body block, copied and bound on every call
    User { body: SeriesId },
    /// Index into the interpreter's routine table
    Routine(usize),
}

impl fmt::Debug for ActionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionBody::Native { kind, .. } => write!(f, "Native({:?})", kind),
            ActionBody::User { body } => write!(f, "User({:?})", body),
            ActionBody::Routine(i) => write!(f, "Routine({})", i),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionData {
    pub name: Option<SymId>,
    pub params: Rc<[Param]>,
    pub body: ActionBody,
    pub infix: bool,
    /// Spec block the action was made from, kept for rendering
    pub spec: Option<SeriesId>,
}

impl ActionData {
    /// Number of parameters that consume an argument unconditionally
    pub fn arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.takes_arg() && p.refinement.is_none())
            .count()
    }

    /// Varlist slot count: every parameter plus locals and return
    pub fn frame_len(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone)]
pub struct PortData {
    pub scheme: SymId,
    pub target: String,
    pub handle: Option<u32>,
}

#[derive(Debug)]
pub enum SeriesData {
    Array(Vec<Value>),
    Text(Vec<char>),
    Binary(Vec<u8>),
    Context(ContextData),
    Action(ActionData),
    Port(PortData),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Array(v) => v.len(),
            SeriesData::Text(v) => v.len(),
            SeriesData::Binary(v) => v.len(),
            SeriesData::Context(c) => c.len(),
            SeriesData::Action(_) | SeriesData::Port(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SeriesData::Array(_) => "array",
            SeriesData::Text(_) => "text",
            SeriesData::Binary(_) => "binary",
            SeriesData::Context(_) => "context",
            SeriesData::Action(_) => "action",
            SeriesData::Port(_) => "port",
        }
    }
}

#[derive(Debug)]
pub struct Series {
    pub data: SeriesData,
    pub class: PoolClass,
    /// Element capacity granted by the pool
    pub capacity: usize,
    pub flags: SeriesFlags,
}

impl Series {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes of pooled storage held by this series
    pub fn footprint(&self) -> usize {
        let width = match &self.data {
            SeriesData::Array(_) | SeriesData::Context(_) => Value::WIDTH.bytes(),
            SeriesData::Text(_) => char::WIDTH.bytes(),
            SeriesData::Binary(_) => u8::WIDTH.bytes(),
            SeriesData::Action(_) | SeriesData::Port(_) => 0,
        };
        width * self.capacity
    }
}

/// Element types with a series payload of their own
pub trait Stored: Element + Copy {
    fn buffer(data: &SeriesData) -> Option<&Vec<Self>>;
    fn buffer_mut(data: &mut SeriesData) -> Option<&mut Vec<Self>>;
    fn wrap(buf: Vec<Self>) -> SeriesData;
}

impl Stored for Value {
    fn buffer(data: &SeriesData) -> Option<&Vec<Self>> {
        match data {
            SeriesData::Array(v) => Some(v),
            SeriesData::Context(c) => Some(&c.vars),
            _ => None,
        }
    }
    fn buffer_mut(data: &mut SeriesData) -> Option<&mut Vec<Self>> {
        match data {
            SeriesData::Array(v) => Some(v),
            SeriesData::Context(c) => Some(&mut c.vars),
            _ => None,
        }
    }
    fn wrap(buf: Vec<Self>) -> SeriesData {
        SeriesData::Array(buf)
    }
}

impl Stored for char {
    fn buffer(data: &SeriesData) -> Option<&Vec<Self>> {
        match data {
            SeriesData::Text(v) => Some(v),
            _ => None,
        }
    }
    fn buffer_mut(data: &mut SeriesData) -> Option<&mut Vec<Self>> {
        match data {
            SeriesData::Text(v) => Some(v),
            _ => None,
        }
    }
    fn wrap(buf: Vec<Self>) -> SeriesData {
        SeriesData::Text(buf)
    }
}

impl Stored for u8 {
    fn buffer(data: &SeriesData) -> Option<&Vec<Self>> {
        match data {
            SeriesData::Binary(v) => Some(v),
            _ => None,
        }
    }
    fn buffer_mut(data: &mut SeriesData) -> Option<&mut Vec<Self>> {
        match data {
            SeriesData::Binary(v) => Some(v),
            _ => None,
        }
    }
    fn wrap(buf: Vec<Self>) -> SeriesData {
        SeriesData::Binary(buf)
    }
}
