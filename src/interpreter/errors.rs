//! Script errors
//!
//! This module defines the error catalog ([`ErrorId`]), the categories errors
//! fall into ([`Category`]), and the two Rust-side views of a failed
//! evaluation: [`ErrorReport`] (an `error!` value rendered to text) and
//! [`Failure`] (what [`Interpreter::eval_str`] returns when a signal reaches
//! the top level).
//!
//! Script errors are ordinary values: an `error!` is a context with the keys
//! `type id message arg1 arg2 arg3 near where`. Raising one is returning
//! `Err(Unwind::Error(context))`.

use super::constants::NEAR_MOLD_LIMIT;
use super::context::{ContextData, ContextKind};
use super::engine::Interpreter;
use super::symbols::{sym, SymId};
use super::unwind::Unwind;
use crate::memory::heap::HeapError;
use crate::memory::series::SeriesId;
use crate::memory::value::{SeriesRef, Value, WordCell};
use std::fmt;
use thiserror::Error;

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Malformed source at scan time
    Syntax,
    Script,
    Math,
    /// Depth limit exceeded; only the top level sees it
    Stack,
    /// Raised by `fail` or `make error!`
    User,
    Internal,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Script => "script",
            Category::Math => "math",
            Category::Stack => "stack",
            Category::User => "user",
            Category::Internal => "internal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Category::Syntax,
            Category::Script,
            Category::Math,
            Category::Stack,
            Category::User,
            Category::Internal,
        ]
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Whether `trap` and `attempt` may intercept errors of this category
    pub fn interceptable(self) -> bool {
        matches!(
            self,
            Category::Syntax | Category::Script | Category::Math | Category::User
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str())?;
        }
        Ok(())
    }
}

/// Catalog of errors the interpreter raises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorId {
    // syntax
    Invalid,
    Missing,
    // script
    NotBound,
    NoValue,
    NeedValue,
    NoArg,
    ExpectArg,
    BadRefine,
    InvalidPath,
    OutOfRange,
    Protected,
    NoLoop,
    NoFunction,
    NoCatch,
    BadMake,
    CannotUse,
    InvalidArg,
    BadFuncDef,
    BadMarshal,
    NoCodec,
    CodecFailure,
    NoScheme,
    DeviceFailure,
    NotOpen,
    // math
    ZeroDivide,
    Overflow,
    // stack
    StackOverflow,
    // user
    Message,
}

impl ErrorId {
    pub fn category(self) -> Category {
        use ErrorId::*;
        match self {
            Invalid | Missing => Category::Syntax,
            ZeroDivide | Overflow => Category::Math,
            StackOverflow => Category::Stack,
            Message => Category::User,
            _ => Category::Script,
        }
    }

    pub fn name(self) -> &'static str {
        use ErrorId::*;
        match self {
            Invalid => "invalid",
            Missing => "missing",
            NotBound => "not-bound",
            NoValue => "no-value",
            NeedValue => "need-value",
            NoArg => "no-arg",
            ExpectArg => "expect-arg",
            BadRefine => "bad-refine",
            InvalidPath => "invalid-path",
            OutOfRange => "out-of-range",
            Protected => "protected",
            NoLoop => "no-loop",
            NoFunction => "no-function",
            NoCatch => "no-catch",
            BadMake => "bad-make-arg",
            CannotUse => "cannot-use",
            InvalidArg => "invalid-arg",
            BadFuncDef => "bad-func-def",
            BadMarshal => "bad-marshal",
            NoCodec => "no-codec",
            CodecFailure => "codec-failure",
            NoScheme => "no-scheme",
            DeviceFailure => "device-failure",
            NotOpen => "not-open",
            ZeroDivide => "zero-divide",
            Overflow => "overflow",
            StackOverflow => "stack-overflow",
            Message => "message",
        }
    }

    /// Message template; `:arg1`..`:arg3` are replaced by molded arguments
    pub fn template(self) -> &'static str {
        use ErrorId::*;
        match self {
            Invalid => "invalid :arg1 -- :arg2",
            Missing => "missing :arg1 at :arg2",
            NotBound => ":arg1 word is not bound to a context",
            NoValue => ":arg1 has no value",
            NeedValue => ":arg1 needs a value",
            NoArg => ":arg1 is missing its :arg2 argument",
            ExpectArg => ":arg1 does not allow :arg2 for its :arg3 argument",
            BadRefine => "incompatible or invalid refinement: :arg1",
            InvalidPath => "cannot access :arg2 in path :arg1",
            OutOfRange => "value out of range: :arg1",
            Protected => "protected value or series - cannot modify",
            NoLoop => "no loop to break or continue",
            NoFunction => "return used outside of a function",
            NoCatch => "no catch for throw: :arg1",
            BadMake => "cannot MAKE :arg1 from: :arg2",
            CannotUse => "cannot use :arg1 on :arg2 value",
            InvalidArg => "invalid argument: :arg1",
            BadFuncDef => "invalid function definition: :arg1",
            BadMarshal => "cannot marshal :arg1 as :arg2",
            NoCodec => "no codec registered for :arg1",
            CodecFailure => ":arg1 codec failed: :arg2",
            NoScheme => "no device registered for scheme :arg1",
            DeviceFailure => "port :arg1 failed: :arg2",
            NotOpen => "port :arg1 is not open",
            ZeroDivide => "attempt to divide by zero",
            Overflow => "math or number overflow",
            StackOverflow => "stack overflow",
            Message => ":arg1",
        }
    }

    pub fn all() -> &'static [ErrorId] {
        use ErrorId::*;
        &[
            Invalid, Missing, NotBound, NoValue, NeedValue, NoArg, ExpectArg, BadRefine,
            InvalidPath, OutOfRange, Protected, NoLoop, NoFunction, NoCatch, BadMake, CannotUse,
            InvalidArg, BadFuncDef, BadMarshal, NoCodec, CodecFailure, NoScheme, DeviceFailure,
            NotOpen, ZeroDivide, Overflow, StackOverflow, Message,
        ]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.name() == name)
    }
}

/// An `error!` value rendered for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub category: Category,
    pub id: String,
    pub message: String,
    pub near: Option<String>,
    pub location: Option<String>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "** {} error: {}", self.category, self.message)?;
        if let Some(location) = &self.location {
            write!(f, "\n** Where: {}", location)?;
        }
        if let Some(near) = &self.near {
            write!(f, "\n** Near: {}", near)?;
        }
        Ok(())
    }
}

/// A signal that reached the top level
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("{0}")]
    Error(ErrorReport),
    #[error("** halted")]
    Halted,
    #[error("** quit with status {0}")]
    Quit(i32),
}

impl Failure {
    pub fn report(&self) -> Option<&ErrorReport> {
        match self {
            Failure::Error(report) => Some(report),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<Category> {
        self.report().map(|r| r.category)
    }

    /// Catalog name of the error, e.g. `not-bound`
    pub fn id(&self) -> Option<&str> {
        self.report().map(|r| r.id.as_str())
    }
}

const ERROR_KEYS: [SymId; 8] = [
    sym::TYPE,
    sym::ID,
    sym::MESSAGE,
    sym::ARG1,
    sym::ARG2,
    sym::ARG3,
    sym::NEAR,
    sym::WHERE,
];

const MESSAGE_SLOT: usize = 2;
const ARG_SLOT: usize = 3;
const NEAR_SLOT: usize = 6;
const WHERE_SLOT: usize = 7;

impl Interpreter {
    /// Raise a catalog error
    pub fn error(&mut self, id: ErrorId, args: &[Value]) -> Unwind {
        Unwind::Error(self.error_value(id, args))
    }

    /// Build a catalog error without raising it
    pub fn error_value(&mut self, id: ErrorId, args: &[Value]) -> SeriesId {
        let type_sym = self.symbols.intern(id.category().name());
        let id_sym = self.symbols.intern(id.name());
        let message = self.heap.alloc_text(id.template());
        self.make_error_context(type_sym, id_sym, Value::Text(SeriesRef::head(message)), args)
    }

    /// Raise an error whose arguments are plain strings
    pub fn error_text(&mut self, id: ErrorId, args: &[&str]) -> Unwind {
        let values: Vec<Value> = args
            .iter()
            .map(|a| Value::Text(SeriesRef::head(self.heap.alloc_text(a))))
            .collect();
        self.error(id, &values)
    }

    /// User error carrying `message` verbatim
    pub fn user_error(&mut self, message: Value) -> SeriesId {
        let type_sym = self.symbols.intern(Category::User.name());
        let id_sym = self.symbols.intern(ErrorId::Message.name());
        self.make_error_context(type_sym, id_sym, message, &[])
    }

    pub fn heap_error(&mut self, err: HeapError) -> Unwind {
        match err {
            HeapError::Protected => self.error(ErrorId::Protected, &[]),
            HeapError::OutOfRange { index, .. } => {
                self.error(ErrorId::OutOfRange, &[Value::Integer(index as i64 + 1)])
            }
            HeapError::WrongKind { .. } => self.error_text(ErrorId::InvalidArg, &[&err.to_string()]),
            HeapError::TooLarge { requested } => {
                self.error(ErrorId::OutOfRange, &[Value::Integer(requested as i64)])
            }
        }
    }

    pub(crate) fn make_error_context(
        &mut self,
        type_sym: SymId,
        id_sym: SymId,
        message: Value,
        args: &[Value],
    ) -> SeriesId {
        let pairs: Vec<(SymId, SymId)> = ERROR_KEYS.iter().map(|&k| (k, k)).collect();
        let mut context = ContextData::with_keys(ContextKind::Error, &pairs);
        context.vars[0] = Value::Word(WordCell::unbound(type_sym));
        context.vars[1] = Value::Word(WordCell::unbound(id_sym));
        context.vars[MESSAGE_SLOT] = message;
        for (slot, arg) in context.vars[ARG_SLOT..ARG_SLOT + 3].iter_mut().zip(args) {
            *slot = *arg;
        }
        context.vars[NEAR_SLOT] = self.near_text();
        context.vars[WHERE_SLOT] = self.where_word();
        self.heap.alloc_context(context)
    }

    /// Molded fragment of the innermost feed around the failing position
    fn near_text(&mut self) -> Value {
        let feed = self.stack.frames().iter().rev().find_map(|f| f.feed);
        let Some(feed) = feed else {
            return Value::None;
        };
        let values = self.heap.array(feed.array);
        let start = feed.index.saturating_sub(1).min(values.len());
        let end = (start + 3).min(values.len());
        let fragment: Vec<Value> = values[start..end].to_vec();
        let mut text = fragment
            .iter()
            .map(|v| self.mold(v))
            .collect::<Vec<_>>()
            .join(" ");
        if text.chars().count() > NEAR_MOLD_LIMIT {
            text = text.chars().take(NEAR_MOLD_LIMIT).collect::<String>() + "...";
        }
        Value::Text(SeriesRef::head(self.heap.alloc_text(&text)))
    }

    fn where_word(&self) -> Value {
        self.stack
            .frames()
            .iter()
            .rev()
            .find_map(|f| f.label)
            .map(|label| Value::Word(WordCell::unbound(label)))
            .unwrap_or(Value::None)
    }

    /// Category recorded in an error context
    pub fn error_category(&self, error: SeriesId) -> Category {
        let type_word = self.heap.context(error).vars[0];
        type_word
            .symbol()
            .and_then(|s| Category::from_name(self.symbols.name(s)))
            .unwrap_or(Category::User)
    }

    pub fn error_id_name(&self, error: SeriesId) -> String {
        match self.heap.context(error).vars[1].symbol() {
            Some(s) => self.symbols.name(s).to_string(),
            None => ErrorId::Message.name().to_string(),
        }
    }

    /// Message with its `:argN` placeholders filled in
    pub fn error_message(&self, error: SeriesId) -> String {
        let vars = &self.heap.context(error).vars;
        let mut message = self.form(&vars[MESSAGE_SLOT]);
        for (n, arg) in vars[ARG_SLOT..ARG_SLOT + 3].iter().enumerate() {
            let placeholder = format!(":arg{}", n + 1);
            if message.contains(&placeholder) {
                message = message.replace(&placeholder, &self.mold(arg));
            }
        }
        message
    }

    pub fn report(&self, error: SeriesId) -> ErrorReport {
        let vars = &self.heap.context(error).vars;
        let near = match vars[NEAR_SLOT] {
            Value::None => None,
            other => Some(self.form(&other)),
        };
        let location = match vars[WHERE_SLOT] {
            Value::None => None,
            other => Some(self.form(&other)),
        };
        ErrorReport {
            category: self.error_category(error),
            id: self.error_id_name(error),
            message: self.error_message(error),
            near,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_round_trip() {
        for &id in ErrorId::all() {
            assert_eq!(ErrorId::from_name(id.name()), Some(id));
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorId::ZeroDivide.category(), Category::Math);
        assert_eq!(ErrorId::NotBound.category(), Category::Script);
        assert_eq!(ErrorId::StackOverflow.category(), Category::Stack);
        assert!(!Category::Stack.interceptable());
        assert!(Category::User.interceptable());
        assert_eq!(Category::from_name("Math"), Some(Category::Math));
    }

    #[test]
    fn test_report_display() {
        let report = ErrorReport {
            category: Category::Script,
            id: "no-value".into(),
            message: "x has no value".into(),
            near: Some("x + 1".into()),
            location: None,
        };
        assert_eq!(
            report.to_string(),
            "** Script error: x has no value\n** Near: x + 1"
        );
    }
}
