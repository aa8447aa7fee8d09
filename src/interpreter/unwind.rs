//! Non-local control signals
//!
//! Every evaluation step returns [`Eval`]. The `Err` side is an [`Unwind`]
//! travelling outward one Rust frame (and one evaluator frame) at a time until
//! something pattern-matches it: a function call for its own `Return`, a loop
//! native for `Break`/`Continue`, `catch` for `Throw`, `trap`/`attempt` for
//! `Error`, the top level for everything else.

use crate::memory::series::SeriesId;
use crate::memory::value::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unwind {
    /// Definitional return to the call owning `target` varlist
    Return { target: SeriesId, value: Value },
    Break { value: Value },
    Continue,
    /// `name` is `None` for an unnamed throw
    Throw { name: Option<Value>, value: Value },
    /// An `error!` context
    Error(SeriesId),
    Quit { status: i32 },
}

pub type Eval<T = Value> = Result<T, Unwind>;

impl Unwind {
    pub fn is_error(&self) -> bool {
        matches!(self, Unwind::Error(_))
    }

    /// Values carried by the signal, for guarding while it travels
    pub fn payload(&self) -> Option<Value> {
        match self {
            Unwind::Return { value, .. } | Unwind::Break { value } => Some(*value),
            Unwind::Throw { value, .. } => Some(*value),
            Unwind::Error(id) => Some(Value::Error(*id)),
            Unwind::Continue | Unwind::Quit { .. } => None,
        }
    }
}
