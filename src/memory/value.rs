//! Runtime value representation
//!
//! This module defines [`Value`], the fixed-width tagged cell every part of the
//! interpreter passes around. The enum discriminant is the type tag and the
//! variant payload is the only interpretation of the bits, so the tag can never
//! disagree with the payload.
//!
//! # Value Categories
//!
//! - Immediates: [`Value::None`], [`Value::Unset`], [`Value::Logic`],
//!   [`Value::Integer`], [`Value::Decimal`], [`Value::Char`], [`Value::Pair`],
//!   [`Value::Date`], [`Value::Datatype`]
//! - Words: symbol plus [`Binding`] ([`Value::Word`], [`Value::SetWord`], ...)
//! - Series references: a [`SeriesId`] plus an index into that series
//!   ([`Value::Block`], [`Value::Text`], [`Value::Binary`], ...)
//! - Node references: contexts, actions and ports ([`Value::Object`],
//!   [`Value::Error`], [`Value::Action`], [`Value::Port`])
//!
//! # Copy Semantics
//!
//! Cells are `Copy`. Copying a block value copies the reference, not the block;
//! the series stays shared until someone explicitly copies it.

use crate::interpreter::symbols::SymId;
use crate::memory::series::SeriesId;

/// Type tag of a [`Value`]. Indexes the per-type dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Kind {
    None,
    Unset,
    Logic,
    Integer,
    Decimal,
    Char,
    Pair,
    Date,
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
    Issue,
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    Text,
    File,
    Binary,
    Object,
    Error,
    Action,
    Datatype,
    Port,
}

impl Kind {
    pub const COUNT: usize = 27;

    pub const ALL: [Kind; Kind::COUNT] = [
        Kind::None,
        Kind::Unset,
        Kind::Logic,
        Kind::Integer,
        Kind::Decimal,
        Kind::Char,
        Kind::Pair,
        Kind::Date,
        Kind::Word,
        Kind::SetWord,
        Kind::GetWord,
        Kind::LitWord,
        Kind::Refinement,
        Kind::Issue,
        Kind::Block,
        Kind::Group,
        Kind::Path,
        Kind::SetPath,
        Kind::GetPath,
        Kind::Text,
        Kind::File,
        Kind::Binary,
        Kind::Object,
        Kind::Error,
        Kind::Action,
        Kind::Datatype,
        Kind::Port,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_word(self) -> bool {
        matches!(
            self,
            Kind::Word | Kind::SetWord | Kind::GetWord | Kind::LitWord | Kind::Refinement
        )
    }

    /// Series of cells
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Kind::Block | Kind::Group | Kind::Path | Kind::SetPath | Kind::GetPath
        )
    }

    /// Series of code points
    pub fn is_string(self) -> bool {
        matches!(self, Kind::Text | Kind::File)
    }

    pub fn is_series(self) -> bool {
        self.is_array() || self.is_string() || self == Kind::Binary
    }

    pub fn is_number(self) -> bool {
        matches!(self, Kind::Integer | Kind::Decimal)
    }

    pub fn is_context(self) -> bool {
        matches!(self, Kind::Object | Kind::Error)
    }
}

/// Where a word's storage slot lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound { context: SeriesId, index: u32 },
}

/// Payload of every word-class value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordCell {
    pub sym: SymId,
    pub binding: Binding,
}

impl WordCell {
    pub fn unbound(sym: SymId) -> Self {
        WordCell {
            sym,
            binding: Binding::Unbound,
        }
    }
}

/// A position inside a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesRef {
    pub series: SeriesId,
    pub index: u32,
}

impl SeriesRef {
    pub fn head(series: SeriesId) -> Self {
        SeriesRef { series, index: 0 }
    }

    pub fn at(series: SeriesId, index: usize) -> Self {
        SeriesRef {
            series,
            index: index as u32,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// An action reference. `binding` ties definitional natives such as `return`
/// to the call frame they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionCell {
    pub action: SeriesId,
    pub binding: Option<SeriesId>,
}

/// Calendar date (no time zone, no time of day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: i16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub fn new(year: i16, month: u8, day: u8) -> Option<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return None;
        }
        Some(Date { year, month, day })
    }
}

fn days_in_month(year: i16, month: u8) -> u8 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 => {
            let y = year as i32;
            if (y % 4 == 0 && y % 100 != 0) || y % 400 == 0 {
                29
            } else {
                28
            }
        }
        _ => 31,
    }
}

/// Runtime values in the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    None,
    #[default]
    Unset,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Char(char),
    Pair(i32, i32),
    Date(Date),
    Word(WordCell),
    SetWord(WordCell),
    GetWord(WordCell),
    LitWord(WordCell),
    Refinement(SymId),
    Issue(SymId),
    Block(SeriesRef),
    Group(SeriesRef),
    Path(SeriesRef),
    SetPath(SeriesRef),
    GetPath(SeriesRef),
    Text(SeriesRef),
    File(SeriesRef),
    Binary(SeriesRef),
    Object(SeriesId),
    Error(SeriesId),
    Action(ActionCell),
    Datatype(Kind),
    Port(SeriesId),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::None => Kind::None,
            Value::Unset => Kind::Unset,
            Value::Logic(_) => Kind::Logic,
            Value::Integer(_) => Kind::Integer,
            Value::Decimal(_) => Kind::Decimal,
            Value::Char(_) => Kind::Char,
            Value::Pair(..) => Kind::Pair,
            Value::Date(_) => Kind::Date,
            Value::Word(_) => Kind::Word,
            Value::SetWord(_) => Kind::SetWord,
            Value::GetWord(_) => Kind::GetWord,
            Value::LitWord(_) => Kind::LitWord,
            Value::Refinement(_) => Kind::Refinement,
            Value::Issue(_) => Kind::Issue,
            Value::Block(_) => Kind::Block,
            Value::Group(_) => Kind::Group,
            Value::Path(_) => Kind::Path,
            Value::SetPath(_) => Kind::SetPath,
            Value::GetPath(_) => Kind::GetPath,
            Value::Text(_) => Kind::Text,
            Value::File(_) => Kind::File,
            Value::Binary(_) => Kind::Binary,
            Value::Object(_) => Kind::Object,
            Value::Error(_) => Kind::Error,
            Value::Action(_) => Kind::Action,
            Value::Datatype(_) => Kind::Datatype,
            Value::Port(_) => Kind::Port,
        }
    }

    /// Only `none` and `false` are falsey
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::None | Value::Logic(false))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Word payload of any word-class value except refinements
    pub fn as_word(&self) -> Option<WordCell> {
        match self {
            Value::Word(w) | Value::SetWord(w) | Value::GetWord(w) | Value::LitWord(w) => Some(*w),
            _ => None,
        }
    }

    /// Symbol of any word-class value, refinements and issues included
    pub fn symbol(&self) -> Option<SymId> {
        match self {
            Value::Refinement(sym) | Value::Issue(sym) => Some(*sym),
            _ => self.as_word().map(|w| w.sym),
        }
    }

    /// Series position of any series value
    pub fn series_ref(&self) -> Option<SeriesRef> {
        match self {
            Value::Block(r)
            | Value::Group(r)
            | Value::Path(r)
            | Value::SetPath(r)
            | Value::GetPath(r)
            | Value::Text(r)
            | Value::File(r)
            | Value::Binary(r) => Some(*r),
            _ => None,
        }
    }

    /// Array position of blocks, groups and paths
    pub fn array_ref(&self) -> Option<SeriesRef> {
        if self.kind().is_array() {
            self.series_ref()
        } else {
            None
        }
    }

    /// Context node of objects and errors
    pub fn context(&self) -> Option<SeriesId> {
        match self {
            Value::Object(id) | Value::Error(id) => Some(*id),
            _ => None,
        }
    }

    /// Rebuild a series value of the same kind at another position
    pub fn with_series_ref(&self, r: SeriesRef) -> Value {
        match self {
            Value::Block(_) => Value::Block(r),
            Value::Group(_) => Value::Group(r),
            Value::Path(_) => Value::Path(r),
            Value::SetPath(_) => Value::SetPath(r),
            Value::GetPath(_) => Value::GetPath(r),
            Value::Text(_) => Value::Text(r),
            Value::File(_) => Value::File(r),
            Value::Binary(_) => Value::Binary(r),
            other => *other,
        }
    }

    /// Rebuild a word-class value of the same kind with another payload
    pub fn with_word(&self, w: WordCell) -> Value {
        match self {
            Value::Word(_) => Value::Word(w),
            Value::SetWord(_) => Value::SetWord(w),
            Value::GetWord(_) => Value::GetWord(w),
            Value::LitWord(_) => Value::LitWord(w),
            other => *other,
        }
    }

    /// Every series node this cell keeps alive
    pub fn for_each_reference(&self, mut visit: impl FnMut(SeriesId)) {
        match self {
            Value::Word(w) | Value::SetWord(w) | Value::GetWord(w) | Value::LitWord(w) => {
                if let Binding::Bound { context, .. } = w.binding {
                    visit(context);
                }
            }
            Value::Object(id) | Value::Error(id) | Value::Port(id) => visit(*id),
            Value::Action(cell) => {
                visit(cell.action);
                if let Some(binding) = cell.binding {
                    visit(binding);
                }
            }
            _ => {
                if let Some(r) = self.series_ref() {
                    visit(r.series);
                }
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logic(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_stays_compact() {
        assert!(std::mem::size_of::<Value>() <= 32);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Logic(false).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::Unset.is_truthy());
    }

    #[test]
    fn test_kind_table_order() {
        for (i, kind) in Kind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_date_validation() {
        assert!(Date::new(2024, 2, 29).is_some());
        assert!(Date::new(2023, 2, 29).is_none());
        assert!(Date::new(2023, 13, 1).is_none());
    }
}
