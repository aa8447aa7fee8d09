//! Contexts
//!
//! A context pairs a keylist of symbols with a varlist of cells, same length
//! and same order, plus a canon-keyed lookup table. Contexts back the lib and
//! user globals, objects, errors and function-call frames.

use super::engine::Interpreter;
use super::errors::ErrorId;
use super::symbols::SymId;
use super::unwind::Eval;
use crate::memory::series::SeriesId;
use crate::memory::value::{Binding, Value, WordCell};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// lib or user globals
    Module,
    Object,
    Error,
    /// Varlist of one action call
    Frame,
}

#[derive(Debug, Clone)]
pub struct ContextData {
    pub kind: ContextKind,
    pub keys: Vec<SymId>,
    pub vars: Vec<Value>,
    lookup: FxHashMap<SymId, u32>,
}

impl ContextData {
    pub fn new(kind: ContextKind) -> Self {
        ContextData {
            kind,
            keys: Vec::new(),
            vars: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }

    /// Build from `(spelling, canon)` keys, all variables unset
    pub fn with_keys(kind: ContextKind, keys: &[(SymId, SymId)]) -> Self {
        let mut context = ContextData::new(kind);
        for &(sym, canon) in keys {
            context.push(sym, canon, Value::Unset);
        }
        context
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Slot index of a canonical symbol
    pub fn find(&self, canon: SymId) -> Option<usize> {
        self.lookup.get(&canon).map(|&i| i as usize)
    }

    /// Add a key unless its canon is already present; returns the slot
    pub fn push(&mut self, sym: SymId, canon: SymId, value: Value) -> usize {
        if let Some(index) = self.find(canon) {
            return index;
        }
        let index = self.keys.len();
        self.keys.push(sym);
        self.vars.push(value);
        self.lookup.insert(canon, index as u32);
        index
    }
}

impl Interpreter {
    /// Allocate a context from spelled keys
    pub fn make_context(&mut self, kind: ContextKind, keys: &[SymId]) -> SeriesId {
        let pairs: Vec<(SymId, SymId)> = keys.iter().map(|&s| (s, self.symbols.canon(s))).collect();
        self.heap.alloc_context(ContextData::with_keys(kind, &pairs))
    }

    /// Word bound to `sym` in `context`, adding the key when missing
    pub fn context_word(&mut self, context: SeriesId, sym: SymId) -> Eval<WordCell> {
        let canon = self.symbols.canon(sym);
        let index = self
            .heap
            .context_append(context, sym, canon, Value::Unset)
            .map_err(|e| self.heap_error(e))?;
        Ok(WordCell {
            sym,
            binding: Binding::Bound {
                context,
                index: index as u32,
            },
        })
    }

    /// Value of `sym` in `context`, if it is a key
    pub fn context_get(&self, context: SeriesId, sym: SymId) -> Option<Value> {
        let data = self.heap.context(context);
        data.find(self.symbols.canon(sym)).map(|i| data.vars[i])
    }

    /// Set `sym` in `context`, adding the key when missing
    pub fn context_put(&mut self, context: SeriesId, sym: SymId, value: Value) -> Eval<()> {
        let canon = self.symbols.canon(sym);
        let index = match self.heap.context(context).find(canon) {
            Some(index) => index,
            None => self
                .heap
                .context_append(context, sym, canon, Value::Unset)
                .map_err(|e| self.heap_error(e))?,
        };
        self.heap
            .context_set(context, index, value)
            .map_err(|e| self.heap_error(e))
    }

    /// Value a word refers to, or `not-bound`
    pub fn get_var(&mut self, word: WordCell) -> Eval {
        match word.binding {
            Binding::Bound { context, index } => {
                Ok(self.heap.context(context).vars[index as usize])
            }
            Binding::Unbound => Err(self.error(ErrorId::NotBound, &[Value::Word(word)])),
        }
    }

    pub fn set_var(&mut self, word: WordCell, value: Value) -> Eval<()> {
        match word.binding {
            Binding::Bound { context, index } => self
                .heap
                .context_set(context, index as usize, value)
                .map_err(|e| self.heap_error(e)),
            Binding::Unbound => Err(self.error(ErrorId::NotBound, &[Value::Word(word)])),
        }
    }

    /// Words of a context as plain unbound words
    pub fn context_words(&self, context: SeriesId) -> Vec<Value> {
        self.heap
            .context(context)
            .keys
            .iter()
            .map(|&sym| Value::Word(WordCell::unbound(sym)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_and_vars_stay_paired() {
        let mut context = ContextData::new(ContextKind::Object);
        let a = context.push(SymId(100), SymId(100), Value::Integer(1));
        let b = context.push(SymId(101), SymId(101), Value::Integer(2));
        let again = context.push(SymId(102), SymId(100), Value::Integer(3));
        assert_eq!((a, b, again), (0, 1, 0));
        assert_eq!(context.keys.len(), context.vars.len());
        assert_eq!(context.vars[0], Value::Integer(1));
        assert_eq!(context.find(SymId(101)), Some(1));
    }
}
