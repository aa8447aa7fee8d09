//! Binding
//!
//! Binding rewrites only the [`Binding`] of word cells, never their symbol.
//! Three situations bind code:
//! - loading: set-words found anywhere in the loaded block become keys of the
//!   user context, then every word is bound to user if it names a key there,
//!   else to lib if it names a key there, else left unbound
//! - a user action call: the body is deep-copied and the copy bound to the
//!   fresh call varlist
//! - `make object!` / `context`: the spec is copied and bound to the new object
//!
//! All traversals are iterative and remember the arrays they have seen, so
//! cyclic blocks are fine.

use super::engine::Interpreter;
use super::symbols::SymId;
use crate::memory::series::SeriesId;
use crate::memory::value::{Binding, SeriesRef, Value, WordCell};
use rustc_hash::{FxHashMap, FxHashSet};

impl Interpreter {
    /// Every set-word in `array`, deep, one per canon, in order of appearance
    pub fn collect_set_words(&self, array: SeriesId) -> Vec<SymId> {
        let mut seen = FxHashSet::default();
        let mut visited = FxHashSet::default();
        let mut pending = vec![array];
        let mut words = Vec::new();
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            for value in self.heap.array(id) {
                match value {
                    Value::SetWord(w) => {
                        if seen.insert(self.symbols.canon(w.sym)) {
                            words.push(w.sym);
                        }
                    }
                    Value::Block(r) | Value::Group(r) => pending.push(r.series),
                    _ => {}
                }
            }
        }
        words
    }

    /// Top-level set-words only
    pub fn collect_set_words_shallow(&self, array: SeriesRef) -> Vec<SymId> {
        let mut seen = FxHashSet::default();
        self.heap.array(array.series)[array.index()..]
            .iter()
            .filter_map(|v| match v {
                Value::SetWord(w) if seen.insert(self.symbols.canon(w.sym)) => Some(w.sym),
                _ => None,
            })
            .collect()
    }

    /// Bind every word in `array` (deep) that names a key of one of
    /// `contexts`; the first context holding the key wins
    pub fn bind_deep(&mut self, array: SeriesId, contexts: &[SeriesId]) {
        let mut visited = FxHashSet::default();
        let mut pending = vec![array];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            for i in 0..self.heap.len(id) {
                let value = self.heap.array(id)[i];
                if let Some(word) = value.as_word() {
                    if let Some(binding) = self.resolve(word.sym, contexts) {
                        let bound = value.with_word(WordCell {
                            sym: word.sym,
                            binding,
                        });
                        self.heap.array_cells_mut(id)[i] = bound;
                    }
                } else if let Some(r) = value.array_ref() {
                    pending.push(r.series);
                }
            }
        }
    }

    fn resolve(&self, sym: SymId, contexts: &[SeriesId]) -> Option<Binding> {
        let canon = self.symbols.canon(sym);
        contexts.iter().find_map(|&context| {
            self.heap
                .context(context)
                .find(canon)
                .map(|index| Binding::Bound {
                    context,
                    index: index as u32,
                })
        })
    }

    /// Bind freshly loaded code into the user context, falling back to lib
    pub fn bind_loaded(&mut self, array: SeriesId) {
        let user = self.user;
        for sym in self.collect_set_words(array) {
            let canon = self.symbols.canon(sym);
            if self.heap.context(user).find(canon).is_none() {
                // user is never protected
                let _ = self.heap.context_append(user, sym, canon, Value::Unset);
            }
        }
        let contexts = [self.user, self.lib];
        self.bind_deep(array, &contexts);
    }

    /// Copy an array from `from`, deep-copying nested blocks, groups and
    /// paths. Strings and binaries stay shared. Each nested array is copied
    /// once, so shared and cyclic structure is reproduced in the copy.
    pub fn copy_array_deep(&mut self, array: SeriesId, from: usize) -> SeriesId {
        let top = self.copy_array_shallow(array, from);
        let mut copies: FxHashMap<SeriesId, SeriesId> = FxHashMap::default();
        if from == 0 {
            copies.insert(array, top);
        }
        let mut pending = vec![top];
        while let Some(copy) = pending.pop() {
            for i in 0..self.heap.len(copy) {
                let value = self.heap.array(copy)[i];
                let Some(r) = value.array_ref() else {
                    continue;
                };
                let nested = match copies.get(&r.series) {
                    Some(&nested) => nested,
                    None => {
                        let nested = self.copy_array_shallow(r.series, 0);
                        copies.insert(r.series, nested);
                        pending.push(nested);
                        nested
                    }
                };
                self.heap.array_cells_mut(copy)[i] = value.with_series_ref(SeriesRef::at(nested, r.index()));
            }
        }
        top
    }

    /// Copy without descending into nested arrays
    pub fn copy_array_shallow(&mut self, array: SeriesId, from: usize) -> SeriesId {
        let source = self.heap.array(array).get(from..).unwrap_or_default().to_vec();
        self.heap.alloc_array(&source)
    }
}
