//! Symbol interning
//!
//! Every distinct spelling gets one [`SymId`]. Each id also links to its
//! canonical id, the id of the lower-cased spelling, which is what contexts
//! key on: `Foo`, `FOO` and `foo` are three symbols that share one canon, so
//! they compare equal and bind to the same slot while each keeps its own
//! spelling for rendering.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymId(pub u32);

macro_rules! well_known {
    ($($name:ident = $text:literal),* $(,)?) => {
        /// Symbols interned up front, in this order, by every table
        pub mod sym {
            use super::SymId;
            well_known!(@consts 0u32; $($name),*);
        }
        const WELL_KNOWN: &[&str] = &[$($text),*];
    };
    (@consts $n:expr; $first:ident $(, $rest:ident)*) => {
        pub const $first: SymId = SymId($n);
        well_known!(@consts $n + 1u32; $($rest),*);
    };
    (@consts $n:expr;) => {};
}

well_known! {
    RETURN = "return",
    LOCAL = "local",
    SELF = "self",
    TYPE = "type",
    ID = "id",
    MESSAGE = "message",
    ARG1 = "arg1",
    ARG2 = "arg2",
    ARG3 = "arg3",
    NEAR = "near",
    WHERE = "where",
    HALT = "halt",
    QUIT = "quit",
    NAME = "name",
    ONLY = "only",
    PART = "part",
    MEMORY = "memory",
    EXTERN = "extern",
}

/// The interning table of one interpreter
#[derive(Debug, Clone)]
pub struct Symbols {
    names: Vec<Box<str>>,
    canon: Vec<SymId>,
    lookup: FxHashMap<Box<str>, SymId>,
}

impl Symbols {
    pub fn new() -> Self {
        let mut symbols = Symbols {
            names: Vec::new(),
            canon: Vec::new(),
            lookup: FxHashMap::default(),
        };
        for text in WELL_KNOWN {
            symbols.intern(text);
        }
        symbols
    }

    /// Id of `text`, interning it (and its canonical form) if new
    pub fn intern(&mut self, text: &str) -> SymId {
        if let Some(&id) = self.lookup.get(text) {
            return id;
        }
        let lower = text.to_lowercase();
        let canon = if lower == text {
            None
        } else {
            Some(self.intern(&lower))
        };
        let id = SymId(self.names.len() as u32);
        self.names.push(text.into());
        self.canon.push(canon.unwrap_or(id));
        self.lookup.insert(text.into(), id);
        id
    }

    pub fn get(&self, text: &str) -> Option<SymId> {
        self.lookup.get(text).copied()
    }

    pub fn name(&self, id: SymId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn canon(&self, id: SymId) -> SymId {
        self.canon[id.0 as usize]
    }

    /// Case-insensitive comparison
    pub fn same(&self, a: SymId, b: SymId) -> bool {
        self.canon(a) == self.canon(b)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let mut symbols = Symbols::new();
        let a = symbols.intern("append");
        let b = symbols.intern("append");
        assert_eq!(a, b);
        assert_eq!(symbols.name(a), "append");
    }

    #[test]
    fn test_case_variants_share_canon() {
        let mut symbols = Symbols::new();
        let upper = symbols.intern("Foo");
        let lower = symbols.intern("foo");
        assert_ne!(upper, lower);
        assert_eq!(symbols.canon(upper), lower);
        assert_eq!(symbols.canon(lower), lower);
        assert!(symbols.same(upper, lower));
        assert_eq!(symbols.name(upper), "Foo");
    }

    #[test]
    fn test_well_known_order() {
        let symbols = Symbols::new();
        assert_eq!(symbols.name(sym::RETURN), "return");
        assert_eq!(symbols.name(sym::HALT), "halt");
        assert_eq!(symbols.name(sym::EXTERN), "extern");
        for (i, text) in WELL_KNOWN.iter().enumerate() {
            assert_eq!(symbols.get(text), Some(SymId(i as u32)));
        }
    }
}
