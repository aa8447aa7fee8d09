//! Scanner: tokens to heap arrays
//!
//! Folds the lexer's flat token stream into nested blocks, groups and paths
//! allocated in the heap. Every word comes out unbound; binding is a separate
//! pass. Inner arrays are allocated before the array that holds them, which
//! is safe because allocation never triggers a collection.

use super::lexer::{Lexer, ScanError, Token, TokenKind};
use super::SourceLocation;
use crate::interpreter::constants::{MAX_NESTING, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::interpreter::symbols::Symbols;
use crate::memory::heap::Heap;
use crate::memory::series::SeriesId;
use crate::memory::value::{SeriesRef, Value, WordCell};

/// A scanned source text
#[derive(Debug, Clone)]
pub struct Loaded {
    pub block: SeriesId,
    /// Source line of each top-level element
    pub lines: Vec<usize>,
}

/// Scan `source` into a new block
pub fn scan(heap: &mut Heap, symbols: &mut Symbols, source: &str) -> Result<Loaded, ScanError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut scanner = Scanner {
        tokens,
        pos: 0,
        depth: 0,
        heap,
        symbols,
    };
    scanner.top_level()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathKind {
    Plain,
    Get,
    Set,
}

struct Scanner<'a> {
    tokens: Vec<Token>,
    pos: usize,
    /// Blocks and groups currently open
    depth: usize,
    heap: &'a mut Heap,
    symbols: &'a mut Symbols,
}

impl Scanner<'_> {
    fn top_level(&mut self) -> Result<Loaded, ScanError> {
        let mut values = Vec::new();
        let mut lines = Vec::new();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::BlockClose | TokenKind::GroupClose => {
                    return Err(ScanError::invalid(
                        format!("unmatched {}", closer(&token.kind)),
                        token.location,
                    ))
                }
                _ => {
                    lines.push(token.location.line);
                    values.push(self.element()?);
                }
            }
        }
        Ok(Loaded {
            block: self.heap.alloc_array(&values),
            lines,
        })
    }

    /// One element, folding a following path if there is one
    fn element(&mut self) -> Result<Value, ScanError> {
        let location = self.peek().location;
        let value = self.atom()?;
        match self.peek().kind {
            TokenKind::PathSep => self.path(value, location),
            // `1:00` and friends have no meaning here
            TokenKind::PathColon => Err(ScanError::invalid("value followed by :", self.peek().location)),
            _ => Ok(value),
        }
    }

    fn atom(&mut self) -> Result<Value, ScanError> {
        let token = self.next();
        let location = token.location;
        let value = match token.kind {
            TokenKind::Integer(n) => Value::Integer(n),
            TokenKind::Decimal(d) => Value::Decimal(d),
            TokenKind::Char(c) => Value::Char(c),
            TokenKind::Pair(x, y) => Value::Pair(x, y),
            TokenKind::Date(d) => Value::Date(d),
            TokenKind::Text(s) => Value::Text(SeriesRef::head(self.heap.alloc_text(&s))),
            TokenKind::File(s) => Value::File(SeriesRef::head(self.heap.alloc_text(&s))),
            TokenKind::Binary(b) => Value::Binary(SeriesRef::head(self.heap.alloc_binary(&b))),
            TokenKind::Word(s) => Value::Word(self.word(&s)),
            TokenKind::SetWord(s) => Value::SetWord(self.word(&s)),
            TokenKind::GetWord(s) => Value::GetWord(self.word(&s)),
            TokenKind::LitWord(s) => Value::LitWord(self.word(&s)),
            TokenKind::Refinement(s) => Value::Refinement(self.symbols.intern(&s)),
            TokenKind::Issue(s) => Value::Issue(self.symbols.intern(&s)),
            TokenKind::BlockOpen => Value::Block(SeriesRef::head(self.nested(TokenKind::BlockClose, location)?)),
            TokenKind::GroupOpen => Value::Group(SeriesRef::head(self.nested(TokenKind::GroupClose, location)?)),
            TokenKind::BlockClose | TokenKind::GroupClose => {
                return Err(ScanError::invalid(
                    format!("unmatched {}", closer(&token.kind)),
                    location,
                ))
            }
            TokenKind::PathSep => return Err(ScanError::invalid("path separator", location)),
            TokenKind::PathColon => return Err(ScanError::invalid(":", location)),
            TokenKind::Eof => return Err(ScanError::missing("value", location)),
        };
        Ok(value)
    }

    fn nested(&mut self, close: TokenKind, open: SourceLocation) -> Result<SeriesId, ScanError> {
        if self.depth >= MAX_NESTING {
            return Err(ScanError::invalid(format!("nesting deeper than {}", MAX_NESTING), open));
        }
        self.depth += 1;
        let array = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.array(close, open));
        self.depth -= 1;
        array
    }

    fn array(&mut self, close: TokenKind, open: SourceLocation) -> Result<SeriesId, ScanError> {
        let mut values = Vec::new();
        loop {
            let token = self.peek();
            if token.kind == close {
                self.next();
                break;
            }
            match token.kind {
                TokenKind::Eof => return Err(ScanError::missing(closer(&close), open)),
                TokenKind::BlockClose | TokenKind::GroupClose => {
                    return Err(ScanError::invalid(
                        format!("mismatched {}", closer(&token.kind)),
                        token.location,
                    ))
                }
                _ => values.push(self.element()?),
            }
        }
        Ok(self.heap.alloc_array(&values))
    }

    fn path(&mut self, head: Value, location: SourceLocation) -> Result<Value, ScanError> {
        let (mut kind, first) = match head {
            Value::Word(w) => (PathKind::Plain, Value::Word(w)),
            Value::GetWord(w) => (PathKind::Get, Value::Word(w)),
            Value::LitWord(_) => return Err(ScanError::invalid("lit-path", location)),
            _ => return Err(ScanError::invalid("path head", location)),
        };
        let mut parts = vec![first];
        while self.peek().kind == TokenKind::PathSep {
            if kind == PathKind::Set {
                return Err(ScanError::invalid("set-path must end the path", location));
            }
            self.next();
            match self.atom()? {
                Value::SetWord(w) => {
                    if kind == PathKind::Get {
                        return Err(ScanError::invalid("get-path ending in set-word", location));
                    }
                    parts.push(Value::Word(w));
                    kind = PathKind::Set;
                }
                Value::LitWord(_) | Value::Refinement(_) => {
                    return Err(ScanError::invalid("path element", location))
                }
                part => parts.push(part),
            }
            if self.peek().kind == TokenKind::PathColon {
                self.next();
                if kind == PathKind::Get {
                    return Err(ScanError::invalid("get-path ending in :", location));
                }
                kind = PathKind::Set;
            }
        }
        let r = SeriesRef::head(self.heap.alloc_array(&parts));
        Ok(match kind {
            PathKind::Plain => Value::Path(r),
            PathKind::Get => Value::GetPath(r),
            PathKind::Set => Value::SetPath(r),
        })
    }

    fn word(&mut self, name: &str) -> WordCell {
        WordCell::unbound(self.symbols.intern(name))
    }

    fn peek(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)].clone()
    }

    fn next(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }
}

fn closer(kind: &TokenKind) -> String {
    match kind {
        TokenKind::GroupClose => ")".into(),
        _ => "]".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::ScanErrorKind;

    fn load(src: &str) -> (Heap, Symbols, Loaded) {
        let mut heap = Heap::default();
        let mut symbols = Symbols::new();
        let loaded = scan(&mut heap, &mut symbols, src).unwrap();
        (heap, symbols, loaded)
    }

    #[test]
    fn test_nested_blocks() {
        let (heap, _, loaded) = load("1 [2 (3)] 4");
        let top = heap.array(loaded.block);
        assert_eq!(top.len(), 3);
        let Value::Block(inner) = top[1] else {
            panic!("expected block");
        };
        let inner = heap.array(inner.series);
        assert_eq!(inner[0], Value::Integer(2));
        assert!(matches!(inner[1], Value::Group(_)));
    }

    #[test]
    fn test_paths() {
        let (heap, symbols, loaded) = load("a/b/1 :c/d e/f:");
        let top = heap.array(loaded.block);
        let Value::Path(p) = top[0] else {
            panic!("expected path");
        };
        let parts = heap.array(p.series);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], Value::Integer(1));
        assert_eq!(symbols.name(parts[1].symbol().unwrap()), "b");
        assert!(matches!(top[1], Value::GetPath(_)));
        assert!(matches!(top[2], Value::SetPath(_)));
    }

    #[test]
    fn test_top_level_lines() {
        let (_, _, loaded) = load("x: 1\n\nprint x\n[\n]");
        assert_eq!(loaded.lines, vec![1, 1, 3, 3, 4]);
    }

    #[test]
    fn test_unbalanced() {
        let mut heap = Heap::default();
        let mut symbols = Symbols::new();
        let err = scan(&mut heap, &mut symbols, "[1 2").unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Missing);
        let err = scan(&mut heap, &mut symbols, "1 ]").unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Invalid);
        let err = scan(&mut heap, &mut symbols, "[1 )").unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Invalid);
    }

    #[test]
    fn test_set_paths_end_in_any_element() {
        let (heap, _, loaded) = load("b/2: 9 o/(k): 1");
        let top = heap.array(loaded.block);
        let Value::SetPath(p) = top[0] else {
            panic!("expected set-path");
        };
        assert_eq!(heap.array(p.series)[1], Value::Integer(2));
        assert_eq!(top[1], Value::Integer(9));
        let Value::SetPath(p) = top[2] else {
            panic!("expected set-path");
        };
        assert!(matches!(heap.array(p.series)[1], Value::Group(_)));
    }

    #[test]
    fn test_stray_colons_and_lit_paths_are_rejected() {
        let mut heap = Heap::default();
        let mut symbols = Symbols::new();
        for source in ["1:00", "\"a\":", "(x):", "'a/b", ":a/2:"] {
            let err = scan(&mut heap, &mut symbols, source).unwrap_err();
            assert_eq!(err.kind, ScanErrorKind::Invalid, "{}", source);
        }
    }

    #[test]
    fn test_nesting_limit() {
        let mut heap = Heap::default();
        let mut symbols = Symbols::new();
        let deep = format!("{}1{}", "[".repeat(MAX_NESTING), "]".repeat(MAX_NESTING));
        assert!(scan(&mut heap, &mut symbols, &deep).is_ok());
        let deeper = format!("{}1{}", "[".repeat(MAX_NESTING + 1), "]".repeat(MAX_NESTING + 1));
        let err = scan(&mut heap, &mut symbols, &deeper).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Invalid);
    }
}
