//! Source scanner
//!
//! This module transforms source text into nested blocks of cells:
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`scan`]: Folding tokens into blocks, groups and paths in the heap
//!
//! # Syntax
//!
//! Integers, decimals (`1.5`, `1e3`), chars (`#"a"`), pairs (`10x20`), dates
//! (`2024-01-15`), strings (`"..."` and braced `{...}` with `^` escapes),
//! files (`%a.txt`), binaries (`#{DEADBEEF}`), issues (`#abc`), words in all
//! four forms, refinements, paths, blocks, groups and `;` comments.

pub mod lexer;
pub mod scan;

/// Line and column of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}
