//! Lexer (tokenizer) for source text
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the
//! scanner. Paths are not assembled here: a `/` written directly against the
//! previous token becomes [`TokenKind::PathSep`] and the scanner folds the
//! pieces together. A `/` after whitespace starts a refinement (`/only`) or is
//! the word `/` or `//` itself.

use super::SourceLocation;
use crate::memory::value::Date;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Decimal(f64),
    Char(char),
    Pair(i32, i32),
    Date(Date),
    Text(String),
    File(String),
    Binary(Vec<u8>),

    // Words
    Word(String),
    SetWord(String),
    GetWord(String),
    LitWord(String),
    Refinement(String),
    Issue(String),

    // Punctuation
    BlockOpen,
    BlockClose,
    GroupOpen,
    GroupClose,
    /// `/` glued between two path elements
    PathSep,
    /// `:` glued to the end of a path element (`b/2:`)
    PathColon,

    Eof,
}

impl TokenKind {
    /// Tokens a following `/` can extend into a path
    fn starts_path(&self) -> bool {
        matches!(
            self,
            TokenKind::Word(_)
                | TokenKind::GetWord(_)
                | TokenKind::LitWord(_)
                | TokenKind::Integer(_)
                | TokenKind::GroupClose
                | TokenKind::Text(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

/// Whether the scanner found something wrong or something missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    Invalid,
    Missing,
}

/// Malformed source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {}, column {}", .location.line, .location.column)]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl ScanError {
    pub fn invalid(message: impl Into<String>, location: SourceLocation) -> Self {
        ScanError {
            kind: ScanErrorKind::Invalid,
            message: message.into(),
            location,
        }
    }

    pub fn missing(message: impl Into<String>, location: SourceLocation) -> Self {
        ScanError {
            kind: ScanErrorKind::Missing,
            message: message.into(),
            location,
        }
    }
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '[' | ']' | '(' | ')' | '"' | '{' | '}' | ';')
}

/// Lexer for source text
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    /// Position just past the previous token and whether it can start a path
    last_end: usize,
    last_pathable: bool,
    last_sep: bool,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            last_end: usize::MAX,
            last_pathable: false,
            last_sep: false,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ScanError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let location = self.current_location();
            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    location,
                });
                break;
            }
            let kind = self.next_token()?;
            self.last_end = self.position;
            self.last_pathable = kind.starts_path() || kind == TokenKind::PathSep;
            self.last_sep = kind == TokenKind::PathSep;
            tokens.push(Token { kind, location });
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<TokenKind, ScanError> {
        let loc = self.current_location();
        let glued = self.position == self.last_end && self.last_pathable;
        let Some(ch) = self.peek() else {
            return Err(ScanError::missing("token", loc));
        };

        match ch {
            '[' => self.single(TokenKind::BlockOpen),
            ']' => self.single(TokenKind::BlockClose),
            '(' => self.single(TokenKind::GroupOpen),
            ')' => self.single(TokenKind::GroupClose),
            '}' => Err(ScanError::invalid("unmatched }", loc)),
            '"' => {
                self.advance();
                Ok(TokenKind::Text(self.quoted_text('"', loc)?))
            }
            '{' => {
                self.advance();
                Ok(TokenKind::Text(self.braced_text(loc)?))
            }
            '/' => self.slash(glued, loc),
            '%' => self.file(loc),
            '#' => self.hash(loc),
            '\'' => {
                self.advance();
                let name = self.word_atom();
                if name.is_empty() || name.ends_with(':') {
                    return Err(ScanError::invalid(format!("lit-word '{}", name), loc));
                }
                Ok(TokenKind::LitWord(name))
            }
            ':' if glued && !self.last_sep => self.single(TokenKind::PathColon),
            ':' => {
                self.advance();
                let name = self.word_atom();
                if name.is_empty() || name.ends_with(':') {
                    return Err(ScanError::invalid(format!("get-word :{}", name), loc));
                }
                Ok(TokenKind::GetWord(name))
            }
            '0'..='9' => self.number(loc),
            '+' | '-' if self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) => self.number(loc),
            _ => self.word(loc),
        }
    }

    fn single(&mut self, kind: TokenKind) -> Result<TokenKind, ScanError> {
        self.advance();
        Ok(kind)
    }

    fn slash(&mut self, glued: bool, loc: SourceLocation) -> Result<TokenKind, ScanError> {
        if glued {
            self.advance();
            return match self.peek() {
                Some(c) if !is_delimiter(c) || c == '(' || c == '"' => Ok(TokenKind::PathSep),
                _ => Err(ScanError::invalid("path ends with /", loc)),
            };
        }
        let mut run = 0;
        while self.peek_ahead(run) == Some('/') {
            run += 1;
        }
        let after = self.peek_ahead(run);
        if after.map_or(true, is_delimiter) {
            for _ in 0..run {
                self.advance();
            }
            return Ok(TokenKind::Word("/".repeat(run)));
        }
        if run > 1 {
            return Err(ScanError::invalid("refinement", loc));
        }
        self.advance();
        let name = self.word_atom();
        if name.ends_with(':') {
            return Err(ScanError::invalid(format!("refinement /{}", name), loc));
        }
        Ok(TokenKind::Refinement(name))
    }

    fn word(&mut self, loc: SourceLocation) -> Result<TokenKind, ScanError> {
        let name = self.word_atom();
        if name.is_empty() {
            let ch = self.advance().unwrap_or(' ');
            return Err(ScanError::invalid(format!("character {:?}", ch), loc));
        }
        if let Some(base) = name.strip_suffix(':') {
            if base.is_empty() || base.contains(':') {
                return Err(ScanError::invalid(format!("word {}", name), loc));
            }
            return Ok(TokenKind::SetWord(base.to_string()));
        }
        if name.contains(':') {
            return Err(ScanError::invalid(format!("word {}", name), loc));
        }
        Ok(TokenKind::Word(name))
    }

    /// Characters up to a delimiter or `/`
    fn word_atom(&mut self) -> String {
        let mut atom = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) || c == '/' {
                break;
            }
            atom.push(c);
            self.advance();
            if c == ':' {
                break;
            }
        }
        atom
    }

    fn number(&mut self, loc: SourceLocation) -> Result<TokenKind, ScanError> {
        let mut atom = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) || c == '/' || c == ':' {
                break;
            }
            atom.push(c);
            self.advance();
        }
        let invalid = |what: &str| ScanError::invalid(format!("{} {}", what, atom), loc);

        if let Some((x, y)) = atom.split_once(['x', 'X']) {
            let x = x.parse::<i32>().map_err(|_| invalid("pair"))?;
            let y = y.parse::<i32>().map_err(|_| invalid("pair"))?;
            return Ok(TokenKind::Pair(x, y));
        }
        if !atom.starts_with(['-', '+']) && atom.matches('-').count() == 2 {
            let parts: Vec<&str> = atom.split('-').collect();
            let year = parts[0].parse::<i16>().map_err(|_| invalid("date"))?;
            let month = parts[1].parse::<u8>().map_err(|_| invalid("date"))?;
            let day = parts[2].parse::<u8>().map_err(|_| invalid("date"))?;
            return Date::new(year, month, day)
                .map(TokenKind::Date)
                .ok_or_else(|| invalid("date"));
        }
        if atom.contains(['.', 'e', 'E']) {
            return atom
                .parse::<f64>()
                .map(TokenKind::Decimal)
                .map_err(|_| invalid("decimal"));
        }
        atom.parse::<i64>()
            .map(TokenKind::Integer)
            .map_err(|_| invalid("integer"))
    }

    fn file(&mut self, loc: SourceLocation) -> Result<TokenKind, ScanError> {
        self.advance();
        if self.peek() == Some('"') {
            self.advance();
            return Ok(TokenKind::File(self.quoted_text('"', loc)?));
        }
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            name.push(c);
            self.advance();
        }
        if name.is_empty() {
            return Err(ScanError::invalid("file %", loc));
        }
        Ok(TokenKind::File(name))
    }

    fn hash(&mut self, loc: SourceLocation) -> Result<TokenKind, ScanError> {
        self.advance();
        match self.peek() {
            Some('"') => {
                self.advance();
                let text = self.quoted_text('"', loc)?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(TokenKind::Char(c)),
                    _ => Err(ScanError::invalid(format!("char #\"{}\"", text), loc)),
                }
            }
            Some('{') => {
                self.advance();
                self.binary(loc)
            }
            _ => {
                let name = self.word_atom();
                if name.is_empty() || name.contains(':') {
                    return Err(ScanError::invalid(format!("issue #{}", name), loc));
                }
                Ok(TokenKind::Issue(name))
            }
        }
    }

    fn binary(&mut self, loc: SourceLocation) -> Result<TokenKind, ScanError> {
        let mut digits = Vec::new();
        loop {
            match self.advance() {
                Some('}') => break,
                Some(c) if c.is_whitespace() => {}
                Some(c) => match c.to_digit(16) {
                    Some(d) => digits.push(d as u8),
                    None => return Err(ScanError::invalid(format!("binary digit {:?}", c), loc)),
                },
                None => return Err(ScanError::missing("}", loc)),
            }
        }
        if digits.len() % 2 != 0 {
            return Err(ScanError::invalid("binary with odd digit count", loc));
        }
        Ok(TokenKind::Binary(
            digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect(),
        ))
    }

    /// Body of a `"..."` string; the opening quote is consumed
    fn quoted_text(&mut self, close: char, loc: SourceLocation) -> Result<String, ScanError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some(c) if c == close => return Ok(text),
                Some('\n') | None => return Err(ScanError::missing(close.to_string(), loc)),
                Some('^') => text.push(self.escape(loc)?),
                Some(c) => text.push(c),
            }
        }
    }

    /// Body of a `{...}` string; braces nest and newlines are allowed
    fn braced_text(&mut self, loc: SourceLocation) -> Result<String, ScanError> {
        let mut text = String::new();
        let mut depth = 1;
        loop {
            match self.advance() {
                Some('{') => {
                    depth += 1;
                    text.push('{');
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                    text.push('}');
                }
                Some('^') => text.push(self.escape(loc)?),
                Some(c) => text.push(c),
                None => return Err(ScanError::missing("}", loc)),
            }
        }
    }

    fn escape(&mut self, loc: SourceLocation) -> Result<char, ScanError> {
        match self.advance() {
            Some('/') => Ok('\n'),
            Some('-') => Ok('\t'),
            Some('^') => Ok('^'),
            Some('"') => Ok('"'),
            Some('{') => Ok('{'),
            Some('}') => Ok('}'),
            Some('@') => Ok('\0'),
            Some('(') => {
                let mut hex = String::new();
                loop {
                    match self.advance() {
                        Some(')') => break,
                        Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                        _ => return Err(ScanError::invalid("escape ^(", loc)),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ScanError::invalid(format!("escape ^({})", hex), loc))
            }
            Some(c) => Err(ScanError::invalid(format!("escape ^{}", c), loc)),
            None => Err(ScanError::missing("escape", loc)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == ';' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_words_and_numbers() {
        let tokens = kinds("x: 1 + 2.5 :y 'z /only");
        assert_eq!(
            tokens,
            vec![
                TokenKind::SetWord("x".into()),
                TokenKind::Integer(1),
                TokenKind::Word("+".into()),
                TokenKind::Decimal(2.5),
                TokenKind::GetWord("y".into()),
                TokenKind::LitWord("z".into()),
                TokenKind::Refinement("only".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_slash_words() {
        let tokens = kinds("10 / 2 // 3");
        assert_eq!(tokens[1], TokenKind::Word("/".into()));
        assert_eq!(tokens[3], TokenKind::Word("//".into()));
    }

    #[test]
    fn test_path_pieces() {
        let tokens = kinds("a/b/1 c/d:");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Word("a".into()),
                TokenKind::PathSep,
                TokenKind::Word("b".into()),
                TokenKind::PathSep,
                TokenKind::Integer(1),
                TokenKind::Word("c".into()),
                TokenKind::PathSep,
                TokenKind::SetWord("d".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens = kinds(r#"-7 10x20 2024-01-15 #"a" #"^/" #{DEADbeef} #tag %a/b.txt 1e3"#);
        assert_eq!(tokens[0], TokenKind::Integer(-7));
        assert_eq!(tokens[1], TokenKind::Pair(10, 20));
        assert_eq!(tokens[2], TokenKind::Date(Date::new(2024, 1, 15).unwrap()));
        assert_eq!(tokens[3], TokenKind::Char('a'));
        assert_eq!(tokens[4], TokenKind::Char('\n'));
        assert_eq!(tokens[5], TokenKind::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(tokens[6], TokenKind::Issue("tag".into()));
        assert_eq!(tokens[7], TokenKind::File("a/b.txt".into()));
        assert_eq!(tokens[8], TokenKind::Decimal(1000.0));
    }

    #[test]
    fn test_strings() {
        let tokens = kinds("\"a^\"b^/\" {multi\nline {nested}}");
        assert_eq!(tokens[0], TokenKind::Text("a\"b\n".into()));
        assert_eq!(tokens[1], TokenKind::Text("multi\nline {nested}".into()));
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("1 ; comment\n2");
        assert_eq!(
            tokens,
            vec![TokenKind::Integer(1), TokenKind::Integer(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_errors_carry_location() {
        let err = Lexer::new("x\n  \"open").tokenize().unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Missing);
        assert_eq!(err.location, SourceLocation::new(2, 3));

        let err = Lexer::new("2023-02-30").tokenize().unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Invalid);
        assert!(err.to_string().contains("line 1, column 1"));
    }
}
