//! Quote-aware scanning over statement text.
//!
//! The statement grammar is split on separators (commas, `AND`, keywords)
//! that only count at the top level: outside single- or double-quoted strings
//! and outside parentheses.

use std::ops::Range;

/// A cursor over the characters of a statement that tracks whether the
/// current character sits inside a quoted string or a parenthesised group.
pub struct Tokenizer<'a> {
    input: &'a str,
    /// Byte offset and character, for slicing the input back out.
    chars: Vec<(usize, char)>,
    /// The current position in the character vector.
    position: usize,
    /// The quote character of the string we are inside, if any.
    quote: Option<char>,
    /// Parenthesis nesting depth outside of quotes.
    depth: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            position: 0,
            quote: None,
            depth: 0,
        }
    }

    // --- Navigation Helpers ---

    /// Returns the byte offset and character at the current position.
    fn current(&self) -> (usize, char) {
        self.chars[self.position]
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    /// True when the current character is neither quoted nor nested.
    fn at_top_level(&self) -> bool {
        self.quote.is_none() && self.depth == 0
    }

    /// Consumes the current character, updating quote and nesting state.
    fn advance(&mut self) {
        let (_, ch) = self.current();
        match self.quote {
            Some(q) if ch == q => self.quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => self.quote = Some(ch),
                '(' => self.depth += 1,
                ')' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            },
        }
        self.position += 1;
    }

    // --- Extraction Logic ---

    /// Byte offset of the first top-level character matching `pred`.
    fn find(&mut self, mut pred: impl FnMut(&'a str, usize, char) -> bool) -> Option<usize> {
        while !self.is_at_end() {
            let (offset, ch) = self.current();
            if self.at_top_level() && pred(self.input, offset, ch) {
                return Some(offset);
            }
            self.advance();
        }
        None
    }
}

/// Splits `input` on every top-level `separator`, trimming each part.
///
/// Blank input yields no parts; a trailing separator yields a trailing empty
/// part so that callers can reject it.
///
/// # Example
/// ```
/// # use minidb::tokenizer::split_top_level;
/// let parts = split_top_level("1, 'a, b', (2, 3)", ',');
/// assert_eq!(parts, vec!["1", "'a, b'", "(2, 3)"]);
/// ```
pub fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let mut tokenizer = Tokenizer::new(input);

    while let Some(offset) = tokenizer.find(|_, _, ch| ch == separator) {
        parts.push(input[start..offset].trim());
        start = offset + separator.len_utf8();
        tokenizer.advance();
    }
    parts.push(input[start..].trim());
    parts
}

/// Byte offset of the first top-level character matching `pred`.
pub fn find_top_level(input: &str, pred: impl Fn(char) -> bool) -> Option<usize> {
    Tokenizer::new(input).find(|_, _, ch| pred(ch))
}

/// Byte range of the first top-level, whole-word, case-insensitive occurrence
/// of `keyword` in `input`.
pub fn find_keyword(input: &str, keyword: &str) -> Option<Range<usize>> {
    let mut tokenizer = Tokenizer::new(input);
    tokenizer
        .find(|text, offset, _| keyword_at(text, offset, keyword))
        .map(|start| start..start + keyword.len())
}

/// Splits `input` on every top-level occurrence of the word `keyword`.
pub fn split_keyword<'a>(input: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = input;

    while let Some(range) = find_keyword(rest, keyword) {
        parts.push(rest[..range.start].trim());
        rest = &rest[range.end..];
    }
    parts.push(rest.trim());
    parts
}

/// Byte offset of the `)` closing the `(` found at byte offset `open`.
pub fn closing_paren(input: &str, open: usize) -> Option<usize> {
    let group = input.get(open..)?;
    if !group.starts_with('(') {
        return None;
    }

    let mut tokenizer = Tokenizer::new(group);
    tokenizer.advance();
    while !tokenizer.is_at_end() {
        let (offset, ch) = tokenizer.current();
        if ch == ')' && tokenizer.quote.is_none() && tokenizer.depth == 1 {
            return Some(open + offset);
        }
        tokenizer.advance();
    }
    None
}

/// Returns true for characters that may appear in an identifier.
pub fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Checks that `name` is a valid table or column identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => chars.all(is_ident_char),
        _ => false,
    }
}

/// True when `keyword` starts at `offset` as a whole word.
fn keyword_at(text: &str, offset: usize, keyword: &str) -> bool {
    let Some(candidate) = text.get(offset..offset + keyword.len()) else {
        return false;
    };
    if !candidate.eq_ignore_ascii_case(keyword) {
        return false;
    }

    let before = text[..offset].chars().next_back();
    let after = text[offset + keyword.len()..].chars().next();
    !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
}
