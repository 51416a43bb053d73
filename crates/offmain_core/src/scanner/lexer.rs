//! Lexical region classification for JavaScript source.
//!
//! Splits a file into code, string, template-text, regex and comment regions
//! so later matching only ever looks at real code. Template substitutions
//! (`${ ... }`) are classified as code again, nested to any depth.

use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    Code,
    /// Single- or double-quoted literal, quotes included.
    String,
    /// Literal text of a template, including backticks and `${` / `}` delimiters.
    Template,
    Regex,
    LineComment,
    BlockComment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub range: Range<usize>,
}

pub trait RegionClassifier {
    /// Regions cover the whole source, in order, without gaps.
    fn classify(&self, source: &str) -> Vec<Region>;
}

/// Keywords after which a `/` starts a regular expression, not a division.
const REGEX_PREFIX_KEYWORDS: &[&[u8]] = &[
    b"return", b"typeof", b"instanceof", b"in", b"of", b"new", b"delete", b"void", b"throw",
    b"case", b"do", b"else", b"yield", b"await",
];

#[derive(Clone, Copy, Debug, Default)]
pub struct JsLexer;

impl RegionClassifier for JsLexer {
    fn classify(&self, source: &str) -> Vec<Region> {
        Lexer::new(source.as_bytes()).run()
    }
}

#[derive(Clone, Copy)]
enum Prev {
    Start,
    Punct(u8),
    Word(usize, usize),
    Value,
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    code_start: usize,
    regions: Vec<Region>,
    /// One entry per open template substitution: brace depth inside it.
    templates: Vec<usize>,
    prev: Prev,
}

impl<'a> Lexer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            code_start: 0,
            regions: Vec::new(),
            templates: Vec::new(),
            prev: Prev::Start,
        }
    }

    fn run(mut self) -> Vec<Region> {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'/' if self.peek(1) == Some(b'/') => {
                    let end = self.find_from(self.pos, b'\n').unwrap_or(self.bytes.len());
                    self.opaque(RegionKind::LineComment, end);
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    let end = self
                        .find_seq(self.pos + 2, b"*/")
                        .map(|at| at + 2)
                        .unwrap_or(self.bytes.len());
                    self.opaque(RegionKind::BlockComment, end);
                }
                b'/' if self.regex_allowed() => match self.scan_regex() {
                    Some(end) => {
                        self.opaque(RegionKind::Regex, end);
                        self.prev = Prev::Value;
                    }
                    None => self.punct(b),
                },
                b'\'' | b'"' => {
                    let end = self.scan_string(b);
                    self.opaque(RegionKind::String, end);
                    self.prev = Prev::Value;
                }
                b'`' => {
                    let end = self.scan_template(self.pos + 1);
                    self.opaque(RegionKind::Template, end);
                    self.prev = Prev::Value;
                }
                b'{' => {
                    if let Some(depth) = self.templates.last_mut() {
                        *depth += 1;
                    }
                    self.punct(b);
                }
                b'}' => match self.templates.last_mut() {
                    Some(0) => {
                        self.templates.pop();
                        let end = self.scan_template(self.pos + 1);
                        self.opaque(RegionKind::Template, end);
                        self.prev = Prev::Value;
                    }
                    Some(depth) => {
                        *depth -= 1;
                        self.punct(b);
                    }
                    None => self.punct(b),
                },
                b if is_word_byte(b) => {
                    let start = self.pos;
                    while self.pos < self.bytes.len() && is_word_byte(self.bytes[self.pos]) {
                        self.pos += 1;
                    }
                    self.prev = Prev::Word(start, self.pos);
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'+' | b'-' if self.peek(1) == Some(b) => {
                    // After an operand the update is postfix and the result is
                    // still an operand: `n++ / 2` divides.
                    let postfix = !self.regex_allowed();
                    self.pos += 2;
                    self.prev = if postfix { Prev::Value } else { Prev::Punct(b) };
                }
                b => self.punct(b),
            }
        }
        self.flush_code(self.bytes.len());
        self.regions
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn punct(&mut self, b: u8) {
        self.prev = match b {
            b')' | b']' => Prev::Value,
            _ => Prev::Punct(b),
        };
        self.pos += 1;
    }

    fn flush_code(&mut self, end: usize) {
        if self.code_start < end {
            self.regions.push(Region {
                kind: RegionKind::Code,
                range: self.code_start..end,
            });
        }
    }

    /// Emit the region `self.pos..end` and resume code after it.
    fn opaque(&mut self, kind: RegionKind, end: usize) {
        self.flush_code(self.pos);
        self.regions.push(Region {
            kind,
            range: self.pos..end,
        });
        self.pos = end;
        self.code_start = end;
    }

    fn regex_allowed(&self) -> bool {
        match self.prev {
            Prev::Start => true,
            Prev::Value => false,
            Prev::Punct(p) => b"(,=:[!&|?{};+-*%<>~^".contains(&p),
            Prev::Word(start, end) => REGEX_PREFIX_KEYWORDS.contains(&&self.bytes[start..end]),
        }
    }

    /// End offset of a quoted string starting at `self.pos`. An unescaped
    /// newline ends an unterminated literal.
    fn scan_string(&self, quote: u8) -> usize {
        let mut i = self.pos + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => return i,
                b if b == quote => return i + 1,
                _ => i += 1,
            }
        }
        self.bytes.len()
    }

    /// Scans template text from `i` up to and including the closing backtick
    /// or the next `${`, which opens a substitution.
    fn scan_template(&mut self, mut i: usize) -> usize {
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'`' => return i + 1,
                b'$' if self.bytes.get(i + 1) == Some(&b'{') => {
                    self.templates.push(0);
                    return i + 2;
                }
                _ => i += 1,
            }
        }
        self.bytes.len()
    }

    fn scan_regex(&self) -> Option<usize> {
        let mut i = self.pos + 1;
        let mut in_class = false;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => return None,
                b'[' => {
                    in_class = true;
                    i += 1;
                }
                b']' => {
                    in_class = false;
                    i += 1;
                }
                b'/' if !in_class => {
                    i += 1;
                    while i < self.bytes.len() && self.bytes[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    return Some(i);
                }
                _ => i += 1,
            }
        }
        None
    }

    fn find_from(&self, from: usize, needle: u8) -> Option<usize> {
        self.bytes[from..].iter().position(|&b| b == needle).map(|at| from + at)
    }

    fn find_seq(&self, from: usize, needle: &[u8]) -> Option<usize> {
        if from > self.bytes.len() {
            return None;
        }
        self.bytes[from..]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|at| from + at)
    }
}

/// Identifier bytes. Anything non-ASCII is treated as part of an identifier,
/// which keeps multi-byte characters out of punctuation.
pub fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}
