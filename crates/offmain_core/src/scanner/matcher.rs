//! Recognises worker-construction calls in classified source.

use super::lexer::{is_word_byte, Region, RegionKind};
use std::ops::Range;

/// How the worker's script was written at the call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceForm {
    /// `new Worker("./w.js")`
    LiteralPath,
    /// `new Worker(import.meta.url)`
    SelfUrl,
    /// `new Worker(new URL("./w.js", import.meta.url))`
    UrlWrappedLiteral,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionsArgument {
    pub range: Range<usize>,
    pub text: String,
}

/// A matched call site, captured before any resolution happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReference {
    /// `new` through the closing parenthesis.
    pub call_range: Range<usize>,
    pub constructor: String,
    pub form: SourceForm,
    /// The first argument, the only span the rewrite replaces.
    pub argument_range: Range<usize>,
    /// Unescaped path literal value; empty for [`SourceForm::SelfUrl`].
    pub raw_path: String,
    /// The path literal as written, quotes included.
    pub raw_path_text: String,
    pub options: Option<OptionsArgument>,
}

pub trait CallMatcher {
    fn find(&self, source: &str, regions: &[Region]) -> Vec<PendingReference>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Word,
    Punct(u8),
    Str,
    /// Template text or regex literal; never part of a match.
    Opaque,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    range: Range<usize>,
}

fn tokenize(source: &str, regions: &[Region]) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    for region in regions {
        match region.kind {
            RegionKind::LineComment | RegionKind::BlockComment => {}
            RegionKind::String => tokens.push(Token {
                kind: TokenKind::Str,
                range: region.range.clone(),
            }),
            RegionKind::Template | RegionKind::Regex => tokens.push(Token {
                kind: TokenKind::Opaque,
                range: region.range.clone(),
            }),
            RegionKind::Code => {
                let mut i = region.range.start;
                while i < region.range.end {
                    let b = bytes[i];
                    if b.is_ascii_whitespace() {
                        i += 1;
                    } else if is_word_byte(b) {
                        let start = i;
                        while i < region.range.end && is_word_byte(bytes[i]) {
                            i += 1;
                        }
                        tokens.push(Token {
                            kind: TokenKind::Word,
                            range: start..i,
                        });
                    } else {
                        tokens.push(Token {
                            kind: TokenKind::Punct(b),
                            range: i..i + 1,
                        });
                        i += 1;
                    }
                }
            }
        }
    }
    tokens
}

/// Matches `new <Constructor>(<script> [, <options>])` for a fixed set of
/// constructor names.
#[derive(Clone, Debug)]
pub struct WorkerCallMatcher {
    constructors: Vec<String>,
}

impl WorkerCallMatcher {
    pub fn new<I, S>(constructors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            constructors: constructors.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for WorkerCallMatcher {
    fn default() -> Self {
        Self::new(["Worker", "SharedWorker"])
    }
}

impl CallMatcher for WorkerCallMatcher {
    fn find(&self, source: &str, regions: &[Region]) -> Vec<PendingReference> {
        let tokens = tokenize(source, regions);
        let cursor = Cursor {
            source,
            tokens: &tokens,
        };
        let mut found = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match cursor.match_call(i, &self.constructors) {
                Some((reference, next)) => {
                    found.push(reference);
                    i = next;
                }
                None => i += 1,
            }
        }
        found
    }
}

struct Cursor<'a> {
    source: &'a str,
    tokens: &'a [Token],
}

impl<'a> Cursor<'a> {
    fn text(&self, i: usize) -> Option<&'a str> {
        self.tokens.get(i).map(|token| &self.source[token.range.clone()])
    }

    fn is_word(&self, i: usize, word: &str) -> bool {
        matches!(self.tokens.get(i), Some(t) if t.kind == TokenKind::Word) && self.text(i) == Some(word)
    }

    fn is_punct(&self, i: usize, p: u8) -> bool {
        matches!(self.tokens.get(i), Some(t) if t.kind == TokenKind::Punct(p))
    }

    fn is_str(&self, i: usize) -> bool {
        matches!(self.tokens.get(i), Some(t) if t.kind == TokenKind::Str)
    }

    /// `import.meta.url` starting at `i`; returns the index after it.
    fn import_meta_url(&self, i: usize) -> Option<usize> {
        (self.is_word(i, "import")
            && self.is_punct(i + 1, b'.')
            && self.is_word(i + 2, "meta")
            && self.is_punct(i + 3, b'.')
            && self.is_word(i + 4, "url"))
        .then_some(i + 5)
    }

    fn match_call(&self, i: usize, constructors: &[String]) -> Option<(PendingReference, usize)> {
        if !self.is_word(i, "new") || self.is_punct(i.wrapping_sub(1), b'.') {
            return None;
        }
        let constructor = self.text(i + 1)?;
        if self.tokens[i + 1].kind != TokenKind::Word || !constructors.iter().any(|c| c == constructor) {
            return None;
        }
        if !self.is_punct(i + 2, b'(') {
            return None;
        }

        let arg = i + 3;
        let (form, path_token, after_arg) = if self.is_str(arg) {
            (SourceForm::LiteralPath, Some(arg), arg + 1)
        } else if let Some(next) = self.import_meta_url(arg) {
            (SourceForm::SelfUrl, None, next)
        } else {
            let next = self.url_wrapped(arg)?;
            (SourceForm::UrlWrappedLiteral, Some(arg + 3), next)
        };
        let argument_range = self.tokens[arg].range.start..self.tokens[after_arg - 1].range.end;

        let (options, close) = if self.is_punct(after_arg, b')') {
            (None, after_arg)
        } else if self.is_punct(after_arg, b',') {
            if self.is_punct(after_arg + 1, b')') {
                (None, after_arg + 1)
            } else {
                self.options(after_arg + 1)?
            }
        } else {
            return None;
        };

        let (raw_path, raw_path_text) = match path_token {
            Some(token) => {
                let text = self.text(token)?;
                (string_value(text), text.to_string())
            }
            None => (String::new(), String::new()),
        };

        let reference = PendingReference {
            call_range: self.tokens[i].range.start..self.tokens[close].range.end,
            constructor: constructor.to_string(),
            form,
            argument_range,
            raw_path,
            raw_path_text,
            options,
        };
        Some((reference, close + 1))
    }

    /// `new URL("<path>", import.meta.url)` starting at `i`.
    fn url_wrapped(&self, i: usize) -> Option<usize> {
        if !(self.is_word(i, "new") && self.is_word(i + 1, "URL") && self.is_punct(i + 2, b'(')) {
            return None;
        }
        if !self.is_str(i + 3) || !self.is_punct(i + 4, b',') {
            return None;
        }
        let mut next = self.import_meta_url(i + 5)?;
        if self.is_punct(next, b',') {
            next += 1;
        }
        self.is_punct(next, b')').then_some(next + 1)
    }

    /// Everything from `start` up to the call's closing parenthesis.
    /// Returns the options argument and the index of that parenthesis.
    fn options(&self, start: usize) -> Option<(Option<OptionsArgument>, usize)> {
        let mut depth = 0usize;
        let mut last = None;
        let mut i = start;
        while let Some(token) = self.tokens.get(i) {
            match token.kind {
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')') if depth == 0 => break,
                TokenKind::Punct(b')' | b']' | b'}') => depth = depth.saturating_sub(1),
                _ => {}
            }
            let trailing_comma = depth == 0 && token.kind == TokenKind::Punct(b',') && self.is_punct(i + 1, b')');
            if !trailing_comma {
                last = Some(i);
            }
            i += 1;
        }
        if i >= self.tokens.len() {
            return None;
        }
        let last = last?;
        let range = self.tokens[start].range.start..self.tokens[last].range.end;
        let options = OptionsArgument {
            text: self.source[range.clone()].to_string(),
            range,
        };
        Some((Some(options), i))
    }
}

/// Value of a quoted JavaScript string literal, quotes included in `text`.
pub fn string_value(text: &str) -> String {
    let inner = text
        .get(1..text.len().saturating_sub(1))
        .unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some('u') => {
                let hex: String = if chars.clone().next() == Some('{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some('\n') | None => {}
            Some(other) => out.push(other),
        }
    }
    out
}
