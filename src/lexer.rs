// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions)]

use crate::Rc;

use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;

use anyhow::{anyhow, bail, Result};

/// Path text being parsed. Cheap to clone; spans share it.
#[derive(Clone)]
pub struct Source {
    contents: Rc<str>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.contents.fmt(f)
    }
}

impl Source {
    pub fn from_contents(contents: &str) -> Result<Source> {
        let max_size = u32::MAX as usize - 2;
        if contents.len() > max_size {
            bail!("path exceeds maximum allowed size {max_size}");
        }
        Ok(Self {
            contents: contents.into(),
        })
    }

    pub fn contents(&self) -> &Rc<str> {
        &self.contents
    }

    pub fn message(&self, col: u32, kind: &str, msg: &str) -> String {
        let col_spaces = (col as usize).saturating_sub(1);
        format!(
            "\n--> <path>:1:{}\n  |\n1 | {}\n  | {:<col_spaces$}^\n{}: {}",
            col, self.contents, "", kind, msg
        )
    }

    pub fn error(&self, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(col, "error", msg))
    }
}

#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    /// 1-based column. Paths are a single line.
    pub fn col(&self) -> u32 {
        self.start + 1
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.col(), kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.col(), msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_fmt(format_args!(
            "{}:{}, \"{}\"",
            self.start,
            self.end,
            self.text().escape_debug()
        ))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    Topic,
    Symbol,
    String,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    // Open `[` and `{` groups. Whitespace is only allowed inside one.
    depth: u32,
}

fn is_topic_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '/' | '-')
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            depth: 0,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            start: start as u32,
            end: end as u32,
        }
    }

    // The topic is everything from the leading `/` up to the first `.`, `[`
    // or `{`.
    fn read_topic(&mut self) -> Result<Token> {
        let start = self.peek().0;
        self.iter.next();
        while is_topic_char(self.peek().1) {
            self.iter.next();
        }
        let end = self.peek().0;
        Ok(Token(TokenKind::Topic, self.span(start, end)))
    }

    fn read_ident(&mut self) -> Result<Token> {
        let start = self.peek().0;
        loop {
            let ch = self.peek().1;
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.iter.next();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        Ok(Token(TokenKind::Ident, self.span(start, end)))
    }

    // Integers only, optionally negative. Bounds and filter values never
    // carry fractions.
    fn read_number(&mut self) -> Result<Token> {
        let start = self.peek().0;
        if self.peek().1 == '-' {
            self.iter.next();
        }
        while self.peek().1.is_ascii_digit() {
            self.iter.next();
        }
        let (end, ch) = self.peek();

        if ch == '_' || ch == '.' || ch.is_ascii_alphabetic() {
            return Err(self.source.error(end as u32 + 1, "invalid number"));
        }

        Ok(Token(TokenKind::Number, self.span(start, end)))
    }

    // Single or double quoted. The span excludes the quotes; escapes are
    // left in place for the parser.
    fn read_string(&mut self) -> Result<Token> {
        let (open, quote) = self.peek();
        self.iter.next();
        let start = self.peek().0;
        loop {
            let (offset, ch) = self.peek();
            match ch {
                '\x00' if offset >= self.source.contents().len() => {
                    return Err(self
                        .source
                        .error(open as u32 + 1, &format!("unmatched {quote}")));
                }
                '\\' => {
                    self.iter.next();
                    match self.peek().1 {
                        '\\' | '\'' | '"' => {
                            self.iter.next();
                        }
                        _ => {
                            return Err(self
                                .source
                                .error(offset as u32 + 1, "invalid escape sequence"))
                        }
                    }
                }
                _ if ch == quote => break,
                _ => {
                    self.iter.next();
                }
            }
        }
        let end = self.peek().0;
        self.iter.next();
        Ok(Token(TokenKind::String, self.span(start, end)))
    }

    fn skip_ws(&mut self) {
        if self.depth == 0 {
            return;
        }
        while matches!(self.peek().1, ' ' | '\t') {
            self.iter.next();
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        let (start, chr) = self.peek();
        if start == 0 && chr == '/' {
            return self.read_topic();
        }

        self.skip_ws();
        let (start, chr) = self.peek();

        match chr {
            '-' if self.peekahead(1).1.is_ascii_digit() => self.read_number(),
            '.' | '[' | ']' | '{' | '}' | ':' | '$' | '@' => {
                self.iter.next();
                match chr {
                    '[' | '{' => self.depth += 1,
                    ']' | '}' => self.depth = self.depth.saturating_sub(1),
                    _ => (),
                }
                Ok(Token(TokenKind::Symbol, self.span(start, start + 1)))
            }
            '=' if self.peekahead(1).1 == '=' => {
                self.iter.next();
                self.iter.next();
                Ok(Token(TokenKind::Symbol, self.span(start, start + 2)))
            }
            '\'' | '"' => self.read_string(),
            '\x00' if start >= self.source.contents().len() => {
                Ok(Token(TokenKind::Eof, self.span(start, start)))
            }
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_alphabetic() || chr == '_' => self.read_ident(),
            _ => Err(self.source.error(start as u32 + 1, "invalid character")),
        }
    }
}
