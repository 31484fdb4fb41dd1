// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions)]

use crate::ast::*;
use crate::lexer::*;
use crate::number::Number;
use crate::value::Value;
use crate::Rc;

use core::str::FromStr;

use anyhow::{bail, Result};
use log::debug;

#[derive(Clone)]
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
        })
    }

    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol
            | TokenKind::Number
            | TokenKind::Ident
            | TokenKind::Topic
            | TokenKind::Eof => self.tok.1.text(),
            TokenKind::String => "",
        }
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.tok.0 == TokenKind::Symbol && self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.tok.1.error(&msg))
        }
    }

    fn parse_ident(&mut self) -> Result<Span> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Ident => {
                self.next_token()?;
                Ok(span)
            }
            _ => Err(span.error("expecting identifier")),
        }
    }

    fn read_number(span: &Span) -> Result<Value> {
        match Number::from_str(span.text()) {
            Ok(v) => Ok(Value::Number(v)),
            Err(_) => bail!(span.error("could not parse number")),
        }
    }

    fn read_string(span: &Span) -> Value {
        let mut s = String::with_capacity(span.text().len());
        let mut escaped = false;
        for ch in span.text().chars() {
            if escaped || ch != '\\' {
                s.push(ch);
                escaped = false;
            } else {
                escaped = true;
            }
        }
        Value::from(s)
    }

    fn parse_variable(&mut self) -> Result<Operand> {
        let loc = self.tok.1.start;
        self.expect("$", "before variable name")?;
        let name = self.parse_ident()?;
        Ok(Operand::Variable {
            name: name.text().into(),
            loc,
        })
    }

    fn parse_topic(&mut self) -> Result<Rc<str>> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Topic if span.text().len() > 1 => {
                self.next_token()?;
                Ok(span.text().into())
            }
            TokenKind::Topic => Err(span.error("expecting topic name after `/`")),
            _ => Err(span.error("path must start with `/`")),
        }
    }

    // Slice or index bound: integer, `$variable` or nothing.
    fn parse_bound(&mut self) -> Result<Option<Operand>> {
        match (&self.tok.0, self.token_text()) {
            (TokenKind::Number, _) => {
                let v = Self::read_number(&self.tok.1)?;
                self.next_token()?;
                Ok(Some(Operand::Literal(v)))
            }
            (TokenKind::Symbol, "$") => Ok(Some(self.parse_variable()?)),
            _ => Ok(None),
        }
    }

    fn parse_index_or_slice(&mut self) -> Result<PathComponent> {
        let open = self.tok.1.clone();
        self.expect("[", "")?;
        let start = self.parse_bound()?;

        let component = if self.tok.0 == TokenKind::Symbol && self.token_text() == ":" {
            self.next_token()?;
            let end = self.parse_bound()?;
            PathComponent::Slice { start, end }
        } else {
            match start {
                Some(op) => PathComponent::Index(op),
                None => bail!(open.error("expecting index or slice")),
            }
        };

        self.expect("]", "to close index")?;
        Ok(component)
    }

    fn parse_filter_value(&mut self) -> Result<Operand> {
        let span = self.tok.1.clone();
        match (&self.tok.0, self.token_text()) {
            (TokenKind::Number, _) => {
                let v = Self::read_number(&span)?;
                self.next_token()?;
                Ok(Operand::Literal(v))
            }
            (TokenKind::String, _) => {
                self.next_token()?;
                Ok(Operand::Literal(Self::read_string(&span)))
            }
            (TokenKind::Symbol, "$") => self.parse_variable(),
            _ => Err(span.error("expecting number, string or variable")),
        }
    }

    fn parse_filter(&mut self) -> Result<PathComponent> {
        let open = self.tok.1.clone();
        self.expect("{", "")?;

        let name_loc = self.tok.1.start;
        let mut path = vec![self.parse_ident()?.text().into()];
        while self.tok.0 == TokenKind::Symbol && self.token_text() == "." {
            self.next_token()?;
            path.push(self.parse_ident()?.text().into());
        }

        self.expect("==", "in filter")?;
        let value_loc = self.tok.1.start;
        let value = self.parse_filter_value()?;

        let close = self.tok.1.clone();
        self.expect("}", "to close filter")?;

        let repr = &self.source.contents()[open.end as usize..close.start as usize];
        Ok(PathComponent::Filter(Filter {
            path,
            value,
            repr: repr.into(),
            name_loc,
            value_loc,
        }))
    }

    fn parse_modifier(&mut self) -> Result<Modifier> {
        self.expect("@", "")?;
        let name = self.parse_ident()?;
        match name.text() {
            "json" => Ok(Modifier::Json),
            m => bail!(name.error(&format!("unknown modifier `@{m}`"))),
        }
    }

    pub fn parse(&mut self) -> Result<MessagePath> {
        let topic_name = self.parse_topic()?;
        let mut components = vec![];
        let mut modifier = None;

        loop {
            let span = self.tok.1.clone();
            match (&self.tok.0, self.token_text()) {
                (TokenKind::Eof, _) => break,
                (TokenKind::Symbol, ".") => {
                    self.next_token()?;
                    if self.tok.0 == TokenKind::Symbol && self.token_text() == "@" {
                        modifier = Some(self.parse_modifier()?);
                        if self.tok.0 != TokenKind::Eof {
                            bail!(self.tok.1.error("modifier must end the path"));
                        }
                        break;
                    }
                    components.push(PathComponent::Name(self.parse_ident()?.text().into()));
                }
                (TokenKind::Symbol, "[") => components.push(self.parse_index_or_slice()?),
                (TokenKind::Symbol, "{") => components.push(self.parse_filter()?),
                _ => bail!(span.error("expecting `.`, `[` or `{`")),
            }
        }

        Ok(MessagePath {
            source: self.source.contents().clone(),
            topic_name,
            components,
            modifier,
        })
    }
}

fn parse_text(text: &str) -> Result<MessagePath> {
    let source = Source::from_contents(text)?;
    let mut parser = Parser::new(&source)?;
    parser.parse()
}

/// Parse a message path.
///
/// Returns `None` for malformed text. Callers routinely probe partial input
/// (for example while a path is being typed), so failures are only logged.
pub fn parse_message_path(text: &str) -> Option<MessagePath> {
    match parse_text(text) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("invalid message path `{text}`: {e}");
            None
        }
    }
}
