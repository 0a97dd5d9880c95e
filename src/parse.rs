//! Pattern-text parser.
//!
//! Produces the raw [`Regexp`] tree the normalization passes expect:
//! alternation chains nest to the left, counted repetitions stay as
//! `Curly` nodes, custom character classes keep their ranges as a
//! left-chained `CharRange` spine, and digit escapes stay `CharEscape`
//! until the backref rewrite. The whole pattern is wrapped in the
//! implicit capture group 0.
//!
//! The grammar is byte-oriented; multi-byte input is outside the engine's
//! semantics.

use thiserror::Error;

use crate::MAXSUB;
use crate::ast::{CharClass, ClassAtom, Regexp};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unexpected `{0}` at byte {1}")]
    UnexpectedChar(char, usize),
    #[error("empty subexpression at byte {0}")]
    EmptySubexpression(usize),
    #[error("too many capture groups")]
    TooManyGroups,
    #[error("bad repetition bounds at byte {0}")]
    BadCurly(usize),
    #[error("bad character-class range at byte {0}")]
    BadClassRange(usize),
    #[error("empty character class at byte {0}")]
    EmptyClass(usize),
}

/// Parses `pattern` into a raw AST, wrapped in capture group 0.
pub fn parse(pattern: &str) -> Result<Regexp, ParseError> {
    let mut parser = Parser {
        pat: pattern.as_bytes(),
        pos: 0,
        next_group: 1,
    };
    let re = parser.alt()?;
    if let Some(c) = parser.peek() {
        // Only an unbalanced `)` can stop `alt` before the end.
        return Err(ParseError::UnexpectedChar(c as char, parser.pos));
    }
    Ok(Regexp::Paren(0, Box::new(re)))
}

struct Parser<'p> {
    pat: &'p [u8],
    pos: usize,
    next_group: usize,
}

impl<'p> Parser<'p> {
    fn peek(&self) -> Option<u8> {
        self.pat.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.pat.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), ParseError> {
        match self.bump() {
            Some(got) if got == c => Ok(()),
            Some(got) => Err(ParseError::UnexpectedChar(got as char, self.pos - 1)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// `alt: concat ('|' concat)*`, folded to the left.
    fn alt(&mut self) -> Result<Regexp, ParseError> {
        let mut re = self.concat()?;
        while self.eat(b'|') {
            let rhs = self.concat()?;
            re = Regexp::Alt(Box::new(re), Box::new(rhs));
        }
        Ok(re)
    }

    /// `concat: repeat+`, folded to the left.
    fn concat(&mut self) -> Result<Regexp, ParseError> {
        let mut re: Option<Regexp> = None;
        while let Some(c) = self.peek() {
            if c == b'|' || c == b')' {
                break;
            }
            let rhs = self.repeat()?;
            re = Some(match re {
                None => rhs,
                Some(lhs) => Regexp::Cat(Box::new(lhs), Box::new(rhs)),
            });
        }
        re.ok_or(ParseError::EmptySubexpression(self.pos))
    }

    /// A single term followed by any number of postfix quantifiers.
    fn repeat(&mut self) -> Result<Regexp, ParseError> {
        let mut re = self.single()?;
        loop {
            re = match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    Regexp::Star {
                        greedy: !self.eat(b'?'),
                        sub: Box::new(re),
                    }
                }
                Some(b'+') => {
                    self.pos += 1;
                    Regexp::Plus {
                        greedy: !self.eat(b'?'),
                        sub: Box::new(re),
                    }
                }
                Some(b'?') => {
                    self.pos += 1;
                    Regexp::Quest {
                        greedy: !self.eat(b'?'),
                        sub: Box::new(re),
                    }
                }
                Some(b'{') => {
                    self.pos += 1;
                    let (min, max) = self.curly_bounds()?;
                    Regexp::Curly {
                        min,
                        max,
                        sub: Box::new(re),
                    }
                }
                _ => return Ok(re),
            };
        }
    }

    /// Bounds of a `{m}`, `{m,}`, `{,n}` or `{m,n}` quantifier, with -1
    /// standing for a missing bound.
    fn curly_bounds(&mut self) -> Result<(i32, i32), ParseError> {
        let at = self.pos - 1;
        let min = self.number()?;
        let max = if self.eat(b',') { self.number()? } else { min };
        self.expect(b'}')?;
        match (min, max) {
            // `{,}` repeats nothing, `{..,0}` matches nothing at all.
            (-1, -1) | (_, 0) => Err(ParseError::BadCurly(at)),
            (min, max) if max != -1 && min > max => Err(ParseError::BadCurly(at)),
            bounds => Ok(bounds),
        }
    }

    fn number(&mut self) -> Result<i32, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(-1);
        }
        std::str::from_utf8(&self.pat[start..self.pos])
            .expect("digits are ascii")
            .parse::<i32>()
            .map_err(|_| ParseError::BadCurly(start))
    }

    fn single(&mut self) -> Result<Regexp, ParseError> {
        let at = self.pos;
        match self.bump().ok_or(ParseError::UnexpectedEnd)? {
            b'(' => self.group(),
            b'[' => self.char_class(),
            b'.' => Ok(Regexp::Dot),
            b'^' => Ok(Regexp::InlineZwa(b'^')),
            b'$' => Ok(Regexp::InlineZwa(b'$')),
            b'\\' => {
                let c = self.bump().ok_or(ParseError::UnexpectedEnd)?;
                Ok(Regexp::CharEscape(c))
            }
            c @ (b'*' | b'+' | b'?' | b'{') => Err(ParseError::UnexpectedChar(c as char, at)),
            c => Ok(Regexp::Lit(c)),
        }
    }

    fn group(&mut self) -> Result<Regexp, ParseError> {
        if self.eat(b'?') {
            match self.bump() {
                Some(b':') => {
                    let re = self.alt()?;
                    self.expect(b')')?;
                    Ok(re)
                }
                Some(b'=') => {
                    let re = self.alt()?;
                    self.expect(b')')?;
                    Ok(Regexp::Lookahead(Box::new(re)))
                }
                Some(c) => Err(ParseError::UnexpectedChar(c as char, self.pos - 1)),
                None => Err(ParseError::UnexpectedEnd),
            }
        } else {
            let n = self.next_group;
            if n >= MAXSUB / 2 {
                return Err(ParseError::TooManyGroups);
            }
            self.next_group += 1;
            let re = self.alt()?;
            self.expect(b')')?;
            Ok(Regexp::Paren(n, Box::new(re)))
        }
    }

    fn char_class(&mut self) -> Result<Regexp, ParseError> {
        let at = self.pos - 1;
        let invert = self.eat(b'^');
        let mut plus_dash = false;
        if self.peek() == Some(b'-') {
            plus_dash = true;
            self.pos += 1;
        }
        let mut chain: Option<Box<Regexp>> = None;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEnd),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b'-') if self.peek_at(1) == Some(b']') => {
                    plus_dash = true;
                    self.pos += 1;
                }
                Some(_) => {
                    let lo = self.class_atom()?;
                    let hi = if self.peek() == Some(b'-') && self.peek_at(1) != Some(b']') {
                        self.pos += 1;
                        self.class_atom()?
                    } else {
                        lo
                    };
                    // Ranges must pair two literals, or be a single escape.
                    match (lo, hi) {
                        (ClassAtom::Lit(_), ClassAtom::Lit(_)) => {}
                        (ClassAtom::Escape(a), ClassAtom::Escape(b)) if a == b => {}
                        _ => return Err(ParseError::BadClassRange(self.pos)),
                    }
                    chain = Some(Box::new(Regexp::CharRange {
                        left: chain,
                        lo,
                        hi,
                    }));
                }
            }
        }
        if chain.is_none() && !plus_dash {
            return Err(ParseError::EmptyClass(at));
        }
        Ok(Regexp::CustomCharClass(CharClass {
            invert,
            plus_dash,
            merged_ranges: false,
            chain,
            children: Vec::new(),
        }))
    }

    fn class_atom(&mut self) -> Result<ClassAtom, ParseError> {
        match self.bump().ok_or(ParseError::UnexpectedEnd)? {
            b'\\' => {
                let c = self.bump().ok_or(ParseError::UnexpectedEnd)?;
                Ok(ClassAtom::Escape(c))
            }
            c => Ok(ClassAtom::Lit(c)),
        }
    }
}
