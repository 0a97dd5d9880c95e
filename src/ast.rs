//! The regex abstract syntax tree.
//!
//! Nodes own their children outright; the normalization passes in
//! [`crate::transform`] consume and rebuild subtrees rather than mutating
//! shared structure. `Clone` is the deep copy and `Display` renders the
//! tree in a compact prefix notation, which is what the debug logging
//! prints between passes.

use std::fmt;

/// A bound of a character-class range: a literal byte or an escape such as
/// `\w`. Escapes only appear with identical low and high bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassAtom {
    Lit(u8),
    Escape(u8),
}

/// A regex parse-tree node.
///
/// The parser produces the raw shapes (`Alt` chains, `Curly` counters,
/// char classes holding a left-chained `CharRange` spine); the transform
/// passes rewrite those into the forms the compiler accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Regexp {
    /// `A|B`. The parser nests chains to the left: `a|b|c` is
    /// `Alt(Alt(a, b), c)`.
    Alt(Box<Regexp>, Box<Regexp>),
    /// `AB`.
    Cat(Box<Regexp>, Box<Regexp>),
    /// A literal byte.
    Lit(u8),
    /// `.`
    Dot,
    /// A capture group, numbered from 1 in pattern order. Group 0 is the
    /// implicit whole-match group the parser wraps around the root.
    Paren(usize, Box<Regexp>),
    /// `A?`
    Quest { greedy: bool, sub: Box<Regexp> },
    /// `A*`
    Star { greedy: bool, sub: Box<Regexp> },
    /// `A+`
    Plus { greedy: bool, sub: Box<Regexp> },
    /// `A{min,max}`, with -1 meaning "unbounded" on either side.
    Curly {
        min: i32,
        max: i32,
        sub: Box<Regexp>,
    },
    /// `\c` for any byte `c`. Digit escapes become [`Regexp::Backref`]
    /// during normalization.
    CharEscape(u8),
    /// `[...]` or `[^...]`.
    CustomCharClass(CharClass),
    /// One `lo-hi` entry of a custom class. Before range merging these
    /// chain through `left`; afterwards they sit flat in the class's
    /// children array with `left` cleared.
    CharRange {
        left: Option<Box<Regexp>>,
        lo: ClassAtom,
        hi: ClassAtom,
    },
    /// A flattened alternation, produced from an `Alt` chain.
    AltList(Vec<Regexp>),
    /// `\1` .. `\9`.
    Backref(usize),
    /// `(?=A)`.
    Lookahead(Box<Regexp>),
    /// `^` or `$`.
    InlineZwa(u8),
}

/// Body of a `[...]` class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharClass {
    pub invert: bool,
    /// The class contained a bare `-` (first or last position).
    pub plus_dash: bool,
    /// Set once the range-merging pass has flattened `chain` into
    /// `children`.
    pub merged_ranges: bool,
    /// Left-chained `CharRange` spine as parsed.
    pub chain: Option<Box<Regexp>>,
    /// Flat `CharRange` children, populated by the merging pass.
    pub children: Vec<Regexp>,
}

impl Regexp {
    /// True when the expression ends in a `$` assertion, i.e. the rightmost
    /// leaf through `Cat`/`Paren` spines is `InlineZwa('$')`. The compiler
    /// records this on the program as its end-of-line anchor flag.
    pub fn ends_with_eol_anchor(&self) -> bool {
        match self {
            Regexp::InlineZwa(b'$') => true,
            Regexp::Cat(_, right) => right.ends_with_eol_anchor(),
            Regexp::Paren(_, sub) => sub.ends_with_eol_anchor(),
            _ => false,
        }
    }
}

impl fmt::Display for ClassAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassAtom::Lit(c) => write!(f, "{}", *c as char),
            ClassAtom::Escape(c) => write!(f, "\\{}", *c as char),
        }
    }
}

impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regexp::Alt(l, r) => write!(f, "Alt({l}, {r})"),
            Regexp::Cat(l, r) => write!(f, "Cat({l}, {r})"),
            Regexp::Lit(c) => write!(f, "Lit({})", *c as char),
            Regexp::Dot => write!(f, "Dot"),
            Regexp::Paren(n, sub) => write!(f, "Paren({n}, {sub})"),
            Regexp::Quest { greedy, sub } => {
                write!(f, "{}Quest({sub})", if *greedy { "" } else { "Ng" })
            }
            Regexp::Star { greedy, sub } => {
                write!(f, "{}Star({sub})", if *greedy { "" } else { "Ng" })
            }
            Regexp::Plus { greedy, sub } => {
                write!(f, "{}Plus({sub})", if *greedy { "" } else { "Ng" })
            }
            Regexp::Curly { min, max, sub } => write!(f, "Curly{{{min},{max}}}({sub})"),
            Regexp::CharEscape(c) => write!(f, "Esc({})", *c as char),
            Regexp::CustomCharClass(cc) => {
                write!(f, "Class({}", if cc.invert { "^" } else { "" })?;
                if cc.merged_ranges {
                    for (i, child) in cc.children.iter().enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{child}")?;
                    }
                } else if let Some(chain) = &cc.chain {
                    write!(f, "{chain}")?;
                }
                if cc.plus_dash {
                    write!(f, " Range(---)")?;
                }
                write!(f, ")")
            }
            Regexp::CharRange { left, lo, hi } => {
                if let Some(left) = left {
                    write!(f, "{left} ")?;
                }
                write!(f, "Range({lo}-{hi})")
            }
            Regexp::AltList(children) => {
                write!(f, "AltList(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Regexp::Backref(n) => write!(f, "Backref({n})"),
            Regexp::Lookahead(sub) => write!(f, "Lookahead({sub})"),
            Regexp::InlineZwa(c) => write!(f, "Zwa({})", *c as char),
        }
    }
}
