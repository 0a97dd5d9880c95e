//! Compiler from the normalized AST to an instruction [`Program`].
//!
//! Two passes: [`count`] computes the exact instruction budget for a tree,
//! then the emitter writes instructions into a pre-sized buffer through an
//! explicit cursor. Branch placeholders are pushed first and patched once
//! their targets are known, so every edge ends up as a plain index.

use thiserror::Error;

use crate::ast::{ClassAtom, Regexp};
use crate::program::{ClassRange, Inst, MemoEncoding, MemoMode, Opcode, Program};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A node the transform passes should have rewritten reached the
    /// emitter.
    #[error("cannot compile {0} node; the transform passes must run first")]
    Untransformed(&'static str),
    #[error("malformed character-class range")]
    MalformedClassRange,
    /// The program admits an empty-string cycle, e.g. `(a*)*`.
    #[error("infinite loop possible due to nested *s like (a*)*")]
    InfiniteLoop,
}

/// Compilation settings. The memo mode and encoding are recorded on the
/// program; the RLE group widths seed each instruction's visit interval
/// when the tuned encoding is selected.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub memo_mode: MemoMode,
    pub memo_encoding: MemoEncoding,
    /// Group width shared by all memo vectors under `rle-tuned`.
    pub single_rle_k: usize,
    /// Per-state group widths; missing entries fall back to 1.
    pub rle_values: Option<Vec<usize>>,
}

impl CompileOptions {
    pub fn new(memo_mode: MemoMode, memo_encoding: MemoEncoding) -> Self {
        CompileOptions {
            memo_mode,
            memo_encoding,
            single_rle_k: 1,
            rle_values: None,
        }
    }

    pub fn single_rle_k(mut self, k: usize) -> Self {
        self.single_rle_k = k;
        self
    }

    pub fn rle_values(mut self, values: Vec<usize>) -> Self {
        self.rle_values = Some(values);
        self
    }
}

/// Compiles a normalized AST into a program ending in `Match`.
pub fn compile(re: &Regexp, opts: &CompileOptions) -> Result<Program, CompileError> {
    let n = count(re) + 1;
    let mut emitter = Emitter {
        insts: Vec::with_capacity(n),
    };
    emitter.emit(re)?;
    emitter.push(Opcode::Match);
    let mut insts = emitter.insts;
    debug_assert_eq!(insts.len(), n, "count() disagreed with emit()");

    for (i, inst) in insts.iter_mut().enumerate() {
        inst.state_num = i as u32;
        inst.memo.visit_interval = if opts.memo_encoding == MemoEncoding::RleTuned {
            match &opts.rle_values {
                Some(values) => values.get(i).copied().unwrap_or(1).max(1),
                None => opts.single_rle_k.max(1),
            }
        } else {
            1
        };
    }

    Ok(Program::new(
        insts,
        opts.memo_mode,
        opts.memo_encoding,
        re.ends_with_eol_anchor(),
    ))
}

/// How many instructions `re` compiles to.
pub fn count(re: &Regexp) -> usize {
    match re {
        Regexp::Alt(l, r) => 2 + count(l) + count(r),
        // A SplitMany, then one trailing Jmp per branch.
        Regexp::AltList(children) => 1 + children.iter().map(|c| count(c) + 1).sum::<usize>(),
        Regexp::Cat(l, r) => count(l) + count(r),
        Regexp::Lit(_)
        | Regexp::Dot
        | Regexp::CharEscape(_)
        | Regexp::CustomCharClass(_)
        | Regexp::Backref(_)
        | Regexp::InlineZwa(_) => 1,
        Regexp::Paren(_, sub) => 2 + count(sub),
        Regexp::Quest { sub, .. } => 1 + count(sub),
        Regexp::Star { sub, .. } => 2 + count(sub),
        Regexp::Plus { sub, .. } => 1 + count(sub),
        Regexp::Lookahead(sub) => 2 + count(sub),
        // The emitter rejects these before the total matters.
        Regexp::Curly { .. } | Regexp::CharRange { .. } => 1,
    }
}

struct Emitter {
    insts: Vec<Inst>,
}

impl Emitter {
    fn pc(&self) -> u32 {
        self.insts.len() as u32
    }

    fn push(&mut self, op: Opcode) -> usize {
        self.insts.push(Inst::new(op));
        self.insts.len() - 1
    }

    fn patch_split(&mut self, slot: usize, x: u32, y: u32, greedy: bool) {
        self.insts[slot].op = if greedy {
            Opcode::Split(x, y)
        } else {
            Opcode::Split(y, x)
        };
    }

    fn patch_jmp(&mut self, slot: usize, x: u32) {
        self.insts[slot].op = Opcode::Jmp(x);
    }

    fn emit(&mut self, re: &Regexp) -> Result<(), CompileError> {
        match re {
            Regexp::Alt(l, r) => {
                let split = self.push(Opcode::Split(0, 0));
                self.emit(l)?;
                let jmp = self.push(Opcode::Jmp(0));
                self.patch_split(split, split as u32 + 1, self.pc(), true);
                self.emit(r)?;
                self.patch_jmp(jmp, self.pc());
            }
            Regexp::AltList(children) => {
                let split = self.push(Opcode::SplitMany(Vec::new()));
                let mut edges = Vec::with_capacity(children.len());
                let mut jmps = Vec::with_capacity(children.len());
                for child in children {
                    edges.push(self.pc());
                    self.emit(child)?;
                    jmps.push(self.push(Opcode::Jmp(0)));
                }
                let end = self.pc();
                for jmp in jmps {
                    self.patch_jmp(jmp, end);
                }
                self.insts[split].op = Opcode::SplitMany(edges);
            }
            Regexp::Cat(l, r) => {
                self.emit(l)?;
                self.emit(r)?;
            }
            Regexp::Lit(c) => {
                self.push(Opcode::Char(*c));
            }
            Regexp::Dot => {
                self.push(Opcode::Any);
            }
            Regexp::CustomCharClass(cc) => {
                if !cc.merged_ranges {
                    return Err(CompileError::Untransformed("an unmerged char class"));
                }
                let mut ranges = Vec::with_capacity(cc.children.len() + 1);
                for child in &cc.children {
                    let Regexp::CharRange { lo, hi, .. } = child else {
                        return Err(CompileError::Untransformed("a char-class child"));
                    };
                    ranges.push(class_range(*lo, *hi)?);
                }
                if cc.plus_dash {
                    ranges.push(ClassRange::single(b'-', b'-'));
                }
                self.push(Opcode::CharClass {
                    ranges,
                    invert: cc.invert,
                });
            }
            Regexp::CharEscape(c) => {
                self.push(Opcode::CharClass {
                    ranges: vec![escape_class_range(*c)],
                    invert: false,
                });
            }
            Regexp::Paren(n, sub) => {
                self.push(Opcode::Save(2 * n));
                self.emit(sub)?;
                self.push(Opcode::Save(2 * n + 1));
            }
            Regexp::Quest { greedy, sub } => {
                let split = self.push(Opcode::Split(0, 0));
                self.emit(sub)?;
                self.patch_split(split, split as u32 + 1, self.pc(), *greedy);
            }
            Regexp::Star { greedy, sub } => {
                let split = self.push(Opcode::Split(0, 0));
                self.emit(sub)?;
                // Back-edge to the split.
                self.push(Opcode::Jmp(split as u32));
                self.patch_split(split, split as u32 + 1, self.pc(), *greedy);
            }
            Regexp::Plus { greedy, sub } => {
                let start = self.pc();
                self.emit(sub)?;
                let split = self.push(Opcode::Split(0, 0));
                self.patch_split(split, start, self.pc(), *greedy);
            }
            Regexp::Backref(n) => {
                self.push(Opcode::StringCompare(*n));
            }
            Regexp::Lookahead(sub) => {
                self.push(Opcode::RecursiveZeroWidthAssertion);
                self.emit(sub)?;
                self.push(Opcode::RecursiveMatch);
            }
            Regexp::InlineZwa(c) => {
                self.push(Opcode::InlineZeroWidthAssertion(*c));
            }
            Regexp::Curly { .. } => {
                return Err(CompileError::Untransformed("a curly repetition"));
            }
            Regexp::CharRange { .. } => {
                return Err(CompileError::Untransformed("a bare char range"));
            }
        }
        Ok(())
    }
}

fn class_range(lo: ClassAtom, hi: ClassAtom) -> Result<ClassRange, CompileError> {
    match (lo, hi) {
        (ClassAtom::Lit(lo), ClassAtom::Lit(hi)) => Ok(ClassRange::single(lo, hi)),
        (ClassAtom::Escape(a), ClassAtom::Escape(b)) if a == b => Ok(escape_class_range(a)),
        _ => Err(CompileError::MalformedClassRange),
    }
}

/// The single-byte range set an escape stands for. Upper-case escapes
/// invert their lower-case set; unknown escapes are the literal character.
fn escape_class_range(c: u8) -> ClassRange {
    match c {
        // space, newline, tab, vertical whitespace, and the separators
        b's' | b'S' => ClassRange {
            spans: vec![(9, 13), (28, 32)],
            invert: c.is_ascii_uppercase(),
        },
        b'w' | b'W' => ClassRange {
            spans: vec![(b'a', b'z'), (b'A', b'Z'), (b'0', b'9')],
            invert: c.is_ascii_uppercase(),
        },
        b'd' | b'D' => ClassRange {
            spans: vec![(b'0', b'9')],
            invert: c.is_ascii_uppercase(),
        },
        b'n' | b'r' => ClassRange::single(b'\n', b'\n'),
        b't' => ClassRange::single(b'\t', b'\t'),
        b'f' => ClassRange::single(0x0c, 0x0c),
        b'v' => ClassRange::single(0x0b, 0x0b),
        _ => ClassRange::single(c, c),
    }
}
