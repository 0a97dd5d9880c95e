//! The memoized backtracking simulator.
//!
//! Threads here are user-level continuations on an explicit LIFO stack: a
//! `Split` queues its backup branch and runs its preferred branch in
//! place, so the search is depth-first and greedy-first, deterministically.
//! Before dispatching each instruction the simulator consults the memo
//! table; a search state that was explored before must have failed (a
//! success returns immediately), so the thread is cut short.
//!
//! A dense visit table counts every (state, offset) evaluation. It exists
//! purely for the statistics report and the polynomial-bound assertion;
//! correctness never reads it.

use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::MAXSUB;
use crate::memo::Memo;
use crate::program::{MemoMode, Opcode, Program};

/// Capture-group snapshot shared between threads.
///
/// `Split` hands both branches the same snapshot; `Save` writes through
/// [`Rc::make_mut`], cloning only when the snapshot is shared. That is the
/// whole copy-on-write story.
pub type Sub = Rc<[Option<usize>; MAXSUB]>;

/// Ceiling on simultaneously queued threads. The stack itself grows on
/// demand; exceeding the ceiling is a fatal runaway-pattern signal.
pub const MAX_THREADS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BacktrackError {
    #[error("backtrack overflow: more than {0} queued threads")]
    StackOverflow(usize),
}

/// A suspended continuation: resume at `pc` with the input cursor at `sp`.
struct Thread {
    pc: u32,
    sp: usize,
    sub: Sub,
}

/// Per-search-state visit counters, `len x (|input|+1)`.
pub struct VisitTable {
    vectors: Vec<Vec<u32>>,
    n_chars: usize,
}

impl VisitTable {
    fn new(n_states: usize, n_chars: usize) -> Self {
        VisitTable {
            vectors: vec![vec![0; n_chars]; n_states],
            n_chars,
        }
    }

    fn mark(&mut self, state: u32, offset: usize) {
        trace!(state, offset, "visit");
        if self.vectors[state as usize][offset] > 0 {
            trace!(state, offset, "already visited this search state");
        }
        self.vectors[state as usize][offset] += 1;
    }

    pub fn count(&self, state: usize, offset: usize) -> u32 {
        self.vectors[state][offset]
    }

    pub fn n_states(&self) -> usize {
        self.vectors.len()
    }

    pub fn n_chars(&self) -> usize {
        self.n_chars
    }
}

/// What a simulation run produced: the match flag, the capture slots, and
/// the tables the statistics report reads.
pub struct Outcome {
    pub matched: bool,
    pub sub: [Option<usize>; MAXSUB],
    pub visit_table: VisitTable,
    pub memo: Option<Memo>,
}

/// Runs `prog` against `input` with the default thread ceiling.
pub fn backtrack(prog: &Program, input: &[u8]) -> Result<Outcome, BacktrackError> {
    backtrack_with_stack_limit(prog, input, MAX_THREADS)
}

/// Runs `prog` against `input`, failing if more than `limit` threads are
/// ever queued at once.
pub fn backtrack_with_stack_limit(
    prog: &Program,
    input: &[u8],
    limit: usize,
) -> Result<Outcome, BacktrackError> {
    let n_chars = input.len() + 1;
    let mut visit_table = VisitTable::new(prog.len(), n_chars);
    let mut memo = (prog.memo_mode != MemoMode::None).then(|| Memo::new(prog, n_chars));

    debug!(len = prog.len(), input_len = input.len(), "backtrack: simulation begins");

    let mut ready: Vec<Thread> = Vec::new();
    ready.push(Thread {
        pc: 0,
        sp: 0,
        sub: Rc::new([None; MAXSUB]),
    });

    'threads: while let Some(thread) = ready.pop() {
        let Thread { mut pc, mut sp, mut sub } = thread;
        // Run this thread to completion.
        loop {
            let inst = prog.inst(pc);
            trace!(
                state = inst.state_num,
                memo_state = inst.memo.memo_state_num,
                offset = sp,
                "search state"
            );

            if let Some(memo) = &mut memo {
                if inst.memo.memo_state_num >= 0 {
                    let q = inst.memo.memo_state_num as u32;
                    if memo.is_marked(q, sp) {
                        // We return on the first match, so the prior visit
                        // must have failed. Cut the thread short.
                        assert!(inst.op != Opcode::Match);
                        continue 'threads;
                    }
                    memo.mark(q, sp);
                }
            }

            visit_table.mark(inst.state_num, sp);

            match &inst.op {
                Opcode::Char(c) => {
                    if input.get(sp) != Some(c) {
                        continue 'threads;
                    }
                    pc += 1;
                    sp += 1;
                }
                Opcode::Any => {
                    if sp >= input.len() {
                        continue 'threads;
                    }
                    pc += 1;
                    sp += 1;
                }
                Opcode::Match => {
                    return Ok(Outcome {
                        matched: true,
                        sub: *sub,
                        visit_table,
                        memo,
                    });
                }
                Opcode::Jmp(x) => pc = *x,
                Opcode::Split(x, y) => {
                    if ready.len() >= limit {
                        return Err(BacktrackError::StackOverflow(limit));
                    }
                    ready.push(Thread {
                        pc: *y,
                        sp,
                        sub: Rc::clone(&sub),
                    });
                    pc = *x;
                }
                Opcode::SplitMany(edges) => {
                    let Some((&first, rest)) = edges.split_first() else {
                        continue 'threads;
                    };
                    for &e in rest.iter().rev() {
                        if ready.len() >= limit {
                            return Err(BacktrackError::StackOverflow(limit));
                        }
                        ready.push(Thread {
                            pc: e,
                            sp,
                            sub: Rc::clone(&sub),
                        });
                    }
                    pc = first;
                }
                Opcode::Save(n) => {
                    Rc::make_mut(&mut sub)[*n] = Some(sp);
                    pc += 1;
                }
                Opcode::CharClass { ranges, invert } => {
                    let Some(&c) = input.get(sp) else {
                        continue 'threads;
                    };
                    let inside = ranges.iter().any(|r| r.contains(c));
                    if inside == *invert {
                        continue 'threads;
                    }
                    pc += 1;
                    sp += 1;
                }
                Opcode::StringCompare(group) => match (sub[2 * group], sub[2 * group + 1]) {
                    (Some(start), Some(end)) => {
                        let captured = &input[start..end];
                        if input[sp..].starts_with(captured) {
                            sp += captured.len();
                            pc += 1;
                        } else {
                            continue 'threads;
                        }
                    }
                    // A backreference to an unbound group matches empty.
                    _ => pc += 1,
                },
                Opcode::InlineZeroWidthAssertion(c) => {
                    let holds = match c {
                        b'^' => sp == 0,
                        b'$' => sp == input.len(),
                        _ => false,
                    };
                    if !holds {
                        continue 'threads;
                    }
                    pc += 1;
                }
                Opcode::RecursiveZeroWidthAssertion => {
                    let end = prog.matching_recursive_match(pc);
                    if lookahead_matches(prog, pc + 1, sp, input, &sub, limit)? {
                        pc = end + 1;
                    } else {
                        continue 'threads;
                    }
                }
                // Only meaningful inside a lookahead simulation.
                Opcode::RecursiveMatch => continue 'threads,
            }
        }
    }

    Ok(Outcome {
        matched: false,
        sub: [None; MAXSUB],
        visit_table,
        memo,
    })
}

/// Nested simulation for a lookahead body, accepting at `RecursiveMatch`.
///
/// The assertion is zero-width: the caller keeps its own cursor and
/// captures, so nothing recorded in here escapes, and neither the memo
/// table nor the visit table sees these evaluations.
fn lookahead_matches(
    prog: &Program,
    start_pc: u32,
    start_sp: usize,
    input: &[u8],
    sub: &Sub,
    limit: usize,
) -> Result<bool, BacktrackError> {
    let mut ready = vec![Thread {
        pc: start_pc,
        sp: start_sp,
        sub: Rc::clone(sub),
    }];

    'threads: while let Some(thread) = ready.pop() {
        let Thread { mut pc, mut sp, mut sub } = thread;
        loop {
            match &prog.inst(pc).op {
                Opcode::Char(c) => {
                    if input.get(sp) != Some(c) {
                        continue 'threads;
                    }
                    pc += 1;
                    sp += 1;
                }
                Opcode::Any => {
                    if sp >= input.len() {
                        continue 'threads;
                    }
                    pc += 1;
                    sp += 1;
                }
                Opcode::RecursiveMatch => return Ok(true),
                // The program's final Match lies outside the body.
                Opcode::Match => continue 'threads,
                Opcode::Jmp(x) => pc = *x,
                Opcode::Split(x, y) => {
                    if ready.len() >= limit {
                        return Err(BacktrackError::StackOverflow(limit));
                    }
                    ready.push(Thread {
                        pc: *y,
                        sp,
                        sub: Rc::clone(&sub),
                    });
                    pc = *x;
                }
                Opcode::SplitMany(edges) => {
                    let Some((&first, rest)) = edges.split_first() else {
                        continue 'threads;
                    };
                    for &e in rest.iter().rev() {
                        if ready.len() >= limit {
                            return Err(BacktrackError::StackOverflow(limit));
                        }
                        ready.push(Thread {
                            pc: e,
                            sp,
                            sub: Rc::clone(&sub),
                        });
                    }
                    pc = first;
                }
                Opcode::Save(n) => {
                    Rc::make_mut(&mut sub)[*n] = Some(sp);
                    pc += 1;
                }
                Opcode::CharClass { ranges, invert } => {
                    let Some(&c) = input.get(sp) else {
                        continue 'threads;
                    };
                    let inside = ranges.iter().any(|r| r.contains(c));
                    if inside == *invert {
                        continue 'threads;
                    }
                    pc += 1;
                    sp += 1;
                }
                Opcode::StringCompare(group) => match (sub[2 * group], sub[2 * group + 1]) {
                    (Some(start), Some(end)) => {
                        let captured = &input[start..end];
                        if input[sp..].starts_with(captured) {
                            sp += captured.len();
                            pc += 1;
                        } else {
                            continue 'threads;
                        }
                    }
                    _ => pc += 1,
                },
                Opcode::InlineZeroWidthAssertion(c) => {
                    let holds = match c {
                        b'^' => sp == 0,
                        b'$' => sp == input.len(),
                        _ => false,
                    };
                    if !holds {
                        continue 'threads;
                    }
                    pc += 1;
                }
                Opcode::RecursiveZeroWidthAssertion => {
                    let end = prog.matching_recursive_match(pc);
                    if lookahead_matches(prog, pc + 1, sp, input, &sub, limit)? {
                        pc = end + 1;
                    } else {
                        continue 'threads;
                    }
                }
            }
        }
    }
    Ok(false)
}
