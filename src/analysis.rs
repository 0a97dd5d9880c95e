//! Static analyses over a compiled program: the epsilon-closure infinite
//! loop check, in-degree computation, and memo-vertex selection.

use tracing::debug;

use crate::compile::CompileError;
use crate::program::{MemoMode, Opcode, Program};

/// Rejects programs that admit an infinite empty-matching loop, e.g.
/// `(a*)*`.
///
/// From every instruction that can start a loop (only branches introduce
/// back-edges), walk all edges that consume no input. Returning to the
/// start instruction means the simulation could spin forever without
/// advancing, which is a fatal pattern error.
pub fn assert_no_infinite_loops(prog: &Program) -> Result<(), CompileError> {
    let mut marks = Marks::new(prog.len());
    for start in 0..prog.len() {
        if could_start_loop(&prog.inst(start as u32).op) {
            marks.clear();
            debug!(start, "checking for empty-string loops");
            if epsilon_closure(prog, &mut marks, start as u32, true) {
                debug!(start, "infinite loop found");
                return Err(CompileError::InfiniteLoop);
            }
        }
    }
    debug!("no infinite loops found");
    Ok(())
}

struct Marks {
    start: Vec<bool>,
    visited: Vec<bool>,
}

impl Marks {
    fn new(len: usize) -> Self {
        Marks {
            start: vec![false; len],
            visited: vec![false; len],
        }
    }

    fn clear(&mut self) {
        self.start.fill(false);
        self.visited.fill(false);
    }
}

fn could_start_loop(op: &Opcode) -> bool {
    matches!(op, Opcode::Jmp(_) | Opcode::Split(..) | Opcode::SplitMany(_))
}

/// True when a cycle back to the start-marked instruction is reachable
/// from `state` without consuming a character.
fn epsilon_closure(prog: &Program, marks: &mut Marks, state: u32, start: bool) -> bool {
    let s = state as usize;
    if marks.start[s] {
        return true;
    }
    if marks.visited[s] {
        // Explored before on this walk; nothing new down there.
        return false;
    }
    if start {
        marks.start[s] = true;
    } else {
        marks.visited[s] = true;
    }

    match &prog.inst(state).op {
        Opcode::Jmp(x) => epsilon_closure(prog, marks, *x, false),
        Opcode::Split(x, y) => {
            epsilon_closure(prog, marks, *x, false) || epsilon_closure(prog, marks, *y, false)
        }
        Opcode::SplitMany(edges) => edges
            .iter()
            .any(|&e| epsilon_closure(prog, marks, e, false)),
        // These all consume a character (or end the walk).
        Opcode::Char(_) | Opcode::Match | Opcode::Any | Opcode::CharClass { .. } => false,
        // Costs nothing, falls through.
        Opcode::Save(_) | Opcode::InlineZeroWidthAssertion(_) => {
            epsilon_closure(prog, marks, state + 1, false)
        }
        // A backreference can match empty, but treating it as consuming
        // keeps the check conservative the same way the simulator is.
        Opcode::StringCompare(_) => false,
        Opcode::RecursiveZeroWidthAssertion => {
            // Zero-width; skip past the body to the matching terminator.
            let end = prog.matching_recursive_match(state);
            epsilon_closure(prog, marks, end + 1, false)
        }
        // Explored from another starting vertex.
        Opcode::RecursiveMatch => false,
    }
}

/// Fills in each instruction's in-degree: branch targets of
/// Jmp/Split/SplitMany plus the fall-through edge of every instruction
/// that advances sequentially.
pub fn compute_in_degrees(prog: &mut Program) {
    let mut in_degrees = vec![0u32; prog.len()];
    for (i, inst) in prog.insts().iter().enumerate() {
        match &inst.op {
            Opcode::Jmp(x) => in_degrees[*x as usize] += 1,
            Opcode::Split(x, y) => {
                in_degrees[*x as usize] += 1;
                in_degrees[*y as usize] += 1;
            }
            Opcode::SplitMany(edges) => {
                for &e in edges {
                    in_degrees[e as usize] += 1;
                }
            }
            // No outgoing edges.
            Opcode::Match | Opcode::RecursiveMatch => {}
            Opcode::Char(_)
            | Opcode::Any
            | Opcode::CharClass { .. }
            | Opcode::Save(_)
            | Opcode::StringCompare(_)
            | Opcode::InlineZeroWidthAssertion(_)
            | Opcode::RecursiveZeroWidthAssertion => in_degrees[i + 1] += 1,
        }
    }
    for (inst, d) in prog.insts_mut().iter_mut().zip(in_degrees) {
        inst.in_degree = d;
    }
}

/// Applies the program's memo-vertex policy: flags the chosen
/// instructions, then numbers them densely in program order and records
/// the count on the program.
pub fn determine_memo_nodes(prog: &mut Program) {
    compute_in_degrees(prog);

    let mode = prog.memo_mode;
    let mut should_memo = vec![false; prog.len()];
    match mode {
        MemoMode::None => {}
        MemoMode::Full => should_memo.fill(true),
        MemoMode::InDegreeGt1 => {
            for (i, inst) in prog.insts().iter().enumerate() {
                should_memo[i] = inst.in_degree > 1;
            }
        }
        MemoMode::LoopDest => {
            // Only back-edge destinations. A Star loop closes with a Jmp
            // back to its split; a Plus loop closes with a Split whose
            // preferred edge (backup edge when non-greedy) points back at
            // the body start. Any branch target at or before the branch
            // itself is a loop head.
            for (i, inst) in prog.insts().iter().enumerate() {
                match &inst.op {
                    Opcode::Jmp(x) => {
                        if *x as usize <= i {
                            should_memo[*x as usize] = true;
                        }
                    }
                    Opcode::Split(x, y) => {
                        for &target in [x, y] {
                            if target as usize <= i {
                                should_memo[target as usize] = true;
                            }
                        }
                    }
                    Opcode::SplitMany(edges) => {
                        for &target in edges {
                            if target as usize <= i {
                                should_memo[target as usize] = true;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let mut next = 0;
    for (inst, flag) in prog.insts_mut().iter_mut().zip(should_memo) {
        inst.memo.should_memo = flag;
        inst.memo.memo_state_num = if flag {
            next += 1;
            next - 1
        } else {
            -1
        };
    }
    prog.n_memoized_states = next as usize;
    debug!(n = prog.n_memoized_states, mode = ?mode, "selected memo vertices");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, compile};
    use crate::parse::parse;
    use crate::program::MemoEncoding;
    use crate::transform::transform;

    fn prog(pattern: &str, mode: MemoMode) -> Program {
        let re = transform(parse(pattern).unwrap());
        compile(&re, &CompileOptions::new(mode, MemoEncoding::None)).unwrap()
    }

    #[test]
    fn accepts_plain_loops() {
        for pattern in ["a*", "(ab)*", "a*b*", "(a+)+", "(a|b)*c", "a{2,}"] {
            assert_no_infinite_loops(&prog(pattern, MemoMode::None)).unwrap_or_else(|e| {
                panic!("{pattern} wrongly rejected: {e}");
            });
        }
    }

    #[test]
    fn rejects_empty_string_cycles() {
        for pattern in ["(a*)*", "(a?)*", "(a*)+", "(a*b*)*", "((a*))*"] {
            assert_eq!(
                assert_no_infinite_loops(&prog(pattern, MemoMode::None)),
                Err(CompileError::InfiniteLoop),
                "{pattern} wrongly accepted"
            );
        }
    }

    #[test]
    fn lookahead_is_skipped_as_zero_width() {
        // The lookahead body consumes, so the outer star is fine.
        assert_no_infinite_loops(&prog("((?=a)b)*", MemoMode::None)).unwrap();
    }

    #[test]
    fn in_degree_counts_fallthrough_and_branches() {
        // a* compiles to: Save0, Split(2,4), Char a, Jmp(1), Save1, Match
        let mut p = prog("a*", MemoMode::None);
        compute_in_degrees(&mut p);
        let degrees: Vec<u32> = p.insts().iter().map(|i| i.in_degree).collect();
        // Split gets the Save fall-through plus the back Jmp.
        assert_eq!(degrees, vec![0, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn full_mode_numbers_every_instruction() {
        let mut p = prog("ab", MemoMode::Full);
        determine_memo_nodes(&mut p);
        assert_eq!(p.n_memoized_states, p.len());
        for (i, inst) in p.insts().iter().enumerate() {
            assert!(inst.memo.should_memo);
            assert_eq!(inst.memo.memo_state_num, i as i32);
        }
    }

    #[test]
    fn none_mode_numbers_nothing() {
        let mut p = prog("ab", MemoMode::None);
        determine_memo_nodes(&mut p);
        assert_eq!(p.n_memoized_states, 0);
        assert!(p.insts().iter().all(|i| i.memo.memo_state_num == -1));
    }

    #[test]
    fn indegree_mode_selects_join_points() {
        let mut p = prog("a*", MemoMode::InDegreeGt1);
        determine_memo_nodes(&mut p);
        // Only the star's split has two predecessors.
        let selected: Vec<usize> = p
            .insts()
            .iter()
            .enumerate()
            .filter(|(_, i)| i.memo.should_memo)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(selected, vec![1]);
        assert_eq!(p.n_memoized_states, 1);
        assert_eq!(p.inst(1).memo.memo_state_num, 0);
    }

    fn selected_states(p: &Program) -> Vec<usize> {
        p.insts()
            .iter()
            .enumerate()
            .filter(|(_, i)| i.memo.should_memo)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn loop_dest_mode_selects_back_edge_targets() {
        // a* closes its loop with a back Jmp to the split.
        let mut p = prog("a*", MemoMode::LoopDest);
        determine_memo_nodes(&mut p);
        assert_eq!(selected_states(&p), vec![1]);

        // a+ closes its loop with the Split's own back-edge; the loop
        // head is the body start, not a Jmp target.
        // Layout: Save(0), Char(a), Split(1,3), Save(1), Match.
        let mut p = prog("a+", MemoMode::LoopDest);
        determine_memo_nodes(&mut p);
        assert_eq!(selected_states(&p), vec![1]);

        // Non-greedy Plus swaps the split edges; the back-edge moves to y.
        let mut p = prog("a+?", MemoMode::LoopDest);
        determine_memo_nodes(&mut p);
        assert_eq!(selected_states(&p), vec![1]);

        // Forward jumps only: nothing selected.
        let mut p = prog("a(b|c)d", MemoMode::LoopDest);
        determine_memo_nodes(&mut p);
        assert_eq!(p.n_memoized_states, 0);
    }

    #[test]
    fn loop_dest_mode_selects_both_heads_of_nested_plus() {
        // (a+)+: inner and outer Plus each close with a back Split.
        // Layout: Save(0), Save(2), Char(a), Split(2,4), Save(3),
        //         Split(1,6), Save(1), Match.
        let mut p = prog("(a+)+", MemoMode::LoopDest);
        determine_memo_nodes(&mut p);
        assert_eq!(selected_states(&p), vec![1, 2]);
        assert_eq!(p.n_memoized_states, 2);
    }

    #[test]
    fn memo_numbering_is_dense_and_ordered() {
        let mut p = prog("(a|b)*c", MemoMode::InDegreeGt1);
        determine_memo_nodes(&mut p);
        let nums: Vec<i32> = p
            .insts()
            .iter()
            .filter(|i| i.memo.should_memo)
            .map(|i| i.memo.memo_state_num)
            .collect();
        assert_eq!(nums, (0..p.n_memoized_states as i32).collect::<Vec<_>>());
    }
}
