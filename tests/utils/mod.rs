use regex as rust_regex;

use rememo::analysis::{assert_no_infinite_loops, determine_memo_nodes};
use rememo::backtrack::{Outcome, backtrack};
use rememo::compile::{CompileOptions, compile};
use rememo::parse::parse;
use rememo::program::{MemoEncoding, MemoMode, Opcode, Program};
use rememo::transform::transform;

pub const MEMO_MODES: [MemoMode; 3] = [MemoMode::Full, MemoMode::InDegreeGt1, MemoMode::LoopDest];
pub const ENCODINGS: [MemoEncoding; 4] = [
    MemoEncoding::None,
    MemoEncoding::Negative,
    MemoEncoding::Rle,
    MemoEncoding::RleTuned,
];

/// Full pipeline: parse, normalize, compile, loop-check, memo-mark.
pub fn build(pattern: &str, mode: MemoMode, encoding: MemoEncoding) -> Program {
    let re = transform(parse(pattern).expect("pattern parses"));
    // A non-trivial shared width exercises the tuned encoding's grouping.
    let k = if encoding == MemoEncoding::RleTuned { 3 } else { 1 };
    let opts = CompileOptions::new(mode, encoding).single_rle_k(k);
    let mut prog = compile(&re, &opts).expect("pattern compiles");
    assert_no_infinite_loops(&prog).expect("no empty-string loops");
    determine_memo_nodes(&mut prog);
    prog
}

pub fn run(pattern: &str, input: &str, mode: MemoMode, encoding: MemoEncoding) -> Outcome {
    let prog = build(pattern, mode, encoding);
    backtrack(&prog, input.as_bytes()).expect("simulation completes")
}

/// Match outcome and capture offsets must be identical across every
/// memo-mode x encoding combination, including the unmemoized baseline.
/// Returns the baseline outcome.
pub fn check_all_configs(pattern: &str, input: &str) -> Outcome {
    let baseline = run(pattern, input, MemoMode::None, MemoEncoding::None);
    check_loop_dest_selection(pattern);
    for mode in MEMO_MODES {
        for encoding in ENCODINGS {
            let out = run(pattern, input, mode, encoding);
            assert_eq!(
                out.matched, baseline.matched,
                "match diverged for {pattern:?} on {input:?} under {mode:?}/{encoding:?}"
            );
            assert_eq!(
                out.sub, baseline.sub,
                "captures diverged for {pattern:?} on {input:?} under {mode:?}/{encoding:?}"
            );
            if matches!(mode, MemoMode::Full | MemoMode::InDegreeGt1) {
                assert_visits_at_most_once(&out, pattern, input);
            }
            if let Some(memo) = &out.memo {
                memo.assert_consistent();
            }
        }
    }
    baseline
}

/// The loop-destination policy must select a vertex whenever the program
/// has any backward branch target — Star loops close with a Jmp, Plus
/// loops with a Split, and both kinds of head need a memo slot.
fn check_loop_dest_selection(pattern: &str) {
    let prog = build(pattern, MemoMode::LoopDest, MemoEncoding::None);
    let has_back_edge = prog.insts().iter().enumerate().any(|(i, inst)| match &inst.op {
        Opcode::Jmp(x) => *x as usize <= i,
        Opcode::Split(x, y) => *x as usize <= i || *y as usize <= i,
        Opcode::SplitMany(edges) => edges.iter().any(|&e| e as usize <= i),
        _ => false,
    });
    assert_eq!(
        prog.n_memoized_states > 0,
        has_back_edge,
        "loop-dest selection out of step with the program's back-edges for {pattern:?}"
    );
}

pub fn assert_visits_at_most_once(out: &Outcome, pattern: &str, input: &str) {
    for state in 0..out.visit_table.n_states() {
        for offset in 0..out.visit_table.n_chars() {
            let count = out.visit_table.count(state, offset);
            assert!(
                count <= 1,
                "search state <{state}, {offset}> visited {count} times \
                 for {pattern:?} on {input:?}"
            );
        }
    }
}

/// Compare the unmemoized engine against rust-regex on a start-anchored
/// rendering of the pattern. Only valid for patterns rust-regex accepts
/// (no backreferences or lookahead).
pub fn check_against_oracle(pattern: &str, input: &str) {
    let oracle =
        rust_regex::Regex::new(&format!("^(?:{pattern})")).expect("oracle accepts pattern");
    let ours = run(pattern, input, MemoMode::None, MemoEncoding::None);

    match oracle.captures(input) {
        Some(caps) => {
            assert!(
                ours.matched,
                "oracle matched {pattern:?} on {input:?}, we did not"
            );
            let whole = caps.get(0).unwrap();
            assert_eq!(
                (ours.sub[0], ours.sub[1]),
                (Some(whole.start()), Some(whole.end())),
                "whole-match bounds diverged for {pattern:?} on {input:?}"
            );
            for group in 1..caps.len() {
                let oracle_span = caps.get(group).map(|m| (m.start(), m.end()));
                let our_span = match (ours.sub[2 * group], ours.sub[2 * group + 1]) {
                    (Some(start), Some(end)) => Some((start, end)),
                    _ => None,
                };
                assert_eq!(
                    our_span, oracle_span,
                    "group {group} diverged for {pattern:?} on {input:?}"
                );
            }
        }
        None => {
            assert!(
                !ours.matched,
                "we matched {pattern:?} on {input:?}, the oracle did not"
            );
        }
    }
}
