//! Post-simulation statistics.
//!
//! After every match or fail the engine reports twice: human-readable
//! summary lines on stdout (most-visited search state, most-visited
//! vertex, per-vector RLE run counts) and a single-line JSON object on
//! stderr with the input, simulation, and memoization numbers. The
//! polynomial-bound and negative-encoding consistency assertions run
//! here, on the freshly filled tables.

use serde::Serialize;

use crate::backtrack::{Outcome, VisitTable};
use crate::program::{MemoEncoding, MemoMode, Program};

#[derive(Debug, Serialize)]
struct InputInfo {
    #[serde(rename = "nStates")]
    n_states: usize,
    #[serde(rename = "lenW")]
    len_w: usize,
}

#[derive(Debug, Serialize)]
struct SimulationInfo {
    #[serde(rename = "nTotalVisits")]
    n_total_visits: u64,
    #[serde(rename = "nPossibleTotalVisitsWithMemoization")]
    n_possible_total_visits: u64,
    #[serde(rename = "visitsToMostVisitedSearchState")]
    visits_to_most_visited_search_state: u32,
    #[serde(rename = "visitsToMostVisitedVertex")]
    visits_to_most_visited_vertex: u64,
}

#[derive(Debug, Serialize)]
struct MemoConfig {
    #[serde(rename = "vertexSelection")]
    vertex_selection: &'static str,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct MemoResults {
    #[serde(rename = "nSelectedVertices")]
    n_selected_vertices: usize,
    #[serde(rename = "lenW")]
    len_w: usize,
    #[serde(rename = "maxObservedCostPerMemoizedVertex")]
    max_observed_cost_per_memoized_vertex: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct MemoInfoSummary {
    config: MemoConfig,
    results: MemoResults,
}

/// The structured summary emitted to stderr as one JSON line.
#[derive(Debug, Serialize)]
pub struct Summary {
    #[serde(rename = "inputInfo")]
    input_info: InputInfo,
    #[serde(rename = "simulationInfo")]
    simulation_info: SimulationInfo,
    #[serde(rename = "memoizationInfo")]
    memoization_info: MemoInfoSummary,
}

/// Aggregates computed from the visit table.
struct VisitSummary {
    total: u64,
    max_per_search_state: u32,
    hottest_vertex_of_search_state: usize,
    hottest_offset: usize,
    max_per_vertex: u64,
    hottest_vertex: usize,
    per_vertex: Vec<u64>,
}

fn summarize_visits(table: &VisitTable) -> VisitSummary {
    let mut summary = VisitSummary {
        total: 0,
        max_per_search_state: 0,
        hottest_vertex_of_search_state: 0,
        hottest_offset: 0,
        max_per_vertex: 0,
        hottest_vertex: 0,
        per_vertex: vec![0; table.n_states()],
    };
    for state in 0..table.n_states() {
        for offset in 0..table.n_chars() {
            let count = table.count(state, offset);
            summary.per_vertex[state] += u64::from(count);
            summary.total += u64::from(count);
            if count > summary.max_per_search_state {
                summary.max_per_search_state = count;
                summary.hottest_vertex_of_search_state = state;
                summary.hottest_offset = offset;
            }
        }
        if summary.per_vertex[state] > summary.max_per_vertex {
            summary.max_per_vertex = summary.per_vertex[state];
            summary.hottest_vertex = state;
        }
    }
    summary
}

/// Builds the JSON summary for a finished simulation.
pub fn summarize(prog: &Program, outcome: &Outcome) -> Summary {
    let visits = summarize_visits(&outcome.visit_table);
    let table = &outcome.visit_table;

    let (n_selected, costs) = match &outcome.memo {
        Some(memo) => (memo.n_states(), memo.observed_costs()),
        None => (0, Vec::new()),
    };

    Summary {
        input_info: InputInfo {
            n_states: table.n_states(),
            len_w: table.n_chars(),
        },
        simulation_info: SimulationInfo {
            n_total_visits: visits.total,
            n_possible_total_visits: (table.n_states() * table.n_chars()) as u64,
            visits_to_most_visited_search_state: visits.max_per_search_state,
            visits_to_most_visited_vertex: visits.max_per_vertex,
        },
        memoization_info: MemoInfoSummary {
            config: MemoConfig {
                vertex_selection: prog.memo_mode.label(),
                encoding: prog.memo_encoding.label(),
            },
            results: MemoResults {
                n_selected_vertices: n_selected,
                len_w: table.n_chars(),
                max_observed_cost_per_memoized_vertex: costs,
            },
        },
    }
}

/// Prints the human summary to stdout and the JSON summary to stderr,
/// then checks the invariants the tables must satisfy.
pub fn report(prog: &Program, outcome: &Outcome) {
    let visits = summarize_visits(&outcome.visit_table);
    let table = &outcome.visit_table;

    println!(
        "STATS: Most-visited search state: <{}, {}> ({} visits)",
        visits.hottest_vertex_of_search_state, visits.hottest_offset, visits.max_per_search_state
    );
    println!(
        "STATS: Most-visited vertex: {} ({} visits over all its search states)",
        visits.hottest_vertex, visits.max_per_vertex
    );

    // Proved: under these policies no search state is evaluated twice.
    if matches!(prog.memo_mode, MemoMode::Full | MemoMode::InDegreeGt1) {
        assert!(visits.max_per_search_state <= 1);
    }

    if let Some(memo) = &outcome.memo {
        match memo.encoding() {
            MemoEncoding::None => {
                println!(
                    "STATS: No encoding, so all memoized vertices paid the full cost of |w| = {} slots",
                    memo.n_chars()
                );
            }
            MemoEncoding::Negative => {
                println!(
                    "STATS: {} slots used (out of {} possible)",
                    memo.slots_used(),
                    memo.n_states() * memo.n_chars()
                );
                memo.assert_consistent();
            }
            MemoEncoding::Rle | MemoEncoding::RleTuned => {
                if let Some(vectors) = memo.rle_vectors() {
                    for (i, vec) in vectors.iter().enumerate() {
                        println!(
                            "STATS: vector {} has {} runs (max observed during execution: {}, max possible: {})",
                            i,
                            vec.curr_size(),
                            vec.max_observed_size(),
                            (memo.n_chars() / 2) + 1
                        );
                    }
                }
            }
        }
    }

    let summary = summarize(prog, outcome);
    eprintln!(
        "{}",
        serde_json::to_string(&summary).expect("summary serializes")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::determine_memo_nodes;
    use crate::backtrack::backtrack;
    use crate::compile::{CompileOptions, compile};
    use crate::parse::parse;
    use crate::transform::transform;

    fn outcome(
        pattern: &str,
        input: &str,
        mode: MemoMode,
        encoding: MemoEncoding,
    ) -> (Program, Outcome) {
        let re = transform(parse(pattern).unwrap());
        let mut prog = compile(&re, &CompileOptions::new(mode, encoding)).unwrap();
        determine_memo_nodes(&mut prog);
        let out = backtrack(&prog, input.as_bytes()).unwrap();
        (prog, out)
    }

    #[test]
    fn summary_counts_every_visit() {
        let (prog, out) = outcome("abc", "abc", MemoMode::None, MemoEncoding::None);
        let summary = summarize(&prog, &out);
        // One pass straight through: every instruction visited once.
        assert_eq!(summary.simulation_info.n_total_visits, prog.len() as u64);
        assert_eq!(
            summary.input_info.n_states * summary.input_info.len_w,
            summary.simulation_info.n_possible_total_visits as usize
        );
    }

    #[test]
    fn summary_reports_selected_vertices_and_costs() {
        let (prog, out) = outcome(
            "(a|b)*c",
            "ababc",
            MemoMode::InDegreeGt1,
            MemoEncoding::Negative,
        );
        let summary = summarize(&prog, &out);
        assert_eq!(
            summary.memoization_info.results.n_selected_vertices,
            prog.n_memoized_states
        );
        assert_eq!(
            summary
                .memoization_info
                .results
                .max_observed_cost_per_memoized_vertex
                .len(),
            prog.n_memoized_states
        );
        assert_eq!(summary.memoization_info.config.vertex_selection, "INDEG>1");
        assert_eq!(summary.memoization_info.config.encoding, "NEGATIVE");
    }

    #[test]
    fn summary_serializes_to_one_line() {
        let (prog, out) = outcome("a*", "aaa", MemoMode::Full, MemoEncoding::Rle);
        let json = serde_json::to_string(&summarize(&prog, &out)).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"inputInfo\""));
        assert!(json.contains("\"simulationInfo\""));
        assert!(json.contains("\"memoizationInfo\""));
        assert!(json.contains("\"maxObservedCostPerMemoizedVertex\""));
    }

    #[test]
    fn report_asserts_the_memo_bound() {
        // Just exercising the assertion paths; they must not fire.
        for (mode, encoding) in [
            (MemoMode::Full, MemoEncoding::None),
            (MemoMode::Full, MemoEncoding::Negative),
            (MemoMode::InDegreeGt1, MemoEncoding::Rle),
        ] {
            let (prog, out) = outcome("(a|b)*c", "abbac", mode, encoding);
            report(&prog, &out);
        }
    }
}
