//! # rememo
//!
//! **rememo** is a backtracking regular expression engine instrumented for
//! memoization research. It compiles a pattern to a small VM program and
//! simulates it by depth-first backtracking; a memo table over (vertex,
//! input offset) search states turns catastrophic exponential backtracking
//! into a polynomial worst case.
//!
//! ## Pipeline
//!
//! pattern text → AST ([`parse`]) → normalized AST ([`transform`]) →
//! [`program::Program`] ([`compile`]) → loop check and memo-vertex
//! selection ([`analysis`]) → simulation ([`backtrack`]) → match result
//! plus statistics ([`stats`]).
//!
//! ## Usage
//!
//! ```rust
//! use rememo::analysis::{assert_no_infinite_loops, determine_memo_nodes};
//! use rememo::compile::{compile, CompileOptions};
//! use rememo::program::{MemoEncoding, MemoMode};
//!
//! let re = rememo::transform::transform(rememo::parse::parse("a(b|c)d").unwrap());
//! let opts = CompileOptions::new(MemoMode::Full, MemoEncoding::None);
//! let mut prog = compile(&re, &opts).unwrap();
//! assert_no_infinite_loops(&prog).unwrap();
//! determine_memo_nodes(&mut prog);
//!
//! let outcome = rememo::backtrack::backtrack(&prog, b"abd").unwrap();
//! assert!(outcome.matched);
//! assert_eq!(outcome.sub[0], Some(0));
//! assert_eq!(outcome.sub[1], Some(3));
//! ```
//!
//! ## Crate Organization
//!
//! - `ast` / `parse` / `transform`: the regex tree and its rewrite passes
//! - `program` / `compile` / `analysis`: the instruction program, its
//!   compiler, and the static checks over it
//! - `rle` / `memo`: the memo-table encodings
//! - `backtrack` / `stats`: the simulator and its reports
//! - `query`: JSON query files and inline-input escapes

pub mod analysis;
pub mod ast;
pub mod backtrack;
pub mod compile;
pub mod memo;
pub mod parse;
pub mod program;
pub mod query;
pub mod rle;
pub mod stats;
pub mod transform;

/// Capture slots per match: ten groups, two offsets each.
pub const MAXSUB: usize = 20;

pub use ast::Regexp;
pub use program::Program;
