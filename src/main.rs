//! `re`: the command-line front end.
//!
//! ```text
//! re {none|full|indeg|loop} {none|neg|rle|rle-tuned}
//!    (-f patternAndStr.json | regexp string [singlerlek k | multiplerlek k1,k2,...])
//! ```
//!
//! Exits 2 on misuse or any fatal engine error, 0 on completion whether or
//! not the input matched.

use std::path::PathBuf;
use std::process;

use clap::{Parser as ClapParser, ValueEnum};
use thiserror::Error;
use tracing::{Level, debug, enabled, info};
use tracing_subscriber::EnvFilter;

use rememo::MAXSUB;
use rememo::analysis::{assert_no_infinite_loops, determine_memo_nodes};
use rememo::backtrack::{BacktrackError, backtrack};
use rememo::compile::{CompileError, CompileOptions, compile};
use rememo::parse::{ParseError, parse};
use rememo::program::{MemoEncoding, MemoMode};
use rememo::query::{load_query, process_escapes};
use rememo::stats;
use rememo::transform::transform;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MemoModeArg {
    None,
    Full,
    Indeg,
    Loop,
}

impl From<MemoModeArg> for MemoMode {
    fn from(arg: MemoModeArg) -> Self {
        match arg {
            MemoModeArg::None => MemoMode::None,
            MemoModeArg::Full => MemoMode::Full,
            MemoModeArg::Indeg => MemoMode::InDegreeGt1,
            MemoModeArg::Loop => MemoMode::LoopDest,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncodingArg {
    None,
    Neg,
    Rle,
    RleTuned,
}

impl From<EncodingArg> for MemoEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::None => MemoEncoding::None,
            EncodingArg::Neg => MemoEncoding::Negative,
            EncodingArg::Rle => MemoEncoding::Rle,
            EncodingArg::RleTuned => MemoEncoding::RleTuned,
        }
    }
}

/// Memoized backtracking regex engine.
#[derive(ClapParser, Debug)]
#[command(name = "re")]
struct Cli {
    /// Memoization strategy: which vertices get memo slots
    #[arg(value_enum)]
    memo_mode: MemoModeArg,
    /// Memo table encoding scheme
    #[arg(value_enum)]
    encoding: EncodingArg,
    /// Read pattern, input, and rleKValue from a JSON file
    #[arg(short = 'f', value_name = "FILE")]
    file: Option<PathBuf>,
    /// The regex pattern (inline mode)
    pattern: Option<String>,
    /// The candidate string (inline mode; C-style escapes apply)
    input: Option<String>,
    /// RLE group widths: `singlerlek <k>` or `multiplerlek <k1,k2,...>`
    #[arg(num_args = 0..)]
    rle_spec: Vec<String>,
}

#[derive(Debug)]
enum RleSpec {
    Single(usize),
    Multiple(Vec<usize>),
}

#[derive(Debug, Error)]
enum FatalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Backtrack(#[from] BacktrackError),
}

fn usage() -> ! {
    eprintln!(
        "usage: re {{none|full|indeg|loop}} {{none|neg|rle|rle-tuned}} \
         (-f patternAndStr.json | regexp string [singlerlek k | multiplerlek k1,k2,...])"
    );
    eprintln!("  The first argument is the memoization strategy");
    eprintln!("  The second argument is the memo table encoding scheme");
    process::exit(2);
}

fn parse_rle_spec(args: &[String]) -> Option<RleSpec> {
    match args {
        [] => Some(RleSpec::Single(1)),
        [kind, value] if kind == "singlerlek" => value.parse().ok().map(RleSpec::Single),
        [kind, values] if kind == "multiplerlek" => values
            .split(',')
            .map(|v| v.parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()
            .map(RleSpec::Multiple),
        _ => None,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let memo_mode = MemoMode::from(cli.memo_mode);
    let memo_encoding = if memo_mode == MemoMode::None {
        // A memo table with no memoized vertices has nothing to encode.
        MemoEncoding::None
    } else {
        MemoEncoding::from(cli.encoding)
    };

    let (pattern, input, rle) = if let Some(path) = &cli.file {
        if cli.pattern.is_some() || cli.input.is_some() || !cli.rle_spec.is_empty() {
            usage();
        }
        let query = match load_query(path) {
            Ok(query) => query,
            Err(err) => {
                eprintln!("re: {err}");
                process::exit(2);
            }
        };
        let k = query.rle_k_value.max(1);
        (query.pattern, query.input, RleSpec::Single(k))
    } else {
        let (Some(pattern), Some(input)) = (cli.pattern, cli.input) else {
            usage();
        };
        let Some(rle) = parse_rle_spec(&cli.rle_spec) else {
            usage();
        };
        (pattern, process_escapes(&input), rle)
    };

    if let Err(err) = run(&pattern, &input, memo_mode, memo_encoding, rle) {
        eprintln!("re: {err}");
        process::exit(2);
    }
}

fn run(
    pattern: &str,
    input: &str,
    memo_mode: MemoMode,
    memo_encoding: MemoEncoding,
    rle: RleSpec,
) -> Result<(), FatalError> {
    let re = parse(pattern)?;
    debug!(%re, "parsed");
    let re = transform(re);
    debug!(%re, "transformed");

    let opts = match rle {
        RleSpec::Single(k) => CompileOptions::new(memo_mode, memo_encoding).single_rle_k(k),
        RleSpec::Multiple(values) => {
            CompileOptions::new(memo_mode, memo_encoding).rle_values(values)
        }
    };
    let mut prog = compile(&re, &opts)?;
    assert_no_infinite_loops(&prog)?;
    determine_memo_nodes(&mut prog);
    info!(n = prog.n_memoized_states, "will memoize states");
    if enabled!(Level::DEBUG) {
        eprintln!("{prog}");
    }

    let outcome = backtrack(&prog, input.as_bytes())?;

    if outcome.matched {
        print!("match");
        // Highest bound slot decides how many groups to show.
        let mut bound = MAXSUB;
        while bound > 0 && outcome.sub[bound - 1].is_none() {
            bound -= 1;
        }
        let mut slot = 0;
        while slot < bound {
            print!(" (");
            match outcome.sub[slot] {
                Some(offset) => print!("{offset}"),
                None => print!("?"),
            }
            print!(",");
            match outcome.sub[slot + 1] {
                Some(offset) => print!("{offset}"),
                None => print!("?"),
            }
            print!(")");
            slot += 2;
        }
        println!();
    } else {
        println!("-no match-");
    }

    stats::report(&prog, &outcome);
    Ok(())
}
