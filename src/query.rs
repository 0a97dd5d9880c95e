//! Query input: the `-f file.json` loader and the C-style escape
//! processing applied to inline input strings.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("cannot read query file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed query file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A pattern/input pair loaded from a JSON query file.
#[derive(Debug, Deserialize)]
pub struct Query {
    pub pattern: String,
    pub input: String,
    #[serde(rename = "rleKValue")]
    pub rle_k_value: usize,
}

/// Loads a query object from `path`.
pub fn load_query(path: &Path) -> Result<Query, QueryError> {
    info!(path = %path.display(), "reading query file");
    let raw = fs::read_to_string(path)?;
    let query: Query = serde_json::from_str(&raw)?;
    info!(pattern = %query.pattern, input_len = query.input.len(), "loaded query");
    Ok(query)
}

/// Interprets the C-style escapes `\n \t \\ \" \'` in an inline input
/// string; any other escape passes through with its backslash.
pub fn process_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
