#![allow(dead_code)]

use std::process::Command;

use chansel::config::Options;
use chansel::diagnostics::{CompileError, Diagnostic};
use chansel::pretty::pretty_print;
use chansel::session::Session;

pub fn chansel() -> Command {
    Command::new(env!("CARGO_BIN_EXE_chansel"))
}

/// Pretty-printed program after select lowering.
pub fn lowered(source: &str) -> String {
    lowered_with(source, Options::default())
}

pub fn lowered_with(source: &str, options: Options) -> String {
    let session = Session::new(options);
    match chansel::lower_source(source, &session) {
        Ok(program) => pretty_print(&program).trim_end().to_string(),
        Err(err) => panic!("lowering failed: {err}\n{:#?}", err.diagnostics()),
    }
}

/// Pretty-printed program after normalization only.
pub fn normalized(source: &str) -> String {
    match chansel::analyze_source(source) {
        Ok(program) => pretty_print(&program).trim_end().to_string(),
        Err(err) => panic!("analysis failed: {err}\n{:#?}", err.diagnostics()),
    }
}

/// Diagnostics the checker reports for `source`; panics if it is accepted.
pub fn diagnostics(source: &str) -> Vec<Diagnostic> {
    match chansel::check_source(source) {
        Ok(()) => panic!("expected diagnostics for:\n{source}"),
        Err(CompileError::Semantic { diagnostics }) => diagnostics,
        Err(other) => panic!("expected semantic errors, got {other}"),
    }
}

pub fn messages(source: &str) -> Vec<String> {
    diagnostics(source).into_iter().map(|d| d.msg).collect()
}

/// Byte offset of the `n`th (0-based) occurrence of `needle`.
pub fn offset_of(source: &str, needle: &str, n: usize) -> usize {
    source
        .match_indices(needle)
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or_else(|| panic!("{needle:?} occurs fewer than {} times", n + 1))
}
