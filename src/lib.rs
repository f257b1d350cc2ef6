pub mod span;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod typeck;
pub mod select;
pub mod visit;
pub mod pretty;
pub mod codegen;
pub mod config;
pub mod session;

use std::path::Path;

use tracing::debug;

use diagnostics::{CompileError, Diagnostics};
use parser::ast::Program;
use session::Session;

/// Lex and parse a source string.
pub fn parse_source(source: &str) -> Result<Program, CompileError> {
    let tokens = lexer::lex(source)?;
    debug!(tokens = tokens.len(), "lexed");
    let mut parser = parser::Parser::new(&tokens, source);
    let program = parser.parse_program()?;
    debug!(functions = program.functions.len(), "parsed");
    Ok(program)
}

/// Parse and type-check. Every select in the result is normalized.
pub fn analyze_source(source: &str) -> Result<Program, CompileError> {
    let mut program = parse_source(source)?;
    let mut diags = Diagnostics::new(source);
    typeck::type_check(&mut program, &mut diags);
    debug!(diagnostics = diags.len(), "type checked");
    diags.into_result()?;
    Ok(program)
}

/// Report user errors without lowering or generating code.
pub fn check_source(source: &str) -> Result<(), CompileError> {
    analyze_source(source).map(|_| ())
}

/// Analyze, then replace every select with its lowered form.
pub fn lower_source(source: &str, session: &Session) -> Result<Program, CompileError> {
    let mut program = analyze_source(source)?;
    select::lower_program(&mut program, session)?;
    debug!("selects lowered");
    Ok(program)
}

/// Compile a source string to object bytes (lex → parse → typeck → select lowering → codegen).
pub fn compile_to_object(source: &str, session: &Session) -> Result<Vec<u8>, CompileError> {
    let program = lower_source(source, session)?;
    let bytes = codegen::codegen(&program, session)?;
    debug!(bytes = bytes.len(), "object emitted");
    Ok(bytes)
}

pub fn read_source(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))
}

/// Compile `entry_file` and write the object to `output_path`.
pub fn compile_file(entry_file: &Path, output_path: &Path, session: &Session) -> Result<(), CompileError> {
    let source = read_source(entry_file)?;
    let bytes = compile_to_object(&source, session)?;
    std::fs::write(output_path, bytes).map_err(|e| CompileError::io(output_path, e))
}
