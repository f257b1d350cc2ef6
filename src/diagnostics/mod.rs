use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::span::{LineIndex, Position, Span};

/// Category of a user-facing diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A second `default` case in one select.
    MultipleDefaults,
    /// More than one guard expression in a single select case.
    CaseListNotAllowed,
    /// Select case guard is not a receive, send, or receive assignment.
    InvalidCaseForm,
    /// Select case assignment whose right-hand side is not a receive.
    AssignmentWithoutReceive,
    /// Ordinary type-checking error.
    Type,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::MultipleDefaults => "multiple-defaults",
            DiagnosticKind::CaseListNotAllowed => "case-list-not-allowed",
            DiagnosticKind::InvalidCaseForm => "invalid-case-form",
            DiagnosticKind::AssignmentWithoutReceive => "assignment-without-receive",
            DiagnosticKind::Type => "type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub msg: String,
    pub span: Span,
    /// Secondary location, e.g. the first `default` for `MultipleDefaults`.
    pub related: Option<Span>,
}

/// Collects non-fatal diagnostics for one source file.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    lines: LineIndex,
}

impl Diagnostics {
    pub fn new(source: &str) -> Self {
        Self { items: Vec::new(), lines: LineIndex::new(source) }
    }

    pub fn error(&mut self, kind: DiagnosticKind, span: Span, msg: impl Into<String>) {
        self.items.push(Diagnostic { kind, msg: msg.into(), span, related: None });
    }

    pub fn error_with_related(
        &mut self,
        kind: DiagnosticKind,
        span: Span,
        related: Span,
        msg: impl Into<String>,
    ) {
        self.items.push(Diagnostic { kind, msg: msg.into(), span, related: Some(related) });
    }

    /// Type error shorthand.
    pub fn type_error(&mut self, span: Span, msg: impl Into<String>) {
        self.error(DiagnosticKind::Type, span, msg);
    }

    pub fn position(&self, span: Span) -> Position {
        self.lines.position(span.start)
    }

    pub fn has_errors(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// `Err(CompileError::Semantic)` if anything was reported.
    pub fn into_result(self) -> Result<(), CompileError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(CompileError::Semantic { diagnostics: self.items })
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Syntax error: {msg}")]
    Syntax { msg: String, span: Span },

    #[error("{}", semantic_summary(.diagnostics))]
    Semantic { diagnostics: Vec<Diagnostic> },

    #[error("internal compiler error: {msg}")]
    Internal { msg: String },

    #[error("Codegen error: {msg}")]
    Codegen { msg: String },

    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },

    #[error("failed to access {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
}

fn semantic_summary(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "Semantic error".to_string(),
        [only] => format!("Semantic error: {}", only.msg),
        [first, rest @ ..] => format!("Semantic error: {} (and {} more)", first.msg, rest.len()),
    }
}

impl CompileError {
    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        Self::Syntax { msg: msg.into(), span }
    }

    /// Invariant violation inside the compiler; never caused by user input.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { msg: msg.into() }
    }

    pub fn codegen(msg: impl Into<String>) -> Self {
        Self::Codegen { msg: msg.into() }
    }

    pub fn config(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Semantic { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(source: &str, err: &CompileError) {
    use ariadne::{Label, Report, ReportKind, Source};

    match err {
        CompileError::Syntax { msg, span } => {
            let _ = Report::build(ReportKind::Error, (), span.start)
                .with_message("syntax error")
                .with_label(Label::new(span.start..span.end).with_message(msg))
                .finish()
                .eprint(Source::from(source));
        }
        CompileError::Semantic { diagnostics } => {
            for diag in diagnostics {
                let mut report = Report::build(ReportKind::Error, (), diag.span.start)
                    .with_code(diag.kind.code())
                    .with_message(&diag.msg)
                    .with_label(Label::new(diag.span.start..diag.span.end).with_message(&diag.msg));
                if let Some(related) = diag.related {
                    report = report.with_label(
                        Label::new(related.start..related.end).with_message("first defined here"),
                    );
                }
                let _ = report.finish().eprint(Source::from(source));
            }
        }
        CompileError::Internal { msg } => {
            eprintln!("internal compiler error: {msg}");
        }
        CompileError::Codegen { msg } => {
            eprintln!("error: {msg}");
        }
        CompileError::Config { msg, path } => {
            eprintln!("error[config]: {msg}");
            eprintln!("  --> {}", path.display());
        }
        CompileError::Io { .. } => {
            eprintln!("error: {err}");
        }
    }
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    code: &'static str,
    message: &'a str,
    start: Position,
    end: Position,
    related: Option<Position>,
}

/// Serialize diagnostics with resolved line:column positions.
pub fn diagnostics_to_json(source: &str, diagnostics: &[Diagnostic]) -> Result<String, CompileError> {
    let lines = LineIndex::new(source);
    let out: Vec<JsonDiagnostic<'_>> = diagnostics
        .iter()
        .map(|d| JsonDiagnostic {
            code: d.kind.code(),
            message: &d.msg,
            start: lines.position(d.span.start),
            end: lines.position(d.span.end),
            related: d.related.map(|r| lines.position(r.start)),
        })
        .collect();
    serde_json::to_string_pretty(&out)
        .map_err(|e| CompileError::internal(format!("failed to serialize diagnostics: {e}")))
}
