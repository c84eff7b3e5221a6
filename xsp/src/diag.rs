//! Source locations, reports and the report handler.
//!
//! Every AST node carries a [`SourceArea`]; passes attach areas to the
//! reports they emit so the caller can render a labeled span with
//! `codespan-reporting`.

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Row/column position in the preprocessed source. Row 0 means "no position"
/// (synthetic nodes made by the factory).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct SourcePosition {
    pub row: u32,
    pub column: u32,
    /// Byte offset into the source text, used for span rendering.
    pub offset: u32,
}

impl SourcePosition {
    pub fn new(row: u32, column: u32, offset: u32) -> SourcePosition {
        SourcePosition { row, column, offset }
    }

    /// The "no position" marker.
    pub fn ignore() -> SourcePosition {
        SourcePosition::default()
    }

    pub fn is_valid(&self) -> bool {
        self.row > 0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// A contiguous source span plus an optional caret offset inside the span.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct SourceArea {
    pub pos: SourcePosition,
    pub length: u32,
    /// Offset of the caret marker relative to `pos`, for `^~~~` style output.
    pub offset: u32,
}

impl SourceArea {
    pub fn new(pos: SourcePosition, length: u32) -> SourceArea {
        SourceArea { pos, length, offset: 0 }
    }

    pub fn ignore() -> SourceArea {
        SourceArea::default()
    }

    pub fn is_valid(&self) -> bool {
        self.pos.is_valid() && self.length > 0
    }

    fn byte_range(&self) -> std::ops::Range<usize> {
        let start = self.pos.offset as usize;
        start..start + self.length.max(1) as usize
    }
}

/// Report classification, ordered by severity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ReportKind {
    Info,
    Warning,
    Error,
}

/// A single diagnostic message with an optional source area and hints.
#[derive(Clone, Debug)]
pub struct Report {
    pub kind: ReportKind,
    pub message: String,
    pub area: SourceArea,
    pub hints: Vec<String>,
}

impl Report {
    pub fn error(message: impl Into<String>, area: SourceArea) -> Report {
        Report {
            kind: ReportKind::Error,
            message: message.into(),
            area,
            hints: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>, area: SourceArea) -> Report {
        Report {
            kind: ReportKind::Warning,
            message: message.into(),
            area,
            hints: Vec::new(),
        }
    }

    /// Converts this report into a `codespan-reporting` diagnostic for the
    /// given file id.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let severity = match self.kind {
            ReportKind::Info => Severity::Note,
            ReportKind::Warning => Severity::Warning,
            ReportKind::Error => Severity::Error,
        };
        let mut diagnostic = Diagnostic::new(severity).with_message(self.message.clone());
        if self.area.is_valid() {
            diagnostic = diagnostic.with_labels(vec![Label::primary(file_id, self.area.byte_range())]);
        }
        if !self.hints.is_empty() {
            diagnostic = diagnostic.with_notes(self.hints.clone());
        }
        diagnostic
    }
}

/// Failure to derive or combine type denoters.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct TypeError {
    pub message: String,
    pub area: SourceArea,
}

impl TypeError {
    pub fn new(message: impl Into<String>, area: SourceArea) -> TypeError {
        TypeError {
            message: message.into(),
            area,
        }
    }
}

/// Errors a pass can abort with.
#[derive(Clone, Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("{message}")]
    Semantic { message: String, area: SourceArea },

    /// An impossible invariant was observed; indicates an implementation bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn semantic(message: impl Into<String>, area: SourceArea) -> CompileError {
        CompileError::Semantic {
            message: message.into(),
            area,
        }
    }

    pub fn area(&self) -> SourceArea {
        match self {
            CompileError::Type(err) => err.area,
            CompileError::Semantic { area, .. } => *area,
            CompileError::Internal(_) => SourceArea::ignore(),
        }
    }

    pub fn into_report(self) -> Report {
        Report::error(self.to_string(), self.area())
    }
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// Collects reports over a compilation and tracks the runaway-syntax
/// threshold. A hint registered with [`ReportHandler::hint_for_next_report`]
/// is attached to the next submitted report and then cleared (the reference
/// analyzer uses this to attach the call stack to a recursion error).
/// Warnings are opt-in: [`ReportHandler::submit_warning`] drops reports
/// whose category the caller did not enable.
#[derive(Debug)]
pub struct ReportHandler {
    reports: Vec<Report>,
    next_hints: Vec<String>,
    error_count: usize,
    unexpected_tokens: usize,
    unexpected_token_limit: usize,
    warnings: crate::WarningFlags,
    pub source_name: SmolStr,
}

impl ReportHandler {
    pub fn new(source_name: impl Into<SmolStr>, warnings: crate::WarningFlags) -> ReportHandler {
        ReportHandler {
            reports: Vec::new(),
            next_hints: Vec::new(),
            error_count: 0,
            unexpected_tokens: 0,
            unexpected_token_limit: 3,
            warnings,
            source_name: source_name.into(),
        }
    }

    pub fn submit(&mut self, mut report: Report) {
        if report.kind == ReportKind::Error {
            self.error_count += 1;
        }
        report.hints.append(&mut self.next_hints);
        self.reports.push(report);
    }

    /// Submits a warning of the given category; disabled categories are
    /// dropped (pending hints stay queued for the next accepted report).
    pub fn submit_warning(&mut self, category: crate::WarningFlags, report: Report) {
        if self.warnings.intersects(category) {
            self.submit(report);
        }
    }

    pub fn hint_for_next_report(&mut self, hint: impl Into<String>) {
        self.next_hints.push(hint.into());
    }

    /// Counts an unexpected token during recovery; returns true once the
    /// configured limit is exceeded and parsing must stop.
    pub fn count_unexpected_token(&mut self) -> bool {
        self.unexpected_tokens += 1;
        self.unexpected_tokens >= self.unexpected_token_limit
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reports
    }
}
