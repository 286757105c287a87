//! Parse errors with source context.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// What went wrong while parsing a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingPromptBlank,
    InconsistentIndent,
    InvalidOption,
}

/// A malformed example in a fixture.
///
/// Rendered through miette, the error points at the offending line; its `Display` form is a one-line summary
/// suitable for test reports.
#[derive(Debug, Error, Diagnostic)]
#[error("line {line} of {fixture} {detail}")]
#[diagnostic(code(docgate::syntax))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 1-based line number.
    pub line: usize,
    pub fixture: String,
    pub detail: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: SourceSpan,
}

impl ParseError {
    pub(crate) fn new(
        kind: ParseErrorKind,
        fixture: &str,
        text: &str,
        line_index: usize,
        line_offset: usize,
        line_text: &str,
        detail: String,
    ) -> Self {
        Self {
            kind,
            line: line_index + 1,
            fixture: fixture.to_string(),
            detail,
            src: NamedSource::new(fixture, text.to_string()),
            span: (line_offset, line_text.len()).into(),
        }
    }
}
