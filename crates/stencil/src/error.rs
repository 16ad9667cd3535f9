use std::io;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::template::Span;

/// Failure to render a parsed [`Template`](crate::Template).
#[derive(Debug, Diagnostic, Error)]
pub enum RenderError {
    /// Evaluation of an action failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Exec(#[from] ExecError),

    /// An I/O error passed through from [`Template::render_into`](crate::Template::render_into).
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The template failed to parse.
#[derive(Debug, Diagnostic, Error)]
#[error("template: {name}:{line}: {kind}")]
#[diagnostic(code(stencil::parse))]
pub struct ParseError {
    pub(crate) name: String,
    pub(crate) line: usize,
    pub(crate) kind: ParseErrorKind,

    #[source_code]
    pub(crate) src: String,

    #[label("here")]
    pub(crate) span: SourceSpan,
}

impl ParseError {
    pub(crate) fn new(name: &str, src: &str, span: Span, kind: ParseErrorKind) -> Self {
        let (line, _) = span.line_col(src);
        Self {
            name: name.to_owned(),
            line,
            kind,
            src: src.to_owned(),
            span: span.into(),
        }
    }

    /// Name of the template that failed to parse.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based line the error was detected on.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseErrorKind {
    #[error("unclosed action")]
    UnclosedAction,

    #[error("unclosed comment")]
    UnclosedComment,

    #[error("comment ends before closing delimiter")]
    CommentNotAlone,

    #[error("unexpected {0:?} in command")]
    UnexpectedChar(char),

    #[error("unexpected {0} in {1}")]
    UnexpectedToken(String, &'static str),

    #[error("unterminated quoted string")]
    UnterminatedString,

    #[error("unterminated raw quoted string")]
    UnterminatedRawString,

    #[error("unknown escape sequence `\\{0}`")]
    UnknownEscape(char),

    #[error("bad number syntax: {0:?}")]
    BadNumber(String),

    #[error("function {0:?} not defined")]
    UndefinedFunction(String),

    #[error("undefined variable {0:?}")]
    UndefinedVariable(String),

    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("can't give argument to non-function {0}")]
    NonFunctionArgs(String),

    #[error("unclosed left paren")]
    UnclosedParen,

    #[error("{{{{{0}}}}} actions are not supported")]
    Unsupported(String),

    #[error("unexpected {{{{{0}}}}}")]
    UnexpectedKeyword(&'static str),

    #[error("expected {{{{end}}}}; found {{{{{0}}}}}")]
    ExpectedEnd(&'static str),

    #[error("unexpected EOF: {{{{{0}}}}} is never closed")]
    UnclosedBlock(&'static str),
}

/// Evaluation of a template action failed.
#[derive(Debug, Diagnostic, Error)]
#[error("template: {name}:{line}:{column}: executing {name:?} at <{node}>: {kind}")]
#[diagnostic(code(stencil::exec))]
pub struct ExecError {
    pub(crate) name: String,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) node: String,
    pub(crate) kind: ExecErrorKind,

    #[source_code]
    pub(crate) src: String,

    #[label("evaluation failed here")]
    pub(crate) span: SourceSpan,
}

impl ExecError {
    pub(crate) fn new(name: &str, src: &str, span: Span, kind: ExecErrorKind) -> Self {
        let (line, column) = span.line_col(src);
        Self {
            name: name.to_owned(),
            line,
            column,
            node: span.snippet(src),
            kind,
            src: src.to_owned(),
            span: span.into(),
        }
    }

    /// Name of the template being executed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text of the expression that failed, e.g. `.user.name`.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// 1-based line and column of the failing expression.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn kind(&self) -> &ExecErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExecErrorKind {
    /// An object lookup found no such key and the template is in
    /// [`MissingKey::Error`](crate::MissingKey::Error) mode.
    #[error("map has no entry for key {0:?}")]
    MissingKey(String),

    #[error("nil pointer evaluating field {0:?}")]
    NilField(String),

    #[error("can't evaluate field {field} in type {kind}")]
    NotAnObject { field: String, kind: &'static str },

    #[error("can't index item of type {0}")]
    CannotIndex(&'static str),

    #[error("cannot index {kind} with {key}")]
    BadIndexKey { kind: &'static str, key: &'static str },

    #[error("index out of range: {index} (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("wrong number of args for {func}: want {want} got {got}")]
    WrongArgCount {
        func: &'static str,
        want: &'static str,
        got: usize,
    },

    #[error("len of type {0}")]
    NoLen(&'static str),

    #[error("incompatible types for comparison: {0} and {1}")]
    Incomparable(&'static str, &'static str),

    #[error("invalid type for comparison: {0}")]
    NotOrdered(&'static str),

    #[error("range can't iterate over {0}")]
    RangeOver(&'static str),
}
