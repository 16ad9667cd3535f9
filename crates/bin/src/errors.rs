use std::{
    fmt, io,
    io::Write,
    path::PathBuf,
    process::{ExitCode, Termination},
};

use miette::{Diagnostic, Report, SourceSpan};
use thiserror::Error;
use tracing::debug;

/// Which of the two inputs a source belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Json,
    Template,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "JSON",
            Self::Template => "template",
        })
    }
}

/// Error kinds emitted by json-render.
///
/// Every one of them is fatal and ends the process with exit code 1.
#[derive(Error, Diagnostic, Debug)]
#[non_exhaustive]
pub enum RenderError {
    /// Neither `--json` nor `--json-file` was given.
    ///
    /// - Code: `json_render::input::missing_json`
    #[error("no JSON input: pass one of --json or --json-file")]
    #[diagnostic(severity(error), code(json_render::input::missing_json))]
    MissingJson,

    /// Neither `--template` nor `--template-file` was given.
    ///
    /// - Code: `json_render::input::missing_template`
    #[error("no template input: pass one of --template or --template-file")]
    #[diagnostic(severity(error), code(json_render::input::missing_template))]
    MissingTemplate,

    /// Both `--json` and `--json-file` were given.
    ///
    /// - Code: `json_render::input::ambiguous_json`
    #[error("ambiguous JSON input: --json and --json-file are mutually exclusive")]
    #[diagnostic(severity(error), code(json_render::input::ambiguous_json))]
    AmbiguousJson,

    /// Both `--template` and `--template-file` were given.
    ///
    /// - Code: `json_render::input::ambiguous_template`
    #[error("ambiguous template input: --template and --template-file are mutually exclusive")]
    #[diagnostic(severity(error), code(json_render::input::ambiguous_template))]
    AmbiguousTemplate,

    /// An input file could not be read, or is not valid UTF-8.
    ///
    /// - Code: `json_render::io`
    #[error("failed to read {input} file {}: {source}", .path.display())]
    #[diagnostic(severity(error), code(json_render::io))]
    Io {
        input: InputKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The JSON input is not a single valid JSON value.
    ///
    /// - Code: `json_render::json`
    #[error("invalid JSON input: {source}")]
    #[diagnostic(severity(error), code(json_render::json))]
    InvalidJson {
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
        #[source]
        source: serde_json::Error,
    },

    /// The template failed to parse.
    ///
    /// - Code: `stencil::parse`
    #[error(transparent)]
    #[diagnostic(transparent)]
    TemplateSyntax(#[from] stencil::ParseError),

    /// The template failed while executing, e.g. on a missing key.
    ///
    /// - Code: `stencil::exec`
    #[error(transparent)]
    #[diagnostic(transparent)]
    TemplateExecution(#[from] stencil::ExecError),

    /// The rendered text could not be written out.
    ///
    /// - Code: `json_render::output`
    #[error("failed to write output: {0}")]
    #[diagnostic(severity(error), code(json_render::output))]
    Output(#[source] io::Error),
}

impl RenderError {
    /// Wrap a decode failure of `src`, pointing at the position serde_json
    /// reported.
    pub fn invalid_json(src: &str, source: serde_json::Error) -> Self {
        let offset = byte_offset(src, source.line(), source.column());
        Self::InvalidJson {
            span: (offset, 0).into(),
            src: src.to_owned(),
            source,
        }
    }
}

impl Termination for RenderError {
    fn report(self) -> ExitCode {
        writeln!(io::stderr(), "failed to execute template: {self}").ok();
        debug!("{:?}", Report::new(self));
        ExitCode::FAILURE
    }
}

/// Convert serde_json's 1-based line and column into a byte offset.
fn byte_offset(src: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }

    let line_start: usize = src
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    let mut offset = (line_start + column.saturating_sub(1)).min(src.len());
    while !src.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
