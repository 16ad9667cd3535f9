use std::io::{self, Write};

use miette::SourceSpan;
use serde_json::Value;

use crate::{exec::Exec, funcs::Func, parser, ParseError, RenderError};

/// What to do when an action looks up a key that is absent from an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingKey {
    /// The lookup produces "no value", which prints as `<no value>` and is
    /// false in conditions.
    #[default]
    Default,

    /// The lookup fails the render with
    /// [`ExecErrorKind::MissingKey`](crate::ExecErrorKind::MissingKey).
    Error,
}

/// A parsed template, ready to be rendered any number of times.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) missing_key: MissingKey,
}

/// Byte range into the template source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Span {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub(crate) fn to(self, other: Span) -> Self {
        Self::new(self.start, other.end)
    }

    /// Source text of the span on a single line, with whitespace runs
    /// collapsed to one space.
    pub(crate) fn snippet(self, src: &str) -> String {
        let text = src.get(self.start..self.end).unwrap_or_default();
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// 1-based line and column (in chars) of the start of the span.
    pub(crate) fn line_col(self, src: &str) -> (usize, usize) {
        let before = src.get(..self.start).unwrap_or(src);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |nl| nl + 1);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.end - span.start).into()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Branch {
    pub(crate) cond: Pipeline,
    pub(crate) body: Vec<Node>,
}

/// Commands joined by `|`; each result is passed as the last argument of the
/// next command.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Pipeline {
    pub(crate) span: Span,
    pub(crate) cmds: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Expr {
    pub(crate) span: Span,
    pub(crate) kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ExprKind {
    Dot,
    Root,
    Field(Box<Expr>, String),
    Literal(Value),
    Call(Func, Vec<Expr>),
    Pipeline(Pipeline),
}

impl Template {
    /// Parse `source` into a template called `name`.
    ///
    /// The name only shows up in error messages.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, ParseError> {
        let name = name.into();
        let nodes = parser::parse(&name, source)?;
        Ok(Self {
            name,
            source: source.to_owned(),
            nodes,
            missing_key: MissingKey::default(),
        })
    }

    /// Builder form of [`Template::set_missing_key`].
    pub fn with_missing_key(mut self, policy: MissingKey) -> Self {
        self.missing_key = policy;
        self
    }

    pub fn set_missing_key(&mut self, policy: MissingKey) {
        self.missing_key = policy;
    }

    pub fn missing_key(&self) -> MissingKey {
        self.missing_key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template with `data` as both `.` and `$`, writing output as
    /// it is produced.
    ///
    /// On error, whatever was written before the failing action stays in
    /// `writer`; render into a buffer if that matters.
    pub fn render_into(&self, writer: &mut dyn Write, data: &Value) -> Result<(), RenderError> {
        Exec::new(self, data).run(writer)
    }

    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        let mut buf = Vec::with_capacity(self.text_len());
        self.render_into(&mut buf, data)?;

        String::from_utf8(buf)
            .map_err(|err| RenderError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
    }

    /// Whether any action refers to the field `name`, at any depth.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields().contains(&name)
    }

    /// Field names referred to by the template, in order of first appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        collect_nodes(&self.nodes, &mut fields);
        fields
    }

    fn text_len(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Text(text) => text.len(),
                _ => 0,
            })
            .sum()
    }
}

fn collect_nodes<'t>(nodes: &'t [Node], fields: &mut Vec<&'t str>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Action(pipeline) => collect_pipeline(pipeline, fields),
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    collect_pipeline(&branch.cond, fields);
                    collect_nodes(&branch.body, fields);
                }
                if let Some(otherwise) = otherwise {
                    collect_nodes(otherwise, fields);
                }
            }
            Node::With {
                pipeline,
                body,
                otherwise,
            }
            | Node::Range {
                pipeline,
                body,
                otherwise,
            } => {
                collect_pipeline(pipeline, fields);
                collect_nodes(body, fields);
                if let Some(otherwise) = otherwise {
                    collect_nodes(otherwise, fields);
                }
            }
        }
    }
}

fn collect_pipeline<'t>(pipeline: &'t Pipeline, fields: &mut Vec<&'t str>) {
    for cmd in &pipeline.cmds {
        collect_expr(cmd, fields);
    }
}

fn collect_expr<'t>(expr: &'t Expr, fields: &mut Vec<&'t str>) {
    match &expr.kind {
        ExprKind::Field(receiver, name) => {
            collect_expr(receiver, fields);
            if !fields.contains(&name.as_str()) {
                fields.push(name);
            }
        }
        ExprKind::Call(_, args) => {
            for arg in args {
                collect_expr(arg, fields);
            }
        }
        ExprKind::Pipeline(pipeline) => collect_pipeline(pipeline, fields),
        ExprKind::Dot | ExprKind::Root | ExprKind::Literal(_) => {}
    }
}
