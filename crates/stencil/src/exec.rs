use std::io::Write;

use serde_json::Value;

use crate::{
    funcs::{self, Func},
    template::{Branch, Expr, ExprKind, Node, Pipeline, Span},
    values::{kind_of, Datum, Key},
    ExecError, ExecErrorKind, MissingKey, RenderError, Template,
};

/// Evaluates one template against one data value.
pub(crate) struct Exec<'a> {
    template: &'a Template,
    root: &'a Value,
}

impl<'a> Exec<'a> {
    pub(crate) fn new(template: &'a Template, root: &'a Value) -> Self {
        Self { template, root }
    }

    pub(crate) fn run(&self, out: &mut dyn Write) -> Result<(), RenderError> {
        self.walk(&self.template.nodes, &Datum::Ref(self.root), out)
    }

    fn walk(&self, nodes: &[Node], dot: &Datum<'_>, out: &mut dyn Write) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.write_all(text.as_bytes())?,
                Node::Action(pipeline) => {
                    let value = self.pipeline(pipeline, dot)?;
                    write!(out, "{value}")?;
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for Branch { cond, body } in branches {
                        if self.pipeline(cond, dot)?.is_truthy() {
                            taken = Some(body);
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_ref()) {
                        self.walk(body, dot, out)?;
                    }
                }
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.pipeline(pipeline, dot)?;
                    if value.is_truthy() {
                        self.walk(body, &value, out)?;
                    } else if let Some(otherwise) = otherwise {
                        self.walk(otherwise, dot, out)?;
                    }
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.pipeline(pipeline, dot)?;
                    let items: Vec<&Value> = match value.value() {
                        None | Some(Value::Null) => Vec::new(),
                        Some(Value::Array(items)) => items.iter().collect(),
                        Some(Value::Object(map)) => map.values().collect(),
                        Some(other) => {
                            let kind = ExecErrorKind::RangeOver(kind_of(other));
                            return Err(self.error(pipeline.span, kind).into());
                        }
                    };

                    if items.is_empty() {
                        if let Some(otherwise) = otherwise {
                            self.walk(otherwise, dot, out)?;
                        }
                    }
                    for item in items {
                        self.walk(body, &Datum::Ref(item), out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn pipeline<'x>(
        &'x self,
        pipeline: &'x Pipeline,
        dot: &'x Datum<'x>,
    ) -> Result<Datum<'x>, ExecError> {
        let mut piped = None;
        for cmd in &pipeline.cmds {
            piped = Some(match &cmd.kind {
                ExprKind::Call(func, args) => self.call(*func, args, piped, dot, cmd.span)?,
                // The parser only lets functions receive a piped value.
                _ => self.eval(cmd, dot)?,
            });
        }
        Ok(piped.unwrap_or(Datum::NoValue))
    }

    fn eval<'x>(&'x self, expr: &'x Expr, dot: &'x Datum<'x>) -> Result<Datum<'x>, ExecError> {
        match &expr.kind {
            ExprKind::Dot => Ok(dot.reborrow()),
            ExprKind::Root => Ok(Datum::Ref(self.root)),
            ExprKind::Field(receiver, name) => {
                let receiver = self.eval(receiver, dot)?;
                self.lookup(receiver, Key::Field(name), expr.span)
            }
            ExprKind::Literal(value) => Ok(Datum::Ref(value)),
            ExprKind::Call(func, args) => self.call(*func, args, None, dot, expr.span),
            ExprKind::Pipeline(pipeline) => self.pipeline(pipeline, dot),
        }
    }

    fn lookup<'x>(
        &self,
        receiver: Datum<'x>,
        key: Key<'_>,
        span: Span,
    ) -> Result<Datum<'x>, ExecError> {
        match receiver.select(key) {
            Ok(Some(found)) => Ok(found),
            Ok(None) if self.template.missing_key == MissingKey::Error => {
                Err(self.error(span, ExecErrorKind::MissingKey(key.name())))
            }
            Ok(None) => Ok(Datum::NoValue),
            Err(kind) => Err(self.error(span, kind)),
        }
    }

    fn call<'x>(
        &'x self,
        func: Func,
        args: &'x [Expr],
        piped: Option<Datum<'x>>,
        dot: &'x Datum<'x>,
        span: Span,
    ) -> Result<Datum<'x>, ExecError> {
        let stop_on = match func {
            Func::And => Some(false),
            Func::Or => Some(true),
            _ => None,
        };

        let mut values = Vec::with_capacity(args.len() + 1);
        let mut decided = false;
        for arg in args {
            let value = self.eval(arg, dot)?;
            decided = stop_on.is_some_and(|stop_on| value.is_truthy() == stop_on);
            values.push(value);
            if decided {
                break;
            }
        }
        if !decided {
            values.extend(piped);
        }

        funcs::call(func, values, self.template.missing_key).map_err(|kind| self.error(span, kind))
    }

    fn error(&self, span: Span, kind: ExecErrorKind) -> ExecError {
        ExecError::new(&self.template.name, &self.template.source, span, kind)
    }
}
