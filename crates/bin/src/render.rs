use std::io::Write;

use serde::Deserialize;
use serde_json::Value;
use stencil::{MissingKey, Template};
use tracing::debug;

use crate::errors::RenderError;

/// Name given to the template, as it appears in error messages.
pub const TEMPLATE_NAME: &str = "json-render";

/// Compiles and executes templates.
pub trait TemplateEngine {
    type Compiled;

    fn compile(
        &self,
        name: &str,
        text: &str,
        missing_key: MissingKey,
    ) -> Result<Self::Compiled, RenderError>;

    /// Write the output of `template` over `data` into `out`.
    ///
    /// `out` may have received partial output when this fails.
    fn execute(
        &self,
        template: &Self::Compiled,
        data: &Value,
        out: &mut dyn Write,
    ) -> Result<(), RenderError>;
}

/// The [`stencil`] template engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stencil;

impl TemplateEngine for Stencil {
    type Compiled = Template;

    fn compile(
        &self,
        name: &str,
        text: &str,
        missing_key: MissingKey,
    ) -> Result<Template, RenderError> {
        Ok(Template::parse(name, text)?.with_missing_key(missing_key))
    }

    fn execute(
        &self,
        template: &Template,
        data: &Value,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        template.render_into(out, data).map_err(|err| match err {
            stencil::RenderError::Exec(err) => RenderError::TemplateExecution(err),
            stencil::RenderError::Io(err) => RenderError::Output(err),
        })
    }
}

/// Parse the JSON input into a value.
///
/// The whole text must be one JSON value; anything but whitespace after it
/// is rejected. Nesting depth is not limited, deep documents grow the stack
/// on the heap instead.
pub fn decode(json: &str) -> Result<Value, RenderError> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();

    Value::deserialize(serde_stacker::Deserializer::new(&mut de))
        .and_then(|value| de.end().map(|()| value))
        .map_err(|err| RenderError::invalid_json(json, err))
}

/// Decode, compile and execute, returning the complete output.
///
/// Lookups of absent keys are errors. Nothing is returned unless execution
/// finished, so a failing render never yields partial text. The output ends
/// with one appended newline.
pub fn render<E: TemplateEngine>(
    engine: &E,
    json: &str,
    template: &str,
) -> Result<Vec<u8>, RenderError> {
    let data = decode(json)?;
    let compiled = engine.compile(TEMPLATE_NAME, template, MissingKey::Error)?;

    let mut buf = Vec::with_capacity(template.len() + 1);
    engine.execute(&compiled, &data, &mut buf)?;
    buf.push(b'\n');

    debug!("rendered {} bytes", buf.len());
    Ok(buf)
}

/// Write the rendered output in one go and flush.
pub fn emit(out: &mut dyn Write, rendered: &[u8]) -> Result<(), RenderError> {
    out.write_all(rendered)
        .and_then(|()| out.flush())
        .map_err(RenderError::Output)
}

#[cfg(test)]
mod test {
    use std::io;

    use serde_json::json;

    use super::*;

    fn render_str(json: &str, template: &str) -> Result<String, RenderError> {
        render(&Stencil, json, template).map(|buf| String::from_utf8(buf).unwrap())
    }

    /// Writes some output, then fails.
    struct HalfEngine;

    impl TemplateEngine for HalfEngine {
        type Compiled = ();

        fn compile(&self, _: &str, _: &str, missing_key: MissingKey) -> Result<(), RenderError> {
            assert_eq!(missing_key, MissingKey::Error);
            Ok(())
        }

        fn execute(&self, _: &(), _: &Value, out: &mut dyn Write) -> Result<(), RenderError> {
            out.write_all(b"partial output").map_err(RenderError::Output)?;
            Err(RenderError::Output(io::Error::other("engine gave up")))
        }
    }

    #[test]
    fn renders_names() {
        let json = r#"{"firstName":"Матвей","lastName":"Вдовицын","middleName":"Валентинович"}"#;
        assert_eq!(
            render_str(json, "{{.lastName}} {{.firstName}} {{.middleName}}").unwrap(),
            "Вдовицын Матвей Валентинович\n"
        );
    }

    #[test]
    fn exactly_one_newline_is_appended() {
        assert_eq!(render_str("{}", "").unwrap(), "\n");
        assert_eq!(render_str("{}", "line\n").unwrap(), "line\n\n");
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = render_str(r#"{"firstName":"Матвей"}"#, "{{.firstName}} {{.nickname}}").unwrap_err();
        let RenderError::TemplateExecution(err) = err else {
            panic!("unexpected {err:?}");
        };
        assert_eq!(err.name(), TEMPLATE_NAME);
        assert!(err.to_string().contains(r#"map has no entry for key "nickname""#));
    }

    #[test]
    fn failed_execution_yields_no_output() {
        assert!(matches!(
            render(&HalfEngine, "{}", "ignored"),
            Err(RenderError::Output(_))
        ));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(matches!(
            decode(r#"{"a":1} x"#),
            Err(RenderError::InvalidJson { .. })
        ));
        assert_eq!(decode("  {\"a\":1}\n\n").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn deep_nesting_is_accepted() {
        for depth in [200, 2000] {
            let json = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
            assert_eq!(render_str(&json, "ok").unwrap(), "ok\n");
        }

        let json = format!(r#"{}{{"a":1}}{}"#, "[".repeat(300), "]".repeat(300));
        let mut value = &decode(&json).unwrap();
        for _ in 0..300 {
            value = &value[0];
        }
        assert_eq!(value, &json!({"a": 1}));
    }

    #[test]
    fn bad_json_is_reported_before_template_errors() {
        assert!(matches!(
            render_str("{", "{{"),
            Err(RenderError::InvalidJson { .. })
        ));
        assert!(matches!(
            render_str("{}", "{{"),
            Err(RenderError::TemplateSyntax(_))
        ));
    }

    #[test]
    fn any_json_value_can_be_the_root() {
        assert_eq!(render_str("[1,2]", "{{len .}}").unwrap(), "2\n");
        assert_eq!(render_str("\"s\"", "{{.}}").unwrap(), "s\n");
        assert_eq!(render_str("null", "{{.}}").unwrap(), "<nil>\n");
    }

    #[test]
    fn emit_writes_everything() {
        let mut out = Vec::new();
        emit(&mut out, b"done\n").unwrap();
        assert_eq!(out, b"done\n");
    }
}
