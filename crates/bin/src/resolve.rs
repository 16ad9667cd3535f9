use std::{fs, path::PathBuf};

use tracing::debug;

use crate::errors::{InputKind, RenderError};

/// The four optional inputs as given on the command line.
///
/// An empty string counts as not set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSpec {
    pub literal_json: Option<String>,
    pub json_file: Option<PathBuf>,
    pub literal_template: Option<String>,
    pub template_file: Option<PathBuf>,
}

/// Where the text of one input comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Literal(String),
    File(PathBuf),
}

/// Exactly one JSON source and exactly one template source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSources {
    pub json: Source,
    pub template: Source,
}

impl InputSpec {
    /// Check that exactly one source was given for each input.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// missing JSON, missing template, ambiguous JSON, ambiguous template.
    /// Nothing is read from disk here.
    pub fn validate(self) -> Result<ResolvedSources, RenderError> {
        let literal_json = self.literal_json.filter(|text| !text.is_empty());
        let json_file = self.json_file.filter(|path| !path.as_os_str().is_empty());
        let literal_template = self.literal_template.filter(|text| !text.is_empty());
        let template_file = self
            .template_file
            .filter(|path| !path.as_os_str().is_empty());

        if literal_json.is_none() && json_file.is_none() {
            return Err(RenderError::MissingJson);
        }
        if literal_template.is_none() && template_file.is_none() {
            return Err(RenderError::MissingTemplate);
        }

        let json = Source::exclusive(literal_json, json_file).ok_or(RenderError::AmbiguousJson)?;
        let template = Source::exclusive(literal_template, template_file)
            .ok_or(RenderError::AmbiguousTemplate)?;

        Ok(ResolvedSources { json, template })
    }
}

impl Source {
    fn exclusive(literal: Option<String>, file: Option<PathBuf>) -> Option<Self> {
        match (literal, file) {
            (Some(text), None) => Some(Self::Literal(text)),
            (None, Some(path)) => Some(Self::File(path)),
            _ => None,
        }
    }

    /// Produce the text of this source, reading the whole file if needed.
    pub fn read(self, input: InputKind) -> Result<String, RenderError> {
        match self {
            Self::Literal(text) => {
                debug!("using literal {input} ({} bytes)", text.len());
                Ok(text)
            }
            Self::File(path) => {
                debug!("reading {input} from {}", path.display());
                match fs::read_to_string(&path) {
                    Ok(text) => {
                        debug!("read {} bytes of {input}", text.len());
                        Ok(text)
                    }
                    Err(source) => Err(RenderError::Io {
                        input,
                        path,
                        source,
                    }),
                }
            }
        }
    }
}

impl ResolvedSources {
    /// Materialize both inputs, JSON first.
    ///
    /// Returns `(json_text, template_text)`.
    pub fn read(self) -> Result<(String, String), RenderError> {
        let json = self.json.read(InputKind::Json)?;
        let template = self.template.read(InputKind::Template)?;
        Ok((json, template))
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use tempfile::TempDir;

    use super::*;

    fn spec(
        literal_json: Option<&str>,
        json_file: Option<&str>,
        literal_template: Option<&str>,
        template_file: Option<&str>,
    ) -> InputSpec {
        InputSpec {
            literal_json: literal_json.map(str::to_owned),
            json_file: json_file.map(PathBuf::from),
            literal_template: literal_template.map(str::to_owned),
            template_file: template_file.map(PathBuf::from),
        }
    }

    const NOWHERE: &str = "/nonexistent/json-render/input";

    #[test]
    fn literals_resolve_verbatim() {
        let sources = spec(Some(r#"{"a":1}"#), None, Some("{{.a}}"), None)
            .validate()
            .unwrap();
        assert_eq!(sources.json, Source::Literal(r#"{"a":1}"#.into()));
        assert_eq!(
            sources.read().unwrap(),
            (r#"{"a":1}"#.to_owned(), "{{.a}}".to_owned())
        );
    }

    #[test]
    fn missing_inputs_are_checked_first() {
        assert!(matches!(
            spec(None, None, None, None).validate(),
            Err(RenderError::MissingJson)
        ));
        assert!(matches!(
            spec(Some("1"), Some(NOWHERE), None, None).validate(),
            Err(RenderError::MissingTemplate)
        ));
        assert!(matches!(
            spec(None, None, Some("x"), Some(NOWHERE)).validate(),
            Err(RenderError::MissingJson)
        ));
    }

    #[test]
    fn both_sources_are_ambiguous_without_touching_disk() {
        assert!(matches!(
            spec(Some("1"), Some(NOWHERE), Some("x"), None).validate(),
            Err(RenderError::AmbiguousJson)
        ));
        assert!(matches!(
            spec(Some("1"), None, Some("x"), Some(NOWHERE)).validate(),
            Err(RenderError::AmbiguousTemplate)
        ));
        assert!(matches!(
            spec(Some("1"), Some(NOWHERE), Some("x"), Some(NOWHERE)).validate(),
            Err(RenderError::AmbiguousJson)
        ));
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let sources = spec(Some(""), Some(NOWHERE), Some("x"), Some(""))
            .validate()
            .unwrap();
        assert_eq!(sources.json, Source::File(NOWHERE.into()));
        assert_eq!(sources.template, Source::Literal("x".into()));

        assert!(matches!(
            spec(Some(""), Some(""), Some("x"), None).validate(),
            Err(RenderError::MissingJson)
        ));
    }

    #[test]
    fn files_are_read_whole() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("data.json");
        let template = dir.path().join("page.tmpl");
        std::fs::write(&json, "{\"name\": \"Нахман\"}\n").unwrap();
        std::fs::write(&template, "hi {{.name}}").unwrap();

        let (json, template) = InputSpec {
            json_file: Some(json),
            template_file: Some(template),
            ..Default::default()
        }
        .validate()
        .unwrap()
        .read()
        .unwrap();
        assert_eq!(json, "{\"name\": \"Нахман\"}\n");
        assert_eq!(template, "hi {{.name}}");
    }

    #[test]
    fn unreadable_file_names_input_and_path() {
        let err = spec(None, Some(NOWHERE), Some("x"), None)
            .validate()
            .unwrap()
            .read()
            .unwrap_err();
        match err {
            RenderError::Io {
                input,
                path,
                source,
            } => {
                assert_eq!(input, InputKind::Json);
                assert_eq!(path, PathBuf::from(NOWHERE));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("bad.tmpl");
        std::fs::write(&template, [0xff, 0xfe]).unwrap();

        let err = spec(Some("{}"), None, None, template.to_str())
            .validate()
            .unwrap()
            .read()
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Io {
                input: InputKind::Template,
                ..
            }
        ));
    }
}
