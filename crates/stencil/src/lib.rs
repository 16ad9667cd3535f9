//! Small action-based text templating over JSON values.
//!
//! Stencil parses a template into a tree of text and actions, and then
//! evaluates the actions against one [`serde_json::Value`]. Unlike leaner
//! substitution engines it has a little logic: conditionals, loops and a
//! handful of built-in functions.
//!
//! # Syntax
//!
//! ```plain
//! {{.lastName}} {{.firstName}}
//! {{if .admin}}(admin){{else}}(user){{end}}
//! {{range .tags}}#{{.}} {{end}}
//! ```
//!
//! Actions are delimited by `{{` and `}}`. Everything else is copied as-is.
//! Inside an action, `.` is the current value (the data at first), `.name`
//! looks a key up in it, and `$` always refers to the data passed to the
//! render. `{{- ` and ` -}}` trim the whitespace before or after an action,
//! and `{{/* ... */}}` is a comment.
//!
//! Commands can be chained with `|`, which passes the result of one as the
//! last argument of the next: `{{.items | len}}`. The built-in functions are
//! `and`, `or`, `not`, `eq`, `ne`, `lt`, `le`, `gt`, `ge`, `len`, `index`,
//! `print` and `println`.
//!
//! # Usage
//!
//! A template is first parsed:
//!
//! ```
//! use stencil::Template;
//!
//! let template = Template::parse("greeting", "hello {{.name}}").unwrap();
//! ```
//!
//! The template can be inspected, for example to check if a field is used:
//!
//! ```
//! # use stencil::Template;
//! #
//! # let template = Template::parse("greeting", "hello {{.name}}").unwrap();
//! assert!(template.has_field("name"));
//! ```
//!
//! The template can be rendered to a string:
//!
//! ```
//! # use stencil::Template;
//! use serde_json::json;
//! #
//! # let template = Template::parse("greeting", "hello {{.name}}").unwrap();
//! assert_eq!(
//!     template.render(&json!({ "name": "marcus" })).unwrap(),
//!     "hello marcus",
//! );
//! ```
//!
//! …or to a writer:
//!
//! ```
//! # use stencil::Template;
//! use serde_json::json;
//! #
//! # let template = Template::parse("greeting", "hello {{.name}}").unwrap();
//! let mut buf: Vec<u8> = Vec::new();
//! template.render_into(&mut buf, &json!({ "name": "julius" })).unwrap();
//! assert_eq!(buf.as_slice(), b"hello julius");
//! ```
//!
//! # Missing keys
//!
//! By default a key that is absent from an object evaluates to "no value",
//! which prints as `<no value>`. With [`MissingKey::Error`] the render fails
//! instead:
//!
//! ```
//! use stencil::{MissingKey, Template};
//! use serde_json::json;
//!
//! let template = Template::parse("greeting", "hello {{.name}}")
//!     .unwrap()
//!     .with_missing_key(MissingKey::Error);
//! let err = template.render(&json!({})).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     r#"template: greeting:1:9: executing "greeting" at <.name>: map has no entry for key "name""#,
//! );
//! ```
//!
//! # Errors
//!
//! Stencil will return a [`ParseError`] if the template fails to parse, for
//! example on an unclosed action or an unknown function.
//!
//! It will return a [`RenderError::Exec`] if an action fails to evaluate, and
//! pass through I/O errors when using [`Template::render_into()`].

#[doc(inline)]
pub use error::*;

#[doc(inline)]
pub use template::{MissingKey, Template};

mod error;
mod exec;
mod funcs;
mod parser;
mod template;
mod values;
