use std::{ffi::OsString, path::PathBuf};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::resolve::InputSpec;

#[derive(Debug, Parser)]
#[clap(
    version,
    about = "Render a text template against one JSON document.",
    long_about = "Render a text template against one JSON document.

The JSON comes from exactly one of --json and --json-file, the template from \
exactly one of --template and --template-file. Looking up a key that is absent \
from the data fails the render, and nothing is printed on failure.

Long flags can also be spelled with a single dash, e.g. `-json-file data.json`."
)]
pub struct Args {
    /// JSON document to render against, given inline.
    #[clap(
        help_heading = "Data",
        long,
        value_name = "JSON",
        allow_hyphen_values = true
    )]
    pub json: Option<String>,

    /// Path of a file holding the JSON document.
    #[clap(help_heading = "Data", long, value_name = "PATH")]
    pub json_file: Option<PathBuf>,

    /// Template text, given inline.
    #[clap(
        help_heading = "Template",
        long,
        value_name = "TEXT",
        allow_hyphen_values = true
    )]
    pub template: Option<String>,

    /// Path of a file holding the template.
    #[clap(help_heading = "Template", long, value_name = "PATH")]
    pub template_file: Option<PathBuf>,

    /// Diagnostics log level.
    ///
    /// Logs go to stderr, stdout only ever holds the rendered output.
    ///
    /// Set to `debug` to see which sources were used and how long rendering
    /// took.
    #[clap(
        help_heading = "Meta",
        long,
        default_value = "off",
        value_name = "LEVEL"
    )]
    pub log_level: LevelFilter,

    /// Equivalent to setting `log_level` to `off`.
    ///
    /// This would override the `log_level`.
    #[clap(help_heading = "Meta", short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn input_spec(&self) -> InputSpec {
        InputSpec {
            literal_json: self.json.clone(),
            json_file: self.json_file.clone(),
            literal_template: self.template.clone(),
            template_file: self.template_file.clone(),
        }
    }
}

/// Long flags that are also accepted with a single dash.
const LONG_FLAGS: &[&str] = &[
    "json",
    "json-file",
    "template",
    "template-file",
    "log-level",
    "quiet",
    "help",
    "version",
];

/// Flags whose value may follow as a separate argument.
const VALUE_FLAGS: &[&str] = &["json", "json-file", "template", "template-file", "log-level"];

/// Rewrite `-json-file x` style flags into `--json-file x`.
///
/// Flag values are passed through untouched, as is everything after `--`.
fn normalize(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    // Program name
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();
    let mut value_next = false;

    while let Some(arg) = args.next() {
        if value_next {
            value_next = false;
            normalized.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };

        if text == "--" {
            normalized.push(arg);
            normalized.extend(&mut args);
            break;
        }

        let (flag, rewritten) = if let Some(flag) = text.strip_prefix("--") {
            (flag, None)
        } else if let Some(flag) = text.strip_prefix('-') {
            let name = flag.split_once('=').map_or(flag, |(name, _)| name);
            if LONG_FLAGS.contains(&name) {
                (flag, Some(OsString::from(format!("-{text}"))))
            } else {
                (flag, None)
            }
        } else {
            normalized.push(arg);
            continue;
        };

        value_next = !flag.contains('=') && VALUE_FLAGS.contains(&flag);
        normalized.push(rewritten.unwrap_or(arg));
    }

    normalized
}

/// Parse `args`, which start with the program name.
pub fn try_parse_from<I>(args: I) -> Result<Args, clap::Error>
where
    I: IntoIterator<Item = OsString>,
{
    let mut opts = Args::try_parse_from(normalize(args))?;
    if opts.quiet {
        opts.log_level = LevelFilter::OFF;
    }
    Ok(opts)
}

/// Parse the process arguments, exiting with clap's usage message on error.
pub fn parse() -> Args {
    try_parse_from(std::env::args_os()).unwrap_or_else(|err| err.exit())
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn parse_ok(args: &[&str]) -> Args {
        try_parse_from(os(args)).unwrap()
    }

    #[test]
    fn verify_cli() {
        Args::command().debug_assert()
    }

    #[test]
    fn single_dash_long_flags() {
        assert_eq!(
            normalize(os(&["json-render", "-json", "{}", "-template-file=t.tmpl", "-q"])),
            os(&["json-render", "--json", "{}", "--template-file=t.tmpl", "-q"])
        );

        let args = parse_ok(&["json-render", "-json-file", "data.json", "-template", "{{.}}"]);
        assert_eq!(args.json_file, Some(PathBuf::from("data.json")));
        assert_eq!(args.template.as_deref(), Some("{{.}}"));
    }

    #[test]
    fn values_are_never_rewritten() {
        let args = parse_ok(&["json-render", "-template", "-json", "-json", "-1"]);
        assert_eq!(args.template.as_deref(), Some("-json"));
        assert_eq!(args.json.as_deref(), Some("-1"));

        let args = parse_ok(&["json-render", "--template", "-quiet"]);
        assert_eq!(args.template.as_deref(), Some("-quiet"));
        assert!(!args.quiet);
    }

    #[test]
    fn double_dash_flags_and_equals() {
        let args = parse_ok(&[
            "json-render",
            "--json={\"a\":1}",
            "--template-file",
            "page.tmpl",
        ]);
        let spec = args.input_spec();
        assert_eq!(spec.literal_json.as_deref(), Some("{\"a\":1}"));
        assert_eq!(spec.template_file, Some(PathBuf::from("page.tmpl")));
        assert_eq!(spec.literal_template, None);
        assert_eq!(spec.json_file, None);
    }

    #[test]
    fn log_level_defaults_off_and_quiet_wins() {
        assert_eq!(parse_ok(&["json-render"]).log_level, LevelFilter::OFF);
        assert_eq!(
            parse_ok(&["json-render", "-log-level", "debug"]).log_level,
            LevelFilter::DEBUG
        );
        assert_eq!(
            parse_ok(&["json-render", "--log-level=debug", "--quiet"]).log_level,
            LevelFilter::OFF
        );
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(try_parse_from(os(&["json-render", "-data", "{}"])).is_err());
        assert!(try_parse_from(os(&["json-render", "--json"])).is_err());
    }
}
