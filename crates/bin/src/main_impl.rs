use std::{io, process::Termination, time::Instant};

use crate::{
    args,
    bin_util::MainExit,
    errors::RenderError,
    logging::logging,
    render::{self, Stencil},
    resolve::InputSpec,
};

pub fn do_main() -> impl Termination {
    let args = args::parse();

    logging(args.log_level);

    let start = Instant::now();

    let result = run(args.input_spec());

    MainExit::new(result, start.elapsed())
}

/// Resolve both inputs, render, and only then touch stdout.
fn run(spec: InputSpec) -> Result<(), RenderError> {
    let (json, template) = spec.validate()?.read()?;
    let rendered = render::render(&Stencil, &json, &template)?;

    render::emit(&mut io::stdout().lock(), &rendered)
}
