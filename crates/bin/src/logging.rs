use std::{
    cmp::min,
    io::{self, Write},
    iter::repeat,
};

use supports_color::{on as supports_color_on_stream, Stream::Stderr};
use tracing::{
    level_filters::{LevelFilter, STATIC_MAX_LEVEL},
    subscriber::set_global_default,
};
use tracing_subscriber::{
    filter::targets::Targets,
    fmt::{fmt, MakeWriter},
    layer::SubscriberExt,
};

/// Crates whose events are shown below `trace` level.
const TARGETS: [&str; 2] = ["json_render", "stencil"];

/// Writes log lines to stderr, which is kept free for diagnostics.
struct ErrorFreeWriter;

impl io::Write for &ErrorFreeWriter {
    // Behave as if writing to /dev/null on failure so that logging
    // keeps working.

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write(buf).or(Ok(buf.len()))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::stderr().write_all(buf).or(Ok(()))
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        io::stderr()
            .write_vectored(bufs)
            .or_else(|_| Ok(bufs.iter().map(|io_slice| io_slice.len()).sum()))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush().or(Ok(()))
    }
}

impl<'a> MakeWriter<'a> for ErrorFreeWriter {
    type Writer = &'a Self;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

pub fn logging(log_level: LevelFilter) {
    // Calculate log_level
    let log_level = min(log_level, STATIC_MAX_LEVEL);

    let allowed_targets = (log_level != LevelFilter::TRACE).then_some(TARGETS);

    // Disable time, target, file, line_num, thread name/ids to make the
    // output more readable
    let subscriber_builder = fmt()
        .with_max_level(log_level)
        .with_writer(ErrorFreeWriter)
        .without_time()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_thread_ids(false);

    let stderr_supports_color = supports_color_on_stream(Stderr)
        .map(|color_level| color_level.has_basic)
        .unwrap_or_default();

    let subscriber = subscriber_builder
        .with_ansi(stderr_supports_color)
        .finish();

    // Builder layer for filtering
    let filter_layer = allowed_targets.map(|allowed_targets| {
        Targets::new().with_targets(allowed_targets.into_iter().zip(repeat(log_level)))
    });

    // Builder final subscriber with filtering
    let subscriber = subscriber.with(filter_layer);

    // Setup global subscriber; keep any subscriber installed before us.
    set_global_default(subscriber).ok();
}
