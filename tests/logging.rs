//! Configuration-error logging (spec §7: "logged to stderr; offending
//! sub-mode disabled; execution continues").
//!
//! Grounded in the pack's `tracing_subscriber`-based test capture pattern
//! (`examples/hashintel-hash/libs/error-stack/tests/test_span_trace.rs`):
//! install a subscriber that writes to a shared buffer for the duration of
//! one test, then inspect the captured text.

use std::io;
use std::sync::{Arc, Mutex};

use ccs_profiler::{report, ProfilerConfig, ProfilerContext, ReportHeader, Verbosity};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn report_with_no_open_log_file_warns_instead_of_panicking() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut config = ProfilerConfig::default();
        config.verbosity = Verbosity::Summary;
        let ctx = ProfilerContext::init(config);
        // No `open_prof_log` call: spec §7 says this is a recoverable
        // configuration error, not a panic.
        let result = report(
            &ctx,
            &ReportHeader {
                timestamp: "Mon Jan 1 00:00".into(),
                program: "prog".into(),
                rts_args: "".into(),
                prog_args: "".into(),
            },
        );
        assert!(result.is_ok());
    });

    let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(
        text.contains("no open .prof log file"),
        "expected a warning about the missing log file, got: {text}"
    );
}
