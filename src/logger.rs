//! Producer side of the pipeline.
//!
//! ```text
//! [Producer threads] → [Lumo] → [Queue] → [writer thread] → [Sink]
//!        ↓               ↓         ↓             ↓              ↓
//!   format message   filter,    bounded,     render batch,   stdout,
//!   at call site     snapshot   FIFO         parse stacks    file, ...
//! ```
//!
//! Producers only format their message, optionally snapshot the stack, and
//! push. Everything touching the sink happens on the writer thread.

use std::{fmt, io, panic::Location, path::Path, sync::Arc};

use crate::{
    config::{self, Config, FATAL_EXIT_CODE},
    error::HasStackContext,
    level::Level,
    stack::StackSnapshot,
    task::{ContextPair, Task},
    worker::{Controller, WorkerStats},
};

/// Handle to a logging pipeline. Cheap to clone; all clones share one
/// writer thread and one configuration.
///
/// # Output format
///
/// ```text
/// 15/01/2024 14:30:45 UTC ERROR handler.rs:42 request failed: timeout
///    included context:
///       request_id: 12345
///    at app::handler::serve handler.rs:42
///    at app::main main.rs:9
/// ```
#[derive(Clone)]
pub struct Lumo {
    inner: Arc<Controller>,
}

impl Lumo {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(Controller::new(config)),
        }
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Debug, None, args, Location::caller());
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Info, None, args, Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, None, args, Location::caller());
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, None, args, Location::caller());
    }

    /// Logs, waits for the writer to drain, then calls the fatal hook.
    ///
    /// With the default hook the process exits with [`FATAL_EXIT_CODE`] and
    /// this never returns.
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Fatal, None, args, Location::caller());
    }

    #[track_caller]
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.emit(level, None, args, Location::caller());
    }

    /// Like [`Lumo::log`], reusing the stack and context carried by `cause`
    /// when the entry wants a stack trace.
    #[track_caller]
    pub fn log_with(&self, level: Level, cause: &dyn HasStackContext, args: fmt::Arguments<'_>) {
        self.emit(level, Some(cause), args, Location::caller());
    }

    /// Whether entries at `level` currently produce output.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.inner.state().read().config.min_level
    }

    /// Writes every pending entry and stops the writer thread.
    ///
    /// The next entry starts a new one.
    pub fn close(&self) {
        self.inner.stop_and_drain();
    }

    /// Replaces the destination. Takes effect with the next batch.
    pub fn set_output<W: io::Write + Send + 'static>(&self, wr: W) {
        self.inner.state().write().config.output = config::sink(wr);
    }

    /// Changes the minimum level. An installed logger also moves the `log`
    /// facade's max level, so facade records below the old minimum get
    /// through.
    pub fn set_level(&self, level: Level) {
        let mut state = self.inner.state().write();
        state.config.min_level = level;
        if state.config.installed {
            log::set_max_level(level.to_level_filter());
        }
    }

    /// Attach stack traces to warnings as well as errors.
    pub fn set_stack_on_warn(&self, enable: bool) {
        self.inner.state().write().config.stack_on_warn = enable;
    }

    /// Print trace function names without their crate prefix.
    pub fn set_hide_prefix(&self, enable: bool) {
        self.inner.state().write().config.hide_prefix = enable;
    }

    pub fn set_colors(&self, enable: bool) {
        self.inner.state().write().config.colors = enable;
    }

    pub fn stats(&self) -> WorkerStats {
        self.inner.stats()
    }

    /// Whether a writer thread is currently running.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Entries queued but not yet written.
    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    /// Marks this logger as the `log` facade's and aligns the facade's max
    /// level with the current minimum.
    pub(crate) fn mark_installed(&self) {
        let mut state = self.inner.state().write();
        state.config.installed = true;
        log::set_max_level(state.config.min_level.to_level_filter());
    }

    fn emit(
        &self,
        level: Level,
        cause: Option<&dyn HasStackContext>,
        args: fmt::Arguments<'_>,
        location: &'static Location<'static>,
    ) {
        self.emit_at(level, cause, args, file_name(location.file()), location.line());
    }

    fn emit_at(
        &self,
        level: Level,
        cause: Option<&dyn HasStackContext>,
        args: fmt::Arguments<'_>,
        file: &'static str,
        line: u32,
    ) {
        let (color, capture, on_fatal) = {
            let state = self.inner.state().read();
            let config = &state.config;
            if level < config.min_level {
                return;
            }
            (
                level.color(config.palette()),
                level.wants_stack(config.stack_on_warn),
                (level == Level::Fatal).then(|| config.on_fatal.clone()),
            )
        };

        let time = time::OffsetDateTime::now_utc();
        let message = fmt::format(args);

        let (stack, context) = if capture {
            stack_and_context(cause)
        } else {
            (None, Vec::new())
        };

        self.inner.enqueue(Task::new(
            level, color, time, file, line, message, stack, context,
        ));

        if let Some(on_fatal) = on_fatal {
            self.inner.stop_and_drain();
            on_fatal(FATAL_EXIT_CODE);
        }
    }
}

impl fmt::Debug for Lumo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lumo")
            .field("config", &self.inner.state().read().config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Reuses the cause's snapshot and pairs, or snapshots the stack here.
#[inline(never)]
fn stack_and_context(cause: Option<&dyn HasStackContext>) -> (Option<StackSnapshot>, Vec<ContextPair>) {
    let pairs = cause.map(|c| c.context_pairs().to_vec()).unwrap_or_default();
    let stack = cause
        .and_then(|c| c.stack_snapshot().cloned())
        .unwrap_or_else(StackSnapshot::capture);
    (Some(stack), pairs)
}

fn file_name(path: &'static str) -> &'static str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Routes records from the `log` facade into the pipeline.
///
/// `trace` records are written as `DEBUG`.
impl log::Log for Lumo {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Lumo::enabled(self, metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        let file = record.file_static().map(file_name).unwrap_or("unknown");
        self.emit_at(
            record.level().into(),
            None,
            *record.args(),
            file,
            record.line().unwrap_or(0),
        );
    }

    /// Drains the writer thread.
    fn flush(&self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        process::Command,
        sync::atomic::{AtomicBool, AtomicI32, Ordering},
        thread,
        time::Duration,
    };

    use super::*;
    use crate::{
        error::ContextError,
        test_support::{wait_for, Capture, Gate},
        ColorChoice, LumoBuilder,
    };

    /// Runs `f` against a plain-text logger and returns what it wrote.
    fn capture_log(level: Level, f: impl FnOnce(&Lumo)) -> String {
        let capture = Capture::default();
        let lumo = LumoBuilder::new()
            .with_writer(capture.clone())
            .with_level(level)
            .with_colors(ColorChoice::Never)
            .build()
            .expect("valid configuration");

        f(&lumo);
        lumo.close();
        capture.contents()
    }

    #[test]
    fn test_debug_formats_arguments() {
        let out = capture_log(Level::Debug, |log| crate::debug!(log, "n={}", 5));

        assert!(out.contains("DEBUG"));
        assert!(out.contains("n=5"));
        assert!(out.contains("logger.rs:"));
    }

    #[test]
    fn test_below_minimum_writes_nothing() {
        let capture = Capture::default();
        let lumo = LumoBuilder::new()
            .with_writer(capture.clone())
            .with_level(Level::Warn)
            .build()
            .expect("valid configuration");

        crate::info!(lumo, "not shown");
        assert_eq!(lumo.stats().starts, 0);
        lumo.close();
        assert!(capture.contents().is_empty());
    }

    #[test]
    fn test_call_site_is_the_caller() {
        let mut expected = 0;
        let out = capture_log(Level::Info, |log| {
            expected = line!() + 1;
            log.info(format_args!("here"));
        });

        assert!(out.contains(&format!("logger.rs:{expected} here")));
    }

    #[test]
    fn test_warn_stack_toggle() {
        let plain = capture_log(Level::Info, |log| crate::warn!(log, "Simple warning"));
        assert!(!plain.contains("   at "));

        let traced = capture_log(Level::Info, |log| {
            log.set_stack_on_warn(true);
            crate::warn!(log, "Complex warning");
        });
        assert!(traced.contains("   at "));
        assert!(traced.contains("test_warn_stack_toggle"));
    }

    #[test]
    fn test_error_always_traced() {
        let out = capture_log(Level::Info, |log| crate::error!(log, "Boom"));
        assert!(out.contains("ERROR"));
        assert!(out.contains("   at "));
    }

    #[test]
    fn test_cause_context_is_reused() {
        let out = capture_log(Level::Info, |log| {
            let err = ContextError::msg("validation failed").include("request_id", 12345);
            crate::error!(log, cause: err, "Handler crash: {}", err);
        });

        assert!(out.contains("Handler crash: validation failed"));
        assert!(out.contains("included context:"));
        assert!(out.contains("request_id: 12345"));
    }

    #[inline(never)]
    fn failing_operation() -> ContextError {
        ContextError::msg("deep error")
    }

    #[test]
    fn test_trace_points_at_wrap_site() {
        let out = capture_log(Level::Info, |log| {
            let err = failing_operation();
            crate::error!(log, cause: err, "Boom: {}", err);
        });

        let first_frame = out
            .lines()
            .find(|l| l.starts_with("   at "))
            .expect("trace rendered");
        assert!(first_frame.contains("failing_operation"), "{first_frame}");
    }

    #[test]
    fn test_info_ignores_cause() {
        let out = capture_log(Level::Info, |log| {
            let err = ContextError::msg("minor").include("k", 1);
            crate::info!(log, cause: err, "note: {}", err);
        });

        assert!(out.contains("note: minor"));
        assert!(!out.contains("included context:"));
        assert!(!out.contains("   at "));
    }

    #[test]
    fn test_hide_prefix() {
        let shown = capture_log(Level::Info, |log| crate::error!(log, "x"));
        assert!(shown.contains("at lumo::logger::tests::test_hide_prefix"));

        let hidden = capture_log(Level::Info, |log| {
            log.set_hide_prefix(true);
            crate::error!(log, "x");
        });
        assert!(hidden.contains("at logger::tests::test_hide_prefix"));
    }

    #[test]
    fn test_fatal_drains_then_calls_hook() {
        let capture = Capture::default();
        let code = Arc::new(AtomicI32::new(0));
        let seen = code.clone();
        let lumo = LumoBuilder::new()
            .with_writer(capture.clone())
            .with_colors(ColorChoice::Never)
            .with_fatal_hook(move |c| seen.store(c, Ordering::SeqCst))
            .build()
            .expect("valid configuration");

        for i in 0..50 {
            crate::info!(lumo, "queued {}", i);
        }
        crate::fatal!(lumo, "Critical Failure");

        assert_eq!(code.load(Ordering::SeqCst), FATAL_EXIT_CODE);
        assert!(!lumo.is_active());
        let out = capture.contents();
        assert!(out.contains("queued 49"));
        assert!(out.contains("FATAL"));
        assert!(out.contains("Critical Failure"));
    }

    #[test]
    fn test_fatal_exits_process() {
        if std::env::var_os("LUMO_TEST_FATAL").is_some() {
            let lumo = LumoBuilder::new()
                .with_colors(ColorChoice::Never)
                .build()
                .expect("valid configuration");
            crate::fatal!(lumo, "Critical Failure");
            return;
        }

        let exe = std::env::current_exe().expect("test binary path");
        let output = Command::new(exe)
            .args(["--exact", "logger::tests::test_fatal_exits_process", "--nocapture"])
            .env("LUMO_TEST_FATAL", "1")
            .output()
            .expect("spawn test binary");

        assert_eq!(output.status.code(), Some(FATAL_EXIT_CODE));
        assert!(String::from_utf8_lossy(&output.stdout).contains("FATAL"));
    }

    #[test]
    fn test_log_facade_record() {
        let out = capture_log(Level::Debug, |lumo| {
            log::Log::log(
                lumo,
                &log::Record::builder()
                    .args(format_args!("from facade"))
                    .level(log::Level::Trace)
                    .file_static(Some("src/net/conn.rs"))
                    .line(Some(23))
                    .build(),
            );
        });

        assert!(out.contains("DEBUG conn.rs:23 from facade"));
    }

    #[test]
    fn test_output_can_be_swapped() {
        let first = Capture::default();
        let second = Capture::default();
        let lumo = LumoBuilder::new()
            .with_writer(first.clone())
            .with_colors(ColorChoice::Never)
            .build()
            .expect("valid configuration");

        crate::info!(lumo, "to first");
        lumo.close();
        lumo.set_output(second.clone());
        crate::info!(lumo, "to second");
        lumo.close();

        assert!(first.contents().contains("to first"));
        assert!(!first.contents().contains("to second"));
        assert!(second.contents().contains("to second"));
    }

    #[test]
    fn test_set_level_takes_effect() {
        let out = capture_log(Level::Info, |log| {
            crate::debug!(log, "before");
            assert!(!log.enabled(Level::Debug));

            log.set_level(Level::Debug);
            assert!(log.enabled(Level::Debug));
            crate::debug!(log, "after");

            log.set_level(Level::Error);
            crate::warn!(log, "muted");
        });

        assert!(!out.contains("before"));
        assert!(out.contains("DEBUG logger.rs:"));
        assert!(out.contains("after"));
        assert!(!out.contains("muted"));
    }

    #[test]
    fn test_set_colors() {
        let plain = capture_log(Level::Info, |log| crate::info!(log, "plain"));
        assert!(!plain.contains('\x1b'));

        let colored = capture_log(Level::Info, |log| {
            log.set_colors(true);
            crate::info!(log, "colored");
        });
        assert!(colored.contains("\x1b[32m INFO\x1b[0m"));
    }

    #[test]
    fn test_pending_counts_queued_entries() {
        let gate = Gate::default();
        let lumo = LumoBuilder::new()
            .with_writer(gate.clone())
            .with_colors(ColorChoice::Never)
            .build()
            .expect("valid configuration");
        assert_eq!(lumo.pending(), 0);

        crate::info!(lumo, "first");
        wait_for("writer to pick up the first entry", || lumo.pending() == 0);
        // the writer is now held inside the sink
        thread::sleep(Duration::from_millis(20));
        crate::info!(lumo, "second");
        crate::info!(lumo, "third");
        assert_eq!(lumo.pending(), 2);

        let opener = gate.open_after(Duration::ZERO);
        lumo.close();
        opener.join().expect("opener panicked");

        assert_eq!(lumo.pending(), 0);
        assert_eq!(gate.capture().contents().lines().count(), 3);
    }

    #[test]
    fn test_fatal_during_close_is_written_before_hook() {
        let gate = Gate::default();
        let written = Arc::new(AtomicBool::new(false));
        let lumo = {
            let capture = gate.capture().clone();
            let written = written.clone();
            LumoBuilder::new()
                .with_writer(gate.clone())
                .with_colors(ColorChoice::Never)
                .with_fatal_hook(move |_| {
                    written.store(capture.contents().contains("FATAL"), Ordering::SeqCst)
                })
                .build()
                .expect("valid configuration")
        };

        for i in 0..20 {
            crate::info!(lumo, "entry {}", i);
        }
        let closer = {
            let lumo = lumo.clone();
            thread::spawn(move || lumo.close())
        };
        wait_for("close to begin", || lumo.inner.is_draining());
        let opener = gate.open_after(Duration::from_millis(20));

        crate::fatal!(lumo, "shutting down");
        assert!(written.load(Ordering::SeqCst));

        closer.join().expect("closer panicked");
        opener.join().expect("opener panicked");
        let out = gate.capture().contents();
        let last = out.find("entry 19").expect("backlog written");
        let fatal = out.find("FATAL").expect("fatal written");
        assert!(last < fatal);
    }
}
