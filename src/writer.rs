//! Task rendering for the writer thread.
//!
//! A [`LogWriter`] accumulates one batch of rendered tasks in memory and hands
//! the whole batch to the sink in a single write followed by a flush.

use std::io::{self, Write};

use crate::{
    config::RenderSettings,
    stack::{self, Frame},
    task::Task,
};

/// Crate whose own frames are hidden from traces.
const OWN_CRATE: &str = env!("CARGO_CRATE_NAME");

pub(crate) struct LogWriter {
    buf: Vec<u8>,
    settings: RenderSettings,
}

impl LogWriter {
    pub(crate) fn new(settings: RenderSettings) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            settings,
        }
    }

    /// Replaces the render settings. Takes effect for the next task.
    pub(crate) fn reconfigure(&mut self, settings: RenderSettings) {
        self.settings = settings;
    }

    /// Renders `task` into the batch buffer, consuming it.
    pub(crate) fn write_task(&mut self, task: Task) {
        // Vec<u8> writes are infallible
        let _ = self.render(&task);
    }

    fn render(&mut self, task: &Task) -> io::Result<()> {
        let p = self.settings.palette;
        let wr = &mut self.buf;

        write!(wr, "{}", p.gray)?;
        if task
            .time()
            .format_into(&mut *wr, self.settings.time_format.as_ref())
            .is_err()
        {
            write!(wr, "{}", task.time())?;
        }
        writeln!(
            wr,
            "{} {}{}{} {}{}:{}{} {}",
            p.reset,
            task.color(),
            task.label(),
            p.reset,
            p.gray,
            task.file(),
            task.line(),
            p.reset,
            task.message(),
        )?;

        let context = task.context();
        if !context.is_empty() {
            writeln!(wr, "{}   included context:{}", p.gray, p.reset)?;
            for pair in context {
                writeln!(
                    wr,
                    "{}      {}:{} {}{}",
                    p.white, pair.label, p.gray, pair.value, p.reset
                )?;
            }
        }

        if let Some(snapshot) = task.stack() {
            for frame in stack::visible_frames(snapshot.frames(), OWN_CRATE) {
                self.render_frame(&frame)?;
            }
        }

        Ok(())
    }

    fn render_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let p = self.settings.palette;
        writeln!(
            self.buf,
            "{}   at {}{} {}{}:{}{}",
            p.gray,
            p.white,
            frame.display_name(self.settings.hide_prefix),
            p.gray,
            frame.file_name(),
            frame.line,
            p.reset,
        )
    }

    /// Writes the pending batch to the sink and flushes it.
    ///
    /// The buffer is cleared even when the sink fails, so a broken sink loses
    /// at most the batch in flight.
    pub(crate) fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let result = {
            let mut out = self.settings.output.lock();
            out.write_all(&self.buf).and_then(|()| out.flush())
        };
        self.buf.clear();
        result
    }
}
