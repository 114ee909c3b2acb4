//! Console logging through a lazily started, self-retiring writer thread.
//!
//! Producers on any thread format their message and push it into a bounded
//! queue; a single writer thread renders and flushes entries in the order they
//! were queued. The writer exists only while there is work: the first entry
//! starts it, and it exits after a quiet `cooldown`. Error entries carry a
//! filtered stack trace, either captured at the log call or reused from a
//! [`ContextError`] captured where the failure happened.
//!
//! ```rust, ignore
//! let log = lumo::LumoBuilder::from_env()?.with_stack_on_warn(true).build()?;
//!
//! lumo::info!(log, "listening on {}", addr);
//! let err = lumo::ContextError::wrap(io_err).include("path", &path);
//! lumo::error!(log, cause: err, "cannot open: {}", err);
//!
//! log.close(); // flush before exit
//! ```

use std::{io, sync::Arc, time::Duration};

pub use crate::{
    color::ColorChoice,
    config::{DEFAULT_CAPACITY, DEFAULT_COOLDOWN, FATAL_EXIT_CODE},
    error::{ContextError, HasStackContext},
    level::{Level, ParseLevelError},
    logger::Lumo,
    stack::{visible_frames, Frame, Frames, StackSnapshot, MAX_FRAMES},
    task::ContextPair,
    worker::WorkerStats,
};

mod macros;

pub(crate) mod channel;
pub(crate) mod color;
pub(crate) mod config;
mod error;
mod level;
mod logger;
mod stack;
mod task;
pub(crate) mod worker;
pub(crate) mod writer;

/// Environment variable holding the minimum level for [`LumoBuilder::from_env`].
pub const LEVEL_ENV: &str = "LUMO_LEVEL";

/// Environment variable enabling stack traces on warnings for [`LumoBuilder::from_env`].
pub const STACK_ON_WARN_ENV: &str = "LUMO_STACK_ON_WARN";

/// Drains the pipeline when dropped.
///
/// Returned by [`LumoBuilder::install`]; keep it alive for the duration of
/// `main`.
pub struct LumoGuard {
    lumo: Lumo,
}

impl LumoGuard {
    pub fn logger(&self) -> &Lumo {
        &self.lumo
    }
}

impl Drop for LumoGuard {
    fn drop(&mut self) {
        self.lumo.close();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LumoBuilderError {
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(#[from] time::error::InvalidFormatDescription),
    #[error("{0}")]
    InvalidLevel(#[from] ParseLevelError),
    #[error("{0}")]
    SetLoggerError(#[from] log::SetLoggerError),
}

pub struct LumoBuilder {
    wr: Option<Box<dyn io::Write + Send>>,
    level: Level,
    capacity: usize,
    cooldown: Duration,
    stack_on_warn: bool,
    hide_prefix: bool,
    colors: ColorChoice,
    time_format: Option<String>,
    on_fatal: Option<Arc<dyn Fn(i32) + Send + Sync>>,
}

impl Default for LumoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LumoBuilder {
    pub fn new() -> Self {
        Self {
            wr: None,
            level: Level::Info,
            capacity: DEFAULT_CAPACITY,
            cooldown: DEFAULT_COOLDOWN,
            stack_on_warn: false,
            hide_prefix: false,
            colors: ColorChoice::Auto,
            time_format: None,
            on_fatal: None,
        }
    }

    /// Starts from [`LEVEL_ENV`] and [`STACK_ON_WARN_ENV`] where set.
    pub fn from_env() -> Result<Self, LumoBuilderError> {
        let mut builder = Self::new();
        if let Ok(level) = std::env::var(LEVEL_ENV) {
            builder.level = level.parse()?;
        }
        if let Ok(flag) = std::env::var(STACK_ON_WARN_ENV) {
            builder.stack_on_warn = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(builder)
    }

    /// Destination for rendered entries. Defaults to stdout.
    pub fn with_writer<W: io::Write + Send + 'static>(mut self, wr: W) -> Self {
        self.wr = Some(Box::new(wr));
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Number of entries the queue holds before producers block.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// How long the writer thread waits for new entries before exiting.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_stack_on_warn(mut self, enable: bool) -> Self {
        self.stack_on_warn = enable;
        self
    }

    pub fn with_hide_prefix(mut self, enable: bool) -> Self {
        self.hide_prefix = enable;
        self
    }

    pub fn with_colors(mut self, colors: ColorChoice) -> Self {
        self.colors = colors;
        self
    }

    /// A `time` format description, e.g. `[hour]:[minute]:[second]`.
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    /// Replaces the process exit run after a fatal entry is flushed.
    pub fn with_fatal_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.on_fatal = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Lumo, LumoBuilderError> {
        if self.capacity == 0 {
            return Err(LumoBuilderError::ZeroCapacity);
        }

        let time_format = match self.time_format {
            Some(format) => Arc::new(time::format_description::parse_owned::<2>(&format)?),
            None => config::default_time_format(),
        };
        let output = match self.wr {
            Some(wr) => Arc::new(parking_lot::Mutex::new(wr)),
            None => config::sink(io::stdout()),
        };

        Ok(Lumo::new(config::Config {
            output,
            min_level: self.level,
            stack_on_warn: self.stack_on_warn,
            hide_prefix: self.hide_prefix,
            colors: self.colors.enabled(),
            time_format,
            capacity: self.capacity,
            cooldown: self.cooldown,
            on_fatal: self.on_fatal.unwrap_or_else(config::exit_process),
            installed: false,
        }))
    }

    /// Builds the logger and registers it with the `log` facade.
    pub fn install(self) -> Result<LumoGuard, LumoBuilderError> {
        let lumo = self.build()?;
        log::set_boxed_logger(Box::new(lumo.clone()))?;
        lumo.mark_installed();
        Ok(LumoGuard { lumo })
    }
}
