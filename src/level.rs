use std::{fmt, str::FromStr};

use crate::color::Palette;

/// Severity of a log entry. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    /// Logs, drains the writer, then terminates the process.
    Fatal,
}

impl Level {
    /// Fixed-width label printed in the level column.
    pub const fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    pub(crate) const fn color(self, palette: &Palette) -> &'static str {
        match self {
            Level::Debug => palette.magenta,
            Level::Info => palette.green,
            Level::Warn => palette.yellow,
            Level::Error | Level::Fatal => palette.red,
        }
    }

    /// Whether entries of this level carry a stack trace.
    pub(crate) const fn wants_stack(self, stack_on_warn: bool) -> bool {
        match self {
            Level::Error | Level::Fatal => true,
            Level::Warn => stack_on_warn,
            Level::Debug | Level::Info => false,
        }
    }

    pub(crate) const fn to_level_filter(self) -> log::LevelFilter {
        match self {
            // trace records are folded into debug
            Level::Debug => log::LevelFilter::Trace,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            Level::Error | Level::Fatal => log::LevelFilter::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().trim_start())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" | "panic" => Ok(Level::Fatal),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}
