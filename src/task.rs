use std::fmt;

use time::OffsetDateTime;

use crate::{level::Level, stack::StackSnapshot};

/// A labelled value attached to a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPair {
    pub label: String,
    /// Rendering of the value, taken when the pair was attached.
    pub value: String,
}

impl ContextPair {
    /// Renders `value` with `Debug`, so strings keep their quotes.
    pub fn new(label: impl Into<String>, value: &impl fmt::Debug) -> Self {
        Self {
            label: label.into(),
            value: format!("{value:?}"),
        }
    }

    /// Renders `value` with `Display`.
    pub fn display(label: impl Into<String>, value: &impl fmt::Display) -> Self {
        Self {
            label: label.into(),
            value: value.to_string(),
        }
    }
}

/// One log event, built by a producer and consumed once by the writer.
#[derive(Debug)]
pub(crate) struct Task {
    level: Level,
    color: &'static str,
    time: OffsetDateTime,
    file: &'static str,
    line: u32,
    message: String,
    stack: Option<StackSnapshot>,
    context: Vec<ContextPair>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        level: Level,
        color: &'static str,
        time: OffsetDateTime,
        file: &'static str,
        line: u32,
        message: String,
        stack: Option<StackSnapshot>,
        context: Vec<ContextPair>,
    ) -> Self {
        Self {
            level,
            color,
            time,
            file,
            line,
            message,
            stack,
            context,
        }
    }

    /// Fixed-width label of the entry's level.
    pub(crate) fn label(&self) -> &'static str {
        self.level.label()
    }

    pub(crate) fn color(&self) -> &'static str {
        self.color
    }

    pub(crate) fn time(&self) -> OffsetDateTime {
        self.time
    }

    pub(crate) fn file(&self) -> &'static str {
        self.file
    }

    pub(crate) fn line(&self) -> u32 {
        self.line
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn stack(&self) -> Option<&StackSnapshot> {
        self.stack.as_ref()
    }

    pub(crate) fn context(&self) -> &[ContextPair] {
        &self.context
    }
}
