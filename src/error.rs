use std::{error::Error as StdError, fmt};

use crate::{stack::StackSnapshot, task::ContextPair};

/// Values that carry their own failure-site stack and context.
///
/// When passed as the cause of a `warn`, `error` or `fatal` entry, the
/// snapshot and pairs are reused verbatim so the trace points at where the
/// failure was wrapped rather than where it was logged.
pub trait HasStackContext {
    fn stack_snapshot(&self) -> Option<&StackSnapshot>;

    fn context_pairs(&self) -> &[ContextPair] {
        &[]
    }
}

/// An error annotated with the stack at wrap time and labelled context.
///
/// ```rust, ignore
/// let err = ContextError::wrap(io_err)
///     .include_display("path", path.display())
///     .include("attempt", 3);
/// lumo::error!(log, cause: err, "failed to open config: {}", err);
/// ```
pub struct ContextError {
    inner: Box<dyn StdError + Send + Sync>,
    stack: StackSnapshot,
    context: Vec<ContextPair>,
}

impl ContextError {
    /// Creates an error from a message.
    #[inline(never)]
    pub fn msg(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            inner: text.into(),
            stack: StackSnapshot::capture(),
            context: Vec::new(),
        }
    }

    /// Wraps `err`, capturing the current stack.
    ///
    /// Wrapping a `ContextError` again returns it unchanged, keeping the
    /// stack of the first wrap.
    #[inline(never)]
    pub fn wrap<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        match err.into().downcast::<ContextError>() {
            Ok(existing) => *existing,
            Err(inner) => Self {
                inner,
                stack: StackSnapshot::capture(),
                context: Vec::new(),
            },
        }
    }

    /// Attaches a labelled value, rendered with its `Debug` form.
    pub fn include(mut self, label: impl Into<String>, value: impl fmt::Debug) -> Self {
        self.context.push(ContextPair::new(label, &value));
        self
    }

    /// Attaches a labelled value, rendered with its `Display` form.
    pub fn include_display(mut self, label: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.push(ContextPair::display(label, &value));
        self
    }

    pub fn context(&self) -> &[ContextPair] {
        &self.context
    }

    /// The wrapped error, without stack or context.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.inner
    }
}

impl HasStackContext for ContextError {
    fn stack_snapshot(&self) -> Option<&StackSnapshot> {
        Some(&self.stack)
    }

    fn context_pairs(&self) -> &[ContextPair] {
        &self.context
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextError")
            .field("inner", &self.inner)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}
