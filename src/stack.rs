//! Stack capture and trace filtering.
//!
//! A [`StackSnapshot`] records instruction pointers only. Symbol resolution is
//! deferred to the writer thread and happens one frame at a time, so a trace
//! that is cut off after [`MAX_FRAMES`] never pays for resolving the rest.

use std::{collections::VecDeque, fmt, path::Path, sync::Arc};

use backtrace::{Backtrace, BacktraceFrame};

/// Maximum number of frames rendered per trace.
pub const MAX_FRAMES: usize = 5;

/// Crates whose frames belong to the runtime or the test harness.
const RUNTIME_CRATES: &[&str] = &["std", "core", "alloc", "test", "backtrace"];

/// Opaque, cheaply cloned snapshot of a call stack.
#[derive(Clone)]
pub struct StackSnapshot {
    trace: Arc<Backtrace>,
}

impl StackSnapshot {
    /// Snapshots the calling thread's stack.
    #[inline(never)]
    pub fn capture() -> Self {
        Self {
            trace: Arc::new(Backtrace::new_unresolved()),
        }
    }

    /// A snapshot with no frames.
    pub fn empty() -> Self {
        Self {
            trace: Arc::new(Backtrace::from(Vec::<BacktraceFrame>::new())),
        }
    }

    /// Number of raw frames, before symbolization and filtering.
    pub fn depth(&self) -> usize {
        self.trace.frames().len()
    }

    /// Resolves frames lazily, innermost first. Each call starts over.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            raw: self.trace.frames().iter(),
            pending: VecDeque::new(),
        }
    }
}

impl fmt::Debug for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackSnapshot")
            .field("depth", &self.depth())
            .finish()
    }
}

/// One symbolized stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled path without the trailing hash, e.g. `app::net::connect`.
    pub function: String,
    /// Crate the function belongs to.
    pub module: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        let function = function.into();
        let module = crate_of(&function).to_owned();
        Self {
            function,
            module,
            file: file.into(),
            line,
        }
    }

    /// Frame from the toolchain's own libraries or the test harness.
    pub fn is_runtime(&self) -> bool {
        if RUNTIME_CRATES.contains(&self.module.as_str()) {
            return true;
        }

        let file = self.file.replace('\\', "/");
        file.starts_with("/rustc/")
            || ["std", "core", "alloc", "test"]
                .iter()
                .any(|lib| file.contains(&format!("library/{lib}/src/")))
    }

    /// Frame from test code: an integration test file or a `tests` module.
    pub fn is_test(&self) -> bool {
        let in_tests_dir = Path::new(&self.file)
            .components()
            .any(|c| c.as_os_str() == "tests");

        in_tests_dir
            || self
                .function
                .split("::")
                .any(|segment| segment == "tests" || segment == "test")
    }

    /// Whether this frame should appear in a rendered trace.
    ///
    /// Runtime frames are always hidden. Frames from `own_crate` are hidden
    /// unless they come from its tests.
    pub fn is_visible(&self, own_crate: &str) -> bool {
        if self.is_runtime() {
            return false;
        }
        self.module != own_crate || self.is_test()
    }

    /// Base name of the source file.
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file)
    }

    /// Function path for display, optionally without its crate segment.
    pub fn display_name(&self, hide_prefix: bool) -> &str {
        if !hide_prefix {
            return &self.function;
        }
        self.function
            .strip_prefix(self.module.as_str())
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(&self.function)
    }
}

/// First path segment of a demangled function name.
///
/// `<app::Conn as core::fmt::Debug>::fmt` belongs to `app`.
fn crate_of(function: &str) -> &str {
    let name = function.trim_start_matches('<');
    let end = name
        .find(|c: char| c == ':' || c == ' ' || c == '<' || c == '>')
        .unwrap_or(name.len());
    &name[..end]
}

/// Lazily symbolized frames of a [`StackSnapshot`].
pub struct Frames<'a> {
    raw: std::slice::Iter<'a, BacktraceFrame>,
    /// Inlined symbols resolved from the last raw frame.
    pending: VecDeque<Frame>,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }

            let raw = self.raw.next()?;
            backtrace::resolve(raw.ip(), |symbol| {
                let (Some(name), Some(file), Some(line)) =
                    (symbol.name(), symbol.filename(), symbol.lineno())
                else {
                    return;
                };
                self.pending.push_back(Frame::new(
                    format!("{name:#}"),
                    file.to_string_lossy(),
                    line,
                ));
            });
        }
    }
}

/// Filters `frames` down to the ones worth showing, at most [`MAX_FRAMES`].
pub fn visible_frames<'a, I>(frames: I, own_crate: &'a str) -> impl Iterator<Item = Frame> + 'a
where
    I: IntoIterator<Item = Frame>,
    I::IntoIter: 'a,
{
    frames
        .into_iter()
        .filter(move |frame| frame.is_visible(own_crate))
        .take(MAX_FRAMES)
}
