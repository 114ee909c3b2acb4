use std::{fmt, io, sync::Arc, time::Duration};

use parking_lot::Mutex;
use time::format_description::{FormatItem, OwnedFormatItem};

use crate::{color::Palette, level::Level};

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Default time the writer thread waits for new entries before exiting.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Exit status used after a fatal entry has been flushed.
pub const FATAL_EXIT_CODE: i32 = 2;

/// `14/01/2024 14:30:45 UTC`
pub(crate) const DEFAULT_TIME_FMT: &[FormatItem<'static>] =
    time::macros::format_description!("[day]/[month]/[year] [hour]:[minute]:[second] UTC");

/// Destination shared between the configuration and the writer thread.
pub(crate) type Sink = Arc<Mutex<Box<dyn io::Write + Send>>>;

/// Called with [`FATAL_EXIT_CODE`] once a fatal entry has been written.
pub(crate) type FatalHook = Arc<dyn Fn(i32) + Send + Sync>;

pub(crate) fn sink<W: io::Write + Send + 'static>(wr: W) -> Sink {
    Arc::new(Mutex::new(Box::new(wr)))
}

/// Settings read by producers and by the writer thread.
pub(crate) struct Config {
    pub output: Sink,
    pub min_level: Level,
    pub stack_on_warn: bool,
    pub hide_prefix: bool,
    pub colors: bool,
    pub time_format: Arc<OwnedFormatItem>,
    pub capacity: usize,
    pub cooldown: Duration,
    pub on_fatal: FatalHook,
    /// Registered as the `log` facade logger; level changes are mirrored
    /// into `log::set_max_level`.
    pub installed: bool,
}

impl Config {
    pub(crate) fn palette(&self) -> &'static Palette {
        Palette::new(self.colors)
    }

    /// Everything the writer needs for one batch.
    pub(crate) fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            output: self.output.clone(),
            palette: self.palette(),
            hide_prefix: self.hide_prefix,
            time_format: self.time_format.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("min_level", &self.min_level)
            .field("stack_on_warn", &self.stack_on_warn)
            .field("hide_prefix", &self.hide_prefix)
            .field("colors", &self.colors)
            .field("capacity", &self.capacity)
            .field("cooldown", &self.cooldown)
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

/// Snapshot of the render-time settings, taken once per batch.
pub(crate) struct RenderSettings {
    pub output: Sink,
    pub palette: &'static Palette,
    pub hide_prefix: bool,
    pub time_format: Arc<OwnedFormatItem>,
}

pub(crate) fn default_time_format() -> Arc<OwnedFormatItem> {
    Arc::new(OwnedFormatItem::from(DEFAULT_TIME_FMT))
}

pub(crate) fn exit_process() -> FatalHook {
    Arc::new(|code| std::process::exit(code))
}
