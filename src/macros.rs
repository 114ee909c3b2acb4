/// Logs at an explicit [`Level`](crate::Level).
///
/// ```rust, ignore
/// lumo::log!(log, Level::Warn, "retrying in {}s", delay);
/// lumo::log!(log, Level::Error, cause: err, "request failed: {}", err);
/// ```
///
/// With `cause:`, the value must implement
/// [`HasStackContext`](crate::HasStackContext). Its stack and context pairs
/// are used instead of a fresh snapshot whenever the level wants a trace.
#[macro_export]
macro_rules! log {
    ($lumo:expr, $level:expr, cause: $cause:expr, $($arg:tt)+) => {
        $lumo.log_with($level, &$cause, ::std::format_args!($($arg)+))
    };
    ($lumo:expr, $level:expr, $($arg:tt)+) => {
        $lumo.log($level, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    ($lumo:expr, $($arg:tt)+) => {
        $crate::log!($lumo, $crate::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($lumo:expr, $($arg:tt)+) => {
        $crate::log!($lumo, $crate::Level::Info, $($arg)+)
    };
}

/// Warnings carry a stack trace only when stack-on-warn is enabled.
#[macro_export]
macro_rules! warn {
    ($lumo:expr, $($arg:tt)+) => {
        $crate::log!($lumo, $crate::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($lumo:expr, $($arg:tt)+) => {
        $crate::log!($lumo, $crate::Level::Error, $($arg)+)
    };
}

/// Logs, drains every pending entry, then terminates the process with
/// [`FATAL_EXIT_CODE`](crate::FATAL_EXIT_CODE).
#[macro_export]
macro_rules! fatal {
    ($lumo:expr, $($arg:tt)+) => {
        $crate::log!($lumo, $crate::Level::Fatal, $($arg)+)
    };
}
