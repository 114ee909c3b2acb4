//! ANSI color tokens.
//!
//! Rendering never branches on whether colors are enabled: every token is
//! taken from a [`Palette`], and the plain palette maps each token to `""`.

use std::io::IsTerminal;

/// When to emit ANSI escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Colors when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub(crate) fn enabled(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Palette {
    pub reset: &'static str,
    pub red: &'static str,
    pub green: &'static str,
    pub yellow: &'static str,
    pub magenta: &'static str,
    pub gray: &'static str,
    pub white: &'static str,
}

impl Palette {
    pub const ANSI: Palette = Palette {
        reset: "\x1b[0m",
        red: "\x1b[31m",
        green: "\x1b[32m",
        yellow: "\x1b[33m",
        magenta: "\x1b[35m",
        gray: "\x1b[90m",
        white: "\x1b[37m",
    };

    pub const PLAIN: Palette = Palette {
        reset: "",
        red: "",
        green: "",
        yellow: "",
        magenta: "",
        gray: "",
        white: "",
    };

    pub const fn new(colors: bool) -> &'static Palette {
        if colors {
            &Palette::ANSI
        } else {
            &Palette::PLAIN
        }
    }
}
