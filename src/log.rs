//! Module that prints leveled, colored log lines to stderr.
//!
//! Stdout is left to the game narration so the trace can be piped.

use color_print::cformat;
use std::sync::OnceLock;

/// Environment variable that turns on `debug` output.
pub const DEBUG_ENV: &str = "POTATO_DEBUG";

fn debug_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os(DEBUG_ENV).is_some())
}

/// Function that prints a debug message, only when `POTATO_DEBUG` is set.
pub fn debug(msg: &str) {
    if debug_enabled() {
        eprintln!("{}", cformat!("<dim>[debug]</dim> {msg}"));
    }
}

/// Function that prints an informative message.
pub fn info(msg: &str) {
    eprintln!("{}", cformat!("<green, bold>[info]</green, bold> {msg}"));
}

/// Function that prints a warning.
pub fn warn(msg: &str) {
    eprintln!("{}", cformat!("<yellow, bold>[warn]</yellow, bold> {msg}"));
}

/// Function that prints an error.
pub fn error(msg: &str) {
    eprintln!("{}", cformat!("<red, bold>[error]</red, bold> {msg}"));
}
