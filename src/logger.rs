//! Severity-marked terminal logging.
//!
//! Output looks like `info: building userland` with the severity word
//! coloured. Debug records are shown when `AERO_BUILD_DEBUG` is set or when
//! `RUST_LOG` asks for them.

use colored::{ColoredString, Colorize};
use log::Level;
use std::io::Write;

pub const DEBUG_ENV: &str = "AERO_BUILD_DEBUG";

fn severity(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".red().bold(),
        Level::Warn => "warn".yellow().bold(),
        Level::Info => "info".green().bold(),
        Level::Debug | Level::Trace => "debug".purple().bold(),
    }
}

fn default_filter(debug_env_set: bool) -> &'static str {
    if debug_env_set {
        "debug"
    } else {
        "info"
    }
}

/// Install the global logger. Calling it twice is harmless.
pub fn init() {
    let filter = default_filter(std::env::var_os(DEBUG_ENV).is_some());
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| writeln!(buf, "{}: {}", severity(record.level()), record.args()))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(true), "debug");
        assert_eq!(default_filter(false), "info");
    }

    #[test]
    fn test_severity_words() {
        colored::control::set_override(false);
        assert_eq!(severity(Level::Error).to_string(), "error");
        assert_eq!(severity(Level::Trace).to_string(), "debug");
    }
}
