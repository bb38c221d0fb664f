//! Stderr logger

use std::fmt;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Print msg with color
fn print_in_color(args: fmt::Arguments, color_code: u8) {
    eprintln!("\u{1B}[{}m{}\u{1B}[0m", color_code, args);
}

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 34,  // Blue
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        print_in_color(
            format_args!("[{:>5}][{}] {}", record.level(), record.target(), record.args()),
            color,
        );
    }

    fn flush(&self) {}
}

fn level_from(value: Option<&str>) -> LevelFilter {
    match value {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        Some("OFF") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// Installs the logger. The level comes from the `LOG` environment variable and defaults to
/// `WARN`.
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    // Only fails if a logger is already installed, which leaves that one in charge.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_from(std::env::var("LOG").ok().as_deref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_warn() {
        assert_eq!(level_from(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(level_from(Some("debug")), LevelFilter::Warn);
        assert_eq!(level_from(None), LevelFilter::Warn);
    }
}
