//! Centralized logging for Hydra applications
//!
//! Provides a custom formatter for tracing that:
//! - Formats thread IDs as #N instead of ThreadId(N)
//! - Extracts the `object` field (a remote object name) and shows it as `[name]`
//! - Strips common prefixes from targets for cleaner output
//! - Filters external dependency logs based on `HYDRA_LOGDEPS` environment variable
//!
//! Log lines go to stderr so that stdout stays free for command results.
//!
//! # Environment Variables
//!
//! - `HYDRA_LOGDEPS`: Set to `1` to enable logging from external dependencies (rquickjs, tokio, etc.).
//!   Default is `0` which only shows logs from Hydra code.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hydra_log::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! let config = LogConfig::<std::fs::File>::new("hydra_host::").with_level(Level::DEBUG);
//! init_logging(config)?;
//! ```

use std::fmt as std_fmt;
use std::io::{self, Write};
use tracing::Level;
use tracing::field::Field;
use tracing_subscriber::field::Visit;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose logs are shown when dependency logging is disabled
const HYDRA_TARGETS: &[&str] = &["hydra_host", "hydra_bridge", "hydra_log", "ggb"];

/// Field extractor for the `object` and `message` fields
///
/// Used by the custom formatter to prefix log lines that concern a
/// single remote object with its name.
#[derive(Default)]
pub struct FieldExtractor {
    pub object: Option<String>,
    pub message: Option<String>,
}

impl Visit for FieldExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "object" => self.object = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std_fmt::Debug) {
        match field.name() {
            "object" => self.object = Some(format!("{:?}", value).trim_matches('"').to_string()),
            "message" => self.message = Some(format!("{:?}", value)),
            _ => {}
        }
    }
}

/// Custom event formatter for Hydra applications
///
/// Features:
/// - Thread IDs displayed as #N instead of ThreadId(N)
/// - Object logs formatted as `target: [A] message`
/// - Configurable ANSI color support
/// - Configurable target prefix stripping
pub struct CustomFormatter<T> {
    timer: T,
    ansi: bool,
    /// Prefix to strip from log targets (e.g., "hydra_host::")
    strip_prefix: Option<String>,
}

impl<T> CustomFormatter<T> {
    /// Create a new CustomFormatter
    pub fn new(timer: T, ansi: bool) -> Self {
        Self {
            timer,
            ansi,
            strip_prefix: None,
        }
    }

    /// Set the prefix to strip from log targets
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Resolve the target shown for an event, or `None` when it should be hidden
    fn display_target<'a>(&self, target: &'a str) -> Option<&'a str> {
        let Some(prefix) = &self.strip_prefix else {
            return Some(target);
        };

        // The bare application name carries no information
        if target == prefix.trim_end_matches("::") {
            return None;
        }

        let shown = target.strip_prefix(prefix.as_str()).unwrap_or(target);
        if shown.is_empty() { None } else { Some(shown) }
    }
}

impl<T: Clone> Clone for CustomFormatter<T> {
    fn clone(&self) -> Self {
        Self {
            timer: self.timer.clone(),
            ansi: self.ansi,
            strip_prefix: self.strip_prefix.clone(),
        }
    }
}

impl<S, N, T> FormatEvent<S, N> for CustomFormatter<T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: fmt::time::FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std_fmt::Result {
        let metadata = event.metadata();

        let (dim_start, dim_end) = if self.ansi {
            ("\x1b[2m", "\x1b[0m")
        } else {
            ("", "")
        };
        let (level_color, level_str) = match *metadata.level() {
            Level::ERROR => (if self.ansi { "\x1b[31m" } else { "" }, "ERROR"),
            Level::WARN => (if self.ansi { "\x1b[33m" } else { "" }, " WARN"),
            Level::INFO => (if self.ansi { "\x1b[32m" } else { "" }, " INFO"),
            Level::DEBUG => (if self.ansi { "\x1b[34m" } else { "" }, "DEBUG"),
            Level::TRACE => (if self.ansi { "\x1b[35m" } else { "" }, "TRACE"),
        };
        let color_end = if self.ansi { "\x1b[0m" } else { "" };

        write!(writer, "{}", dim_start)?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "{} ", dim_end)?;

        write!(writer, "{}{}{} ", level_color, level_str, color_end)?;

        if let Some(num) = thread_number() {
            write!(writer, "#{:03} ", num)?;
        }

        if let Some(target) = self.display_target(metadata.target()) {
            write!(writer, "{}{}{}: ", dim_start, target, dim_end)?;
        }

        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);

        match (&extractor.object, &extractor.message) {
            (Some(object), Some(message)) => {
                write!(writer, "[{}] {}", object, message)?;
            }
            _ => {
                ctx.field_format().format_fields(writer.by_ref(), event)?;
            }
        }

        writeln!(writer)
    }
}

/// Numeric part of the current thread's id
fn thread_number() -> Option<u64> {
    let thread_id = format!("{:?}", std::thread::current().id());
    thread_id
        .strip_prefix("ThreadId(")
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.parse().ok())
}

/// Create a timer with custom format
///
/// Uses format: `[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]`
pub fn create_custom_timer()
-> OffsetTime<&'static [time::format_description::BorrowedFormatItem<'static>]> {
    use time::macros::format_description;

    let format =
        format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]");
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    OffsetTime::new(offset, format)
}

/// Check if dependency logging is enabled via HYDRA_LOGDEPS environment variable
pub fn is_dependency_logging_enabled() -> bool {
    std::env::var("HYDRA_LOGDEPS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Parse a configured level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Build the filter directive for dependency logging
///
/// When `HYDRA_LOGDEPS=0` (default), only logs from Hydra code and from the
/// applet's console (`ggb` target) are shown.
pub fn build_filter_directives(level: Level, log_deps: bool) -> String {
    let level_str = level.as_str().to_lowercase();

    if log_deps {
        return level_str;
    }

    let mut directives = String::from("off");
    for target in HYDRA_TARGETS {
        directives.push_str(&format!(",{}={}", target, level_str));
    }
    directives
}

/// Detect if ANSI colors should be used based on environment
///
/// Disables ANSI colors if stderr is not a TTY, `NO_COLOR` is set or `TERM=dumb`.
pub fn should_use_ansi() -> bool {
    atty::is(atty::Stream::Stderr)
        && std::env::var("NO_COLOR").is_err()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
}

/// Logging configuration
pub struct LogConfig<W: Write + Send + 'static = std::fs::File> {
    /// Prefix to strip from log targets (e.g., "hydra_host::")
    pub strip_prefix: String,
    /// Whether to use ANSI color codes (auto-detected if None)
    pub use_ansi: Option<bool>,
    /// Minimum log level
    pub level: Level,
    /// Optional file to write logs to
    pub log_file: Option<W>,
}

impl<W: Write + Send + 'static> LogConfig<W> {
    /// Create a new LogConfig with the given strip prefix
    pub fn new(strip_prefix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            use_ansi: None,
            level: Level::INFO,
            log_file: None,
        }
    }

    /// Set whether to use ANSI colors (default: auto-detect)
    pub fn with_ansi(mut self, use_ansi: bool) -> Self {
        self.use_ansi = Some(use_ansi);
        self
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the log file
    pub fn with_log_file(mut self, file: W) -> Self {
        self.log_file = Some(file);
        self
    }
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` overrides the directives built from the configured level.
pub fn init_logging<W: Write + Send + 'static>(
    config: LogConfig<W>,
) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let timer = create_custom_timer();
    let use_ansi = config.use_ansi.unwrap_or_else(should_use_ansi);
    let filter_directives = build_filter_directives(config.level, is_dependency_logging_enabled());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&filter_directives))?;

    let formatter = CustomFormatter::new(timer.clone(), use_ansi)
        .with_strip_prefix(&config.strip_prefix);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(formatter)
        .with_ansi(use_ansi)
        .with_writer(io::stderr);

    // Option<Layer> is itself a layer, so the file output is simply absent when not configured
    let file_layer = config.log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(CustomFormatter::new(timer, false).with_strip_prefix(&config.strip_prefix))
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_filter_directives_without_deps() {
        let directives = build_filter_directives(Level::DEBUG, false);
        assert!(directives.starts_with("off,"));
        assert!(directives.contains("hydra_bridge=debug"));
        assert!(directives.contains("ggb=debug"));
    }

    #[test]
    fn test_filter_directives_with_deps() {
        assert_eq!(build_filter_directives(Level::INFO, true), "info");
    }

    #[test]
    fn test_display_target_stripping() {
        let formatter = CustomFormatter::new((), false).with_strip_prefix("hydra_host::");
        assert_eq!(formatter.display_target("hydra_host::repl"), Some("repl"));
        assert_eq!(formatter.display_target("hydra_host"), None);
        assert_eq!(formatter.display_target("hydra_bridge::session"), Some("hydra_bridge::session"));

        let plain = CustomFormatter::new((), false);
        assert_eq!(plain.display_target("hydra_host"), Some("hydra_host"));
    }
}
