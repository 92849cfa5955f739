//! Structured logging for scriptkit
//!
//! All logs use structured fields for easy parsing and analysis.
//!
//! # Log Format Conventions
//!
//! - `operation`: The operation being performed (e.g., "cleanup", "cache_key.compute")
//! - `status`: The result status ("success", "uncacheable", "error")
//! - `reference`: Script reference the event is about
//! - `depth`: Path depth of a cleanup level
//! - `entry_count`: Number of entries in a batch
//!
//! # Examples
//!
//! ```rust
//! use tracing::info;
//!
//! info!(
//!     operation = "cleanup",
//!     status = "success",
//!     entry_count = 3,
//!     "cleaned outputs"
//! );
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use std::{fmt as std_fmt, io};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "SCRIPTKIT_LOG_FORMAT";

const ANSI_RESET: &str = "\x1b[0m";

/// Single-line event format: UTC timestamp, level tagged `(scriptkit)`, fields
struct ScriptkitFormatter {
    with_ansi: bool,
}

/// RFC 3339 UTC timestamp with microseconds, e.g. `2024-01-02T03:04:05.000000Z`
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

impl ScriptkitFormatter {
    fn write_level(&self, writer: &mut Writer<'_>, level: Level) -> std_fmt::Result {
        if self.with_ansi {
            write!(writer, "{}{level:5}(scriptkit){ANSI_RESET}: ", level_color(level))
        } else {
            write!(writer, "{level:5}(scriptkit): ")
        }
    }
}

impl<S, N> FormatEvent<S, N> for ScriptkitFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        write!(writer, "{} ", format_timestamp(Utc::now()))?;
        self.write_level(&mut writer, *event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    Pretty,
    /// Compact format (for CI/production)
    Compact,
    /// JSON format (for log aggregation systems)
    Json,
}

impl LogFormat {
    /// Parse from environment variable (SCRIPTKIT_LOG_FORMAT)
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV)
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            _ => {
                if std::env::var("CI").is_ok() {
                    Self::Compact
                } else {
                    Self::Pretty
                }
            }
        }
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "warn")
/// - `SCRIPTKIT_LOG_FORMAT`: Set format ("pretty", "compact", "json")
/// - `CI`: If set, defaults to compact format
///
/// Fails if a global subscriber is already installed.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    match LogFormat::from_env() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(ScriptkitFormatter { with_ansi: true })
                    .with_writer(io::stderr),
            )
            .try_init()?,
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(ScriptkitFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init()?,
    }

    Ok(())
}
