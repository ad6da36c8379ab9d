//! Logging setup for Shapeload.
//!
//! Library code only emits `tracing` events; nothing is printed unless the
//! application installs a subscriber. With the `tracing-subscriber` feature
//! enabled, [`init`] installs one configured from the environment:
//!
//! - `SHAPELOAD_DEBUG=true|1|yes` enables debug logging
//! - `SHAPELOAD_LOG_LEVEL=trace|debug|info|warn|error` sets the level
//! - `SHAPELOAD_LOG_FORMAT=json|pretty|compact` sets the output format (default: json)
//!
//! ```rust,no_run
//! shapeload_query::logging::init();
//! ```
//!
//! What gets logged:
//!
//! | Level   | Event                                                     |
//! |---------|-----------------------------------------------------------|
//! | `debug` | plan built, plan applied, plan cache hit/miss, query run  |
//! | `trace` | each directive issued, cycle truncation, each round trip  |

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "SHAPELOAD_DEBUG";
const LEVEL_VAR: &str = "SHAPELOAD_LOG_LEVEL";
const FORMAT_VAR: &str = "SHAPELOAD_LOG_FORMAT";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single-line, human readable.
    Compact,
}

impl LogFormat {
    /// Parse a format name, case-insensitively. Unknown names give `Json`.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }

    /// The format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

/// Check if `SHAPELOAD_DEBUG` enables debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The log level from `SHAPELOAD_LOG_LEVEL`.
///
/// Falls back to `debug` when `SHAPELOAD_DEBUG` is on and `warn` otherwise.
pub fn log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var(LEVEL_VAR) {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// The output format from `SHAPELOAD_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    env::var(FORMAT_VAR)
        .map(|f| LogFormat::parse(&f))
        .unwrap_or_default()
}

/// Directive string for the subscriber's `EnvFilter`.
pub fn filter_directives(level: &str) -> String {
    format!("shapeload={level},shapeload_query={level},shapeload_schema={level}")
}

/// Install the Shapeload subscriber.
///
/// Does nothing unless `SHAPELOAD_DEBUG` or `SHAPELOAD_LOG_LEVEL` is set, or
/// if called before. Without the `tracing-subscriber` feature this never
/// installs anything; applications can set up their own subscriber instead.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var(LEVEL_VAR).is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = log_level();
            let format = log_format();
            let filter = EnvFilter::try_new(filter_directives(level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);

            // `try_init` so an application subscriber already in place wins.
            let installed = match format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };
            if installed.is_ok() {
                tracing::info!(level, format = format.as_str(), "Shapeload logging initialized");
            }
        }
    });
}

/// Install the subscriber at a given level.
///
/// # Safety
///
/// Sets `SHAPELOAD_LOG_LEVEL`, which is unsound while other threads read the
/// environment. Call it at startup before spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: documented startup-only use.
    unsafe {
        env::set_var(LEVEL_VAR, level);
    }
    init();
}

/// Install the subscriber with debug logging on.
///
/// # Safety
///
/// Same caveat as [`init_with_level`].
pub fn init_debug() {
    // SAFETY: documented startup-only use.
    unsafe {
        env::set_var(DEBUG_VAR, "true");
    }
    init();
}

/// Debug event emitted only when `SHAPELOAD_DEBUG` is on.
#[macro_export]
macro_rules! shapeload_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace event emitted only when `SHAPELOAD_DEBUG` is on.
#[macro_export]
macro_rules! shapeload_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
