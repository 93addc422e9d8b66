//! Logging bootstrap for authkit.
//!
//! Internal events use the `tracing` macros. Hosts that do not install their
//! own subscriber can call [`init`], controlled by:
//!
//! - `AUTHKIT_DEBUG=true|1|yes` - enable debug logging
//! - `AUTHKIT_LOG_LEVEL=trace|debug|info|warn|error` - set a specific level
//! - `AUTHKIT_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! Installing a subscriber also routes guard diagnostics through `tracing`
//! unless the configuration names another sink.
//!
//! ```rust,no_run
//! use authkit_guard::logging;
//!
//! logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "AUTHKIT_DEBUG";
const LEVEL_VAR: &str = "AUTHKIT_LOG_LEVEL";
const FORMAT_VAR: &str = "AUTHKIT_LOG_FORMAT";

const CRATES: &[&str] = &["authkit", "authkit_schema", "authkit_guard", "authkit_sqlite"];

/// Output format of the bootstrap subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

/// Logging settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Level applied to every authkit crate.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
    /// Whether logging was requested at all.
    pub requested: bool,
}

impl LogSettings {
    /// Read the current environment.
    pub fn from_env() -> Self {
        Self::resolve(
            is_debug_enabled(),
            env::var(LEVEL_VAR).ok().as_deref(),
            env::var(FORMAT_VAR).ok().as_deref(),
        )
    }

    /// Settings for an explicit level; the format still comes from the environment.
    pub fn with_level(level: &str) -> Self {
        Self::resolve(
            is_debug_enabled(),
            Some(level),
            env::var(FORMAT_VAR).ok().as_deref(),
        )
    }

    fn resolve(debug: bool, level: Option<&str>, format: Option<&str>) -> Self {
        let requested = debug || level.is_some();
        let fallback = if debug { "debug" } else { "warn" };
        let level = match level.map(str::to_ascii_lowercase).as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => fallback,
        };

        Self {
            level,
            format: format.map(LogFormat::parse).unwrap_or_default(),
            requested,
        }
    }

    /// Filter directive covering the authkit crates.
    pub fn directive(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Check if debug logging is enabled via `AUTHKIT_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Initialize logging once. Later calls are no-ops.
///
/// Nothing is installed unless `AUTHKIT_DEBUG` or `AUTHKIT_LOG_LEVEL` is set,
/// or when the `tracing-subscriber` feature is disabled.
pub fn init() {
    INIT.call_once(|| {
        let settings = LogSettings::from_env();
        if settings.requested {
            install(&settings);
        }
    });
}

#[cfg(feature = "tracing-subscriber")]
fn install(settings: &LogSettings) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_new(settings.directive()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            level = settings.level,
            format = ?settings.format,
            "authkit logging initialized"
        );
    }
}

#[cfg(not(feature = "tracing-subscriber"))]
fn install(_settings: &LogSettings) {}

/// Initialize logging once at a specific level, ignoring `AUTHKIT_LOG_LEVEL`.
///
/// `AUTHKIT_LOG_FORMAT` still selects the format.
pub fn init_with_level(level: &str) {
    INIT.call_once(|| {
        install(&LogSettings::with_level(level));
    });
}
