//! Logging infrastructure - structured tracing for heap operations
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable level, overridable through `RUST_LOG`
//! - Zero-cost when no subscriber is installed
//! - Console or file output, compact or JSON
//!
//! The heap itself only emits events; installing a subscriber is the
//! embedding application's choice.

use once_cell::sync::OnceCell;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable file logging
    pub file_output: bool,
    /// Log file path (if file_output enabled)
    pub log_path: Option<String>,
    /// Enable JSON format (vs compact)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // ATOMHEAP_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("ATOMHEAP_LOG_LEVEL") {
            config.level = parse_level(&level_str);
        }

        // ATOMHEAP_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("ATOMHEAP_LOG_FILE") {
            config.file_output = true;
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("ATOMHEAP_LOG_JSON").is_ok();
        config.show_spans = std::env::var("ATOMHEAP_LOG_SPANS").is_ok();

        config
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self { level: Level::ERROR, ..Self::default() }
    }

    /// Every divide, merge and reservation
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            file_output: true,
            log_path: Some("atomheap.log".to_string()),
            json_format: false,
            show_spans: true,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging from the environment
///
/// Keep the returned guard alive while logging to a file.
#[must_use]
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Initialize logging with custom configuration (first call wins)
#[must_use]
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;

    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("atomheap={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match config.log_path.as_deref() {
            Some(path) if config.file_output => {
                let path = Path::new(path);
                let directory = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let file_name = path.file_name().unwrap_or_else(|| OsStr::new("atomheap.log"));

                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard = Some(file_guard);
                BoxMakeWriter::new(writer)
            }
            _ => BoxMakeWriter::new(io::stderr),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_line_number(cfg!(debug_assertions));

        // Another subscriber may already be installed by the host
        let _ = if config.json_format {
            tracing_subscriber::registry().with(env_filter).with(layer.json()).try_init()
        } else {
            tracing_subscriber::registry().with(env_filter).with(layer.compact()).try_init()
        };
    });

    guard
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Heap events
// ============================================================================

/// Log buffer formatting
pub fn log_prepare(length: u32, root_length: u32) {
    tracing::debug!(
        event = "prepare",
        length_bytes = length,
        root_bytes = root_length,
        "Heap layout prepared"
    );
}

/// Log buffer growth absorbed by the heap
pub fn log_extend(old_length: u32, new_length: u32) {
    tracing::debug!(
        event = "extend",
        old_length = old_length,
        new_length = new_length,
        "Heap extended into grown buffer"
    );
}

/// Log an allocation
#[inline]
pub fn log_reserve(offset: u32, length: u32) {
    tracing::trace!(
        event = "reserve",
        offset = offset,
        length_bytes = length,
        "Atom reserved"
    );
}

/// Log a deallocation
#[inline]
pub fn log_free(offset: u32, survivor: u32) {
    tracing::trace!(
        event = "free",
        offset = offset,
        coalesced_into = survivor,
        "Atom freed"
    );
}

/// Log an in-place resize (shrink or extension)
pub fn log_resize(kind: &str, offset: u32, old_length: u32, new_length: u32) {
    tracing::debug!(
        event = "resize",
        kind = kind,
        offset = offset,
        old_length = old_length,
        new_length = new_length,
        "Allocation resized in place"
    );
}

/// Log a relocation-and-copy
pub fn log_relocation(from: u32, to: u32, copied: u32) {
    tracing::debug!(
        event = "relocate",
        from = from,
        to = to,
        copied_bytes = copied,
        "Allocation relocated"
    );
}

/// Log exhaustion
pub fn log_out_of_space(requested: u32, largest_free: u32) {
    tracing::warn!(
        event = "out_of_space",
        requested_bytes = requested,
        largest_free = largest_free,
        "No free atom large enough"
    );
}
