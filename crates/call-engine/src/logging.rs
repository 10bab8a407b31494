//! Logging setup for embedding applications.

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }
}

/// Set up the logging system with the provided configuration.
///
/// Safe to call once per process; a second call is a logged no-op because
/// the global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}
