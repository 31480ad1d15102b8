//! Logging setup shared by all MeshFS binaries.
//!
//! Console output is always available; file output is optional and uses a
//! rolling appender with a background writer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for log files. If None, no file logging.
    pub log_dir: Option<PathBuf>,

    /// Prefix for log file names.
    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    /// Log rotation: "hourly", "daily", "never".
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Whether to output JSON format.
    #[serde(default)]
    pub json_format: bool,

    /// Whether to also output to console (stdout).
    #[serde(default = "default_true")]
    pub console_output: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_prefix() -> String {
    "meshfs".into()
}

fn default_rotation() -> String {
    "daily".into()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
            log_dir: None,
            file_prefix: default_prefix(),
            rotation: default_rotation(),
            json_format: false,
            console_output: true,
        }
    }
}

fn parse_rotation(rotation: &str) -> rolling::Rotation {
    match rotation {
        "hourly" => rolling::Rotation::HOURLY,
        "never" => rolling::Rotation::NEVER,
        _ => rolling::Rotation::DAILY,
    }
}

/// Initialize the logging system. Should be called once at program startup.
/// Returns a guard that must be held alive for the duration of the program
/// (for the non-blocking file writer).
pub fn init_logging(config: &LogConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer: Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>> =
        if config.console_output {
            if config.json_format {
                Some(Box::new(fmt::layer().json()))
            } else {
                Some(Box::new(fmt::layer()))
            }
        } else {
            None
        };

    let (file_layer, guard): (
        Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>>,
        Option<tracing_appender::non_blocking::WorkerGuard>,
    ) = match config.log_dir {
        Some(ref log_dir) => {
            let appender = rolling::RollingFileAppender::builder()
                .rotation(parse_rotation(&config.rotation))
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(log_dir);
            match appender {
                Ok(appender) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                    let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> =
                        if config.json_format {
                            Box::new(fmt::layer().json().with_writer(non_blocking))
                        } else {
                            Box::new(fmt::layer().with_writer(non_blocking))
                        };
                    (Some(layer), Some(guard))
                }
                Err(err) => {
                    eprintln!("cannot create log file appender in {:?}: {}", log_dir, err);
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    registry.with(console_layer).with(file_layer).init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.file_prefix, "meshfs");
        assert_eq!(config.rotation, "daily");
        assert!(config.console_output);
        assert!(!config.json_format);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_parse_rotation_fallback() {
        assert_eq!(parse_rotation("hourly"), rolling::Rotation::HOURLY);
        assert_eq!(parse_rotation("never"), rolling::Rotation::NEVER);
        assert_eq!(parse_rotation("daily"), rolling::Rotation::DAILY);
        assert_eq!(parse_rotation("every-minute"), rolling::Rotation::DAILY);
    }
}
