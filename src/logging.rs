// Logging system for polyforge
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format (pretty for terminals, json for programmatic use)
    pub format: LogFormat,
    /// Color output configuration
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
}

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Pretty output for terminals
    Pretty,
    /// JSON output for programmatic use
    Json,
    /// Compact format for structured logging
    Compact,
}

/// Color output configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    Auto,
    Always,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            color: ColorConfig::Auto,
            show_targets: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        let color_config = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            format: LogFormat::Pretty,
            color: color_config,
            show_targets: false,
        }
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::new(format!("polyforge={}", config.level));

    match config.format {
        LogFormat::Pretty => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(config.show_targets)
                .with_ansi(config.should_use_colors())
                .init();
        }
        LogFormat::Json => {
            fmt().with_env_filter(env_filter).json().init();
        }
        LogFormat::Compact => {
            fmt()
                .with_env_filter(env_filter)
                .compact()
                .with_target(config.show_targets)
                .init();
        }
    }

    Ok(())
}

/// Logging utilities for orchestration events
pub mod utils {
    use std::path::Path;
    use tracing::{debug, error, info, span, Level, Span};

    /// Create a span for one language's toolchain setup
    pub fn toolchain_setup_span(language: &str, project_path: &Path) -> Span {
        span!(
            Level::INFO,
            "toolchain_setup",
            language = %language,
            project = %project_path.display()
        )
    }

    /// Create a span for a package install
    pub fn install_span(manager: &str, package: &str) -> Span {
        span!(Level::DEBUG, "install", manager = %manager, package = %package)
    }

    /// Log orchestration start
    pub fn log_orchestration_start(project_path: &Path, language_count: usize) {
        info!(
            project = %project_path.display(),
            language_count = language_count,
            "Starting toolchain orchestration"
        );
    }

    /// Log one language's setup completion
    pub fn log_setup_completion(language: &str, success: bool, duration_ms: u128) {
        if success {
            info!(
                language = %language,
                duration_ms = duration_ms,
                "Toolchain setup completed successfully"
            );
        } else {
            error!(
                language = %language,
                duration_ms = duration_ms,
                "Toolchain setup failed"
            );
        }
    }

    /// Log a verification check outcome
    pub fn log_verification(check: &str, passed: bool) {
        if passed {
            debug!(check = %check, "Verification check passed");
        } else {
            error!(check = %check, "Verification check failed");
        }
    }
}
