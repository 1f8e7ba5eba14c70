//! Logging bootstrap shared by the agentperf binaries.
//!
//! Binaries build a [`LogConfig`] (usually via [`LogConfig::from_env`]),
//! call [`init_logging`] once, and keep the returned [`LoggingGuards`] alive
//! until exit so the non-blocking file writer can flush.

use crate::config::EnvParser;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" | "jsonl" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `agentperf=debug,ureq=warn`.
    pub level: String,
    pub format: LogFormat,
    /// Emit to stderr (stdout stays free for command output).
    pub stderr: bool,
    /// Optional log file; written through a non-blocking appender.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            stderr: false,
            file: None,
        }
    }

    /// Read `AGENTPERF_LOG_LEVEL`, `AGENTPERF_LOG_FORMAT` and
    /// `AGENTPERF_LOG_FILE`, falling back to `default_level`.
    pub fn from_env(default_level: &str) -> Self {
        Self::from_parser(&mut EnvParser::new(), default_level)
    }

    pub fn from_parser(parser: &mut EnvParser, default_level: &str) -> Self {
        let level = parser.get_log_level("LOG_LEVEL", default_level);
        let format = parser
            .get_optional_string("LOG_FORMAT")
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let file = parser.get_optional_path("LOG_FILE");
        Self {
            level,
            format,
            stderr: false,
            file,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Keeps background log writers alive.
#[must_use = "dropping the guards stops file logging"]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let console = match (config.format, config.stderr) {
        (LogFormat::Json, true) => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        (LogFormat::Json, false) => fmt::layer().json().boxed(),
        (LogFormat::Compact, true) => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
        (LogFormat::Compact, false) => fmt::layer().compact().boxed(),
        (LogFormat::Pretty, true) => fmt::layer().with_writer(std::io::stderr).boxed(),
        (LogFormat::Pretty, false) => fmt::layer().boxed(),
    };

    let (file_layer, guard) = match config.file.as_deref() {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(config.filter())
        .try_init()
        .context("global tracing subscriber already installed")?;

    Ok(LoggingGuards { _file: guard })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
