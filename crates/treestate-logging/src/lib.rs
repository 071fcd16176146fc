//! # treestate-logging
//!
//! Tracing setup shared by the treestate binaries.
//!
//! Console output goes to stderr in one of three [`LogFormat`]s. An optional
//! log file always receives JSON lines through a non-blocking writer; keep
//! the returned guard alive until exit so buffered lines are flushed.

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field output
    #[default]
    Pretty,
    /// JSON lines for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Default location for the log file: `<data dir>/treestate/logs/treestate.log`
pub fn default_log_file() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("treestate").join("logs").join("treestate.log"))
}

/// Initialize tracing for the application.
///
/// `RUST_LOG` takes precedence over `level`. Fails if a global subscriber
/// is already installed or the log file directory cannot be created.
pub fn init_tracing(
    level: &str,
    format: LogFormat,
    log_file: Option<&Path>,
) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers = vec![console_layer(format)];
    let guard = match log_file {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer().with_target(false).with_writer(io::stderr);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

fn file_layer(path: &Path) -> io::Result<(BoxedLayer, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Log file has no file name: {}", path.display()),
        )
    })?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats_case_insensitively() {
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn file_layer_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/logs/treestate.log");

        let (_layer, _guard) = file_layer(&path).unwrap();
        assert!(dir.path().join("nested/logs").is_dir());
    }

    #[test]
    fn file_layer_rejects_paths_without_a_name() {
        assert!(file_layer(Path::new("/")).is_err());
    }

    #[test]
    fn default_log_file_lives_under_treestate() {
        if let Some(path) = default_log_file() {
            assert!(path.ends_with("treestate/logs/treestate.log"));
        }
    }
}
