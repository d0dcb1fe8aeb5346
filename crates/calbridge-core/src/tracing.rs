//! Log output for hosts embedding the adapter.
//!
//! The adapter crates only emit `tracing` events. A host either installs a
//! subscriber with [`init`], or adds [`LogSettings::layer`] to a registry it
//! already owns. Settings usually come from the `[log]` section of the
//! adapter's `config.toml`:
//!
//! ```toml
//! [log]
//! level = "debug"
//! format = "json"
//! # filter = "calbridge_ews=trace,reqwest=info"
//! ```
//!
//! The filter is chosen in order: explicit `filter`, then `RUST_LOG`, then
//! `calbridge=<level>`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Directive target matching every calbridge crate.
const TARGET_PREFIX: &str = "calbridge";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("unknown log level `{0}`")]
    Level(String),

    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install the log subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// How events are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One line per event.
    #[default]
    Compact,
    /// Multi-line, for reading in a terminal.
    Pretty,
    /// JSON lines, for log collectors.
    Json,
}

/// The `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Level for calbridge targets, e.g. `info` or `debug`.
    pub level: String,
    pub format: LogFormat,
    /// Full filter directive; overrides `level` and `RUST_LOG`.
    pub filter: Option<String>,
    /// Include file and line of each event.
    pub with_location: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            filter: None,
            with_location: false,
        }
    }
}

impl LogSettings {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Builds the event filter.
    ///
    /// `level` is validated even when `RUST_LOG` takes precedence.
    pub fn env_filter(&self) -> Result<EnvFilter, LogError> {
        if let Some(directive) = &self.filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        let level: Level = self
            .level
            .trim()
            .parse()
            .map_err(|_| LogError::Level(self.level.clone()))?;
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                TARGET_PREFIX,
                level.as_str().to_ascii_lowercase()
            ))
        }))
    }

    /// A filtered formatting layer, for hosts composing their own subscriber.
    pub fn layer<S>(&self) -> Result<Box<dyn Layer<S> + Send + Sync + 'static>, LogError>
    where
        S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    {
        let filter = self.env_filter()?;
        let base = fmt::layer()
            .with_file(self.with_location)
            .with_line_number(self.with_location);

        Ok(match self.format {
            LogFormat::Compact => base.compact().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Json => base.json().with_filter(filter).boxed(),
        })
    }
}

/// Installs a global subscriber built from `settings`.
///
/// # Errors
///
/// Fails on an invalid level or filter, or when a global subscriber is
/// already installed.
pub fn init(settings: &LogSettings) -> Result<(), LogError> {
    let layer = settings.layer::<Registry>()?;
    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}
