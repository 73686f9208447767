use std::env;
use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

const DEFAULT_FILTER: &str = "vault_fetch=info,vault_broker=info";

/// Errors that can occur during logger setup
#[derive(Debug, Error)]
pub enum LoggingError {
    /// LogTracer already initialized (log -> tracing bridge)
    #[error("log tracer already initialized")]
    LogTracerAlreadyInitialized,
    /// Global subscriber already set
    #[error("global tracing subscriber already set")]
    SubscriberAlreadySet,
}

/// Logger configuration. Logs go to stderr so stdout carries only results.
pub struct LogSetup {
    application: String,
    version: String,
    json_enabled: bool,
}

impl LogSetup {
    pub fn new(application: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            version: version.into(),
            json_enabled: false,
        }
    }

    #[cfg(test)]
    pub fn json_enabled(mut self, enabled: bool) -> Self {
        self.json_enabled = enabled;
        self
    }

    /// Read JSON_LOG env var to determine if JSON should be enabled
    pub fn json_from_env(mut self) -> Self {
        self.json_enabled = parse_flag(env::var("JSON_LOG").ok().as_deref());
        self
    }

    fn name(&self) -> String {
        format!("{}-{}", self.application, self.version)
    }

    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        if !self.json_enabled {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init()
                .map_err(|_| LoggingError::SubscriberAlreadySet)?;
            return Ok(None);
        }

        // Redirect the logs from log library to tracing's subscribers.
        LogTracer::init().map_err(|_| LoggingError::LogTracerAlreadyInitialized)?;

        // Non-blocking writer
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(io::stderr());

        let formatting_layer = BunyanFormattingLayer::new(self.name(), non_blocking_writer);
        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(formatting_layer);
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|_| LoggingError::SubscriberAlreadySet)?;

        Ok(Some(guard))
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| s.trim().parse().unwrap_or_default())
}
