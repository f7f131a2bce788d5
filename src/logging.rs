use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "FARGO_LOG";
const DEFAULT_DIRECTIVE: &str = "info";
const LOG_FILE: &str = "fargo.log";

pub fn init_tracing() -> Result<PathBuf> {
    let log_dir = default_log_dir().context("logging: resolve log directory")?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("logging: create directory {}", log_dir.display()))?;

    let file_appender = rolling::daily(&log_dir, LOG_FILE);
    let directive = filter_directive(env::var(LOG_ENV).ok(), env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVE))
        .context("logging: build filter")?;

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow!("logging: install subscriber: {err}"))?;

    tracing::debug!(path = %log_dir.join(LOG_FILE).display(), filter = %directive, "tracing initialized");
    Ok(log_dir)
}

fn filter_directive(fargo_log: Option<String>, rust_log: Option<String>) -> String {
    [fargo_log, rust_log]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("fargo").join("logs"))
}
