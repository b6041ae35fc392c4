use crate::config::LoggingConfig;
use crate::error::{ConfigError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Build the filter: `RUST_LOG` wins, then `--debug`, then the configured level.
fn env_filter(config: &LoggingConfig, debug: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = if debug { "debug" } else { config.level.as_str() };
    EnvFilter::try_new(format!("chat_relay={level}"))
        .map_err(|e| ConfigError::Validation(format!("Invalid log level '{level}': {e}")).into())
}

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays free for the stdio harness. When a log
/// file is configured the returned guard must be held until shutdown.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config, debug)?;

    let stderr_layer = if config.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().ok_or_else(|| {
                ConfigError::Validation(format!("Invalid log file path: {}", path.display()))
            })?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Validation(format!("Failed to initialize logging: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "not a level!!".to_string(),
            ..LoggingConfig::default()
        };
        assert!(env_filter(&config, false).is_err());
    }

    #[test]
    fn test_debug_flag_overrides_level() {
        std::env::remove_var("RUST_LOG");
        let filter = env_filter(&LoggingConfig::default(), true).unwrap();
        assert!(filter.to_string().contains("chat_relay=debug"));
    }
}
