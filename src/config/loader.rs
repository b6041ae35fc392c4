use super::schema::Config;
use crate::error::{ConfigError, Result};
use crate::plugin::config::validate_plugin_list;
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const ENV_PREFIX: &str = "CHAT_RELAY_";

pub async fn load_from_env_or_file() -> Result<Config> {
    let config: Config = Figment::new()
        // Try to load from various config files
        .merge(Toml::file("chat-relay.toml"))
        .merge(Json::file("chat-relay.json"))
        .merge(Yaml::file("chat-relay.yaml"))
        .merge(Yaml::file("chat-relay.yml"))
        // Override with environment variables (CHAT_RELAY_ prefix)
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    finish(config)
}

pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    let figment = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Figment::new().merge(Toml::file(path)),
        Some("json") => Figment::new().merge(Json::file(path)),
        Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
        _ => {
            return Err(ConfigError::Parse(
                "Unsupported config file format. Use .toml, .json, .yaml, or .yml".into(),
            )
            .into())
        }
    };

    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    finish(config)
}

fn finish(config: Config) -> Result<Config> {
    let config = apply_env_substitutions(config)?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    validate_plugin_list(&config.plugins).map_err(ConfigError::Validation)?;
    config.pipeline.validate().map_err(ConfigError::Validation)?;

    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::Validation("Log level must not be empty".into()).into());
    }

    Ok(())
}

fn apply_env_substitutions(mut config: Config) -> Result<Config> {
    // Substitute in plugin payloads
    for plugin in &mut config.plugins {
        substitute_in_value(&mut plugin.config)?;
    }

    // Substitute in the download directory
    let download_dir = config.pipeline.download_dir.to_string_lossy().into_owned();
    config.pipeline.download_dir = PathBuf::from(substitute_env_vars(&download_dir)?);

    Ok(config)
}

fn substitute_in_value(value: &mut serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::String(s) => *s = substitute_env_vars(s)?,
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_in_value(item)?;
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_in_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute_env_vars(input: &str) -> Result<String> {
    static VAR: OnceLock<Regex> = OnceLock::new();
    let re = VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("invalid regex"));

    let mut result = input.to_string();
    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                // Check if there's a default value (e.g., ${VAR:-default})
                if let Some((name, default)) = var_name.split_once(":-") {
                    match std::env::var(name) {
                        Ok(value) => result = result.replace(&cap[0], &value),
                        Err(_) => result = result.replace(&cap[0], default),
                    }
                } else {
                    return Err(ConfigError::EnvVar(format!(
                        "Environment variable '{}' not found",
                        var_name
                    ))
                    .into());
                }
            }
        }
    }

    Ok(result)
}
