// Configuration loading and parsing (config/live.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire live.toml file.
#[derive(Debug, Clone, Deserialize)]
struct LiveFile {
    operator: OperatorConfig,
    event: EventSection,
    realtime: RealtimeSection,
    database: DatabaseSection,
}

/// The local operator's identity, used to self-filter broadcasts.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EventSection {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RealtimeSection {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

/// The assembled application config.
#[derive(Debug, Clone)]
pub struct Config {
    pub operator: OperatorConfig,
    /// The event this client follows and edits.
    pub event_id: String,
    /// WebSocket URL of the broadcast relay.
    pub relay_url: String,
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/live.toml` relative to the
/// given `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("live.toml");
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
        path: path.clone(),
    })?;

    let file: LiveFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        operator: file.operator,
        event_id: file.event.id,
        relay_url: file.realtime.url,
        db_path: file.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working
/// directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let non_empty: &[(&str, &str)] = &[
        ("operator.id", &config.operator.id),
        ("operator.name", &config.operator.name),
        ("event.id", &config.event_id),
        ("database.path", &config.db_path),
    ];
    for (field, value) in non_empty {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if !config.relay_url.starts_with("ws://") && !config.relay_url.starts_with("wss://") {
        return Err(ConfigError::ValidationError {
            field: "realtime.url".into(),
            message: format!(
                "must be a ws:// or wss:// URL, got {}",
                config.relay_url
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
