//! Configuration: effect constants and template files

mod constants;
pub mod templates;

pub use constants::{
    AuraConstants, BuffConstants, CritConstants, EffectConstants, MagnitudeConstants,
    SchedulerConstants,
};
pub use templates::{load_templates, parse_json_templates, parse_toml_templates, TemplateFile};

use crate::EffectError;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

/// Error loading configuration or template files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Template rejected: {0}")]
    Template(#[from] EffectError),
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_toml(&content)
}

/// Deserialize a TOML string
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Deserialize a JSON string
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    Ok(serde_json::from_str(content)?)
}
