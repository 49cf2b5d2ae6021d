use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Read an environment variable with an optional default.
///
/// In production a missing variable without a default is a hard error; in dev
/// the default is used so services start with zero setup.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => match default {
            Some(value) => {
                if is_prod {
                    tracing::warn!(key, "Using default value in production");
                }
                Ok(value.to_string())
            }
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "Missing required environment variable: {}",
                key
            ))),
        },
    }
}
