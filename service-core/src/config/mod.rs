use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
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

/// Resolve an environment variable with the "required in production" rule:
/// missing values fall back to `default` in dev and error out in prod.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_env_prefers_set_value() {
        unsafe { std::env::set_var("CORE_CONFIG_TEST_KEY", "set") };
        let val = get_env("CORE_CONFIG_TEST_KEY", Some("default"), true).unwrap();
        assert_eq!(val, "set");
        unsafe { std::env::remove_var("CORE_CONFIG_TEST_KEY") };
    }

    #[test]
    fn get_env_falls_back_in_dev() {
        let val = get_env("CORE_CONFIG_TEST_MISSING", Some("default"), false).unwrap();
        assert_eq!(val, "default");
    }

    #[test]
    fn get_env_requires_value_in_prod() {
        let err = get_env("CORE_CONFIG_TEST_MISSING", Some("default"), true);
        assert!(err.is_err());
    }
}
