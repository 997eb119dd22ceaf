use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

use crate::service::danger::DangerThresholds;

/// Process-wide configuration, resolved once on first access.
/// Panics at startup if the merged sources cannot be deserialized.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: invalid configuration: {e}"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    pub operator_key: String,
    pub models: ModelPaths,
    pub thresholds: DangerThresholds,
    pub mail: MailConfig,
}

/// Artifact locations for the three risk models. All three are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    pub tachycardia: Option<PathBuf>,
    pub hypertrophy: Option<PathBuf>,
    pub cholesterol: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// HTTP mail relay; when unset alerts are written to the log instead.
    pub relay_url: Option<Url>,
    pub api_token: Option<String>,
    pub sender: String,
    pub per_minute: u32,
    pub fanout_concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:heart_monitor.db".to_string(),
            listen_addr: "0.0.0.0:5000".to_string(),
            loglevel: "info".to_string(),
            operator_key: "change-me".to_string(),
            models: ModelPaths::default(),
            thresholds: DangerThresholds::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            tachycardia: Some(PathBuf::from("models/tachycardia.json")),
            hypertrophy: Some(PathBuf::from("models/hypertrophy.json")),
            cholesterol: Some(PathBuf::from("models/cholesterol.json")),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            api_token: None,
            sender: "heart-monitor@example.com".to_string(),
            per_minute: 60,
            fanout_concurrency: 4,
            timeout_secs: 15,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml`, then `HEARTWATCH_*` env vars
    /// (nested keys split on `__`, e.g. `HEARTWATCH_MAIL__RELAY_URL`).
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("HEARTWATCH_").split("__"))
    }
}
