use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;

/// Engine settings. Defaults are overlaid by an optional `phishguard.toml` in
/// the working directory and then by `PHISHGUARD_*` environment variables
/// (e.g. `PHISHGUARD_MODEL_PATH`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub model_path: String,
    /// Re-read the model artifact on every prediction instead of once at startup.
    pub reload_model: bool,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Full public suffix list (`public_suffix_list.dat`); the embedded
    /// snapshot is used when unset.
    pub public_suffix_list: Option<String>,
    pub metrics_enabled: bool,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("phishguard")
    }

    fn load_from(file_stem: &str) -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:5000")?
            .set_default("model_path", "models/phishing_model.json")?
            .set_default("reload_model", true)?
            .set_default("fetch_timeout_secs", 5)?
            .set_default(
                "user_agent",
                concat!("phishguard-engine/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("metrics_enabled", true)?
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("PHISHGUARD").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            model_path: "models/phishing_model.json".to_string(),
            reload_model: true,
            fetch_timeout_secs: 5,
            user_agent: concat!("phishguard-engine/", env!("CARGO_PKG_VERSION")).to_string(),
            public_suffix_list: None,
            metrics_enabled: true,
        }
    }
}
