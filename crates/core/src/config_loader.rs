use crate::config::GateConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use tracing::info;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads gate configuration by layering TOML, environment variables, and
    /// JSON over built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<GateConfig> {
        let config: GateConfig = Figment::from(Serialized::defaults(GateConfig::default()))
            .merge(Toml::file("config/Gate.toml"))
            .merge(Env::prefixed("GATE_").split("__"))
            .join(Json::file("config/Gate.json"))
            .extract()?;

        info!(
            per_trade_limit = %config.spending.per_trade_limit,
            allowed_pairs = config.assets.allowed_pairs.len(),
            "gate configuration loaded"
        );
        Ok(config)
    }

    /// Loads gate configuration with a specific profile.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<GateConfig> {
        let config: GateConfig = Figment::from(Serialized::defaults(GateConfig::default()))
            .merge(Toml::file("config/Gate.toml"))
            .merge(Toml::file(format!("config/Gate.{profile}.toml")))
            .merge(Env::prefixed("GATE_").split("__"))
            .join(Json::file("config/Gate.json"))
            .extract()?;

        info!(
            profile,
            per_trade_limit = %config.spending.per_trade_limit,
            allowed_pairs = config.assets.allowed_pairs.len(),
            "gate configuration loaded"
        );
        Ok(config)
    }
}
