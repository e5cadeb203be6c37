//! Application configuration: one JSON file, typed all the way down,
//! rejected at load time when keys are unknown or values are structurally
//! wrong.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use engine::settings::InstanceSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileApiConfig {
    pub api_base: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

fn default_database_url() -> String {
    "sqlite://bookings.db".to_string()
}

fn default_http_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Bind address of the read-only monitoring endpoint.
    #[serde(default = "default_http_listen_addr")]
    pub http_listen_addr: String,
    /// Credentials for the character profile API. Required when any
    /// instance enables auto profile lookup.
    #[serde(default)]
    pub profile_api: Option<ProfileApiConfig>,
    pub instances: Vec<InstanceSettings>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: AppConfig =
            serde_json::from_str(&raw).context("parsing config file")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instances.is_empty() {
            anyhow::bail!("at least one instance must be configured");
        }

        let mut names = HashSet::new();
        for instance in &self.instances {
            instance.validate()?;
            if !names.insert(instance.name.as_str()) {
                anyhow::bail!("duplicate instance name: {}", instance.name);
            }
            if instance.auto_profile_lookup && self.profile_api.is_none() {
                anyhow::bail!(
                    "instance {} enables auto profile lookup but no profile_api is configured",
                    instance.name
                );
            }
        }

        Ok(())
    }
}
