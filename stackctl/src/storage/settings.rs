//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compose::augment::{RoutingConfig, ServiceDefaults};
use crate::compose::labels::LabelPolicy;
use crate::errors::StackError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::utils::env_var;

/// stackctl settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs
    #[serde(default)]
    pub json_logs: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Routing label derivation
    #[serde(default)]
    pub routing: RoutingSettings,

    /// Orchestration engine
    #[serde(default)]
    pub engine: EngineSettings,

    /// Reject malformed label entries instead of skipping them
    #[serde(default)]
    pub strict_labels: bool,

    /// Env file holding generated secrets; interpolation is off when unset
    #[serde(default)]
    pub secrets_file: Option<PathBuf>,

    /// Defaults applied to every service
    #[serde(default)]
    pub service_defaults: ServiceDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            server: ServerSettings::default(),
            routing: RoutingSettings::default(),
            engine: EngineSettings::default(),
            strict_labels: false,
            secrets_file: None,
            service_defaults: ServiceDefaults::default(),
        }
    }
}

impl Settings {
    /// Apply `PORT`, `INTERNAL_DOMAIN`, `EXTERNAL_DOMAIN` and `LOAD_BALANCER_NETWORK`
    pub fn apply_env(&mut self) -> Result<(), String> {
        if let Some(port) = env_var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| format!("Invalid PORT: {}", port))?;
        }
        if let Some(domain) = env_var("INTERNAL_DOMAIN") {
            self.routing.internal_domain = Some(domain);
        }
        if let Some(domain) = env_var("EXTERNAL_DOMAIN") {
            self.routing.external_domain = Some(domain);
        }
        if let Some(network) = env_var("LOAD_BALANCER_NETWORK") {
            self.routing.load_balancer_network = Some(network);
        }
        Ok(())
    }

    pub fn label_policy(&self) -> LabelPolicy {
        if self.strict_labels {
            LabelPolicy::Strict
        } else {
            LabelPolicy::Lenient
        }
    }
}

/// Load settings from `file`, falling back to defaults when it does not exist
pub async fn load_settings(file: &File) -> Result<Settings, StackError> {
    if !file.exists().await {
        return Ok(Settings::default());
    }
    file.read_json::<Settings>().await
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Routing settings; blank values count as unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingSettings {
    #[serde(default)]
    pub internal_domain: Option<String>,

    #[serde(default)]
    pub external_domain: Option<String>,

    #[serde(default)]
    pub load_balancer_network: Option<String>,
}

impl RoutingSettings {
    pub fn to_config(&self) -> RoutingConfig {
        RoutingConfig::new(
            self.internal_domain.clone(),
            self.external_domain.clone(),
            self.load_balancer_network.clone(),
        )
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine CLI executable
    #[serde(default = "default_binary")]
    pub binary: String,
}

fn default_binary() -> String {
    "docker".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
        }
    }
}
