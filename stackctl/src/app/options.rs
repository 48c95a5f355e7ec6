//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::compose::augment::{RoutingConfig, ServiceDefaults};
use crate::compose::labels::LabelPolicy;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Engine CLI executable
    pub engine_binary: String,

    /// Routing label derivation
    pub routing: RoutingConfig,

    /// Per-service defaults
    pub service_defaults: ServiceDefaults,

    /// How malformed label entries are handled
    pub label_policy: LabelPolicy,

    /// Secret store file; `None` disables interpolation
    pub secrets_file: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions::default(),
            engine_binary: "docker".to_string(),
            routing: RoutingConfig::default(),
            service_defaults: ServiceDefaults::default(),
            label_policy: LabelPolicy::default(),
            secrets_file: None,
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            engine_binary: settings.engine.binary.clone(),
            routing: settings.routing.to_config(),
            service_defaults: settings.service_defaults.clone(),
            label_policy: settings.label_policy(),
            secrets_file: settings.secrets_file.clone(),
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
