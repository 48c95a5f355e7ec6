//! Service defaults and reverse-proxy routing

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::compose::descriptor::{is_unset, Descriptor};

/// Label whose presence opts a service into proxy routing
pub const HTTP_PORT_LABEL: &str = "http.port";

/// Label enabling the proxy for a service
pub const ROUTING_ENABLE_LABEL: &str = "traefik.enable";

/// Routing rule label for a service
pub fn routing_rule_label(service: &str) -> String {
    format!("traefik.http.routers.{}.rule", service)
}

/// Domains and proxy network used to derive routing labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    internal_domain: String,
    external_domain: Option<String>,
    load_balancer_network: Option<String>,
}

impl RoutingConfig {
    /// Blank values fall back to their defaults
    pub fn new(
        internal_domain: Option<String>,
        external_domain: Option<String>,
        load_balancer_network: Option<String>,
    ) -> Self {
        Self {
            internal_domain: non_blank(internal_domain).unwrap_or_else(|| "localhost".to_string()),
            external_domain: non_blank(external_domain),
            load_balancer_network: non_blank(load_balancer_network),
        }
    }

    pub fn internal_domain(&self) -> &str {
        &self.internal_domain
    }

    pub fn external_domain(&self) -> Option<&str> {
        self.external_domain.as_deref()
    }

    pub fn load_balancer_network(&self) -> Option<&str> {
        self.load_balancer_network.as_deref()
    }

    /// Host rule for a service, external hostname first
    pub fn rule_for(&self, service: &str) -> String {
        let internal = format!("Host(`{}.{}`)", service, self.internal_domain);
        match &self.external_domain {
            Some(external) => format!("Host(`{}.{}`) || {}", service, external, internal),
            None => internal,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Per-service defaults applied when the caller left a field unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefaults {
    /// Restart policy
    #[serde(default = "default_restart")]
    pub restart: String,

    /// CPU limit, e.g. "0.2"
    #[serde(default)]
    pub cpus: Option<String>,

    /// Memory limit, e.g. "128m"
    #[serde(default)]
    pub mem_limit: Option<String>,

    /// Memory + swap limit
    #[serde(default)]
    pub memswap_limit: Option<String>,
}

fn default_restart() -> String {
    "unless-stopped".to_string()
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            restart: default_restart(),
            cpus: None,
            mem_limit: None,
            memswap_limit: None,
        }
    }
}

/// Resources that must exist on the engine before the descriptor is submitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub networks: IndexSet<String>,
    pub volumes: IndexSet<String>,
    pub secrets: IndexSet<String>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.volumes.is_empty() && self.secrets.is_empty()
    }
}

/// Fills service defaults and derives routing labels and external resources
#[derive(Debug, Clone, Default)]
pub struct Augmenter {
    routing: RoutingConfig,
    defaults: ServiceDefaults,
}

impl Augmenter {
    pub fn new(routing: RoutingConfig, defaults: ServiceDefaults) -> Self {
        Self { routing, defaults }
    }

    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    /// Mutate the descriptor in place and report what it requires.
    ///
    /// Caller-supplied values are never overwritten, so augmenting an
    /// already augmented descriptor leaves it unchanged.
    pub fn augment(&self, descriptor: &mut Descriptor) -> Requirements {
        let mut required = Requirements::default();
        let Descriptor {
            services,
            networks,
            volumes,
            secrets,
            ..
        } = descriptor;

        for (name, service) in services.iter_mut() {
            service.set_default("container_name", name.as_str());
            service.set_default("restart", self.defaults.restart.as_str());
            for (key, value) in [
                ("cpus", &self.defaults.cpus),
                ("mem_limit", &self.defaults.mem_limit),
                ("memswap_limit", &self.defaults.memswap_limit),
            ] {
                if let Some(value) = value {
                    service.set_default(key, value.as_str());
                }
            }

            for network_ref in &service.network_refs {
                required.networks.insert(ensure_external_network(networks, network_ref));
            }

            if let Some(labels) = service.labels.as_mut() {
                if labels.shift_remove(HTTP_PORT_LABEL).is_some() {
                    debug!("Deriving routing labels for service: {}", name);
                    labels
                        .entry(ROUTING_ENABLE_LABEL.to_string())
                        .or_insert_with(|| "true".to_string());
                    labels
                        .entry(routing_rule_label(name))
                        .or_insert_with(|| self.routing.rule_for(name));

                    if let Some(lb) = self.routing.load_balancer_network() {
                        required.networks.insert(ensure_external_network(networks, lb));
                    }
                }
            }

            for volume_ref in &service.volume_refs {
                required.volumes.insert(ensure_external_volume(volumes, volume_ref));
            }

            if !service.secret_refs.is_empty() {
                let environment = service.environment.get_or_insert_with(Mapping::new);
                for secret_ref in &service.secret_refs {
                    if is_unset(environment, secret_ref) {
                        environment.insert(
                            Value::from(secret_ref.as_str()),
                            Value::from(format!("/run/secrets/{}", secret_ref)),
                        );
                    }
                    if let Some(variable) = ensure_environment_secret(secrets, secret_ref) {
                        required.secrets.insert(variable);
                    }
                }
            }
        }

        required
    }
}

/// Declare `key` as an external network; returns the engine-side name
fn ensure_external_network(networks: &mut IndexMap<String, Mapping>, key: &str) -> String {
    let network = networks.entry(key.to_string()).or_insert_with(Mapping::new);
    if is_unset(network, "name") {
        network.insert(Value::from("name"), Value::from(key));
    }
    network.insert(Value::from("driver"), Value::from("external"));
    resource_name(network, key)
}

/// Declare `key` as an external volume unless the caller said otherwise
fn ensure_external_volume(volumes: &mut IndexMap<String, Mapping>, key: &str) -> String {
    let volume = volumes.entry(key.to_string()).or_insert_with(Mapping::new);
    if is_unset(volume, "external") {
        volume.insert(Value::from("external"), Value::Bool(true));
    }
    resource_name(volume, key)
}

/// Source a secret from the engine environment unless it already has a source.
/// Returns the variable the secret is read from.
fn ensure_environment_secret(secrets: &mut IndexMap<String, Mapping>, key: &str) -> Option<String> {
    let secret = secrets.entry(key.to_string()).or_insert_with(Mapping::new);
    if is_unset(secret, "file") && is_unset(secret, "external") && is_unset(secret, "environment") {
        secret.insert(Value::from("environment"), Value::from(key));
    }
    match secret.get("environment") {
        Some(Value::String(variable)) => Some(variable.clone()),
        _ => None,
    }
}

fn resource_name(entry: &Mapping, key: &str) -> String {
    match entry.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => key.to_string(),
    }
}
