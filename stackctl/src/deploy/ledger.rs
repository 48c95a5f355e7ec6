//! Provisioning ledger: resources created by one activation attempt

use std::fmt;

use tracing::{info, warn};

use crate::deploy::engine::Engine;

/// A resource created on the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Network(String),
    Volume(String),
}

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Resource::Network(name) | Resource::Volume(name) => name,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Network(name) => write!(f, "network {}", name),
            Resource::Volume(name) => write!(f, "volume {}", name),
        }
    }
}

/// Outcome of a rollback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub removed: Vec<Resource>,
    pub failed: Vec<Resource>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered record of the resources one activation attempt created.
///
/// Only resources this attempt actually created are recorded, so a rollback
/// never touches anything that existed beforehand.
#[derive(Debug, Default)]
pub struct ProvisioningLedger {
    entries: Vec<Resource>,
}

impl ProvisioningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource that was just created
    pub fn record(&mut self, resource: Resource) {
        if !self.entries.contains(&resource) {
            self.entries.push(resource);
        }
    }

    pub fn entries(&self) -> &[Resource] {
        &self.entries
    }

    /// Names of the networks created so far
    pub fn networks(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|r| match r {
                Resource::Network(name) => Some(name.as_str()),
                Resource::Volume(_) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove every recorded resource, newest first.
    ///
    /// Best-effort: a failed removal is logged and reported but never
    /// propagated. The ledger is drained, so a second call is a no-op.
    pub async fn rollback(&mut self, engine: &Engine) -> RollbackReport {
        let mut report = RollbackReport::default();
        if self.entries.is_empty() {
            return report;
        }

        info!("Rolling back {} created resource(s)", self.entries.len());
        while let Some(resource) = self.entries.pop() {
            let result = match &resource {
                Resource::Network(name) => engine.remove_network(name).await,
                Resource::Volume(name) => engine.remove_volume(name).await,
            };
            match result {
                Ok(()) => report.removed.push(resource),
                Err(e) => {
                    warn!("Failed to remove {} during rollback: {}", resource, e);
                    report.failed.push(resource);
                }
            }
        }

        report
    }
}
