//! Provision the networks and volumes a descriptor requires

use std::collections::HashSet;

use tracing::{debug, error, info};

use crate::compose::augment::Requirements;
use crate::deploy::engine::Engine;
use crate::deploy::ledger::{ProvisioningLedger, Resource};
use crate::errors::StackError;

/// Creates missing resources, recording each creation in the ledger
pub struct Reconciler<'a> {
    engine: &'a Engine,
}

impl<'a> Reconciler<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Create every required resource that does not exist yet.
    ///
    /// The environment is listed once per resource kind. Creations run one at a
    /// time; on the first failure everything created so far is rolled back and
    /// the creation error is returned.
    pub async fn reconcile(
        &self,
        requirements: &Requirements,
        ledger: &mut ProvisioningLedger,
    ) -> Result<(), StackError> {
        let existing_networks = if requirements.networks.is_empty() {
            HashSet::new()
        } else {
            self.engine.list_networks().await?
        };
        let existing_volumes = if requirements.volumes.is_empty() {
            HashSet::new()
        } else {
            self.engine.list_volumes().await?
        };

        let result = self
            .create_missing(requirements, &existing_networks, &existing_volumes, ledger)
            .await;

        if let Err(e) = result {
            error!("Provisioning failed: {}", e);
            let report = ledger.rollback(self.engine).await;
            if !report.is_clean() {
                error!("Rollback left {} resource(s) behind", report.failed.len());
            }
            return Err(e);
        }

        info!("Provisioned {} resource(s)", ledger.len());
        Ok(())
    }

    async fn create_missing(
        &self,
        requirements: &Requirements,
        existing_networks: &HashSet<String>,
        existing_volumes: &HashSet<String>,
        ledger: &mut ProvisioningLedger,
    ) -> Result<(), StackError> {
        for network in &requirements.networks {
            if existing_networks.contains(network) {
                debug!("Network already exists: {}", network);
                continue;
            }
            self.engine.create_network(network).await?;
            ledger.record(Resource::Network(network.clone()));
        }

        for volume in &requirements.volumes {
            if existing_volumes.contains(volume) {
                debug!("Volume already exists: {}", volume);
                continue;
            }
            self.engine.create_volume(volume).await?;
            ledger.record(Resource::Volume(volume.clone()));
        }

        Ok(())
    }
}
