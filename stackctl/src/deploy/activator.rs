//! Stack activation: reconcile, submit, roll back on failure

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::compose::augment::{Augmenter, Requirements};
use crate::compose::descriptor::Descriptor;
use crate::compose::interpolate;
use crate::compose::labels::LabelPolicy;
use crate::deploy::engine::Engine;
use crate::deploy::fsm::{ActivationEvent, ActivationFsm};
use crate::deploy::ledger::ProvisioningLedger;
use crate::deploy::reconcile::Reconciler;
use crate::errors::{Phase, StackError};
use crate::secrets::store::SecretStore;

/// A descriptor ready to hand to the engine
struct Prepared {
    descriptor: Descriptor,
    requirements: Requirements,
    envs: Vec<(String, String)>,
}

/// Turns raw descriptor text into a running stack
pub struct StackActivator {
    engine: Engine,
    augmenter: Augmenter,
    label_policy: LabelPolicy,
    secrets: Option<Arc<SecretStore>>,
}

impl StackActivator {
    pub fn new(engine: Engine, augmenter: Augmenter, label_policy: LabelPolicy) -> Self {
        Self {
            engine,
            augmenter,
            label_policy,
            secrets: None,
        }
    }

    /// Use `store` for `${VAR}` interpolation and compose secrets
    pub fn with_secret_store(mut self, store: Arc<SecretStore>) -> Self {
        self.secrets = Some(store);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn augmenter(&self) -> &Augmenter {
        &self.augmenter
    }

    /// Activate a descriptor, returning the engine's combined output.
    ///
    /// Descriptor errors surface before anything is created. Once provisioning
    /// has started, failures are wrapped in [`StackError::Activation`] and every
    /// resource this attempt created has been removed (best-effort).
    pub async fn activate(&self, raw: &str, project: Option<&str>) -> Result<String, StackError> {
        let span = info_span!(
            "activation",
            attempt = %Uuid::new_v4().simple(),
            project = project.unwrap_or("-")
        );
        self.run_activation(raw, project).instrument(span).await
    }

    /// Tear down a previously activated descriptor. Networks and volumes are left alone.
    pub async fn deactivate(&self, raw: &str, project: Option<&str>) -> Result<String, StackError> {
        let span = info_span!("deactivation", project = project.unwrap_or("-"));
        async {
            validate_project(project)?;
            let prepared = self.prepare(raw).await?;
            let yaml = prepared.descriptor.to_yaml()?;
            info!("Tearing down {} service(s)", prepared.descriptor.services.len());
            let output = self.engine.compose_down(project, &yaml, prepared.envs).await?;
            Ok::<_, StackError>(output.combined())
        }
        .instrument(span)
        .await
    }

    async fn run_activation(&self, raw: &str, project: Option<&str>) -> Result<String, StackError> {
        validate_project(project)?;
        let prepared = self.prepare(raw).await?;
        let yaml = prepared.descriptor.to_yaml()?;

        let mut fsm = ActivationFsm::new();
        let mut ledger = ProvisioningLedger::new();

        let reconciled = Reconciler::new(&self.engine)
            .reconcile(&prepared.requirements, &mut ledger)
            .await;
        if let Err(e) = reconciled {
            transition(&mut fsm, ActivationEvent::ReconcileFailed(e.to_string()))?;
            return Err(StackError::Activation {
                phase: Phase::Reconciling,
                source: Box::new(e),
            });
        }
        transition(&mut fsm, ActivationEvent::Reconciled)?;

        info!(
            "Submitting {} service(s), {} resource(s) created",
            prepared.descriptor.services.len(),
            ledger.len()
        );
        match self.engine.compose_up(project, &yaml, prepared.envs).await {
            Ok(output) => {
                transition(&mut fsm, ActivationEvent::Submitted)?;
                info!("Stack activated");
                Ok(output.combined())
            }
            Err(e) => {
                error!("Submission failed: {}", e);
                transition(&mut fsm, ActivationEvent::SubmitFailed(e.to_string()))?;

                let report = ledger.rollback(&self.engine).await;
                if !report.is_clean() {
                    warn!(
                        "Rollback removed {} resource(s), {} left behind",
                        report.removed.len(),
                        report.failed.len()
                    );
                }
                transition(&mut fsm, ActivationEvent::RolledBack)?;

                Err(StackError::Activation {
                    phase: Phase::Submitting,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Interpolate, validate and augment; nothing is created on the engine here
    async fn prepare(&self, raw: &str) -> Result<Prepared, StackError> {
        let text = match &self.secrets {
            Some(store) => {
                let names = interpolate::variables(raw);
                let values = store.get_or_create_all(&names).await?;
                interpolate::substitute(raw, &values)
            }
            None => raw.to_string(),
        };

        let mut descriptor = Descriptor::parse(&text, self.label_policy)?;
        let requirements = self.augmenter.augment(&mut descriptor);

        let envs = if requirements.secrets.is_empty() {
            Vec::new()
        } else {
            let store = self.secrets.as_ref().ok_or_else(|| {
                StackError::ConfigError(
                    "descriptor references secrets but no secret store is configured".to_string(),
                )
            })?;
            let mut values = store.get_or_create_all(&requirements.secrets).await?;
            requirements
                .secrets
                .iter()
                .filter_map(|name| values.remove(name).map(|value| (name.clone(), value)))
                .collect()
        };

        Ok(Prepared {
            descriptor,
            requirements,
            envs,
        })
    }
}

/// Compose project names: lowercase letters, digits, `-` and `_`, starting with a letter or digit
fn validate_project(project: Option<&str>) -> Result<(), StackError> {
    let Some(name) = project else {
        return Ok(());
    };
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let valid_rest =
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(StackError::invalid_shape(
            "project",
            format!("'{}' must be lowercase letters, digits, '-' or '_'", name),
        ))
    }
}

fn transition(fsm: &mut ActivationFsm, event: ActivationEvent) -> Result<(), StackError> {
    fsm.process(event).map_err(StackError::TransitionError)
}
