//! Docker CLI engine client

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::deploy::process::{Invocation, ProcessOutput, ProcessRunner};
use crate::errors::StackError;

/// Thin wrapper over the docker CLI invocations the activation pipeline needs
#[derive(Clone)]
pub struct Engine {
    binary: String,
    runner: Arc<dyn ProcessRunner>,
}

impl Engine {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn invocation(&self, args: &[&str]) -> Invocation {
        Invocation::new(self.binary.clone(), args.iter().copied())
    }

    async fn run_checked(&self, invocation: Invocation) -> Result<ProcessOutput, StackError> {
        let output = self.runner.run(&invocation).await?;
        if !output.success() {
            return Err(StackError::ExternalProcessFailure {
                command: invocation.to_string(),
                status: output.status,
                diagnostics: output.diagnostics(),
            });
        }
        Ok(output)
    }

    async fn list_names(&self, kind: &str) -> Result<HashSet<String>, StackError> {
        let output = self
            .run_checked(self.invocation(&[kind, "ls", "--format", "{{.Name}}"]))
            .await?;
        let names: HashSet<String> = output
            .stdout
            .split_whitespace()
            .map(str::to_string)
            .collect();
        debug!("Found {} existing {}s", names.len(), kind);
        Ok(names)
    }

    /// Names of the networks that currently exist
    pub async fn list_networks(&self) -> Result<HashSet<String>, StackError> {
        self.list_names("network").await
    }

    /// Create a bridge network
    pub async fn create_network(&self, name: &str) -> Result<(), StackError> {
        info!("Creating network: {}", name);
        self.run_checked(self.invocation(&["network", "create", "--driver", "bridge", name]))
            .await
            .map_err(|e| provisioning_failure("network", name, e))?;
        Ok(())
    }

    /// Force-remove a network
    pub async fn remove_network(&self, name: &str) -> Result<(), StackError> {
        info!("Removing network: {}", name);
        self.run_checked(self.invocation(&["network", "rm", "-f", name]))
            .await?;
        Ok(())
    }

    /// Names of the volumes that currently exist
    pub async fn list_volumes(&self) -> Result<HashSet<String>, StackError> {
        self.list_names("volume").await
    }

    /// Create a local volume
    pub async fn create_volume(&self, name: &str) -> Result<(), StackError> {
        info!("Creating volume: {}", name);
        self.run_checked(self.invocation(&["volume", "create", "--driver", "local", name]))
            .await
            .map_err(|e| provisioning_failure("volume", name, e))?;
        Ok(())
    }

    /// Force-remove a volume
    pub async fn remove_volume(&self, name: &str) -> Result<(), StackError> {
        info!("Removing volume: {}", name);
        self.run_checked(self.invocation(&["volume", "rm", "-f", name]))
            .await?;
        Ok(())
    }

    /// Bring up a descriptor piped through stdin, detached, waiting for health
    pub async fn compose_up(
        &self,
        project: Option<&str>,
        descriptor: &str,
        envs: Vec<(String, String)>,
    ) -> Result<ProcessOutput, StackError> {
        let invocation = self
            .compose_invocation(project, &["up", "-d", "--wait"])
            .with_input(descriptor)
            .with_envs(envs);
        self.run_checked(invocation).await
    }

    /// Tear down a descriptor piped through stdin
    pub async fn compose_down(
        &self,
        project: Option<&str>,
        descriptor: &str,
        envs: Vec<(String, String)>,
    ) -> Result<ProcessOutput, StackError> {
        let invocation = self
            .compose_invocation(project, &["down"])
            .with_input(descriptor)
            .with_envs(envs);
        self.run_checked(invocation).await
    }

    fn compose_invocation(&self, project: Option<&str>, action: &[&str]) -> Invocation {
        let mut args = vec!["compose"];
        if let Some(project) = project {
            args.extend(["-p", project]);
        }
        args.extend(["-f", "-"]);
        args.extend_from_slice(action);
        self.invocation(&args)
    }
}

fn provisioning_failure(kind: &str, name: &str, err: StackError) -> StackError {
    let diagnostics = match err {
        StackError::ExternalProcessFailure { diagnostics, .. } => diagnostics,
        other => other.to_string(),
    };
    StackError::ProvisioningFailure {
        resource: format!("{} {}", kind, name),
        diagnostics,
    }
}
