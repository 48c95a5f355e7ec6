//! Error types for stackctl

use std::fmt;

use thiserror::Error;

use crate::deploy::process::ProcessError;

/// Phase of an activation attempt that an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reconciling,
    Submitting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Reconciling => write!(f, "reconciling"),
            Phase::Submitting => write!(f, "submitting"),
        }
    }
}

/// Main error type for stackctl
#[derive(Error, Debug)]
pub enum StackError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Descriptor is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid {path} declaration: {reason}")]
    InvalidShape { path: String, reason: String },

    #[error("Descriptor must contain a '{0}' mapping")]
    MissingField(String),

    #[error("`{command}` exited with status {status}: {diagnostics}")]
    ExternalProcessFailure {
        command: String,
        status: i32,
        diagnostics: String,
    },

    #[error("Failed to create {resource}: {diagnostics}")]
    ProvisioningFailure {
        resource: String,
        diagnostics: String,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Activation failed while {phase}: {source}")]
    Activation {
        phase: Phase,
        #[source]
        source: Box<StackError>,
    },

    #[error("Invalid state transition: {0}")]
    TransitionError(String),

    #[error("Secret store error: {0}")]
    SecretError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl StackError {
    pub fn invalid_shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StackError::InvalidShape {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the submitted descriptor itself
    pub fn is_validation(&self) -> bool {
        match self {
            StackError::Parse(_) | StackError::InvalidShape { .. } | StackError::MissingField(_) => {
                true
            }
            StackError::Activation { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// Phase the error was raised in, if it came out of an activation attempt
    pub fn phase(&self) -> Option<Phase> {
        match self {
            StackError::Activation { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StackError {
    fn from(err: anyhow::Error) -> Self {
        StackError::ServerError(err.to_string())
    }
}
