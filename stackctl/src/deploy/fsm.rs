//! Finite State Machine for a single stack activation

use serde::{Deserialize, Serialize};

/// Activation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Creating missing networks and volumes
    Reconciling,

    /// Handing the descriptor to the engine
    Submitting,

    /// Engine accepted the descriptor
    Succeeded,

    /// Removing what this attempt created
    RollingBack,

    /// Attempt failed; nothing it created is left behind
    Failed,
}

/// Activation event
#[derive(Debug, Clone)]
pub enum ActivationEvent {
    /// All required resources exist
    Reconciled,

    /// Provisioning failed (the reconciler already rolled back)
    ReconcileFailed(String),

    /// Engine reported success
    Submitted,

    /// Engine reported failure
    SubmitFailed(String),

    /// Compensating removals finished
    RolledBack,
}

/// Activation FSM
#[derive(Debug, Clone)]
pub struct ActivationFsm {
    state: ActivationState,
    error: Option<String>,
}

impl ActivationFsm {
    /// Create a new FSM; an attempt starts by reconciling
    pub fn new() -> Self {
        Self {
            state: ActivationState::Reconciling,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &ActivationState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True once the attempt has succeeded or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ActivationState::Succeeded | ActivationState::Failed)
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ActivationEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (ActivationState::Reconciling, ActivationEvent::Reconciled) => ActivationState::Submitting,
            (ActivationState::Reconciling, ActivationEvent::ReconcileFailed(err)) => {
                self.error = Some(err.clone());
                ActivationState::Failed
            }

            (ActivationState::Submitting, ActivationEvent::Submitted) => ActivationState::Succeeded,
            (ActivationState::Submitting, ActivationEvent::SubmitFailed(err)) => {
                self.error = Some(err.clone());
                ActivationState::RollingBack
            }

            (ActivationState::RollingBack, ActivationEvent::RolledBack) => ActivationState::Failed,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for ActivationFsm {
    fn default() -> Self {
        Self::new()
    }
}
