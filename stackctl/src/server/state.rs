//! Server state

use std::sync::Arc;

use crate::deploy::activator::StackActivator;

/// Server state shared across handlers
pub struct ServerState {
    pub activator: Arc<StackActivator>,
}

impl ServerState {
    pub fn new(activator: Arc<StackActivator>) -> Self {
        Self { activator }
    }
}
