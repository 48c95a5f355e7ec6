//! Application state

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::compose::augment::Augmenter;
use crate::deploy::activator::StackActivator;
use crate::deploy::engine::Engine;
use crate::deploy::process::{ProcessRunner, TokioProcessRunner};
use crate::filesys::file::File;
use crate::secrets::store::SecretStore;

/// Long-lived objects shared by the CLI and the HTTP server
pub struct AppState {
    pub activator: Arc<StackActivator>,
}

impl AppState {
    /// Build the state around the real engine CLI
    pub fn init(options: &AppOptions) -> Self {
        Self::with_runner(options, Arc::new(TokioProcessRunner::new()))
    }

    /// Build the state around any process runner
    pub fn with_runner(options: &AppOptions, runner: Arc<dyn ProcessRunner>) -> Self {
        let engine = Engine::new(options.engine_binary.clone(), runner);
        let augmenter = Augmenter::new(options.routing.clone(), options.service_defaults.clone());

        let mut activator = StackActivator::new(engine, augmenter, options.label_policy);
        if let Some(path) = &options.secrets_file {
            info!("Using secret store at {}", path.display());
            let store = SecretStore::new(File::new(path.clone()));
            activator = activator.with_secret_store(Arc::new(store));
        }

        Self {
            activator: Arc::new(activator),
        }
    }
}
