use std::sync::Arc;

use scribe_core::{Config, JobManager, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    manager: Arc<JobManager>,
}

impl AppState {
    pub fn new(config: Config, manager: Arc<JobManager>) -> Self {
        Self { config, manager }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn manager(&self) -> &JobManager {
        self.manager.as_ref()
    }
}
