use std::sync::Arc;

use common::AssetService;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<AssetService>,
}

impl AppState {
    /// Build the service from the loaded configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let service = AssetService::from_config(&config.github, &config.policy, &config.upload);
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }
}
