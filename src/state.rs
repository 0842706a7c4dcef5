use std::sync::Arc;

use crate::config::Config;
use crate::observability::metrics::Metrics;
use crate::service::{RequestService, ServiceSettings};
use crate::store::{InMemoryRequestStore, RequestStore};

pub struct AppState {
    pub service: RequestService,
    pub metrics: Metrics,
    pub static_dir: String,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_store(config, Arc::new(InMemoryRequestStore::new()))
    }

    pub fn with_store(config: &Config, store: Arc<dyn RequestStore>) -> Self {
        let metrics = Metrics::new();
        let settings = ServiceSettings {
            list_limit: config.list_limit,
            strict_transitions: config.strict_transitions,
        };

        Self {
            service: RequestService::new(store, metrics.clone(), settings),
            metrics,
            static_dir: config.static_dir.clone(),
        }
    }
}
