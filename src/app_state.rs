use std::sync::Arc;

use crate::auth_gateway::AuthGateway;
use crate::kv_store::KeyValueStore;
use crate::registry::TaskRegistry;

/// Shared per-worker handles. Backends are injected, never global.
#[derive(Clone)]
pub struct AppState {
    pub registry: TaskRegistry,
    pub store: Arc<dyn KeyValueStore>,
    pub gateway: Arc<dyn AuthGateway>,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, gateway: Arc<dyn AuthGateway>) -> Self {
        Self {
            registry: TaskRegistry::new(store.clone(), gateway.clone()),
            store,
            gateway,
        }
    }
}
