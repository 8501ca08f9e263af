use std::sync::Arc;

use service::RecordStore;

/// Shared handler state. Owns the one store instance opened at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}
