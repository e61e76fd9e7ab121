//! Shared application state.

use std::sync::Arc;

use crate::config::ApiConfig;
use opsledger_db::Database;

/// Cloned into every handler; the pool and config are shared.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        AppState {
            db,
            config: Arc::new(config),
        }
    }
}
