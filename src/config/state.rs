// Application state module
// Everything a request needs, shared across connections

use std::sync::Arc;

use super::types::Config;
use crate::clock::{Clock, SystemClock};
use crate::storage::SharedStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub storage: SharedStore,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// State backed by the wall clock
    pub fn new(config: Config, storage: SharedStore) -> Self {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, storage: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            storage,
            clock,
        }
    }
}
