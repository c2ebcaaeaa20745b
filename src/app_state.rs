//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::domain::RegistryHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the participant registry for this process.
    pub registry: RegistryHandle,
    /// Settings each connection pump needs.
    pub config: Arc<RelayConfig>,
}
