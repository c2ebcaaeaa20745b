//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::RelayError;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// # Errors
///
/// Returns [`RelayError::RegistryClosed`] (503) if the registry has stopped.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayError> {
    if state.registry.is_closed() {
        return Err(RelayError::RegistryClosed);
    }
    let registry = state.registry.clone();
    let config = std::sync::Arc::clone(&state.config);

    Ok(ws
        .max_message_size(config.max_message_bytes)
        .on_upgrade(move |socket| run_connection(socket, registry, config)))
}
