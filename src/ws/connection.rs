//! WebSocket connection pump.
//!
//! Ties one socket to one participant: registers it, forwards inbound
//! envelopes to the registry, and drains the participant's outbound queue
//! onto the socket. Reading and writing run in separate tasks so that a
//! reader waiting on a busy registry never stops its own queue from
//! draining.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use super::messages::Envelope;
use crate::config::RelayConfig;
use crate::domain::{OutboundReceiver, PendingParticipant, RegistryHandle};

type WsSink = SplitSink<WebSocket, Message>;

/// Runs a single WebSocket connection until either side closes it.
///
/// The participant is unregistered exactly once when the connection ends,
/// however it ends.
pub async fn run_connection(
    socket: WebSocket,
    registry: RegistryHandle,
    config: Arc<RelayConfig>,
) {
    let conn_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "connection",
        %conn_id,
        participant_id = tracing::field::Empty
    );
    serve(socket, registry, config).instrument(span).await;
}

async fn serve(socket: WebSocket, registry: RegistryHandle, config: Arc<RelayConfig>) {
    let (pending, outbound) = PendingParticipant::new(config.outbound_queue_capacity);
    let id = match registry.register(pending).await {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(%err, "connection rejected");
            return;
        }
    };
    tracing::Span::current().record("participant_id", id.get());
    tracing::debug!("ws connection opened");

    let (ws_tx, mut ws_rx) = socket.split();
    let mut writer = tokio::spawn(
        write_loop(ws_tx, outbound, config.ping_interval, config.write_timeout).in_current_span(),
    );
    let mut writer_done = false;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match Envelope::decode(text.as_str()) {
                        Ok(message) => {
                            if registry.route(id, message.stamped(id)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!(%err, "dropping inbound frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%err, "ws read failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    if let Err(err) = registry.unregister(id).await {
        tracing::warn!(%err, "unregister failed");
    }
    // Unregistering closes the queue, which lets the writer send Close and exit.
    if !writer_done && tokio::time::timeout(config.write_timeout, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::debug!("ws connection closed");
}

/// Drains the outbound queue onto the socket and keeps the connection
/// alive with periodic pings. Returns when the queue is closed or a write
/// fails.
async fn write_loop(
    mut ws_tx: WsSink,
    mut outbound: OutboundReceiver,
    ping_interval: Duration,
    write_timeout: Duration,
) {
    let first_ping = tokio::time::Instant::now() + ping_interval;
    let mut ping = tokio::time::interval_at(first_ping, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    tracing::debug!("outbound queue closed");
                    let _ = send_within(&mut ws_tx, Message::Close(None), write_timeout).await;
                    break;
                };
                if !send_within(&mut ws_tx, Message::text(frame), write_timeout).await {
                    break;
                }
            }
            _ = ping.tick() => {
                if !send_within(&mut ws_tx, Message::Ping(Bytes::new()), write_timeout).await {
                    break;
                }
            }
        }
    }
}

/// Sends one message, giving up after `limit`. Returns `false` if the
/// connection should be torn down.
async fn send_within(ws_tx: &mut WsSink, msg: Message, limit: Duration) -> bool {
    match tokio::time::timeout(limit, ws_tx.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(%err, "ws write failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "ws write timed out");
            false
        }
    }
}
