//! Per-connection session loops.
//!
//! A producer session decodes updates and feeds them to the hub. A consumer
//! session registers with the hub, writes the newest aggregate it publishes,
//! and reads inbound traffic only to notice when the peer goes away.

use crate::metrics::{self, ConnectionMetricsGuard, Endpoint};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tilt_core::{ConsumerHandle, Hub};
use tilt_protocol::codec;
use tracing::{debug, warn};

/// Run a producer session until the peer closes or sends something invalid.
///
/// The producer's last sample stays in the hub after the session ends and
/// is only removed by eviction.
pub async fn run_producer_session(mut socket: WebSocket, hub: Arc<Hub>, peer: SocketAddr) {
    let _metrics_guard = ConnectionMetricsGuard::new(Endpoint::Producer);
    debug!(peer = %peer, "Producer connected");

    let mut producer: Option<String> = None;

    while let Some(msg) = socket.recv().await {
        let data = match msg {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(frame)) => {
                log_close(Endpoint::Producer, peer, frame);
                break;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Producer WebSocket error");
                metrics::record_error("websocket");
                break;
            }
        };

        let start = Instant::now();
        let update = match codec::decode_update(&data) {
            Ok(update) => update,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Invalid producer message");
                metrics::record_error("decode");
                break;
            }
        };
        metrics::record_message(data.len(), "inbound");

        if producer.as_deref() != Some(update.id.as_str()) {
            debug!(peer = %peer, producer = %update.id, "Producer identified");
            producer = Some(update.id.clone());
        }

        hub.ingest(update);
        metrics::record_latency(start.elapsed().as_secs_f64());
    }

    let _ = socket.close().await;
    debug!(peer = %peer, producer = ?producer, "Producer disconnected");
}

/// Run a consumer session until the peer closes or a write fails.
///
/// The consumer receives the current aggregate as soon as it is attached,
/// then the newest aggregate after each broadcast. Aggregates superseded
/// before they could be written are skipped. Inbound payloads are ignored.
pub async fn run_consumer_session(socket: WebSocket, hub: Arc<Hub>, peer: SocketAddr) {
    let _metrics_guard = ConnectionMetricsGuard::new(Endpoint::Consumer);

    let (handle, mut outbound) = ConsumerHandle::channel();
    let consumer = handle.id();
    let (mut sender, mut receiver) = socket.split();

    debug!(peer = %peer, consumer = %consumer, "Consumer connected");
    hub.attach_consumer(handle);

    loop {
        tokio::select! {
            biased;

            payload = outbound.recv() => match payload {
                Some(payload) => {
                    metrics::record_message(payload.len(), "outbound");
                    if let Err(e) = sender.send(Message::Text(payload.to_string())).await {
                        debug!(consumer = %consumer, error = %e, "Consumer write failed");
                        metrics::record_error("websocket");
                        break;
                    }
                }
                None => {
                    debug!(consumer = %consumer, "Consumer feed closed");
                    break;
                }
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(frame))) => {
                    log_close(Endpoint::Consumer, peer, frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(consumer = %consumer, error = %e, "Consumer WebSocket error");
                    metrics::record_error("websocket");
                    break;
                }
                None => {
                    debug!(consumer = %consumer, "Consumer stream ended");
                    break;
                }
            },
        }
    }

    hub.detach_consumer(consumer);
    let _ = sender.close().await;
    debug!(peer = %peer, consumer = %consumer, "Consumer disconnected");
}

/// Log a close frame, warning only on unexpected close codes.
fn log_close(endpoint: Endpoint, peer: SocketAddr, frame: Option<CloseFrame<'static>>) {
    match frame {
        Some(frame) if frame.code != close_code::NORMAL && frame.code != close_code::AWAY => {
            warn!(
                endpoint = endpoint.as_str(),
                peer = %peer,
                code = frame.code,
                reason = %frame.reason,
                "Unexpected close"
            );
        }
        _ => debug!(endpoint = endpoint.as_str(), peer = %peer, "Received close frame"),
    }
}
