//! Inbound message dispatcher.
//!
//! Classifies each reassembled logical message: binary payloads go to the
//! render sink, text is parsed as a control message and routed into the
//! alert state machine. Messages are handled strictly in receipt order.
//!
//! A malformed text message is discarded with a local diagnostic — one bad
//! payload must never take the stream down.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vigil_core::protocol::{self, ControlMessage};
use vigil_core::InboundMessage;
use vigil_transport::TransportEvent;

use crate::alert::AlertMonitor;
use crate::io::RenderSink;
use crate::session::ClientEvent;

/// Consume the connection's event stream until it ends. Runs as the sole
/// subscriber of one connection instance.
pub(crate) async fn run_dispatch(
    mut events: mpsc::Receiver<TransportEvent>,
    render: Arc<dyn RenderSink>,
    alerts: Arc<AlertMonitor>,
    client_events: mpsc::Sender<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(InboundMessage::Binary(payload)) => {
                render.display(payload);
            }
            TransportEvent::Message(InboundMessage::Text(text)) => {
                route_text(&text, &alerts, &client_events).await;
            }
            TransportEvent::Closed => {
                info!("Server closed the connection");
                let _ = client_events.send(ClientEvent::ConnectionClosed).await;
                break;
            }
            TransportEvent::Error(e) => {
                // Surfaced to the session owner; reconnecting is its call.
                warn!("Transport failed: {e}");
                let _ = client_events.send(ClientEvent::TransportFailed(e.to_string())).await;
                break;
            }
        }
    }
    debug!("Dispatcher stopped");
}

async fn route_text(
    text: &str,
    alerts: &AlertMonitor,
    client_events: &mpsc::Sender<ClientEvent>,
) {
    match protocol::parse_control(text) {
        Ok(ControlMessage::Alert(record)) => alerts.on_alert(record),
        Ok(ControlMessage::ResetOk) => alerts.on_reset_confirmed(),
        Ok(ControlMessage::Other(raw)) => {
            info!("Server message: {raw}");
            let _ = client_events.send(ClientEvent::Log(raw)).await;
        }
        Err(e) => debug!("Discarding malformed message: {e}"),
    }
}
